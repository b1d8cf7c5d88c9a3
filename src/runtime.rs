// ABOUTME: Tokio runtime lifecycle for the binary.
// ABOUTME: Runs the top-level future and shuts down without waiting on leaked tasks.

use std::future::Future;
use std::io;

/// Run `future` to completion on a fresh multi-threaded runtime.
///
/// Once it returns, the runtime is shut down in the background: detached
/// tasks are dropped and blocking reads such as the stdin forwarder are not
/// waited for. The caller is expected to exit the process right after.
pub fn block_on_detached<F: Future>(future: F) -> io::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let output = runtime.block_on(future);
    runtime.shutdown_background();
    Ok(output)
}
