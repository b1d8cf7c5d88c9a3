// ABOUTME: Test support utilities.
// ABOUTME: Provides tracing setup, fixture paths, a timestamping shell-input writer and an SSH server.

// Each test binary only uses some of these helpers, so allow dead_code.
#[allow(dead_code)]
pub mod ssh_server;

use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Mutex, Once};
use std::task::{Context, Poll};
use std::time::Instant;
use tokio::io::AsyncWrite;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env()
            .add_directive("scpe=debug".parse().unwrap())
            .add_directive("russh=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Path to a file under tests/fixtures.
#[allow(dead_code)]
pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Shell input stand-in that records every write with the time it happened.
#[derive(Clone, Default)]
#[allow(dead_code)]
pub struct RecordingShell {
    writes: Arc<Mutex<Vec<(Instant, Vec<u8>)>>>,
}

#[allow(dead_code)]
impl RecordingShell {
    /// All bytes written so far, concatenated.
    pub fn bytes(&self) -> Vec<u8> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .flat_map(|(_, chunk)| chunk.iter().copied())
            .collect()
    }

    /// Each write with its timestamp.
    pub fn writes(&self) -> Vec<(Instant, Vec<u8>)> {
        self.writes.lock().unwrap().clone()
    }

    /// Time of the first write whose bytes start with `prefix`.
    pub fn first_write_starting_with(&self, prefix: &[u8]) -> Option<Instant> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .find(|(_, chunk)| chunk.starts_with(prefix))
            .map(|(at, _)| *at)
    }
}

impl AsyncWrite for RecordingShell {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.writes
            .lock()
            .unwrap()
            .push((Instant::now(), buf.to_vec()));
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
