// ABOUTME: Interactive session orchestration.
// ABOUTME: Sequences PTY setup, hook commands and the file transfer, then hands the shell to the user.

use super::auth::{TerminalResponder, resolve_auth_methods};
use super::client::{AcceptAnyHostKey, Connection, ConnectionTarget};
use super::error::{Error, Result};
use super::tasks::{
    ControlPlane, KEEPALIVE_INTERVAL, RESIZE_POLL_INTERVAL, forward_input_then_close,
    relay_output, send_keepalives, watch_resize,
};
use super::terminal::{RawModeGuard, TERM, TerminalSize, pty_modes, terminal_size};
use crate::config::{CallbackCommand, HostDescriptor};
use crate::scp::{self, CTRL_C, RemoteFetch, Transfer, TransferDirection};
use async_trait::async_trait;
use futures::Stream;
use russh::client::{self, Handle};
use russh::{ChannelMsg, ChannelReadHalf, ChannelWriteHalf};
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

/// Writable end of the remote shell's standard input.
pub type ShellInput = Pin<Box<dyn AsyncWrite + Send>>;

/// Connect to `host`, run the hooked transfer inside an interactive shell,
/// and return once the shell exits.
///
/// Teardown runs on every path: shell channel, then transport, then the
/// local terminal mode.
pub async fn run_session(host: &HostDescriptor, transfer: &Transfer) -> Result<Option<u32>> {
    let target = ConnectionTarget::from_descriptor(host);
    let methods = resolve_auth_methods(host);
    tracing::debug!(address = %target.address(), ?methods, "connecting");

    let connection = Connection::establish(target, methods, &mut TerminalResponder).await?;

    let mut raw_mode = None;
    let outcome = drive(&connection, host, transfer, &mut raw_mode).await;

    if let Err(e) = connection.disconnect().await {
        tracing::debug!(error = %e, "disconnect failed");
    }
    if let Some(guard) = raw_mode.take() {
        if let Err(e) = guard.restore() {
            tracing::warn!("failed to restore terminal mode: {e}");
        }
    }

    outcome
}

async fn drive(
    connection: &Connection,
    host: &HostDescriptor,
    transfer: &Transfer,
    raw_mode: &mut Option<RawModeGuard>,
) -> Result<Option<u32>> {
    let handle = connection.handle();

    let channel = handle
        .channel_open_session()
        .await
        .map_err(|e| Error::Channel(format!("failed to open session channel: {e}")))?;

    *raw_mode = Some(RawModeGuard::enable().map_err(Error::Terminal)?);
    let size = terminal_size().map_err(Error::Terminal)?;

    channel
        .request_pty(
            true,
            TERM,
            size.cols.into(),
            size.rows.into(),
            0,
            0,
            &pty_modes(),
        )
        .await
        .map_err(|e| Error::Channel(format!("pty request failed: {e}")))?;
    channel
        .request_shell(true)
        .await
        .map_err(|e| Error::Channel(format!("shell request failed: {e}")))?;

    let (read_half, write_half) = channel.split();
    let output = tokio::spawn(relay_output(
        channel_messages(read_half),
        tokio::io::stdout(),
        tokio::io::stderr(),
    ));
    let shell_input: Arc<Mutex<ShellInput>> =
        Arc::new(Mutex::new(Box::pin(write_half.make_writer())));
    let control = Arc::new(ShellControl {
        handle: Arc::clone(handle),
        channel: write_half,
    });

    if let Err(e) = run_scripted(&**handle, &shell_input, host, transfer).await {
        tracing::error!("hook commands aborted: {e}");
    }

    spawn_background_tasks(&shell_input, &control, size);

    let status = match output.await {
        Ok(status) => status,
        Err(e) => {
            tracing::debug!(error = %e, "output relay ended abnormally");
            None
        }
    };
    tracing::debug!(?status, "shell exited");

    if let Err(e) = control.close().await {
        tracing::debug!(error = %e, "closing shell channel failed");
    }
    Ok(status)
}

/// Before-hooks, the transfer, then after-hooks, strictly in that order.
///
/// A failed hook write aborts the rest. A failed transfer is logged and the
/// after-hooks still run.
pub async fn run_scripted<F, W>(
    remote: &F,
    shell_input: &Arc<Mutex<W>>,
    host: &HostDescriptor,
    transfer: &Transfer,
) -> io::Result<()>
where
    F: RemoteFetch + ?Sized,
    W: AsyncWrite + Unpin + Send + 'static,
{
    run_callbacks(shell_input, &host.before_transfer).await?;

    if let Err(e) = run_transfer(remote, shell_input, transfer).await {
        tracing::error!("transfer failed: {e}");
    }

    run_callbacks(shell_input, &host.after_transfer).await
}

/// Write each command followed by a carriage return, after its delay.
pub async fn run_callbacks<W>(shell_input: &Mutex<W>, commands: &[CallbackCommand]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    for command in commands {
        tokio::time::sleep(command.delay).await;
        tracing::debug!(cmd = %command.cmd, "writing callback command");

        let mut pipe = shell_input.lock().await;
        pipe.write_all(format!("{}\r", command.cmd).as_bytes())
            .await?;
        pipe.flush().await?;
    }
    Ok(())
}

/// Perform the configured transfer.
///
/// After a download an interrupt is sent to the shell to leave it at a prompt.
pub async fn run_transfer<F, W>(
    remote: &F,
    shell_input: &Arc<Mutex<W>>,
    transfer: &Transfer,
) -> scp::Result<()>
where
    F: RemoteFetch + ?Sized,
    W: AsyncWrite + Unpin + Send + 'static,
{
    match transfer.direction {
        TransferDirection::Upload => {
            scp::upload(
                shell_input,
                Path::new(&transfer.source),
                &transfer.destination,
            )
            .await?;
        }
        TransferDirection::Download => {
            let local = remote
                .fetch(&transfer.source, &transfer.destination)
                .await?;
            tracing::debug!(path = %local.display(), "download saved");

            let mut pipe = shell_input.lock().await;
            pipe.write_all(&[CTRL_C])
                .await
                .map_err(scp::Error::ShellInput)?;
            pipe.flush().await.map_err(scp::Error::ShellInput)?;
        }
    }
    Ok(())
}

/// Start the detached tasks that live until the shell exits.
///
/// - stdin forwarding ends on input EOF or error and closes the shell;
/// - resize watching ends when the terminal size cannot be read;
/// - keepalives end when the connection no longer accepts requests.
///
/// None of them are joined; they end with the channel or the process.
fn spawn_background_tasks(
    shell_input: &Arc<Mutex<ShellInput>>,
    control: &Arc<ShellControl>,
    size: TerminalSize,
) {
    tokio::spawn(forward_input_then_close(
        tokio::io::stdin(),
        Arc::clone(shell_input),
        Arc::clone(control),
    ));

    let resize = Arc::clone(control);
    tokio::spawn(async move {
        let exit = watch_resize(&*resize, size, terminal_size, RESIZE_POLL_INTERVAL).await;
        tracing::debug!(?exit, "resize watcher stopped");
    });

    let keepalive = Arc::clone(control);
    tokio::spawn(async move {
        let exit = send_keepalives(&*keepalive, KEEPALIVE_INTERVAL).await;
        tracing::debug!(?exit, "keepalive sender stopped");
    });
}

fn channel_messages(read_half: ChannelReadHalf) -> Pin<Box<dyn Stream<Item = ChannelMsg> + Send>> {
    Box::pin(futures::stream::unfold(read_half, |mut channel| async move {
        channel.wait().await.map(|msg| (msg, channel))
    }))
}

/// Control plane of the live shell: window changes, keepalives, close.
struct ShellControl {
    handle: Arc<Handle<AcceptAnyHostKey>>,
    channel: ChannelWriteHalf<client::Msg>,
}

#[async_trait]
impl ControlPlane for ShellControl {
    async fn window_change(&self, size: TerminalSize) -> Result<()> {
        self.channel
            .window_change(size.cols.into(), size.rows.into(), 0, 0)
            .await
            .map_err(Error::Protocol)
    }

    async fn keepalive(&self) -> Result<()> {
        self.handle
            .send_keepalive(false)
            .await
            .map_err(Error::Protocol)
    }

    async fn close(&self) -> Result<()> {
        self.channel.close().await.map_err(Error::Protocol)
    }
}
