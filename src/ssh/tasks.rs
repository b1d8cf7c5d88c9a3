// ABOUTME: Detached tasks that run alongside the interactive shell.
// ABOUTME: Stdin forwarding, resize watching, keepalives and output relaying, each with a defined exit.

use super::error::Result;
use super::terminal::TerminalSize;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use russh::ChannelMsg;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

pub const RESIZE_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(10);

/// Control-plane messages on the shell's channel and connection.
///
/// None of these touch the shell's data stream.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Report a new terminal geometry.
    async fn window_change(&self, size: TerminalSize) -> Result<()>;

    /// Send `keepalive@openssh.com` without asking for a reply.
    async fn keepalive(&self) -> Result<()>;

    /// Close the shell channel.
    async fn close(&self) -> Result<()>;
}

/// Why a background task stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskExit {
    /// Local input reached end of file.
    InputClosed,
    /// Reading local input failed.
    InputFailed,
    /// Writing to the shell's input failed.
    ShellClosed,
    /// The terminal size could not be read.
    TerminalGone,
    /// A control message could not be sent.
    ControlFailed,
}

/// Copy `input` into the shell until input closes or either side fails.
pub async fn forward_input<R, W>(mut input: R, shell_input: &Mutex<W>) -> TaskExit
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; 8192];
    loop {
        let n = match input.read(&mut buf).await {
            Ok(0) => return TaskExit::InputClosed,
            Ok(n) => n,
            Err(e) => {
                tracing::debug!(error = %e, "reading local input failed");
                return TaskExit::InputFailed;
            }
        };

        let mut pipe = shell_input.lock().await;
        if let Err(e) = write_chunk(&mut *pipe, &buf[..n]).await {
            tracing::debug!(error = %e, "writing to shell failed");
            return TaskExit::ShellClosed;
        }
    }
}

async fn write_chunk<W: AsyncWrite + Unpin + ?Sized>(pipe: &mut W, chunk: &[u8]) -> io::Result<()> {
    pipe.write_all(chunk).await?;
    pipe.flush().await
}

/// Forward input, then close the shell: the user is done once input ends.
pub async fn forward_input_then_close<R, W, C>(
    input: R,
    shell_input: Arc<Mutex<W>>,
    control: Arc<C>,
) -> TaskExit
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    C: ControlPlane + ?Sized,
{
    let exit = forward_input(input, &shell_input).await;
    tracing::debug!(?exit, "stdin forwarding stopped, closing session");
    if let Err(e) = control.close().await {
        tracing::debug!(error = %e, "failed to close shell channel");
    }
    exit
}

/// Poll the terminal size and report every change.
///
/// Stops when reading the size fails (terminal gone) or the message cannot be sent.
pub async fn watch_resize<C, P>(
    control: &C,
    initial: TerminalSize,
    mut read_size: P,
    period: Duration,
) -> TaskExit
where
    C: ControlPlane + ?Sized,
    P: FnMut() -> io::Result<TerminalSize> + Send,
{
    let mut current = initial;
    loop {
        let size = match read_size() {
            Ok(size) => size,
            Err(_) => return TaskExit::TerminalGone,
        };

        if size != current {
            if let Err(e) = control.window_change(size).await {
                tracing::debug!(error = %e, "window change failed");
                return TaskExit::ControlFailed;
            }
            current = size;
        }

        tokio::time::sleep(period).await;
    }
}

/// Send a keepalive every `period` until sending fails.
pub async fn send_keepalives<C>(control: &C, period: Duration) -> TaskExit
where
    C: ControlPlane + ?Sized,
{
    loop {
        tokio::time::sleep(period).await;
        if let Err(e) = control.keepalive().await {
            tracing::debug!(error = %e, "keepalive failed");
            return TaskExit::ControlFailed;
        }
    }
}

/// Write remote output to the local terminal until the channel closes.
///
/// Returns the shell's exit status when the server reported one.
pub async fn relay_output<S, O, E>(mut messages: S, mut stdout: O, mut stderr: E) -> Option<u32>
where
    S: Stream<Item = ChannelMsg> + Unpin,
    O: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    let mut exit_status = None;
    let mut local_open = true;

    while let Some(msg) = messages.next().await {
        match msg {
            ChannelMsg::Data { ref data } if local_open => {
                local_open = write_chunk(&mut stdout, data).await.is_ok();
            }
            ChannelMsg::ExtendedData { ref data, ext: 1 } if local_open => {
                local_open = write_chunk(&mut stderr, data).await.is_ok();
            }
            ChannelMsg::ExitStatus { exit_status: code } => exit_status = Some(code),
            ChannelMsg::Close => break,
            _ => {}
        }
    }

    exit_status
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Recorder {
        resizes: std::sync::Mutex<Vec<TerminalSize>>,
        keepalives: AtomicUsize,
        closes: AtomicUsize,
        fail_keepalive_after: Option<usize>,
    }

    #[async_trait]
    impl ControlPlane for Recorder {
        async fn window_change(&self, size: TerminalSize) -> Result<()> {
            self.resizes.lock().unwrap().push(size);
            Ok(())
        }

        async fn keepalive(&self) -> Result<()> {
            let sent = self.keepalives.fetch_add(1, Ordering::SeqCst) + 1;
            match self.fail_keepalive_after {
                Some(limit) if sent > limit => {
                    Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone").into())
                }
                _ => Ok(()),
            }
        }

        async fn close(&self) -> Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn input_eof_closes_session() {
        let control = Arc::new(Recorder::default());
        let shell_input = Arc::new(Mutex::new(Vec::new()));

        let exit =
            forward_input_then_close(&b"ls -la\r"[..], Arc::clone(&shell_input), Arc::clone(&control))
                .await;

        assert_eq!(exit, TaskExit::InputClosed);
        assert_eq!(&*shell_input.lock().await, b"ls -la\r");
        assert_eq!(control.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn resize_reports_only_changes() {
        let control = Recorder::default();
        let initial = TerminalSize::new(80, 24);
        let mut sizes = vec![
            Ok(TerminalSize::new(80, 24)),
            Ok(TerminalSize::new(120, 40)),
            Ok(TerminalSize::new(120, 40)),
            Ok(TerminalSize::new(100, 30)),
            Err(io::Error::other("no tty")),
        ]
        .into_iter();

        let exit = watch_resize(
            &control,
            initial,
            move || sizes.next().unwrap_or_else(|| Err(io::Error::other("done"))),
            Duration::from_millis(1),
        )
        .await;

        assert_eq!(exit, TaskExit::TerminalGone);
        assert_eq!(
            *control.resizes.lock().unwrap(),
            vec![TerminalSize::new(120, 40), TerminalSize::new(100, 30)]
        );
    }

    #[tokio::test]
    async fn keepalives_stop_when_connection_fails() {
        let control = Recorder {
            fail_keepalive_after: Some(2),
            ..Default::default()
        };

        let exit = send_keepalives(&control, Duration::from_millis(1)).await;

        assert_eq!(exit, TaskExit::ControlFailed);
        assert_eq!(control.keepalives.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn relay_returns_exit_status_on_close() {
        let messages = futures::stream::iter(vec![
            ChannelMsg::ExitStatus { exit_status: 3 },
            ChannelMsg::Eof,
            ChannelMsg::Close,
        ]);

        let status = relay_output(messages, tokio::io::sink(), tokio::io::sink()).await;

        assert_eq!(status, Some(3));
    }
}
