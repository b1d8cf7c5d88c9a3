// ABOUTME: SCP sink-side framing for uploads through the interactive shell.
// ABOUTME: Starts `scp -t` in the shell, then streams the control line, body and terminator.

use super::CTRL_C;
use super::error::{Error, Result};
use std::borrow::Cow;
use std::fs::Metadata;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

/// Upload `source` to `destination` by driving a remote `scp -t` receiver.
///
/// The frame is streamed from a separate task which is awaited before
/// returning, so nothing else is written to the shell while bytes are in
/// flight. Returns the number of content bytes sent.
pub async fn upload<W>(shell_input: &Arc<Mutex<W>>, source: &Path, destination: &str) -> Result<u64>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let local_open = |e: io::Error| Error::LocalOpen {
        path: source.to_path_buf(),
        source: e,
    };

    let file = tokio::fs::File::open(source).await.map_err(local_open)?;
    let metadata = file.metadata().await.map_err(local_open)?;
    if !metadata.is_file() {
        return Err(local_open(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a regular file",
        )));
    }
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| local_open(io::Error::new(io::ErrorKind::InvalidInput, "no file name")))?;
    let mode = permission_bits(&metadata);
    let size = metadata.len();

    tracing::info!(
        source = %source.display(),
        destination,
        size,
        "uploading file"
    );

    {
        let mut pipe = shell_input.lock().await;
        let command = format!("scp -t {}\r", shell_quote(destination));
        pipe.write_all(command.as_bytes())
            .await
            .map_err(Error::ShellInput)?;
        pipe.flush().await.map_err(Error::ShellInput)?;
    }

    let pipe = Arc::clone(shell_input);
    let streaming = tokio::spawn(async move {
        let mut pipe = pipe.lock().await;
        send_frame(&mut *pipe, mode, size, &name, file).await
    });

    let written = streaming.await?.map_err(|e| Error::Copy {
        path: source.display().to_string(),
        source: e,
    })?;

    tracing::info!(bytes = written, "upload complete");
    Ok(written)
}

/// Write one SCP file record followed by an interrupt.
///
/// The interrupt is sent even when the record could not be completed, so a
/// remote `scp -t` still waiting for bytes is stopped before anything else
/// reaches the shell. The frame error wins over an interrupt error.
pub async fn send_frame<W, R>(
    pipe: &mut W,
    mode: u32,
    size: u64,
    name: &str,
    contents: R,
) -> io::Result<u64>
where
    W: AsyncWrite + Unpin + ?Sized,
    R: AsyncRead + Unpin,
{
    let framed = write_frame(pipe, mode, size, name, contents).await;
    if let Err(e) = &framed {
        tracing::warn!(error = %e, "upload interrupted, stopping remote receiver");
    }

    let interrupted = interrupt(pipe).await;
    let written = framed?;
    interrupted?;
    Ok(written)
}

async fn interrupt<W: AsyncWrite + Unpin + ?Sized>(pipe: &mut W) -> io::Result<()> {
    pipe.write_all(&[CTRL_C]).await?;
    pipe.flush().await
}

/// Write one SCP file record: control line, exactly `size` bytes, then NUL.
pub async fn write_frame<W, R>(
    pipe: &mut W,
    mode: u32,
    size: u64,
    name: &str,
    contents: R,
) -> io::Result<u64>
where
    W: AsyncWrite + Unpin + ?Sized,
    R: AsyncRead + Unpin,
{
    pipe.write_all(control_line(mode, size, name).as_bytes())
        .await?;

    let mut body = contents.take(size);
    let copied = tokio::io::copy(&mut body, pipe).await?;
    if copied != size {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("source ended after {copied} of {size} bytes"),
        ));
    }

    pipe.write_all(&[0]).await?;
    Ok(copied)
}

/// `C<mode> <size> <name>\n` with the permission bits in four-digit octal.
pub fn control_line(mode: u32, size: u64, name: &str) -> String {
    format!("C{:04o} {} {}\n", mode & 0o777, size, name)
}

/// Quote a string so the remote shell passes it through as one word.
pub fn shell_quote(s: &str) -> String {
    shell_escape::unix::escape(Cow::Borrowed(s)).into_owned()
}

#[cfg(unix)]
fn permission_bits(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn permission_bits(metadata: &Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}
