// ABOUTME: SFTP-backed download of a single remote file.
// ABOUTME: Runs on its own channel, independent of the interactive shell.

use super::error::{Error, Result};
use async_trait::async_trait;
use russh::client::{Handle, Handler};
use russh_sftp::client::SftpSession;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncWriteExt};

/// Source of remote files for downloads.
#[async_trait]
pub trait RemoteFetch: Send + Sync {
    /// Copy `remote_path` into `destination_dir`, returning the local path.
    async fn fetch(&self, remote_path: &str, destination_dir: &str) -> Result<PathBuf>;
}

#[async_trait]
impl<H: Handler> RemoteFetch for Handle<H> {
    async fn fetch(&self, remote_path: &str, destination_dir: &str) -> Result<PathBuf> {
        download(self, remote_path, destination_dir).await
    }
}

/// Copy `remote_path` to `destination_dir` + its base name.
///
/// `destination_dir` is a plain string prefix, not joined with a separator.
/// A partially written local file is left in place on failure.
pub async fn download<H: Handler>(
    handle: &Handle<H>,
    remote_path: &str,
    destination_dir: &str,
) -> Result<PathBuf> {
    tracing::info!("new sftp client");
    let channel = handle
        .channel_open_session()
        .await
        .map_err(|e| Error::Subsystem(format!("failed to open channel: {e}")))?;
    channel
        .request_subsystem(true, "sftp")
        .await
        .map_err(|e| Error::Subsystem(format!("subsystem request rejected: {e}")))?;
    let sftp = SftpSession::new(channel.into_stream())
        .await
        .map_err(|e| Error::Subsystem(e.to_string()))?;

    let result = fetch_file(&sftp, remote_path, destination_dir).await;

    if let Err(e) = sftp.close().await {
        tracing::debug!(error = %e, "failed to close sftp session");
    }
    result
}

async fn fetch_file(sftp: &SftpSession, remote_path: &str, destination_dir: &str) -> Result<PathBuf> {
    tracing::info!(path = remote_path, "sftp open file");
    let mut remote = sftp
        .open(remote_path)
        .await
        .map_err(|e| Error::RemoteOpen {
            path: remote_path.to_string(),
            source: e,
        })?;

    let local = local_destination(destination_dir, remote_path);
    tracing::info!(path = %local.display(), "create file in local");
    let bytes = save_to(&mut remote, &local).await?;

    if let Err(e) = remote.shutdown().await {
        tracing::debug!(error = %e, "failed to close remote file");
    }

    tracing::info!(bytes, "download file success");
    Ok(local)
}

/// Create or truncate `path` and fill it from `reader`.
pub async fn save_to<R>(reader: &mut R, path: &Path) -> Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| Error::LocalCreate {
            path: path.to_path_buf(),
            source: e,
        })?;

    let copy_error = |e: std::io::Error| Error::Copy {
        path: path.display().to_string(),
        source: e,
    };
    let bytes = tokio::io::copy(reader, &mut file).await.map_err(copy_error)?;
    file.flush().await.map_err(copy_error)?;
    Ok(bytes)
}

/// Local target for a download: the directory prefix followed by the remote base name.
pub fn local_destination(destination_dir: &str, remote_path: &str) -> PathBuf {
    PathBuf::from(format!("{destination_dir}{}", remote_base_name(remote_path)))
}

/// Last element of a slash-separated remote path.
///
/// Trailing slashes are ignored; an empty path is `.` and a path of only
/// slashes is `/`.
pub fn remote_base_name(remote_path: &str) -> &str {
    if remote_path.is_empty() {
        return ".";
    }
    let trimmed = remote_path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/";
    }
    match trimmed.rfind('/') {
        Some(pos) => &trimmed[pos + 1..],
        None => trimmed,
    }
}
