// ABOUTME: Transfer-specific error types.
// ABOUTME: Each variant names the operation and path that failed.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to open local file {path}: {source}")]
    LocalOpen {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to create local file {path}: {source}")]
    LocalCreate {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to open remote file {path}: {source}")]
    RemoteOpen {
        path: String,
        source: russh_sftp::client::error::Error,
    },

    #[error("SFTP subsystem unavailable: {0}")]
    Subsystem(String),

    #[error("failed to copy {path}: {source}")]
    Copy {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to write to remote shell: {0}")]
    ShellInput(std::io::Error),

    #[error("upload task did not complete: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, Error>;
