// ABOUTME: SSH-specific error types.
// ABOUTME: Covers connection, authentication, channel and terminal failures.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("SSH handshake with {address} timed out after {timeout:?}")]
    HandshakeTimeout { address: String, timeout: Duration },

    #[error("authentication failed for {user}@{address}: no method succeeded")]
    AuthenticationFailed { user: String, address: String },

    #[error("failed to load key from {path}: {reason}")]
    KeyLoadFailed { path: PathBuf, reason: String },

    #[error("failed to answer keyboard-interactive challenge: {0}")]
    Challenge(std::io::Error),

    #[error("channel request failed: {0}")]
    Channel(String),

    #[error("terminal error: {0}")]
    Terminal(std::io::Error),

    #[error("SSH protocol error: {0}")]
    Protocol(#[from] russh::Error),

    #[error("SSH key error: {0}")]
    Key(#[from] russh::keys::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
