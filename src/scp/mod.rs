// ABOUTME: Single-file transfer engine.
// ABOUTME: Uploads use hand-framed SCP over the shell's stdin, downloads use SFTP.

mod download;
mod error;
mod upload;

pub use download::{RemoteFetch, download, local_destination, remote_base_name, save_to};
pub use error::{Error, Result};
pub use upload::{control_line, send_frame, shell_quote, upload, write_frame};

/// Interrupt byte written to the shell to get back to a prompt.
pub const CTRL_C: u8 = 0x03;

/// Which side the file is copied from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    /// Local file to remote path, framed as SCP on the shell's input.
    Upload,
    /// Remote file into a local directory prefix, over SFTP.
    Download,
}

/// The one file transfer performed per invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub direction: TransferDirection,
    pub source: String,
    pub destination: String,
}

impl Transfer {
    pub fn upload(local_source: impl Into<String>, remote_destination: impl Into<String>) -> Self {
        Self {
            direction: TransferDirection::Upload,
            source: local_source.into(),
            destination: remote_destination.into(),
        }
    }

    /// `local_directory` is used as a plain prefix; callers supply the trailing separator.
    pub fn download(remote_source: impl Into<String>, local_directory: impl Into<String>) -> Self {
        Self {
            direction: TransferDirection::Download,
            source: remote_source.into(),
            destination: local_directory.into(),
        }
    }
}
