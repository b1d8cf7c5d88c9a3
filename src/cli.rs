// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Selects exactly one download or upload pair.

use clap::{ArgGroup, Parser};
use scpe::scp::Transfer;

#[derive(Parser)]
#[command(name = "scpe")]
#[command(about = "scp client enhanced for automatic execute command you want")]
#[command(version)]
#[command(group(
    ArgGroup::new("direction")
        .required(true)
        .args(["from_server", "from_local"])
))]
pub struct Cli {
    /// Remote file to download (requires --to-local)
    #[arg(
        long,
        alias = "fromServer",
        value_name = "REMOTE_FILE",
        requires = "to_local",
        conflicts_with_all = ["from_local", "to_server"]
    )]
    pub from_server: Option<String>,

    /// Local directory prefix to download into, including the trailing separator
    #[arg(long, alias = "toLocal", value_name = "LOCAL_DIR", requires = "from_server")]
    pub to_local: Option<String>,

    /// Local file to upload (requires --to-server)
    #[arg(
        long,
        alias = "fromLocal",
        value_name = "LOCAL_FILE",
        requires = "to_server",
        conflicts_with_all = ["from_server", "to_local"]
    )]
    pub from_local: Option<String>,

    /// Remote path to upload to
    #[arg(long, alias = "toServer", value_name = "REMOTE_PATH", requires = "from_local")]
    pub to_server: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// The transfer selected by the flags, if a complete pair was given.
    pub fn transfer(&self) -> Option<Transfer> {
        match (&self.from_server, &self.to_local, &self.from_local, &self.to_server) {
            (Some(remote), Some(local), None, None) => {
                Some(Transfer::download(remote.clone(), local.clone()))
            }
            (None, None, Some(local), Some(remote)) => {
                Some(Transfer::upload(local.clone(), remote.clone()))
            }
            _ => None,
        }
    }
}
