// ABOUTME: SSH client module for the interactive transfer session.
// ABOUTME: Authentication, transport, terminal handling and session orchestration.

mod auth;
mod client;
mod error;
mod session;
mod tasks;
mod terminal;

pub use auth::{
    AuthMethod, Challenge, ChallengeResponder, KeyOutcome, TerminalResponder, authenticate,
    load_private_key, resolve_auth_methods,
};
pub use client::{
    AcceptAnyHostKey, Connection, ConnectionTarget, FALLBACK_CIPHERS, HANDSHAKE_TIMEOUT,
    cipher_preference,
};
pub use error::{Error, Result};
pub use session::{ShellInput, run_callbacks, run_scripted, run_session, run_transfer};
pub use tasks::{
    ControlPlane, KEEPALIVE_INTERVAL, RESIZE_POLL_INTERVAL, TaskExit, forward_input,
    forward_input_then_close, relay_output, send_keepalives, watch_resize,
};
pub use terminal::{BAUD_RATE, RawModeGuard, TERM, TerminalSize, pty_modes, terminal_size};
