// ABOUTME: Local terminal control for the interactive session.
// ABOUTME: Raw-mode guard, size lookup and PTY request parameters.

use crossterm::terminal;
use russh::Pty;
use std::io;

/// Terminal type requested for the remote PTY.
pub const TERM: &str = "xterm";

/// Baud-rate hint sent for both input and output speed.
pub const BAUD_RATE: u32 = 14400;

/// Terminal modes sent with the PTY request: echo on, fixed baud rate.
pub fn pty_modes() -> [(Pty, u32); 3] {
    [
        (Pty::ECHO, 1),
        (Pty::TTY_OP_ISPEED, BAUD_RATE),
        (Pty::TTY_OP_OSPEED, BAUD_RATE),
    ]
}

/// Terminal geometry in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalSize {
    pub cols: u16,
    pub rows: u16,
}

impl TerminalSize {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }
}

/// Current size of the controlling terminal.
pub fn terminal_size() -> io::Result<TerminalSize> {
    let (cols, rows) = terminal::size()?;
    Ok(TerminalSize { cols, rows })
}

/// Keeps the controlling terminal in raw mode until dropped.
#[derive(Debug)]
pub struct RawModeGuard {
    active: bool,
}

impl RawModeGuard {
    pub fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self { active: true })
    }

    /// Restore the original mode now instead of at drop.
    pub fn restore(mut self) -> io::Result<()> {
        self.active = false;
        terminal::disable_raw_mode()
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if self.active {
            if let Err(e) = terminal::disable_raw_mode() {
                tracing::warn!("failed to restore terminal mode: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pty_modes_enable_echo_and_fix_speed() {
        let modes = pty_modes();
        assert!(modes.iter().any(|(m, v)| matches!(m, Pty::ECHO) && *v == 1));
        assert!(
            modes
                .iter()
                .any(|(m, v)| matches!(m, Pty::TTY_OP_ISPEED) && *v == 14400)
        );
        assert!(
            modes
                .iter()
                .any(|(m, v)| matches!(m, Pty::TTY_OP_OSPEED) && *v == 14400)
        );
    }
}
