//! Terminal mode control: a captured cooked state and a scoped raw guard.
//!
//! The driver owns all transitions. Raw mode (no canonical input, no echo)
//! is installed only while the line editor is reading; the guard restores
//! the captured state on drop, so every exit path out of the read puts the
//! terminal back together.

use nix::sys::termios::{self, LocalFlags, SetArg, Termios};
use std::io;

/// The terminal attributes captured at startup.
pub struct TerminalModes {
    original: Termios,
}

impl TerminalModes {
    /// Captures the current attributes of standard input. `None` when stdin
    /// is not a terminal; the shell then runs cooked end to end, which keeps
    /// it usable under harnesses that feed it through a pipe.
    pub fn capture() -> Option<Self> {
        let original = termios::tcgetattr(io::stdin()).ok()?;
        Some(Self { original })
    }

    /// Installs the derived raw state and returns the guard that undoes it.
    pub fn raw_guard(&self) -> Option<RawModeGuard> {
        let mut raw = self.original.clone();
        raw.local_flags
            .remove(LocalFlags::ICANON | LocalFlags::ECHO);
        termios::tcsetattr(io::stdin(), SetArg::TCSANOW, &raw).ok()?;
        Some(RawModeGuard {
            original: self.original.clone(),
        })
    }
}

/// Restores the captured cooked state when dropped.
pub struct RawModeGuard {
    original: Termios,
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = termios::tcsetattr(io::stdin(), SetArg::TCSANOW, &self.original);
    }
}
