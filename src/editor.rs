//! The raw-mode line editor: echoing, backspace, history navigation on the
//! arrow keys, and double-tab command completion.
//!
//! The editor assumes the terminal delivers bytes one at a time without
//! echo (see [`crate::term`]) and paints everything itself. It is generic
//! over its IO so tests can drive a whole editing session from a byte
//! script and assert on the painted output.

use crate::completion::{self, Completer};
use crate::history::History;
use std::io::{self, Read, Write};

/// The shell prompt, also repainted by the editor after history navigation
/// and completion listings.
pub const PROMPT: &str = "$ ";

const BELL: &str = "\x07";
const CLEAR_TO_EOL: &str = "\x1b[K";

pub struct LineEditor<'a, R: Read, W: Write> {
    input: R,
    output: W,
    history: &'a History,
    completer: &'a Completer,
    buffer: String,
    /// `history.len()` means "past the end": editing a fresh line.
    history_index: usize,
    /// The fresh line as it was when navigation started.
    stash: String,
    consecutive_tabs: u8,
}

impl<'a, R: Read, W: Write> LineEditor<'a, R, W> {
    pub fn new(input: R, output: W, history: &'a History, completer: &'a Completer) -> Self {
        Self {
            input,
            output,
            history,
            completer,
            buffer: String::new(),
            history_index: history.len(),
            stash: String::new(),
            consecutive_tabs: 0,
        }
    }

    /// Reads one logical line, ending at Enter or end of input. EOF is not
    /// an error: whatever accumulated comes back.
    pub fn read_line(mut self) -> io::Result<String> {
        while let Some(byte) = self.next_byte() {
            match byte {
                b'\n' => {
                    self.emit("\n")?;
                    break;
                }
                0x7f | 0x08 => self.handle_backspace()?,
                0x1b => self.handle_escape()?,
                b'\t' => self.handle_tab()?,
                0x20..=0x7e => self.handle_printable(byte)?,
                _ => self.consecutive_tabs = 0,
            }
        }
        Ok(self.buffer)
    }

    fn next_byte(&mut self) -> Option<u8> {
        let mut byte = [0u8; 1];
        match self.input.read(&mut byte) {
            Ok(1) => Some(byte[0]),
            _ => None,
        }
    }

    fn emit(&mut self, text: &str) -> io::Result<()> {
        self.output.write_all(text.as_bytes())?;
        self.output.flush()
    }

    fn handle_printable(&mut self, byte: u8) -> io::Result<()> {
        self.buffer.push(byte as char);
        self.reset_navigation();
        self.consecutive_tabs = 0;
        let echo = [byte];
        self.output.write_all(&echo)?;
        self.output.flush()
    }

    fn handle_backspace(&mut self) -> io::Result<()> {
        if !self.buffer.is_empty() {
            self.buffer.pop();
            self.emit("\x08 \x08")?;
        }
        self.reset_navigation();
        self.consecutive_tabs = 0;
        Ok(())
    }

    /// `ESC [ code`: up/down navigate history, anything else is swallowed.
    fn handle_escape(&mut self) -> io::Result<()> {
        self.consecutive_tabs = 0;
        let Some(second) = self.next_byte() else {
            return Ok(());
        };
        let Some(code) = self.next_byte() else {
            return Ok(());
        };
        if second == b'[' && (code == b'A' || code == b'B') {
            self.handle_arrow(code)?;
        }
        Ok(())
    }

    fn handle_arrow(&mut self, code: u8) -> io::Result<()> {
        if self.history.is_empty() {
            return Ok(());
        }
        let len = self.history.len();
        match code {
            b'A' => {
                if self.history_index > 0 {
                    if self.history_index == len {
                        self.stash = self.buffer.clone();
                    }
                    self.history_index -= 1;
                    self.buffer = self.entry_at(self.history_index);
                }
            }
            _ => {
                if self.history_index < len - 1 {
                    self.history_index += 1;
                    self.buffer = self.entry_at(self.history_index);
                } else if self.history_index == len - 1 {
                    // Back past the newest entry: the fresh line returns.
                    self.history_index = len;
                    self.buffer = std::mem::take(&mut self.stash);
                }
            }
        }
        self.redraw()
    }

    fn entry_at(&self, index: usize) -> String {
        self.history.get(index).unwrap_or_default().to_string()
    }

    fn reset_navigation(&mut self) {
        self.history_index = self.history.len();
        self.stash.clear();
    }

    fn redraw(&mut self) -> io::Result<()> {
        let line = format!("\r{}{}{}", PROMPT, CLEAR_TO_EOL, self.buffer);
        self.emit(&line)
    }

    /// Completion applies to the command position only: a buffer that
    /// already contains a space, or nothing at all, leaves Tab inert.
    fn handle_tab(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() || self.buffer.contains(' ') {
            return Ok(());
        }
        let prefix = self.buffer.clone();
        let candidates = self.completer.candidates(&prefix);
        match candidates.len() {
            0 => {
                self.emit(BELL)?;
                self.consecutive_tabs = 0;
            }
            1 => {
                let completion = format!("{} ", &candidates[0][prefix.len()..]);
                self.buffer.push_str(&completion);
                self.emit(&completion)?;
                self.consecutive_tabs = 0;
            }
            _ => {
                let lcp = completion::longest_common_prefix(&candidates);
                if lcp.len() > prefix.len() {
                    let extension = lcp[prefix.len()..].to_string();
                    self.buffer.push_str(&extension);
                    self.emit(&extension)?;
                } else {
                    self.emit(BELL)?;
                }
                self.consecutive_tabs += 1;
                if self.consecutive_tabs == 2 {
                    self.list_candidates(&candidates)?;
                    self.consecutive_tabs = 0;
                }
            }
        }
        Ok(())
    }

    fn list_candidates(&mut self, candidates: &[String]) -> io::Result<()> {
        let mut sorted = candidates.to_vec();
        sorted.sort();
        let listing = format!("\n{}\n{}{}", sorted.join("  "), PROMPT, self.buffer);
        self.emit(&listing)
    }
}
