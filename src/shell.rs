//! The interactive driver: prompt, read, tokenize, parse, execute, repeat.
//!
//! The driver owns the history store and the terminal transitions. Raw mode
//! lives only across the read; execution always happens with the terminal
//! cooked. `exit` is a normal return value of the loop, not an unwinding
//! mechanism.

use crate::builtin;
use crate::completion::Completer;
use crate::editor::{LineEditor, PROMPT};
use crate::executor;
use crate::history::History;
use crate::lexer;
use crate::parser;
use crate::term::TerminalModes;
use log::{debug, warn};
use std::env;
use std::io::{self, Write};
use std::path::PathBuf;

pub struct Shell {
    history: History,
    histfile: Option<PathBuf>,
}

impl Shell {
    /// Reads `HISTFILE` once and loads any persisted history from it. An
    /// unset variable or an unreadable file just means starting empty.
    pub fn new() -> Self {
        let histfile = env::var_os("HISTFILE").map(PathBuf::from);
        let mut history = History::new();
        if let Some(path) = &histfile {
            match history.read_from_file(path) {
                Ok(()) => debug!(
                    "loaded {} history entries from {}",
                    history.len(),
                    path.display()
                ),
                Err(e) => debug!("no history loaded from {}: {}", path.display(), e),
            }
        }
        Self { history, histfile }
    }

    /// Drives the loop until `exit`. The return value is the process exit
    /// code.
    pub fn run(&mut self) -> i32 {
        let terminal = TerminalModes::capture();
        if terminal.is_none() {
            debug!("stdin is not a terminal; running without raw mode");
        }

        loop {
            self.show_prompt();
            let line = self.read_line(terminal.as_ref());
            if line.is_empty() {
                continue;
            }
            self.history.append(&line);

            let tokens = lexer::split_into_tokens(&line);
            if tokens.is_empty() {
                continue;
            }
            if tokens[0] == "exit" {
                let code = builtin::parse_exit_code(&tokens[1..]);
                self.persist_history();
                return code;
            }

            let pipeline = parser::parse(&tokens);
            executor::execute(&pipeline, &mut self.history);
        }
    }

    fn show_prompt(&self) {
        let mut out = io::stdout();
        let _ = out.write_all(PROMPT.as_bytes());
        let _ = out.flush();
    }

    /// Reads one line with raw mode held for exactly the duration of the
    /// read; the guard drops before execution.
    fn read_line(&self, terminal: Option<&TerminalModes>) -> String {
        let _raw = terminal.and_then(TerminalModes::raw_guard);
        let completer = Completer::from_env();
        let stdin = io::stdin();
        let stdout = io::stdout();
        let editor = LineEditor::new(stdin.lock(), stdout.lock(), &self.history, &completer);
        match editor.read_line() {
            Ok(line) => line,
            Err(e) => {
                warn!("reading input failed: {}", e);
                String::new()
            }
        }
    }

    fn persist_history(&mut self) {
        let Some(path) = self.histfile.clone() else {
            return;
        };
        if let Err(e) = self.history.save(&path) {
            warn!("could not write history to {}: {}", path.display(), e);
        }
    }
}

impl Default for Shell {
    fn default() -> Self {
        Self::new()
    }
}
