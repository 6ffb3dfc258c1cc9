//! The command history buffer and its file persistence.
//!
//! Entries live in memory in arrival order. The `last_written` cursor marks
//! the boundary between entries already persisted and entries still pending,
//! which is what makes `history -a` emit only the new tail. File formats are
//! deliberately dumb: one entry per line, no escaping, blank lines skipped on
//! the way in.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

#[derive(Debug, Default)]
pub struct History {
    entries: Vec<String>,
    last_written: usize,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one input line. Empty lines are not history.
    pub fn append(&mut self, line: &str) {
        if !line.is_empty() {
            self.entries.push(line.to_string());
        }
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|s| s.as_str())
    }

    /// Appends the file's non-blank lines to the buffer. Entries read this
    /// way count as already persisted. A file that cannot be opened leaves
    /// the buffer untouched.
    pub fn read_from_file(&mut self, path: &Path) -> io::Result<()> {
        let file = File::open(path)?;
        for line in BufReader::new(file).lines() {
            let line = line?;
            if !line.is_empty() {
                self.entries.push(line);
            }
        }
        self.last_written = self.entries.len();
        Ok(())
    }

    /// Rewrites the file with the full buffer, one entry per line.
    pub fn overwrite_file(&mut self, path: &Path) -> io::Result<()> {
        let mut file = File::create(path)?;
        for entry in &self.entries {
            writeln!(file, "{}", entry)?;
        }
        self.last_written = self.entries.len();
        Ok(())
    }

    /// Persists the whole buffer at shell exit. The same full rewrite as
    /// [`overwrite_file`](Self::overwrite_file); the cursor advances for
    /// symmetry even though nothing reads it afterwards.
    pub fn save(&mut self, path: &Path) -> io::Result<()> {
        self.overwrite_file(path)
    }

    /// Appends only the entries recorded since the last write to `path`.
    pub fn append_to_file(&mut self, path: &Path) -> io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        for entry in &self.entries[self.last_written..] {
            writeln!(file, "{}", entry)?;
        }
        self.last_written = self.entries.len();
        Ok(())
    }
}
