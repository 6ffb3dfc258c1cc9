//! Command-name completion: candidate discovery and common-prefix math.
//!
//! Candidates are built-in names plus executables found on `PATH`. The set is
//! deduplicated in first-seen order (built-ins win over binaries of the same
//! name, earlier `PATH` directories over later ones); sorting is left to the
//! display code in the line editor.

use crate::builtin;
use crate::path;
use std::ffi::OsString;

pub struct Completer {
    search_paths: OsString,
}

impl Completer {
    pub fn new(search_paths: OsString) -> Self {
        Self { search_paths }
    }

    pub fn from_env() -> Self {
        Self::new(path::search_paths())
    }

    /// All command names starting with `prefix`.
    pub fn candidates(&self, prefix: &str) -> Vec<String> {
        let mut names: Vec<String> = builtin::NAMES
            .iter()
            .filter(|name| name.starts_with(prefix))
            .map(|name| name.to_string())
            .collect();
        for name in path::executables_with_prefix(&self.search_paths, prefix) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

/// The longest byte string that is a prefix of every candidate. Empty input
/// yields the empty string.
pub fn longest_common_prefix(candidates: &[String]) -> String {
    let Some(first) = candidates.first() else {
        return String::new();
    };
    let mut prefix = first.as_bytes();
    for candidate in &candidates[1..] {
        let bytes = candidate.as_bytes();
        let common = prefix
            .iter()
            .zip(bytes)
            .take_while(|(a, b)| a == b)
            .count();
        prefix = &prefix[..common];
        if prefix.is_empty() {
            break;
        }
    }
    String::from_utf8_lossy(prefix).into_owned()
}
