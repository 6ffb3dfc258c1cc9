//! `PATH` resolution: first-match executable lookup and prefix enumeration
//! for completion.
//!
//! Both operations take the search path as a parameter rather than reading
//! the environment themselves, so callers stay testable; [`search_paths`]
//! fetches the process value for the real call sites.

use nix::unistd::{access, AccessFlags};
use std::env;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// The process `PATH`, or an empty string when unset.
pub fn search_paths() -> OsString {
    env::var_os("PATH").unwrap_or_default()
}

fn is_executable(path: &Path) -> bool {
    access(path, AccessFlags::X_OK).is_ok()
}

/// Returns the first `dir/name` along `search_paths` that grants execute
/// permission, in directory order. `None` when nothing matches.
///
/// Candidates are the literal `dir + "/" + name` concatenation, so an empty
/// component (a leading, trailing or doubled `:`) resolves against the
/// filesystem root rather than the current directory.
pub fn find_in_path(search_paths: &OsStr, name: &str) -> Option<PathBuf> {
    env::split_paths(search_paths)
        .map(|dir| {
            if dir.as_os_str().is_empty() {
                Path::new("/").join(name)
            } else {
                dir.join(name)
            }
        })
        .find(|candidate| is_executable(candidate))
}

/// Enumerates executable names starting with `prefix` across every readable
/// directory of `search_paths`.
///
/// `.` and `..` never appear; duplicates keep their first occurrence so a
/// shadowed binary is listed once, under the directory that wins lookup.
pub fn executables_with_prefix(search_paths: &OsStr, prefix: &str) -> Vec<String> {
    let mut names = Vec::new();
    for dir in env::split_paths(search_paths) {
        if dir.as_os_str().is_empty() {
            continue;
        }
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if !name.starts_with(prefix) {
                continue;
            }
            if !is_executable(&dir.join(&name)) {
                continue;
            }
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}
