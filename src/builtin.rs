//! Shell built-ins: commands executed inside the shell process itself.
//!
//! A [`Builtin`] is a closed enum rather than a string compared at call
//! sites, so the executor can branch once on "builtin or external" and the
//! completion engine can enumerate names. The dispatcher writes through
//! caller-supplied handles: the real stdout/stderr in the shell (possibly
//! redirected at the descriptor level), plain buffers in tests.

use crate::history::History;
use crate::path;
use anyhow::Result;
use std::env;
use std::ffi::OsStr;
use std::io::Write;
use std::path::Path;

/// All built-in names, in the order they are advertised to completion.
pub const NAMES: [&str; 6] = ["echo", "exit", "type", "pwd", "cd", "history"];

/// A command implemented by the shell rather than by spawning a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Echo,
    Exit,
    Type,
    Pwd,
    Cd,
    History,
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "echo" => Some(Self::Echo),
            "exit" => Some(Self::Exit),
            "type" => Some(Self::Type),
            "pwd" => Some(Self::Pwd),
            "cd" => Some(Self::Cd),
            "history" => Some(Self::History),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Echo => "echo",
            Self::Exit => "exit",
            Self::Type => "type",
            Self::Pwd => "pwd",
            Self::Cd => "cd",
            Self::History => "history",
        }
    }

    /// Runs the built-in with `argv[0]` being the command name itself.
    ///
    /// `exit` is a no-op here: the driver intercepts it before dispatch, and
    /// inside a pipeline an `exit` stage is just a child that quits quietly.
    pub fn run(
        self,
        argv: &[String],
        history: &mut History,
        search_paths: &OsStr,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> Result<()> {
        match self {
            Self::Echo => {
                let args: Vec<&str> = argv.iter().skip(1).map(|s| s.as_str()).collect();
                writeln!(out, "{}", args.join(" "))?;
            }
            Self::Exit => {}
            Self::Type => run_type(argv, search_paths, out)?,
            Self::Pwd => {
                writeln!(out, "{}", env::current_dir()?.display())?;
            }
            Self::Cd => run_cd(argv, err)?,
            Self::History => run_history(argv, history, out)?,
        }
        Ok(())
    }
}

fn run_type(argv: &[String], search_paths: &OsStr, out: &mut dyn Write) -> Result<()> {
    let Some(name) = argv.get(1) else {
        return Ok(());
    };
    if Builtin::from_name(name).is_some() {
        writeln!(out, "{} is a shell builtin", name)?;
    } else if let Some(found) = path::find_in_path(search_paths, name) {
        writeln!(out, "{} is {}", name, found.display())?;
    } else {
        writeln!(out, "{}: not found", name)?;
    }
    Ok(())
}

fn run_cd(argv: &[String], err: &mut dyn Write) -> Result<()> {
    let target = match argv.get(1) {
        Some(arg) if arg != "~" => arg.clone(),
        _ => env::var("HOME").unwrap_or_default(),
    };
    if env::set_current_dir(&target).is_err() {
        writeln!(err, "cd: {}: No such file or directory", target)?;
    }
    Ok(())
}

fn run_history(argv: &[String], history: &mut History, out: &mut dyn Write) -> Result<()> {
    if argv.len() >= 3 {
        let file = Path::new(&argv[2]);
        // File trouble is tolerated silently.
        match argv[1].as_str() {
            "-r" => {
                let _ = history.read_from_file(file);
            }
            "-w" => {
                let _ = history.overwrite_file(file);
            }
            "-a" => {
                let _ = history.append_to_file(file);
            }
            _ => {}
        }
        return Ok(());
    }

    let count = history.len();
    let mut start = 0;
    if let Some(arg) = argv.get(1) {
        if let Ok(n) = arg.parse::<usize>() {
            if n > 0 && n < count {
                start = count - n;
            }
        }
    }
    for i in start..count {
        if let Some(entry) = history.get(i) {
            writeln!(out, "    {}  {}", i + 1, entry)?;
        }
    }
    Ok(())
}

/// Parses the argument of `exit`: a non-negative integer, anything else
/// (including nothing) meaning 0.
pub fn parse_exit_code(args: &[String]) -> i32 {
    args.first()
        .and_then(|s| s.parse::<i32>().ok())
        .filter(|code| *code >= 0)
        .unwrap_or(0)
}
