//! Pipeline execution: descriptor plumbing, child construction and reaping.
//!
//! Two paths share the dispatch logic but differ in where commands run. A
//! single stage executes built-ins in the shell process itself, with
//! redirections installed on the real descriptors and undone afterwards. A
//! multi-stage pipeline forks one child per stage, built-in or not, wired
//! through anonymous pipes created up front.
//!
//! The descriptor invariant both paths maintain: every `dup2` that installs
//! a redirection is paired with a restore before control returns to the
//! prompt, and every pipe end is closed in the parent and in every child
//! that does not own it.

use crate::builtin::Builtin;
use crate::history::History;
use crate::parser::{Pipeline, RedirMode, Redirect, Stage};
use crate::path;
use log::{debug, warn};
use nix::sys::wait::waitpid;
use nix::unistd::{self, dup, dup2, fork, pipe, ForkResult, Pid};
use std::ffi::{CString, OsStr};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::process;

/// Runs a parsed pipeline to completion, using the process `PATH` for
/// command lookup. All children are reaped before this returns.
pub fn execute(pipeline: &Pipeline, history: &mut History) {
    execute_with_paths(pipeline, history, &path::search_paths());
}

/// As [`execute`], with the lookup path injected (tests point this at a
/// scratch directory).
pub fn execute_with_paths(pipeline: &Pipeline, history: &mut History, search_paths: &OsStr) {
    match pipeline.stages.as_slice() {
        [] => {}
        [stage] => run_single(stage, history, search_paths),
        stages => run_pipeline(stages, history, search_paths),
    }
}

/// Scoped descriptor swap: remembers the current occupant of `target_fd`
/// via `dup`, installs `file` over it, and puts the original back on drop.
struct RedirGuard {
    target_fd: RawFd,
    saved_fd: RawFd,
}

impl RedirGuard {
    fn install(target_fd: RawFd, file: File) -> nix::Result<Self> {
        let saved_fd = dup(target_fd)?;
        if let Err(e) = dup2(file.as_raw_fd(), target_fd) {
            let _ = unistd::close(saved_fd);
            return Err(e);
        }
        // `file` drops here; the duplicate on `target_fd` stays open.
        Ok(Self {
            target_fd,
            saved_fd,
        })
    }
}

impl Drop for RedirGuard {
    fn drop(&mut self) {
        let _ = dup2(self.saved_fd, self.target_fd);
        let _ = unistd::close(self.saved_fd);
    }
}

fn open_redirect(redirect: &Redirect) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).mode(0o644);
    match redirect.mode {
        RedirMode::Truncate => options.truncate(true),
        RedirMode::Append => options.append(true),
    };
    options.open(&redirect.path)
}

fn run_single(stage: &Stage, history: &mut History, search_paths: &OsStr) {
    if stage.words.is_empty() {
        return;
    }

    let mut guards = Vec::new();
    let mut failed = false;
    for (fd, redirect) in [(1, stage.stdout.as_ref()), (2, stage.stderr.as_ref())] {
        let Some(redirect) = redirect else { continue };
        match open_redirect(redirect) {
            Ok(file) => match RedirGuard::install(fd, file) {
                Ok(guard) => guards.push(guard),
                Err(e) => {
                    warn!("installing redirection to {} failed: {}", redirect.path, e);
                    failed = true;
                }
            },
            Err(_) => {
                let _ = writeln!(io::stderr(), "Error opening file: {}", redirect.path);
                failed = true;
            }
        }
    }

    if !failed {
        dispatch_single(stage, history, search_paths);
    }
    // Guards drop here, restoring the saved descriptors on every path.
}

fn dispatch_single(stage: &Stage, history: &mut History, search_paths: &OsStr) {
    match Builtin::from_name(&stage.words[0]) {
        Some(builtin) => {
            let result = builtin.run(
                &stage.words,
                history,
                search_paths,
                &mut io::stdout(),
                &mut io::stderr(),
            );
            if let Err(e) = result {
                warn!("builtin {} failed: {:#}", builtin.name(), e);
            }
            // Flush while the redirected descriptor is still installed.
            let _ = io::stdout().flush();
        }
        None => run_external(stage, search_paths),
    }
}

fn run_external(stage: &Stage, search_paths: &OsStr) {
    let name = &stage.words[0];
    let Some(program) = path::find_in_path(search_paths, name) else {
        // Lookup misses for a lone command go to standard output, which at
        // this point may well be a redirection target.
        let _ = writeln!(io::stdout(), "{}: command not found", name);
        return;
    };
    let Some((program, argv)) = exec_args(&program.to_string_lossy(), &stage.words) else {
        let _ = writeln!(io::stderr(), "{}: command not found", name);
        return;
    };

    let _ = io::stdout().flush();
    match unsafe { fork() } {
        Ok(ForkResult::Child) => {
            let _ = unistd::execv(&program, &argv);
            let _ = writeln!(io::stderr(), "{}: cannot execute", name);
            process::exit(1);
        }
        Ok(ForkResult::Parent { child }) => reap(&[child]),
        Err(e) => {
            let _ = writeln!(io::stderr(), "fork failed: {}", e);
        }
    }
}

fn run_pipeline(stages: &[Stage], history: &mut History, search_paths: &OsStr) {
    let mut pipes = Vec::with_capacity(stages.len() - 1);
    for _ in 0..stages.len() - 1 {
        match pipe() {
            Ok(ends) => pipes.push(ends),
            Err(e) => {
                let _ = writeln!(io::stderr(), "pipe failed: {}", e);
                return;
            }
        }
    }

    let _ = io::stdout().flush();
    let mut children: Vec<Pid> = Vec::new();
    for (i, stage) in stages.iter().enumerate() {
        match unsafe { fork() } {
            Ok(ForkResult::Child) => {
                if i > 0 {
                    let _ = dup2(pipes[i - 1].0.as_raw_fd(), 0);
                }
                if i < stages.len() - 1 {
                    let _ = dup2(pipes[i].1.as_raw_fd(), 1);
                }
                // Every pipe end closes in the child; the duplicates on
                // fd 0/1 are the only ones it keeps.
                drop(pipes);
                run_stage_in_child(stage, history, search_paths);
            }
            Ok(ForkResult::Parent { child }) => children.push(child),
            Err(e) => {
                let _ = writeln!(io::stderr(), "fork failed: {}", e);
                break;
            }
        }
    }

    drop(pipes);
    reap(&children);
}

/// Executes one pipeline stage in a freshly forked child. Never returns.
///
/// Stage-level redirections are not honored here; only the pipe wiring
/// already installed on fd 0/1 applies.
fn run_stage_in_child(stage: &Stage, history: &mut History, search_paths: &OsStr) -> ! {
    if stage.words.is_empty() {
        process::exit(0);
    }
    match Builtin::from_name(&stage.words[0]) {
        Some(builtin) => {
            let result = builtin.run(
                &stage.words,
                history,
                search_paths,
                &mut io::stdout(),
                &mut io::stderr(),
            );
            if let Err(e) = result {
                warn!("builtin {} failed in pipeline: {:#}", builtin.name(), e);
            }
            let _ = io::stdout().flush();
            process::exit(0);
        }
        None => {
            let name = &stage.words[0];
            let Some(program) = path::find_in_path(search_paths, name) else {
                let _ = writeln!(io::stderr(), "{}: command not found", name);
                process::exit(1);
            };
            if let Some((program, argv)) = exec_args(&program.to_string_lossy(), &stage.words) {
                let _ = unistd::execv(&program, &argv);
            }
            let _ = writeln!(io::stderr(), "{}: cannot execute", name);
            process::exit(1);
        }
    }
}

/// Converts a resolved program path and the word list into `execv` form.
/// `argv[0]` stays the name as typed. `None` if any word carries a NUL.
fn exec_args(program: &str, words: &[String]) -> Option<(CString, Vec<CString>)> {
    let program = CString::new(program).ok()?;
    let argv = words
        .iter()
        .map(|w| CString::new(w.as_str()).ok())
        .collect::<Option<Vec<_>>>()?;
    Some((program, argv))
}

fn reap(children: &[Pid]) {
    for &child in children {
        match waitpid(child, None) {
            Ok(status) => debug!("child {} finished: {:?}", child, status),
            Err(e) => warn!("waitpid({}) failed: {}", child, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::split_into_tokens;
    use crate::parser;
    use std::env;
    use std::fs;
    use std::os::fd::FromRawFd;
    use std::path::PathBuf;
    use std::sync::{Mutex, MutexGuard, OnceLock};
    use std::time::{SystemTime, UNIX_EPOCH};

    /// Serializes tests that touch the process-wide descriptor table.
    fn lock_descriptors() -> MutexGuard<'static, ()> {
        static MUTEX: OnceLock<Mutex<()>> = OnceLock::new();
        MUTEX.get_or_init(|| Mutex::new(())).lock().unwrap()
    }

    fn temp_path(tag: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        env::temp_dir().join(format!("rsh_exec_{}_{}_{}", tag, std::process::id(), nanos))
    }

    fn pipeline_of(line: &str) -> Pipeline {
        parser::parse(&split_into_tokens(line))
    }

    fn system_paths() -> std::ffi::OsString {
        "/bin:/usr/bin".into()
    }

    #[test]
    fn test_redir_guard_swaps_and_restores_a_descriptor() {
        let _lock = lock_descriptors();

        // A scratch descriptor plays the role of stdout.
        let devnull = OpenOptions::new().write(true).open("/dev/null").unwrap();
        let target_fd = dup(devnull.as_raw_fd()).unwrap();

        let capture = temp_path("guard");
        let capture_file = File::create(&capture).unwrap();
        {
            let _guard = RedirGuard::install(target_fd, capture_file).unwrap();
            let mut writer = unsafe { File::from_raw_fd(dup(target_fd).unwrap()) };
            write!(writer, "while installed").unwrap();
        }
        // Restored: this write goes back to /dev/null, not the file.
        let mut writer = unsafe { File::from_raw_fd(dup(target_fd).unwrap()) };
        write!(writer, "after restore").unwrap();
        drop(writer);
        let _ = unistd::close(target_fd);

        assert_eq!(fs::read_to_string(&capture).unwrap(), "while installed");
        let _ = fs::remove_file(capture);
    }

    #[test]
    fn test_single_external_command_with_stdout_redirect() {
        let _lock = lock_descriptors();
        let out = temp_path("sh_out");

        // `sh` is external, so this exercises the fork/exec path with the
        // parent's descriptor swapped and restored around the wait.
        let line = format!("sh -c 'echo one two' > {}", out.display());
        let mut history = History::new();
        execute_with_paths(&pipeline_of(&line), &mut history, &system_paths());

        assert_eq!(fs::read_to_string(&out).unwrap(), "one two\n");
        let _ = fs::remove_file(out);
    }

    #[test]
    fn test_append_redirect_accumulates() {
        let _lock = lock_descriptors();
        let out = temp_path("appends");

        let mut history = History::new();
        let first = format!("echo one > {}", out.display());
        let second = format!("echo two >> {}", out.display());
        execute_with_paths(&pipeline_of(&first), &mut history, &system_paths());
        execute_with_paths(&pipeline_of(&second), &mut history, &system_paths());

        assert_eq!(fs::read_to_string(&out).unwrap(), "one\ntwo\n");
        let _ = fs::remove_file(out);
    }

    #[test]
    fn test_command_not_found_lands_on_redirected_stdout() {
        let _lock = lock_descriptors();
        let out = temp_path("notfound");

        let line = format!("no-such-cmd-rsh > {}", out.display());
        let mut history = History::new();
        execute_with_paths(&pipeline_of(&line), &mut history, &system_paths());

        assert_eq!(
            fs::read_to_string(&out).unwrap(),
            "no-such-cmd-rsh: command not found\n"
        );
        let _ = fs::remove_file(out);
    }

    #[test]
    fn test_stderr_redirect_captures_child_errors() {
        let _lock = lock_descriptors();
        let err = temp_path("err_log");

        let line = format!("ls /definitely-not-here-rsh 2> {}", err.display());
        let mut history = History::new();
        execute_with_paths(&pipeline_of(&line), &mut history, &system_paths());

        let captured = fs::read_to_string(&err).unwrap();
        assert!(captured.contains("definitely-not-here-rsh"));
        let _ = fs::remove_file(err);
    }

    #[test]
    fn test_unopenable_redirect_skips_execution() {
        let _lock = lock_descriptors();
        let out = temp_path("skipped");

        // Opening a path under a missing directory fails, so nothing runs
        // and the target of the other request is still created empty.
        let line = format!("echo hi > /no/such/dir/rsh-out 2> {}", out.display());
        let mut history = History::new();
        execute_with_paths(&pipeline_of(&line), &mut history, &system_paths());

        assert_eq!(fs::read_to_string(&out).unwrap(), "");
        let _ = fs::remove_file(out);
    }

    #[test]
    fn test_builtin_runs_in_process_with_redirect() {
        let _lock = lock_descriptors();
        let out = temp_path("type_out");

        let line = format!("type cd > {}", out.display());
        let mut history = History::new();
        execute_with_paths(&pipeline_of(&line), &mut history, &system_paths());

        assert_eq!(fs::read_to_string(&out).unwrap(), "cd is a shell builtin\n");
        let _ = fs::remove_file(out);
    }

    #[test]
    fn test_two_stage_pipeline_moves_bytes_and_reaps() {
        let _lock = lock_descriptors();
        let out = temp_path("pipe_out");

        // Both stages are external. The trailing stage writes the file
        // itself, since stage-level redirections are ignored inside
        // pipelines.
        let line = format!("sh -c 'echo pipeline bytes' | sh -c 'cat > {}'", out.display());
        let mut history = History::new();
        execute_with_paths(&pipeline_of(&line), &mut history, &system_paths());

        assert_eq!(fs::read_to_string(&out).unwrap(), "pipeline bytes\n");
        let _ = fs::remove_file(out);
    }

    #[test]
    fn test_builtin_stage_feeds_the_pipe() {
        let _lock = lock_descriptors();
        let out = temp_path("builtin_pipe");

        // `echo` here is the builtin, forked into the pipeline like any
        // other stage.
        let line = format!("echo from builtin | sh -c 'cat > {}'", out.display());
        let mut history = History::new();
        execute_with_paths(&pipeline_of(&line), &mut history, &system_paths());

        assert_eq!(fs::read_to_string(&out).unwrap(), "from builtin\n");
        let _ = fs::remove_file(out);
    }

    #[test]
    fn test_three_stage_pipeline_counts_lines() {
        let _lock = lock_descriptors();
        let input = temp_path("three_in");
        let out = temp_path("three_out");
        fs::write(&input, "a\nb\nc\n").unwrap();

        let line = format!(
            "cat {} | cat | sh -c 'wc -l > {}'",
            input.display(),
            out.display()
        );
        let mut history = History::new();
        execute_with_paths(&pipeline_of(&line), &mut history, &system_paths());

        let counted = fs::read_to_string(&out).unwrap();
        assert_eq!(counted.trim(), "3");
        let _ = fs::remove_file(input);
        let _ = fs::remove_file(out);
    }

    #[test]
    fn test_empty_pipeline_is_a_no_op() {
        let mut history = History::new();
        execute_with_paths(&pipeline_of("|"), &mut history, &system_paths());
        execute_with_paths(&pipeline_of(""), &mut history, &system_paths());
    }

    #[test]
    fn test_redirect_only_stage_opens_nothing() {
        let _lock = lock_descriptors();
        let out = temp_path("never_created");

        let line = format!("> {}", out.display());
        let mut history = History::new();
        execute_with_paths(&pipeline_of(&line), &mut history, &system_paths());

        assert!(!out.exists());
    }
}
