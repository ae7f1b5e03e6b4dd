//! Local process execution. This is the only place the harness spawns
//! external commands; everything else hands a `ShellCmd` to a `LocalShell`
//! and inspects the returned `CmdResult`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::{debug, log_enabled, trace, Level};

use crate::common::now_ms;

/// Horizontal ruler used when dumping captured output at trace level.
const LINE: &str =
    "--------------------------------------------------------------------------------";

/// One command to run: an argument vector plus an optional working directory
/// and per-command environment additions.
#[derive(Debug, Clone)]
pub struct ShellCmd {
    argv: Vec<String>,
    cwd: Option<PathBuf>,
    env: Vec<(String, String)>,
}

impl ShellCmd {
    /// A command given as an explicit argument vector. Preferred whenever the
    /// command needs no shell features.
    pub fn args<I, S>(argv: I) -> ShellCmd
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ShellCmd {
            argv: argv.into_iter().map(Into::into).collect(),
            cwd: None,
            env: Vec::new(),
        }
    }

    /// A command interpreted by `/bin/bash -c`, for pipelines, redirections,
    /// and `${VAR}` substitution.
    pub fn bash<S: Into<String>>(script: S) -> ShellCmd {
        ShellCmd::args(vec!["/bin/bash".to_owned(), "-c".to_owned(), script.into()])
    }

    /// Set the working directory the command runs in.
    pub fn cwd<P: AsRef<Path>>(mut self, cwd: P) -> ShellCmd {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    /// Add a single environment variable on top of whatever the shell passes.
    pub fn env<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> ShellCmd {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// The immutable outcome of one command: exit status plus both captured
/// streams. A non-zero status is data for the caller's checks, never an
/// error at this level.
#[derive(Debug, Clone)]
pub struct CmdResult {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CmdResult {
    /// Captured stdout split on `\n`. The element after a final newline is
    /// the empty string, so indices match the raw stream line for line.
    pub fn stdout_lines(&self) -> Vec<&str> {
        self.stdout.split('\n').collect()
    }

    /// Captured stderr split on `\n`, same conventions as `stdout_lines`.
    pub fn stderr_lines(&self) -> Vec<&str> {
        self.stderr.split('\n').collect()
    }
}

/// Runs commands synchronously to completion, mirroring each one's
/// stdout/stderr to timestamped files under the log directory.
///
/// A shell either passes the ambient process environment through untouched
/// (`new`) or replaces it wholesale with a composed mapping (`with_env`).
pub struct LocalShell {
    env: Option<BTreeMap<String, String>>,
    log_dir: PathBuf,
}

impl LocalShell {
    /// A shell that passes the ambient process environment through.
    pub fn new<P: AsRef<Path>>(log_dir: P) -> LocalShell {
        LocalShell {
            env: None,
            log_dir: log_dir.as_ref().to_path_buf(),
        }
    }

    /// A shell that runs every command under exactly `env`.
    pub fn with_env<P: AsRef<Path>>(log_dir: P, env: BTreeMap<String, String>) -> LocalShell {
        LocalShell {
            env: Some(env),
            log_dir: log_dir.as_ref().to_path_buf(),
        }
    }

    /// Run `cmd` to completion and return its result. Blocks for as long as
    /// the command runs; there is no timeout. Only spawn and IO failures
    /// produce an `Err` -- a failing command comes back as a `CmdResult`
    /// with a non-zero status.
    pub fn run(&self, cmd: ShellCmd) -> Result<CmdResult, failure::Error> {
        if cmd.argv.is_empty() {
            return Err(failure::format_err!("Empty command"));
        }

        let cwd = match &cmd.cwd {
            Some(cwd) => cwd.clone(),
            None => std::env::current_dir()?,
        };

        if log_enabled!(Level::Trace) {
            trace!(
                "Running command in {:?}:\n{}\nWith environment:\n{:#?}",
                cwd,
                cmd.argv.join(" \\\n\t"),
                self.env
            );
        } else {
            debug!("Running command in {:?}: {}", cwd, cmd.argv.join(" "));
        }

        let mut command = Command::new(&cmd.argv[0]);
        command
            .args(&cmd.argv[1..])
            .current_dir(&cwd)
            .stdin(Stdio::null());
        if let Some(env) = &self.env {
            command.env_clear().envs(env);
        }
        command.envs(cmd.env.iter().map(|(key, value)| (key, value)));

        let output = command.output()?;

        // Mirror the raw streams to files for post-mortem inspection.
        let name = Path::new(&cmd.argv[0])
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "command".to_owned());
        let prefix = format!("{}.{}.{}", name, now_ms(), std::process::id());
        fs::write(self.log_dir.join(format!("{}.out", prefix)), &output.stdout)?;
        fs::write(self.log_dir.join(format!("{}.err", prefix)), &output.stderr)?;

        // A child killed by a signal has no exit code; record -1 so that
        // checks against 0 fail.
        let result = CmdResult {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        debug!("Exit code: {}", result.status);
        if log_enabled!(Level::Trace) {
            trace!("Output:\n{}\n{}{}", LINE, result.stdout, LINE);
            trace!("Error:\n{}\n{}{}", LINE, result.stderr, LINE);
        } else {
            debug!("Output: {:?}", result.stdout);
            debug!("Error: {:?}", result.stderr);
        }

        Ok(result)
    }
}
