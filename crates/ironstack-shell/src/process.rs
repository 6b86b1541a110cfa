//! ---
//! ironstack_section: "04-host-shell"
//! ironstack_subsection: "module"
//! ironstack_type: "source"
//! ironstack_scope: "code"
//! ironstack_description: "Command execution, liveness checks and kill escalation."
//! ironstack_version: "v0.0.0-prealpha"
//! ironstack_owner: "tbd"
//! ---
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use indexmap::IndexMap;
use ironstack_common::ExecutionContext;
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag};
use nix::unistd::Pid;
use tracing::{debug, info, warn};

use crate::{Result, ShellError};

/// Knobs for [`execute`].
#[derive(Debug, Clone)]
pub struct ExecOptions {
    pub cwd: Option<PathBuf>,
    pub env: IndexMap<String, String>,
    /// Exit codes treated as success.
    pub allowed_exit_codes: Vec<i32>,
    /// When set, stdout and stderr are also written to this file.
    pub save_output: Option<PathBuf>,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            cwd: None,
            env: IndexMap::new(),
            allowed_exit_codes: vec![0],
            save_output: None,
        }
    }
}

impl ExecOptions {
    pub fn in_dir(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn allow_exit_codes(mut self, codes: impl IntoIterator<Item = i32>) -> Self {
        self.allowed_exit_codes = codes.into_iter().collect();
        self
    }

    pub fn save_output_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.save_output = Some(path.into());
        self
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Run `argv` to completion, failing unless its exit code is allowed.
///
/// In dry-run mode nothing is spawned and an empty successful output is returned.
pub fn execute(ctx: ExecutionContext, argv: &[String], options: &ExecOptions) -> Result<ExecOutput> {
    let (program, args) = argv.split_first().ok_or(ShellError::EmptyCommand)?;
    let command_line = argv.join(" ");
    if ctx.is_dry_run() {
        info!(command = %command_line, "dry-run: not executing");
        return Ok(ExecOutput {
            exit_code: Some(0),
            ..ExecOutput::default()
        });
    }

    debug!(command = %command_line, cwd = ?options.cwd, "executing");
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .envs(&options.env);
    if let Some(cwd) = &options.cwd {
        command.current_dir(cwd);
    }
    let output = command.output().map_err(|source| ShellError::Spawn {
        command: command_line.clone(),
        source,
    })?;

    let result = ExecOutput {
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };
    if let Some(path) = &options.save_output {
        let combined = format!("{}{}", result.stdout, result.stderr);
        fs::write(path, combined).map_err(ShellError::io("save output to", path))?;
    }

    match result.exit_code {
        Some(code) if options.allowed_exit_codes.contains(&code) => {
            debug!(command = %command_line, exit_code = code, "command finished");
            Ok(result)
        }
        exit_code => Err(ShellError::ProcessExecution {
            command: command_line,
            exit_code,
            stdout: result.stdout,
            stderr: result.stderr,
        }),
    }
}

/// Whether `pid` is alive. Exited children of this process are reaped first.
pub fn is_running(ctx: ExecutionContext, pid: i32) -> bool {
    if ctx.is_dry_run() {
        return true;
    }
    let target = Pid::from_raw(pid);
    // Reaping only succeeds for our own children; anything else reports ECHILD.
    if let Ok(status) = waitpid(target, Some(WaitPidFlag::WNOHANG)) {
        if status.pid().is_some() {
            return false;
        }
    }
    !matches!(signal::kill(target, None), Err(Errno::ESRCH))
}

/// Stop `pid`: SIGINT for `max_try / 2` attempts, then SIGKILL for the rest.
///
/// A budget of one skips SIGINT entirely; the total never exceeds `max_try`.
/// Waits `wait` after each signal. Returns whether the process is gone and
/// how many attempts were made.
pub fn kill(ctx: ExecutionContext, pid: i32, max_try: u32, wait: Duration) -> Result<(bool, u32)> {
    if ctx.is_dry_run() || !is_running(ctx, pid) {
        return Ok((true, 0));
    }
    let interrupt_budget = max_try / 2;
    let kill_budget = max_try - interrupt_budget;
    let (killed, interrupts) = attempt_kill(ctx, pid, Signal::SIGINT, interrupt_budget, wait)?;
    if killed {
        return Ok((true, interrupts));
    }
    let (killed, kills) = attempt_kill(ctx, pid, Signal::SIGKILL, kill_budget, wait)?;
    if !killed {
        warn!(pid, attempts = interrupts + kills, "process survived kill escalation");
    }
    Ok((killed, interrupts + kills))
}

fn attempt_kill(
    ctx: ExecutionContext,
    pid: i32,
    sig: Signal,
    attempts: u32,
    wait: Duration,
) -> Result<(bool, u32)> {
    for attempt in 1..=attempts {
        debug!(pid, signal = sig.as_str(), attempt, "signalling process");
        match signal::kill(Pid::from_raw(pid), sig) {
            Ok(()) => {}
            Err(Errno::ESRCH) => return Ok((true, attempt)),
            Err(source) => return Err(ShellError::Signal { pid, source }),
        }
        sleep(ctx, wait);
        if !is_running(ctx, pid) {
            return Ok((true, attempt));
        }
    }
    Ok((false, attempts))
}

/// Block for `duration`; skipped in dry-run mode.
pub fn sleep(ctx: ExecutionContext, duration: Duration) {
    if ctx.is_dry_run() {
        debug!(?duration, "dry-run: not sleeping");
        return;
    }
    std::thread::sleep(duration);
}
