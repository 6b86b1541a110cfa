//! ---
//! ironstack_section: "06-process-supervision"
//! ironstack_subsection: "module"
//! ironstack_type: "source"
//! ironstack_scope: "code"
//! ironstack_description: "Fork-based runner keeping per-application detail files."
//! ironstack_version: "v0.0.0-prealpha"
//! ironstack_owner: "tbd"
//! ---
//! Runs applications as detached child processes.
//!
//! For each application the runner keeps three files in the component's trace
//! directory: `<app>.stdout`, `<app>.stderr` and `<app>.fork.json`. The last
//! one holds the pid and is the detail handle returned from `start`.

use std::fs::{self, File};
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ironstack_common::ExecutionContext;
use ironstack_shell::ShellError;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::program::{ProgramStatus, Status};
use crate::runner::{Investigator, KillPolicy, Runner, RunnerConstructor, RunnerSettings, Starter};
use crate::{Result, RuntimeError};

/// Id of the built-in runner.
pub const FORK_RUNNER: &str = "fork";

const DETAILS_SUFFIX: &str = "fork.json";
const STDOUT_SUFFIX: &str = "stdout";
const STDERR_SUFFIX: &str = "stderr";

/// Contents of `<app>.fork.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkDetails {
    pub pid: i32,
    pub argv: Vec<String>,
    pub stdout: PathBuf,
    pub stderr: PathBuf,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ForkRunner {
    trace_dir: PathBuf,
    ctx: ExecutionContext,
    kill: KillPolicy,
}

impl ForkRunner {
    pub fn new(settings: &RunnerSettings) -> Self {
        Self {
            trace_dir: settings.trace_dir.clone(),
            ctx: settings.ctx,
            kill: settings.kill,
        }
    }

    pub fn constructor() -> RunnerConstructor {
        Arc::new(|settings: &RunnerSettings| -> Result<Arc<dyn Runner>> {
            Ok(Arc::new(ForkRunner::new(settings)))
        })
    }

    fn file_for(&self, app: &str, suffix: &str) -> PathBuf {
        self.trace_dir.join(format!("{app}.{suffix}"))
    }

    pub fn details_path(&self, app: &str) -> PathBuf {
        self.file_for(app, DETAILS_SUFFIX)
    }

    /// Details of a started application, `None` when it was never started
    /// or its files were already cleaned up.
    pub fn details(&self, app: &str) -> Result<Option<ForkDetails>> {
        let path = self.details_path(app);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(io_error("read", &path, source)),
        };
        serde_json::from_str(&raw).map(Some).map_err(|err| RuntimeError::Runner {
            runner: FORK_RUNNER.to_owned(),
            app: app.to_owned(),
            message: format!("unreadable details {}: {err}", path.display()),
        })
    }

    fn clean_up(&self, app: &str) {
        for suffix in [DETAILS_SUFFIX, STDOUT_SUFFIX, STDERR_SUFFIX] {
            let path = self.file_for(app, suffix);
            if let Err(err) = fs::remove_file(&path) {
                if err.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %err, "failed removing fork runner file");
                }
            }
        }
    }
}

fn io_error(action: &'static str, path: &Path, source: std::io::Error) -> RuntimeError {
    ShellError::Io {
        action,
        path: path.to_path_buf(),
        source,
    }
    .into()
}

impl Starter for ForkRunner {
    fn id(&self) -> &str {
        FORK_RUNNER
    }

    fn start(&self, name: &str, path: &str, working_dir: &Path, argv: &[String]) -> Result<String> {
        let details_path = self.details_path(name);
        let stdout = self.file_for(name, STDOUT_SUFFIX);
        let stderr = self.file_for(name, STDERR_SUFFIX);
        if self.ctx.is_dry_run() {
            info!(app = name, program = path, ?argv, "dry-run: not forking");
            return Ok(details_path.display().to_string());
        }

        fs::create_dir_all(&self.trace_dir).map_err(|source| io_error("create", &self.trace_dir, source))?;
        let out = File::create(&stdout).map_err(|source| io_error("create", &stdout, source))?;
        let err = File::create(&stderr).map_err(|source| io_error("create", &stderr, source))?;

        let mut command = Command::new(path);
        command
            .args(argv)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(out))
            .stderr(Stdio::from(err))
            .process_group(0);
        let child = command.spawn().map_err(|source| ShellError::Spawn {
            command: path.to_owned(),
            source,
        })?;
        let pid = child.id() as i32;

        let mut full_argv = Vec::with_capacity(argv.len() + 1);
        full_argv.push(path.to_owned());
        full_argv.extend(argv.iter().cloned());
        let details = ForkDetails {
            pid,
            argv: full_argv,
            stdout,
            stderr,
            started_at: Utc::now(),
        };
        let encoded = serde_json::to_string_pretty(&details).map_err(|err| RuntimeError::Runner {
            runner: FORK_RUNNER.to_owned(),
            app: name.to_owned(),
            message: err.to_string(),
        })?;
        fs::write(&details_path, encoded).map_err(|source| io_error("write", &details_path, source))?;
        info!(app = name, pid, details = %details_path.display(), "forked application");
        Ok(details_path.display().to_string())
    }
}

impl Investigator for ForkRunner {
    fn stop(&self, name: &str) -> Result<()> {
        let Some(details) = self.details(name)? else {
            debug!(app = name, "no fork details, treating as stopped");
            return Ok(());
        };
        let (killed, attempts) =
            ironstack_shell::kill(self.ctx, details.pid, self.kill.attempts, self.kill.wait)?;
        if !killed {
            return Err(RuntimeError::Runner {
                runner: FORK_RUNNER.to_owned(),
                app: name.to_owned(),
                message: format!("pid {} survived {attempts} kill attempts", details.pid),
            });
        }
        if !self.ctx.is_dry_run() {
            self.clean_up(name);
        }
        debug!(app = name, pid = details.pid, attempts, "stopped application");
        Ok(())
    }

    fn status(&self, name: &str) -> Result<ProgramStatus> {
        let Some(details) = self.details(name)? else {
            return Ok(ProgramStatus::new(name, Status::Unknown, ""));
        };
        let status = if ironstack_shell::is_running(self.ctx, details.pid) {
            Status::Started
        } else {
            Status::Stopped
        };
        Ok(ProgramStatus::new(name, status, format!("pid {}", details.pid)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn runner(dir: &Path, ctx: ExecutionContext) -> ForkRunner {
        ForkRunner::new(&RunnerSettings {
            component: "demo".into(),
            trace_dir: dir.to_path_buf(),
            ctx,
            kill: KillPolicy {
                attempts: 4,
                wait: Duration::from_millis(50),
            },
        })
    }

    #[test]
    fn unknown_until_started() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(dir.path(), ExecutionContext::live());
        assert_eq!(runner.status("app").unwrap().status, Status::Unknown);
        runner.stop("app").unwrap();
    }

    #[test]
    fn dry_run_start_spawns_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(&dir.path().join("traces"), ExecutionContext::dry_run());
        let detail = runner.start("app", "/bin/false", dir.path(), &[]).unwrap();
        assert!(detail.ends_with("app.fork.json"));
        assert!(!dir.path().join("traces").exists());
    }

    #[test]
    fn fork_status_and_stop() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(dir.path(), ExecutionContext::live());
        runner
            .start("sleeper", "sleep", dir.path(), &["30".to_owned()])
            .unwrap();
        let details = runner.details("sleeper").unwrap().unwrap();
        assert_eq!(details.argv, vec!["sleep".to_owned(), "30".to_owned()]);
        assert!(dir.path().join("sleeper.stdout").exists());
        assert_eq!(runner.status("sleeper").unwrap().status, Status::Started);

        runner.stop("sleeper").unwrap();
        assert!(!runner.details_path("sleeper").exists());
        assert!(!dir.path().join("sleeper.stderr").exists());
        assert!(!ironstack_shell::is_running(ExecutionContext::live(), details.pid));
    }
}
