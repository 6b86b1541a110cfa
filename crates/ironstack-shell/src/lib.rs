//! ---
//! ironstack_section: "04-host-shell"
//! ironstack_subsection: "module"
//! ironstack_type: "source"
//! ironstack_scope: "code"
//! ironstack_description: "Dry-run aware host primitives."
//! ironstack_version: "v0.0.0-prealpha"
//! ironstack_owner: "tbd"
//! ---
//! Host side effects used by the lifecycle engine.
//!
//! Every function takes an [`ExecutionContext`](ironstack_common::ExecutionContext);
//! in dry-run mode the intended effect is logged and skipped. Functions that
//! create something accept an optional [`TraceWriter`](ironstack_trace::TraceWriter)
//! and journal what they actually created.

use std::path::PathBuf;

pub mod fs;
pub mod process;

pub use fs::{
    deldir, explode_path, load_file, mkdirslist, symlink, unlink, write_file,
    write_file_and_backup, BACKUP_EXTENSION,
};
pub use process::{execute, is_running, kill, sleep, ExecOptions, ExecOutput};

/// Result alias used throughout the shell crate.
pub type Result<T> = std::result::Result<T, ShellError>;

#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    #[error("failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("empty command line")]
    EmptyCommand,
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("`{command}` exited with {}: {stderr}", exit_code.map(|code| code.to_string()).unwrap_or_else(|| "a signal".to_owned()))]
    ProcessExecution {
        command: String,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    #[error("failed to signal pid {pid}: {source}")]
    Signal { pid: i32, source: nix::Error },
    #[error(transparent)]
    Trace(#[from] ironstack_trace::TraceError),
}

impl ShellError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| ShellError::Io {
            action,
            path,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_error_mentions_exit_code() {
        let err = ShellError::ProcessExecution {
            command: "false".into(),
            exit_code: Some(1),
            stdout: String::new(),
            stderr: "boom".into(),
        };
        assert_eq!(err.to_string(), "`false` exited with 1: boom");
        let signalled = ShellError::ProcessExecution {
            command: "sleep 9".into(),
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
        };
        assert!(signalled.to_string().contains("a signal"));
    }
}
