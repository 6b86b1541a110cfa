//! ---
//! ironstack_section: "06-process-supervision"
//! ironstack_subsection: "module"
//! ironstack_type: "source"
//! ironstack_scope: "code"
//! ironstack_description: "Process supervisor for component applications."
//! ironstack_version: "v0.0.0-prealpha"
//! ironstack_owner: "tbd"
//! ---
//! Process supervision.
//!
//! A component may own zero or more long-running applications. Starting them
//! is journaled in the component's `start` trace, separately from the install
//! trace, and the starter id recorded there is used later to find the
//! investigator that can report on or stop each application.

use std::time::Duration;

pub mod fork;
pub mod program;
pub mod runner;
pub mod supervisor;

pub use fork::{ForkDetails, ForkRunner, FORK_RUNNER};
pub use program::{Program, ProgramStatus, Status};
pub use runner::{
    default_runners, Investigator, KillPolicy, Runner, RunnerConstructor, RunnerRegistry,
    RunnerSettings, Starter,
};
pub use supervisor::ProgramRuntime;

/// Result alias used throughout the runtime crate.
pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("{count} programs of component '{component}' may already be running, stop them first")]
    AlreadyStarted { component: String, count: usize },
    #[error("no programs of component '{component}' started, can not wait for them to become active")]
    NothingToWait { component: String },
    #[error("failed waiting {}s for programs of component '{component}' to become active", waited.as_secs_f64())]
    WaitTimeout { component: String, waited: Duration },
    #[error("runner '{runner}' failed for '{app}': {message}")]
    Runner {
        runner: String,
        app: String,
        message: String,
    },
    #[error(transparent)]
    Component(#[from] ironstack_components::ComponentError),
    #[error(transparent)]
    Config(#[from] ironstack_common::ConfigError),
    #[error(transparent)]
    Trace(#[from] ironstack_trace::TraceError),
    #[error(transparent)]
    Shell(#[from] ironstack_shell::ShellError),
}

impl RuntimeError {
    /// Timeout after `attempts` polls spaced `between` apart; saturates at [`Duration::MAX`].
    pub(crate) fn wait_timeout(component: &str, between: Duration, attempts: u32) -> Self {
        RuntimeError::WaitTimeout {
            component: component.to_owned(),
            waited: between.checked_mul(attempts).unwrap_or(Duration::MAX),
        }
    }
}

impl From<ironstack_common::UnknownStrategy> for RuntimeError {
    fn from(err: ironstack_common::UnknownStrategy) -> Self {
        RuntimeError::Config(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_timeout_reports_total_wait() {
        let err = RuntimeError::WaitTimeout {
            component: "nova".into(),
            waited: Duration::from_millis(2500),
        };
        assert_eq!(
            err.to_string(),
            "failed waiting 2.5s for programs of component 'nova' to become active"
        );
    }

    #[test]
    fn wait_timeout_saturates_on_huge_config() {
        let err = RuntimeError::wait_timeout("nova", Duration::from_secs(u64::MAX / 2), u32::MAX);
        assert!(matches!(err, RuntimeError::WaitTimeout { waited, .. } if waited == Duration::MAX));

        let err = RuntimeError::wait_timeout("nova", Duration::from_millis(10), 3);
        assert!(matches!(err, RuntimeError::WaitTimeout { waited, .. } if waited == Duration::from_millis(30)));
    }
}
