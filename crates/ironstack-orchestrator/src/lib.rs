//! ---
//! ironstack_section: "07-phase-orchestration"
//! ironstack_subsection: "module"
//! ironstack_type: "source"
//! ironstack_scope: "code"
//! ironstack_description: "Phase orchestration kernel coordinating component lifecycles."
//! ironstack_version: "v0.0.0-prealpha"
//! ironstack_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Drives an action (install, start, ...) as a sequence of phases, each phase
//! visiting every component of the persona in order and stopping at the first
//! failure.

pub mod action;
pub mod instance;
pub mod phase;

pub use action::{Action, ActionReport, Outcome};
pub use instance::{Instance, Orchestrator, OrchestratorBuilder};
pub use phase::{run_phase, PhaseFunctors, PhaseRecorder, PhaseSummary, MARKER_EXTENSION};

/// Result alias used throughout the orchestrator crate.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Errors surfaced while orchestrating phases.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// A component operation failed; remaining components were not visited.
    #[error("{action} phase '{phase}' failed for component '{component}': {source}")]
    PhaseFailed {
        /// Action being run.
        action: String,
        /// Phase that failed.
        phase: String,
        /// Component whose operation failed.
        component: String,
        /// Underlying failure.
        #[source]
        source: Box<OrchestratorError>,
    },
    /// Configuration problem, including unknown component names.
    #[error(transparent)]
    Config(#[from] ironstack_common::ConfigError),
    /// Install, uninstall or test failure.
    #[error(transparent)]
    Component(#[from] ironstack_components::ComponentError),
    /// Start, stop or status failure.
    #[error(transparent)]
    Runtime(#[from] ironstack_runtime::RuntimeError),
    /// Phase marker file handling failed.
    #[error(transparent)]
    Shell(#[from] ironstack_shell::ShellError),
}

impl OrchestratorError {
    /// The innermost error, past any phase wrapping.
    pub fn root(&self) -> &OrchestratorError {
        match self {
            OrchestratorError::PhaseFailed { source, .. } => source.root(),
            other => other,
        }
    }
}
