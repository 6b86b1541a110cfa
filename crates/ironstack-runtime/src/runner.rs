//! ---
//! ironstack_section: "06-process-supervision"
//! ironstack_subsection: "module"
//! ironstack_type: "source"
//! ironstack_scope: "code"
//! ironstack_description: "Starter and investigator strategies."
//! ironstack_version: "v0.0.0-prealpha"
//! ironstack_owner: "tbd"
//! ---
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ironstack_common::{ExecutionContext, Registry};

use crate::fork::{ForkRunner, FORK_RUNNER};
use crate::program::ProgramStatus;
use crate::Result;

/// How hard stop attempts try before giving up on a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KillPolicy {
    pub attempts: u32,
    pub wait: Duration,
}

impl Default for KillPolicy {
    fn default() -> Self {
        Self {
            attempts: 4,
            wait: Duration::from_secs(1),
        }
    }
}

/// Inputs handed to runner constructors for one component.
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub component: String,
    /// The component's journal directory; runners keep their own files here.
    pub trace_dir: PathBuf,
    pub ctx: ExecutionContext,
    pub kill: KillPolicy,
}

/// Launches an application and returns an opaque detail handle.
pub trait Starter: Send + Sync {
    /// Strategy id journaled next to each started application.
    fn id(&self) -> &str;

    fn start(&self, name: &str, path: &str, working_dir: &Path, argv: &[String]) -> Result<String>;
}

/// Reports on and stops applications a matching starter launched.
pub trait Investigator: Send + Sync {
    fn stop(&self, name: &str) -> Result<()>;

    fn status(&self, name: &str) -> Result<ProgramStatus>;
}

/// A strategy that can both start and investigate.
pub trait Runner: Starter + Investigator {}

impl<T: Starter + Investigator> Runner for T {}

pub type RunnerConstructor = Arc<dyn Fn(&RunnerSettings) -> Result<Arc<dyn Runner>> + Send + Sync>;

pub type RunnerRegistry = Registry<RunnerConstructor>;

/// Registry holding the built-in `fork` runner.
pub fn default_runners() -> RunnerRegistry {
    Registry::new("runner").with(FORK_RUNNER, ForkRunner::constructor())
}
