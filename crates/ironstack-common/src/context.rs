//! ---
//! ironstack_section: "01-core-functionality"
//! ironstack_subsection: "module"
//! ironstack_type: "source"
//! ironstack_scope: "code"
//! ironstack_description: "Execution context threaded through side-effecting calls."
//! ironstack_version: "v0.0.0-prealpha"
//! ironstack_owner: "tbd"
//! ---

/// Run-wide flags built once at start-up and passed by value into every call
/// that touches the host (filesystem, processes, signals, sleeps, journals).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecutionContext {
    dry_run: bool,
}

impl ExecutionContext {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    /// Context that performs real side effects.
    pub fn live() -> Self {
        Self::new(false)
    }

    /// Context that logs intended side effects without performing them.
    pub fn dry_run() -> Self {
        Self::new(true)
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}
