//! ---
//! ironstack_section: "02-logging"
//! ironstack_subsection: "module"
//! ironstack_type: "source"
//! ironstack_scope: "code"
//! ironstack_description: "Structured lifecycle events and logging macros."
//! ironstack_version: "v0.0.0-prealpha"
//! ironstack_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Lifecycle-aware logging helpers shared by the ironstack crates.

use tracing::Level;
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

pub mod macros;

/// Initialize a baseline tracing subscriber for tools and tests.
pub fn init() {
    let _ = Registry::default()
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(subscriber_fmt::layer())
        .try_init();
}

/// Structured context propagated by the `stack_*` macros.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogContext<'a> {
    /// Orchestrated action (install, uninstall, start, ...).
    pub action: Option<&'a str>,
    /// Phase within the action (download, configure, ...).
    pub phase: Option<&'a str>,
    /// Component the event concerns.
    pub component: Option<&'a str>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the action name.
    pub fn with_action(mut self, action: &'a str) -> Self {
        self.action = Some(action);
        self
    }

    /// Attach the phase name.
    pub fn with_phase(mut self, phase: &'a str) -> Self {
        self.phase = Some(phase);
        self
    }

    /// Attach the component name.
    pub fn with_component(mut self, component: &'a str) -> Self {
        self.component = Some(component);
        self
    }
}

/// Outcome attached to lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleOutcome {
    /// The step completed.
    Success,
    /// The step was skipped (already done, nothing to do).
    Skipped,
    /// The step failed.
    Fault,
}

impl LifecycleOutcome {
    /// Stable lowercase label used in structured output.
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleOutcome::Success => "success",
            LifecycleOutcome::Skipped => "skipped",
            LifecycleOutcome::Fault => "fault",
        }
    }
}

macro_rules! lifecycle_event {
    ($level:expr, $ctx:expr, $event:expr, $outcome:expr, $message:expr) => {
        tracing::event!(
            $level,
            event = $event,
            outcome = $outcome.as_str(),
            action = $ctx.action.unwrap_or(""),
            phase = $ctx.phase.unwrap_or(""),
            component = $ctx.component.unwrap_or(""),
            message = %$message
        )
    };
}

/// Emit a standardized lifecycle event; faults log at error level.
pub fn log_lifecycle_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: LifecycleOutcome,
) {
    let ctx = context.copied().unwrap_or_default();
    match outcome {
        LifecycleOutcome::Success => lifecycle_event!(Level::INFO, ctx, event, outcome, message),
        LifecycleOutcome::Skipped => lifecycle_event!(Level::DEBUG, ctx, event, outcome, message),
        LifecycleOutcome::Fault => lifecycle_event!(Level::ERROR, ctx, event, outcome, message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macros_emit_without_panic() {
        init();
        let ctx = LogContext::new()
            .with_action("install")
            .with_component("nova");
        stack_info!(context = ctx, "component configured");
        stack_debug!("debug message");
        stack_warn!(context = ctx.with_phase("configure"), "skipped {} links", 2);
        stack_error!(context = ctx, "exit code: {}", 42);
    }

    #[test]
    fn lifecycle_event_helper_emits() {
        init();
        let ctx = LogContext::new().with_phase("download");
        log_lifecycle_event(Some(&ctx), "phase.end", "done", LifecycleOutcome::Success);
        log_lifecycle_event(None, "phase.end", "marked", LifecycleOutcome::Skipped);
        log_lifecycle_event(None, "phase.end", "failed", LifecycleOutcome::Fault);
    }

    #[test]
    fn outcome_labels() {
        assert_eq!(LifecycleOutcome::Fault.as_str(), "fault");
        assert_eq!(LifecycleOutcome::Skipped.as_str(), "skipped");
    }
}
