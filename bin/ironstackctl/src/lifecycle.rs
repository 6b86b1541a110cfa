//! ---
//! ironstack_section: "08-cli"
//! ironstack_subsection: "binary"
//! ironstack_type: "source"
//! ironstack_scope: "code"
//! ironstack_description: "Lifecycle subcommands of the control CLI."
//! ironstack_version: "v0.0.0-prealpha"
//! ironstack_owner: "tbd"
//! ---
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use ironstack_common::config::LoadedAppConfig;
use ironstack_common::{init_tracing, AppConfig, ExecutionContext};
use ironstack_logging::{log_lifecycle_event, LifecycleOutcome, LogContext};
use ironstack_orchestrator::{Action, ActionReport, Orchestrator};

const SERVICE_NAME: &str = "ironstackctl";

#[derive(Debug, Subcommand)]
pub enum LifecycleCommand {
    /// Download, configure and install every persona component.
    Install,
    /// Stop programs and undo everything recorded by install.
    Uninstall,
    /// Start component programs.
    Start {
        /// Wait until every program reports started.
        #[arg(long)]
        wait: bool,
    },
    /// Stop component programs.
    Stop,
    /// Stop then start component programs.
    Restart,
    /// Show program status.
    Status,
    /// Run component test suites.
    Test,
    /// Build package artifacts.
    Package,
}

impl From<&LifecycleCommand> for Action {
    fn from(command: &LifecycleCommand) -> Self {
        match command {
            LifecycleCommand::Install => Action::Install,
            LifecycleCommand::Uninstall => Action::Uninstall,
            LifecycleCommand::Start { wait } => Action::Start { wait: *wait },
            LifecycleCommand::Stop => Action::Stop,
            LifecycleCommand::Restart => Action::Restart,
            LifecycleCommand::Status => Action::Status,
            LifecycleCommand::Test => Action::Test,
            LifecycleCommand::Package => Action::Package,
        }
    }
}

/// Load configuration, build the persona and run one action.
pub fn run(command: LifecycleCommand, candidates: &[PathBuf], dry_run: bool) -> Result<ActionReport> {
    let LoadedAppConfig { config, source } = AppConfig::load_with_source(candidates)?;
    if let Err(err) = init_tracing(SERVICE_NAME, &config.logging) {
        ironstack_logging::init();
        eprintln!(
            "file logging unavailable under {} ({err:#}); logging to stdout only",
            config.logging.directory.display()
        );
    }

    let action = Action::from(&command);
    let ctx = ExecutionContext::new(dry_run || config.runtime.dry_run);
    let log_ctx = LogContext::new().with_action(action.as_str());
    log_lifecycle_event(
        Some(&log_ctx),
        "config_loaded",
        &format!("using {} (dry_run={})", source.display(), ctx.is_dry_run()),
        LifecycleOutcome::Success,
    );

    let orchestrator = Orchestrator::from_config(config, ctx)
        .with_context(|| format!("unable to build persona from {}", source.display()))?;
    match orchestrator.run(action) {
        Ok(report) => Ok(report),
        Err(err) => {
            log_lifecycle_event(Some(&log_ctx), "action_failed", &err.to_string(), LifecycleOutcome::Fault);
            Err(err).with_context(|| format!("{action} failed"))
        }
    }
}
