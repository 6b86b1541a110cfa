//! ---
//! ironstack_section: "15-testing"
//! ironstack_subsection: "integration-tests"
//! ironstack_type: "test"
//! ironstack_scope: "code"
//! ironstack_description: "Actions driven across a persona of components."
//! ironstack_version: "v0.0.0-prealpha"
//! ironstack_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use ironstack_common::{AppConfig, ConfigError, ExecutionContext};
use ironstack_orchestrator::{Action, Orchestrator, OrchestratorError, Outcome};
use ironstack_runtime::{
    Investigator, ProgramStatus, Runner, RunnerSettings, Starter, Status,
};
use parking_lot::Mutex;
use tempfile::{tempdir, TempDir};

/// Runner keeping programs in memory.
#[derive(Default)]
struct MemoryRunner {
    alive: Mutex<Vec<String>>,
}

impl Starter for MemoryRunner {
    fn id(&self) -> &str {
        "memory"
    }

    fn start(&self, name: &str, _path: &str, _working_dir: &Path, _argv: &[String]) -> ironstack_runtime::Result<String> {
        self.alive.lock().push(name.to_owned());
        Ok(format!("memory:{name}"))
    }
}

impl Investigator for MemoryRunner {
    fn stop(&self, name: &str) -> ironstack_runtime::Result<()> {
        self.alive.lock().retain(|alive| alive != name);
        Ok(())
    }

    fn status(&self, name: &str) -> ironstack_runtime::Result<ProgramStatus> {
        let status = if self.alive.lock().iter().any(|alive| alive == name) {
            Status::Started
        } else {
            Status::Stopped
        };
        Ok(ProgramStatus::new(name, status, ""))
    }
}

struct Stack {
    root: TempDir,
    runner: Arc<MemoryRunner>,
}

impl Stack {
    fn new() -> Self {
        Self {
            root: tempdir().expect("tempdir"),
            runner: Arc::new(MemoryRunner::default()),
        }
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.root.path().join(rel)
    }

    fn config(&self, persona: &[&str]) -> AppConfig {
        let root = self.root.path().display();
        let persona = persona
            .iter()
            .map(|name| format!("\"{name}\""))
            .collect::<Vec<_>>()
            .join(", ");
        let toml = format!(
            r#"
            [paths]
            trace_dir = "{root}/traces"
            phase_dir = "{root}/phases"

            [runtime]
            purge_packages = true
            wait_between_secs = 0
            wait_attempts = 2

            [distro]
            name = "test"
            package_manager = "command"
            [distro.commands.package]
            install = ["sh", "-c", "echo install $(NAME) >> {root}/packages.log"]
            remove = ["sh", "-c", "echo remove $(NAME) >> {root}/packages.log"]

            [persona]
            components = [{persona}]

            [global]
            root = "{root}"
            run_type = "memory"

            [components.db]
            packages = [{{ name = "db-server" }}]
            config_files = [{{ name = "db.conf", target = "$(ROOT)/etc/db/db.conf", contents = "owner=$(COMPONENT)\n" }}]
            [components.db.options]
            app_dir = "{root}/opt/db"

            [components.api]
            config_files = [{{ name = "api.conf", target = "$(ROOT)/etc/api/api.conf", contents = "db=$(ROOT)/etc/db\n" }}]
            programs = [{{ name = "api-server" }}, {{ name = "api-worker" }}]
            [components.api.options]
            app_dir = "{root}/opt/api"

            [components.broken]
            config_files = [{{ name = "missing.conf", target = "$(ROOT)/etc/broken/missing.conf" }}]
            [components.broken.options]
            app_dir = "{root}/opt/broken"
            "#
        );
        toml.parse().expect("test configuration parses")
    }

    fn orchestrator(&self, persona: &[&str]) -> Result<Orchestrator> {
        let runner = Arc::clone(&self.runner);
        Ok(Orchestrator::builder(self.config(persona))
            .context(ExecutionContext::live())
            .runner(
                "memory",
                Arc::new(move |_: &RunnerSettings| -> ironstack_runtime::Result<Arc<dyn Runner>> {
                    Ok(runner.clone())
                }),
            )
            .build()?)
    }
}

#[test]
fn install_then_uninstall_round_trip() -> Result<()> {
    let stack = Stack::new();
    let orchestrator = stack.orchestrator(&["db", "api"])?;

    let report = orchestrator.run(Action::Install)?;
    assert_eq!(report.components, vec!["db", "api"]);
    assert_eq!(fs::read_to_string(stack.path("etc/db/db.conf"))?, "owner=db\n");
    assert_eq!(fs::read_to_string(stack.path("packages.log"))?, "install db-server\n");
    assert!(stack.path("phases/install.configure.phases").exists());

    let report = orchestrator.run(Action::Uninstall)?;
    assert_eq!(report.components, vec!["api", "db"]);
    assert!(!stack.path("etc").exists());
    assert_eq!(
        fs::read_to_string(stack.path("packages.log"))?,
        "install db-server\nremove db-server\n"
    );
    assert!(!stack.path("phases/install.configure.phases").exists());
    assert!(stack.path("phases/uninstall.unconfigure.phases").exists());

    orchestrator.run(Action::Install)?;
    assert!(!stack.path("phases/uninstall.unconfigure.phases").exists());
    Ok(())
}

#[test]
fn rerunning_install_skips_marked_components() -> Result<()> {
    let stack = Stack::new();
    let orchestrator = stack.orchestrator(&["db"])?;
    orchestrator.run(Action::Install)?;

    let report = orchestrator.run(Action::Install)?;
    assert!(report.phases.iter().all(|phase| phase.results.is_empty()));
    assert!(report.phases.iter().all(|phase| phase.skipped == vec!["db"]));
    assert_eq!(fs::read_to_string(stack.path("packages.log"))?, "install db-server\n");
    Ok(())
}

#[test]
fn failing_component_stops_the_phase() -> Result<()> {
    let stack = Stack::new();
    let orchestrator = stack.orchestrator(&["db", "broken", "api"])?;

    let err = orchestrator.run(Action::Install).unwrap_err();
    match &err {
        OrchestratorError::PhaseFailed { phase, component, .. } => {
            assert_eq!(phase, "configure");
            assert_eq!(component, "broken");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(stack.path("etc/db/db.conf").exists());
    assert!(!stack.path("etc/api").exists());
    assert!(!stack.path("packages.log").exists());
    Ok(())
}

#[test]
fn start_status_stop_cycle() -> Result<()> {
    let stack = Stack::new();
    let orchestrator = stack.orchestrator(&["db", "api"])?;

    let report = orchestrator.run(Action::Start { wait: true })?;
    let started = report
        .phases
        .iter()
        .find(|phase| phase.phase == "start")
        .expect("start phase");
    assert_eq!(started.results[1], ("api".to_owned(), Outcome::Count(2)));
    let wait = report.phases.last().expect("wait phase");
    assert_eq!(wait.phase, "wait");
    assert_eq!(wait.results.len(), 1);

    let status = orchestrator.run(Action::Status)?;
    assert_eq!(
        status.phases[0].results[1].1.to_string(),
        "api-server=started, api-worker=started"
    );

    let stopped = orchestrator.run(Action::Stop)?;
    assert_eq!(stopped.phases[0].results[0], ("api".to_owned(), Outcome::Count(2)));
    assert!(stack.runner.alive.lock().is_empty());
    assert!(!stack.path("phases/start.start.phases").exists());

    orchestrator.run(Action::Start { wait: false })?;
    assert_eq!(stack.runner.alive.lock().len(), 2);
    Ok(())
}

#[test]
fn persona_with_undeclared_component_is_rejected() {
    let stack = Stack::new();
    let mut config = stack.config(&["db"]);
    config.persona.components.push("ghost".into());
    let err = Orchestrator::from_config(config, ExecutionContext::live()).unwrap_err();
    assert!(matches!(err, OrchestratorError::Config(ConfigError::UnknownComponent(ref name)) if name == "ghost"));
}

#[test]
fn dry_run_install_leaves_no_trace() -> Result<()> {
    let stack = Stack::new();
    let orchestrator = Orchestrator::from_config(stack.config(&["db", "api"]), ExecutionContext::dry_run())?;
    orchestrator.run(Action::Install)?;
    assert!(!stack.path("etc").exists());
    assert!(!stack.path("traces").exists());
    assert!(!stack.path("phases").exists());
    assert!(!stack.path("packages.log").exists());
    Ok(())
}
