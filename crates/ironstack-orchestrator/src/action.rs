//! ---
//! ironstack_section: "07-phase-orchestration"
//! ironstack_subsection: "module"
//! ironstack_type: "source"
//! ironstack_scope: "code"
//! ironstack_description: "Actions expressed as ordered phase sequences."
//! ironstack_version: "v0.0.0-prealpha"
//! ironstack_owner: "tbd"
//! ---
use std::fmt;
use std::path::PathBuf;

use ironstack_logging::{log_lifecycle_event, stack_info, stack_warn, LifecycleOutcome, LogContext};
use ironstack_runtime::ProgramStatus;
use serde::Serialize;

use crate::instance::{Instance, Orchestrator};
use crate::phase::{run_phase, PhaseFunctors, PhaseRecorder, PhaseSummary};
use crate::Result;

/// A user-facing action over the whole persona.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Download, configure and install every component.
    Install,
    /// Stop and undo everything the install journals record, in reverse order.
    Uninstall,
    /// Start programs, optionally waiting until they are active.
    Start {
        /// Poll until every program reports `started`.
        wait: bool,
    },
    /// Stop started programs, in reverse order.
    Stop,
    /// Restart programs.
    Restart,
    /// Report program status.
    Status,
    /// Run component test suites.
    Test,
    /// Build package artifacts.
    Package,
}

impl Action {
    /// Name used for markers and logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Install => "install",
            Action::Uninstall => "uninstall",
            Action::Start { .. } => "start",
            Action::Stop => "stop",
            Action::Restart => "restart",
            Action::Status => "status",
            Action::Test => "test",
            Action::Package => "package",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a phase produced for one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Outcome {
    /// The operation ran; nothing to report.
    Done,
    /// Number of items handled (files configured, programs started, ...).
    Count(usize),
    /// Program status snapshot.
    Statuses(Vec<ProgramStatus>),
    /// Package artifact, when one was produced.
    Artifact(Option<PathBuf>),
}

impl Outcome {
    /// Items this outcome accounts for in a phase total.
    pub fn tally(&self) -> usize {
        match self {
            Outcome::Done => 1,
            Outcome::Count(count) => *count,
            Outcome::Statuses(statii) => statii.len(),
            Outcome::Artifact(artifact) => usize::from(artifact.is_some()),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Done => f.write_str("done"),
            Outcome::Count(count) => write!(f, "{count}"),
            Outcome::Statuses(statii) if statii.is_empty() => f.write_str("no programs"),
            Outcome::Statuses(statii) => {
                let parts: Vec<String> = statii
                    .iter()
                    .map(|status| format!("{}={}", status.name, status.status))
                    .collect();
                f.write_str(&parts.join(", "))
            }
            Outcome::Artifact(Some(path)) => write!(f, "{}", path.display()),
            Outcome::Artifact(None) => f.write_str("nothing packaged"),
        }
    }
}

/// Everything one action did, phase by phase.
#[derive(Debug, Clone, Serialize)]
pub struct ActionReport {
    /// Action name.
    pub action: &'static str,
    /// Component order the action visited.
    pub components: Vec<String>,
    /// Phase summaries in execution order.
    pub phases: Vec<PhaseSummary<Outcome>>,
}

impl fmt::Display for ActionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} of {} component(s)", self.action, self.components.len())?;
        for phase in &self.phases {
            writeln!(
                f,
                "  {}: {} completed, {} skipped, total {}",
                phase.phase,
                phase.completed(),
                phase.skipped.len(),
                phase.total(Outcome::tally)
            )?;
            for (name, outcome) in &phase.results {
                writeln!(f, "    {name}: {outcome}")?;
            }
            for name in &phase.skipped {
                writeln!(f, "    {name}: already done")?;
            }
        }
        Ok(())
    }
}

type Op = fn(&Instance) -> Result<Outcome>;

/// One step of an action.
struct Step {
    phase: &'static str,
    op: Op,
    marked: bool,
}

const fn step(phase: &'static str, op: Op) -> Step {
    Step {
        phase,
        op,
        marked: true,
    }
}

const fn unmarked(phase: &'static str, op: Op) -> Step {
    Step {
        phase,
        op,
        marked: false,
    }
}

const INSTALL: &[Step] = &[
    step("download", |i| Ok(Outcome::Count(i.installer()?.download()?.len()))),
    step("prepare", |i| Ok(Outcome::Count(i.installer()?.prepare()?))),
    step("configure", |i| Ok(Outcome::Count(i.installer()?.configure()?))),
    step("pre-install", |i| {
        i.installer()?.pre_install()?;
        Ok(Outcome::Done)
    }),
    step("install", |i| {
        i.installer()?.install()?;
        Ok(Outcome::Done)
    }),
    step("post-install", |i| {
        i.installer()?.post_install()?;
        Ok(Outcome::Done)
    }),
];

const UNINSTALL: &[Step] = &[
    step("stop", |i| Ok(Outcome::Count(i.runtime().stop()?))),
    step("unconfigure", |i| Ok(Outcome::Count(i.uninstaller()?.unconfigure()?))),
    step("pre-uninstall", |i| {
        i.uninstaller()?.pre_uninstall()?;
        Ok(Outcome::Done)
    }),
    step("uninstall", |i| {
        i.uninstaller()?.uninstall()?;
        Ok(Outcome::Done)
    }),
    step("post-uninstall", |i| Ok(Outcome::Count(i.uninstaller()?.post_uninstall()?))),
];

const START: &[Step] = &[
    step("pre-start", |i| {
        i.runtime().pre_start()?;
        Ok(Outcome::Done)
    }),
    step("start", |i| Ok(Outcome::Count(i.runtime().start()?))),
    step("post-start", |i| {
        i.runtime().post_start()?;
        Ok(Outcome::Done)
    }),
];

const STOP: &[Step] = &[unmarked("stop", |i| Ok(Outcome::Count(i.runtime().stop()?)))];

const RESTART: &[Step] = &[unmarked("restart", |i| Ok(Outcome::Count(i.runtime().restart()?)))];

const STATUS: &[Step] = &[unmarked("status", |i| Ok(Outcome::Statuses(i.runtime().statii()?)))];

const TEST: &[Step] = &[unmarked("test", |i| {
    i.tester().run_tests()?;
    Ok(Outcome::Done)
})];

const PACKAGE: &[Step] = &[unmarked("package", |i| Ok(Outcome::Artifact(i.component().package()?)))];

impl Orchestrator {
    /// Run `action` over every persona component.
    ///
    /// Uninstall and stop visit components in reverse order. Once an action
    /// succeeds, the markers of the actions it undoes are cleared: install
    /// clears uninstall markers, uninstall clears install and start markers,
    /// and stop clears start markers.
    pub fn run(&self, action: Action) -> Result<ActionReport> {
        let name = action.as_str();
        let (steps, reverse, clears): (&[Step], bool, &[&str]) = match action {
            Action::Install => (INSTALL, false, &["uninstall"]),
            Action::Uninstall => (UNINSTALL, true, &["install", "start"]),
            Action::Start { .. } => (START, false, &[]),
            Action::Stop => (STOP, true, &["start"]),
            Action::Restart => (RESTART, false, &[]),
            Action::Status => (STATUS, false, &[]),
            Action::Test => (TEST, false, &[]),
            Action::Package => (PACKAGE, false, &[]),
        };
        let mut components = self.order().to_vec();
        if reverse {
            components.reverse();
        }

        let ctx = LogContext::new().with_action(name);
        stack_info!(context = ctx, "running {} over {}", name, components.join(", "));
        let recorder = self.recorder(name);
        let mut phases = Vec::with_capacity(steps.len() + 1);
        for step in steps {
            phases.push(self.run_step(name, step, &components, &recorder)?);
        }
        if let Action::Start { wait: true } = action {
            phases.push(self.wait_phase(name, &components)?);
        }

        if !clears.is_empty() {
            let removed = recorder.clear(clears)?;
            if removed > 0 {
                stack_info!(context = ctx, "cleared {} stale phase marker file(s)", removed);
            }
        }
        log_lifecycle_event(Some(&ctx), "action", "completed", LifecycleOutcome::Success);
        Ok(ActionReport {
            action: name,
            components,
            phases,
        })
    }

    fn run_step(
        &self,
        action: &str,
        step: &Step,
        components: &[String],
        recorder: &PhaseRecorder,
    ) -> Result<PhaseSummary<Outcome>> {
        let op = step.op;
        let phase = step.phase;
        let functors = PhaseFunctors::new(move |_: &str, instance: &Instance| op(instance))
            .with_start(move |name: &str, _: &Instance| {
                let ctx = LogContext::new()
                    .with_action(action)
                    .with_phase(phase)
                    .with_component(name);
                stack_info!(context = ctx, "{} {}", phase, name);
                Ok(())
            });
        run_phase(
            action,
            phase,
            components,
            self.instances(),
            &functors,
            step.marked.then_some(recorder),
        )
    }

    fn wait_phase(&self, action: &str, components: &[String]) -> Result<PhaseSummary<Outcome>> {
        let runtime = &self.config().runtime;
        let (between, attempts) = (runtime.wait_between, runtime.wait_attempts);
        let waiting: Vec<String> = components
            .iter()
            .filter(|name| {
                self.instance(name)
                    .is_some_and(|instance| !instance.runtime().applications().is_empty())
            })
            .cloned()
            .collect();
        if waiting.is_empty() {
            stack_warn!(context = LogContext::new().with_action(action), "no programs to wait for");
        }
        let functors = PhaseFunctors::new(move |_: &str, instance: &Instance| {
            instance.runtime().wait_active(between, attempts)?;
            Ok(Outcome::Done)
        });
        run_phase(action, "wait", &waiting, self.instances(), &functors, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ironstack_runtime::Status;

    #[test]
    fn outcome_renders_for_summary() {
        assert_eq!(Outcome::Count(3).to_string(), "3");
        assert_eq!(
            Outcome::Statuses(vec![
                ProgramStatus::new("api", Status::Started, ""),
                ProgramStatus::new("worker", Status::Stopped, ""),
            ])
            .to_string(),
            "api=started, worker=stopped"
        );
        assert_eq!(Outcome::Artifact(None).to_string(), "nothing packaged");
        assert_eq!(Action::Start { wait: true }.to_string(), "start");
    }

    #[test]
    fn report_shows_phase_totals() {
        let report = ActionReport {
            action: "start",
            components: vec!["db".into(), "api".into(), "web".into()],
            phases: vec![PhaseSummary {
                phase: "start".into(),
                results: vec![
                    ("db".into(), Outcome::Count(1)),
                    ("api".into(), Outcome::Count(2)),
                ],
                skipped: vec!["web".into()],
            }],
        };
        assert_eq!(report.phases[0].completed(), 2);
        assert_eq!(report.phases[0].total(Outcome::tally), 3);
        let rendered = report.to_string();
        assert!(rendered.contains("  start: 2 completed, 1 skipped, total 3\n"));
        assert!(rendered.contains("    api: 2\n"));
        assert!(rendered.contains("    web: already done\n"));
    }

    #[test]
    fn install_and_uninstall_phase_order() {
        let install: Vec<&str> = INSTALL.iter().map(|step| step.phase).collect();
        assert_eq!(
            install,
            ["download", "prepare", "configure", "pre-install", "install", "post-install"]
        );
        let uninstall: Vec<&str> = UNINSTALL.iter().map(|step| step.phase).collect();
        assert_eq!(
            uninstall,
            ["stop", "unconfigure", "pre-uninstall", "uninstall", "post-uninstall"]
        );
    }
}
