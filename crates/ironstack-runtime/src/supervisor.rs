//! ---
//! ironstack_section: "06-process-supervision"
//! ironstack_subsection: "module"
//! ironstack_type: "source"
//! ironstack_scope: "code"
//! ironstack_description: "Start, stop, status and readiness polling for component programs."
//! ironstack_version: "v0.0.0-prealpha"
//! ironstack_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ironstack_common::template::expand_all;
use ironstack_common::{Params, StrategyCache};
use ironstack_components::Component;
use ironstack_trace::{AppStartRecord, OpenMode, TraceBucket, TraceReader, TraceWriter};
use tracing::{debug, info, warn};

use crate::fork::FORK_RUNNER;
use crate::program::{Program, ProgramStatus, Status};
use crate::runner::{Investigator, KillPolicy, Runner, RunnerRegistry, RunnerSettings, Starter};
use crate::{Result, RuntimeError};

/// Supervises the applications of one component through its `start` trace.
pub struct ProgramRuntime {
    component: Component,
    runners: Arc<RunnerRegistry>,
    kill: KillPolicy,
    investigators: StrategyCache<dyn Runner>,
}

impl std::fmt::Debug for ProgramRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgramRuntime")
            .field("component", &self.component.name())
            .field("runners", &self.runners.ids().collect::<Vec<_>>())
            .field("kill", &self.kill)
            .finish()
    }
}

impl ProgramRuntime {
    pub fn new(component: Component, runners: Arc<RunnerRegistry>, kill: KillPolicy) -> Self {
        Self {
            component,
            runners,
            kill,
            investigators: StrategyCache::new(),
        }
    }

    pub fn component(&self) -> &Component {
        &self.component
    }

    pub fn trace_path(&self) -> Result<PathBuf> {
        Ok(self.component.trace_path(TraceBucket::Start)?)
    }

    /// Programs this component runs, in declaration order.
    pub fn applications(&self) -> Vec<Program> {
        self.component.programs().iter().map(Program::from).collect()
    }

    /// Component parameters plus `APP_NAME`.
    pub fn app_params(&self, app: &Program) -> Params {
        let mut params = self.component.params();
        params.insert("APP_NAME".to_owned(), app.name.clone());
        params
    }

    fn settings(&self) -> Result<RunnerSettings> {
        Ok(RunnerSettings {
            component: self.component.name().to_owned(),
            trace_dir: self.component.trace_dir()?,
            ctx: self.component.context(),
            kill: self.kill,
        })
    }

    fn build_runner(&self, id: &str) -> Result<Arc<dyn Runner>> {
        let constructor = self.runners.resolve(id)?;
        constructor(&self.settings()?)
    }

    fn investigator(&self, starter_id: &str) -> Result<Arc<dyn Runner>> {
        self.investigators
            .get_or_try_insert(starter_id, || self.build_runner(starter_id))
    }

    /// Started applications according to the journal; absent journal reads as none.
    fn started(&self) -> Result<Vec<AppStartRecord>> {
        match TraceReader::open(self.trace_path()?).apps_started() {
            Ok(apps) => Ok(apps),
            Err(err) if err.is_no_trace() => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn pre_start(&self) -> Result<()> {
        Ok(())
    }

    pub fn post_start(&self) -> Result<()> {
        Ok(())
    }

    /// Launch every program; returns how many were started.
    pub fn start(&self) -> Result<usize> {
        let name = self.component.name();
        let already = self.started()?;
        if !already.is_empty() {
            return Err(RuntimeError::AlreadyStarted {
                component: name.to_owned(),
                count: already.len(),
            });
        }
        let apps = self.applications();
        if apps.is_empty() {
            debug!(component = %name, "no programs to start");
            return Ok(0);
        }

        let run_type = self.component.options().get_or("run_type", FORK_RUNNER);
        let starter = self.build_runner(&run_type)?;
        let tracer = TraceWriter::open(self.trace_path()?, OpenMode::Exclusive, self.component.context())?;
        let default_dir = self.component.app_dir()?;

        info!(component = %name, count = apps.len(), runner = %run_type, "starting programs");
        let mut started = 0;
        for app in &apps {
            let params = self.app_params(app);
            let argv = expand_all(&app.argv, &params);
            let working_dir = app.working_dir.clone().unwrap_or_else(|| default_dir.clone());
            let detail = starter.start(&app.name, &app.path, &working_dir, &argv)?;
            tracer.app_started(&app.name, &detail, starter.id())?;
            info!(component = %name, app = %app.name, detail = %detail, "started program");
            started += 1;
        }
        Ok(started)
    }

    /// Stop every journaled application; returns how many were stopped.
    ///
    /// The start journal is removed only when all of them stopped. Otherwise
    /// each failure is appended to it as a stop-failure record.
    pub fn stop(&self) -> Result<usize> {
        let name = self.component.name();
        let path = self.trace_path()?;
        let started = self.started()?;
        if started.is_empty() {
            debug!(component = %name, "no programs recorded as started");
            return Ok(0);
        }

        let mut stopped = 0;
        let mut failures = Vec::new();
        for app in &started {
            let outcome = self
                .investigator(&app.starter_id)
                .and_then(|investigator| investigator.stop(&app.name));
            match outcome {
                Ok(()) => {
                    debug!(component = %name, app = %app.name, "stopped program");
                    stopped += 1;
                }
                Err(err) => {
                    warn!(component = %name, app = %app.name, error = %err, "failed stopping program");
                    failures.push((app.name.clone(), err.to_string()));
                }
            }
        }

        if failures.is_empty() {
            ironstack_trace::remove(&path, self.component.context())?;
        } else {
            let tracer = TraceWriter::open(&path, OpenMode::Append, self.component.context())?;
            for (app, reason) in &failures {
                tracer.app_stop_failed(app, reason)?;
            }
            warn!(
                component = %name,
                stopped,
                expected = started.len(),
                trace = %path.display(),
                "not all programs stopped, keeping start trace"
            );
        }
        Ok(stopped)
    }

    /// Current status of every journaled application that can be investigated.
    pub fn statii(&self) -> Result<Vec<ProgramStatus>> {
        let mut statii = Vec::new();
        for app in self.started()? {
            let investigator = match self.investigator(&app.starter_id) {
                Ok(investigator) => investigator,
                Err(err) => {
                    warn!(component = %self.component.name(), app = %app.name, error = %err, "no investigator for program");
                    continue;
                }
            };
            statii.push(investigator.status(&app.name)?);
        }
        Ok(statii)
    }

    /// Poll until every application reports `started`.
    pub fn wait_active(&self, between_wait: Duration, max_attempts: u32) -> Result<()> {
        let name = self.component.name();
        let expected = self.applications().len();
        if expected == 0 {
            return Err(RuntimeError::NothingToWait {
                component: name.to_owned(),
            });
        }
        let ctx = self.component.context();
        if ctx.is_dry_run() {
            debug!(component = %name, "dry-run: not waiting for programs");
            return Ok(());
        }
        for attempt in 1..=max_attempts {
            let statii = self.statii()?;
            if statii.len() >= expected && statii.iter().all(|s| s.status == Status::Started) {
                info!(component = %name, attempt, "all programs active");
                return Ok(());
            }
            debug!(component = %name, attempt, max_attempts, "programs not active yet");
            ironstack_shell::sleep(ctx, between_wait);
        }
        Err(RuntimeError::wait_timeout(name, between_wait, max_attempts))
    }

    /// Stop then start; returns how many were started.
    pub fn restart(&self) -> Result<usize> {
        self.stop()?;
        self.start()
    }
}
