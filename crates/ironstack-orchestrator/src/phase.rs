//! ---
//! ironstack_section: "07-phase-orchestration"
//! ironstack_subsection: "module"
//! ironstack_type: "source"
//! ironstack_scope: "code"
//! ironstack_description: "Phase runner and completion markers."
//! ironstack_version: "v0.0.0-prealpha"
//! ironstack_owner: "tbd"
//! ---
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use indexmap::{IndexMap, IndexSet};
use ironstack_common::{ConfigError, ExecutionContext};
use ironstack_logging::{log_lifecycle_event, stack_debug, LifecycleOutcome, LogContext};
use ironstack_shell::ShellError;
use serde::Serialize;
use walkdir::WalkDir;

use crate::{OrchestratorError, Result};

/// File extension of phase marker files.
pub const MARKER_EXTENSION: &str = "phases";

type Hook<'f, I> = Box<dyn Fn(&str, &I) -> Result<()> + 'f>;
type Operation<'f, I, T> = Box<dyn Fn(&str, &I) -> Result<T> + 'f>;
type EndHook<'f, I, T> = Box<dyn Fn(&str, &I, &T) -> Result<()> + 'f>;

/// Callbacks invoked for every component visited by a phase.
pub struct PhaseFunctors<'f, I, T> {
    /// Runs before the operation.
    pub start: Option<Hook<'f, I>>,
    /// The phase operation itself.
    pub run: Operation<'f, I, T>,
    /// Runs after a successful operation with its result.
    pub end: Option<EndHook<'f, I, T>>,
}

impl<'f, I, T> PhaseFunctors<'f, I, T> {
    /// Functors with only an operation.
    pub fn new(run: impl Fn(&str, &I) -> Result<T> + 'f) -> Self {
        Self {
            start: None,
            run: Box::new(run),
            end: None,
        }
    }

    /// Attach a start hook.
    pub fn with_start(mut self, start: impl Fn(&str, &I) -> Result<()> + 'f) -> Self {
        self.start = Some(Box::new(start));
        self
    }

    /// Attach an end hook.
    pub fn with_end(mut self, end: impl Fn(&str, &I, &T) -> Result<()> + 'f) -> Self {
        self.end = Some(Box::new(end));
        self
    }
}

/// Per-component results of one phase.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseSummary<T> {
    /// Phase name.
    pub phase: String,
    /// `(component, result)` in visiting order.
    pub results: Vec<(String, T)>,
    /// Components skipped because they were already marked complete.
    pub skipped: Vec<String>,
}

impl<T> PhaseSummary<T> {
    fn new(phase: &str) -> Self {
        Self {
            phase: phase.to_owned(),
            results: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Components the phase ran to completion.
    pub fn completed(&self) -> usize {
        self.results.len()
    }

    /// Phase-wide sum of `tally` over every result.
    pub fn total(&self, tally: impl Fn(&T) -> usize) -> usize {
        self.results.iter().map(|(_, result)| tally(result)).sum()
    }

    /// Map every result, keeping order.
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> PhaseSummary<U> {
        PhaseSummary {
            phase: self.phase,
            results: self.results.into_iter().map(|(name, r)| (name, f(r))).collect(),
            skipped: self.skipped,
        }
    }
}

/// Run one phase of `action` over `names`.
///
/// Every name must be present in `instances`. The first failing hook or
/// operation ends the phase; later components are not visited. When a
/// recorder is given, already-marked components are skipped and successful
/// ones are marked.
pub fn run_phase<I, T>(
    action: &str,
    phase: &str,
    names: &[String],
    instances: &IndexMap<String, I>,
    functors: &PhaseFunctors<'_, I, T>,
    recorder: Option<&PhaseRecorder>,
) -> Result<PhaseSummary<T>> {
    if let Some(unknown) = names.iter().find(|name| !instances.contains_key(*name)) {
        return Err(ConfigError::UnknownComponent(unknown.clone()).into());
    }
    let marked = match recorder {
        Some(recorder) => recorder.marked(phase)?,
        None => IndexSet::new(),
    };

    let mut summary = PhaseSummary::new(phase);
    for name in names {
        let ctx = LogContext::new()
            .with_action(action)
            .with_phase(phase)
            .with_component(name);
        if marked.contains(name) {
            stack_debug!(context = ctx, "already completed, skipping");
            log_lifecycle_event(Some(&ctx), "phase", "already completed", LifecycleOutcome::Skipped);
            summary.skipped.push(name.clone());
            continue;
        }
        let Some(instance) = instances.get(name) else {
            continue;
        };
        let result = visit(name, instance, functors);
        let result = match result {
            Ok(result) => result,
            Err(err) => {
                log_lifecycle_event(Some(&ctx), "phase", &err.to_string(), LifecycleOutcome::Fault);
                return Err(OrchestratorError::PhaseFailed {
                    action: action.to_owned(),
                    phase: phase.to_owned(),
                    component: name.clone(),
                    source: Box::new(err),
                });
            }
        };
        if let Some(recorder) = recorder {
            recorder.mark(phase, name)?;
        }
        log_lifecycle_event(Some(&ctx), "phase", "completed", LifecycleOutcome::Success);
        summary.results.push((name.clone(), result));
    }
    Ok(summary)
}

fn visit<I, T>(name: &str, instance: &I, functors: &PhaseFunctors<'_, I, T>) -> Result<T> {
    if let Some(start) = &functors.start {
        start(name, instance)?;
    }
    let result = (functors.run)(name, instance)?;
    if let Some(end) = &functors.end {
        end(name, instance, &result)?;
    }
    Ok(result)
}

/// Completion markers for the phases of one action.
///
/// Markers live in `<phase_dir>/<action>.<phase>.phases`, one component name
/// per line.
#[derive(Debug, Clone)]
pub struct PhaseRecorder {
    dir: PathBuf,
    action: String,
    ctx: ExecutionContext,
}

impl PhaseRecorder {
    /// Recorder for `action` keeping markers under `dir`.
    pub fn new(dir: impl Into<PathBuf>, action: impl Into<String>, ctx: ExecutionContext) -> Self {
        Self {
            dir: dir.into(),
            action: action.into(),
            ctx,
        }
    }

    /// Marker file of `phase`.
    pub fn marker_path(&self, phase: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}.{}", self.action, phase, MARKER_EXTENSION))
    }

    /// Components already marked complete for `phase`.
    pub fn marked(&self, phase: &str) -> Result<IndexSet<String>> {
        let path = self.marker_path(phase);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(IndexSet::new()),
            Err(source) => return Err(io_error("read", &path, source)),
        };
        Ok(contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect())
    }

    /// Whether `component` completed `phase` before.
    pub fn is_marked(&self, phase: &str, component: &str) -> Result<bool> {
        Ok(self.marked(phase)?.contains(component))
    }

    /// Record that `component` completed `phase`.
    pub fn mark(&self, phase: &str, component: &str) -> Result<()> {
        let path = self.marker_path(phase);
        if self.ctx.is_dry_run() {
            stack_debug!("dry-run: not marking {component} in {}", path.display());
            return Ok(());
        }
        fs::create_dir_all(&self.dir).map_err(|source| io_error("create", &self.dir, source))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| io_error("open", &path, source))?;
        writeln!(file, "{component}").map_err(|source| io_error("append to", &path, source))?;
        Ok(())
    }

    /// Delete every marker file left by any of `actions`; returns how many went.
    pub fn clear(&self, actions: &[&str]) -> Result<usize> {
        if !self.dir.is_dir() {
            return Ok(0);
        }
        let mut removed = 0;
        for entry in WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy();
            let stale = actions.iter().any(|action| {
                file_name.starts_with(&format!("{action}."))
                    && file_name.ends_with(&format!(".{MARKER_EXTENSION}"))
            });
            if stale && ironstack_shell::unlink(self.ctx, entry.path(), false)? {
                stack_debug!("removed stale phase marker {}", entry.path().display());
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn io_error(action: &'static str, path: &Path, source: std::io::Error) -> OrchestratorError {
    ShellError::Io {
        action,
        path: path.to_path_buf(),
        source,
    }
    .into()
}
