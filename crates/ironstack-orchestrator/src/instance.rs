//! ---
//! ironstack_section: "07-phase-orchestration"
//! ironstack_subsection: "module"
//! ironstack_type: "source"
//! ironstack_scope: "code"
//! ironstack_description: "Component instances built from configuration."
//! ironstack_version: "v0.0.0-prealpha"
//! ironstack_owner: "tbd"
//! ---
use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use ironstack_common::{
    AppConfig, ComponentOptions, ConfigError, ExecutionContext, OptionProvider,
};
use ironstack_components::{
    Component, Distro, DownloaderConstructor, PackagerConstructor, PkgInstaller, PkgUninstaller,
    Strategies, Tester,
};
use ironstack_runtime::{default_runners, KillPolicy, ProgramRuntime, RunnerConstructor, RunnerRegistry};
use tracing::debug;

use crate::phase::PhaseRecorder;
use crate::Result;

/// One configured component together with its process supervisor.
#[derive(Debug)]
pub struct Instance {
    component: Component,
    runtime: ProgramRuntime,
}

impl Instance {
    /// Pair a component with its supervisor.
    pub fn new(component: Component, runtime: ProgramRuntime) -> Self {
        Self { component, runtime }
    }

    /// Component name.
    pub fn name(&self) -> &str {
        self.component.name()
    }

    /// The component definition.
    pub fn component(&self) -> &Component {
        &self.component
    }

    /// The component's process supervisor.
    pub fn runtime(&self) -> &ProgramRuntime {
        &self.runtime
    }

    /// Install-side operations, journaling into the component's created trace.
    pub fn installer(&self) -> Result<PkgInstaller> {
        Ok(PkgInstaller::new(self.component.clone())?)
    }

    /// Uninstall-side operations, replaying the created trace.
    pub fn uninstaller(&self) -> Result<PkgUninstaller> {
        Ok(PkgUninstaller::new(self.component.clone())?)
    }

    /// Test runner for the component.
    pub fn tester(&self) -> Tester {
        Tester::new(self.component.clone())
    }
}

/// Entry point holding every persona component, ready to run actions.
#[derive(Debug)]
pub struct Orchestrator {
    config: AppConfig,
    ctx: ExecutionContext,
    order: Vec<String>,
    instances: IndexMap<String, Instance>,
}

impl Orchestrator {
    /// Start building from a loaded configuration.
    pub fn builder(config: AppConfig) -> OrchestratorBuilder {
        OrchestratorBuilder::new(config)
    }

    /// Build with the built-in strategies only.
    pub fn from_config(config: AppConfig, ctx: ExecutionContext) -> Result<Self> {
        Self::builder(config).context(ctx).build()
    }

    /// The configuration this orchestrator was built from.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Execution context shared by every instance.
    pub fn context(&self) -> ExecutionContext {
        self.ctx
    }

    /// Component names in persona order.
    pub fn order(&self) -> &[String] {
        &self.order
    }

    /// Instances keyed by component name.
    pub fn instances(&self) -> &IndexMap<String, Instance> {
        &self.instances
    }

    /// Look up one instance.
    pub fn instance(&self, name: &str) -> Option<&Instance> {
        self.instances.get(name)
    }

    /// Marker recorder for `action`.
    pub fn recorder(&self, action: &str) -> PhaseRecorder {
        PhaseRecorder::new(&self.config.paths.phase_dir, action, self.ctx)
    }

    /// Directory holding phase markers.
    pub fn phase_dir(&self) -> &Path {
        &self.config.paths.phase_dir
    }
}

/// Builder for [`Orchestrator`], open for extra strategies.
pub struct OrchestratorBuilder {
    config: AppConfig,
    ctx: Option<ExecutionContext>,
    packagers: Vec<(String, PackagerConstructor)>,
    downloaders: Vec<(String, DownloaderConstructor)>,
    runners: RunnerRegistry,
}

impl OrchestratorBuilder {
    /// Builder over `config` with the built-in strategies registered.
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            ctx: None,
            packagers: Vec::new(),
            downloaders: Vec::new(),
            runners: default_runners(),
        }
    }

    /// Override the execution context; defaults to the configured dry-run flag.
    pub fn context(mut self, ctx: ExecutionContext) -> Self {
        self.ctx = Some(ctx);
        self
    }

    /// Register an extra package-manager strategy.
    pub fn packager(mut self, id: impl Into<String>, constructor: PackagerConstructor) -> Self {
        self.packagers.push((id.into(), constructor));
        self
    }

    /// Register an extra download strategy.
    pub fn downloader(mut self, id: impl Into<String>, constructor: DownloaderConstructor) -> Self {
        self.downloaders.push((id.into(), constructor));
        self
    }

    /// Register an extra runner strategy.
    pub fn runner(mut self, id: impl Into<String>, constructor: RunnerConstructor) -> Self {
        self.runners.register(id, constructor);
        self
    }

    /// Instantiate every component named by the persona.
    pub fn build(self) -> Result<Orchestrator> {
        let config = self.config;
        let ctx = self
            .ctx
            .unwrap_or_else(|| ExecutionContext::new(config.runtime.dry_run));
        let order = config.component_order();
        if let Some(unknown) = order.iter().find(|name| !config.components.contains_key(*name)) {
            return Err(ConfigError::UnknownComponent(unknown.clone()).into());
        }

        let mut strategies = Strategies::new(
            Arc::new(Distro::from(&config.distro)),
            ctx,
            config.runtime.purge_packages,
        );
        for (id, constructor) in self.packagers {
            strategies.register_packager(id, constructor);
        }
        for (id, constructor) in self.downloaders {
            strategies.register_downloader(id, constructor);
        }
        let strategies = Arc::new(strategies);
        let runners = Arc::new(self.runners);
        let options: Arc<dyn OptionProvider> = Arc::new(config.option_tables());
        let kill = KillPolicy {
            attempts: config.runtime.kill_attempts,
            wait: config.runtime.kill_wait,
        };

        let mut instances = IndexMap::new();
        for name in &order {
            let Some(spec) = config.components.get(name) else {
                continue;
            };
            let component = Component::builder(name.clone())
                .spec(spec.clone())
                .options(ComponentOptions::new(name.clone(), Arc::clone(&options)))
                .strategies(Arc::clone(&strategies))
                .context(ctx)
                .build();
            let runtime = ProgramRuntime::new(component.clone(), Arc::clone(&runners), kill);
            debug!(component = %name, flavor = ?spec.flavor, "instantiated component");
            instances.insert(name.clone(), Instance::new(component, runtime));
        }

        Ok(Orchestrator {
            config,
            ctx,
            order,
            instances,
        })
    }
}
