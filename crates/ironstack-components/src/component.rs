//! ---
//! ironstack_section: "05-component-lifecycle"
//! ironstack_subsection: "module"
//! ironstack_type: "source"
//! ironstack_scope: "code"
//! ironstack_description: "Component instances and the strategy registries they resolve from."
//! ironstack_version: "v0.0.0-prealpha"
//! ironstack_owner: "tbd"
//! ---
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ironstack_common::{
    ComponentFlavor, ComponentOptions, ComponentSpec, ExecutionContext, PackageSpec, Params,
    ProgramSpec, Registry, StaticOptions, StrategyCache,
};
use ironstack_trace::TraceBucket;
use tracing::debug;

use crate::configurator::{Configurator, TemplateConfigurator};
use crate::distro::Distro;
use crate::downloader::{
    DownloadSettings, Downloader, DownloaderConstructor, GitDownloader, DEFAULT_DOWNLOADER,
};
use crate::packager::{
    CommandPackager, PackageManager, PackagerConstructor, PackagerSettings, DEFAULT_PACKAGER,
};
use crate::Result;

/// Run-wide strategy registries shared by every component.
///
/// Package managers are cached per strategy id, so every package naming the
/// same id talks to one instance.
pub struct Strategies {
    distro: Arc<Distro>,
    ctx: ExecutionContext,
    purge_packages: bool,
    packagers: Registry<PackagerConstructor>,
    packager_cache: StrategyCache<dyn PackageManager>,
    downloaders: Registry<DownloaderConstructor>,
}

impl std::fmt::Debug for Strategies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Strategies")
            .field("distro", &self.distro.name())
            .field("packagers", &self.packagers)
            .field("downloaders", &self.downloaders)
            .finish()
    }
}

impl Strategies {
    /// Registries holding the built-in `command` packager and `git` downloader.
    pub fn new(distro: Arc<Distro>, ctx: ExecutionContext, purge_packages: bool) -> Self {
        Self {
            distro,
            ctx,
            purge_packages,
            packagers: Registry::new("package manager")
                .with(DEFAULT_PACKAGER, CommandPackager::constructor()),
            packager_cache: StrategyCache::new(),
            downloaders: Registry::new("downloader")
                .with(DEFAULT_DOWNLOADER, GitDownloader::constructor()),
        }
    }

    pub fn register_packager(&mut self, id: impl Into<String>, constructor: PackagerConstructor) -> &mut Self {
        self.packagers.register(id, constructor);
        self
    }

    pub fn register_downloader(&mut self, id: impl Into<String>, constructor: DownloaderConstructor) -> &mut Self {
        self.downloaders.register(id, constructor);
        self
    }

    pub fn distro(&self) -> &Arc<Distro> {
        &self.distro
    }

    pub fn context(&self) -> ExecutionContext {
        self.ctx
    }

    /// Cached package manager for a strategy id.
    pub fn packager(&self, id: &str) -> Result<Arc<dyn PackageManager>> {
        self.packager_cache.get_or_try_insert(id, || {
            let constructor = self.packagers.resolve(id)?;
            debug!(packager = %id, "constructing package manager");
            constructor(&PackagerSettings {
                distro: Arc::clone(&self.distro),
                ctx: self.ctx,
                purge: self.purge_packages,
            })
        })
    }

    /// Package manager for a package: the one it names, else the distro default.
    pub fn packager_for(&self, package: &PackageSpec) -> Result<Arc<dyn PackageManager>> {
        let id = package
            .packager_name
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| self.distro.package_manager());
        self.packager(id)
    }

    pub fn downloader(&self, id: &str, uri: &str, target: &Path) -> Result<Box<dyn Downloader>> {
        let constructor = self.downloaders.resolve(id)?;
        constructor(
            &DownloadSettings {
                distro: Arc::clone(&self.distro),
                ctx: self.ctx,
            },
            uri,
            target,
        )
    }
}

/// One component instance, built once per run from static descriptive data.
///
/// Stateless across runs except through its journals.
#[derive(Debug, Clone)]
pub struct Component {
    name: String,
    flavor: ComponentFlavor,
    spec: ComponentSpec,
    options: ComponentOptions,
    strategies: Arc<Strategies>,
    ctx: ExecutionContext,
}

impl Component {
    pub fn builder(name: impl Into<String>) -> ComponentBuilder {
        ComponentBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flavor(&self) -> ComponentFlavor {
        self.flavor
    }

    pub fn spec(&self) -> &ComponentSpec {
        &self.spec
    }

    pub fn options(&self) -> &ComponentOptions {
        &self.options
    }

    pub fn strategies(&self) -> &Arc<Strategies> {
        &self.strategies
    }

    pub fn distro(&self) -> &Distro {
        self.strategies.distro()
    }

    pub fn context(&self) -> ExecutionContext {
        self.ctx
    }

    /// This component's journal directory (`trace_dir` option).
    pub fn trace_dir(&self) -> Result<PathBuf> {
        Ok(self.options.require_path("trace_dir")?)
    }

    pub fn trace_path(&self, bucket: TraceBucket) -> Result<PathBuf> {
        Ok(self.trace_dir()?.join(bucket.file_name()))
    }

    pub fn app_dir(&self) -> Result<PathBuf> {
        Ok(self.options.require_path("app_dir")?)
    }

    /// Template parameters: every option upper-cased, plus `COMPONENT`.
    pub fn params(&self) -> Params {
        self.options.params()
    }

    /// Subsystems whose packages are installed: those listed in the
    /// `subsystems` option, or every declared one when the option is absent.
    pub fn active_subsystems(&self) -> Vec<String> {
        let declared = self.spec.subsystems.keys().cloned();
        if self.options.is_declared("subsystems") {
            let wanted = self.options.get_list("subsystems");
            declared.filter(|name| wanted.contains(name)).collect()
        } else {
            declared.collect()
        }
    }

    /// Own packages followed by every active subsystem's packages.
    pub fn packages(&self) -> Vec<PackageSpec> {
        let mut packages = self.spec.packages.clone();
        for name in self.active_subsystems() {
            if let Some(subsystem) = self.spec.subsystems.get(&name) {
                debug!(component = %self.name, subsystem = %name, "extending package list with subsystem packages");
                packages.extend(subsystem.packages.iter().cloned());
            }
        }
        packages
    }

    pub fn programs(&self) -> &[ProgramSpec] {
        &self.spec.programs
    }

    pub fn configurator(&self) -> Box<dyn Configurator> {
        Box::new(TemplateConfigurator::new(
            self.name.clone(),
            self.spec.config_files.clone(),
            self.spec.symlinks.clone(),
            self.params(),
        ))
    }

    /// Packaging hook; no component produces a package artifact yet.
    pub fn package(&self) -> Result<Option<PathBuf>> {
        debug!(component = %self.name, "no packaging support, skipping");
        Ok(None)
    }
}

/// Builder for [`Component`].
#[derive(Debug)]
pub struct ComponentBuilder {
    name: String,
    flavor: ComponentFlavor,
    spec: ComponentSpec,
    options: Option<ComponentOptions>,
    strategies: Option<Arc<Strategies>>,
    ctx: ExecutionContext,
}

impl ComponentBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flavor: ComponentFlavor::default(),
            spec: ComponentSpec::default(),
            options: None,
            strategies: None,
            ctx: ExecutionContext::default(),
        }
    }

    /// Take descriptive data (and flavor) from a configuration entry.
    pub fn spec(mut self, spec: ComponentSpec) -> Self {
        self.flavor = spec.flavor;
        self.spec = spec;
        self
    }

    pub fn flavor(mut self, flavor: ComponentFlavor) -> Self {
        self.flavor = flavor;
        self
    }

    pub fn options(mut self, options: ComponentOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn strategies(mut self, strategies: Arc<Strategies>) -> Self {
        self.strategies = Some(strategies);
        self
    }

    pub fn context(mut self, ctx: ExecutionContext) -> Self {
        self.ctx = ctx;
        self
    }

    pub fn build(self) -> Component {
        let ctx = self.ctx;
        let options = self
            .options
            .unwrap_or_else(|| ComponentOptions::new(self.name.clone(), Arc::new(StaticOptions::new())));
        let strategies = self.strategies.unwrap_or_else(|| {
            Arc::new(Strategies::new(
                Arc::new(Distro::new("generic", DEFAULT_PACKAGER)),
                ctx,
                false,
            ))
        });
        Component {
            name: self.name,
            flavor: self.flavor,
            spec: self.spec,
            options,
            strategies,
            ctx,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ironstack_common::SubsystemSpec;

    fn component(options: StaticOptions) -> Component {
        let mut spec = ComponentSpec::default();
        spec.packages.push(PackageSpec::named("base"));
        spec.subsystems.insert(
            "api".into(),
            SubsystemSpec {
                packages: vec![PackageSpec::named("api-extra")],
            },
        );
        spec.subsystems.insert(
            "cells".into(),
            SubsystemSpec {
                packages: vec![PackageSpec::named("cells-extra")],
            },
        );
        Component::builder("nova")
            .spec(spec)
            .options(ComponentOptions::new("nova", Arc::new(options)))
            .build()
    }

    fn names(packages: Vec<PackageSpec>) -> Vec<String> {
        packages.into_iter().map(|package| package.name).collect()
    }

    #[test]
    fn packages_include_active_subsystems() {
        let all = component(StaticOptions::new());
        assert_eq!(names(all.packages()), vec!["base", "api-extra", "cells-extra"]);

        let some = component(StaticOptions::new().with("nova", "subsystems", "cells"));
        assert_eq!(names(some.packages()), vec!["base", "cells-extra"]);
    }

    #[test]
    fn packager_resolution_caches_per_id() {
        let nova = component(StaticOptions::new());
        let strategies = nova.strategies();
        let first = strategies.packager_for(&PackageSpec::named("x")).unwrap();
        let second = strategies.packager(DEFAULT_PACKAGER).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let mut odd = PackageSpec::named("y");
        odd.packager_name = Some("pip".into());
        let err = strategies.packager_for(&odd).err().unwrap();
        assert!(err.to_string().contains("unknown package manager strategy 'pip'"));
    }

    #[test]
    fn trace_paths_come_from_options() {
        let nova = component(StaticOptions::new().with("nova", "trace_dir", "/t/nova"));
        assert_eq!(
            nova.trace_path(TraceBucket::Start).unwrap(),
            PathBuf::from("/t/nova/start.trace")
        );
        assert!(nova.app_dir().is_err());
        assert!(nova.package().unwrap().is_none());
    }
}
