//! ---
//! ironstack_section: "05-component-lifecycle"
//! ironstack_subsection: "module"
//! ironstack_type: "source"
//! ironstack_scope: "code"
//! ironstack_description: "Package-manager strategies."
//! ironstack_version: "v0.0.0-prealpha"
//! ironstack_owner: "tbd"
//! ---
use std::sync::Arc;

use ironstack_common::template::expand_all;
use ironstack_common::{ExecutionContext, PackageSpec, Params};
use ironstack_shell::{execute, ExecOptions, ShellError};
use ironstack_trace::TraceWriter;
use tracing::{debug, info};

use crate::distro::Distro;
use crate::package::{filter_package, package_params};
use crate::Result;

/// Strategy id of the built-in package manager.
pub const DEFAULT_PACKAGER: &str = "command";

/// Run-wide inputs handed to every package-manager constructor.
#[derive(Debug, Clone)]
pub struct PackagerSettings {
    pub distro: Arc<Distro>,
    pub ctx: ExecutionContext,
    /// Remove packages on uninstall even when they are not marked removable.
    pub purge: bool,
}

/// Installs and removes one kind of package.
///
/// One instance is shared by every package naming the same strategy id.
pub trait PackageManager: Send + Sync {
    fn id(&self) -> &str;

    /// Called during the pre-install phase for every declared package.
    fn pre_install(&self, package: &PackageSpec, params: &Params, tracer: &TraceWriter) -> Result<()>;

    /// Called during the post-install phase for every declared package.
    fn post_install(&self, _package: &PackageSpec, _params: &Params, _tracer: &TraceWriter) -> Result<()> {
        Ok(())
    }

    /// Remove a journaled package. Returns whether it was removed.
    fn remove(&self, package: &PackageSpec) -> Result<bool>;
}

pub type PackagerConstructor =
    Arc<dyn Fn(&PackagerSettings) -> Result<Arc<dyn PackageManager>> + Send + Sync>;

/// Package manager driven by the distro's `package` commands.
///
/// * `package query` (optional): exit 0 means already installed; nothing is
///   installed or journaled.
/// * `package install`: installs and journals `PACKAGE_INSTALLED`.
/// * `package remove`: runs on uninstall for packages marked `removable = "true"`,
///   or for every package when purging.
///
/// Commands are templated with `$(NAME)`, `$(VERSION)` and the component params.
#[derive(Debug, Clone)]
pub struct CommandPackager {
    settings: PackagerSettings,
}

impl CommandPackager {
    pub fn new(settings: &PackagerSettings) -> Self {
        Self {
            settings: settings.clone(),
        }
    }

    pub fn constructor() -> PackagerConstructor {
        Arc::new(|settings: &PackagerSettings| -> Result<Arc<dyn PackageManager>> {
            Ok(Arc::new(CommandPackager::new(settings)))
        })
    }

    fn already_installed(&self, package: &PackageSpec, params: &Params) -> Result<bool> {
        if !self.settings.distro.has_command("package", "query") || self.settings.ctx.is_dry_run() {
            return Ok(false);
        }
        let argv = expand_all(&self.settings.distro.get_command("package", "query")?, params);
        match execute(self.settings.ctx, &argv, &ExecOptions::default()) {
            Ok(_) => Ok(true),
            Err(ShellError::ProcessExecution { .. }) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

impl PackageManager for CommandPackager {
    fn id(&self) -> &str {
        DEFAULT_PACKAGER
    }

    fn pre_install(&self, package: &PackageSpec, params: &Params, tracer: &TraceWriter) -> Result<()> {
        let params = package_params(package, params);
        if self.already_installed(package, &params)? {
            debug!(package = %package.name, "package already present, not installing");
            return Ok(());
        }
        let argv = expand_all(&self.settings.distro.get_command("package", "install")?, &params);
        info!(package = %package.name, version = package.version.as_deref().unwrap_or(""), "installing package");
        execute(self.settings.ctx, &argv, &ExecOptions::default())?;
        tracer.package_installed(&filter_package(package))?;
        Ok(())
    }

    fn remove(&self, package: &PackageSpec) -> Result<bool> {
        let removable = package
            .extra
            .get("removable")
            .map(|value| value.eq_ignore_ascii_case("true"))
            .unwrap_or(self.settings.purge);
        if !removable {
            debug!(package = %package.name, "package not removable, keeping it");
            return Ok(false);
        }
        let argv = expand_all(
            &self.settings.distro.get_command("package", "remove")?,
            &package_params(package, &Params::new()),
        );
        info!(package = %package.name, "removing package");
        execute(self.settings.ctx, &argv, &ExecOptions::default())?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ironstack_trace::{OpenMode, TraceReader};
    use tempfile::tempdir;

    fn settings(dir: &std::path::Path, purge: bool) -> PackagerSettings {
        let log = dir.join("pkg.log").display().to_string();
        let distro = Distro::new("test", DEFAULT_PACKAGER)
            .with_command("package", "install", ["sh", "-c", &format!("echo install $(NAME)-$(VERSION) >> {log}")])
            .with_command("package", "remove", ["sh", "-c", &format!("echo remove $(NAME) >> {log}")]);
        PackagerSettings {
            distro: Arc::new(distro),
            ctx: ExecutionContext::live(),
            purge,
        }
    }

    #[test]
    fn install_runs_command_and_journals() {
        let dir = tempdir().unwrap();
        let trace = dir.path().join("c/created.trace");
        let tracer = TraceWriter::open(&trace, OpenMode::Append, ExecutionContext::live()).unwrap();
        let packager = CommandPackager::new(&settings(dir.path(), false));
        let mut package = PackageSpec::named("qpid");
        package.version = Some("1.0".into());

        packager.pre_install(&package, &Params::new(), &tracer).unwrap();
        packager.post_install(&package, &Params::new(), &tracer).unwrap();

        let log = std::fs::read_to_string(dir.path().join("pkg.log")).unwrap();
        assert_eq!(log, "install qpid-1.0\n");
        let installed = TraceReader::open(&trace).packages_installed().unwrap();
        assert_eq!(installed.len(), 1);
        assert_eq!(installed[0]["name"], "qpid");
    }

    #[test]
    fn remove_honours_removable_and_purge() {
        let dir = tempdir().unwrap();
        let keep = CommandPackager::new(&settings(dir.path(), false));
        assert!(!keep.remove(&PackageSpec::named("a")).unwrap());

        let mut removable = PackageSpec::named("b");
        removable.extra.insert("removable".into(), "true".into());
        assert!(keep.remove(&removable).unwrap());

        let purge = CommandPackager::new(&settings(dir.path(), true));
        assert!(purge.remove(&PackageSpec::named("c")).unwrap());

        let log = std::fs::read_to_string(dir.path().join("pkg.log")).unwrap();
        assert_eq!(log, "remove b\nremove c\n");
    }
}
