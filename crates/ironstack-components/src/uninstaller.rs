//! ---
//! ironstack_section: "05-component-lifecycle"
//! ironstack_subsection: "module"
//! ironstack_type: "source"
//! ironstack_scope: "code"
//! ironstack_description: "Journal-driven uninstall operations."
//! ironstack_version: "v0.0.0-prealpha"
//! ironstack_owner: "tbd"
//! ---
use indexmap::IndexSet;
use ironstack_common::ComponentFlavor;
use ironstack_common::template::expand_all;
use ironstack_shell::{deldir, execute, unlink, ExecOptions};
use ironstack_trace::{TraceBucket, TraceError, TraceReader};
use tracing::{debug, info, warn};

use crate::component::Component;
use crate::package::package_from_fields;
use crate::Result;

/// Uninstall-side lifecycle of one component.
///
/// Everything undone is taken from the `created` journal; a component that
/// never got a journal has nothing to undo.
#[derive(Debug)]
pub struct PkgUninstaller {
    component: Component,
    reader: TraceReader,
}

impl PkgUninstaller {
    pub fn new(component: Component) -> Result<Self> {
        let reader = TraceReader::open(component.trace_path(TraceBucket::Created)?);
        Ok(Self { component, reader })
    }

    pub fn component(&self) -> &Component {
        &self.component
    }

    /// Run a journal query, mapping a missing journal to an empty result.
    fn replay<T: Default>(&self, query: impl FnOnce(&TraceReader) -> ironstack_trace::Result<T>) -> Result<T> {
        match query(&self.reader) {
            Ok(value) => Ok(value),
            Err(TraceError::NoTrace(path)) => {
                debug!(component = %self.component.name(), path = %path.display(), "no install trace, nothing to undo");
                Ok(T::default())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Remove every journaled symlink.
    pub fn unconfigure(&self) -> Result<usize> {
        let links = self.replay(TraceReader::symlinks_made)?;
        if !links.is_empty() {
            info!(component = %self.component.name(), links = links.len(), "removing symlinks");
        }
        for link in &links {
            unlink(self.component.context(), link, true)?;
        }
        Ok(links.len())
    }

    pub fn pre_uninstall(&self) -> Result<()> {
        Ok(())
    }

    /// Undo setups (python flavour), then journaled packages, then touched files.
    pub fn uninstall(&self) -> Result<()> {
        if self.component.flavor() == ComponentFlavor::Python {
            self.uninstall_python()?;
        }
        self.uninstall_packages()?;
        self.uninstall_files()
    }

    /// Remove journaled directories that still exist.
    pub fn post_uninstall(&self) -> Result<usize> {
        let alive: Vec<_> = self
            .replay(TraceReader::dirs_made)?
            .into_iter()
            .filter(|dir| dir.is_dir())
            .collect();
        if !alive.is_empty() {
            info!(component = %self.component.name(), directories = alive.len(), "removing created directories");
        }
        let mut removed = 0;
        for dir in &alive {
            // An earlier entry may already have removed this one as a subtree.
            if deldir(self.component.context(), dir)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn uninstall_python(&self) -> Result<()> {
        let locations: IndexSet<_> = self
            .replay(TraceReader::py_listing)?
            .into_iter()
            .map(|record| record.location)
            .collect();
        if locations.is_empty() {
            return Ok(());
        }
        info!(component = %self.component.name(), setups = locations.len(), "uninstalling python setups");
        let unsetup = expand_all(
            &self.component.distro().get_command("python", "unsetup")?,
            &self.component.params(),
        );
        for location in &locations {
            if location.is_dir() {
                execute(self.component.context(), &unsetup, &ExecOptions::default().in_dir(location))?;
            } else {
                warn!(path = %location.display(), "no python directory found, skipping");
            }
        }
        Ok(())
    }

    fn uninstall_packages(&self) -> Result<Vec<String>> {
        let packages = self.replay(TraceReader::packages_installed)?;
        if packages.is_empty() {
            return Ok(Vec::new());
        }
        info!(component = %self.component.name(), packages = packages.len(), "potentially removing distribution packages");
        let mut removed = Vec::new();
        for fields in &packages {
            let package = package_from_fields(fields);
            let packager = self.component.strategies().packager_for(&package)?;
            if packager.remove(&package)? {
                removed.push(package.name);
            }
        }
        info!(component = %self.component.name(), removed = ?removed, "removed distribution packages");
        Ok(removed)
    }

    fn uninstall_files(&self) -> Result<()> {
        let files = self.replay(TraceReader::files_touched)?;
        if !files.is_empty() {
            info!(component = %self.component.name(), files = files.len(), "removing miscellaneous files");
        }
        for file in &files {
            unlink(self.component.context(), file, true)?;
        }
        Ok(())
    }
}

