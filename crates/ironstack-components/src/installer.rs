//! ---
//! ironstack_section: "05-component-lifecycle"
//! ironstack_subsection: "module"
//! ironstack_type: "source"
//! ironstack_scope: "code"
//! ironstack_description: "Install-side lifecycle operations."
//! ironstack_version: "v0.0.0-prealpha"
//! ironstack_owner: "tbd"
//! ---
use std::path::PathBuf;

use chrono::{SecondsFormat, Utc};
use indexmap::IndexMap;
use ironstack_common::template::expand_all;
use ironstack_common::{ComponentFlavor, Params};
use ironstack_shell::{
    execute, load_file, mkdirslist, symlink, write_file, write_file_and_backup, ExecOptions,
    ShellError,
};
use ironstack_trace::{OpenMode, TraceBucket, TraceWriter};
use tracing::{debug, info, warn};

use crate::component::Component;
use crate::Result;

const DOWNLOAD_OPTION: &str = "get_from";

/// Install-side lifecycle of one component, journaling into its `created` trace.
///
/// The journal is opened in append mode so repeated install attempts keep
/// adding to the same trace.
#[derive(Debug)]
pub struct PkgInstaller {
    component: Component,
    tracer: TraceWriter,
}

impl PkgInstaller {
    pub fn new(component: Component) -> Result<Self> {
        let tracer = TraceWriter::open(
            component.trace_path(TraceBucket::Created)?,
            OpenMode::Append,
            component.context(),
        )?;
        Ok(Self { component, tracer })
    }

    pub fn component(&self) -> &Component {
        &self.component
    }

    pub fn tracer(&self) -> &TraceWriter {
        &self.tracer
    }

    fn download_option(&self) -> Option<&'static str> {
        match self.component.flavor() {
            ComponentFlavor::Python => Some(DOWNLOAD_OPTION),
            ComponentFlavor::Package if self.component.options().is_declared(DOWNLOAD_OPTION) => {
                Some(DOWNLOAD_OPTION)
            }
            ComponentFlavor::Package => None,
        }
    }

    /// Fetch the component's sources into `app_dir`.
    ///
    /// The download is journaled before fetching so a failed fetch is still
    /// cleaned up by uninstall. Returns the URIs fetched.
    pub fn download(&self) -> Result<Vec<String>> {
        let Some(option) = self.download_option() else {
            debug!(component = %self.component.name(), "nothing to download");
            return Ok(Vec::new());
        };
        let options = self.component.options();
        let uri = options.require(option)?.trim().to_owned();
        let target = self.component.app_dir()?;
        let strategy = options.get_or("download_type", crate::DEFAULT_DOWNLOADER);

        info!(component = %self.component.name(), uri = %uri, target = %target.display(), "downloading from 1 uri");
        mkdirslist(self.component.context(), &target, Some(&self.tracer))?;
        self.tracer.download_happened(&target, &uri)?;
        self.component
            .strategies()
            .downloader(&strategy, &uri, &target)?
            .download()?;
        Ok(vec![uri])
    }

    fn config_params(&self, config_name: &str) -> Params {
        let mut params = self.component.params();
        params.insert("CONFIG_FN".to_owned(), config_name.to_owned());
        params
    }

    fn configure_files(&self) -> Result<usize> {
        let ctx = self.component.context();
        let configurator = self.component.configurator();
        let names = configurator.config_files();
        if !names.is_empty() {
            info!(component = %self.component.name(), files = names.len(), "configuring files");
        }
        for name in &names {
            let target = configurator.target_config(name)?;
            if let Some(parent) = target.parent() {
                mkdirslist(ctx, parent, Some(&self.tracer))?;
            }
            let (source, contents) = configurator.source_config(name)?;
            debug!(source = %source, target = %target.display(), "configuring file");
            let contents = configurator.config_param_replace(name, &contents, &self.config_params(name));
            let contents = configurator.config_adjust(contents, name);
            write_file(ctx, &target, &contents, Some(&self.tracer))?;
        }
        Ok(names.len())
    }

    fn configure_symlinks(&self) -> Result<usize> {
        let links = self.component.configurator().symlinks();
        if links.is_empty() {
            return Ok(0);
        }
        // Reverse-sorted so /etc/x/y is linked before /etc/x.
        let mut sources: Vec<&PathBuf> = links.keys().collect();
        sources.sort();
        sources.reverse();

        let mut made = 0;
        for source in sources {
            for link in &links[source] {
                debug!(link = %link.display(), source = %source.display(), "symlinking");
                match symlink(self.component.context(), source, link, true, Some(&self.tracer)) {
                    Ok(()) => made += 1,
                    Err(err @ ShellError::Io { .. }) => {
                        warn!(link = %link.display(), source = %source.display(), error = %err, "symlinking failed, skipping");
                    }
                    Err(err) => return Err(err.into()),
                }
            }
        }
        Ok(made)
    }

    /// Render config files and create symlinks. Returns files configured plus links made.
    pub fn configure(&self) -> Result<usize> {
        Ok(self.configure_files()? + self.configure_symlinks()?)
    }

    pub fn pre_install(&self) -> Result<()> {
        let params = self.component.params();
        for package in self.component.packages() {
            let packager = self.component.strategies().packager_for(&package)?;
            packager.pre_install(&package, &params, &self.tracer)?;
        }
        Ok(())
    }

    pub fn install(&self) -> Result<()> {
        if self.component.flavor() == ComponentFlavor::Python {
            self.install_python_setups()?;
        }
        Ok(())
    }

    pub fn post_install(&self) -> Result<()> {
        let params = self.component.params();
        for package in self.component.packages() {
            let packager = self.component.strategies().packager_for(&package)?;
            packager.post_install(&package, &params, &self.tracer)?;
        }
        Ok(())
    }

    /// Runs after download; python components clean their requirement files.
    pub fn prepare(&self) -> Result<usize> {
        match self.component.flavor() {
            ComponentFlavor::Python => self.clean_requires_files(),
            ComponentFlavor::Package => Ok(0),
        }
    }

    /// Setup units to install: the component itself, when `app_dir` exists.
    pub fn python_directories(&self) -> IndexMap<String, PathBuf> {
        let mut dirs = IndexMap::new();
        if let Some(app_dir) = self.component.options().get_path("app_dir") {
            if app_dir.is_dir() {
                dirs.insert(self.component.name().to_owned(), app_dir);
            }
        }
        dirs
    }

    fn install_python_setups(&self) -> Result<()> {
        let dirs = self.python_directories();
        if dirs.is_empty() {
            return Ok(());
        }
        info!(component = %self.component.name(), directories = dirs.len(), "setting up python directories");
        let ctx = self.component.context();
        let setup = expand_all(
            &self.component.distro().get_command("python", "setup")?,
            &self.component.params(),
        );
        let trace_dir = self.component.trace_dir()?;
        for (name, working_dir) in &dirs {
            mkdirslist(ctx, working_dir, Some(&self.tracer))?;
            let mut options = ExecOptions::default().in_dir(working_dir);
            if !ctx.is_dry_run() {
                std::fs::create_dir_all(&trace_dir).map_err(|source| ShellError::Io {
                    action: "create directory",
                    path: trace_dir.clone(),
                    source,
                })?;
                options = options.save_output_to(trace_dir.join(format!("{name}.python.setup.log")));
            }
            execute(ctx, &setup, &options)?;
            self.tracer.py_installed(name, working_dir)?;
        }
        Ok(())
    }

    /// Requirement files the python flavour cleans before installing.
    pub fn requires_files(&self) -> Vec<PathBuf> {
        let Some(app_dir) = self.component.options().get_path("app_dir") else {
            return Vec::new();
        };
        let tools = app_dir.join("tools");
        let mut files = vec![tools.join("pip-requires")];
        if self.component.options().get_bool("use_tests_requires", true) {
            files.push(tools.join("test-requires"));
        }
        files
    }

    fn clean_requires_files(&self) -> Result<usize> {
        let present: Vec<PathBuf> = self
            .requires_files()
            .into_iter()
            .filter(|path| path.is_file())
            .collect();
        if present.is_empty() {
            return Ok(0);
        }
        info!(component = %self.component.name(), files = present.len(), "adjusting pip requires files");
        for path in &present {
            let original = load_file(path)?;
            let cleaned = filter_requires(&original);
            let contents = format!(
                "# Cleaned on {}\n\n{}\n",
                Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
                cleaned.join("\n")
            );
            write_file_and_backup(self.component.context(), path, &contents)?;
        }
        Ok(present.len())
    }
}

/// Drop requirement lines that would pull sources from elsewhere (editables and URLs).
fn filter_requires(contents: &str) -> Vec<&str> {
    contents
        .lines()
        .filter(|line| {
            let line = line.trim_start();
            !(line.starts_with("-e") || line.starts_with("http://") || line.starts_with("https://"))
        })
        .collect()
}
