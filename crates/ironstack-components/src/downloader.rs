//! ---
//! ironstack_section: "05-component-lifecycle"
//! ironstack_subsection: "module"
//! ironstack_type: "source"
//! ironstack_scope: "code"
//! ironstack_description: "Source download strategies."
//! ironstack_version: "v0.0.0-prealpha"
//! ironstack_owner: "tbd"
//! ---
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ironstack_common::template::expand_all;
use ironstack_common::{ExecutionContext, Params};
use ironstack_shell::{execute, ExecOptions};
use tracing::info;

use crate::distro::Distro;
use crate::Result;

/// Strategy id of the built-in downloader.
pub const DEFAULT_DOWNLOADER: &str = "git";

#[derive(Debug, Clone)]
pub struct DownloadSettings {
    pub distro: Arc<Distro>,
    pub ctx: ExecutionContext,
}

/// Fetches one source URI into one target directory.
pub trait Downloader {
    fn download(&self) -> Result<()>;
}

pub type DownloaderConstructor =
    Arc<dyn Fn(&DownloadSettings, &str, &Path) -> Result<Box<dyn Downloader>> + Send + Sync>;

/// Clones with the distro's `git clone` command (`$(URI)`, `$(TARGET)`).
///
/// A non-empty target is left alone so repeated installs do not re-clone.
#[derive(Debug, Clone)]
pub struct GitDownloader {
    settings: DownloadSettings,
    uri: String,
    target: PathBuf,
}

impl GitDownloader {
    pub fn new(settings: &DownloadSettings, uri: &str, target: &Path) -> Self {
        Self {
            settings: settings.clone(),
            uri: uri.to_owned(),
            target: target.to_path_buf(),
        }
    }

    pub fn constructor() -> DownloaderConstructor {
        Arc::new(
            |settings: &DownloadSettings, uri: &str, target: &Path| -> Result<Box<dyn Downloader>> {
                Ok(Box::new(GitDownloader::new(settings, uri, target)))
            },
        )
    }

    fn target_populated(&self) -> bool {
        std::fs::read_dir(&self.target)
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false)
    }
}

impl Downloader for GitDownloader {
    fn download(&self) -> Result<()> {
        if self.target_populated() {
            info!(uri = %self.uri, target = %self.target.display(), "target already populated, skipping clone");
            return Ok(());
        }
        let mut params = Params::new();
        params.insert("URI".to_owned(), self.uri.clone());
        params.insert("TARGET".to_owned(), self.target.display().to_string());
        let argv = expand_all(&self.settings.distro.get_command("git", "clone")?, &params);
        info!(uri = %self.uri, target = %self.target.display(), "downloading");
        execute(self.settings.ctx, &argv, &ExecOptions::default())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn clone_command_is_templated() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("src");
        let distro = Distro::new("test", "command")
            .with_command("git", "clone", ["sh", "-c", "mkdir -p $(TARGET) && echo $(URI) > $(TARGET)/ORIGIN"]);
        let settings = DownloadSettings {
            distro: Arc::new(distro),
            ctx: ExecutionContext::live(),
        };
        GitDownloader::new(&settings, "git://example.invalid/x.git", &target)
            .download()
            .unwrap();
        let origin = std::fs::read_to_string(target.join("ORIGIN")).unwrap();
        assert_eq!(origin.trim(), "git://example.invalid/x.git");

        // populated target: the command is not run again
        std::fs::write(target.join("ORIGIN"), "kept").unwrap();
        GitDownloader::new(&settings, "git://other", &target).download().unwrap();
        assert_eq!(std::fs::read_to_string(target.join("ORIGIN")).unwrap(), "kept");
    }
}
