//! ---
//! ironstack_section: "05-component-lifecycle"
//! ironstack_subsection: "module"
//! ironstack_type: "source"
//! ironstack_scope: "code"
//! ironstack_description: "Component lifecycle state machine wired to the side-effect journal."
//! ironstack_version: "v0.0.0-prealpha"
//! ironstack_owner: "tbd"
//! ---
//! Component lifecycle: download, configure, install and their journal-driven
//! reversal, plus the testing and packaging hooks.
//!
//! Install order is `download -> configure -> pre_install -> install ->
//! post_install`. Nothing here enforces that order; the orchestrator runs each
//! phase for every component before moving to the next one.

pub mod component;
pub mod configurator;
pub mod distro;
pub mod downloader;
pub mod installer;
pub mod package;
pub mod packager;
pub mod tester;
pub mod uninstaller;

pub use component::{Component, ComponentBuilder, Strategies};
pub use configurator::{Configurator, TemplateConfigurator};
pub use distro::Distro;
pub use downloader::{
    DownloadSettings, Downloader, DownloaderConstructor, GitDownloader, DEFAULT_DOWNLOADER,
};
pub use installer::PkgInstaller;
pub use package::{filter_package, package_from_fields};
pub use packager::{
    CommandPackager, PackageManager, PackagerConstructor, PackagerSettings, DEFAULT_PACKAGER,
};
pub use tester::Tester;
pub use uninstaller::PkgUninstaller;

use ironstack_common::ConfigError;
use ironstack_shell::ShellError;
use ironstack_trace::TraceError;

/// Result alias used throughout the component crate.
pub type Result<T> = std::result::Result<T, ComponentError>;

#[derive(Debug, thiserror::Error)]
pub enum ComponentError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Trace(#[from] TraceError),
    #[error(transparent)]
    Shell(#[from] ShellError),
    #[error("distro '{distro}' defines no '{category} {action}' command")]
    MissingCommand {
        distro: String,
        category: String,
        action: String,
    },
    #[error("component '{component}': {message}")]
    Strategy { component: String, message: String },
}

impl From<ironstack_common::UnknownStrategy> for ComponentError {
    fn from(err: ironstack_common::UnknownStrategy) -> Self {
        ComponentError::Config(err.into())
    }
}
