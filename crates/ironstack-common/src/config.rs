//! ---
//! ironstack_section: "01-core-functionality"
//! ironstack_subsection: "module"
//! ironstack_type: "source"
//! ironstack_scope: "code"
//! ironstack_description: "Shared primitives and utilities for the lifecycle engine."
//! ironstack_version: "v0.0.0-prealpha"
//! ironstack_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use tracing::debug;

use crate::logging::LogFormat;
use crate::options::{OptionValue, StaticOptions};

fn default_trace_dir() -> PathBuf {
    PathBuf::from("/var/lib/ironstack/traces")
}

fn default_phase_dir() -> PathBuf {
    PathBuf::from("/var/lib/ironstack/phases")
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("/var/log/ironstack")
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

fn default_wait_between() -> Duration {
    Duration::from_secs(1)
}

fn default_wait_attempts() -> u32 {
    5
}

fn default_kill_attempts() -> u32 {
    4
}

fn default_kill_wait() -> Duration {
    Duration::from_secs(1)
}

fn default_package_manager() -> String {
    "command".to_owned()
}

fn default_distro_name() -> String {
    "generic".to_owned()
}

/// Primary configuration object for an ironstack run.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub distro: DistroConfig,
    #[serde(default)]
    pub persona: PersonaConfig,
    #[serde(default)]
    pub components: IndexMap<String, ComponentSpec>,
    /// Options shared by every component, consulted after the component's own table.
    #[serde(default)]
    pub global: IndexMap<String, OptionValue>,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: PathBuf,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &'static str = "IRONSTACK_CONFIG";

    /// Load configuration from disk, respecting the `IRONSTACK_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        for name in &self.persona.components {
            if !self.components.contains_key(name) {
                return Err(anyhow!(
                    "persona lists component '{}' which has no [components.{}] table",
                    name,
                    name
                ));
            }
        }
        Ok(())
    }

    /// Component names in persona order, falling back to declaration order.
    pub fn component_order(&self) -> Vec<String> {
        if self.persona.components.is_empty() {
            self.components.keys().cloned().collect()
        } else {
            self.persona.components.clone()
        }
    }

    /// Build the static option tables backing every component's option lookups.
    ///
    /// Each component table gains `trace_dir` pointing at its own journal
    /// directory unless it already declares one.
    pub fn option_tables(&self) -> StaticOptions {
        let mut options = StaticOptions::new();
        options.extend_section(StaticOptions::GLOBAL_SECTION, self.global.clone());
        for (name, spec) in &self.components {
            let mut table = spec.options.clone();
            table.entry("trace_dir".to_owned()).or_insert_with(|| {
                OptionValue::Str(self.paths.trace_dir.join(name).display().to_string())
            });
            options.extend_section(name, table);
        }
        options
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_trace_dir")]
    pub trace_dir: PathBuf,
    #[serde(default = "default_phase_dir")]
    pub phase_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            trace_dir: default_trace_dir(),
            phase_dir: default_phase_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}

/// Knobs for the process supervisor and dry-run behaviour.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_wait_between", rename = "wait_between_secs")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub wait_between: Duration,
    #[serde(default = "default_wait_attempts")]
    pub wait_attempts: u32,
    #[serde(default = "default_kill_attempts")]
    pub kill_attempts: u32,
    #[serde(default = "default_kill_wait", rename = "kill_wait_secs")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub kill_wait: Duration,
    #[serde(default)]
    pub purge_packages: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            wait_between: default_wait_between(),
            wait_attempts: default_wait_attempts(),
            kill_attempts: default_kill_attempts(),
            kill_wait: default_kill_wait(),
            purge_packages: false,
        }
    }
}

/// Distribution description: default package manager and command table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistroConfig {
    #[serde(default = "default_distro_name")]
    pub name: String,
    #[serde(default = "default_package_manager")]
    pub package_manager: String,
    /// category -> action -> argv
    #[serde(default)]
    pub commands: IndexMap<String, IndexMap<String, Vec<String>>>,
}

impl Default for DistroConfig {
    fn default() -> Self {
        Self {
            name: default_distro_name(),
            package_manager: default_package_manager(),
            commands: IndexMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PersonaConfig {
    #[serde(default)]
    pub components: Vec<String>,
}

/// Which lifecycle behaviours a component layers over the package baseline.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ComponentFlavor {
    #[default]
    Package,
    Python,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ComponentSpec {
    #[serde(default)]
    pub flavor: ComponentFlavor,
    #[serde(default)]
    pub options: IndexMap<String, OptionValue>,
    #[serde(default)]
    pub packages: Vec<PackageSpec>,
    #[serde(default)]
    pub subsystems: IndexMap<String, SubsystemSpec>,
    #[serde(default)]
    pub config_files: Vec<ConfigFileSpec>,
    /// link source -> links pointing at it
    #[serde(default)]
    pub symlinks: IndexMap<PathBuf, Vec<PathBuf>>,
    #[serde(default)]
    pub programs: Vec<ProgramSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackageSpec {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub packager_name: Option<String>,
    #[serde(flatten)]
    pub extra: IndexMap<String, String>,
}

impl PackageSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            packager_name: None,
            extra: IndexMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SubsystemSpec {
    #[serde(default)]
    pub packages: Vec<PackageSpec>,
}

/// A logical config file: rendered from `source` (or inline `contents`) into `target`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFileSpec {
    pub name: String,
    pub target: PathBuf,
    #[serde(default)]
    pub source: Option<PathBuf>,
    #[serde(default)]
    pub contents: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramSpec {
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    #[serde(default)]
    pub argv: Vec<String>,
}
