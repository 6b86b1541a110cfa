//! ---
//! ironstack_section: "01-core-functionality"
//! ironstack_subsection: "module"
//! ironstack_type: "source"
//! ironstack_scope: "code"
//! ironstack_description: "Shared primitives and utilities for the lifecycle engine."
//! ironstack_version: "v0.0.0-prealpha"
//! ironstack_owner: "tbd"
//! ---
//! Core shared primitives for the ironstack workspace.
//! This crate exposes configuration loading, option access, the execution
//! context threaded through side-effecting calls, template expansion, the
//! strategy registry, and tracing initialisation.

pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod options;
pub mod registry;
pub mod template;

pub use config::{
    AppConfig, ComponentFlavor, ComponentSpec, ConfigFileSpec, DistroConfig, LoggingConfig,
    PackageSpec, PathsConfig, PersonaConfig, ProgramSpec, RuntimeConfig, SubsystemSpec,
};
pub use context::ExecutionContext;
pub use error::ConfigError;
pub use logging::{init_tracing, LogFormat};
pub use options::{ComponentOptions, OptionProvider, OptionValue, StaticOptions};
pub use registry::{Registry, StrategyCache, UnknownStrategy};
pub use template::{expand_template, Params};
