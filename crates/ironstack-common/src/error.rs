//! ---
//! ironstack_section: "01-core-functionality"
//! ironstack_subsection: "module"
//! ironstack_type: "source"
//! ironstack_scope: "code"
//! ironstack_description: "Configuration error taxonomy."
//! ironstack_version: "v0.0.0-prealpha"
//! ironstack_owner: "tbd"
//! ---
use thiserror::Error;

use crate::registry::UnknownStrategy;

/// Fatal configuration problems raised at the point of use.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required option '{name}' in section '{section}'")]
    MissingOption { section: String, name: String },
    #[error("option '{name}' in section '{section}' is declared but empty")]
    EmptyOption { section: String, name: String },
    #[error("option '{name}' in section '{section}' has the wrong type: expected {expected}")]
    InvalidOption {
        section: String,
        name: String,
        expected: &'static str,
    },
    #[error("unknown component '{0}'")]
    UnknownComponent(String),
    #[error(transparent)]
    UnknownStrategy(#[from] UnknownStrategy),
}
