//! ---
//! ironstack_section: "01-core-functionality"
//! ironstack_subsection: "module"
//! ironstack_type: "source"
//! ironstack_scope: "code"
//! ironstack_description: "Ownership-scoped option lookup with typed accessors."
//! ironstack_version: "v0.0.0-prealpha"
//! ironstack_owner: "tbd"
//! ---
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::template::Params;

/// A single option value as it appears in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<String>),
}

impl OptionValue {
    /// Split a value into list items. Strings are comma separated.
    pub fn as_list(&self) -> Vec<String> {
        match self {
            OptionValue::List(items) => items.clone(),
            OptionValue::Str(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_owned)
                .collect(),
            other => vec![other.to_string()],
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Bool(value) => Some(*value),
            OptionValue::Int(value) => Some(*value != 0),
            OptionValue::Str(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Some(true),
                "false" | "no" | "off" | "0" => Some(false),
                _ => None,
            },
            OptionValue::List(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            OptionValue::Int(value) => Some(*value),
            OptionValue::Str(raw) => raw.trim().parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(value) => write!(f, "{value}"),
            OptionValue::Int(value) => write!(f, "{value}"),
            OptionValue::Str(value) => f.write_str(value),
            OptionValue::List(items) => f.write_str(&items.join(",")),
        }
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Str(value.to_owned())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::Str(value)
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Bool(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        OptionValue::Int(value)
    }
}

/// Source of raw option values keyed by `(section, name)`.
pub trait OptionProvider: Send + Sync {
    fn lookup(&self, section: &str, name: &str) -> Option<OptionValue>;

    /// Every option declared in `section`, in declaration order.
    fn entries(&self, _section: &str) -> IndexMap<String, OptionValue> {
        IndexMap::new()
    }
}

/// In-memory option tables, usually built from [`crate::AppConfig::option_tables`].
#[derive(Debug, Clone, Default)]
pub struct StaticOptions {
    sections: IndexMap<String, IndexMap<String, OptionValue>>,
}

impl StaticOptions {
    pub const GLOBAL_SECTION: &'static str = "global";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(
        &mut self,
        section: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<OptionValue>,
    ) -> &mut Self {
        self.sections
            .entry(section.into())
            .or_default()
            .insert(name.into(), value.into());
        self
    }

    pub fn with(
        mut self,
        section: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<OptionValue>,
    ) -> Self {
        self.set(section, name, value);
        self
    }

    pub fn extend_section(
        &mut self,
        section: impl Into<String>,
        values: IndexMap<String, OptionValue>,
    ) {
        self.sections.entry(section.into()).or_default().extend(values);
    }

    pub fn value(&self, section: &str, name: &str) -> Option<OptionValue> {
        self.sections
            .get(section)
            .and_then(|table| table.get(name))
            .cloned()
    }
}

impl OptionProvider for StaticOptions {
    fn lookup(&self, section: &str, name: &str) -> Option<OptionValue> {
        self.value(section, name)
    }

    fn entries(&self, section: &str) -> IndexMap<String, OptionValue> {
        self.sections.get(section).cloned().unwrap_or_default()
    }
}

/// Option access scoped to one owning component.
///
/// Lookups consult the owner's section first and then the global section.
/// Missing keys yield the supplied default; only the `require*` accessors fail.
#[derive(Clone)]
pub struct ComponentOptions {
    owner: String,
    provider: Arc<dyn OptionProvider>,
}

impl fmt::Debug for ComponentOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentOptions")
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

impl ComponentOptions {
    pub fn new(owner: impl Into<String>, provider: Arc<dyn OptionProvider>) -> Self {
        Self {
            owner: owner.into(),
            provider,
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    fn raw(&self, name: &str) -> Option<OptionValue> {
        self.provider
            .lookup(&self.owner, name)
            .or_else(|| self.provider.lookup(StaticOptions::GLOBAL_SECTION, name))
    }

    /// Whether the option is declared at all, even with an empty value.
    pub fn is_declared(&self, name: &str) -> bool {
        self.raw(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.raw(name).map(|value| value.to_string())
    }

    pub fn get_in(&self, section: &str, name: &str) -> Option<String> {
        self.provider
            .lookup(section, name)
            .map(|value| value.to_string())
    }

    pub fn get_or(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or_else(|| default.to_owned())
    }

    pub fn get_list(&self, name: &str) -> Vec<String> {
        self.raw(name).map(|value| value.as_list()).unwrap_or_default()
    }

    pub fn get_bool(&self, name: &str, default: bool) -> bool {
        self.raw(name)
            .and_then(|value| value.as_bool())
            .unwrap_or(default)
    }

    pub fn get_int(&self, name: &str, default: i64) -> i64 {
        self.raw(name)
            .and_then(|value| value.as_int())
            .unwrap_or(default)
    }

    pub fn get_path(&self, name: &str) -> Option<PathBuf> {
        self.get(name)
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
    }

    pub fn require(&self, name: &str) -> Result<String, ConfigError> {
        match self.get(name) {
            Some(value) if !value.trim().is_empty() => Ok(value),
            Some(_) => Err(ConfigError::EmptyOption {
                section: self.owner.clone(),
                name: name.to_owned(),
            }),
            None => Err(ConfigError::MissingOption {
                section: self.owner.clone(),
                name: name.to_owned(),
            }),
        }
    }

    pub fn require_path(&self, name: &str) -> Result<PathBuf, ConfigError> {
        self.require(name).map(PathBuf::from)
    }

    /// Flatten global then owner options into template parameters.
    ///
    /// Keys are upper-cased so `app_dir` is reachable as `$(APP_DIR)`.
    pub fn params(&self) -> Params {
        let mut params = Params::new();
        for section in [StaticOptions::GLOBAL_SECTION, self.owner.as_str()] {
            for (name, value) in self.provider.entries(section) {
                params.insert(name.to_ascii_uppercase(), value.to_string());
            }
        }
        params.insert("COMPONENT".to_owned(), self.owner.clone());
        params
    }
}
