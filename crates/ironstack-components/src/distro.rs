//! ---
//! ironstack_section: "05-component-lifecycle"
//! ironstack_subsection: "module"
//! ironstack_type: "source"
//! ironstack_scope: "code"
//! ironstack_description: "Distribution command table."
//! ironstack_version: "v0.0.0-prealpha"
//! ironstack_owner: "tbd"
//! ---
use indexmap::IndexMap;
use ironstack_common::DistroConfig;

use crate::{ComponentError, Result};

/// Host distribution: its default package manager and command table.
#[derive(Debug, Clone)]
pub struct Distro {
    name: String,
    package_manager: String,
    commands: IndexMap<String, IndexMap<String, Vec<String>>>,
}

impl Distro {
    pub fn new(name: impl Into<String>, package_manager: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            package_manager: package_manager.into(),
            commands: IndexMap::new(),
        }
    }

    pub fn with_command(
        mut self,
        category: impl Into<String>,
        action: impl Into<String>,
        argv: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.commands
            .entry(category.into())
            .or_default()
            .insert(action.into(), argv.into_iter().map(Into::into).collect());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Strategy id of the default package manager.
    pub fn package_manager(&self) -> &str {
        &self.package_manager
    }

    pub fn has_command(&self, category: &str, action: &str) -> bool {
        self.commands
            .get(category)
            .map(|actions| actions.contains_key(action))
            .unwrap_or(false)
    }

    pub fn get_command(&self, category: &str, action: &str) -> Result<Vec<String>> {
        self.commands
            .get(category)
            .and_then(|actions| actions.get(action))
            .filter(|argv| !argv.is_empty())
            .cloned()
            .ok_or_else(|| ComponentError::MissingCommand {
                distro: self.name.clone(),
                category: category.to_owned(),
                action: action.to_owned(),
            })
    }
}

impl From<&DistroConfig> for Distro {
    fn from(config: &DistroConfig) -> Self {
        Self {
            name: config.name.clone(),
            package_manager: config.package_manager.clone(),
            commands: config.commands.clone(),
        }
    }
}
