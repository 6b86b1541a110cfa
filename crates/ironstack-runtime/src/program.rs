//! ---
//! ironstack_section: "06-process-supervision"
//! ironstack_subsection: "module"
//! ironstack_type: "source"
//! ironstack_scope: "code"
//! ironstack_description: "Programs and their reported status."
//! ironstack_version: "v0.0.0-prealpha"
//! ironstack_owner: "tbd"
//! ---
use std::fmt;
use std::path::PathBuf;

use ironstack_common::ProgramSpec;
use serde::{Deserialize, Serialize};

/// An application a component starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pub name: String,
    /// Executable; defaults to the program name.
    pub path: String,
    pub working_dir: Option<PathBuf>,
    pub argv: Vec<String>,
}

impl Program {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            path: name.clone(),
            name,
            working_dir: None,
            argv: Vec::new(),
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_args<I, S>(mut self, argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.argv = argv.into_iter().map(Into::into).collect();
        self
    }
}

impl From<&ProgramSpec> for Program {
    fn from(spec: &ProgramSpec) -> Self {
        Self {
            name: spec.name.clone(),
            path: spec.path.clone().unwrap_or_else(|| spec.name.clone()),
            working_dir: spec.working_dir.clone(),
            argv: spec.argv.clone(),
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Installed,
    Started,
    Stopped,
    Unknown,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Installed => "installed",
            Status::Started => "started",
            Status::Stopped => "stopped",
            Status::Unknown => "unknown",
        })
    }
}

/// Point-in-time status of one application. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramStatus {
    pub name: String,
    pub status: Status,
    pub details: String,
}

impl ProgramStatus {
    pub fn new(name: impl Into<String>, status: Status, details: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status,
            details: details.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_defaults_to_name() {
        let spec = ProgramSpec {
            name: "nova-api".into(),
            path: None,
            working_dir: None,
            argv: vec!["--config-file".into(), "$(CONFIG_FILE)".into()],
        };
        let program = Program::from(&spec);
        assert_eq!(program.path, "nova-api");
        assert_eq!(program.to_string(), "nova-api (nova-api)");
        assert_eq!(Program::new("x").with_path("/bin/x").path, "/bin/x");
        assert_eq!(Status::Started.to_string(), "started");
    }
}
