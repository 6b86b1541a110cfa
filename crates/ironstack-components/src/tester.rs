//! ---
//! ironstack_section: "05-component-lifecycle"
//! ironstack_subsection: "module"
//! ironstack_type: "source"
//! ironstack_scope: "code"
//! ironstack_description: "Component test-suite runner."
//! ironstack_version: "v0.0.0-prealpha"
//! ironstack_owner: "tbd"
//! ---
use std::path::Path;

use indexmap::IndexMap;
use ironstack_shell::{execute, load_file, ExecOptions, ShellError};
use tracing::{debug, warn};

use crate::component::Component;
use crate::Result;

/// Runs a component's own test suite from its `app_dir`.
///
/// Options: `use_run_tests`, `use_pep8`, `verbose`, `exclude_tests`,
/// `xunit_filename`, `ignore-test-failures`.
#[derive(Debug, Clone)]
pub struct Tester {
    component: Component,
}

impl Tester {
    pub fn new(component: Component) -> Self {
        Self { component }
    }

    /// Command line used to run the suite in `app_dir`.
    pub fn test_command(&self, app_dir: &Path) -> Vec<String> {
        let options = self.component.options();
        let run_tests = app_dir.join("run_tests.sh");
        let mut cmd = if run_tests.is_file() && options.get_bool("use_run_tests", true) {
            let mut cmd = vec![run_tests.display().to_string(), "-N".to_owned()];
            if !options.get_bool("use_pep8", true) {
                cmd.push("--no-pep8".to_owned());
            }
            cmd
        } else {
            vec!["nosetests".to_owned()]
        };
        if options.get_bool("verbose", false) {
            cmd.push("--nologcapture".to_owned());
        }
        for exclusion in options.get_list("exclude_tests") {
            cmd.push(format!("--exclude={exclusion}"));
        }
        if let Some(xunit) = options.get("xunit_filename").filter(|name| !name.is_empty()) {
            cmd.push("--with-xunit".to_owned());
            cmd.push(format!("--xunit-file={xunit}"));
        }
        cmd
    }

    /// Environment taken from `[testenv] setenv` in `tox.ini`, minus `VIRTUAL_ENV`.
    pub fn test_env(&self, app_dir: &Path) -> IndexMap<String, String> {
        let tox = app_dir.join("tox.ini");
        if !tox.is_file() {
            return IndexMap::new();
        }
        match load_file(&tox) {
            Ok(contents) => {
                let env = tox_setenv(&contents);
                debug!(path = %tox.display(), settings = env.len(), "read test environment");
                env
            }
            Err(err) => {
                debug!(path = %tox.display(), error = %err, "unable to read tox settings");
                IndexMap::new()
            }
        }
    }

    /// Run the suite. A missing `app_dir` skips with a warning.
    pub fn run_tests(&self) -> Result<()> {
        let options = self.component.options();
        let Some(app_dir) = options.get_path("app_dir").filter(|dir| dir.is_dir()) else {
            warn!(component = %self.component.name(), "unable to find application directory, can not run tests");
            return Ok(());
        };
        let cmd = self.test_command(&app_dir);
        let mut exec = ExecOptions::default().in_dir(&app_dir);
        exec.env = self.test_env(&app_dir);
        match execute(self.component.context(), &cmd, &exec) {
            Ok(_) => Ok(()),
            Err(err @ ShellError::ProcessExecution { .. })
                if options.get_bool("ignore-test-failures", false) =>
            {
                warn!(component = %self.component.name(), error = %err, "ignoring test failure");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Parse `setenv` under `[testenv]`, including indented continuation lines.
fn tox_setenv(contents: &str) -> IndexMap<String, String> {
    let mut env = IndexMap::new();
    let mut in_testenv = false;
    let mut in_setenv = false;
    for raw in contents.lines() {
        let trimmed = raw.trim();
        if trimmed.starts_with('[') {
            in_testenv = trimmed == "[testenv]";
            in_setenv = false;
            continue;
        }
        if !in_testenv {
            continue;
        }
        let continuation = raw.starts_with(char::is_whitespace);
        let entry = if continuation && in_setenv {
            trimmed
        } else if let Some((key, value)) = trimmed.split_once('=').filter(|_| !continuation) {
            in_setenv = key.trim() == "setenv";
            if !in_setenv {
                continue;
            }
            value.trim()
        } else {
            in_setenv = false;
            continue;
        };
        let entry = entry.split('#').next().unwrap_or_default().trim();
        if let Some((name, value)) = entry.split_once('=') {
            let name = name.trim();
            if !name.is_empty() && !name.eq_ignore_ascii_case("virtual_env") {
                env.insert(name.to_owned(), value.trim().to_owned());
            }
        }
    }
    env
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOX: &str = "[tox]\nenvlist = py27\n\n[testenv]\nsetenv = VIRTUAL_ENV={envdir}\n         NOSE_WITH_OPENSTACK=1  # plugin\n         NOSE_OPENSTACK_COLOR=1\ndeps = -r{toxinidir}/tools/pip-requires\n\n[testenv:pep8]\nsetenv = OTHER=1\n";

    #[test]
    fn tox_setenv_skips_virtual_env_and_other_sections() {
        let env = tox_setenv(TOX);
        let pairs: Vec<_> = env.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        assert_eq!(
            pairs,
            vec![("NOSE_WITH_OPENSTACK", "1"), ("NOSE_OPENSTACK_COLOR", "1")]
        );
    }
}
