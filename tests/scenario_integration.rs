//! ---
//! ironstack_section: "15-testing"
//! ironstack_subsection: "integration-tests"
//! ironstack_type: "test"
//! ironstack_scope: "code"
//! ironstack_description: "End-to-end install and uninstall of a templated component."
//! ironstack_version: "v0.0.0-prealpha"
//! ironstack_owner: "tbd"
//! ---
use std::fs;
use std::path::Path;

use anyhow::Result;
use ironstack_common::template::host_ip;
use ironstack_common::{AppConfig, ExecutionContext};
use ironstack_orchestrator::{Action, Orchestrator};
use ironstack_trace::{TraceBucket, TraceReader};
use tempfile::tempdir;

fn scenario_config(root: &Path) -> Result<AppConfig> {
    let root = root.display();
    let toml = format!(
        r#"
        [paths]
        trace_dir = "{root}/state/traces"
        phase_dir = "{root}/state/phases"

        [persona]
        components = ["app"]

        [global]
        root = "{root}"

        [components.app]
        config_files = [{{ name = "app.conf", target = "$(ROOT)/var/lib/app/etc/app.conf", contents = "listen=$(auto:ip)\nname=$(COMPONENT)\n" }}]

        [components.app.symlinks]
        "$(ROOT)/var/lib/app/etc" = ["$(ROOT)/etc/app"]

        [components.app.options]
        app_dir = "{root}/opt/app"
        "#
    );
    Ok(toml.parse()?)
}

#[test]
fn templated_config_and_symlink_are_installed_then_reversed() -> Result<()> {
    let root = tempdir()?;
    let config = scenario_config(root.path())?;
    let trace = config.paths.trace_dir.join("app").join(TraceBucket::Created.file_name());
    let orchestrator = Orchestrator::from_config(config, ExecutionContext::live())?;

    orchestrator.run(Action::Install)?;

    let conf = root.path().join("var/lib/app/etc/app.conf");
    let link = root.path().join("etc/app");
    assert_eq!(fs::read_to_string(&conf)?, format!("listen={}\nname=app\n", host_ip()));
    assert_eq!(fs::read_link(&link)?, root.path().join("var/lib/app/etc"));

    let reader = TraceReader::open(&trace);
    let dirs = reader.dirs_made()?;
    assert!(dirs.contains(&root.path().join("var/lib/app/etc")));
    assert!(dirs.contains(&root.path().join("etc")));
    assert_eq!(reader.files_touched()?, vec![conf.clone()]);
    assert_eq!(reader.symlinks_made()?, vec![link.clone()]);

    orchestrator.run(Action::Uninstall)?;

    assert!(fs::symlink_metadata(&link).is_err());
    assert!(!conf.exists());
    assert!(!root.path().join("var").exists());
    assert!(!root.path().join("etc").exists());
    Ok(())
}

#[test]
fn dry_run_scenario_changes_nothing() -> Result<()> {
    let root = tempdir()?;
    let orchestrator = Orchestrator::from_config(scenario_config(root.path())?, ExecutionContext::dry_run())?;
    let report = orchestrator.run(Action::Install)?;
    assert_eq!(report.components, vec!["app"]);
    assert_eq!(fs::read_dir(root.path())?.count(), 0);
    Ok(())
}
