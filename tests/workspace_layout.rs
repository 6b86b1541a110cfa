//! ---
//! ironstack_section: "15-testing"
//! ironstack_subsection: "integration-tests"
//! ironstack_type: "test"
//! ironstack_scope: "code"
//! ironstack_description: "Repository layout and frontmatter conventions."
//! ironstack_version: "v0.0.0-prealpha"
//! ironstack_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("..")
}

fn files_with_extension(dirs: &[&str], extension: &str) -> Vec<PathBuf> {
    let root = workspace_root();
    dirs.iter()
        .flat_map(|dir| WalkDir::new(root.join(dir)).into_iter().filter_map(|e| e.ok()))
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| !entry.path().components().any(|c| c.as_os_str() == "target"))
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext == extension))
        .collect()
}

#[test]
fn rust_sources_carry_frontmatter() {
    let sources = files_with_extension(&["crates", "bin", "tests"], "rs");
    assert!(!sources.is_empty());
    for path in sources {
        let content = fs::read_to_string(&path)
            .unwrap_or_else(|err| panic!("failed to read {}: {}", path.display(), err));
        assert!(
            content.starts_with("//! ---\n//! ironstack_section:"),
            "{} must start with the frontmatter header",
            path.display()
        );
    }
}

#[test]
fn manifests_carry_frontmatter() {
    let mut manifests = files_with_extension(&["crates", "bin", "tests"], "toml");
    manifests.push(workspace_root().join("Cargo.toml"));
    for path in manifests.iter().filter(|p| p.file_name().is_some_and(|n| n == "Cargo.toml")) {
        let content = fs::read_to_string(path)
            .unwrap_or_else(|err| panic!("failed to read {}: {}", path.display(), err));
        assert!(
            content.starts_with("# ---\n# ironstack_section:"),
            "{} must start with the frontmatter header",
            path.display()
        );
    }
}
