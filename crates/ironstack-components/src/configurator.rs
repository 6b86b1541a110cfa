//! ---
//! ironstack_section: "05-component-lifecycle"
//! ironstack_subsection: "module"
//! ironstack_type: "source"
//! ironstack_scope: "code"
//! ironstack_description: "Config file rendering and symlink tables."
//! ironstack_version: "v0.0.0-prealpha"
//! ironstack_owner: "tbd"
//! ---
use std::path::PathBuf;

use indexmap::IndexMap;
use ironstack_common::{expand_template, ConfigError, ConfigFileSpec, Params};
use ironstack_shell::load_file;

use crate::Result;

/// Describes the config files and symlinks a component lays down on install.
pub trait Configurator: Send + Sync {
    /// Logical config file names, in configure order.
    fn config_files(&self) -> Vec<String>;

    /// Where the rendered file for `name` is written.
    fn target_config(&self, name: &str) -> Result<PathBuf>;

    /// Source label and raw template contents for `name`.
    fn source_config(&self, name: &str) -> Result<(String, String)>;

    fn config_param_replace(&self, _name: &str, contents: &str, params: &Params) -> String {
        expand_template(contents, params)
    }

    /// Final component-specific rewrite of rendered contents.
    fn config_adjust(&self, contents: String, _name: &str) -> String {
        contents
    }

    /// Link source -> links to create pointing at it.
    fn symlinks(&self) -> IndexMap<PathBuf, Vec<PathBuf>>;
}

/// Configurator backed by the component's declared `config_files` and `symlinks`.
///
/// Paths may contain `$(NAME)` placeholders resolved from the component params.
#[derive(Debug, Clone)]
pub struct TemplateConfigurator {
    owner: String,
    files: Vec<ConfigFileSpec>,
    links: IndexMap<PathBuf, Vec<PathBuf>>,
    params: Params,
}

impl TemplateConfigurator {
    pub fn new(
        owner: impl Into<String>,
        files: Vec<ConfigFileSpec>,
        links: IndexMap<PathBuf, Vec<PathBuf>>,
        params: Params,
    ) -> Self {
        Self {
            owner: owner.into(),
            files,
            links,
            params,
        }
    }

    fn file(&self, name: &str) -> Result<&ConfigFileSpec> {
        self.files
            .iter()
            .find(|file| file.name == name)
            .ok_or_else(|| self.missing(format!("config_files.{name}")))
    }

    fn missing(&self, name: String) -> crate::ComponentError {
        ConfigError::MissingOption {
            section: self.owner.clone(),
            name,
        }
        .into()
    }

    fn expand_path(&self, path: &std::path::Path) -> PathBuf {
        PathBuf::from(expand_template(&path.display().to_string(), &self.params))
    }
}

impl Configurator for TemplateConfigurator {
    fn config_files(&self) -> Vec<String> {
        self.files.iter().map(|file| file.name.clone()).collect()
    }

    fn target_config(&self, name: &str) -> Result<PathBuf> {
        Ok(self.expand_path(&self.file(name)?.target))
    }

    fn source_config(&self, name: &str) -> Result<(String, String)> {
        let file = self.file(name)?;
        if let Some(contents) = &file.contents {
            return Ok((format!("inline:{name}"), contents.clone()));
        }
        let source = file
            .source
            .as_deref()
            .map(|path| self.expand_path(path))
            .ok_or_else(|| self.missing(format!("config_files.{name}.source")))?;
        let contents = load_file(&source)?;
        Ok((source.display().to_string(), contents))
    }

    fn symlinks(&self) -> IndexMap<PathBuf, Vec<PathBuf>> {
        self.links
            .iter()
            .map(|(source, links)| {
                (
                    self.expand_path(source),
                    links.iter().map(|link| self.expand_path(link)).collect(),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ComponentError;

    fn configurator(root: &std::path::Path) -> TemplateConfigurator {
        let mut params = Params::new();
        params.insert("ROOT".into(), root.display().to_string());
        let files = vec![
            ConfigFileSpec {
                name: "app.conf".into(),
                target: PathBuf::from("$(ROOT)/etc/app.conf"),
                source: None,
                contents: Some("root=$(ROOT)\n".into()),
            },
            ConfigFileSpec {
                name: "paste.ini".into(),
                target: PathBuf::from("$(ROOT)/etc/paste.ini"),
                source: Some(PathBuf::from("$(ROOT)/templates/paste.ini")),
                contents: None,
            },
            ConfigFileSpec {
                name: "broken".into(),
                target: PathBuf::from("/x"),
                source: None,
                contents: None,
            },
        ];
        let mut links = IndexMap::new();
        links.insert(PathBuf::from("$(ROOT)/etc"), vec![PathBuf::from("$(ROOT)/link")]);
        TemplateConfigurator::new("app", files, links, params)
    }

    #[test]
    fn paths_and_sources_resolve() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("templates")).unwrap();
        std::fs::write(dir.path().join("templates/paste.ini"), "[app]\n").unwrap();
        let conf = configurator(dir.path());

        assert_eq!(conf.config_files(), vec!["app.conf", "paste.ini", "broken"]);
        assert_eq!(conf.target_config("app.conf").unwrap(), dir.path().join("etc/app.conf"));
        assert_eq!(conf.source_config("paste.ini").unwrap().1, "[app]\n");
        let (label, contents) = conf.source_config("app.conf").unwrap();
        assert_eq!(label, "inline:app.conf");
        let params = Params::new();
        assert_eq!(conf.config_param_replace("app.conf", &contents, &params), contents);
        assert_eq!(
            conf.symlinks()[&dir.path().join("etc")],
            vec![dir.path().join("link")]
        );
    }

    #[test]
    fn missing_sources_are_config_errors() {
        let conf = configurator(std::path::Path::new("/tmp"));
        assert!(matches!(
            conf.source_config("broken"),
            Err(ComponentError::Config(ConfigError::MissingOption { .. }))
        ));
        assert!(conf.target_config("nope").is_err());
    }
}
