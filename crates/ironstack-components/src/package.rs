//! ---
//! ironstack_section: "05-component-lifecycle"
//! ironstack_subsection: "module"
//! ironstack_type: "source"
//! ironstack_scope: "code"
//! ironstack_description: "Package descriptions as journaled."
//! ironstack_version: "v0.0.0-prealpha"
//! ironstack_owner: "tbd"
//! ---
use indexmap::IndexMap;
use ironstack_common::template::Params;
use ironstack_common::PackageSpec;
use ironstack_trace::TraceFields;

/// Journal fields for a package, dropping private (`_`-prefixed) and empty keys.
pub fn filter_package(package: &PackageSpec) -> TraceFields {
    let mut fields = TraceFields::new();
    fields.insert("name".to_owned(), package.name.clone());
    if let Some(version) = &package.version {
        fields.insert("version".to_owned(), version.clone());
    }
    if let Some(packager) = &package.packager_name {
        fields.insert("packager_name".to_owned(), packager.clone());
    }
    for (key, value) in &package.extra {
        if key.is_empty() || key.starts_with('_') {
            continue;
        }
        fields.insert(key.clone(), value.clone());
    }
    fields
}

/// Rebuild a package description from its journaled fields.
pub fn package_from_fields(fields: &TraceFields) -> PackageSpec {
    let mut extra = IndexMap::new();
    for (key, value) in fields {
        if !matches!(key.as_str(), "name" | "version" | "packager_name") {
            extra.insert(key.clone(), value.clone());
        }
    }
    PackageSpec {
        name: fields.get("name").cloned().unwrap_or_default(),
        version: fields.get("version").cloned(),
        packager_name: fields
            .get("packager_name")
            .filter(|name| !name.trim().is_empty())
            .cloned(),
        extra,
    }
}

/// Template parameters for one package: component params plus `NAME` and `VERSION`.
pub(crate) fn package_params(package: &PackageSpec, base: &Params) -> Params {
    let mut params = base.clone();
    params.insert("NAME".to_owned(), package.name.clone());
    params.insert(
        "VERSION".to_owned(),
        package.version.clone().unwrap_or_default(),
    );
    params
}
