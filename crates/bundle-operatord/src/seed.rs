use std::path::Path;

use bundle_core::GroupVersionKind;
use bundle_operator::ObjectRef;
use eyre::{Result, WrapErr};
use serde::Deserialize;
use serde_json::Value;

const DEFAULT_NAMESPACE: &str = "default";

/// A resource manifest as users write them.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Manifest {
    api_version: String,
    kind: String,
    #[serde(default)]
    metadata: Metadata,
    /// Kept untyped; a spec of the wrong shape is the operator's to report.
    #[serde(default)]
    spec: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct Metadata {
    #[serde(default)]
    namespace: Option<String>,
    name: String,
}

/// One resource to load into the store.
#[derive(Debug, Clone, PartialEq)]
pub struct SeedResource {
    pub object: ObjectRef,
    pub spec: Option<Value>,
}

/// Parse a multi-document YAML stream of resource manifests.
pub fn parse_manifests(text: &str) -> Result<Vec<SeedResource>> {
    let mut seeds = Vec::new();
    for (index, document) in serde_yaml::Deserializer::from_str(text).enumerate() {
        let value = serde_yaml::Value::deserialize(document)
            .wrap_err_with(|| format!("manifest document {index}"))?;
        if value.is_null() {
            continue;
        }
        let manifest: Manifest = serde_yaml::from_value(value)
            .wrap_err_with(|| format!("manifest document {index}"))?;
        let gvk = GroupVersionKind::from_api_version(&manifest.api_version, &manifest.kind)?;
        let namespace = manifest
            .metadata
            .namespace
            .filter(|ns| !ns.is_empty())
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        seeds.push(SeedResource {
            object: ObjectRef::new(gvk, namespace, manifest.metadata.name),
            spec: manifest.spec,
        });
    }
    Ok(seeds)
}

pub fn load_manifests(path: &Path) -> Result<Vec<SeedResource>> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("reading resources {}", path.display()))?;
    parse_manifests(&text).wrap_err_with(|| format!("parsing resources {}", path.display()))
}
