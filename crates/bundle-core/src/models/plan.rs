use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;
use crate::models::value::ParamValue;

/// A bundle definition: what can be provisioned and with which plans.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleSpec {
    /// Spec format version; documents write it unquoted (`1.0`).
    #[serde(default)]
    pub version: Option<ParamValue>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Image the provisioning engine runs for this bundle.
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub bindable: bool,
    #[serde(default, rename = "async")]
    pub async_mode: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub plans: Vec<Plan>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Identifier passed to the engine as `_apb_plan_id`. Defaults to the name.
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub free: bool,
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// Ordered; defaulting and validation walk them in this order.
    #[serde(default)]
    pub parameters: Vec<ParameterDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, rename = "type")]
    pub param_type: ParamType,
    #[serde(default)]
    pub default: Option<ParamValue>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub pattern: Option<Pattern>,
    #[serde(default, rename = "enum")]
    pub enum_values: Option<Vec<ParamValue>>,
    #[serde(default, rename = "maxlength")]
    pub max_length: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    #[default]
    String,
    #[serde(alias = "integer")]
    Int,
    Number,
    #[serde(alias = "boolean")]
    Bool,
    Enum,
    #[serde(alias = "list")]
    Array,
    /// Any type name the validator does not know; skips the type check.
    #[serde(other)]
    Unknown,
}

/// A validation pattern, compiled when the spec is loaded.
///
/// The compiled form is anchored on both ends so a value has to match in
/// full; `source` keeps the pattern as written for messages and round trips.
#[derive(Clone)]
pub struct Pattern {
    source: String,
    compiled: Regex,
}

impl Pattern {
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        let compiled = Regex::new(&format!("^(?:{source})$"))?;
        Ok(Self {
            source: source.to_string(),
            compiled,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_full_match(&self, value: &str) -> bool {
        self.compiled.is_match(value)
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("Pattern").field(&self.source).finish()
    }
}

impl Serialize for Pattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

impl<'de> Deserialize<'de> for Pattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        Pattern::new(&source).map_err(serde::de::Error::custom)
    }
}

impl BundleSpec {
    /// Parse a bundle spec document and check its plans.
    pub fn from_yaml(document: &str) -> Result<Self, CoreError> {
        let mut spec: BundleSpec = serde_yaml::from_str(document)?;
        for plan in &mut spec.plans {
            if plan.id.is_empty() {
                plan.id = plan.name.clone();
            }
            plan.check_unique_names()?;
        }
        Ok(spec)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, CoreError> {
        let document = std::fs::read_to_string(path)?;
        Self::from_yaml(&document)
    }

    pub fn plan(&self, name: &str) -> Option<&Plan> {
        self.plans.iter().find(|p| p.name == name)
    }

    pub fn require_plan(&self, name: &str) -> Result<&Plan, CoreError> {
        self.plan(name).ok_or_else(|| CoreError::PlanNotFound {
            bundle: self.name.clone(),
            plan: name.to_string(),
        })
    }
}

impl Plan {
    pub fn parameter(&self, name: &str) -> Option<&ParameterDescriptor> {
        self.parameters.iter().find(|p| p.name == name)
    }

    fn check_unique_names(&self) -> Result<(), CoreError> {
        let mut seen = HashSet::new();
        for p in &self.parameters {
            if !seen.insert(p.name.as_str()) {
                return Err(CoreError::DuplicateParameter {
                    plan: self.name.clone(),
                    parameter: p.name.clone(),
                });
            }
        }
        Ok(())
    }
}
