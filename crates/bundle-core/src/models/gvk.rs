use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Group, version and kind of a watched resource type.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct GroupVersionKind {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl GroupVersionKind {
    pub fn new(group: impl Into<String>, version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    /// Build from an `apiVersion` of the form `group/version` plus a kind.
    pub fn from_api_version(api_version: &str, kind: &str) -> Result<Self, CoreError> {
        match api_version.split_once('/') {
            Some((group, version)) if !group.is_empty() && !version.is_empty() => {
                Ok(Self::new(group, version, kind))
            }
            _ => Err(CoreError::InvalidApiVersion(api_version.to_string())),
        }
    }

    /// Registry key, `<group>/<version>:<kind>`.
    pub fn key(&self) -> String {
        format!("{}/{}:{}", self.group, self.version, self.kind)
    }
}

impl fmt::Display for GroupVersionKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.key())
    }
}
