use std::fmt;

use bundle_core::GroupVersionKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Composite key addressing one resource in the store.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub gvk: GroupVersionKind,
    pub namespace: String,
    pub name: String,
}

impl ObjectRef {
    pub fn new(gvk: GroupVersionKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            gvk,
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}/{}", self.gvk.kind, self.namespace, self.name)
    }
}

/// Snapshot of a resource as the store holds it. `spec` and `status` are
/// untyped; decoding them is the handler's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResource {
    pub object: ObjectRef,
    pub resource_version: String,
    pub spec: Option<Value>,
    pub status: Option<Value>,
}

/// A change notification delivered to the operator.
#[derive(Debug, Clone)]
pub struct ResourceEvent {
    pub resource: StoredResource,
    pub deleted: bool,
}

impl ResourceEvent {
    pub fn changed(resource: StoredResource) -> Self {
        Self {
            resource,
            deleted: false,
        }
    }
}

/// Full replacement of the subtrees the operator owns.
#[derive(Debug, Clone)]
pub struct ResourceUpdate {
    pub object: ObjectRef,
    /// Version the decision was based on; stale versions are rejected.
    pub resource_version: String,
    pub status: Value,
    /// Replacement spec, only when defaults were filled in.
    pub spec: Option<Value>,
}
