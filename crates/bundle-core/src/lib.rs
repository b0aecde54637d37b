//! bundle-core
//!
//! Pure domain types for bundle resources: the bundle spec and its plans,
//! parameter values, the status stored on a resource, and the service
//! instance handed to a provisioning engine.
//! No async runtime dependency — this is the shared vocabulary of the operator.

pub mod error;
pub mod models;

pub use crate::error::CoreError;
pub use crate::models::gvk::GroupVersionKind;
pub use crate::models::instance::{InstanceContext, ServiceInstance, PLATFORM};
pub use crate::models::plan::{BundleSpec, ParamType, ParameterDescriptor, Pattern, Plan};
pub use crate::models::status::{BundlePhase, BundleStatus};
pub use crate::models::value::{ParamValue, ParameterMap};
