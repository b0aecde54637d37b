use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::models::plan::BundleSpec;
use crate::models::value::ParameterMap;

/// Platform tag sent with every provisioning request.
pub const PLATFORM: &str = "kubernetes";

/// Where the instance lives on the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceContext {
    pub platform: String,
    pub namespace: String,
}

/// A provisioning request. Built per trigger, handed to the engine, dropped.
#[derive(Debug, Clone)]
pub struct ServiceInstance {
    pub id: Uuid,
    pub spec: Arc<BundleSpec>,
    pub context: InstanceContext,
    pub parameters: ParameterMap,
}
