use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle phase of a bundle resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BundlePhase {
    /// Freshly created; nothing has been attempted yet.
    #[default]
    #[serde(rename = "")]
    Init,
    Creating,
    Running,
    Deleting,
    Failed,
}

/// Status block written on the resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleStatus {
    #[serde(default)]
    pub phase: BundlePhase,
    #[serde(default)]
    pub message: String,
    /// Fingerprint of the parameters last handed to the provisioning engine.
    #[serde(default, rename = "parameters")]
    pub parameters_hash: String,
    /// Instance identity, minted once and kept for the life of the resource.
    #[serde(default, rename = "id", skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<Uuid>,
}

impl BundleStatus {
    /// Same identity and hash, new phase and message.
    pub fn with_phase(&self, phase: BundlePhase, message: impl Into<String>) -> Self {
        Self {
            phase,
            message: message.into(),
            ..self.clone()
        }
    }

    pub fn failed(&self, message: impl Into<String>) -> Self {
        self.with_phase(BundlePhase::Failed, message)
    }

    /// Phases in which declared parameters may still be defaulted.
    pub fn accepts_defaults(&self) -> bool {
        matches!(self.phase, BundlePhase::Init | BundlePhase::Failed)
    }
}
