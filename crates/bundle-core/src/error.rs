use thiserror::Error;

/// Errors raised while loading a bundle spec or binding one of its plans.
///
/// All of these are startup-time problems with the schema itself, never
/// with an individual resource.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("spec decoding error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("plan not found: {plan} (bundle {bundle})")]
    PlanNotFound { bundle: String, plan: String },

    #[error("duplicate parameter {parameter} in plan {plan}")]
    DuplicateParameter { plan: String, parameter: String },

    #[error("default for parameter {parameter} in plan {plan} is invalid: {reason}")]
    InvalidDefault {
        plan: String,
        parameter: String,
        reason: String,
    },

    #[error("invalid api version {0:?}, expected group/version")]
    InvalidApiVersion(String),
}
