use std::fmt;

use bundle_core::CoreError;
use thiserror::Error;

/// Errors that escape a handler call: store problems and startup schema
/// problems. Per-resource failures never show up here; they become a
/// `Failed` status on the resource instead.
#[derive(Debug, Error)]
pub enum OperatorError {
    #[error("schema error: {0}")]
    Schema(#[from] CoreError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("resource version conflict on {resource} (expected {expected}, found {actual})")]
    Conflict {
        resource: String,
        expected: String,
        actual: String,
    },

    #[error("resource not found: {resource}")]
    NotFound { resource: String },

    #[error("store backend error: {0}")]
    Backend(String),
}

/// The provisioning engine could not be reached or refused the request.
#[derive(Debug, Clone, Error)]
pub enum SubmissionError {
    #[error("provisioning engine unavailable: {0}")]
    Unavailable(String),

    #[error("provisioning request rejected: {0}")]
    Rejected(String),
}

/// Parameter map could not be canonically serialized.
#[derive(Debug, Clone, Error)]
#[error("cannot canonicalize parameter {parameter}: {reason}")]
pub struct HashError {
    pub parameter: String,
    pub reason: String,
}

/// The resource's `spec` is not a map of parameter values.
#[derive(Debug, Clone, Error)]
#[error("unable to understand spec field")]
pub struct SpecShapeError {
    pub detail: String,
}

/// First parameter in plan order that is missing or invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterFailure {
    pub name: String,
    pub reason: String,
}

impl ParameterFailure {
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ParameterFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "parameter {} {}", self.name, self.reason)
    }
}

impl std::error::Error for ParameterFailure {}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Walk the full error chain and join all causes into one string.
///
/// Engine errors often have terse `Display` impls but useful detail in
/// the source chain.
pub fn format_err_chain(err: &dyn std::error::Error) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}
