//! bundle-operator
//!
//! Reconciliation for bundle resources: defaults and validates declared
//! parameters against the bound plan, detects parameter changes by
//! fingerprint, and triggers provisioning once per distinct parameter set.
//!
//! Public API:
//! - `reconcile()` — the status state machine, a pure decision function
//! - `Handler::handle()` — decode an event, decide, persist, submit
//! - `Operator::run()` — worker pool over an event stream, with resync and
//!   provisioning feedback
//! - `apply_defaults()` / `validate()` / `fingerprint()` — the building blocks

pub mod defaults;
pub mod engines;
pub mod error;
pub mod fingerprint;
pub mod handler;
pub mod operator;
pub mod reconcile;
pub mod registry;
pub mod resource;
pub mod store;
pub mod trigger;
pub mod validate;

pub use crate::defaults::{apply_defaults, check_parameters, Defaulted};
pub use crate::engines::DryRunEngine;
pub use crate::error::{
    HashError, OperatorError, ParameterFailure, SpecShapeError, StoreError, SubmissionError,
};
pub use crate::fingerprint::fingerprint;
pub use crate::handler::{Handler, HandlerSettings, Outcome};
pub use crate::operator::{Operator, OperatorSettings, RunSummary};
pub use crate::reconcile::{reconcile, Action, ResourceContext};
pub use crate::registry::{Binding, Registry};
pub use crate::resource::{ObjectRef, ResourceEvent, ResourceUpdate, StoredResource};
pub use crate::store::{MemoryStore, ResourceStore};
pub use crate::trigger::{
    ObserverHandle, ObserverReport, ProgressStream, ProgressUpdate, ProvisionOutcome,
    ProvisionState, Provisioner, ProvisioningEngine,
};
pub use crate::validate::validate;
