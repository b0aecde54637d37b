//! The status state machine.
//!
//! Every decision about a bundle resource is made here, as a pure function
//! of the binding, the resource's current status and its declared
//! parameters. Callers persist whatever [`Action`] comes back and rely on
//! the resulting update event to call back in; nothing loops internally.

use bundle_core::{BundlePhase, BundleStatus, ParameterMap, ServiceInstance};
use uuid::Uuid;

use crate::defaults::{apply_defaults, check_parameters};
use crate::fingerprint::fingerprint;
use crate::registry::Binding;
use crate::trigger::{build_instance, ProvisionOutcome, ProvisionState};

pub const SPEC_SHAPE_MESSAGE: &str = "unable to understand spec field";
pub const HASH_FAILED_MESSAGE: &str = "could not hash parameters";
pub const SUBMISSION_FAILED_MESSAGE: &str = "could not launch provisioning";
pub const PROVISIONING_FAILED_MESSAGE: &str = "provisioning failed";

/// What the caller must do next.
#[derive(Debug, Clone)]
pub enum Action {
    /// Status already reflects the declared parameters.
    NoAction,
    /// Persist `status`, and `params` as the new spec when present.
    UpdateStatus {
        status: BundleStatus,
        params: Option<ParameterMap>,
    },
    /// Persist a `Failed` status.
    Fail(BundleStatus),
    /// Persist `status`, then submit `instance` to the engine.
    Trigger {
        instance: ServiceInstance,
        status: BundleStatus,
    },
}

/// Identity of the resource being reconciled, as needed to build a request.
#[derive(Debug, Clone, Copy)]
pub struct ResourceContext<'a> {
    pub namespace: &'a str,
    pub name: &'a str,
}

/// Decide the next step for a resource.
pub fn reconcile(
    binding: &Binding,
    resource: ResourceContext<'_>,
    status: &BundleStatus,
    declared: &ParameterMap,
) -> Action {
    if status.phase == BundlePhase::Deleting {
        return Action::NoAction;
    }

    if status.accepts_defaults() {
        let defaulted = apply_defaults(&binding.plan, declared);
        if defaulted.changed {
            // Write the defaults and come back on the update event; any
            // failure left after defaulting is reported then.
            return Action::UpdateStatus {
                status: status.with_phase(BundlePhase::Creating, ""),
                params: Some(defaulted.params),
            };
        }
        if let Some(failure) = defaulted.failure {
            return Action::Fail(status.failed(failure.to_string()));
        }
    } else if let Err(failure) = check_parameters(&binding.plan, declared) {
        return Action::Fail(status.failed(failure.to_string()));
    }

    let hash = match fingerprint(declared) {
        Ok(hash) => hash,
        Err(e) => {
            tracing::warn!(resource = %resource.name, error = %e, "unable to hash parameters");
            return Action::Fail(status.failed(HASH_FAILED_MESSAGE));
        }
    };

    if hash == status.parameters_hash {
        return Action::NoAction;
    }

    // Identity is minted only once the parameters are known to be complete.
    let instance_id = status.instance_id.unwrap_or_else(Uuid::new_v4);
    let instance = build_instance(binding, resource.namespace, instance_id, declared);
    Action::Trigger {
        instance,
        status: BundleStatus {
            phase: BundlePhase::Creating,
            message: String::new(),
            parameters_hash: hash,
            instance_id: Some(instance_id),
        },
    }
}

/// The resource's spec is not a parameter map.
pub fn reject_spec(status: &BundleStatus) -> Action {
    Action::Fail(status.failed(SPEC_SHAPE_MESSAGE))
}

/// The engine refused a request the resource was already marked `Creating`
/// for. The attempted hash stays, so only a change to the parameters
/// triggers again.
pub fn submission_failed(attempted: &BundleStatus) -> Action {
    Action::Fail(attempted.failed(SUBMISSION_FAILED_MESSAGE))
}

/// Fold a finished workflow back into the status.
///
/// Outcomes for another instance, for parameters that have since changed,
/// or for a resource no longer `Creating` are stale and ignored.
pub fn record_outcome(status: &BundleStatus, outcome: &ProvisionOutcome) -> Action {
    let current = status.phase == BundlePhase::Creating
        && status.instance_id == Some(outcome.instance_id)
        && status.parameters_hash == outcome.parameters_hash;
    if !current {
        return Action::NoAction;
    }
    match outcome.state {
        ProvisionState::Succeeded => Action::UpdateStatus {
            status: status.with_phase(BundlePhase::Running, ""),
            params: None,
        },
        ProvisionState::Failed => Action::Fail(status.failed(PROVISIONING_FAILED_MESSAGE)),
        ProvisionState::InProgress => Action::NoAction,
    }
}
