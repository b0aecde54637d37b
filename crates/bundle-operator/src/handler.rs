use std::sync::Arc;

use bundle_core::{BundleStatus, ParamValue, ParameterMap};
use serde_json::Value;

use crate::error::{format_err_chain, OperatorError, SpecShapeError, StoreError};
use crate::reconcile::{self, Action, ResourceContext};
use crate::registry::Registry;
use crate::resource::{ObjectRef, ResourceEvent, ResourceUpdate, StoredResource};
use crate::store::ResourceStore;
use crate::trigger::{ObserverHandle, ProvisionOutcome, Provisioner};

#[derive(Debug, Clone)]
pub struct HandlerSettings {
    /// Only resources in this namespace are reconciled; `None` means all.
    pub namespace: Option<String>,
    /// Re-reads after a version conflict before giving up on an event.
    pub max_conflict_retries: u32,
}

impl Default for HandlerSettings {
    fn default() -> Self {
        Self {
            namespace: None,
            max_conflict_retries: 5,
        }
    }
}

/// Result of handling one event.
#[derive(Debug)]
pub enum Outcome {
    /// Not ours: unregistered type, other namespace, or a deletion.
    Ignored,
    /// Nothing to write.
    Unchanged,
    /// Status (and possibly spec) written.
    Updated,
    /// A `Failed` status was written or already in place.
    Failed { message: String },
    /// Provisioning submitted; the observer drains its progress.
    Triggered(ObserverHandle),
}

/// Turns resource events into status writes and provisioning requests.
pub struct Handler {
    registry: Arc<Registry>,
    store: Arc<dyn ResourceStore>,
    provisioner: Provisioner,
    settings: HandlerSettings,
}

impl Handler {
    pub fn new(
        registry: Arc<Registry>,
        store: Arc<dyn ResourceStore>,
        provisioner: Provisioner,
        settings: HandlerSettings,
    ) -> Self {
        Self {
            registry,
            store,
            provisioner,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<dyn ResourceStore> {
        &self.store
    }

    /// Reconcile the resource carried by `event`.
    ///
    /// Per-resource problems end up as a `Failed` status and an `Ok`
    /// return; only store errors (including conflicts that outlast the
    /// retry budget) come back as `Err`.
    pub async fn handle(&self, event: &ResourceEvent) -> Result<Outcome, OperatorError> {
        let object = &event.resource.object;
        let Some(binding) = self.registry.lookup(&object.gvk) else {
            tracing::trace!(resource = %object, key = %object.gvk.key(), "no binding, ignoring");
            return Ok(Outcome::Ignored);
        };
        if event.deleted {
            tracing::debug!(resource = %object, "resource deleted, ignoring");
            return Ok(Outcome::Ignored);
        }
        if !self.in_scope(object) {
            tracing::debug!(resource = %object, "outside watched namespace, ignoring");
            return Ok(Outcome::Ignored);
        }

        let mut snapshot = event.resource.clone();
        let mut attempts = 0;
        loop {
            let status = decode_status(&snapshot);
            let action = match decode_spec(&snapshot) {
                Ok(declared) => reconcile::reconcile(
                    binding,
                    ResourceContext {
                        namespace: &object.namespace,
                        name: &object.name,
                    },
                    &status,
                    &declared,
                ),
                Err(e) => {
                    tracing::info!(resource = %object, detail = %e.detail, "unable to deal with spec field");
                    reconcile::reject_spec(&status)
                }
            };

            match self.execute(&snapshot, &status, action).await {
                Err(e) if is_conflict(&e) && attempts < self.settings.max_conflict_retries => {
                    attempts += 1;
                    tracing::debug!(resource = %object, attempts, "version conflict, reconciling again");
                    match self.refetch(object).await? {
                        Some(fresh) => snapshot = fresh,
                        None => return Ok(Outcome::Ignored),
                    }
                }
                result => return result,
            }
        }
    }

    /// Apply a finished workflow's result to its resource.
    pub async fn record_outcome(&self, outcome: &ProvisionOutcome) -> Result<Outcome, OperatorError> {
        let Some(mut snapshot) = self.refetch(&outcome.object).await? else {
            return Ok(Outcome::Ignored);
        };
        let mut attempts = 0;
        loop {
            let status = decode_status(&snapshot);
            let action = reconcile::record_outcome(&status, outcome);
            if matches!(action, Action::NoAction) {
                tracing::debug!(
                    resource = %outcome.object,
                    instance_id = %outcome.instance_id,
                    "stale provisioning outcome, ignoring"
                );
                return Ok(Outcome::Unchanged);
            }
            match self.write_action(&snapshot, &action).await {
                Ok(_) => {
                    tracing::info!(
                        resource = %outcome.object,
                        instance_id = %outcome.instance_id,
                        state = ?outcome.state,
                        "provisioning finished"
                    );
                    return Ok(summarize(&action));
                }
                Err(e) if is_conflict(&e) && attempts < self.settings.max_conflict_retries => {
                    attempts += 1;
                    match self.refetch(&outcome.object).await? {
                        Some(fresh) => snapshot = fresh,
                        None => return Ok(Outcome::Ignored),
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn in_scope(&self, object: &ObjectRef) -> bool {
        match self.settings.namespace.as_deref() {
            None | Some("") => true,
            Some(ns) => object.namespace == ns,
        }
    }

    async fn execute(
        &self,
        snapshot: &StoredResource,
        current: &BundleStatus,
        action: Action,
    ) -> Result<Outcome, OperatorError> {
        let object = &snapshot.object;
        match action {
            Action::NoAction => {
                tracing::debug!(resource = %object, phase = ?current.phase, "in sync");
                Ok(Outcome::Unchanged)
            }
            Action::Trigger { instance, status } => {
                // The write is the lock: a concurrent reconcile of the same
                // version loses with a conflict and never submits.
                let written = self
                    .write_action(snapshot, &Action::UpdateStatus {
                        status: status.clone(),
                        params: None,
                    })
                    .await?
                    .unwrap_or_else(|| snapshot.clone());

                match self
                    .provisioner
                    .submit(object.clone(), status.parameters_hash.clone(), instance)
                    .await
                {
                    Ok(observer) => Ok(Outcome::Triggered(observer)),
                    Err(e) => {
                        tracing::warn!(
                            resource = %object,
                            error = %format_err_chain(&e),
                            "unable to launch provisioning"
                        );
                        self.submission_failed(written, &status).await?;
                        Ok(Outcome::Failed {
                            message: reconcile::SUBMISSION_FAILED_MESSAGE.to_string(),
                        })
                    }
                }
            }
            action => {
                match &action {
                    Action::UpdateStatus { params: Some(_), .. } => {
                        tracing::info!(resource = %object, "defaults applied")
                    }
                    Action::Fail(status) => {
                        tracing::info!(resource = %object, message = %status.message, "resource failed")
                    }
                    _ => {}
                }
                self.write_action(snapshot, &action).await?;
                Ok(summarize(&action))
            }
        }
    }

    /// Mark the resource failed after the engine refused a request, unless
    /// something newer has already replaced the attempted status.
    async fn submission_failed(
        &self,
        mut snapshot: StoredResource,
        attempted: &BundleStatus,
    ) -> Result<(), OperatorError> {
        let mut attempts = 0;
        loop {
            let status = decode_status(&snapshot);
            if status.parameters_hash != attempted.parameters_hash
                || status.instance_id != attempted.instance_id
            {
                return Ok(());
            }
            let action = reconcile::submission_failed(&status);
            match self.write_action(&snapshot, &action).await {
                Ok(_) => return Ok(()),
                Err(e) if is_conflict(&e) && attempts < self.settings.max_conflict_retries => {
                    attempts += 1;
                    match self.refetch(&snapshot.object).await? {
                        Some(fresh) => snapshot = fresh,
                        None => return Ok(()),
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Persist the status (and spec) an action carries.
    ///
    /// Returns the new snapshot, or `None` when there was nothing to write
    /// because the stored content already matches.
    async fn write_action(
        &self,
        snapshot: &StoredResource,
        action: &Action,
    ) -> Result<Option<StoredResource>, OperatorError> {
        let (status, params) = match action {
            Action::NoAction => return Ok(None),
            Action::UpdateStatus { status, params } => (status, params.as_ref()),
            Action::Fail(status) => (status, None),
            Action::Trigger { status, .. } => (status, None),
        };

        let status = serde_json::to_value(status)?;
        let spec = params.map(serde_json::to_value).transpose()?;
        let status_same = snapshot.status.as_ref() == Some(&status);
        let spec_same = spec.is_none() || snapshot.spec == spec;
        if status_same && spec_same {
            tracing::debug!(resource = %snapshot.object, "stored state already current, skipping write");
            return Ok(None);
        }

        let stored = self
            .store
            .update(ResourceUpdate {
                object: snapshot.object.clone(),
                resource_version: snapshot.resource_version.clone(),
                status,
                spec,
            })
            .await?;
        Ok(Some(stored))
    }

    async fn refetch(&self, object: &ObjectRef) -> Result<Option<StoredResource>, OperatorError> {
        match self.store.get(object).await {
            Ok(fresh) => Ok(Some(fresh)),
            Err(StoreError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn is_conflict(err: &OperatorError) -> bool {
    matches!(err, OperatorError::Store(e) if e.is_conflict())
}

fn summarize(action: &Action) -> Outcome {
    match action {
        Action::NoAction => Outcome::Unchanged,
        Action::Fail(status) => Outcome::Failed {
            message: status.message.clone(),
        },
        _ => Outcome::Updated,
    }
}

/// Status of a snapshot; missing or unreadable status means `Init`.
pub fn decode_status(snapshot: &StoredResource) -> BundleStatus {
    match &snapshot.status {
        None | Some(Value::Null) => BundleStatus::default(),
        Some(value) => serde_json::from_value(value.clone()).unwrap_or_else(|e| {
            tracing::warn!(resource = %snapshot.object, error = %e, "unable to decode status, treating as new");
            BundleStatus::default()
        }),
    }
}

/// Declared parameters of a snapshot; a missing spec is an empty map and
/// anything but a map is rejected.
pub fn decode_spec(snapshot: &StoredResource) -> Result<ParameterMap, SpecShapeError> {
    match &snapshot.spec {
        None | Some(Value::Null) => Ok(ParameterMap::new()),
        Some(Value::Object(object)) => Ok(ParamValue::map_from_json(object)),
        Some(other) => Err(SpecShapeError {
            detail: format!("spec is {}, expected a map", json_kind(other)),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a map",
    }
}
