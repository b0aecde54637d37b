use std::sync::Arc;

use bundle_core::{InstanceContext, ParamValue, ParameterMap, ServiceInstance, PLATFORM};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::SubmissionError;
use crate::registry::Binding;
use crate::resource::ObjectRef;
use crate::store::BoxFuture;

/// Parameter carrying the selected plan's id to the engine.
pub const PLAN_ID_PARAMETER: &str = "_apb_plan_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionState {
    InProgress,
    Succeeded,
    Failed,
}

impl ProvisionState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

/// One progress message from a running provisioning workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub state: ProvisionState,
    pub description: String,
    pub observed_at: jiff::Timestamp,
}

impl ProgressUpdate {
    pub fn new(state: ProvisionState, description: impl Into<String>) -> Self {
        Self {
            state,
            description: description.into(),
            observed_at: jiff::Timestamp::now(),
        }
    }
}

/// Progress of one submitted instance; closes when the workflow is done.
pub type ProgressStream = mpsc::Receiver<ProgressUpdate>;

/// The component that actually runs provisioning workflows.
pub trait ProvisioningEngine: Send + Sync {
    /// Start provisioning `instance`. Returns once the request is accepted.
    fn provision(
        &self,
        instance: ServiceInstance,
    ) -> BoxFuture<'_, Result<ProgressStream, SubmissionError>>;
}

/// Terminal result of a workflow, fed back into the resource's status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionOutcome {
    pub object: ObjectRef,
    pub instance_id: Uuid,
    pub parameters_hash: String,
    pub state: ProvisionState,
    pub description: String,
}

/// What an observer saw before it stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObserverReport {
    pub instance_id: Uuid,
    pub updates: usize,
    pub terminal: Option<ProvisionState>,
    pub cancelled: bool,
}

/// Handle on a running progress observer.
///
/// Dropping the handle leaves the observer running until its stream closes.
#[derive(Debug)]
pub struct ObserverHandle {
    pub instance_id: Uuid,
    cancel: watch::Sender<bool>,
    done: oneshot::Receiver<ObserverReport>,
    task: JoinHandle<()>,
}

impl ObserverHandle {
    pub fn cancel(&self) {
        // Receiver gone means the observer already finished.
        let _ = self.cancel.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the observer to stop and return its report.
    pub async fn join(self) -> Option<ObserverReport> {
        match self.done.await {
            Ok(report) => Some(report),
            Err(_) => {
                // Sender dropped without a report: the task panicked.
                if let Err(e) = self.task.await {
                    tracing::error!(instance_id = %self.instance_id, error = %e, "progress observer failed");
                }
                None
            }
        }
    }
}

/// Build the provisioning request for `params`.
///
/// The plan id is injected into the request's copy only; it never feeds the
/// fingerprint and is never written back to the resource.
pub fn build_instance(
    binding: &Binding,
    namespace: &str,
    instance_id: Uuid,
    params: &ParameterMap,
) -> ServiceInstance {
    let mut parameters = params.clone();
    parameters.insert(
        PLAN_ID_PARAMETER.to_string(),
        ParamValue::String(binding.plan.id.clone()),
    );
    ServiceInstance {
        id: instance_id,
        spec: Arc::clone(&binding.spec),
        context: InstanceContext {
            platform: PLATFORM.to_string(),
            namespace: namespace.to_string(),
        },
        parameters,
    }
}

/// Submits instances to the engine and supervises their progress streams.
#[derive(Clone)]
pub struct Provisioner {
    engine: Arc<dyn ProvisioningEngine>,
    outcomes: Option<mpsc::UnboundedSender<ProvisionOutcome>>,
}

impl Provisioner {
    pub fn new(engine: Arc<dyn ProvisioningEngine>) -> Self {
        Self {
            engine,
            outcomes: None,
        }
    }

    /// Publish terminal workflow results on `outcomes`.
    pub fn with_outcomes(mut self, outcomes: mpsc::UnboundedSender<ProvisionOutcome>) -> Self {
        self.outcomes = Some(outcomes);
        self
    }

    /// Hand `instance` to the engine and start draining its progress.
    ///
    /// Returns as soon as the engine accepts the request; the observer runs
    /// on its own task and does not block the caller.
    pub async fn submit(
        &self,
        object: ObjectRef,
        parameters_hash: String,
        instance: ServiceInstance,
    ) -> Result<ObserverHandle, SubmissionError> {
        let instance_id = instance.id;
        tracing::info!(
            resource = %object,
            instance_id = %instance_id,
            bundle = %instance.spec.name,
            namespace = %instance.context.namespace,
            "submitting provisioning request"
        );
        let stream = self.engine.provision(instance).await?;

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (done_tx, done_rx) = oneshot::channel();
        let observer = Observer {
            object,
            instance_id,
            parameters_hash,
            outcomes: self.outcomes.clone(),
        };
        let task = tokio::spawn(async move {
            let report = observer.drain(stream, cancel_rx).await;
            // Nobody waiting for the report is fine.
            let _ = done_tx.send(report);
        });

        Ok(ObserverHandle {
            instance_id,
            cancel: cancel_tx,
            done: done_rx,
            task,
        })
    }
}

struct Observer {
    object: ObjectRef,
    instance_id: Uuid,
    parameters_hash: String,
    outcomes: Option<mpsc::UnboundedSender<ProvisionOutcome>>,
}

impl Observer {
    async fn drain(
        self,
        mut stream: ProgressStream,
        mut cancel: watch::Receiver<bool>,
    ) -> ObserverReport {
        let mut updates = 0;
        let mut last_terminal: Option<ProgressUpdate> = None;
        let mut cancelled = false;
        let mut cancel_open = true;

        loop {
            tokio::select! {
                update = stream.recv() => match update {
                    Some(update) => {
                        updates += 1;
                        tracing::info!(
                            resource = %self.object,
                            instance_id = %self.instance_id,
                            state = ?update.state,
                            description = %update.description,
                            "provisioning progress"
                        );
                        if update.state.is_terminal() {
                            last_terminal = Some(update);
                        }
                    }
                    None => break,
                },
                changed = cancel.changed(), if cancel_open => match changed {
                    Ok(()) if *cancel.borrow() => {
                        cancelled = true;
                        break;
                    }
                    Ok(()) => {}
                    // Handle dropped: keep draining until the engine closes.
                    Err(_) => cancel_open = false,
                },
            }
        }

        if cancelled {
            tracing::info!(instance_id = %self.instance_id, updates, "progress observer cancelled");
        } else {
            tracing::debug!(instance_id = %self.instance_id, updates, "progress stream closed");
        }

        let terminal = last_terminal.as_ref().map(|u| u.state);
        if let (false, Some(last), Some(outcomes)) = (cancelled, last_terminal, &self.outcomes) {
            let outcome = ProvisionOutcome {
                object: self.object.clone(),
                instance_id: self.instance_id,
                parameters_hash: self.parameters_hash.clone(),
                state: last.state,
                description: last.description,
            };
            if outcomes.send(outcome).is_err() {
                tracing::debug!(instance_id = %self.instance_id, "outcome receiver closed");
            }
        }

        ObserverReport {
            instance_id: self.instance_id,
            updates,
            terminal,
            cancelled,
        }
    }
}
