use std::time::Duration;

use bundle_core::ServiceInstance;
use tokio::sync::mpsc;

use crate::error::SubmissionError;
use crate::store::BoxFuture;
use crate::trigger::{ProgressStream, ProgressUpdate, ProvisionState, ProvisioningEngine};

/// Engine that runs nothing: it reports a few in-progress steps and then
/// success. Useful to exercise the operator without a real backend.
#[derive(Debug, Clone)]
pub struct DryRunEngine {
    pub steps: usize,
    pub step_delay: Duration,
}

impl Default for DryRunEngine {
    fn default() -> Self {
        Self {
            steps: 3,
            step_delay: Duration::from_millis(200),
        }
    }
}

impl ProvisioningEngine for DryRunEngine {
    fn provision(
        &self,
        instance: ServiceInstance,
    ) -> BoxFuture<'_, Result<ProgressStream, SubmissionError>> {
        Box::pin(async move {
            let (tx, rx) = mpsc::channel(self.steps + 1);
            let steps = self.steps;
            let delay = self.step_delay;
            tokio::spawn(async move {
                for step in 1..=steps {
                    tokio::time::sleep(delay).await;
                    let update = ProgressUpdate::new(
                        ProvisionState::InProgress,
                        format!("dry run step {step}/{steps} for {}", instance.spec.name),
                    );
                    if tx.send(update).await.is_err() {
                        return;
                    }
                }
                let _ = tx
                    .send(ProgressUpdate::new(
                        ProvisionState::Succeeded,
                        format!("dry run of instance {} complete", instance.id),
                    ))
                    .await;
            });
            Ok(rx)
        })
    }
}
