use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio::time::{interval, sleep, MissedTickBehavior};

use crate::error::format_err_chain;
use crate::handler::{Handler, HandlerSettings, Outcome};
use crate::registry::Registry;
use crate::resource::ResourceEvent;
use crate::store::ResourceStore;
use crate::trigger::{ObserverHandle, ObserverReport, ProvisionOutcome, Provisioner, ProvisioningEngine};

#[derive(Debug, Clone)]
pub struct OperatorSettings {
    /// Events reconciled at the same time.
    pub workers: usize,
    /// Redeliver every stored resource this often; `None` disables resync.
    pub resync: Option<Duration>,
    /// Stop after this long with nothing queued, running or observed.
    pub idle_exit: Option<Duration>,
}

impl Default for OperatorSettings {
    fn default() -> Self {
        Self {
            workers: 4,
            resync: Some(Duration::from_secs(5)),
            idle_exit: None,
        }
    }
}

/// Counters for one `run`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub events: usize,
    pub outcomes: usize,
    pub triggered: usize,
    pub errors: usize,
    pub observers_finished: usize,
    pub observers_cancelled: usize,
}

impl RunSummary {
    fn observed(&mut self, report: ObserverReport) {
        if report.cancelled {
            self.observers_cancelled += 1;
        } else {
            self.observers_finished += 1;
        }
    }
}

/// Event loop: a bounded pool of reconcile workers plus the provisioning
/// feedback path and periodic resync.
pub struct Operator {
    handler: Arc<Handler>,
    settings: OperatorSettings,
    outcomes: mpsc::UnboundedReceiver<ProvisionOutcome>,
}

impl Operator {
    pub fn new(
        registry: Arc<Registry>,
        store: Arc<dyn ResourceStore>,
        engine: Arc<dyn ProvisioningEngine>,
        handler_settings: HandlerSettings,
        settings: OperatorSettings,
    ) -> Self {
        let (outcomes_tx, outcomes) = mpsc::unbounded_channel();
        let provisioner = Provisioner::new(engine).with_outcomes(outcomes_tx);
        let handler = Arc::new(Handler::new(registry, store, provisioner, handler_settings));
        Self {
            handler,
            settings,
            outcomes,
        }
    }

    pub fn handler(&self) -> &Arc<Handler> {
        &self.handler
    }

    /// Process events until `shutdown` flips to `true` or the idle timeout
    /// passes with no work queued, running or observed.
    ///
    /// Events for one resource are not serialized; concurrent writes are
    /// settled by the store's version check.
    pub async fn run(
        self,
        mut events: mpsc::UnboundedReceiver<ResourceEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> RunSummary {
        let Operator {
            handler,
            settings,
            mut outcomes,
        } = self;

        let permits = Arc::new(Semaphore::new(settings.workers.max(1)));
        let mut tasks: JoinSet<WorkerOutput> = JoinSet::new();
        let mut observers: Vec<ObserverHandle> = Vec::new();
        let mut summary = RunSummary::default();

        let resync_period = settings.resync.unwrap_or(Duration::from_secs(3600));
        let mut resync = interval(resync_period.max(Duration::from_millis(10)));
        resync.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick fires immediately; the initial listing arrives as events.
        resync.tick().await;

        let mut events_open = true;
        let mut shutdown_open = true;

        tracing::info!(
            workers = settings.workers,
            resync = ?settings.resync,
            "operator started"
        );

        loop {
            prune_finished(&mut observers, &mut summary).await;

            tokio::select! {
                event = events.recv(), if events_open => match event {
                    Some(event) => {
                        summary.events += 1;
                        spawn_event(&mut tasks, &permits, &handler, event);
                    }
                    None => {
                        tracing::debug!("event source closed");
                        events_open = false;
                    }
                },
                Some(outcome) = outcomes.recv() => {
                    summary.outcomes += 1;
                    spawn_outcome(&mut tasks, &permits, &handler, outcome);
                },
                _ = resync.tick(), if settings.resync.is_some() => {
                    match handler.store().list().await {
                        Ok(resources) => {
                            tracing::debug!(count = resources.len(), "resync");
                            for resource in resources {
                                spawn_event(&mut tasks, &permits, &handler, ResourceEvent::changed(resource));
                            }
                        }
                        Err(e) => tracing::warn!(error = %e, "resync listing failed"),
                    }
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    reap(joined, &mut observers, &mut summary);
                },
                changed = shutdown.changed(), if shutdown_open => match changed {
                    Ok(()) if *shutdown.borrow() => {
                        tracing::info!("operator shutting down");
                        break;
                    }
                    Ok(()) => {}
                    Err(_) => shutdown_open = false,
                },
                _ = sleep(settings.idle_exit.unwrap_or_default()), if settings.idle_exit.is_some() => {
                    prune_finished(&mut observers, &mut summary).await;
                    if tasks.is_empty() && observers.is_empty() {
                        tracing::info!("operator idle, stopping");
                        break;
                    }
                },
                else => break,
            }
        }

        while let Some(joined) = tasks.join_next().await {
            reap(joined, &mut observers, &mut summary);
        }
        for observer in &observers {
            observer.cancel();
        }
        for observer in observers {
            if let Some(report) = observer.join().await {
                summary.observed(report);
            }
        }

        tracing::info!(
            events = summary.events,
            triggered = summary.triggered,
            errors = summary.errors,
            "operator stopped"
        );
        summary
    }
}

enum WorkerOutput {
    Handled,
    Triggered(ObserverHandle),
    Failed,
}

fn spawn_event(
    tasks: &mut JoinSet<WorkerOutput>,
    permits: &Arc<Semaphore>,
    handler: &Arc<Handler>,
    event: ResourceEvent,
) {
    let permits = Arc::clone(permits);
    let handler = Arc::clone(handler);
    tasks.spawn(async move {
        let Ok(_permit) = permits.acquire_owned().await else {
            return WorkerOutput::Failed;
        };
        match handler.handle(&event).await {
            Ok(Outcome::Triggered(observer)) => WorkerOutput::Triggered(observer),
            Ok(outcome) => {
                tracing::trace!(resource = %event.resource.object, ?outcome, "event handled");
                WorkerOutput::Handled
            }
            Err(e) => {
                tracing::warn!(
                    resource = %event.resource.object,
                    error = %format_err_chain(&e),
                    "reconcile failed, waiting for the next event"
                );
                WorkerOutput::Failed
            }
        }
    });
}

fn spawn_outcome(
    tasks: &mut JoinSet<WorkerOutput>,
    permits: &Arc<Semaphore>,
    handler: &Arc<Handler>,
    outcome: ProvisionOutcome,
) {
    let permits = Arc::clone(permits);
    let handler = Arc::clone(handler);
    tasks.spawn(async move {
        let Ok(_permit) = permits.acquire_owned().await else {
            return WorkerOutput::Failed;
        };
        match handler.record_outcome(&outcome).await {
            Ok(_) => WorkerOutput::Handled,
            Err(e) => {
                tracing::warn!(
                    resource = %outcome.object,
                    instance_id = %outcome.instance_id,
                    error = %format_err_chain(&e),
                    "unable to record provisioning outcome"
                );
                WorkerOutput::Failed
            }
        }
    });
}

fn reap(
    joined: Result<WorkerOutput, JoinError>,
    observers: &mut Vec<ObserverHandle>,
    summary: &mut RunSummary,
) {
    match joined {
        Ok(WorkerOutput::Triggered(observer)) => {
            summary.triggered += 1;
            observers.push(observer);
        }
        Ok(WorkerOutput::Handled) => {}
        Ok(WorkerOutput::Failed) => summary.errors += 1,
        Err(e) => {
            summary.errors += 1;
            tracing::error!(error = %e, "reconcile worker panicked");
        }
    }
}

async fn prune_finished(observers: &mut Vec<ObserverHandle>, summary: &mut RunSummary) {
    if !observers.iter().any(ObserverHandle::is_finished) {
        return;
    }
    let (finished, running): (Vec<_>, Vec<_>) =
        observers.drain(..).partition(ObserverHandle::is_finished);
    *observers = running;
    for observer in finished {
        if let Some(report) = observer.join().await {
            summary.observed(report);
        }
    }
}
