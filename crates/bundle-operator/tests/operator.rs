use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bundle_core::{BundlePhase, BundleSpec, GroupVersionKind, ServiceInstance};
use bundle_operator::handler::decode_status;
use bundle_operator::store::BoxFuture;
use bundle_operator::{
    DryRunEngine, HandlerSettings, MemoryStore, ObjectRef, Operator, OperatorSettings,
    ProgressStream, ProvisioningEngine, Registry, ResourceStore, SubmissionError,
};
use serde_json::json;
use tokio::sync::watch;

const POSTGRESQL_APB: &str = include_str!("../../../demos/postgresql-apb.yml");

fn gvk() -> GroupVersionKind {
    GroupVersionKind::new("apps.example.com", "v1alpha1", "PostgreSQL")
}

fn registry() -> Arc<Registry> {
    let spec = Arc::new(BundleSpec::from_yaml(POSTGRESQL_APB).unwrap());
    Arc::new(Registry::builder().bind(&gvk(), spec, "dev").unwrap().build())
}

fn quick_engine() -> Arc<DryRunEngine> {
    Arc::new(DryRunEngine {
        steps: 2,
        step_delay: Duration::from_millis(5),
    })
}

/// Refuses every request and counts how many it saw.
#[derive(Default)]
struct RefusingEngine {
    submissions: AtomicUsize,
}

impl ProvisioningEngine for RefusingEngine {
    fn provision(
        &self,
        _instance: ServiceInstance,
    ) -> BoxFuture<'_, Result<ProgressStream, SubmissionError>> {
        Box::pin(async move {
            self.submissions.fetch_add(1, Ordering::SeqCst);
            Err(SubmissionError::Unavailable("engine offline".to_string()))
        })
    }
}

async fn phase_of(store: &MemoryStore, object: &ObjectRef) -> BundlePhase {
    decode_status(&store.get(object).await.unwrap()).phase
}

async fn wait_for_phase(store: &MemoryStore, object: &ObjectRef, phase: BundlePhase) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while phase_of(store, object).await != phase {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn reconciles_to_running_and_stops_when_idle() {
    let store = Arc::new(MemoryStore::new());
    let events = store.subscribe().unwrap();
    let ready = ObjectRef::new(gvk(), "shop", "orders-db");
    let incomplete = ObjectRef::new(gvk(), "shop", "missing-password");
    store
        .apply(ready.clone(), Some(json!({"postgresql_password": "s3cret"})))
        .unwrap();
    store.apply(incomplete.clone(), Some(json!({}))).unwrap();

    let operator = Operator::new(
        registry(),
        store.clone(),
        quick_engine(),
        HandlerSettings::default(),
        OperatorSettings {
            workers: 2,
            resync: None,
            idle_exit: Some(Duration::from_millis(300)),
        },
    );
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let summary = tokio::time::timeout(Duration::from_secs(10), operator.run(events, shutdown_rx))
        .await
        .unwrap();

    assert_eq!(phase_of(&store, &ready).await, BundlePhase::Running);
    let failed = decode_status(&store.get(&incomplete).await.unwrap());
    assert_eq!(failed.phase, BundlePhase::Failed);
    assert_eq!(
        failed.message,
        "parameter postgresql_password missing required value"
    );

    assert_eq!(summary.triggered, 1);
    assert_eq!(summary.outcomes, 1);
    assert_eq!(summary.observers_finished, 1);
    assert_eq!(summary.observers_cancelled, 0);
    assert_eq!(summary.errors, 0);
}

#[tokio::test]
async fn shutdown_cancels_running_observers() {
    let store = Arc::new(MemoryStore::new());
    let events = store.subscribe().unwrap();
    let object = ObjectRef::new(gvk(), "shop", "orders-db");
    store
        .apply(object.clone(), Some(json!({"postgresql_password": "s3cret"})))
        .unwrap();

    let slow = Arc::new(DryRunEngine {
        steps: 1000,
        step_delay: Duration::from_secs(1),
    });
    let operator = Operator::new(
        registry(),
        store.clone(),
        slow,
        HandlerSettings::default(),
        OperatorSettings {
            workers: 1,
            resync: None,
            idle_exit: None,
        },
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let run = tokio::spawn(operator.run(events, shutdown_rx));

    // Defaults are written first, then the trigger marks it Creating
    // with a hash.
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let status = decode_status(&store.get(&object).await.unwrap());
            if status.phase == BundlePhase::Creating && !status.parameters_hash.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    // Let the worker hand its observer back to the loop.
    tokio::time::sleep(Duration::from_millis(100)).await;

    shutdown_tx.send(true).unwrap();
    let summary = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(summary.triggered, 1);
    assert_eq!(summary.observers_cancelled, 1);
    assert_eq!(phase_of(&store, &object).await, BundlePhase::Creating);
}

#[tokio::test]
async fn resync_picks_up_resources_that_never_sent_events() {
    let store = Arc::new(MemoryStore::new());
    let object = ObjectRef::new(gvk(), "shop", "orders-db");
    store
        .apply(object.clone(), Some(json!({"postgresql_password": "s3cret"})))
        .unwrap();
    // Subscribed after the resource was created: only resync can find it.
    let events = store.subscribe().unwrap();

    let operator = Operator::new(
        registry(),
        store.clone(),
        quick_engine(),
        HandlerSettings::default(),
        OperatorSettings {
            workers: 2,
            resync: Some(Duration::from_millis(50)),
            idle_exit: None,
        },
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let run = tokio::spawn(operator.run(events, shutdown_rx));

    wait_for_phase(&store, &object, BundlePhase::Running).await;

    shutdown_tx.send(true).unwrap();
    let summary = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(summary.triggered, 1);
}

#[tokio::test]
async fn refused_submission_is_not_retried_until_edited() {
    let store = Arc::new(MemoryStore::new());
    let events = store.subscribe().unwrap();
    let object = ObjectRef::new(gvk(), "shop", "orders-db");
    store
        .apply(object.clone(), Some(json!({"postgresql_password": "s3cret"})))
        .unwrap();

    let engine = Arc::new(RefusingEngine::default());
    let operator = Operator::new(
        registry(),
        store.clone(),
        engine.clone(),
        HandlerSettings::default(),
        OperatorSettings {
            workers: 2,
            resync: None,
            idle_exit: Some(Duration::from_millis(300)),
        },
    );
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let summary = tokio::time::timeout(Duration::from_secs(10), operator.run(events, shutdown_rx))
        .await
        .unwrap();

    assert_eq!(engine.submissions.load(Ordering::SeqCst), 1);
    let status = decode_status(&store.get(&object).await.unwrap());
    assert_eq!(status.phase, BundlePhase::Failed);
    assert_eq!(status.message, "could not launch provisioning");
    assert_eq!(summary.triggered, 0);
    assert_eq!(summary.errors, 0);
}
