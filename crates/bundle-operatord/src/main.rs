use std::sync::Arc;

use bundle_core::BundleSpec;
use bundle_operator::{DryRunEngine, MemoryStore, Operator, Registry};
use bundle_operatord::{load_manifests, Args, DaemonConfig, LogFormat};
use clap::Parser;
use eyre::{eyre, Result, WrapErr};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let config = DaemonConfig::resolve(Args::parse())?;
    init_tracing(config.log_format);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        key = %config.gvk.key(),
        namespace = config.namespace.as_deref().unwrap_or("*"),
        "starting bundle operator"
    );

    let spec = BundleSpec::from_yaml_file(&config.spec_file)
        .wrap_err_with(|| format!("loading bundle spec {}", config.spec_file.display()))?;
    let plan = match &config.plan {
        Some(plan) => plan.clone(),
        None => spec
            .plans
            .first()
            .map(|p| p.name.clone())
            .ok_or_else(|| eyre!("bundle {} declares no plans", spec.name))?,
    };
    let registry = Registry::builder()
        .bind(&config.gvk, Arc::new(spec), &plan)?
        .build();
    tracing::info!(bindings = registry.len(), plan = %plan, "registry ready");

    let store = Arc::new(MemoryStore::new());
    let events = store.subscribe()?;
    if let Some(path) = &config.resources {
        let seeds = load_manifests(path)?;
        tracing::info!(count = seeds.len(), path = %path.display(), "loading resources");
        for seed in seeds {
            store.apply(seed.object, seed.spec)?;
        }
    }

    let operator = Operator::new(
        Arc::new(registry),
        store.clone(),
        Arc::new(DryRunEngine::default()),
        config.handler_settings(),
        config.operator_settings(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "unable to listen for interrupt");
            return;
        }
        tracing::info!("interrupt received");
        let _ = shutdown_tx.send(true);
    });

    let summary = operator.run(events, shutdown_rx).await;
    tracing::info!(
        events = summary.events,
        triggered = summary.triggered,
        errors = summary.errors,
        "shutdown complete"
    );

    if config.once {
        let resources = store.snapshot()?;
        println!("{}", serde_json::to_string_pretty(&resources)?);
    }
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}
