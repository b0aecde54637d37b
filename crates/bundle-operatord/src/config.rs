use std::path::{Path, PathBuf};
use std::time::Duration;

use bundle_core::GroupVersionKind;
use bundle_operator::{HandlerSettings, OperatorSettings};
use clap::{Parser, ValueEnum};
use eyre::{eyre, Result, WrapErr};
use serde::Deserialize;

const DEFAULT_RESYNC_SECS: u64 = 5;
const DEFAULT_WORKERS: usize = 4;
const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 5;
/// Quiet period after which `--once` stops.
const ONCE_IDLE_EXIT: Duration = Duration::from_millis(500);

#[derive(Debug, Parser)]
#[command(name = "bundle-operatord")]
#[command(about = "Reconcile bundle resources and trigger provisioning")]
#[command(version)]
pub struct Args {
    /// Resource group and version to watch, as `group/version`
    #[arg(long, env = "BUNDLE_API_VERSION")]
    pub api_version: Option<String>,

    /// Resource kind to watch
    #[arg(long, env = "BUNDLE_KIND")]
    pub kind: Option<String>,

    /// Only reconcile resources in this namespace (all namespaces if unset)
    #[arg(long, env = "WATCH_NAMESPACE")]
    pub namespace: Option<String>,

    /// Seconds between full resyncs; 0 disables resync
    #[arg(long)]
    pub resync: Option<u64>,

    /// Plan to bind; defaults to the first plan in the bundle spec
    #[arg(long, env = "BUNDLE_PLAN")]
    pub plan: Option<String>,

    /// Bundle spec (YAML)
    #[arg(long, env = "BUNDLE_SPEC_FILE")]
    pub spec_file: Option<PathBuf>,

    /// Resource manifests to load into the store at startup (multi-document YAML)
    #[arg(long)]
    pub resources: Option<PathBuf>,

    /// Events reconciled concurrently
    #[arg(long)]
    pub workers: Option<usize>,

    /// Re-reads after a version conflict before an event is given up
    #[arg(long)]
    pub max_conflict_retries: Option<u32>,

    /// Log output format
    #[arg(long)]
    pub log_format: Option<LogFormat>,

    /// Stop once every resource has settled and print the final state
    #[arg(long)]
    pub once: bool,

    /// Config file (YAML or JSON); its values override the flags above
    #[arg(long, env = "BUNDLE_OPERATOR_CONFIG")]
    pub config_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// On-disk form of the configuration. Every field is optional; set fields
/// replace the command line value.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "snake_case", deny_unknown_fields)]
pub struct FileConfig {
    pub api_version: Option<String>,
    pub kind: Option<String>,
    pub namespace: Option<String>,
    pub resync: Option<u64>,
    pub plan: Option<String>,
    pub spec_file: Option<PathBuf>,
    pub resources: Option<PathBuf>,
    pub workers: Option<usize>,
    pub max_conflict_retries: Option<u32>,
    pub log_format: Option<LogFormat>,
    pub once: Option<bool>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("reading config file {}", path.display()))?;
        // YAML is a superset of JSON, so one parser covers both.
        serde_yaml::from_str(&text)
            .wrap_err_with(|| format!("parsing config file {}", path.display()))
    }
}

/// Fully resolved daemon configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct DaemonConfig {
    pub gvk: GroupVersionKind,
    pub namespace: Option<String>,
    pub resync: Option<Duration>,
    pub plan: Option<String>,
    pub spec_file: PathBuf,
    pub resources: Option<PathBuf>,
    pub workers: usize,
    pub max_conflict_retries: u32,
    pub log_format: LogFormat,
    pub once: bool,
}

impl DaemonConfig {
    /// Merge `args` with the config file it names, if any.
    pub fn resolve(args: Args) -> Result<Self> {
        let file = match &args.config_file {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::merge(args, file)
    }

    pub fn merge(args: Args, file: FileConfig) -> Result<Self> {
        let api_version = file
            .api_version
            .or(args.api_version)
            .ok_or_else(|| eyre!("--api-version is required"))?;
        let kind = file
            .kind
            .or(args.kind)
            .ok_or_else(|| eyre!("--kind is required"))?;
        let spec_file = file
            .spec_file
            .or(args.spec_file)
            .ok_or_else(|| eyre!("--spec-file is required"))?;
        let gvk = GroupVersionKind::from_api_version(&api_version, &kind)?;

        let once = file.once.unwrap_or(args.once);
        let resync_secs = file
            .resync
            .or(args.resync)
            .unwrap_or(DEFAULT_RESYNC_SECS);
        let resync = (resync_secs > 0 && !once).then(|| Duration::from_secs(resync_secs));

        Ok(Self {
            gvk,
            namespace: file.namespace.or(args.namespace).filter(|ns| !ns.is_empty()),
            resync,
            plan: file.plan.or(args.plan),
            spec_file,
            resources: file.resources.or(args.resources),
            workers: file.workers.or(args.workers).unwrap_or(DEFAULT_WORKERS),
            max_conflict_retries: file
                .max_conflict_retries
                .or(args.max_conflict_retries)
                .unwrap_or(DEFAULT_MAX_CONFLICT_RETRIES),
            log_format: file.log_format.or(args.log_format).unwrap_or_default(),
            once,
        })
    }

    pub fn handler_settings(&self) -> HandlerSettings {
        HandlerSettings {
            namespace: self.namespace.clone(),
            max_conflict_retries: self.max_conflict_retries,
        }
    }

    pub fn operator_settings(&self) -> OperatorSettings {
        OperatorSettings {
            workers: self.workers,
            resync: self.resync,
            idle_exit: self.once.then_some(ONCE_IDLE_EXIT),
        }
    }
}
