//! bundle-operatord
//!
//! Daemon wiring for the bundle operator: configuration resolution and
//! loading resource manifests into the in-process store.

pub mod config;
pub mod seed;

pub use crate::config::{Args, DaemonConfig, FileConfig, LogFormat};
pub use crate::seed::{load_manifests, parse_manifests, SeedResource};
