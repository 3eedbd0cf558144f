//! Cluster Backup Operator
//!
//! A Kubernetes operator that reconciles Velero-compatible `Backup` resources:
//! it validates pending backups, resolves their storage and snapshot
//! locations, runs the item backup pipeline, persists artifacts to an object
//! store, and records outcomes on the resource status.

pub mod backup;
pub mod cache;
pub mod clock;
pub mod config;
pub mod controllers;
pub mod crd;
pub mod error;
pub mod label;
pub mod metrics;
pub mod output;
pub mod persistence;
pub mod plugin;
pub mod reconcilers;
pub mod tracker;

pub use error::{Error, Result};
