//! hpa-floor-guard - keeps HorizontalPodAutoscalers from collapsing their floor
//!
//! The native HPA happily drops from 40 replicas to 4 when a metric blips.
//! This controller watches HPAs that opt in via annotations and keeps
//! `spec.minReplicas` one replica below the HPA's desired count, lowering it
//! again only after a per-HPA cooldown. Raising the floor is never delayed.
//!
//! # Modules
//!
//! - [`config`] - Annotation schema and the pure parse into [`config::PolicyConfig`]
//! - [`view`] - Read-only view over one HPA snapshot
//! - [`clock`] - Injectable time source
//! - [`policy`] - The floor decision procedure
//! - [`controller`] - Reconciler, store and informer plumbing
//! - [`kube_client`] - Kubernetes client construction
//! - [`telemetry`] - Tracing subscriber and OTLP export
//! - [`error`] - Error types

#![deny(missing_docs)]

pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod kube_client;
pub mod policy;
pub mod telemetry;
pub mod view;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Crate version, reported at startup and by the `version` command
pub const BUILD_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Git commit the binary was built from (`unknown` outside a git checkout)
pub const BUILD_COMMIT: &str = env!("HPA_FLOOR_GUARD_GIT_SHA");

/// Field manager recorded on every write to the API server
pub const FIELD_MANAGER: &str = "hpa-floor-guard";
