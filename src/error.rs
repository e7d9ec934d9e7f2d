//! Error types for hpa-floor-guard
//!
//! Malformed annotations never become errors: they are logged and treated as
//! absent (see [`crate::config`]). The variants here cover API failures,
//! client setup and telemetry setup.

use thiserror::Error;

/// Main error type for hpa-floor-guard operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Kubernetes client configuration error (kubeconfig, in-cluster config)
    #[error("client configuration error: {0}")]
    Config(String),

    /// Tracing or OTLP exporter initialization error
    #[error("telemetry error: {0}")]
    Telemetry(String),

    /// Snapshot is missing data the reconciler cannot do without
    #[error("invalid object: {0}")]
    Invalid(String),
}

impl Error {
    /// Create a client configuration error with the given message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a telemetry error with the given message
    pub fn telemetry(msg: impl Into<String>) -> Self {
        Self::Telemetry(msg.into())
    }

    /// Create an invalid-object error with the given message
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }

    /// True when the API server rejected a write built from a stale snapshot
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Kube(kube::Error::Api(resp)) if resp.code == 409)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==========================================================================
    // Story Tests: what operators see when something goes wrong
    // ==========================================================================

    /// Story: a broken kubeconfig surfaces as a configuration error at startup
    #[test]
    fn story_bad_kubeconfig_is_a_config_error() {
        let err = Error::config("failed to read kubeconfig: No such file or directory");
        assert!(err.to_string().contains("client configuration error"));
        assert!(err.to_string().contains("No such file"));

        match Error::config("any message") {
            Error::Config(msg) => assert_eq!(msg, "any message"),
            _ => panic!("Expected Config variant"),
        }
    }

    /// Story: an unreachable OTLP collector is reported as a telemetry error
    #[test]
    fn story_exporter_failure_is_a_telemetry_error() {
        let err = Error::telemetry("failed to build span exporter: invalid uri");
        assert_eq!(
            err.to_string(),
            "telemetry error: failed to build span exporter: invalid uri"
        );
    }

    /// Story: an HPA without a namespace cannot be written back
    #[test]
    fn story_missing_namespace_is_invalid() {
        let err = Error::invalid("HorizontalPodAutoscaler web has no namespace");
        assert!(err.to_string().starts_with("invalid object:"));
        assert!(!err.is_conflict());
    }

    /// Story: two writers raced on the same HPA and the API server said 409
    #[test]
    fn story_stale_write_is_detected_as_conflict() {
        let err = Error::from(kube::Error::Api(kube::error::ErrorResponse {
            status: "Failure".to_string(),
            message: "the object has been modified".to_string(),
            reason: "Conflict".to_string(),
            code: 409,
        }));
        assert!(err.is_conflict());
        assert!(err.to_string().contains("kubernetes error"));

        let not_found = Error::from(kube::Error::Api(kube::error::ErrorResponse {
            status: "Failure".to_string(),
            message: "not found".to_string(),
            reason: "NotFound".to_string(),
            code: 404,
        }));
        assert!(!not_found.is_conflict());
    }
}
