//! Read-only view over one HorizontalPodAutoscaler snapshot
//!
//! Flattens the optional fields of the API object into the handful of values
//! the policy needs, with safe defaults. Annotations are parsed once when the
//! view is built so a malformed value is reported once per reconciliation.

use std::time::Duration;

use chrono::{DateTime, Utc};
use k8s_openapi::api::autoscaling::v1::HorizontalPodAutoscaler;

use crate::config::PolicyConfig;

/// Policy-oriented view of an HPA
#[derive(Clone, Debug)]
pub struct HpaView<'a> {
    hpa: &'a HorizontalPodAutoscaler,
    config: PolicyConfig,
}

impl<'a> HpaView<'a> {
    /// Build a view, parsing the controller's annotations
    pub fn new(hpa: &'a HorizontalPodAutoscaler) -> Self {
        let config = hpa
            .metadata
            .annotations
            .as_ref()
            .map(PolicyConfig::from_annotations)
            .unwrap_or_default();
        Self { hpa, config }
    }

    /// The underlying snapshot
    pub fn hpa(&self) -> &'a HorizontalPodAutoscaler {
        self.hpa
    }

    /// Parsed annotation configuration
    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// `metadata.name`, empty when unset
    pub fn name(&self) -> &'a str {
        self.hpa.metadata.name.as_deref().unwrap_or_default()
    }

    /// `metadata.namespace`, empty when unset
    pub fn namespace(&self) -> &'a str {
        self.hpa.metadata.namespace.as_deref().unwrap_or_default()
    }

    /// Currently enforced floor (`spec.minReplicas`), 0 when unset
    pub fn min_replicas(&self) -> i32 {
        self.hpa
            .spec
            .as_ref()
            .and_then(|s| s.min_replicas)
            .unwrap_or(0)
    }

    /// `spec.maxReplicas`, 0 when the spec is missing
    pub fn max_replicas(&self) -> i32 {
        self.hpa.spec.as_ref().map(|s| s.max_replicas).unwrap_or(0)
    }

    /// `status.currentReplicas`, 0 before the HPA reported status
    pub fn current_replicas(&self) -> i32 {
        self.hpa
            .status
            .as_ref()
            .map(|s| s.current_replicas)
            .unwrap_or(0)
    }

    /// The autoscaler's current target (`status.desiredReplicas`)
    pub fn desired_replicas(&self) -> i32 {
        self.hpa
            .status
            .as_ref()
            .map(|s| s.desired_replicas)
            .unwrap_or(0)
    }

    /// Hard floor from the annotations; `None` disables the controller for this HPA
    pub fn lower_replica_limit(&self) -> Option<i32> {
        self.config.lower_replica_limit
    }

    /// Cooldown between downward adjustments, if configured
    pub fn downscale_cooldown(&self) -> Option<Duration> {
        self.config.downscale_cooldown
    }

    /// When this controller last changed the floor.
    ///
    /// The Unix epoch when never recorded, so a first reconciliation is never
    /// held back by a cooldown. `status.lastScaleTime` is not consulted.
    pub fn last_change(&self) -> DateTime<Utc> {
        self.config
            .last_change
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }
}
