//! HorizontalPodAutoscaler reconciler
//!
//! Turns a notification about an HPA into at most one write: build the view,
//! ask the policy, and if it wants a new floor, persist `spec.minReplicas`
//! together with the `last-change` bookkeeping annotation.
//!
//! Persistence failures are logged and dropped. Nothing is queued for retry:
//! the decision is recomputed from scratch on the next notification (the
//! informer resyncs periodically), so a failed write is retried naturally.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use k8s_openapi::api::autoscaling::v1::HorizontalPodAutoscaler;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::clock::Clock;
use crate::config::ANNOTATION_LAST_CHANGE;
use crate::controller::store::HpaStore;
use crate::policy::{self, FloorState};
use crate::view::HpaView;
use crate::Error;

/// Change notification for one HPA
#[derive(Clone, Debug)]
pub enum Notification {
    /// Object seen for the first time (initial list)
    Added(Arc<HorizontalPodAutoscaler>),
    /// Object changed, or redelivered by a resync
    Updated(Arc<HorizontalPodAutoscaler>),
    /// Object deleted
    Deleted(Arc<HorizontalPodAutoscaler>),
}

impl Notification {
    /// The object the notification is about
    pub fn object(&self) -> &HorizontalPodAutoscaler {
        match self {
            Self::Added(hpa) | Self::Updated(hpa) | Self::Deleted(hpa) => hpa,
        }
    }

    /// Short name of the notification kind for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Added(_) => "added",
            Self::Updated(_) => "updated",
            Self::Deleted(_) => "deleted",
        }
    }

    /// `namespace/name` key used to serialize work per object
    pub fn key(&self) -> String {
        object_key(self.object())
    }
}

/// `namespace/name` of an object; cluster-scoped objects have no prefix
pub fn object_key(hpa: &HorizontalPodAutoscaler) -> String {
    let name = hpa.metadata.name.as_deref().unwrap_or_default();
    match hpa.metadata.namespace.as_deref() {
        Some(ns) => format!("{ns}/{name}"),
        None => name.to_string(),
    }
}

/// What handling a notification ended up doing
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing to act on: deletes, or a snapshot without name or namespace
    Ignored,
    /// Policy decided not to write
    Unchanged(FloorState),
    /// New floor persisted
    Updated {
        /// The floor that was written
        min_replicas: i32,
    },
    /// Policy wanted a write but it failed; dropped until the next notification
    Failed,
}

/// Applies the floor policy to HPAs and persists its decisions
pub struct Reconciler {
    store: Arc<dyn HpaStore>,
    clock: Arc<dyn Clock>,
}

impl Reconciler {
    /// Create a reconciler writing through `store` and reading time from `clock`
    pub fn new(store: Arc<dyn HpaStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Entry point for every notification. Never fails; errors are logged.
    pub async fn handle(&self, notification: Notification) -> Outcome {
        let hpa = notification.object();
        let span = info_span!(
            "reconcile",
            hpa = %hpa.metadata.name.as_deref().unwrap_or_default(),
            namespace = %hpa.metadata.namespace.as_deref().unwrap_or_default(),
            event = notification.kind(),
        );

        async {
            match &notification {
                // State lives on the object itself, nothing to clean up
                Notification::Deleted(_) => {
                    debug!("HPA deleted, nothing to do");
                    Outcome::Ignored
                }
                Notification::Added(hpa) | Notification::Updated(hpa) => {
                    match self.reconcile(hpa).await {
                        Ok(outcome) => outcome,
                        Err(e @ Error::Invalid(_)) => {
                            warn!(error = %e, "skipping HPA snapshot without name or namespace");
                            Outcome::Ignored
                        }
                        Err(e) if e.is_conflict() => {
                            warn!(error = %e, "HPA changed while reconciling, waiting for next notification");
                            Outcome::Failed
                        }
                        Err(e) => {
                            error!(error = %e, "failed to update HPA");
                            Outcome::Failed
                        }
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Decide on one snapshot and persist the new floor if there is one.
    pub async fn reconcile(&self, hpa: &HorizontalPodAutoscaler) -> Result<Outcome, Error> {
        let view = HpaView::new(hpa);
        if view.name().is_empty() || view.namespace().is_empty() {
            return Err(Error::invalid(
                "HorizontalPodAutoscaler is missing name or namespace",
            ));
        }

        let now = self.clock.now();
        let decision = policy::decide(&view, now);
        let Some(min_replicas) = decision.target() else {
            return Ok(Outcome::Unchanged(decision.state()));
        };

        let updated = with_floor(hpa, min_replicas, now);
        self.store.update(&updated).await?;

        info!(
            min_replicas,
            state = %decision.state(),
            last_change = %format_last_change(now),
            "floor updated"
        );
        Ok(Outcome::Updated { min_replicas })
    }
}

/// Copy of `hpa` with the new floor and the `last-change` annotation stamped to `now`
pub fn with_floor(
    hpa: &HorizontalPodAutoscaler,
    min_replicas: i32,
    now: DateTime<Utc>,
) -> HorizontalPodAutoscaler {
    let mut updated = hpa.clone();
    updated.spec.get_or_insert_with(Default::default).min_replicas = Some(min_replicas);
    updated
        .metadata
        .annotations
        .get_or_insert_with(BTreeMap::new)
        .insert(ANNOTATION_LAST_CHANGE.to_string(), format_last_change(now));
    updated
}

/// RFC 3339 with second precision, the format `last-change` is stored in
pub fn format_last_change(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Secs, true)
}
