//! Floor decision procedure
//!
//! Given an HPA view and the current time, decide whether `spec.minReplicas`
//! should move:
//!
//! ```text
//! candidate = max(desiredReplicas - 1, lowerReplicaLimit)
//!
//! no lower limit           -> Disabled
//! candidate == floor       -> NoOp
//! candidate >  floor       -> ScaleUp    (immediately)
//! candidate <  floor       -> HoldDown   while now < lastChange + cooldown
//!                          -> ScaleDown  afterwards
//! ```
//!
//! Tracking one replica below desired means a sudden drop in demand only
//! lowers the floor by a single step per cooldown, while the HPA is still
//! free to scale the workload up without waiting.
//!
//! The function is pure apart from logging; no state is kept between calls.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info};

use crate::view::HpaView;

/// The five states an HPA can be in, recomputed on every reconciliation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FloorState {
    /// No lower replica limit annotation; the HPA is not managed
    Disabled,
    /// Floor already matches the candidate
    NoOp,
    /// Floor raised immediately
    ScaleUp,
    /// Floor would drop but the cooldown has not elapsed
    HoldDown,
    /// Floor lowered after the cooldown
    ScaleDown,
}

impl fmt::Display for FloorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disabled => "Disabled",
            Self::NoOp => "NoOp",
            Self::ScaleUp => "ScaleUp",
            Self::HoldDown => "HoldDown",
            Self::ScaleDown => "ScaleDown",
        };
        f.write_str(s)
    }
}

/// Outcome of one policy evaluation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    /// HPA is not managed
    Disabled,
    /// Nothing to do
    NoOp {
        /// Current floor
        min_replicas: i32,
    },
    /// Raise the floor now
    ScaleUp {
        /// Current floor
        from: i32,
        /// New floor
        to: i32,
    },
    /// Lowering is warranted but the cooldown is still running
    HoldDown {
        /// Current floor
        from: i32,
        /// Floor we will move to once the cooldown expires
        candidate: i32,
        /// Time left until the cooldown expires
        remaining: Duration,
    },
    /// Lower the floor now
    ScaleDown {
        /// Current floor
        from: i32,
        /// New floor
        to: i32,
    },
}

impl Decision {
    /// New floor to write, if any
    pub fn target(&self) -> Option<i32> {
        match self {
            Self::ScaleUp { to, .. } | Self::ScaleDown { to, .. } => Some(*to),
            Self::Disabled | Self::NoOp { .. } | Self::HoldDown { .. } => None,
        }
    }

    /// State name for logging and metrics labels
    pub fn state(&self) -> FloorState {
        match self {
            Self::Disabled => FloorState::Disabled,
            Self::NoOp { .. } => FloorState::NoOp,
            Self::ScaleUp { .. } => FloorState::ScaleUp,
            Self::HoldDown { .. } => FloorState::HoldDown,
            Self::ScaleDown { .. } => FloorState::ScaleDown,
        }
    }
}

/// Floor the policy converges to: one below desired, never below the limit
pub fn candidate_floor(desired_replicas: i32, lower_limit: i32) -> i32 {
    desired_replicas.saturating_sub(1).max(lower_limit)
}

/// Decide what to do with the HPA's floor at time `now`, logging the result.
pub fn decide(view: &HpaView<'_>, now: DateTime<Utc>) -> Decision {
    let decision = evaluate(view, now);
    log_decision(view, &decision);
    decision
}

fn evaluate(view: &HpaView<'_>, now: DateTime<Utc>) -> Decision {
    let Some(lower_limit) = view.lower_replica_limit() else {
        return Decision::Disabled;
    };

    let current = view.min_replicas();
    let candidate = candidate_floor(view.desired_replicas(), lower_limit);

    if candidate == current {
        return Decision::NoOp {
            min_replicas: current,
        };
    }

    if candidate > current {
        return Decision::ScaleUp {
            from: current,
            to: candidate,
        };
    }

    // Absent cooldown counts as already elapsed
    let cooldown = view.downscale_cooldown().unwrap_or(Duration::ZERO);
    match remaining_cooldown(view.last_change(), cooldown, now) {
        Some(remaining) => Decision::HoldDown {
            from: current,
            candidate,
            remaining,
        },
        None => Decision::ScaleDown {
            from: current,
            to: candidate,
        },
    }
}

/// Time left until `last_change + cooldown`, or `None` once it has passed.
///
/// A deadline beyond the representable range never expires.
fn remaining_cooldown(
    last_change: DateTime<Utc>,
    cooldown: Duration,
    now: DateTime<Utc>,
) -> Option<Duration> {
    let deadline = TimeDelta::from_std(cooldown)
        .ok()
        .and_then(|cooldown| last_change.checked_add_signed(cooldown));

    match deadline {
        Some(deadline) if now >= deadline => None,
        Some(deadline) => Some((deadline - now).to_std().unwrap_or(Duration::ZERO)),
        None => Some(Duration::MAX),
    }
}

fn log_decision(view: &HpaView<'_>, decision: &Decision) {
    let hpa = view.name();
    let namespace = view.namespace();
    let state = decision.state();
    let lower_limit = view.lower_replica_limit();
    let desired = view.desired_replicas();

    match decision {
        Decision::Disabled => debug!(
            hpa = %hpa,
            namespace = %namespace,
            %state,
            "no lower replica limit annotation, not managing HPA"
        ),
        Decision::NoOp { min_replicas } => debug!(
            hpa = %hpa,
            namespace = %namespace,
            %state,
            min_replicas,
            desired_replicas = desired,
            lower_limit = ?lower_limit,
            "floor already at target"
        ),
        Decision::ScaleUp { from, to } => info!(
            hpa = %hpa,
            namespace = %namespace,
            %state,
            from,
            to,
            desired_replicas = desired,
            lower_limit = ?lower_limit,
            "raising floor"
        ),
        Decision::HoldDown {
            from,
            candidate,
            remaining,
        } => info!(
            hpa = %hpa,
            namespace = %namespace,
            %state,
            from,
            candidate,
            desired_replicas = desired,
            remaining_secs = remaining.as_secs(),
            last_change = %view.last_change().to_rfc3339(),
            cooldown = ?view.downscale_cooldown(),
            "holding floor until cooldown expires"
        ),
        Decision::ScaleDown { from, to } => info!(
            hpa = %hpa,
            namespace = %namespace,
            %state,
            from,
            to,
            desired_replicas = desired,
            last_change = %view.last_change().to_rfc3339(),
            cooldown = ?view.downscale_cooldown(),
            cooldown_defaulted = view.downscale_cooldown().is_none(),
            "lowering floor"
        ),
    }
}
