//! Controller for HorizontalPodAutoscaler floors
//!
//! The informer watches HPAs and feeds notifications to the reconciler, which
//! applies the floor policy and writes decisions back through the store.

mod hpa;
mod informer;
mod locks;
mod store;

pub use hpa::{format_last_change, object_key, with_floor, Notification, Outcome, Reconciler};
pub use informer::{
    dispatch, notification_for, run, watch_notification, InformerConfig, DEFAULT_CONCURRENCY,
    DEFAULT_RESYNC_PERIOD,
};
pub use locks::KeyedLocks;
pub use store::{HpaStore, KubeHpaStore};
