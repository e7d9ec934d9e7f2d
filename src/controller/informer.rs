//! HPA informer: watch, resync and dispatch
//!
//! Watches `autoscaling/v1` HorizontalPodAutoscalers, keeps a reflector cache
//! and turns watch events into [`Notification`]s. Every resync period the
//! whole cache is redelivered as updates so that HPAs held by a cooldown are
//! re-evaluated once it expires, even if nothing about them changes.
//!
//! Notifications for the same HPA are handled one at a time; different HPAs
//! are handled concurrently up to a limit.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, Stream, StreamExt};
use k8s_openapi::api::autoscaling::v1::HorizontalPodAutoscaler;
use kube::runtime::reflector::{self, Store};
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Client};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::wrappers::IntervalStream;
use tracing::{debug, info, warn};

use crate::controller::hpa::{Notification, Outcome, Reconciler};
use crate::controller::locks::KeyedLocks;

/// Watcher timeout (seconds) - must be less than client read_timeout (30s)
/// This forces the API server to close the watch before the client times out,
/// preventing "body read timed out" errors on idle watches.
const WATCH_TIMEOUT_SECS: u32 = 25;

/// Default resync period
pub const DEFAULT_RESYNC_PERIOD: Duration = Duration::from_secs(30);

/// Default number of HPAs reconciled in parallel
pub const DEFAULT_CONCURRENCY: usize = 16;

/// Informer settings
#[derive(Clone, Debug)]
pub struct InformerConfig {
    /// Namespace to watch; `None` watches all namespaces
    pub namespace: Option<String>,
    /// How often every cached HPA is redelivered
    pub resync_period: Duration,
    /// Maximum number of HPAs reconciled in parallel
    pub concurrency: usize,
}

impl Default for InformerConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            resync_period: DEFAULT_RESYNC_PERIOD,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// Watch HPAs and reconcile them until `shutdown` resolves.
pub async fn run(
    client: Client,
    reconciler: Arc<Reconciler>,
    config: InformerConfig,
    shutdown: impl Future<Output = ()>,
) {
    let api: Api<HorizontalPodAutoscaler> = match config.namespace.as_deref() {
        Some(ns) if !ns.is_empty() => Api::namespaced(client, ns),
        _ => Api::all(client),
    };

    info!(
        namespace = config.namespace.as_deref().unwrap_or("<all>"),
        resync_secs = config.resync_period.as_secs(),
        concurrency = config.concurrency,
        "Starting HorizontalPodAutoscaler informer"
    );

    let (reader, writer) = reflector::store::<HorizontalPodAutoscaler>();

    let watch = watcher(api, watcher::Config::default().timeout(WATCH_TIMEOUT_SECS))
        .default_backoff()
        .reflect(writer)
        .filter_map(|event| async move { watch_notification(event) });

    let notifications = stream::select(watch, resync(reader, config.resync_period))
        .take_until(shutdown);

    dispatch(notifications, reconciler, config.concurrency).await;
    info!("HorizontalPodAutoscaler informer stopped");
}

/// Map a watch event to a notification; list bookkeeping events map to nothing
pub fn notification_for(event: watcher::Event<HorizontalPodAutoscaler>) -> Option<Notification> {
    match event {
        watcher::Event::InitApply(hpa) => Some(Notification::Added(Arc::new(hpa))),
        watcher::Event::Apply(hpa) => Some(Notification::Updated(Arc::new(hpa))),
        watcher::Event::Delete(hpa) => Some(Notification::Deleted(Arc::new(hpa))),
        watcher::Event::Init | watcher::Event::InitDone => None,
    }
}

/// Map one item of the watch stream; errors are logged and skipped
pub fn watch_notification(
    event: Result<watcher::Event<HorizontalPodAutoscaler>, watcher::Error>,
) -> Option<Notification> {
    match event {
        Ok(event) => notification_for(event),
        // Includes payloads that fail to decode as an HPA
        Err(e) => {
            warn!(error = %e, "HPA watch error, backing off");
            None
        }
    }
}

/// Redeliver every cached HPA as an update once per `period`
fn resync(
    reader: Store<HorizontalPodAutoscaler>,
    period: Duration,
) -> impl Stream<Item = Notification> {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    IntervalStream::new(interval).flat_map(move |_| {
        let cached = reader.state();
        debug!(count = cached.len(), "Resyncing HorizontalPodAutoscalers");
        stream::iter(cached.into_iter().map(Notification::Updated))
    })
}

/// Handle notifications: serialized per HPA, concurrent across HPAs.
pub async fn dispatch<S>(notifications: S, reconciler: Arc<Reconciler>, concurrency: usize)
where
    S: Stream<Item = Notification>,
{
    let locks = Arc::new(KeyedLocks::new());

    notifications
        .for_each_concurrent(concurrency.max(1), |notification| {
            let reconciler = reconciler.clone();
            let locks = locks.clone();
            async move {
                process(&reconciler, &locks, notification).await;
            }
        })
        .await;
}

async fn process(reconciler: &Reconciler, locks: &KeyedLocks, notification: Notification) -> Outcome {
    let key = notification.key();
    let deleted = matches!(notification, Notification::Deleted(_));

    let outcome = {
        let _guard = locks.lock(&key).await;
        reconciler.handle(notification).await
    };

    if deleted {
        locks.forget(&key);
    }
    outcome
}
