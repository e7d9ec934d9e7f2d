//! Integration tests for floor maintenance
//!
//! These tests tell the story of an HPA owner opting in via annotations and
//! watching the floor guard write `minReplicas` back through the API server.

use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::autoscaling::v1::{HorizontalPodAutoscaler, HorizontalPodAutoscalerStatus};
use kube::api::{Api, PostParams};

use hpa_floor_guard::clock::SystemClock;
use hpa_floor_guard::config::ANNOTATION_LAST_CHANGE;
use hpa_floor_guard::controller::{self, InformerConfig, KubeHpaStore, Outcome, Reconciler};

use super::helpers::{create_fresh, ensure_test_namespace, managed_hpa, wait_for_floor, TEST_NAMESPACE};

fn with_desired(mut hpa: HorizontalPodAutoscaler, desired: i32) -> HorizontalPodAutoscaler {
    hpa.status = Some(HorizontalPodAutoscalerStatus {
        current_replicas: desired,
        desired_replicas: desired,
        ..Default::default()
    });
    hpa
}

// =============================================================================
// Story: Floor written through the real API server
// =============================================================================

/// Story: the HPA wants 8 replicas, so the floor is raised to 7 and the
/// change is stamped on the object.
#[tokio::test]
#[ignore = "requires a Kubernetes cluster"]
async fn story_floor_is_persisted() {
    let client = ensure_test_namespace().await;
    let api: Api<HorizontalPodAutoscaler> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let created = create_fresh(&api, &managed_hpa("floor-persisted", 1, 3, "5m")).await;

    let reconciler = Reconciler::new(
        Arc::new(KubeHpaStore::new(client.clone())),
        Arc::new(SystemClock),
    );
    let outcome = reconciler
        .reconcile(&with_desired(created, 8))
        .await
        .expect("reconcile succeeds");
    assert_eq!(outcome, Outcome::Updated { min_replicas: 7 });

    let stored = api.get("floor-persisted").await.expect("get HPA");
    assert_eq!(stored.spec.as_ref().and_then(|s| s.min_replicas), Some(7));
    let stamped = stored
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(ANNOTATION_LAST_CHANGE))
        .expect("last-change annotation written");
    assert!(chrono::DateTime::parse_from_rfc3339(stamped).is_ok());
}

/// Story: someone edits the HPA between our read and our write; the stale
/// write is rejected instead of clobbering their change.
#[tokio::test]
#[ignore = "requires a Kubernetes cluster"]
async fn story_stale_snapshot_conflicts() {
    let client = ensure_test_namespace().await;
    let api: Api<HorizontalPodAutoscaler> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let stale = create_fresh(&api, &managed_hpa("floor-conflict", 1, 3, "5m")).await;

    let mut edited = stale.clone();
    if let Some(spec) = edited.spec.as_mut() {
        spec.max_replicas = 30;
    }
    api.replace("floor-conflict", &PostParams::default(), &edited)
        .await
        .expect("concurrent edit");

    let reconciler = Reconciler::new(
        Arc::new(KubeHpaStore::new(client.clone())),
        Arc::new(SystemClock),
    );
    let err = reconciler
        .reconcile(&with_desired(stale, 8))
        .await
        .expect_err("stale write must fail");
    assert!(err.is_conflict(), "expected conflict, got {err}");

    let stored = api.get("floor-conflict").await.expect("get HPA");
    assert_eq!(stored.spec.as_ref().map(|s| s.max_replicas), Some(30));
    assert_eq!(stored.spec.as_ref().and_then(|s| s.min_replicas), Some(1));
}

/// Story: the running informer notices an HPA whose floor is below the
/// configured lower limit and raises it without any further nudging.
#[tokio::test]
#[ignore = "requires a Kubernetes cluster"]
async fn story_informer_raises_floor_to_lower_limit() {
    let client = ensure_test_namespace().await;
    let api: Api<HorizontalPodAutoscaler> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    create_fresh(&api, &managed_hpa("floor-informer", 1, 3, "5m")).await;

    let reconciler = Arc::new(Reconciler::new(
        Arc::new(KubeHpaStore::new(client.clone())),
        Arc::new(SystemClock),
    ));
    let config = InformerConfig {
        namespace: Some(TEST_NAMESPACE.to_string()),
        resync_period: Duration::from_secs(2),
        concurrency: 4,
    };

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let shutdown = async {
        let _ = stop_rx.await;
    };

    let watch = async {
        let raised = wait_for_floor(&api, "floor-informer", 3, Duration::from_secs(30)).await;
        let _ = stop_tx.send(());
        raised
    };

    let ((), raised) = tokio::join!(controller::run(client.clone(), reconciler, config, shutdown), watch);
    assert!(raised, "floor was not raised to the lower limit");
}
