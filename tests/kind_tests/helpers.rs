//! Shared fixtures for cluster tests

use std::collections::BTreeMap;
use std::time::Duration;

use k8s_openapi::api::autoscaling::v1::{
    CrossVersionObjectReference, HorizontalPodAutoscaler, HorizontalPodAutoscalerSpec,
};
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, DeleteParams, PostParams};
use kube::Client;

use hpa_floor_guard::config::{ANNOTATION_DOWNSCALE_COOLDOWN, ANNOTATION_LOWER_REPLICA_LIMIT};

/// Namespace all cluster tests run in
pub const TEST_NAMESPACE: &str = "hpa-floor-guard-test";

/// Connect to the cluster and make sure the test namespace exists
pub async fn ensure_test_namespace() -> Client {
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .ok();

    let client = Client::try_default()
        .await
        .expect("kubeconfig pointing at a test cluster");

    let namespaces: Api<Namespace> = Api::all(client.clone());
    let namespace = Namespace {
        metadata: ObjectMeta {
            name: Some(TEST_NAMESPACE.to_string()),
            ..Default::default()
        },
        ..Default::default()
    };
    match namespaces.create(&PostParams::default(), &namespace).await {
        Ok(_) => {}
        Err(kube::Error::Api(resp)) if resp.code == 409 => {}
        Err(e) => panic!("failed to create namespace: {e}"),
    }

    client
}

/// Managed HPA targeting a Deployment that need not exist
pub fn managed_hpa(name: &str, min: i32, lower_limit: i32, cooldown: &str) -> HorizontalPodAutoscaler {
    HorizontalPodAutoscaler {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(TEST_NAMESPACE.to_string()),
            annotations: Some(BTreeMap::from([
                (
                    ANNOTATION_LOWER_REPLICA_LIMIT.to_string(),
                    lower_limit.to_string(),
                ),
                (ANNOTATION_DOWNSCALE_COOLDOWN.to_string(), cooldown.to_string()),
            ])),
            ..Default::default()
        },
        spec: Some(HorizontalPodAutoscalerSpec {
            scale_target_ref: CrossVersionObjectReference {
                api_version: Some("apps/v1".to_string()),
                kind: "Deployment".to_string(),
                name: name.to_string(),
            },
            min_replicas: Some(min),
            max_replicas: 40,
            target_cpu_utilization_percentage: Some(80),
        }),
        status: None,
    }
}

/// Create `hpa`, replacing any leftover from an earlier run
pub async fn create_fresh(api: &Api<HorizontalPodAutoscaler>, hpa: &HorizontalPodAutoscaler) -> HorizontalPodAutoscaler {
    let name = hpa.metadata.name.clone().expect("fixture has a name");
    let _ = api.delete(&name, &DeleteParams::default()).await;

    for _ in 0..30 {
        if api.get_opt(&name).await.expect("get HPA").is_none() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    api.create(&PostParams::default(), hpa)
        .await
        .expect("create HPA")
}

/// Poll the floor until it equals `expected` or the timeout passes
pub async fn wait_for_floor(
    api: &Api<HorizontalPodAutoscaler>,
    name: &str,
    expected: i32,
    timeout: Duration,
) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        let hpa = api.get(name).await.expect("get HPA");
        if hpa.spec.and_then(|s| s.min_replicas) == Some(expected) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    false
}
