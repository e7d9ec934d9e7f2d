//! Persistence of floor changes back to the API server

use async_trait::async_trait;
use k8s_openapi::api::autoscaling::v1::HorizontalPodAutoscaler;
use kube::api::{Api, PostParams};
use kube::{Client, ResourceExt};
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::{Error, FIELD_MANAGER};

/// Trait abstracting writes of HorizontalPodAutoscaler objects
///
/// This trait allows mocking the Kubernetes client in tests while using
/// the real client in production.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait HpaStore: Send + Sync {
    /// Replace the HPA with the given object.
    ///
    /// The object's `resourceVersion` is sent along, so a write built from a
    /// stale snapshot is rejected with a conflict rather than clobbering a
    /// newer floor.
    async fn update(&self, hpa: &HorizontalPodAutoscaler) -> Result<(), Error>;
}

/// Real Kubernetes implementation
pub struct KubeHpaStore {
    client: Client,
}

impl KubeHpaStore {
    /// Create a new store wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HpaStore for KubeHpaStore {
    async fn update(&self, hpa: &HorizontalPodAutoscaler) -> Result<(), Error> {
        let name = hpa.name_any();
        let namespace = hpa
            .namespace()
            .ok_or_else(|| Error::invalid(format!("HorizontalPodAutoscaler {name} has no namespace")))?;

        let api: Api<HorizontalPodAutoscaler> = Api::namespaced(self.client.clone(), &namespace);
        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        api.replace(&name, &params, hpa).await?;

        debug!(hpa = %name, namespace = %namespace, "HorizontalPodAutoscaler updated");
        Ok(())
    }
}
