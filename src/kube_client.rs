//! Kubernetes client construction

use std::path::Path;
use std::time::Duration;

use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tracing::info;

use crate::Error;

/// Default connection timeout for kube clients
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default read timeout for kube clients; watches are closed server-side before this
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Create a kube client from an optional kubeconfig path with default timeouts.
///
/// A missing or empty path falls back to in-cluster / inferred configuration.
pub async fn create_client(kubeconfig: Option<&Path>) -> Result<Client, Error> {
    create_client_with_timeout(kubeconfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT).await
}

/// Create a kube client from an optional kubeconfig path with custom timeouts
pub async fn create_client_with_timeout(
    kubeconfig: Option<&Path>,
    connect_timeout: Duration,
    read_timeout: Duration,
) -> Result<Client, Error> {
    let mut config = match kubeconfig.filter(|path| !path.as_os_str().is_empty()) {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                Error::config(format!(
                    "failed to read kubeconfig {}: {e}",
                    path.display()
                ))
            })?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| Error::config(format!("failed to load kubeconfig: {e}")))?
        }
        None => Config::infer()
            .await
            .map_err(|e| Error::config(format!("failed to infer config: {e}")))?,
    };

    config.connect_timeout = Some(connect_timeout);
    config.read_timeout = Some(read_timeout);
    Client::try_from(config).map_err(|e| Error::config(format!("failed to create client: {e}")))
}

/// Check that the API server answers before starting to watch
pub async fn verify_connectivity(client: &Client) -> Result<(), Error> {
    let version = client.apiserver_version().await?;
    info!(
        server_version = %version.git_version,
        platform = %version.platform,
        "Connected to Kubernetes API server"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Story: pointing at a kubeconfig that does not exist fails fast with a
    /// configuration error naming the file
    #[tokio::test]
    async fn story_missing_kubeconfig_is_config_error() {
        let path = Path::new("/nonexistent/hpa-floor-guard/kubeconfig");

        let Err(err) = create_client(Some(path)).await else {
            panic!("missing kubeconfig must fail");
        };

        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("/nonexistent/hpa-floor-guard/kubeconfig"));
    }

    #[tokio::test]
    async fn test_garbage_kubeconfig_is_config_error() {
        let path = std::env::temp_dir().join(format!(
            "hpa-floor-guard-kubeconfig-{}",
            std::process::id()
        ));
        std::fs::write(&path, "this: [is not a kubeconfig").unwrap();

        let result = create_client(Some(&path)).await;
        std::fs::remove_file(&path).ok();

        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_read_timeout_outlasts_watch_timeout() {
        assert!(DEFAULT_READ_TIMEOUT > Duration::from_secs(25));
        assert!(DEFAULT_CONNECT_TIMEOUT < DEFAULT_READ_TIMEOUT);
    }
}
