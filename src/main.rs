//! hpa-floor-guard - keeps HorizontalPodAutoscalers from collapsing their floor

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;

use hpa_floor_guard::clock::SystemClock;
use hpa_floor_guard::controller::{
    self, InformerConfig, KubeHpaStore, Reconciler, DEFAULT_CONCURRENCY,
};
use hpa_floor_guard::kube_client::{create_client, verify_connectivity};
use hpa_floor_guard::telemetry::{init_telemetry, LogFormat, TelemetryConfig};
use hpa_floor_guard::{BUILD_COMMIT, BUILD_VERSION, FIELD_MANAGER};

/// Keeps HorizontalPodAutoscalers from dropping most of their replicas all of a sudden
#[derive(Parser, Debug)]
#[command(name = "hpa-floor-guard", version, about, long_about = None)]
struct Cli {
    /// Path to a kubeconfig file; in-cluster or inferred configuration when empty
    #[arg(long, env = "KUBECONFIG_PATH", global = true)]
    kubeconfig: Option<PathBuf>,

    /// Namespace to watch; all namespaces when empty
    #[arg(short = 'n', long, env = "WATCH_NAMESPACE", global = true)]
    namespace: Option<String>,

    /// OTLP/gRPC endpoint to export traces to (e.g. http://otel-collector:4317)
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT", global = true)]
    otlp_endpoint: Option<String>,

    /// Log line format
    #[arg(long, value_enum, default_value_t = LogFormat::Json, global = true)]
    log_format: LogFormat,

    /// Seconds between redeliveries of every cached HPA
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..), global = true)]
    resync_secs: u64,

    /// Maximum number of HPAs reconciled in parallel
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY, global = true)]
    concurrency: usize,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Watch HPAs and maintain their floors (default mode)
    Run,

    /// Print version and git commit
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::Version) = cli.command {
        println!("{FIELD_MANAGER} {BUILD_VERSION} ({BUILD_COMMIT})");
        return Ok(());
    }

    // Install crypto provider - aws-lc-rs
    // This MUST succeed before any TLS connection to the API server is made.
    if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
        anyhow::bail!("failed to install aws-lc-rs crypto provider: {e:?}");
    }

    let _telemetry = init_telemetry(TelemetryConfig {
        service_name: FIELD_MANAGER.to_string(),
        otlp_endpoint: cli.otlp_endpoint.clone(),
        log_format: cli.log_format,
    })?;

    run_controller(cli).await
}

async fn run_controller(cli: Cli) -> anyhow::Result<()> {
    info!(
        version = BUILD_VERSION,
        commit = BUILD_COMMIT,
        "Starting hpa-floor-guard"
    );

    let client = create_client(cli.kubeconfig.as_deref()).await?;
    verify_connectivity(&client).await?;

    let reconciler = Arc::new(Reconciler::new(
        Arc::new(KubeHpaStore::new(client.clone())),
        Arc::new(SystemClock),
    ));

    let config = InformerConfig {
        namespace: cli.namespace.filter(|ns| !ns.is_empty()),
        resync_period: Duration::from_secs(cli.resync_secs),
        concurrency: cli.concurrency,
    };

    controller::run(client, reconciler, config, shutdown_signal()).await;

    info!("Stopping hpa-floor-guard");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
