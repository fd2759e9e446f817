//! dynns operator - namespaces as a resource

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use futures::StreamExt;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client};

use dynns::config::{OperatorConfig, DEFAULT_ERROR_REQUEUE, DEFAULT_MAX_ERROR_REQUEUE};
use dynns::controller::{error_policy, reconcile, Context};
use dynns::crd::DynamicNamespace;
use dynns::install::{builtin_definition, deploy_definition, load_definition_file, Deployment};
use dynns::telemetry::{init_telemetry, LogFormat, TelemetryConfig};
use dynns::DEFAULT_FIELD_MANAGER;

/// dynns - creates namespaces, quotas and admin bindings from DynamicNamespace resources
#[derive(Parser, Debug)]
#[command(name = "dynns", version, about, long_about = None)]
struct Cli {
    /// Print the CRD manifest and exit
    #[arg(long)]
    crd: bool,

    /// Register the CRD from this manifest instead of the built-in definition
    #[arg(long, env = "DYNNS_CRD_FILE")]
    crd_file: Option<PathBuf>,

    /// Do not install or update the CRD at startup
    #[arg(long, env = "DYNNS_SKIP_CRD_INSTALL")]
    skip_crd_install: bool,

    /// Field manager recorded on API writes
    #[arg(long, env = "DYNNS_FIELD_MANAGER", default_value = DEFAULT_FIELD_MANAGER)]
    field_manager: String,

    /// Seconds to wait before retrying a failed reconciliation
    #[arg(long, env = "DYNNS_ERROR_REQUEUE_SECS", default_value_t = DEFAULT_ERROR_REQUEUE.as_secs())]
    error_requeue_secs: u64,

    /// Upper bound in seconds for the retry delay, which doubles on each consecutive failure
    #[arg(long, env = "DYNNS_MAX_ERROR_REQUEUE_SECS", default_value_t = DEFAULT_MAX_ERROR_REQUEUE.as_secs())]
    max_error_requeue_secs: u64,

    /// Log output format (text or json)
    #[arg(long, env = "DYNNS_LOG_FORMAT", default_value = "text")]
    log_format: LogFormat,

    /// Only watch DynamicNamespace resources in this namespace
    #[arg(long, env = "DYNNS_WATCH_NAMESPACE")]
    watch_namespace: Option<String>,
}

impl Cli {
    fn operator_config(&self) -> OperatorConfig {
        OperatorConfig {
            install_crd: !self.skip_crd_install,
            crd_manifest: self.crd_file.clone(),
            log_format: self.log_format,
            ..OperatorConfig::default()
        }
        .field_manager(self.field_manager.clone())
        .error_requeue(Duration::from_secs(self.error_requeue_secs))
        .max_error_requeue(Duration::from_secs(self.max_error_requeue_secs))
        .watch_namespace(self.watch_namespace.clone())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.crd {
        let crd = serde_yaml::to_string(&builtin_definition())
            .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
        println!("{crd}");
        return Ok(());
    }

    let config = cli.operator_config();

    init_telemetry(TelemetryConfig {
        format: config.log_format,
        ..TelemetryConfig::default()
    })?;

    run_controller(config).await
}

async fn run_controller(config: OperatorConfig) -> anyhow::Result<()> {
    tracing::info!(
        field_manager = %config.field_manager,
        watch_namespace = config.watch_namespace.as_deref().unwrap_or("*"),
        "dynns controller starting..."
    );

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    // The controller cannot watch a kind the API server does not serve
    if config.install_crd {
        ensure_crd_installed(&client, &config).await?;
    } else {
        tracing::info!("CRD installation skipped");
    }

    let dynamic_namespaces: Api<DynamicNamespace> = match config.watch_namespace.as_deref() {
        Some(namespace) => Api::namespaced(client.clone(), namespace),
        None => Api::all(client.clone()),
    };

    let ctx = Arc::new(Context::builder(client).config(config).build());

    tracing::info!("Starting DynamicNamespace controller...");

    Controller::new(dynamic_namespaces, WatcherConfig::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((object, action)) => {
                    tracing::debug!(dynamic_namespace = %object, ?action, "reconciliation completed");
                }
                Err(e) => {
                    tracing::error!(error = ?e, "reconciliation error");
                }
            }
        })
        .await;

    tracing::info!("dynns controller shut down");
    Ok(())
}

/// Register the DynamicNamespace CRD, aborting startup on failure
async fn ensure_crd_installed(client: &Client, config: &OperatorConfig) -> anyhow::Result<()> {
    let crd = match &config.crd_manifest {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading CRD manifest");
            load_definition_file(path)?
        }
        None => builtin_definition(),
    };

    match deploy_definition(client.clone(), &crd).await? {
        Deployment::Created => tracing::info!("DynamicNamespace CRD installed"),
        Deployment::Updated => tracing::info!("DynamicNamespace CRD up to date"),
    }
    Ok(())
}
