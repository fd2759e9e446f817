//! Test helpers for integration tests
//!
//! Provides utilities for managing the kind cluster and test resources.

use std::process::Command;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use k8s_openapi::api::core::v1::Namespace;
use kube::api::{Api, DeleteParams, PostParams};
use kube::runtime::controller::Action;
use kube::{Client, Config};
use tokio::sync::OnceCell;
use tokio::time::sleep;

use dynns::controller::{reconcile, Context, KubeClientImpl};
use dynns::crd::{DynamicNamespace, DynamicNamespaceSpec};
use dynns::install::{builtin_definition, deploy_definition};

/// Name of the kind cluster used for integration tests
pub const TEST_CLUSTER_NAME: &str = "dynns-integration-test";

/// Field manager the integration tests write with
pub const TEST_FIELD_MANAGER: &str = "dynns-integration-test";

/// Global lock to ensure cluster is created only once
static CLUSTER_INIT: OnceLock<Result<(), String>> = OnceLock::new();

/// Track if CRD has been installed (async-safe)
static CRD_INSTALLED: OnceCell<Result<(), String>> = OnceCell::const_new();

/// Check if a kind cluster with the given name exists
pub fn kind_cluster_exists(name: &str) -> bool {
    let output = Command::new("kind")
        .args(["get", "clusters"])
        .output()
        .expect("failed to run kind");

    let clusters = String::from_utf8_lossy(&output.stdout);
    clusters.lines().any(|line| line.trim() == name)
}

/// Create a kind cluster for testing
pub fn create_kind_cluster(name: &str) -> Result<(), String> {
    if kind_cluster_exists(name) {
        println!("Kind cluster '{name}' already exists, reusing it");
        return Ok(());
    }

    println!("Creating kind cluster '{name}'...");
    let output = Command::new("kind")
        .args(["create", "cluster", "--name", name, "--wait", "60s"])
        .output()
        .map_err(|e| format!("failed to run kind: {e}"))?;

    if !output.status.success() {
        return Err(format!(
            "failed to create kind cluster: {}",
            String::from_utf8_lossy(&output.stderr)
        ));
    }

    println!("Kind cluster '{name}' created successfully");
    Ok(())
}

/// Create a Kubernetes client connected to the test cluster
pub async fn create_test_client() -> Result<Client, String> {
    let context_name = format!("kind-{TEST_CLUSTER_NAME}");

    let config = Config::from_kubeconfig(&kube::config::KubeConfigOptions {
        context: Some(context_name),
        ..Default::default()
    })
    .await
    .map_err(|e| format!("failed to load kubeconfig: {e}"))?;

    Client::try_from(config).map_err(|e| format!("failed to create client: {e}"))
}

/// Ensure the test cluster is ready (thread-safe, cluster created once)
///
/// Returns a fresh Client for each call - clients should not be shared across test threads.
pub async fn ensure_test_cluster() -> Result<Client, String> {
    let cluster_result = CLUSTER_INIT.get_or_init(|| create_kind_cluster(TEST_CLUSTER_NAME));
    cluster_result.clone()?;

    let client = create_test_client().await?;

    let crd_result = CRD_INSTALLED
        .get_or_init(|| async {
            let client = create_test_client().await?;
            deploy_definition(client, &builtin_definition())
                .await
                .map_err(|e| format!("failed to install CRD: {e}"))?;
            // Give the API server time to establish the CRD
            sleep(Duration::from_secs(2)).await;
            Ok(())
        })
        .await;
    crd_result.clone()?;

    Ok(client)
}

/// Create a namespace to hold DynamicNamespace resources, ignoring conflicts
pub async fn ensure_namespace(client: &Client, name: &str) {
    let api: Api<Namespace> = Api::all(client.clone());
    let mut namespace = Namespace::default();
    namespace.metadata.name = Some(name.to_string());
    let _ = api.create(&PostParams::default(), &namespace).await;
}

/// A DynamicNamespace with the default quota
pub fn sample_dynamic_namespace(namespace: &str, name: &str) -> DynamicNamespace {
    let mut dn = DynamicNamespace::new(name, DynamicNamespaceSpec::default());
    dn.metadata.namespace = Some(namespace.to_string());
    dn
}

/// Controller context backed by the test cluster
///
/// Writes are recorded under [`TEST_FIELD_MANAGER`].
pub fn test_context(client: &Client) -> Arc<Context> {
    let kube = KubeClientImpl::new(client.clone(), TEST_FIELD_MANAGER);
    Arc::new(
        Context::builder(client.clone())
            .kube_client(Arc::new(kube))
            .build(),
    )
}

/// Run reconcile passes until one reports no follow-up work
///
/// The first pass only adds the finalizer, so at least two are needed
/// to converge a new resource.
pub async fn reconcile_passes(
    client: &Client,
    namespace: &str,
    name: &str,
    passes: usize,
) -> Result<Action, dynns::Error> {
    let ctx = test_context(client);
    let mut action = Action::await_change();
    for _ in 0..passes {
        action = reconcile(
            Arc::new(sample_dynamic_namespace(namespace, name)),
            ctx.clone(),
        )
        .await?;
    }
    Ok(action)
}

/// Best-effort removal of a DynamicNamespace and the namespace named after it
///
/// Finalizers are stripped first so the resource cannot get stuck when the
/// controller is not running.
pub async fn cleanup(client: &Client, namespace: &str, name: &str) {
    let api: Api<DynamicNamespace> = Api::namespaced(client.clone(), namespace);
    if let Ok(Some(mut dn)) = api.get_opt(name).await {
        dn.metadata.finalizers = None;
        let _ = api.replace(name, &PostParams::default(), &dn).await;
        let _ = api.delete(name, &DeleteParams::default()).await;
    }

    let namespaces: Api<Namespace> = Api::all(client.clone());
    let _ = namespaces.delete(name, &DeleteParams::default()).await;
    wait_for_namespace_gone(client, name, Duration::from_secs(60)).await;
}

/// Wait until a namespace no longer exists or the timeout elapses
pub async fn wait_for_namespace_gone(client: &Client, name: &str, timeout: Duration) -> bool {
    let api: Api<Namespace> = Api::all(client.clone());
    let start = std::time::Instant::now();

    while start.elapsed() < timeout {
        match api.get_opt(name).await {
            Ok(None) => return true,
            Ok(Some(_)) | Err(_) => sleep(Duration::from_secs(1)).await,
        }
    }
    false
}
