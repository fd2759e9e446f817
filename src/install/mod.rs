//! CRD registration
//!
//! The operator registers its own CustomResourceDefinition at startup before
//! the controller starts watching. Registration is create-or-update:
//!
//! 1. Look up the CRD by name
//! 2. Absent: create it
//! 3. Present: replace it, carrying over the live `resourceVersion`
//!
//! The definition comes either from the `DynamicNamespace` derive or from a
//! YAML manifest supplied on the command line.

use std::path::Path;

use async_trait::async_trait;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, PostParams};
use kube::{Client, CustomResourceExt};
use tracing::{debug, info};

#[cfg(test)]
use mockall::automock;

use crate::crd::DynamicNamespace;
use crate::Error;

/// Trait abstracting CRD storage on the API server
///
/// Lets registration be tested without a cluster.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CrdStore: Send + Sync {
    /// Get a CRD by name, `None` if it does not exist
    async fn get(&self, name: &str) -> Result<Option<CustomResourceDefinition>, Error>;

    /// Create a new CRD
    async fn create(&self, crd: &CustomResourceDefinition) -> Result<(), Error>;

    /// Replace an existing CRD
    ///
    /// `crd.metadata.resource_version` must match the live object.
    async fn replace(&self, crd: &CustomResourceDefinition) -> Result<(), Error>;
}

/// CrdStore backed by the Kubernetes API
pub struct KubeCrdStore {
    api: Api<CustomResourceDefinition>,
}

impl KubeCrdStore {
    /// Create a store using the given client
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }
}

#[async_trait]
impl CrdStore for KubeCrdStore {
    async fn get(&self, name: &str) -> Result<Option<CustomResourceDefinition>, Error> {
        Ok(self.api.get_opt(name).await?)
    }

    async fn create(&self, crd: &CustomResourceDefinition) -> Result<(), Error> {
        self.api.create(&PostParams::default(), crd).await?;
        Ok(())
    }

    async fn replace(&self, crd: &CustomResourceDefinition) -> Result<(), Error> {
        let name = definition_name(crd)?;
        self.api.replace(name, &PostParams::default(), crd).await?;
        Ok(())
    }
}

/// Outcome of a registration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Deployment {
    /// The CRD did not exist and was created
    Created,
    /// The CRD existed and was replaced
    Updated,
}

/// The CRD derived from the `DynamicNamespace` type
pub fn builtin_definition() -> CustomResourceDefinition {
    DynamicNamespace::crd()
}

/// Parse a CRD from a YAML manifest
pub fn load_definition(manifest: &[u8]) -> Result<CustomResourceDefinition, Error> {
    let crd: CustomResourceDefinition = serde_yaml::from_slice(manifest)?;
    definition_name(&crd)?;
    Ok(crd)
}

/// Read and parse a CRD manifest file
pub fn load_definition_file(path: &Path) -> Result<CustomResourceDefinition, Error> {
    let manifest = std::fs::read(path)
        .map_err(|e| Error::install(format!("failed to read {}: {}", path.display(), e)))?;
    load_definition(&manifest)
}

/// Register a CRD with the cluster
pub async fn deploy_definition(
    client: Client,
    crd: &CustomResourceDefinition,
) -> Result<Deployment, Error> {
    deploy_definition_with(&KubeCrdStore::new(client), crd).await
}

/// Register a CRD through the given store
///
/// Creates the CRD when absent. Otherwise replaces it with the live
/// `resourceVersion` so the write passes optimistic concurrency.
pub async fn deploy_definition_with<S: CrdStore + ?Sized>(
    store: &S,
    crd: &CustomResourceDefinition,
) -> Result<Deployment, Error> {
    let name = definition_name(crd)?;

    match store.get(name).await? {
        None => {
            info!(crd = %name, "creating CRD");
            store.create(crd).await?;
            Ok(Deployment::Created)
        }
        Some(live) => {
            debug!(
                crd = %name,
                resource_version = ?live.metadata.resource_version,
                "CRD exists, replacing"
            );
            let mut desired = crd.clone();
            desired.metadata.resource_version = live.metadata.resource_version;
            store.replace(&desired).await?;
            info!(crd = %name, "CRD updated");
            Ok(Deployment::Updated)
        }
    }
}

fn definition_name(crd: &CustomResourceDefinition) -> Result<&str, Error> {
    crd.metadata
        .name
        .as_deref()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| Error::install("CRD manifest has no metadata.name"))
}
