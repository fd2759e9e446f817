//! DynamicNamespace controller implementation
//!
//! Each pass is a pure function of the live resource and the live cluster
//! objects. Nothing is cached between passes:
//!
//! 1. Re-fetch the resource; gone means nothing to do
//! 2. Deleting: run finalization, then release the finalizer
//! 3. No finalizer yet: add it and wait for the resulting watch event
//! 4. Refuse to adopt a namespace created by someone else
//! 5. Create the Namespace, ResourceQuota and RoleBinding when absent
//! 6. Report the outcome on the status subresource, only when it changed

use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, ResourceQuota};
use k8s_openapi::api::rbac::v1::RoleBinding;
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::runtime::controller::Action;
use kube::{Client, ResourceExt};
use tracing::{debug, error, info, instrument, warn};

#[cfg(test)]
use mockall::automock;

use super::backoff::ErrorBackoff;
use crate::config::OperatorConfig;
use crate::crd::{DynamicNamespace, DynamicNamespaceStatus, ResourceKey};
use crate::resources::{
    generate_namespace, generate_resource_quota, generate_role_binding, is_owned_by,
    resource_quota_name, role_binding_name,
};
use crate::{Error, FINALIZER};

/// Trait abstracting Kubernetes client operations for DynamicNamespace
///
/// This trait allows mocking the Kubernetes client in tests while using
/// the real client in production. Lookups return `Ok(None)` when the object
/// does not exist.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KubeClient: Send + Sync {
    /// Get a DynamicNamespace by key
    async fn get_dynamic_namespace(
        &self,
        key: &ResourceKey,
    ) -> Result<Option<DynamicNamespace>, Error>;

    /// Replace a DynamicNamespace
    ///
    /// Fails with a 409 when `metadata.resourceVersion` is stale.
    async fn replace_dynamic_namespace(
        &self,
        dn: &DynamicNamespace,
    ) -> Result<DynamicNamespace, Error>;

    /// Patch the status of a DynamicNamespace
    async fn patch_status(
        &self,
        key: &ResourceKey,
        status: &DynamicNamespaceStatus,
    ) -> Result<(), Error>;

    /// Get a Namespace by name
    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, Error>;

    /// Create a Namespace
    async fn create_namespace(&self, namespace: &Namespace) -> Result<(), Error>;

    /// Delete a Namespace; succeeds if it is already gone
    async fn delete_namespace(&self, name: &str) -> Result<(), Error>;

    /// Get a ResourceQuota by namespace and name
    async fn get_resource_quota(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ResourceQuota>, Error>;

    /// Create a ResourceQuota in its `metadata.namespace`
    async fn create_resource_quota(&self, quota: &ResourceQuota) -> Result<(), Error>;

    /// Get a RoleBinding by namespace and name
    async fn get_role_binding(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<RoleBinding>, Error>;

    /// Create a RoleBinding in its `metadata.namespace`
    async fn create_role_binding(&self, binding: &RoleBinding) -> Result<(), Error>;
}

/// Real Kubernetes client implementation
pub struct KubeClientImpl {
    client: Client,
    field_manager: String,
}

impl KubeClientImpl {
    /// Create a new KubeClientImpl wrapping the given kube Client
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }

    fn post_params(&self) -> PostParams {
        PostParams {
            field_manager: Some(self.field_manager.clone()),
            ..Default::default()
        }
    }
}

/// Namespace a namespaced object is written to
fn target_namespace<'a>(kind: &str, meta_namespace: &'a Option<String>) -> Result<&'a str, Error> {
    meta_namespace
        .as_deref()
        .ok_or_else(|| Error::validation(format!("{kind} has no metadata.namespace")))
}

#[async_trait]
impl KubeClient for KubeClientImpl {
    async fn get_dynamic_namespace(
        &self,
        key: &ResourceKey,
    ) -> Result<Option<DynamicNamespace>, Error> {
        let api: Api<DynamicNamespace> = Api::namespaced(self.client.clone(), &key.namespace);
        Ok(api.get_opt(&key.name).await?)
    }

    async fn replace_dynamic_namespace(
        &self,
        dn: &DynamicNamespace,
    ) -> Result<DynamicNamespace, Error> {
        let key = dn.key()?;
        let api: Api<DynamicNamespace> = Api::namespaced(self.client.clone(), &key.namespace);
        Ok(api.replace(&key.name, &self.post_params(), dn).await?)
    }

    async fn patch_status(
        &self,
        key: &ResourceKey,
        status: &DynamicNamespaceStatus,
    ) -> Result<(), Error> {
        let api: Api<DynamicNamespace> = Api::namespaced(self.client.clone(), &key.namespace);

        let status_patch = serde_json::json!({
            "status": status
        });

        api.patch_status(
            &key.name,
            &PatchParams::apply(&self.field_manager),
            &Patch::Merge(&status_patch),
        )
        .await?;

        Ok(())
    }

    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, Error> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        Ok(api.get_opt(name).await?)
    }

    async fn create_namespace(&self, namespace: &Namespace) -> Result<(), Error> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        api.create(&self.post_params(), namespace).await?;
        Ok(())
    }

    async fn delete_namespace(&self, name: &str) -> Result<(), Error> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(ae)) if ae.code == 404 => {
                debug!(namespace = %name, "namespace already gone");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_resource_quota(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ResourceQuota>, Error> {
        let api: Api<ResourceQuota> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn create_resource_quota(&self, quota: &ResourceQuota) -> Result<(), Error> {
        let namespace = target_namespace("ResourceQuota", &quota.metadata.namespace)?;
        let api: Api<ResourceQuota> = Api::namespaced(self.client.clone(), namespace);
        api.create(&self.post_params(), quota).await?;
        Ok(())
    }

    async fn get_role_binding(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<RoleBinding>, Error> {
        let api: Api<RoleBinding> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn create_role_binding(&self, binding: &RoleBinding) -> Result<(), Error> {
        let namespace = target_namespace("RoleBinding", &binding.metadata.namespace)?;
        let api: Api<RoleBinding> = Api::namespaced(self.client.clone(), namespace);
        api.create(&self.post_params(), binding).await?;
        Ok(())
    }
}

/// Controller context shared across reconciliation passes
///
/// Immutable once built. Use [`Context::builder`] to construct one.
pub struct Context {
    /// Kubernetes client for API operations (trait object for testability)
    pub kube: Arc<dyn KubeClient>,
    /// Operator settings
    pub config: OperatorConfig,
    /// Requeue delays of failing resources
    pub backoff: ErrorBackoff,
}

impl Context {
    /// Create a builder for constructing a Context
    pub fn builder(client: Client) -> ContextBuilder {
        ContextBuilder::new(client)
    }

    /// Create a context for testing with a mock client and default settings
    #[cfg(test)]
    pub fn for_testing(kube: Arc<dyn KubeClient>) -> Self {
        Self::for_testing_with_config(kube, OperatorConfig::default())
    }

    /// Create a context for testing with a mock client and custom settings
    #[cfg(test)]
    pub fn for_testing_with_config(kube: Arc<dyn KubeClient>, config: OperatorConfig) -> Self {
        Self {
            kube,
            backoff: backoff_for(&config),
            config,
        }
    }
}

fn backoff_for(config: &OperatorConfig) -> ErrorBackoff {
    ErrorBackoff::new(config.error_requeue, config.max_error_requeue)
}

/// Builder for constructing [`Context`] instances
///
/// ```ignore
/// let ctx = Context::builder(client)
///     .config(OperatorConfig::default().field_manager("my-controller"))
///     .build();
/// ```
pub struct ContextBuilder {
    client: Client,
    kube: Option<Arc<dyn KubeClient>>,
    config: OperatorConfig,
}

impl ContextBuilder {
    fn new(client: Client) -> Self {
        Self {
            client,
            kube: None,
            config: OperatorConfig::default(),
        }
    }

    /// Set the operator configuration
    pub fn config(mut self, config: OperatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the Kubernetes client (primarily for testing)
    pub fn kube_client(mut self, kube: Arc<dyn KubeClient>) -> Self {
        self.kube = Some(kube);
        self
    }

    /// Build the Context
    pub fn build(self) -> Context {
        let kube = match self.kube {
            Some(kube) => kube,
            None => Arc::new(KubeClientImpl::new(
                self.client,
                self.config.field_manager.clone(),
            )),
        };
        Context {
            kube,
            backoff: backoff_for(&self.config),
            config: self.config,
        }
    }
}

/// Reconcile a DynamicNamespace resource
///
/// The object handed in by the watcher is only used for its key; the live
/// object is re-read so decisions never act on a stale copy.
///
/// Failures are written to the status as `ERROR` and returned so the
/// controller requeues. While the resource is being deleted, a NotFound
/// means it is already gone and counts as success. A successful pass clears
/// the resource's error backoff.
#[instrument(
    skip(dn, ctx),
    fields(dynamic_namespace = %dn.name_any(), namespace = %dn.namespace().unwrap_or_default())
)]
pub async fn reconcile(dn: Arc<DynamicNamespace>, ctx: Arc<Context>) -> Result<Action, Error> {
    let key = dn.key()?;
    debug!("reconciling dynamic namespace");

    let action = reconcile_pass(&key, &ctx).await?;
    ctx.backoff.reset(&key);
    Ok(action)
}

async fn reconcile_pass(key: &ResourceKey, ctx: &Context) -> Result<Action, Error> {
    let Some(current) = ctx.kube.get_dynamic_namespace(key).await? else {
        debug!("dynamic namespace no longer exists");
        return Ok(Action::await_change());
    };

    if current.is_being_deleted() {
        return match finalize(&current, ctx).await {
            Ok(()) => Ok(Action::await_change()),
            Err(e) if e.is_not_found() => {
                debug!(error = %e, "dynamic namespace went away during finalization");
                Ok(Action::await_change())
            }
            Err(e) => {
                update_status(&current, key, ctx, DynamicNamespaceStatus::error(e.to_string()))
                    .await;
                Err(e)
            }
        };
    }

    match apply(&current, key, ctx).await {
        Ok(()) => Ok(Action::await_change()),
        Err(e) => {
            update_status(&current, key, ctx, DynamicNamespaceStatus::error(e.to_string())).await;
            Err(e)
        }
    }
}

/// Converge a live, non-deleting DynamicNamespace
async fn apply(dn: &DynamicNamespace, key: &ResourceKey, ctx: &Context) -> Result<(), Error> {
    if !dn.has_finalizer(FINALIZER) {
        // The replace triggers a new watch event, which continues from here
        info!("adding finalizer");
        let mut updated = dn.clone();
        updated.finalizers_mut().push(FINALIZER.to_string());
        ctx.kube.replace_dynamic_namespace(&updated).await?;
        return Ok(());
    }

    let live = ctx.kube.get_namespace(&key.name).await?;
    validate(key, live.as_ref())?;

    if live.is_none() {
        info!(target_namespace = %key.name, "creating namespace");
        ctx.kube.create_namespace(&generate_namespace(key)).await?;
    }
    ensure_resource_quota(dn, key, ctx).await?;
    ensure_role_binding(dn, key, ctx).await?;

    update_status(dn, key, ctx, DynamicNamespaceStatus::active()).await;
    Ok(())
}

/// Reject a live namespace that this resource did not create
fn validate(key: &ResourceKey, live: Option<&Namespace>) -> Result<(), Error> {
    match live {
        Some(namespace) if !is_owned_by(namespace, key) => {
            warn!(target_namespace = %key.name, "namespace exists without provenance label");
            Err(Error::namespace_conflict(&key.name))
        }
        _ => Ok(()),
    }
}

async fn ensure_resource_quota(
    dn: &DynamicNamespace,
    key: &ResourceKey,
    ctx: &Context,
) -> Result<(), Error> {
    let name = resource_quota_name(key);
    if ctx.kube.get_resource_quota(&key.name, &name).await?.is_some() {
        debug!(resource_quota = %name, "resource quota exists");
        return Ok(());
    }

    info!(resource_quota = %name, "creating resource quota");
    ctx.kube
        .create_resource_quota(&generate_resource_quota(key, &dn.spec))
        .await
}

async fn ensure_role_binding(
    dn: &DynamicNamespace,
    key: &ResourceKey,
    ctx: &Context,
) -> Result<(), Error> {
    let name = role_binding_name(key);
    if ctx.kube.get_role_binding(&key.name, &name).await?.is_some() {
        debug!(role_binding = %name, "role binding exists");
        return Ok(());
    }

    info!(
        role_binding = %name,
        subjects = dn.spec.role_binding_subjects.len(),
        "creating role binding"
    );
    ctx.kube
        .create_role_binding(&generate_role_binding(key, &dn.spec))
        .await
}

/// Clean up after a DynamicNamespace that is being deleted
///
/// Deletes the managed namespace if, and only if, it still carries this
/// resource's provenance label, then releases the finalizer. The quota and
/// role binding live inside the namespace and go with it.
pub async fn finalize(dn: &DynamicNamespace, ctx: &Context) -> Result<(), Error> {
    if !dn.has_finalizer(FINALIZER) {
        debug!("no finalizer, nothing to clean up");
        return Ok(());
    }

    let key = dn.key()?;
    match ctx.kube.get_namespace(&key.name).await? {
        Some(live) if live.metadata.deletion_timestamp.is_some() => {
            debug!(target_namespace = %key.name, "namespace already terminating");
        }
        Some(live) if is_owned_by(&live, &key) => {
            info!(target_namespace = %key.name, "deleting namespace");
            ctx.kube.delete_namespace(&key.name).await?;
        }
        Some(_) => {
            info!(
                target_namespace = %key.name,
                "namespace not created by this resource, leaving it in place"
            );
        }
        None => debug!(target_namespace = %key.name, "namespace already gone"),
    }

    info!("removing finalizer");
    let mut updated = dn.clone();
    updated.finalizers_mut().retain(|f| f != FINALIZER);
    ctx.kube.replace_dynamic_namespace(&updated).await?;
    Ok(())
}

/// Write the status if it differs from the one on the resource
///
/// A failed write is logged and dropped; the pass outcome stands.
async fn update_status(
    dn: &DynamicNamespace,
    key: &ResourceKey,
    ctx: &Context,
    status: DynamicNamespaceStatus,
) {
    if dn.status.as_ref() == Some(&status) {
        debug!(code = %status.code, "status unchanged");
        return;
    }

    match ctx.kube.patch_status(key, &status).await {
        Ok(()) => info!(code = %status.code, message = %status.message, "updated status"),
        Err(e) => warn!(error = %e, code = %status.code, "failed to update status"),
    }
}

/// Error policy for the controller
///
/// Every error class is requeued. The delay doubles with each consecutive
/// failure of the same resource, from the configured initial delay up to
/// the configured maximum.
pub fn error_policy(dn: Arc<DynamicNamespace>, error: &Error, ctx: Arc<Context>) -> Action {
    let delay = match dn.key() {
        Ok(key) => ctx.backoff.next_delay(&key),
        Err(_) => ctx.backoff.initial(),
    };
    error!(
        ?error,
        dynamic_namespace = %dn.name_any(),
        namespace = %dn.namespace().unwrap_or_default(),
        requeue_secs = delay.as_secs(),
        "reconciliation failed"
    );
    Action::requeue(delay)
}
