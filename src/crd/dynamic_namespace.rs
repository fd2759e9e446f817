//! DynamicNamespace Custom Resource Definition
//!
//! A DynamicNamespace declares a namespace that the operator creates and owns,
//! along with the ResourceQuota and RoleBinding placed inside it.

use std::collections::BTreeMap;

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{default_quota, RoleBindingSubject, StatusCode};
use crate::Error;

/// Specification for a DynamicNamespace
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "platform.cloudnative.space",
    version = "v1",
    kind = "DynamicNamespace",
    plural = "dynamicnamespaces",
    shortname = "dn",
    status = "DynamicNamespaceStatus",
    namespaced,
    printcolumn = r#"{"name":"Status","type":"string","description":"Current status of the resource","jsonPath":".status.code"}"#,
    printcolumn = r#"{"name":"Message","type":"string","description":"Status message","jsonPath":".status.message"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct DynamicNamespaceSpec {
    /// Hard limits of the namespace ResourceQuota, resource name to quantity
    #[serde(default = "default_quota")]
    pub create_quota: BTreeMap<String, String>,

    /// Subjects bound to the `admin` ClusterRole inside the namespace
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub role_binding_subjects: Vec<RoleBindingSubject>,
}

impl Default for DynamicNamespaceSpec {
    fn default() -> Self {
        Self {
            create_quota: default_quota(),
            role_binding_subjects: Vec::new(),
        }
    }
}

/// Status for a DynamicNamespace
///
/// Written by the controller after every reconciliation pass.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DynamicNamespaceStatus {
    /// Outcome of the last reconciliation
    pub code: StatusCode,

    /// Human-readable message about the outcome
    #[serde(default)]
    pub message: String,
}

impl DynamicNamespaceStatus {
    /// Message reported when everything is in place
    pub const ACTIVE_MESSAGE: &'static str = "all good";

    /// Status for a successful reconciliation
    pub fn active() -> Self {
        Self {
            code: StatusCode::Active,
            message: Self::ACTIVE_MESSAGE.to_string(),
        }
    }

    /// Status for a failed reconciliation
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            code: StatusCode::Error,
            message: message.into(),
        }
    }
}

/// Identity of a DynamicNamespace: its namespace and name
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    /// Namespace the DynamicNamespace lives in
    pub namespace: String,
    /// Name of the DynamicNamespace, also the name of the managed namespace
    pub name: String,
}

impl ResourceKey {
    /// Create a key from namespace and name
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ResourceKey {
    /// Formats as `<namespace>.<name>`, the provenance label value
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

impl DynamicNamespace {
    /// Key identifying this resource
    ///
    /// Fails for objects without a namespace or name, which the API server
    /// never returns for a namespaced kind.
    pub fn key(&self) -> Result<ResourceKey, Error> {
        let name = self
            .metadata
            .name
            .clone()
            .ok_or_else(|| Error::validation("DynamicNamespace has no metadata.name"))?;
        let namespace = self.namespace().ok_or_else(|| {
            Error::validation(format!("DynamicNamespace {name} has no metadata.namespace"))
        })?;
        Ok(ResourceKey::new(namespace, name))
    }

    /// Returns true once deletion was requested
    pub fn is_being_deleted(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    /// Returns true if the given finalizer token is present
    pub fn has_finalizer(&self, finalizer: &str) -> bool {
        self.finalizers().iter().any(|f| f == finalizer)
    }
}
