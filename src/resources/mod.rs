//! Dependent object generators
//!
//! Pure functions that map a DynamicNamespace to the Kubernetes objects it
//! owns:
//! - Namespace: named after the resource, carries the provenance label
//! - ResourceQuota: `<name>-resourcequota`, hard limits from the spec
//! - RoleBinding: `<name>-rolebinding`, binds ClusterRole `admin`
//!
//! Ownership of a live Namespace is proven by the provenance label alone,
//! since a cluster-scoped Namespace cannot carry an owner reference to a
//! namespaced resource.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Namespace, ResourceQuota, ResourceQuotaSpec};
use k8s_openapi::api::rbac::v1::{RoleBinding, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::crd::{DynamicNamespaceSpec, ResourceKey, RBAC_API_GROUP};
use crate::CREATED_BY_LABEL;

/// ClusterRole bound to every subject in the managed namespace
pub const ADMIN_CLUSTER_ROLE: &str = "admin";

/// Name of the ResourceQuota for a DynamicNamespace
pub fn resource_quota_name(key: &ResourceKey) -> String {
    format!("{}-resourcequota", key.name)
}

/// Name of the RoleBinding for a DynamicNamespace
pub fn role_binding_name(key: &ResourceKey) -> String {
    format!("{}-rolebinding", key.name)
}

/// Returns true if the namespace carries this resource's provenance label
pub fn is_owned_by(namespace: &Namespace, key: &ResourceKey) -> bool {
    namespace
        .metadata
        .labels
        .as_ref()
        .and_then(|labels| labels.get(CREATED_BY_LABEL))
        .is_some_and(|value| *value == key.to_string())
}

/// Desired Namespace for a DynamicNamespace
pub fn generate_namespace(key: &ResourceKey) -> Namespace {
    Namespace {
        metadata: ObjectMeta {
            name: Some(key.name.clone()),
            labels: Some(BTreeMap::from([(
                CREATED_BY_LABEL.to_string(),
                key.to_string(),
            )])),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Desired ResourceQuota for a DynamicNamespace
///
/// Quantities are copied verbatim; the API server validates them on create.
pub fn generate_resource_quota(key: &ResourceKey, spec: &DynamicNamespaceSpec) -> ResourceQuota {
    let hard = spec
        .create_quota
        .iter()
        .map(|(resource, quantity)| (resource.clone(), Quantity(quantity.clone())))
        .collect();

    ResourceQuota {
        metadata: ObjectMeta {
            name: Some(resource_quota_name(key)),
            namespace: Some(key.name.clone()),
            ..Default::default()
        },
        spec: Some(ResourceQuotaSpec {
            hard: Some(hard),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Desired RoleBinding for a DynamicNamespace
pub fn generate_role_binding(key: &ResourceKey, spec: &DynamicNamespaceSpec) -> RoleBinding {
    let subjects = spec
        .role_binding_subjects
        .iter()
        .map(|subject| Subject {
            api_group: subject.effective_api_group(),
            kind: subject.kind.clone(),
            name: subject.name.clone(),
            namespace: subject.namespace.clone(),
        })
        .collect();

    RoleBinding {
        metadata: ObjectMeta {
            name: Some(role_binding_name(key)),
            namespace: Some(key.name.clone()),
            ..Default::default()
        },
        role_ref: RoleRef {
            api_group: RBAC_API_GROUP.to_string(),
            kind: "ClusterRole".to_string(),
            name: ADMIN_CLUSTER_ROLE.to_string(),
        },
        subjects: Some(subjects),
    }
}
