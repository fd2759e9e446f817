//! Custom Resource Definitions for dynns
//!
//! This module contains the DynamicNamespace CRD managed by the operator.

mod dynamic_namespace;
mod types;

pub use dynamic_namespace::{
    DynamicNamespace, DynamicNamespaceSpec, DynamicNamespaceStatus, ResourceKey,
};
pub use types::{default_quota, RoleBindingSubject, StatusCode, RBAC_API_GROUP};
