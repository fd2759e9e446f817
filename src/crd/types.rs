//! Supporting types for the DynamicNamespace CRD

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// API group for RBAC subjects of kind `User` and `Group`
pub const RBAC_API_GROUP: &str = "rbac.authorization.k8s.io";

/// Quota applied when a DynamicNamespace does not specify one
pub fn default_quota() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("cpu".to_string(), "100m".to_string()),
        ("ephemeral-storage".to_string(), "100Mi".to_string()),
        ("memory".to_string(), "100Mi".to_string()),
    ])
}

/// Outcome code of the most recent reconciliation
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    /// Namespace, quota and role binding are in place
    Active,
    /// The last reconciliation failed; see the status message
    Error,
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// A subject granted the `admin` ClusterRole inside the managed namespace
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoleBindingSubject {
    /// Kind of subject: `User`, `Group` or `ServiceAccount`
    pub kind: String,

    /// Name of the subject
    pub name: String,

    /// Namespace of the subject (required for `ServiceAccount`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// API group of the subject
    ///
    /// Defaults to `rbac.authorization.k8s.io` for `User` and `Group`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_group: Option<String>,
}

impl RoleBindingSubject {
    /// A `User` subject
    pub fn user(name: impl Into<String>) -> Self {
        Self {
            kind: "User".to_string(),
            name: name.into(),
            namespace: None,
            api_group: None,
        }
    }

    /// A `Group` subject
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            kind: "Group".to_string(),
            name: name.into(),
            namespace: None,
            api_group: None,
        }
    }

    /// A `ServiceAccount` subject
    pub fn service_account(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            kind: "ServiceAccount".to_string(),
            name: name.into(),
            namespace: Some(namespace.into()),
            api_group: None,
        }
    }

    /// API group to put on the generated RBAC subject
    pub fn effective_api_group(&self) -> Option<String> {
        match (&self.api_group, self.kind.as_str()) {
            (Some(group), _) => Some(group.clone()),
            (None, "User" | "Group") => Some(RBAC_API_GROUP.to_string()),
            (None, _) => None,
        }
    }
}
