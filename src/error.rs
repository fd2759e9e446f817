//! Error types for the DynamicNamespace operator

use thiserror::Error;

/// Main error type for DynamicNamespace operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// A namespace with the target name exists and is not owned by the resource
    #[error("namespace {name} already exists")]
    NamespaceConflict {
        /// Name of the conflicting namespace
        name: String,
    },

    /// Validation error for resource specs
    #[error("validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// CRD installation error
    #[error("CRD installation error: {0}")]
    Install(String),
}

impl Error {
    /// Create a namespace conflict error for the given namespace name
    pub fn namespace_conflict(name: impl Into<String>) -> Self {
        Self::NamespaceConflict { name: name.into() }
    }

    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create a CRD installation error with the given message
    pub fn install(msg: impl Into<String>) -> Self {
        Self::Install(msg.into())
    }

    /// Returns true if this is a 404 response from the API server
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Kube(kube::Error::Api(ae)) if ae.code == 404)
    }

    /// Returns true if this is a 409 response from the API server
    ///
    /// Raised for both "already exists" on create and stale `resourceVersion`
    /// on replace.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Kube(kube::Error::Api(ae)) if ae.code == 409)
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

/// Build a `kube::Error::Api` with the given HTTP code, for tests
#[cfg(test)]
pub(crate) fn api_error(code: u16, reason: &str) -> Error {
    Error::Kube(kube::Error::Api(kube::error::ErrorResponse {
        status: "Failure".to_string(),
        message: format!("{reason} (test)"),
        reason: reason.to_string(),
        code,
    }))
}
