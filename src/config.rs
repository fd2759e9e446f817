//! Operator configuration
//!
//! Settings are parsed from CLI flags and environment variables in `main` and
//! resolved into an [`OperatorConfig`] that the controller context carries.

use std::path::PathBuf;
use std::time::Duration;

use crate::telemetry::LogFormat;
use crate::DEFAULT_FIELD_MANAGER;

/// Default delay before a failed reconciliation is retried
pub const DEFAULT_ERROR_REQUEUE: Duration = Duration::from_secs(5);

/// Default cap on the retry delay of a repeatedly failing resource
pub const DEFAULT_MAX_ERROR_REQUEUE: Duration = Duration::from_secs(300);

/// Runtime settings of the operator
#[derive(Clone, Debug, PartialEq)]
pub struct OperatorConfig {
    /// Field manager recorded on API writes
    pub field_manager: String,

    /// Delay before a failed reconciliation pass is retried
    pub error_requeue: Duration,

    /// Upper bound of the doubling retry delay
    pub max_error_requeue: Duration,

    /// Namespace to watch for DynamicNamespace resources (None = all)
    pub watch_namespace: Option<String>,

    /// Install or update the CRD at startup
    pub install_crd: bool,

    /// CRD manifest to register instead of the built-in definition
    pub crd_manifest: Option<PathBuf>,

    /// Log output format
    pub log_format: LogFormat,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            field_manager: DEFAULT_FIELD_MANAGER.to_string(),
            error_requeue: DEFAULT_ERROR_REQUEUE,
            max_error_requeue: DEFAULT_MAX_ERROR_REQUEUE,
            watch_namespace: None,
            install_crd: true,
            crd_manifest: None,
            log_format: LogFormat::Text,
        }
    }
}

impl OperatorConfig {
    /// Set the field manager and return self for chaining
    pub fn field_manager(mut self, field_manager: impl Into<String>) -> Self {
        self.field_manager = field_manager.into();
        self
    }

    /// Set the error requeue delay and return self for chaining
    pub fn error_requeue(mut self, delay: Duration) -> Self {
        self.error_requeue = delay;
        self
    }

    /// Set the maximum error requeue delay and return self for chaining
    pub fn max_error_requeue(mut self, delay: Duration) -> Self {
        self.max_error_requeue = delay;
        self
    }

    /// Restrict the watch to one namespace and return self for chaining
    ///
    /// An empty string means all namespaces.
    pub fn watch_namespace(mut self, namespace: Option<String>) -> Self {
        self.watch_namespace = namespace.filter(|ns| !ns.is_empty());
        self
    }
}
