//! Controller for DynamicNamespace resources
//!
//! Controllers follow the Kubernetes controller pattern with observe-diff-act loops.

mod backoff;
mod dynamic_namespace;

pub use backoff::ErrorBackoff;
pub use dynamic_namespace::{
    error_policy, finalize, reconcile, Context, ContextBuilder, KubeClient, KubeClientImpl,
};
