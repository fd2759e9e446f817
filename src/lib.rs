//! dynns - Kubernetes operator for namespace-as-a-resource
//!
//! A `DynamicNamespace` resource declares a namespace together with its
//! resource quota and the subjects that get admin access to it. The operator
//! creates the namespace, the quota and the role binding, reports the outcome
//! on the resource status, and removes the namespace again when the resource
//! is deleted.
//!
//! # Modules
//!
//! - [`crd`] - The `DynamicNamespace` Custom Resource Definition
//! - [`resources`] - Pure generators for the dependent Kubernetes objects
//! - [`controller`] - Reconciliation and finalization logic
//! - [`install`] - CRD registration at startup
//! - [`config`] - Operator configuration
//! - [`telemetry`] - Tracing subscriber setup
//! - [`error`] - Error types for the operator

#![deny(missing_docs)]

pub mod config;
pub mod controller;
pub mod crd;
pub mod error;
pub mod install;
pub mod resources;
pub mod telemetry;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Well-known names
// =============================================================================
// The label key and finalizer token are persisted on live objects. Changing
// them orphans everything created by earlier releases.

/// API group of the DynamicNamespace CRD
pub const API_GROUP: &str = "platform.cloudnative.space";

/// Finalizer token the controller places on every DynamicNamespace
pub const FINALIZER: &str = "platform.cloudnative.space/finalizer";

/// Provenance label key set on every generated Namespace
///
/// The value is `<resource-namespace>.<resource-name>`.
pub const CREATED_BY_LABEL: &str = "platform.cloudnative.space/created-by";

/// Default field manager name for API writes
pub const DEFAULT_FIELD_MANAGER: &str = "dynamicnamespace-controller";
