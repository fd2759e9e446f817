//! Integration tests for the dynns operator
//!
//! These tests require a Kubernetes cluster (kind) to run and tell the story
//! of how platform teams interact with DynamicNamespace resources.
//!
//! # Test Organization
//!
//! - `crd_operations`: Stories about registering the CRD and creating
//!   DynamicNamespace resources through the Kubernetes API
//!
//! - `namespace_lifecycle`: Stories about how reconciliation creates,
//!   protects and deletes the managed namespace
//!
//! # Running These Tests
//!
//! These tests are ignored by default because they require a kind cluster:
//!
//! ```bash
//! cargo test --test kind -- --ignored
//! ```

mod crd_operations;
mod helpers;
