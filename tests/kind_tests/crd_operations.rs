//! Integration tests for CRD operations
//!
//! These tests tell the story of how users interact with DynamicNamespace
//! resources through the Kubernetes API, without the controller involved.

use kube::api::{Api, DeleteParams, PostParams};
use kube::CustomResourceExt;

use dynns::crd::{default_quota, DynamicNamespace, RoleBindingSubject};
use dynns::install::{deploy_definition, Deployment};

use super::helpers::{ensure_namespace, ensure_test_cluster, sample_dynamic_namespace};

/// Story: the CRD is registered idempotently
///
/// The operator registers its CRD on every start. When it is already
/// present the definition is replaced, not duplicated or rejected.
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_crd_registration_is_repeatable() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");

    let result = deploy_definition(client.clone(), &DynamicNamespace::crd())
        .await
        .expect("second registration should succeed");

    assert_eq!(result, Deployment::Updated);
}

/// Story: a user applies a DynamicNamespace without a quota
///
/// The default quota is filled in on the client side, and the status stays
/// empty until the controller reports on it.
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_user_creates_dynamic_namespace() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    ensure_namespace(&client, "dynns-crd-tests").await;
    let api: Api<DynamicNamespace> = Api::namespaced(client.clone(), "dynns-crd-tests");
    let name = "crd-create";
    let _ = api.delete(name, &DeleteParams::default()).await;

    let mut dn = sample_dynamic_namespace("dynns-crd-tests", name);
    dn.spec.role_binding_subjects = vec![RoleBindingSubject::group("platform-team")];

    let created = api
        .create(&PostParams::default(), &dn)
        .await
        .expect("failed to create DynamicNamespace");

    assert_eq!(created.spec.create_quota, default_quota());
    assert_eq!(created.spec.role_binding_subjects.len(), 1);
    assert!(created.status.is_none());

    let fetched = api.get(name).await.expect("failed to get DynamicNamespace");
    assert_eq!(fetched.spec, created.spec);

    let _ = api.delete(name, &DeleteParams::default()).await;
}
