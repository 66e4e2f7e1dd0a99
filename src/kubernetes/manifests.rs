// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Typed Kubernetes objects of the GitOps bootstrap.

use crate::config::{GitRepositoryConfig, KustomizationConfig};
use crate::constants::labels;
use crate::types::flux::{
    GitRepository, GitRepositoryRef, GitRepositorySpec, Kustomization, KustomizationSpec,
};
use k8s_openapi::api::core::v1::{Namespace, Secret, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRoleBinding, RoleRef, Subject};
use kube::api::ObjectMeta;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Flux controllers that get the tracking label
pub const FLUX_CONTROLLERS: &[&str] = &[
    "helmController",
    "kustomizeController",
    "notificationController",
    "sourceController",
    "imageReflectionController",
    "imageAutomationController",
];

pub const ALB_VALUES_SECRET: &str = "aws-load-balancer-controller-values";
pub const ACCESS_TOKEN_SECRET: &str = "pulumi-access-token";
pub const SERVICE_ACCOUNT_TOKEN_SECRET: &str = "backstage-token";
pub const CLUSTER_ROLE_BINDING: &str = "backstage-cluster-role-binding";
pub const CLUSTER_ADMIN_ROLE: &str = "cluster-admin";

/// Label that lets Backstage find the objects belonging to the cluster.
pub fn tracking_labels() -> BTreeMap<String, String> {
    BTreeMap::from([(
        labels::BACKSTAGE_KUBERNETES_ID.to_string(),
        labels::GITOPS_CLUSTER_ID.to_string(),
    )])
}

/// Helm values of the Flux release, labelling every controller.
pub fn flux_values() -> Value {
    let labels = tracking_labels();
    Value::Object(
        FLUX_CONTROLLERS
            .iter()
            .map(|controller| (controller.to_string(), json!({ "labels": labels })))
            .collect(),
    )
}

/// Secret the load balancer controller release reads its values from. The
/// `values.yaml` entry is filled in once the cluster exists.
pub fn alb_values_secret() -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(ALB_VALUES_SECRET.to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// `system:serviceaccount:<namespace>:<name>` subject of a service account token.
pub fn service_account_subject(namespace: &str, name: &str) -> String {
    format!("system:serviceaccount:{}:{}", namespace, name)
}

pub fn namespace(name: &str) -> Namespace {
    Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Opaque secret with a single string entry.
pub fn opaque_secret(name: &str, namespace: &str, key: &str, value: &str) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        type_: Some("Opaque".to_string()),
        string_data: Some(BTreeMap::from([(key.to_string(), value.to_string())])),
        ..Default::default()
    }
}

pub fn service_account(name: &str, namespace: &str) -> ServiceAccount {
    ServiceAccount {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Bind `cluster-admin` to the service account.
pub fn cluster_admin_binding(service_account: &str, namespace: &str) -> ClusterRoleBinding {
    ClusterRoleBinding {
        metadata: ObjectMeta {
            name: Some(CLUSTER_ROLE_BINDING.to_string()),
            ..Default::default()
        },
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "ClusterRole".to_string(),
            name: CLUSTER_ADMIN_ROLE.to_string(),
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name: service_account.to_string(),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        }]),
    }
}

/// Secret the token controller fills with a long-lived token of the service account.
pub fn service_account_token_secret(service_account: &str, namespace: &str) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(SERVICE_ACCOUNT_TOKEN_SECRET.to_string()),
            namespace: Some(namespace.to_string()),
            annotations: Some(BTreeMap::from([(
                labels::SERVICE_ACCOUNT_NAME.to_string(),
                service_account.to_string(),
            )])),
            ..Default::default()
        },
        type_: Some("kubernetes.io/service-account-token".to_string()),
        ..Default::default()
    }
}

pub fn git_repository(namespace: &str, config: &GitRepositoryConfig) -> GitRepository {
    let mut repository = GitRepository::new(
        &config.name,
        GitRepositorySpec {
            url: config.url.clone(),
            interval: config.interval.clone(),
            timeout: Some(config.timeout.clone()),
            reference: Some(GitRepositoryRef {
                branch: Some(config.branch.clone()),
                ..Default::default()
            }),
        },
    );
    repository.metadata.namespace = Some(namespace.to_string());
    repository.metadata.labels = Some(tracking_labels());
    repository
}

/// Reconciliation policy applying `config.path` of `source` into the source's namespace.
pub fn kustomization(source: &GitRepository, config: &KustomizationConfig) -> Kustomization {
    let source_ref = source.source_ref();
    let mut kustomization = Kustomization::new(
        &config.name,
        KustomizationSpec {
            interval: config.interval.clone(),
            path: config.path.clone(),
            prune: config.prune,
            force: Some(config.force),
            target_namespace: source_ref.namespace.clone(),
            source_ref,
        },
    );
    kustomization.metadata.namespace = source.metadata.namespace.clone();
    kustomization.metadata.labels = Some(tracking_labels());
    kustomization
}
