// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// Flux source pointing at a git repository the cluster is reconciled from.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, PartialEq, schemars::JsonSchema)]
#[kube(group = "source.toolkit.fluxcd.io", version = "v1", kind = "GitRepository")]
#[kube(namespaced)]
#[serde(rename_all = "camelCase")]
pub struct GitRepositorySpec {
    pub url: String,
    /// How often the source is polled
    pub interval: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<GitRepositoryRef>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GitRepositoryRef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
}

/// Flux reconciliation policy applying a path of a source to the cluster.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, PartialEq, schemars::JsonSchema)]
#[kube(group = "kustomize.toolkit.fluxcd.io", version = "v1", kind = "Kustomization")]
#[kube(namespaced)]
#[serde(rename_all = "camelCase")]
pub struct KustomizationSpec {
    pub interval: String,
    pub path: String,
    pub prune: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force: Option<bool>,
    pub source_ref: CrossNamespaceSourceReference,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_namespace: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CrossNamespaceSourceReference {
    pub kind: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl GitRepository {
    /// Reference to this source from a Kustomization.
    pub fn source_ref(&self) -> CrossNamespaceSourceReference {
        use kube::{Resource, ResourceExt};
        CrossNamespaceSourceReference {
            kind: Self::kind(&()).to_string(),
            name: self.name_any(),
            namespace: self.namespace(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::api::ObjectMeta;
    use serde_json::json;

    fn make_repository() -> GitRepository {
        GitRepository {
            metadata: ObjectMeta {
                name: Some("bootstrap-repo".to_string()),
                namespace: Some("flux-system".to_string()),
                ..Default::default()
            },
            spec: GitRepositorySpec {
                url: "https://github.com/my-backstage-demo/pulumi-gitops-repo.git".to_string(),
                interval: "1m".to_string(),
                timeout: Some("60s".to_string()),
                reference: Some(GitRepositoryRef {
                    branch: Some("main".to_string()),
                    ..Default::default()
                }),
            },
        }
    }

    #[test]
    fn test_git_repository_serializes_with_api_version() {
        let value = serde_json::to_value(make_repository()).unwrap();

        assert_eq!(value["apiVersion"], "source.toolkit.fluxcd.io/v1");
        assert_eq!(value["kind"], "GitRepository");
        assert_eq!(value["spec"]["ref"], json!({"branch": "main"}));
        assert_eq!(value["spec"]["timeout"], "60s");
    }

    #[test]
    fn test_source_ref_points_at_repository() {
        let source = make_repository().source_ref();

        assert_eq!(source.kind, "GitRepository");
        assert_eq!(source.name, "bootstrap-repo");
        assert_eq!(source.namespace.as_deref(), Some("flux-system"));
    }

    #[test]
    fn test_kustomization_spec_field_names() {
        let kustomization = Kustomization::new(
            "bootstrap-kustomization",
            KustomizationSpec {
                interval: "1m".to_string(),
                path: "./flux/clusters/aws-gitops-platform".to_string(),
                prune: true,
                force: Some(false),
                source_ref: make_repository().source_ref(),
                target_namespace: Some("flux-system".to_string()),
            },
        );

        let value = serde_json::to_value(kustomization).unwrap();
        assert_eq!(value["apiVersion"], "kustomize.toolkit.fluxcd.io/v1");
        assert_eq!(value["spec"]["sourceRef"]["kind"], "GitRepository");
        assert_eq!(value["spec"]["targetNamespace"], "flux-system");
        assert_eq!(value["spec"]["prune"], true);
        assert_eq!(value["spec"]["force"], false);
    }
}
