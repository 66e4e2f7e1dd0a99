// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! GitOps bootstrap of the platform cluster: the Flux release, its sync
//! source and policy, and the service identity Backstage talks to the
//! cluster with.

use crate::config::PlatformConfig;
use crate::constants::tokens;
use crate::error::{InfraError, Result};
use crate::graph::{Input, ResourceHandle, ResourceIntent, StackGraph};
use crate::kubernetes::manifests;
use serde::Serialize;
use tracing::{debug, instrument};

/// Platform resources the bootstrap builds on.
pub struct ClusterResources<'a> {
    pub vpc: &'a ResourceHandle,
    pub cluster: &'a ResourceHandle,
    pub alb_role: &'a ResourceHandle,
    pub provider: &'a ResourceHandle,
}

/// Resources of the bootstrap other parts of the stack refer to.
#[derive(Debug, Clone)]
pub struct GitOpsResources {
    pub flux: ResourceHandle,
    pub git_repository: ResourceHandle,
    pub service_account: ResourceHandle,
    pub token_secret: ResourceHandle,
}

/// Turn a typed Kubernetes object into the input tree of an intent.
fn manifest<T: Serialize>(object: &T) -> Result<Input> {
    Input::from_serialize(object)
}

/// Intent applying `object` through the cluster provider.
fn k8s_intent(
    type_token: &str,
    name: String,
    object: Input,
    provider: &ResourceHandle,
) -> Result<ResourceIntent> {
    let Input::Map(fields) = object else {
        return Err(InfraError::Resolve(format!(
            "manifest of {} is not an object",
            name
        )));
    };

    let mut intent = ResourceIntent::new(type_token, name).provider(provider);
    intent.inputs = fields;
    Ok(intent)
}

/// `values.yaml` of the load balancer controller, filled from cluster outputs.
pub fn alb_values(cluster_name: Input, region: &str, role_arn: Input, vpc_id: Input) -> Input {
    Input::concat([
        Input::string("clusterName: "),
        cluster_name,
        Input::string(format!("\nregion: {}\n", region)),
        Input::string("serviceAccount:\n  annotations:\n    eks.amazonaws.com/role-arn: "),
        role_arn,
        Input::string("\nvpcId: "),
        vpc_id,
    ])
}

#[instrument(skip_all, fields(stack = %graph.name()))]
pub fn declare_bootstrap(
    graph: &mut StackGraph,
    config: &PlatformConfig,
    region: &str,
    platform: ClusterResources<'_>,
) -> Result<GitOpsResources> {
    let prefix = &config.name_prefix;
    let gitops = &config.gitops;
    let provider = platform.provider;

    let flux = graph.add(
        ResourceIntent::new(tokens::HELM_RELEASE, format!("{}-flux2", prefix))
            .input("chart", gitops.chart.as_str())
            .input("namespace", gitops.namespace.as_str())
            .input("createNamespace", true)
            .input("version", gitops.chart_version.as_str())
            .input("values", manifests::flux_values())
            .provider(provider),
    )?;
    debug!("Flux {} from {}", gitops.chart_version, gitops.chart);

    let alb_secret = manifest(&manifests::alb_values_secret())?
        .with_path(&["metadata", "namespace"], flux.output("namespace"))?
        .with_path(
            &["stringData", "values.yaml"],
            alb_values(
                platform.cluster.output("eksClusterName"),
                region,
                platform.alb_role.arn(),
                platform.vpc.id(),
            ),
        )?;
    graph.add(k8s_intent(
        tokens::K8S_SECRET,
        "aws-lb-controller-secret".to_string(),
        alb_secret,
        provider,
    )?)?;

    let operator_ns = graph.add(k8s_intent(
        tokens::K8S_NAMESPACE,
        format!("{}-pulumi-operator-ns", prefix),
        manifest(&manifests::namespace(&gitops.operator_namespace))?,
        provider,
    )?)?;

    let access_token = manifest(&manifests::opaque_secret(
        manifests::ACCESS_TOKEN_SECRET,
        &gitops.operator_namespace,
        manifests::ACCESS_TOKEN_SECRET,
        "",
    ))?
    .with_path(
        &["stringData", manifests::ACCESS_TOKEN_SECRET],
        Input::ConfigSecret(gitops.access_token_key.clone()),
    )?;
    graph.add(
        k8s_intent(
            tokens::K8S_SECRET,
            format!("{}-pulumi-access-token", prefix),
            access_token,
            provider,
        )?
        .depends_on(&operator_ns),
    )?;

    let repository = manifests::git_repository(&gitops.namespace, &gitops.repository);
    let git_repository = graph.add(
        k8s_intent(
            tokens::FLUX_GIT_REPOSITORY,
            format!("{}-bootstrap-repo", prefix),
            manifest(&repository)?.with_path(&["metadata", "namespace"], flux.output("namespace"))?,
            provider,
        )?
        .depends_on(&flux),
    )?;

    graph.add(
        k8s_intent(
            tokens::FLUX_KUSTOMIZATION,
            format!("{}-bootstrap-kustomization", prefix),
            manifest(&manifests::kustomization(&repository, &gitops.kustomization))?,
            provider,
        )?
        .depends_on(&git_repository),
    )?;

    let service_account = graph.add(k8s_intent(
        tokens::K8S_SERVICE_ACCOUNT,
        format!("{}-backstage-sa", prefix),
        manifest(&manifests::service_account(
            &gitops.service_account,
            &gitops.service_account_namespace,
        ))?,
        provider,
    )?)?;

    graph.add(
        k8s_intent(
            tokens::K8S_CLUSTER_ROLE_BINDING,
            format!("{}-backstage-cluster-role-binding", prefix),
            manifest(&manifests::cluster_admin_binding(
                &gitops.service_account,
                &gitops.service_account_namespace,
            ))?,
            provider,
        )?
        .depends_on(&service_account),
    )?;

    let token_secret = graph.add(
        k8s_intent(
            tokens::K8S_SECRET,
            format!("{}-backstage-token", prefix),
            manifest(&manifests::service_account_token_secret(
                &gitops.service_account,
                &gitops.service_account_namespace,
            ))?,
            provider,
        )?
        .depends_on(&service_account)
        .secret_output("data"),
    )?;

    Ok(GitOpsResources {
        flux,
        git_repository,
        service_account,
        token_secret,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ResolveContext, ResourceOutputs, Resolved};
    use crate::stack_ref::StackReferences;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn make_graph() -> (StackGraph, GitOpsResources) {
        let mut graph = StackGraph::new("gitops-platform");
        let vpc = graph.add(ResourceIntent::new(tokens::VPC, "vpc")).unwrap();
        let cluster = graph
            .add(ResourceIntent::new(tokens::EKS_CLUSTER, "cluster"))
            .unwrap();
        let alb_role = graph
            .add(ResourceIntent::new(tokens::IAM_ROLE, "alb-role"))
            .unwrap();
        let provider = graph
            .add(ResourceIntent::new(tokens::KUBERNETES_PROVIDER, "k8s").depends_on(&cluster))
            .unwrap();

        let resources = declare_bootstrap(
            &mut graph,
            &PlatformConfig::default(),
            "eu-central-1",
            ClusterResources {
                vpc: &vpc,
                cluster: &cluster,
                alb_role: &alb_role,
                provider: &provider,
            },
        )
        .unwrap();
        (graph, resources)
    }

    #[test]
    fn test_every_manifest_uses_cluster_provider() {
        let (graph, _) = make_graph();

        let kubernetes: Vec<_> = graph
            .resources()
            .iter()
            .filter(|r| r.type_token.starts_with("kubernetes:"))
            .collect();
        assert_eq!(kubernetes.len(), 9);
        assert!(kubernetes
            .iter()
            .all(|r| r.provider.as_deref() == Some("k8s")));
    }

    #[test]
    fn test_sync_source_applied_after_flux() {
        let (graph, resources) = make_graph();
        let order: Vec<_> = graph
            .apply_order()
            .unwrap()
            .iter()
            .map(|r| r.name.clone())
            .collect();

        let position = |name: &str| order.iter().position(|n| n == name).unwrap();
        assert!(position(&resources.flux.name) < position(&resources.git_repository.name));
        assert!(
            position(&resources.git_repository.name)
                < position("pulumi-backstage-flux-gitops-aws-bootstrap-kustomization")
        );
        assert!(
            position(&resources.service_account.name) < position(&resources.token_secret.name)
        );
    }

    #[test]
    fn test_binding_waits_for_service_account() {
        let (graph, resources) = make_graph();
        let deps = graph
            .dependencies_of("pulumi-backstage-flux-gitops-aws-backstage-cluster-role-binding")
            .unwrap();
        assert!(deps.contains(&resources.service_account.name));
    }

    #[test]
    fn test_token_secret_data_is_secret() {
        let (graph, resources) = make_graph();
        let token = graph.resource(&resources.token_secret.name).unwrap();

        assert!(token.secret_outputs.contains("data"));
        assert_eq!(
            token.inputs["type"],
            Input::string("kubernetes.io/service-account-token")
        );
    }

    #[test]
    fn test_access_token_comes_from_secret_config() {
        let (graph, _) = make_graph();
        let secret = graph
            .resource("pulumi-backstage-flux-gitops-aws-pulumi-access-token")
            .unwrap();

        let Input::Map(string_data) = &secret.inputs["stringData"] else {
            panic!("expected stringData map");
        };
        assert_eq!(
            string_data["pulumi-access-token"],
            Input::ConfigSecret("pulumi-pat".to_string())
        );
    }

    #[test]
    fn test_alb_values_resolve_to_yaml() {
        let (graph, _) = make_graph();
        let outputs = ResourceOutputs::from([
            (
                "cluster".to_string(),
                BTreeMap::from([("eksClusterName".to_string(), json!("gitops-eks"))]),
            ),
            (
                "alb-role".to_string(),
                BTreeMap::from([("arn".to_string(), json!("arn:aws:iam::1:role/alb"))]),
            ),
            (
                "vpc".to_string(),
                BTreeMap::from([("id".to_string(), json!("vpc-1"))]),
            ),
        ]);
        let stacks = StackReferences::default();
        let secrets: BTreeMap<String, String> = BTreeMap::new();
        let ctx = ResolveContext {
            graph: &graph,
            outputs: &outputs,
            stacks: &stacks,
            secrets: &secrets,
        };

        let secret = graph.resource("aws-lb-controller-secret").unwrap();
        let Input::Map(string_data) = &secret.inputs["stringData"] else {
            panic!("expected stringData map");
        };
        let Resolved {
            value: Some(values),
            secret: false,
        } = ctx.resolve(&string_data["values.yaml"]).unwrap()
        else {
            panic!("expected known, non-secret values");
        };

        let yaml: serde_yaml::Value = serde_yaml::from_str(values.as_str().unwrap()).unwrap();
        assert_eq!(yaml["clusterName"], "gitops-eks");
        assert_eq!(yaml["region"], "eu-central-1");
        assert_eq!(yaml["vpcId"], "vpc-1");
        assert_eq!(
            yaml["serviceAccount"]["annotations"]["eks.amazonaws.com/role-arn"],
            "arn:aws:iam::1:role/alb"
        );
    }
}
