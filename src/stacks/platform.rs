// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! The platform stack: network, EKS cluster, load balancer controller
//! identity and the GitOps bootstrap.

use crate::config::StackConfig;
use crate::constants::{outputs, tokens};
use crate::error::Result;
use crate::graph::{Input, ResourceIntent, StackGraph, Transform};
use crate::kubernetes::manifests::service_account_subject;
use crate::network::{allocate_subnets, declare_subnets, subnet_ids, SubnetNaming};
use crate::stacks::gitops::{declare_bootstrap, ClusterResources};
use tracing::{info, instrument};

#[instrument(skip(config), fields(stack = %config.platform.stack_name))]
pub fn build(config: &StackConfig) -> Result<StackGraph> {
    let platform = &config.platform;
    let prefix = &platform.name_prefix;
    let mut graph = StackGraph::new(&platform.stack_name);

    let vpc = graph.add(
        ResourceIntent::new(tokens::VPC, format!("{}-vpc", prefix))
            .input("cidrBlock", platform.vpc_cidr.as_str()),
    )?;

    let igw = graph.add(
        ResourceIntent::new(tokens::INTERNET_GATEWAY, format!("{}-igw", prefix))
            .input("vpcId", vpc.id()),
    )?;

    let route_table = graph.add(
        ResourceIntent::new(tokens::ROUTE_TABLE, format!("{}-rt", prefix))
            .input("vpcId", vpc.id())
            .input(
                "routes",
                Input::list([Input::map([
                    ("cidrBlock", Input::string("0.0.0.0/0")),
                    ("gatewayId", igw.id()),
                ])]),
            ),
    )?;

    let allocations = allocate_subnets(&platform.subnet_cidrs, &platform.availability_zones)?;
    let subnet_prefix = format!("{}-subnet", prefix);
    let association_prefix = format!("{}-rt-association", prefix);
    let subnets = declare_subnets(
        &mut graph,
        SubnetNaming {
            subnet: &subnet_prefix,
            tag: &subnet_prefix,
            association: &association_prefix,
        },
        &vpc.id(),
        &route_table.id(),
        &allocations,
    )?;

    let sizing = &platform.cluster;
    let mut cluster = ResourceIntent::new(tokens::EKS_CLUSTER, sizing.name.as_str())
        .input("name", sizing.name.as_str())
        .input("vpcId", vpc.id())
        .input("privateSubnetIds", subnet_ids(&subnets))
        .input("endpointPublicAccess", true)
        .input("instanceType", sizing.instance_type.as_str())
        .input("desiredCapacity", sizing.desired_capacity)
        .input("minSize", sizing.min_size)
        .input("maxSize", sizing.max_size)
        .input(
            "providerCredentialOpts",
            Input::map([("profileName", Input::string(&sizing.profile_name))]),
        )
        .input("createOidcProvider", true)
        .secret_output("kubeconfig")
        .secret_output("kubeconfigJson");
    if let Some(version) = &sizing.version {
        cluster = cluster.input("version", version.as_str());
    }
    let cluster = graph.add(cluster)?;

    let gitops = &platform.gitops;
    let alb_role = graph.add(
        ResourceIntent::new(tokens::IAM_ROLE, "alb-role").input(
            "assumeRolePolicy",
            Input::apply(
                Transform::WebIdentityPolicy {
                    subject: service_account_subject(
                        &gitops.alb_namespace,
                        &gitops.alb_service_account,
                    ),
                },
                Input::map([
                    ("arn", cluster.output("oidcProviderArn")),
                    ("url", cluster.output("oidcProviderUrl")),
                ]),
            ),
        ),
    )?;

    let alb_policy = graph.add(
        ResourceIntent::new(tokens::IAM_POLICY, "alb-policy")
            .input("policy", platform.alb_policy.as_str())
            .depends_on(&alb_role),
    )?;

    graph.add(
        ResourceIntent::new(tokens::IAM_ROLE_POLICY_ATTACHMENT, "alb-role-attachment")
            .input("policyArn", alb_policy.arn())
            .input("role", alb_role.output("name")),
    )?;

    let provider = graph.add(
        ResourceIntent::new(tokens::KUBERNETES_PROVIDER, "kubernetes-provider")
            .input("kubeconfig", Input::secret(cluster.output("kubeconfigJson")))
            .input("enableServerSideApply", true)
            .depends_on(&cluster),
    )?;

    let bootstrap = declare_bootstrap(
        &mut graph,
        platform,
        &config.region,
        ClusterResources {
            vpc: &vpc,
            cluster: &cluster,
            alb_role: &alb_role,
            provider: &provider,
        },
    )?;

    graph.export(outputs::VPC_ID, vpc.id());
    graph.export(outputs::ROUTE_TABLE_ID, route_table.id());
    graph.export(outputs::PUBLIC_SUBNET_IDS, subnet_ids(&subnets));
    graph.export_secret(outputs::KUBECONFIG, cluster.output("kubeconfig"));
    graph.export_secret(
        outputs::BACKSTAGE_TOKEN,
        Input::apply(
            Transform::ServiceAccountToken,
            bootstrap.token_secret.output("data"),
        ),
    );
    graph.export(outputs::GITOPS_PLATFORM_ENDPOINT, cluster.output("endpoint"));

    info!(
        "Platform stack declares {} resources across {} availability zones",
        graph.len(),
        allocations.len()
    );
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InfraError;
    use crate::graph::{ResolveContext, ResourceOutputs};
    use crate::stack_ref::StackReferences;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn names<'a>(graph: &'a StackGraph) -> Vec<&'a str> {
        graph
            .apply_order()
            .unwrap()
            .into_iter()
            .map(|r| r.name.as_str())
            .collect()
    }

    #[test]
    fn test_one_subnet_per_zone() {
        let mut config = StackConfig::default();
        config.platform.subnet_cidrs = vec![
            "10.0.0.0/27".to_string(),
            "10.0.0.32/27".to_string(),
            "10.0.0.64/27".to_string(),
        ];
        config.platform.availability_zones = vec![
            "eu-central-1a".to_string(),
            "eu-central-1b".to_string(),
            "eu-central-1c".to_string(),
        ];

        let graph = build(&config).unwrap();

        assert_eq!(graph.count_of_type(tokens::SUBNET), 3);
        assert_eq!(graph.count_of_type(tokens::ROUTE_TABLE_ASSOCIATION), 3);
        let third = graph
            .resource("pulumi-backstage-flux-gitops-aws-subnet-2")
            .unwrap();
        assert_eq!(third.inputs["cidrBlock"], Input::string("10.0.0.64/27"));
        assert_eq!(third.inputs["availabilityZone"], Input::string("eu-central-1c"));
        assert!(graph
            .resource("pulumi-backstage-flux-gitops-aws-rt-association-eu-central-1c")
            .is_some());
    }

    #[test]
    fn test_mismatched_subnets_fail() {
        let mut config = StackConfig::default();
        config.platform.subnet_cidrs.pop();

        let err = build(&config).unwrap_err();
        assert!(matches!(err, InfraError::CidrZoneMismatch { cidrs: 1, zones: 2 }));
    }

    #[test]
    fn test_zero_zones() {
        let mut config = StackConfig::default();
        config.platform.subnet_cidrs.clear();
        config.platform.availability_zones.clear();

        let graph = build(&config).unwrap();

        assert_eq!(graph.count_of_type(tokens::SUBNET), 0);
        assert_eq!(graph.count_of_type(tokens::ROUTE_TABLE_ASSOCIATION), 0);
        assert_eq!(
            graph.exports()[outputs::PUBLIC_SUBNET_IDS].value,
            Input::List(vec![])
        );
    }

    #[test]
    fn test_network_applied_before_cluster() {
        let graph = build(&StackConfig::default()).unwrap();
        let order = names(&graph);

        assert_eq!(order[0], "pulumi-backstage-flux-gitops-aws-vpc");
        let position = |name: &str| order.iter().position(|n| *n == name).unwrap();
        assert!(
            position("pulumi-backstage-flux-gitops-aws-subnet-1")
                < position("pulumi-backstage-flux-gitops-aws")
        );
        assert!(position("pulumi-backstage-flux-gitops-aws") < position("kubernetes-provider"));
        assert!(position("alb-role") < position("alb-policy"));
        assert!(position("alb-policy") < position("alb-role-attachment"));
    }

    #[test]
    fn test_exports() {
        let graph = build(&StackConfig::default()).unwrap();
        let exports = graph.exports();

        let names: Vec<&str> = exports.keys().map(|k| k.as_str()).collect();
        assert_eq!(
            names,
            vec![
                outputs::BACKSTAGE_TOKEN,
                outputs::GITOPS_PLATFORM_ENDPOINT,
                outputs::KUBECONFIG,
                outputs::PUBLIC_SUBNET_IDS,
                outputs::ROUTE_TABLE_ID,
                outputs::VPC_ID,
            ]
        );
        assert!(exports[outputs::KUBECONFIG].secret);
        assert!(exports[outputs::BACKSTAGE_TOKEN].secret);
        assert!(!exports[outputs::VPC_ID].secret);
    }

    #[test]
    fn test_eks_version_only_when_configured() {
        let graph = build(&StackConfig::default()).unwrap();
        let cluster = graph.resource("pulumi-backstage-flux-gitops-aws").unwrap();
        assert!(!cluster.inputs.contains_key("version"));

        let mut config = StackConfig::default();
        config.platform.cluster.version = Some("1.29".to_string());
        let graph = build(&config).unwrap();
        let cluster = graph.resource("pulumi-backstage-flux-gitops-aws").unwrap();
        assert_eq!(cluster.inputs["version"], Input::string("1.29"));
    }

    #[test]
    fn test_backstage_token_export_is_decoded() {
        let graph = build(&StackConfig::default()).unwrap();
        let outputs_by_resource = ResourceOutputs::from([(
            "pulumi-backstage-flux-gitops-aws-backstage-token".to_string(),
            BTreeMap::from([(
                "data".to_string(),
                json!({"token": "ZXlKaGJHY2lPaS5iZWFyZXI=", "namespace": "ZGVmYXVsdA=="}),
            )]),
        )]);
        let stacks = StackReferences::default();
        let secrets: BTreeMap<String, String> = BTreeMap::new();
        let ctx = ResolveContext {
            graph: &graph,
            outputs: &outputs_by_resource,
            stacks: &stacks,
            secrets: &secrets,
        };

        let exports = ctx.resolve_exports().unwrap();
        let token = &exports[outputs::BACKSTAGE_TOKEN];
        assert_eq!(token.value, Some(json!("eyJhbGciOi.bearer")));
        assert!(token.secret);
        assert!(!exports[outputs::VPC_ID].is_known());
    }

    #[test]
    fn test_alb_role_trusts_controller_service_account() {
        let graph = build(&StackConfig::default()).unwrap();
        let role = graph.resource("alb-role").unwrap();

        let Input::Apply(Transform::WebIdentityPolicy { subject }, _) =
            &role.inputs["assumeRolePolicy"]
        else {
            panic!("expected web identity policy");
        };
        assert_eq!(
            subject,
            "system:serviceaccount:aws-lb-controller:aws-lb-controller-serviceaccount"
        );
        assert!(role.dependencies().contains("pulumi-backstage-flux-gitops-aws"));
    }
}
