// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! The Backstage application stack. Runs Backstage on Fargate behind an
//! application load balancer, next to the network of the platform stack.

use crate::config::StackConfig;
use crate::constants::{outputs, tokens, BACKSTAGE_CONTAINER_NAME, BACKSTAGE_PORT};
use crate::error::Result;
use crate::graph::{Input, ResourceHandle, ResourceIntent, StackGraph, Transform};
use crate::iam;
use crate::network::{allocate_subnets, declare_subnets, subnet_ids, SubnetNaming};
use crate::stack_ref::StackReference;
use tracing::{debug, info, instrument};

const ANYWHERE: &str = "0.0.0.0/0";

fn rule(protocol: &str, from_port: i64, to_port: i64) -> Input {
    Input::map([
        ("protocol", Input::string(protocol)),
        ("fromPort", Input::from(from_port)),
        ("toPort", Input::from(to_port)),
        ("cidrBlocks", Input::list([Input::string(ANYWHERE)])),
    ])
}

fn all_traffic() -> Input {
    rule("-1", 0, 0)
}

/// A Secrets Manager secret with a single version holding `value`.
fn declare_secret(
    graph: &mut StackGraph,
    name: &str,
    value: Input,
) -> Result<(ResourceHandle, ResourceHandle)> {
    let secret = graph.add(ResourceIntent::new(tokens::SECRETS_MANAGER_SECRET, name))?;
    let version = graph.add(
        ResourceIntent::new(
            tokens::SECRETS_MANAGER_SECRET_VERSION,
            format!("{}-version", name),
        )
        .input("secretId", secret.id())
        .input("secretString", Input::secret(value)),
    )?;
    Ok((secret, version))
}

#[instrument(skip(config), fields(stack = %config.backstage.stack_name))]
pub fn build(config: &StackConfig) -> Result<StackGraph> {
    let app = &config.backstage;
    let prefix = &app.name_prefix;
    let mut graph = StackGraph::new(&app.stack_name);

    let infra = StackReference::new(&app.infra_stack_ref);
    debug!("Reading platform outputs from stack '{}'", infra.name());
    let vpc_id = infra.output(outputs::VPC_ID);

    let security_group = graph.add(
        ResourceIntent::new(tokens::SECURITY_GROUP, format!("{}-aws-sg", prefix))
            .input("vpcId", vpc_id.clone())
            .input("ingress", Input::list([rule("tcp", 80, 80), rule("tcp", 5432, 5432)]))
            .input("egress", Input::list([all_traffic()])),
    )?;

    let allocations = allocate_subnets(&app.subnet_cidrs, &app.availability_zones)?;
    let subnet_prefix = format!("{}-aws-fargate-subnet", prefix);
    let tag_prefix = format!("{}-aws-subnet-fargate", prefix);
    let association_prefix = format!("{}-aws-rt-association", prefix);
    let subnets = declare_subnets(
        &mut graph,
        SubnetNaming {
            subnet: &subnet_prefix,
            tag: &tag_prefix,
            association: &association_prefix,
        },
        &vpc_id,
        &infra.output(outputs::ROUTE_TABLE_ID),
        &allocations,
    )?;

    let load_balancer = graph.add(
        ResourceIntent::new(tokens::LOAD_BALANCER, format!("{}-aws-alb", prefix))
            .input("subnets", subnet_ids(&subnets))
            .input("loadBalancerType", "application")
            .input("securityGroups", Input::list([security_group.id()]))
            .input("name", prefix.as_str()),
    )?;

    let target_group = graph.add(
        ResourceIntent::new(
            tokens::TARGET_GROUP,
            format!("{}-aws-alb-target-group", prefix),
        )
        .input("port", 80i64)
        .input("protocol", "HTTP")
        .input("targetType", "ip")
        .input("name", prefix.as_str())
        .input("vpcId", vpc_id.clone()),
    )?;

    let listener = graph.add(
        ResourceIntent::new(tokens::LISTENER, format!("{}-aws-alb-listener", prefix))
            .input("loadBalancerArn", load_balancer.arn())
            .input("port", 80i64)
            .input("protocol", "HTTP")
            .input(
                "defaultActions",
                Input::list([Input::map([
                    ("type", Input::string("forward")),
                    ("targetGroupArn", target_group.arn()),
                ])]),
            ),
    )?;

    let database = &app.database;
    let db_password = Input::ConfigSecret(database.password_key.clone());
    let subnet_group = graph.add(
        ResourceIntent::new(
            tokens::DB_SUBNET_GROUP,
            format!("{}-aws-rds-subnet-group", prefix),
        )
        .input("subnetIds", subnet_ids(&subnets)),
    )?;

    let rds = graph.add(
        ResourceIntent::new(tokens::DB_INSTANCE, format!("{}-aws-rds", prefix))
            .input("allocatedStorage", database.allocated_storage)
            .input("instanceClass", database.instance_class.as_str())
            .input("engine", database.engine.as_str())
            .input("engineVersion", database.engine_version.as_str())
            .input("username", database.username.as_str())
            .input("password", db_password.clone())
            .input("publiclyAccessible", false)
            .input("dbSubnetGroupName", subnet_group.output("name"))
            .input("multiAz", database.multi_az)
            .input("skipFinalSnapshot", true)
            .input("vpcSecurityGroupIds", Input::list([security_group.id()])),
    )?;

    let image = &app.image;
    let repository = graph.add(
        ResourceIntent::new(tokens::ECR_REPOSITORY, format!("{}-repository", prefix))
            .input("name", image.repository.as_str())
            .input("forceDelete", true),
    )?;

    graph.add(
        ResourceIntent::new(
            tokens::ECR_LIFECYCLE_POLICY,
            format!("{}-lifecycle-policy", prefix),
        )
        .input("repository", repository.output("name"))
        .input(
            "policy",
            Input::apply(
                Transform::Json,
                Input::from_serialize(&iam::keep_last_images(image.keep_images))?,
            ),
        ),
    )?;

    let registry = graph.add(
        ResourceIntent::read(
            tokens::ECR_CREDENTIALS,
            format!("{}-registry-credentials", prefix),
        )
        .input("registryId", repository.output("registryId"))
        .secret_output("authorizationToken"),
    )?;

    let backstage_image = graph.add(
        ResourceIntent::new(tokens::DOCKER_IMAGE, format!("{}-image", prefix))
            .input(
                "build",
                Input::map([
                    ("context", Input::string(&image.context)),
                    ("platform", Input::string(&image.platform)),
                    ("builderVersion", Input::string("BuilderBuildKit")),
                    ("dockerfile", Input::string(&image.dockerfile)),
                ]),
            )
            .input("imageName", repository.output("repositoryUrl"))
            .input(
                "registry",
                Input::apply(
                    Transform::RegistryCredentials,
                    Input::map([
                        ("token", registry.output("authorizationToken")),
                        ("server", registry.output("proxyEndpoint")),
                    ]),
                ),
            ),
    )?;

    let ecs_assume_role = iam::service_assume_role_policy(iam::ECS_TASKS_SERVICE).to_json()?;

    let task_role = graph.add(
        ResourceIntent::new(tokens::IAM_ROLE, format!("{}-ecs-role", prefix))
            .input("assumeRolePolicy", ecs_assume_role.as_str()),
    )?;
    let task_policy = graph.add(
        ResourceIntent::new(tokens::IAM_POLICY, format!("{}-ecs-policy", prefix))
            .input("policy", iam::backstage_task_policy().to_json()?),
    )?;
    graph.add(
        ResourceIntent::new(
            tokens::IAM_ROLE_POLICY_ATTACHMENT,
            format!("{}-ecs-role-policy-attachment", prefix),
        )
        .input("policyArn", task_policy.arn())
        .input("role", task_role.output("name")),
    )?;

    let execution_role = graph.add(
        ResourceIntent::new(
            tokens::IAM_ROLE,
            format!("{}-ecs-task-execution-role", prefix),
        )
        .input("assumeRolePolicy", ecs_assume_role.as_str()),
    )?;
    graph.add(
        ResourceIntent::new(
            tokens::IAM_ROLE_POLICY_ATTACHMENT,
            format!("{}-ecs-task-execution-role-policy-attachment", prefix),
        )
        .input("policyArn", iam::ECS_TASK_EXECUTION_POLICY_ARN)
        .input("role", execution_role.output("name")),
    )?;

    let (db_password_secret, db_password_version) =
        declare_secret(&mut graph, &format!("{}-db-password", prefix), db_password)?;
    let (cluster_token_secret, cluster_token_version) = declare_secret(
        &mut graph,
        &format!("{}-cluster-token", prefix),
        infra.secret_output(outputs::BACKSTAGE_TOKEN),
    )?;
    let (access_token_secret, access_token_version) = declare_secret(
        &mut graph,
        &format!("{}-access-token", prefix),
        Input::ConfigSecret(app.access_token_key.clone()),
    )?;

    let secrets_policy = graph.add(
        ResourceIntent::new(
            tokens::IAM_POLICY,
            format!("{}-ecs-task-execution-secrets-policy", prefix),
        )
        .input(
            "policy",
            Input::apply(
                Transform::SecretsReadPolicy,
                Input::list([
                    db_password_secret.arn(),
                    cluster_token_secret.arn(),
                    access_token_secret.arn(),
                ]),
            ),
        ),
    )?;
    graph.add(
        ResourceIntent::new(
            tokens::IAM_ROLE_POLICY_ATTACHMENT,
            format!("{}-ecs-task-execution-secrets-policy-attachment", prefix),
        )
        .input("policyArn", secrets_policy.arn())
        .input("role", execution_role.output("name")),
    )?;

    let task = &app.task;
    let ecs_cluster = graph.add(
        ResourceIntent::new(tokens::ECS_CLUSTER, format!("{}-ecs-cluster", prefix))
            .input("name", task.cluster_name.as_str()),
    )?;

    let log_group = graph.add(
        ResourceIntent::new(tokens::LOG_GROUP, format!("{}-log-group", prefix))
            .input("name", task.log_group.as_str())
            .input("retentionInDays", task.log_retention_days),
    )?;

    let task_sources = Input::map([
        ("image", backstage_image.output("imageName")),
        ("dbHost", rds.output("address")),
        ("dbPort", rds.output("port")),
        ("dbUser", Input::string(&database.username)),
        ("loadBalancerDns", load_balancer.output("dnsName")),
        ("clusterEndpoint", infra.output(outputs::GITOPS_PLATFORM_ENDPOINT)),
        ("logGroup", log_group.output("name")),
        ("region", Input::string(&config.region)),
        ("dbPasswordSecret", db_password_secret.arn()),
        ("clusterTokenSecret", cluster_token_secret.arn()),
        ("accessTokenSecret", access_token_secret.arn()),
    ]);

    let task_definition = graph.add(
        ResourceIntent::new(tokens::ECS_TASK_DEFINITION, format!("{}-ecs-task", prefix))
            .input("family", task.family.as_str())
            .input(
                "ephemeralStorage",
                Input::map([("sizeInGib", Input::from(task.ephemeral_storage_gib))]),
            )
            .input(
                "containerDefinitions",
                Input::apply(Transform::ContainerDefinitions, task_sources),
            )
            .input("requiresCompatibilities", Input::list([Input::string("FARGATE")]))
            .input("networkMode", "awsvpc")
            .input("memory", task.memory.as_str())
            .input("cpu", task.cpu.as_str())
            .input("executionRoleArn", execution_role.arn())
            .input("taskRoleArn", task_role.arn())
            .depends_on(&db_password_version)
            .depends_on(&cluster_token_version)
            .depends_on(&access_token_version),
    )?;

    let service_group = graph.add(
        ResourceIntent::new(
            tokens::SECURITY_GROUP,
            format!("{}-aws-fargate-service-sg", prefix),
        )
        .input("vpcId", vpc_id)
        .input("ingress", Input::list([all_traffic()]))
        .input("egress", Input::list([all_traffic()])),
    )?;

    graph.add(
        ResourceIntent::new(tokens::ECS_SERVICE, format!("{}-service", prefix))
            .input("cluster", ecs_cluster.arn())
            .input("taskDefinition", task_definition.arn())
            .input(
                "networkConfiguration",
                Input::map([
                    ("subnets", subnet_ids(&subnets)),
                    ("assignPublicIp", Input::from(true)),
                    ("securityGroups", Input::list([service_group.id()])),
                ]),
            )
            .input(
                "loadBalancers",
                Input::list([Input::map([
                    ("targetGroupArn", target_group.arn()),
                    ("containerName", Input::string(BACKSTAGE_CONTAINER_NAME)),
                    ("containerPort", Input::from(BACKSTAGE_PORT)),
                ])]),
            )
            .input("launchType", "FARGATE")
            .input("desiredCount", task.desired_count)
            .input("schedulingStrategy", "REPLICA")
            .depends_on(&listener),
    )?;

    graph.export(outputs::RDS, rds.output("endpoint"));
    graph.export(outputs::BACKSTAGE_IMAGE, backstage_image.output("repoDigest"));
    graph.export(outputs::URL, load_balancer.output("dnsName"));

    info!(
        "Backstage stack declares {} resources reading from '{}'",
        graph.len(),
        infra.name()
    );
    Ok(graph)
}
