// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Name of the platform (network, cluster and GitOps) stack
pub const PLATFORM_STACK: &str = "gitops-platform";
/// Name of the Backstage application stack
pub const BACKSTAGE_STACK: &str = "backstage";

/// Outputs exported by the platform stack and read by the application stack
pub mod outputs {
    pub const VPC_ID: &str = "vpc-id";
    pub const ROUTE_TABLE_ID: &str = "route-table-id";
    pub const PUBLIC_SUBNET_IDS: &str = "public-subnet-ids";
    pub const KUBECONFIG: &str = "kubeconfig";
    pub const GITOPS_PLATFORM_ENDPOINT: &str = "gitops-platform-endpoint";
    pub const BACKSTAGE_TOKEN: &str = "backstage-token";
    pub const RDS: &str = "rds";
    pub const BACKSTAGE_IMAGE: &str = "backstage-image";
    pub const URL: &str = "url";
}

/// Kubernetes labels and annotations
pub mod labels {
    /// Lets the Backstage Kubernetes plugin find workloads of the cluster
    pub const BACKSTAGE_KUBERNETES_ID: &str = "backstage.io/kubernetes-id";
    pub const GITOPS_CLUSTER_ID: &str = "gitops-cluster";
    pub const SERVICE_ACCOUNT_NAME: &str = "kubernetes.io/service-account.name";
}

/// Provider type tokens understood by the provisioning engine
pub mod tokens {
    pub const VPC: &str = "aws:ec2/vpc:Vpc";
    pub const INTERNET_GATEWAY: &str = "aws:ec2/internetGateway:InternetGateway";
    pub const ROUTE_TABLE: &str = "aws:ec2/routeTable:RouteTable";
    pub const SUBNET: &str = "aws:ec2/subnet:Subnet";
    pub const ROUTE_TABLE_ASSOCIATION: &str = "aws:ec2/routeTableAssociation:RouteTableAssociation";
    pub const SECURITY_GROUP: &str = "aws:ec2/securityGroup:SecurityGroup";
    pub const EKS_CLUSTER: &str = "eks:index:Cluster";
    pub const IAM_ROLE: &str = "aws:iam/role:Role";
    pub const IAM_POLICY: &str = "aws:iam/policy:Policy";
    pub const IAM_ROLE_POLICY_ATTACHMENT: &str =
        "aws:iam/rolePolicyAttachment:RolePolicyAttachment";
    pub const LOAD_BALANCER: &str = "aws:alb/loadBalancer:LoadBalancer";
    pub const TARGET_GROUP: &str = "aws:alb/targetGroup:TargetGroup";
    pub const LISTENER: &str = "aws:alb/listener:Listener";
    pub const DB_SUBNET_GROUP: &str = "aws:rds/subnetGroup:SubnetGroup";
    pub const DB_INSTANCE: &str = "aws:rds/instance:Instance";
    pub const ECR_REPOSITORY: &str = "aws:ecr/repository:Repository";
    pub const ECR_LIFECYCLE_POLICY: &str = "aws:ecr/lifecyclePolicy:LifecyclePolicy";
    pub const ECR_CREDENTIALS: &str = "aws:ecr/getCredentials:getCredentials";
    pub const DOCKER_IMAGE: &str = "docker:index/image:Image";
    pub const ECS_CLUSTER: &str = "aws:ecs/cluster:Cluster";
    pub const ECS_TASK_DEFINITION: &str = "aws:ecs/taskDefinition:TaskDefinition";
    pub const ECS_SERVICE: &str = "aws:ecs/service:Service";
    pub const LOG_GROUP: &str = "aws:cloudwatch/logGroup:LogGroup";
    pub const SECRETS_MANAGER_SECRET: &str = "aws:secretsmanager/secret:Secret";
    pub const SECRETS_MANAGER_SECRET_VERSION: &str =
        "aws:secretsmanager/secretVersion:SecretVersion";
    pub const KUBERNETES_PROVIDER: &str = "pulumi:providers:kubernetes";
    pub const HELM_RELEASE: &str = "kubernetes:helm.sh/v3:Release";
    pub const K8S_NAMESPACE: &str = "kubernetes:core/v1:Namespace";
    pub const K8S_SECRET: &str = "kubernetes:core/v1:Secret";
    pub const K8S_SERVICE_ACCOUNT: &str = "kubernetes:core/v1:ServiceAccount";
    pub const K8S_CLUSTER_ROLE_BINDING: &str =
        "kubernetes:rbac.authorization.k8s.io/v1:ClusterRoleBinding";
    pub const FLUX_GIT_REPOSITORY: &str = "kubernetes:source.toolkit.fluxcd.io/v1:GitRepository";
    pub const FLUX_KUSTOMIZATION: &str = "kubernetes:kustomize.toolkit.fluxcd.io/v1:Kustomization";
}

/// Key holding the bearer token in a service-account token secret
pub const SERVICE_ACCOUNT_TOKEN_KEY: &str = "token";

/// Port the Backstage backend listens on inside the container
pub const BACKSTAGE_PORT: u16 = 7007;

/// Name of the single container in the Backstage task definition
pub const BACKSTAGE_CONTAINER_NAME: &str = "app-first-task";

/// Placeholder rendered for values that are only known after apply
pub const COMPUTED_PLACEHOLDER: &str = "<computed>";
/// Placeholder rendered for secret values
pub const SECRET_PLACEHOLDER: &str = "[secret]";

/// Token secret polling configuration
pub mod token {
    /// Default time to wait for the token controller to fill the secret
    pub const WAIT_TIMEOUT_SECS: u64 = 60;
    pub const POLL_INTERVAL_MILLIS: u64 = 500;
    pub const POLL_MAX_INTERVAL_MILLIS: u64 = 8_000;
}
