// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::{BACKSTAGE_STACK, PLATFORM_STACK};
use crate::error::{InfraError, Result};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use url::Url;

/// IAM policy of the AWS load balancer controller, used unless
/// `platform.albPolicyPath` points at another document.
pub const DEFAULT_ALB_POLICY: &str = include_str!("../iam-policies/alb-iam-policy.json");

pub const DEFAULT_CONFIG_PATH: &str = "stacks.yaml";

/// Everything the stacks are built from. Secret values are never part of it;
/// only the keys under which they are supplied at deploy time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StackConfig {
    pub region: String,
    /// Directory holding the recorded state of each stack
    pub state_dir: PathBuf,
    pub platform: PlatformConfig,
    pub backstage: BackstageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlatformConfig {
    pub stack_name: String,
    /// Prefix of every logical resource name
    pub name_prefix: String,
    pub vpc_cidr: String,
    pub subnet_cidrs: Vec<String>,
    pub availability_zones: Vec<String>,
    pub cluster: ClusterConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alb_policy_path: Option<PathBuf>,
    /// Loaded from `alb_policy_path`
    #[serde(skip)]
    pub alb_policy: String,
    pub gitops: GitOpsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterConfig {
    pub name: String,
    /// Kubernetes version of the control plane; the provider default if unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub instance_type: String,
    pub desired_capacity: u32,
    pub min_size: u32,
    pub max_size: u32,
    /// AWS profile written into the generated kubeconfig
    pub profile_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GitOpsConfig {
    pub namespace: String,
    pub chart: String,
    pub chart_version: String,
    pub repository: GitRepositoryConfig,
    pub kustomization: KustomizationConfig,
    pub operator_namespace: String,
    /// Secret configuration key of the Pulumi access token
    pub access_token_key: String,
    pub service_account: String,
    pub service_account_namespace: String,
    pub alb_namespace: String,
    pub alb_service_account: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GitRepositoryConfig {
    pub name: String,
    pub url: String,
    pub branch: String,
    pub interval: String,
    pub timeout: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KustomizationConfig {
    pub name: String,
    pub path: String,
    pub interval: String,
    pub prune: bool,
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackstageConfig {
    pub stack_name: String,
    pub name_prefix: String,
    /// Name of the platform stack whose outputs are read
    pub infra_stack_ref: String,
    pub subnet_cidrs: Vec<String>,
    pub availability_zones: Vec<String>,
    pub database: DatabaseConfig,
    pub image: ImageConfig,
    pub task: TaskConfig,
    /// Secret configuration key of the Pulumi access token
    pub access_token_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseConfig {
    pub engine: String,
    pub engine_version: String,
    pub instance_class: String,
    pub allocated_storage: u32,
    pub username: String,
    /// Secret configuration key of the database password
    pub password_key: String,
    pub multi_az: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageConfig {
    pub repository: String,
    pub context: String,
    pub dockerfile: String,
    pub platform: String,
    /// Number of images the lifecycle policy keeps
    pub keep_images: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskConfig {
    pub family: String,
    pub cluster_name: String,
    pub cpu: String,
    pub memory: String,
    pub ephemeral_storage_gib: u32,
    pub desired_count: u32,
    pub log_group: String,
    pub log_retention_days: u32,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            region: "eu-central-1".to_string(),
            state_dir: PathBuf::from(".stacks"),
            platform: PlatformConfig::default(),
            backstage: BackstageConfig::default(),
        }
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            stack_name: PLATFORM_STACK.to_string(),
            name_prefix: "pulumi-backstage-flux-gitops-aws".to_string(),
            vpc_cidr: "10.0.0.0/24".to_string(),
            subnet_cidrs: strings(&["10.0.0.0/27", "10.0.0.32/27"]),
            availability_zones: strings(&["eu-central-1a", "eu-central-1b"]),
            cluster: ClusterConfig::default(),
            alb_policy_path: None,
            alb_policy: DEFAULT_ALB_POLICY.to_string(),
            gitops: GitOpsConfig::default(),
        }
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            name: "pulumi-backstage-flux-gitops-aws".to_string(),
            version: None,
            instance_type: "t3.medium".to_string(),
            desired_capacity: 2,
            min_size: 1,
            max_size: 3,
            profile_name: "default".to_string(),
        }
    }
}

impl Default for GitOpsConfig {
    fn default() -> Self {
        Self {
            namespace: "flux-system".to_string(),
            chart: "oci://ghcr.io/fluxcd-community/charts/flux2".to_string(),
            chart_version: "2.11.1".to_string(),
            repository: GitRepositoryConfig::default(),
            kustomization: KustomizationConfig::default(),
            operator_namespace: "pulumi-operator".to_string(),
            access_token_key: "pulumi-pat".to_string(),
            service_account: "backstage".to_string(),
            service_account_namespace: "default".to_string(),
            alb_namespace: "aws-lb-controller".to_string(),
            alb_service_account: "aws-lb-controller-serviceaccount".to_string(),
        }
    }
}

impl Default for GitRepositoryConfig {
    fn default() -> Self {
        Self {
            name: "bootstrap-repo".to_string(),
            url: "https://github.com/my-backstage-demo/pulumi-gitops-repo.git".to_string(),
            branch: "main".to_string(),
            interval: "1m".to_string(),
            timeout: "60s".to_string(),
        }
    }
}

impl Default for KustomizationConfig {
    fn default() -> Self {
        Self {
            name: "bootstrap-kustomization".to_string(),
            path: "./flux/clusters/aws-gitops-platform".to_string(),
            interval: "1m".to_string(),
            prune: true,
            force: false,
        }
    }
}

impl Default for BackstageConfig {
    fn default() -> Self {
        Self {
            stack_name: BACKSTAGE_STACK.to_string(),
            name_prefix: "pulumi-backstage".to_string(),
            infra_stack_ref: PLATFORM_STACK.to_string(),
            subnet_cidrs: strings(&["10.0.0.64/27", "10.0.0.128/27"]),
            availability_zones: strings(&["eu-central-1a", "eu-central-1b"]),
            database: DatabaseConfig::default(),
            image: ImageConfig::default(),
            task: TaskConfig::default(),
            access_token_key: "pulumi-pat".to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            engine: "postgres".to_string(),
            engine_version: "15.4".to_string(),
            instance_class: "db.t3.micro".to_string(),
            allocated_storage: 5,
            username: "backstage".to_string(),
            password_key: "db-password".to_string(),
            multi_az: true,
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            repository: "backstage".to_string(),
            context: "./backstage".to_string(),
            dockerfile: "./backstage/packages/backend/Dockerfile".to_string(),
            platform: "linux/amd64".to_string(),
            keep_images: 10,
        }
    }
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            family: "backstage".to_string(),
            cluster_name: "backstage".to_string(),
            cpu: "2048".to_string(),
            memory: "6144".to_string(),
            ephemeral_storage_gib: 100,
            desired_count: 1,
            log_group: "backstage-log".to_string(),
            log_retention_days: 7,
        }
    }
}

impl StackConfig {
    /// Load configuration from `path` (optional, defaults otherwise), apply
    /// environment overrides and validate the result.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path).with_context(|| {
            format!("Failed to load stack configuration from {}", path.display())
        })?;

        config.apply_env_overrides();
        config.validate().context("Invalid stack configuration")?;
        Ok(config)
    }

    /// `AWS_REGION`, `EKS_VERSION` and `INFRA_STACK_REF` win over the file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(region) = env::var("AWS_REGION") {
            debug!("Region overridden from environment: {}", region);
            self.region = region;
        }
        if let Ok(version) = env::var("EKS_VERSION") {
            self.platform.cluster.version = Some(version);
        }
        if let Ok(stack_ref) = env::var("INFRA_STACK_REF") {
            self.backstage.infra_stack_ref = stack_ref;
        }
    }

    /// Read `path` if it exists, otherwise start from the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            info!("Reading stack configuration from {}", path.display());
            Self::from_yaml_str(&fs::read_to_string(path)?)?
        } else {
            debug!("{} not found, using default configuration", path.display());
            Self::default()
        };

        if let Some(policy_path) = &config.platform.alb_policy_path {
            config.platform.alb_policy = fs::read_to_string(policy_path).map_err(|e| {
                InfraError::Config(format!(
                    "cannot read ALB policy {}: {}",
                    policy_path.display(),
                    e
                ))
            })?;
        }

        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Check the configuration before any stack is built from it.
    pub fn validate(&self) -> Result<()> {
        check_subnets(
            "platform",
            &self.platform.subnet_cidrs,
            &self.platform.availability_zones,
        )?;
        check_subnets(
            "backstage",
            &self.backstage.subnet_cidrs,
            &self.backstage.availability_zones,
        )?;

        let cluster = &self.platform.cluster;
        if cluster.min_size > cluster.desired_capacity
            || cluster.desired_capacity > cluster.max_size
        {
            return Err(InfraError::Config(format!(
                "cluster sizing must satisfy min <= desired <= max, got {} <= {} <= {}",
                cluster.min_size, cluster.desired_capacity, cluster.max_size
            )));
        }

        let gitops = &self.platform.gitops;
        check_url("gitops.repository.url", &gitops.repository.url, &["https", "ssh", "http"])?;
        check_url("gitops.chart", &gitops.chart, &["oci", "https"])?;
        check_duration("gitops.repository.interval", &gitops.repository.interval)?;
        check_duration("gitops.repository.timeout", &gitops.repository.timeout)?;
        check_duration("gitops.kustomization.interval", &gitops.kustomization.interval)?;

        serde_json::from_str::<serde_json::Value>(&self.platform.alb_policy)
            .map_err(|e| InfraError::Config(format!("ALB policy is not valid JSON: {}", e)))?;

        Ok(())
    }
}

fn check_subnets(stack: &str, cidrs: &[String], zones: &[String]) -> Result<()> {
    if cidrs.len() != zones.len() {
        return Err(InfraError::CidrZoneMismatch {
            cidrs: cidrs.len(),
            zones: zones.len(),
        });
    }
    debug!("{} stack spreads over {} availability zones", stack, zones.len());
    Ok(())
}

fn check_url(field: &str, value: &str, schemes: &[&str]) -> Result<()> {
    let url = Url::parse(value)
        .map_err(|e| InfraError::Config(format!("{} '{}' is not a URL: {}", field, value, e)))?;
    if !schemes.contains(&url.scheme()) {
        return Err(InfraError::Config(format!(
            "{} must use one of {:?}, got '{}'",
            field,
            schemes,
            url.scheme()
        )));
    }
    Ok(())
}

/// Flux durations: a number followed by `s`, `m` or `h`, possibly repeated (`1h30m`).
fn check_duration(field: &str, value: &str) -> Result<()> {
    let mut digits = 0;
    let mut units = 0;
    for c in value.chars() {
        match c {
            '0'..='9' => digits += 1,
            's' | 'm' | 'h' if digits > 0 => {
                digits = 0;
                units += 1;
            }
            _ => {
                return Err(InfraError::Config(format!(
                    "{} '{}' is not a duration",
                    field, value
                )))
            }
        }
    }
    if units == 0 || digits > 0 {
        return Err(InfraError::Config(format!(
            "{} '{}' is not a duration",
            field, value
        )));
    }
    Ok(())
}
