// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Container definition payload of the Backstage ECS task.
//!
//! Plain configuration goes into `environment`. Credentials are injected
//! through `secrets`, whose `valueFrom` names a Secrets Manager secret, so the
//! payload never carries a password or token.

use crate::constants::{BACKSTAGE_CONTAINER_NAME, BACKSTAGE_PORT};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Environment variable names seen by the Backstage container
pub mod env {
    pub const POSTGRES_HOST: &str = "POSTGRES_HOST";
    pub const POSTGRES_PORT: &str = "POSTGRES_PORT";
    pub const POSTGRES_USER: &str = "POSTGRES_USER";
    pub const POSTGRES_PASSWORD: &str = "POSTGRES_PASSWORD";
    pub const BACKSTAGE_BASE_URL: &str = "BACKSTAGE_BASE_URL";
    pub const WEBSITES_PORT: &str = "WEBSITES_PORT";
    pub const K8S_CLUSTER_URL: &str = "K8S_CLUSTER_URL";
    pub const K8S_CLUSTER_SA_TOKEN: &str = "K8S_CLUSTER_SA_TOKEN";
    pub const PULUMI_ACCESS_TOKEN: &str = "PULUMI_ACCESS_TOKEN";

    pub const ALL: &[&str] = &[
        POSTGRES_HOST,
        POSTGRES_PORT,
        POSTGRES_USER,
        POSTGRES_PASSWORD,
        BACKSTAGE_BASE_URL,
        WEBSITES_PORT,
        K8S_CLUSTER_URL,
        K8S_CLUSTER_SA_TOKEN,
        PULUMI_ACCESS_TOKEN,
    ];
}

pub const LOG_STREAM_PREFIX: &str = "backstage";

/// Values the container definition is assembled from, once resolved.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskSources {
    pub image: String,
    pub db_host: String,
    pub db_port: u16,
    pub db_user: String,
    pub load_balancer_dns: String,
    pub cluster_endpoint: String,
    pub log_group: String,
    pub region: String,
    /// ARN of the secret holding the database password
    pub db_password_secret: String,
    /// ARN of the secret holding the cluster service-account token
    pub cluster_token_secret: String,
    /// ARN of the secret holding the Pulumi access token
    pub access_token_secret: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContainerDefinition {
    pub name: String,
    pub image: String,
    pub essential: bool,
    pub environment: Vec<KeyValuePair>,
    pub secrets: Vec<SecretEnv>,
    pub log_configuration: LogConfiguration,
    pub port_mappings: Vec<PortMapping>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct KeyValuePair {
    pub name: String,
    pub value: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SecretEnv {
    pub name: String,
    pub value_from: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LogConfiguration {
    pub log_driver: String,
    pub options: BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PortMapping {
    pub container_port: u16,
    pub host_port: u16,
}

fn var(name: &str, value: impl Into<String>) -> KeyValuePair {
    KeyValuePair {
        name: name.to_string(),
        value: value.into(),
    }
}

fn secret(name: &str, value_from: &str) -> SecretEnv {
    SecretEnv {
        name: name.to_string(),
        value_from: value_from.to_string(),
    }
}

pub fn backstage_container(sources: &TaskSources) -> ContainerDefinition {
    ContainerDefinition {
        name: BACKSTAGE_CONTAINER_NAME.to_string(),
        image: sources.image.clone(),
        essential: true,
        environment: vec![
            var(env::POSTGRES_HOST, &sources.db_host),
            var(env::POSTGRES_PORT, sources.db_port.to_string()),
            var(env::POSTGRES_USER, &sources.db_user),
            var(
                env::BACKSTAGE_BASE_URL,
                format!("http://{}", sources.load_balancer_dns),
            ),
            var(env::WEBSITES_PORT, BACKSTAGE_PORT.to_string()),
            var(env::K8S_CLUSTER_URL, &sources.cluster_endpoint),
        ],
        secrets: vec![
            secret(env::POSTGRES_PASSWORD, &sources.db_password_secret),
            secret(env::K8S_CLUSTER_SA_TOKEN, &sources.cluster_token_secret),
            secret(env::PULUMI_ACCESS_TOKEN, &sources.access_token_secret),
        ],
        log_configuration: LogConfiguration {
            log_driver: "awslogs".to_string(),
            options: BTreeMap::from([
                ("awslogs-group".to_string(), sources.log_group.clone()),
                ("awslogs-region".to_string(), sources.region.clone()),
                (
                    "awslogs-stream-prefix".to_string(),
                    LOG_STREAM_PREFIX.to_string(),
                ),
            ]),
        },
        port_mappings: vec![PortMapping {
            container_port: BACKSTAGE_PORT,
            host_port: BACKSTAGE_PORT,
        }],
    }
}

/// The `containerDefinitions` JSON document of the task definition.
pub fn container_definitions_json(sources: &TaskSources) -> Result<String> {
    Ok(serde_json::to_string(&vec![backstage_container(sources)])?)
}

/// Every variable name the container will see, plain or secret.
pub fn variable_names(definition: &ContainerDefinition) -> BTreeSet<&str> {
    definition
        .environment
        .iter()
        .map(|v| v.name.as_str())
        .chain(definition.secrets.iter().map(|s| s.name.as_str()))
        .collect()
}
