// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Client creation for the platform cluster from the recorded kubeconfig output.

use crate::constants::outputs;
use crate::error::{InfraError, Result};
use crate::stack_ref::StackOutputs;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Client;
use serde_json::Value;
use tracing::{debug, info, instrument};

/// Client for the cluster of the platform stack. Uses the stack's `kubeconfig`
/// output when it has been recorded, the ambient configuration otherwise.
#[instrument(skip(platform))]
pub async fn create_platform_client(platform: Option<&StackOutputs>) -> Result<Client> {
    let kubeconfig = platform
        .and_then(|p| p.get(outputs::KUBECONFIG))
        .and_then(|output| output.known_value());
    match kubeconfig {
        Some(kubeconfig) => {
            info!("Connecting with the recorded platform kubeconfig");
            create_client_from_kubeconfig(parse_kubeconfig(kubeconfig)?).await
        }
        None => {
            debug!("No recorded kubeconfig, falling back to the default client");
            Ok(Client::try_default().await?)
        }
    }
}

/// The kubeconfig output is either a YAML/JSON document or an already
/// structured object.
pub fn parse_kubeconfig(value: &Value) -> Result<Kubeconfig> {
    match value {
        Value::String(document) => serde_yaml::from_str(document).map_err(|e| {
            InfraError::KubeconfigError(format!("Failed to parse kubeconfig: {}", e))
        }),
        other => serde_json::from_value(other.clone()).map_err(|e| {
            InfraError::KubeconfigError(format!("Failed to parse kubeconfig: {}", e))
        }),
    }
}

async fn create_client_from_kubeconfig(kubeconfig: Kubeconfig) -> Result<Client> {
    let client_config =
        kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|e| InfraError::KubeconfigError(format!("Failed to create config: {}", e)))?;

    Client::try_from(client_config)
        .map_err(|e| InfraError::KubeconfigError(format!("Failed to create client: {}", e)))
}
