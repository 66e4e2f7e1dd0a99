// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Functions applied to resolved values at deploy time.

use crate::credentials::{decode_service_account_token, RegistryCredentials};
use crate::error::Result;
use crate::iam;
use crate::task_definition::{container_definitions_json, TaskSources};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transform {
    /// Base64 `data` of a service-account token secret to the bearer token
    ServiceAccountToken,
    /// `{token, server}` of a registry authorization to the
    /// `{server, username, password}` login
    RegistryCredentials,
    /// Encode the value as a JSON string
    Json,
    /// [`TaskSources`] to the `containerDefinitions` payload
    ContainerDefinitions,
    /// `{arn, url}` of an OIDC provider to a web-identity trust policy
    WebIdentityPolicy { subject: String },
    /// List of secret ARNs to a policy allowing to read them
    SecretsReadPolicy,
}

#[derive(Deserialize)]
struct RegistryAuthorization {
    token: String,
    server: String,
}

#[derive(Deserialize)]
struct OidcProvider {
    arn: String,
    url: String,
}

impl Transform {
    /// Whether the result must be treated as secret regardless of the input.
    pub fn yields_secret(&self) -> bool {
        matches!(
            self,
            Transform::ServiceAccountToken | Transform::RegistryCredentials
        )
    }

    pub fn apply(&self, value: Value) -> Result<Value> {
        match self {
            Transform::ServiceAccountToken => {
                let data: BTreeMap<String, String> = serde_json::from_value(value)?;
                Ok(Value::String(decode_service_account_token(&data)?))
            }
            Transform::RegistryCredentials => {
                let auth: RegistryAuthorization = serde_json::from_value(value)?;
                let credentials =
                    RegistryCredentials::from_authorization_token(&auth.token, &auth.server)?;
                Ok(serde_json::to_value(credentials)?)
            }
            Transform::Json => Ok(Value::String(serde_json::to_string(&value)?)),
            Transform::ContainerDefinitions => {
                let sources: TaskSources = serde_json::from_value(value)?;
                Ok(Value::String(container_definitions_json(&sources)?))
            }
            Transform::WebIdentityPolicy { subject } => {
                let provider: OidcProvider = serde_json::from_value(value)?;
                let doc =
                    iam::web_identity_assume_role_policy(&provider.arn, &provider.url, subject);
                Ok(Value::String(doc.to_json()?))
            }
            Transform::SecretsReadPolicy => {
                let arns: Vec<String> = serde_json::from_value(value)?;
                Ok(Value::String(iam::secrets_read_policy(arns).to_json()?))
            }
        }
    }
}
