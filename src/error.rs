// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InfraError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("{cidrs} subnet CIDR blocks configured for {zones} availability zones")]
    CidrZoneMismatch { cidrs: usize, zones: usize },

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Base64 decoding failed: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Decoded value is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Secret does not contain key '{0}'")]
    MissingSecretKey(String),

    #[error("Resource '{0}' is declared more than once")]
    DuplicateResource(String),

    #[error("Resource '{resource}' depends on undeclared resource '{dependency}'")]
    UnknownDependency { resource: String, dependency: String },

    #[error("Dependency cycle between resources: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),

    #[error("Stack '{stack}' does not export '{output}'")]
    MissingStackOutput { stack: String, output: String },

    #[error("Failed to resolve input: {0}")]
    Resolve(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Kubeconfig error: {0}")]
    KubeconfigError(String),

    #[error("Timed out waiting for token in secret {0}")]
    TokenTimeout(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, InfraError>;
