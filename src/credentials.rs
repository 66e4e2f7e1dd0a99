// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Decoding of registry authorization tokens and service-account token secrets.

use crate::constants::SERVICE_ACCOUNT_TOKEN_KEY;
use crate::error::{InfraError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use std::collections::BTreeMap;

/// Login for a container registry, split from an ECR authorization token.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct RegistryCredentials {
    pub server: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryCredentials")
            .field("server", &self.server)
            .field("username", &self.username)
            .field("password", &"[secret]")
            .finish()
    }
}

impl RegistryCredentials {
    /// Decode a base64 `username:password` authorization token.
    pub fn from_authorization_token(token: &str, server: &str) -> Result<Self> {
        let (username, password) = split_user_pass(token)?;
        Ok(Self {
            server: server.to_string(),
            username,
            password,
        })
    }
}

/// Decode a base64 `username:password` pair. The decoded value must contain
/// exactly one colon.
fn split_user_pass(token: &str) -> Result<(String, String)> {
    let decoded = String::from_utf8(STANDARD.decode(token.trim())?)?;
    let parts: Vec<&str> = decoded.split(':').collect();
    match parts.as_slice() {
        [username, password] => Ok((username.to_string(), password.to_string())),
        _ => Err(InfraError::InvalidCredentials(format!(
            "expected 'username:password', found {} colon-separated parts",
            parts.len()
        ))),
    }
}

/// Decode the bearer token from the base64-encoded `data` of a
/// `kubernetes.io/service-account-token` secret.
pub fn decode_service_account_token(data: &BTreeMap<String, String>) -> Result<String> {
    let encoded = data
        .get(SERVICE_ACCOUNT_TOKEN_KEY)
        .ok_or_else(|| InfraError::MissingSecretKey(SERVICE_ACCOUNT_TOKEN_KEY.to_string()))?;
    Ok(String::from_utf8(STANDARD.decode(encoded)?)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_credentials_decode() {
        let creds =
            RegistryCredentials::from_authorization_token("dXNlcjpwYXNz", "https://ecr.example")
                .unwrap();

        assert_eq!(creds.username, "user");
        assert_eq!(creds.password, "pass");
        assert_eq!(creds.server, "https://ecr.example");
    }

    #[test]
    fn test_registry_credentials_without_colon_fail() {
        // base64("userpass")
        let err = RegistryCredentials::from_authorization_token("dXNlcnBhc3M=", "server")
            .unwrap_err();
        assert!(matches!(err, InfraError::InvalidCredentials(_)));
    }

    #[test]
    fn test_registry_credentials_with_two_colons_fail() {
        // base64("user:pa:ss")
        let err = RegistryCredentials::from_authorization_token("dXNlcjpwYTpzcw==", "server")
            .unwrap_err();
        assert!(matches!(err, InfraError::InvalidCredentials(_)));
    }

    #[test]
    fn test_registry_credentials_invalid_base64() {
        let err =
            RegistryCredentials::from_authorization_token("not base64!", "server").unwrap_err();
        assert!(matches!(err, InfraError::Base64(_)));
    }

    #[test]
    fn test_debug_hides_password() {
        let creds = RegistryCredentials::from_authorization_token("dXNlcjpwYXNz", "s").unwrap();
        assert!(!format!("{:?}", creds).contains("pass\""));
    }

    #[test]
    fn test_decode_service_account_token() {
        // base64("eyJhbGciOi.bearer")
        let data = BTreeMap::from([
            ("token".to_string(), "ZXlKaGJHY2lPaS5iZWFyZXI=".to_string()),
            ("namespace".to_string(), "ZGVmYXVsdA==".to_string()),
        ]);

        assert_eq!(
            decode_service_account_token(&data).unwrap(),
            "eyJhbGciOi.bearer"
        );
    }

    #[test]
    fn test_decode_service_account_token_missing_key() {
        let data = BTreeMap::from([("ca.crt".to_string(), "Y2E=".to_string())]);
        let err = decode_service_account_token(&data).unwrap_err();
        assert!(matches!(err, InfraError::MissingSecretKey(k) if k == "token"));
    }
}
