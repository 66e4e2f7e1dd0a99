// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Live lookup of the service-account token the token controller writes
//! into a `kubernetes.io/service-account-token` secret.

use crate::constants::token::{POLL_INTERVAL_MILLIS, POLL_MAX_INTERVAL_MILLIS};
use crate::constants::SERVICE_ACCOUNT_TOKEN_KEY;
use crate::error::{InfraError, Result};
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{info, instrument, warn};

/// Wait until the secret `namespace/name` carries a token and return it.
/// Polls with exponential backoff and gives up after `timeout`.
#[instrument(skip(client))]
pub async fn wait_for_service_account_token(
    client: &Client,
    namespace: &str,
    name: &str,
    timeout: Duration,
) -> Result<String> {
    let secrets: Api<Secret> = Api::namespaced(client.clone(), namespace);
    let deadline = Instant::now() + timeout;
    let mut interval = Duration::from_millis(POLL_INTERVAL_MILLIS);

    loop {
        match read_token(&secrets, name).await {
            Ok(Some(token)) => {
                info!("Token secret {}/{} is populated", namespace, name);
                return Ok(token);
            }
            Ok(None) => {
                info!(
                    "Token secret {}/{} not yet populated, waiting {:?}...",
                    namespace, name, interval
                );
            }
            Err(e) => {
                warn!(
                    "Error reading token secret {}/{}: {}, retrying in {:?}...",
                    namespace, name, e, interval
                );
            }
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(InfraError::TokenTimeout(format!("{}/{}", namespace, name)));
        }
        sleep(interval.min(deadline - now)).await;

        interval = (interval * 2).min(Duration::from_millis(POLL_MAX_INTERVAL_MILLIS));
    }
}

/// The token, or `None` while the secret is missing or still empty.
async fn read_token(secrets: &Api<Secret>, name: &str) -> Result<Option<String>> {
    let Some(secret) = secrets.get_opt(name).await? else {
        return Ok(None);
    };

    let Some(token) = secret
        .data
        .as_ref()
        .and_then(|data| data.get(SERVICE_ACCOUNT_TOKEN_KEY))
    else {
        return Ok(None);
    };

    Ok(Some(String::from_utf8(token.0.clone())?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{secret_json, MockService};

    const PATH: &str = "/api/v1/namespaces/default/secrets/backstage-token";

    #[tokio::test]
    async fn test_returns_populated_token() {
        let client = MockService::new()
            .on_get(
                PATH,
                200,
                &secret_json("backstage-token", "default", &[("token", "eyJhbGciOi.bearer")]),
            )
            .into_client();

        let token = wait_for_service_account_token(
            &client,
            "default",
            "backstage-token",
            Duration::from_secs(1),
        )
        .await
        .unwrap();

        assert_eq!(token, "eyJhbGciOi.bearer");
    }

    #[tokio::test]
    async fn test_times_out_on_empty_secret() {
        let client = MockService::new()
            .on_get(PATH, 200, &secret_json("backstage-token", "default", &[]))
            .into_client();

        let err = wait_for_service_account_token(
            &client,
            "default",
            "backstage-token",
            Duration::from_millis(50),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            InfraError::TokenTimeout(secret) if secret == "default/backstage-token"
        ));
    }

    #[tokio::test]
    async fn test_times_out_on_missing_secret() {
        let client = MockService::new().into_client();

        let err = wait_for_service_account_token(
            &client,
            "default",
            "backstage-token",
            Duration::ZERO,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, InfraError::TokenTimeout(_)));
    }
}
