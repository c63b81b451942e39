//! OAuth2 client-credentials grant against the gateway's token endpoint.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::auth::context::preview;
use crate::auth::error::AuthError;
use crate::config::GatewayConfig;
use crate::error::GatewayError;

/// A bearer token with its type and lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub token: String,
    #[serde(rename = "type", default = "default_token_type")]
    pub token_type: String,
    #[serde(rename = "expire_in", default)]
    pub expires_in_seconds: u64,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl AccessToken {
    /// Log-safe rendering of the token.
    pub fn preview(&self) -> String {
        preview(&self.token)
    }
}

/// Token endpoint reply.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[allow(dead_code)]
    #[serde(default)]
    scope: Option<String>,
}

/// Fetches service-level tokens with static client credentials.
///
/// Every call hits the token endpoint; tokens are not cached.
#[derive(Clone)]
pub struct ClientCredentialsAuthenticator {
    http: reqwest::Client,
    token_endpoint: Url,
    client_id: String,
    client_secret: String,
    scope: String,
}

impl ClientCredentialsAuthenticator {
    pub fn new(http: reqwest::Client, config: &GatewayConfig) -> Self {
        Self {
            http,
            token_endpoint: config.token_endpoint.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            scope: config.scope.clone(),
        }
    }

    pub fn token_endpoint(&self) -> &Url {
        &self.token_endpoint
    }

    /// Request a fresh service token.
    pub async fn fetch_service_token(&self) -> Result<AccessToken, AuthError> {
        debug!(endpoint = %self.token_endpoint, client_id = %self.client_id, "Requesting service token");

        let response = self
            .http
            .post(self.token_endpoint.clone())
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("grant_type", "client_credentials"),
                ("scope", self.scope.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AuthError::from(GatewayError::from_transport(&e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AuthError::from(GatewayError::from_transport(&e)))?;

        if !status.is_success() {
            return Err(AuthError::UpstreamRejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            AuthError::UpstreamAuthFailure(format!("malformed token response: {}", e))
        })?;

        let token = parsed
            .access_token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                AuthError::UpstreamAuthFailure("token response carried no access token".to_string())
            })?;

        let access = AccessToken {
            token,
            token_type: parsed.token_type.unwrap_or_else(default_token_type),
            expires_in_seconds: parsed.expires_in.unwrap_or(0),
        };
        info!(token = %access.preview(), expires_in = access.expires_in_seconds, "Service token obtained");
        Ok(access)
    }
}
