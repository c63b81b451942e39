//! User login and registration through the gateway's auth service.
//!
//! Both flows first obtain a service token with the client-credentials grant
//! and then call the auth service bearing it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::auth::client_credentials::{AccessToken, ClientCredentialsAuthenticator};
use crate::auth::error::AuthError;
use crate::client::join_url;
use crate::client::retry::{Outcome, RetryPolicy};
use crate::config::GatewayConfig;
use crate::envelope::ResponseEnvelope;
use crate::error::GatewayError;
use crate::normalizer::{ExpectedShape, decode_body, empty_value_for, is_blank};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub phone_number_verified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: AccessToken,
    #[serde(default)]
    pub user: UserProfile,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// Login and registration client.
///
/// A successful login stores the session token as the process's current user
/// token. That token is independent of any inbound request's bearer.
pub struct UserAuthenticator {
    http: reqwest::Client,
    service_tokens: ClientCredentialsAuthenticator,
    base_url: String,
    login_path: String,
    register_path: String,
    login_retry: RetryPolicy,
    register_retry: RetryPolicy,
    session_token: RwLock<Option<String>>,
}

impl UserAuthenticator {
    /// `http` is the gateway client (static headers applied); the service
    /// token authenticator brings its own.
    pub fn new(
        http: reqwest::Client,
        service_tokens: ClientCredentialsAuthenticator,
        config: &GatewayConfig,
    ) -> Self {
        Self {
            http,
            service_tokens,
            base_url: config.base_url.as_str().to_string(),
            login_path: config.login_path.clone(),
            register_path: config.register_path.clone(),
            login_retry: config.dispatcher_retry,
            register_retry: config.register_retry,
            session_token: RwLock::new(None),
        }
    }

    pub fn service_tokens(&self) -> &ClientCredentialsAuthenticator {
        &self.service_tokens
    }

    /// Exchange user credentials for a session.
    ///
    /// 5xx replies and transient transport failures are retried with the
    /// dispatcher budget; a 4xx from the login endpoint is
    /// [`AuthError::InvalidCredentials`].
    pub async fn login(&self, credentials: &LoginRequest) -> Result<LoginResponse, AuthError> {
        info!(username = %credentials.username, "Logging in");

        let result = self
            .login_retry
            .run("login", |_| async move {
                Outcome::classify(self.login_once(credentials).await, AuthError::is_transient)
            })
            .await;

        match result {
            Ok(response) => {
                *self.session_token.write().await = Some(response.access_token.token.clone());
                info!(
                    username = %credentials.username,
                    token = %response.access_token.preview(),
                    roles = response.roles.len(),
                    "Login succeeded"
                );
                Ok(response)
            }
            Err(failure) => {
                warn!(
                    username = %credentials.username,
                    attempts = failure.attempts,
                    error = %failure.error,
                    "Login failed"
                );
                Err(failure.error)
            }
        }
    }

    async fn login_once(&self, credentials: &LoginRequest) -> Result<LoginResponse, AuthError> {
        let service = self.service_tokens.fetch_service_token().await?;

        let (_, body) = self
            .post_bearer(&self.login_path, &service.token, credentials)
            .await
            .map_err(|err| match err {
                GatewayError::UpstreamRejection { status, body, .. } if status < 500 => {
                    AuthError::InvalidCredentials { status, body }
                }
                other => AuthError::from(other),
            })?;

        serde_json::from_slice(&body)
            .map_err(|e| AuthError::UpstreamAuthFailure(format!("malformed login response: {}", e)))
    }

    /// Register a new user. Never fails: every outcome is an envelope.
    ///
    /// Any non-2xx reply (from the token endpoint or the register endpoint)
    /// is retried up to the registration budget.
    pub async fn register(&self, registration: &RegisterRequest) -> ResponseEnvelope {
        info!(username = %registration.username, email = %registration.email, "Registering user");

        let result = self
            .register_retry
            .run("register", |attempt| async move {
                debug!(attempt, "Registration attempt");
                match self.register_once(registration).await {
                    Ok(created) => Outcome::Success(created),
                    Err(err @ AuthError::UpstreamRejected { .. }) => Outcome::RetryableFailure(err),
                    Err(err) => Outcome::TerminalFailure(err),
                }
            })
            .await;

        match result {
            Ok((status, data)) => {
                info!(username = %registration.username, status, "Registration succeeded");
                ResponseEnvelope::success(status, Some(data))
            }
            Err(failure) if failure.exhausted => {
                warn!(
                    username = %registration.username,
                    attempts = failure.attempts,
                    error = %failure.error,
                    "Registration retry budget exhausted"
                );
                ResponseEnvelope::new(
                    failure.error.status_code(),
                    format!(
                        "registration failed after {} attempts (retry budget exhausted): {}",
                        failure.attempts, failure.error
                    ),
                    None,
                )
            }
            Err(failure) => {
                error!(username = %registration.username, error = %failure.error, "Registration failed");
                ResponseEnvelope::new(500, format!("registration failed: {}", failure.error), None)
            }
        }
    }

    async fn register_once(&self, registration: &RegisterRequest) -> Result<(u16, Value), AuthError> {
        let service = self.service_tokens.fetch_service_token().await?;
        let (status, body) = self
            .post_bearer(&self.register_path, &service.token, registration)
            .await?;

        let data = if is_blank(&body) {
            empty_value_for(ExpectedShape::Mapping)
        } else {
            decode_body(ExpectedShape::Mapping, &body)?
        };
        Ok((status, data))
    }

    async fn post_bearer<B: Serialize + ?Sized>(
        &self,
        path: &str,
        bearer: &str,
        body: &B,
    ) -> Result<(u16, Vec<u8>), GatewayError> {
        let url = join_url(&self.base_url, path);
        let response = self
            .http
            .post(&url)
            .bearer_auth(bearer)
            .json(body)
            .send()
            .await
            .map_err(|e| GatewayError::from_transport(&e))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| GatewayError::from_transport(&e))?;

        if !status.is_success() {
            return Err(GatewayError::rejection(
                status,
                String::from_utf8_lossy(&bytes).into_owned(),
            ));
        }
        Ok((status.as_u16(), bytes.to_vec()))
    }

    pub async fn is_authenticated(&self) -> bool {
        self.session_token.read().await.is_some()
    }

    /// The session token of the last successful login.
    pub async fn auth_token(&self) -> Option<String> {
        self.session_token.read().await.clone()
    }

    pub async fn logout(&self) {
        *self.session_token.write().await = None;
    }
}
