// Core modules
pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod normalizer;
pub mod services;

// Re-export key types and functions
pub use api::{AppState, SharedState, create_router};
pub use auth::{AuthError, TokenClaims, TokenContext, TokenError, UserAuthenticator};
pub use client::{RequestDescriptor, RequestDispatcher, RetryPolicy};
pub use config::{GatewayConfig, load_gateway_config};
pub use envelope::ResponseEnvelope;
pub use error::GatewayError;
pub use normalizer::ExpectedShape;

use anyhow::Result;
use auth::ClientCredentialsAuthenticator;
use client::build_token_client;
use services::OrganisationClient;
use std::sync::Arc;

/// Convenience function to build the shared state behind the HTTP surface.
///
/// One gateway client is shared by the dispatcher and the user
/// authenticator; the token endpoint gets its own client without the
/// gateway's static headers.
pub fn create_app_state(config: &GatewayConfig) -> Result<SharedState> {
    let dispatcher = RequestDispatcher::from_config(config)?;

    let service_tokens = ClientCredentialsAuthenticator::new(build_token_client(config)?, config);
    let users = UserAuthenticator::new(dispatcher.http_client().clone(), service_tokens, config);
    let organisations = OrganisationClient::new(dispatcher.clone());

    Ok(Arc::new(AppState {
        dispatcher,
        users,
        organisations,
    }))
}
