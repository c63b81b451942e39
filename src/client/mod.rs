//! Outbound HTTP client for the gateway.
//!
//! - [`RequestDispatcher`]: one call, classified, retried and normalized
//!   into a [`ResponseEnvelope`](crate::ResponseEnvelope)
//! - [`OutboundTokenInjector`]: forwards the inbound bearer token
//! - [`RetryPolicy`]: bounded exponential backoff shared by all callers

pub mod dispatcher;
pub mod injector;
pub mod retry;

#[cfg(test)]
mod integration_tests;

pub use dispatcher::{RequestDescriptor, RequestDispatcher, method_requires_body};
pub use injector::{OutboundFilter, OutboundTokenInjector, RequestLogger};
pub use retry::{Outcome, RetryFailure, RetryPolicy};

use anyhow::{Context, Result};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};

use crate::config::GatewayConfig;

/// Default headers of every gateway call: JSON content negotiation plus the
/// configured static gateway headers.
pub fn gateway_headers(config: &GatewayConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    for (name, value) in &config.static_headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .with_context(|| format!("Invalid static header name: {}", name))?;
        let value = HeaderValue::from_str(value)
            .with_context(|| format!("Invalid value for static header {}", name))?;
        headers.insert(name, value);
    }

    Ok(headers)
}

/// Build the shared client used for every gateway call, carrying
/// [`gateway_headers`] and the configured timeouts.
pub fn build_gateway_client(config: &GatewayConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .default_headers(gateway_headers(config)?)
        .connect_timeout(config.connect_timeout)
        .read_timeout(config.read_timeout)
        .timeout(config.response_timeout)
        .build()
        .context("Failed to build gateway HTTP client")
}

/// Build the client used for the token endpoint: same timeouts, no gateway
/// headers.
pub fn build_token_client(config: &GatewayConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(config.connect_timeout)
        .read_timeout(config.read_timeout)
        .timeout(config.response_timeout)
        .build()
        .context("Failed to build token HTTP client")
}

/// Join a base URL and a request path with exactly one slash between them.
pub fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path.is_empty() {
        base.to_string()
    } else if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}
