//! Send-and-normalize engine for gateway calls.
//!
//! Every call resolves to a [`ResponseEnvelope`]; no error escapes.

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::client::injector::{OutboundFilter, OutboundTokenInjector, RequestLogger};
use crate::client::retry::{Outcome, RetryPolicy};
use crate::client::{build_gateway_client, gateway_headers, join_url};
use crate::config::GatewayConfig;
use crate::envelope::{EMPTY_BODY_MESSAGE, ResponseEnvelope};
use crate::error::GatewayError;
use crate::normalizer::{ExpectedShape, decode_body, empty_value_for, is_blank};

/// One outbound call, described before it is sent.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub expected: ExpectedShape,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>, expected: ExpectedShape) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            expected,
        }
    }

    pub fn get(path: impl Into<String>, expected: ExpectedShape) -> Self {
        Self::new(Method::GET, path, expected)
    }

    pub fn delete(path: impl Into<String>, expected: ExpectedShape) -> Self {
        Self::new(Method::DELETE, path, expected)
    }

    pub fn post(path: impl Into<String>, body: Option<Value>, expected: ExpectedShape) -> Self {
        Self::new(Method::POST, path, expected).with_body(body)
    }

    pub fn put(path: impl Into<String>, body: Option<Value>, expected: ExpectedShape) -> Self {
        Self::new(Method::PUT, path, expected).with_body(body)
    }

    pub fn patch(path: impl Into<String>, body: Option<Value>, expected: ExpectedShape) -> Self {
        Self::new(Method::PATCH, path, expected).with_body(body)
    }

    pub fn with_body(mut self, body: Option<Value>) -> Self {
        self.body = body;
        self
    }
}

/// Whether a method must carry a request body.
pub fn method_requires_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

/// Dispatches requests to the gateway with filters, retry and normalization.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct RequestDispatcher {
    http: reqwest::Client,
    base_url: String,
    filters: Vec<Arc<dyn OutboundFilter>>,
    retry: RetryPolicy,
}

impl RequestDispatcher {
    /// A dispatcher with the bearer token injector installed.
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            filters: vec![Arc::new(OutboundTokenInjector)],
            retry,
        }
    }

    /// Build the gateway client and a dispatcher with the token injector and
    /// a request logger that knows the client's default headers.
    pub fn from_config(config: &GatewayConfig) -> anyhow::Result<Self> {
        let http = build_gateway_client(config)?;
        let logger = RequestLogger::new(gateway_headers(config)?);
        Ok(Self::new(http, config.base_url.as_str(), config.dispatcher_retry).with_filter(logger))
    }

    /// Append a filter; filters run in insertion order.
    pub fn with_filter(mut self, filter: impl OutboundFilter + 'static) -> Self {
        self.filters.push(Arc::new(filter));
        self
    }

    pub fn http_client(&self) -> &reqwest::Client {
        &self.http
    }

    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        expected: ExpectedShape,
    ) -> ResponseEnvelope {
        self.dispatch(RequestDescriptor::new(method, path, expected).with_body(body))
            .await
    }

    /// Like [`send`](Self::send) with a typed body.
    pub async fn send_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        expected: ExpectedShape,
    ) -> ResponseEnvelope {
        match serde_json::to_value(body) {
            Ok(value) => self.send(method, path, Some(value), expected).await,
            Err(e) => ResponseEnvelope::from_failure(
                &GatewayError::ValidationFailure(format!("request body is not serialisable: {}", e)),
                1,
            ),
        }
    }

    pub async fn dispatch(&self, descriptor: RequestDescriptor) -> ResponseEnvelope {
        if method_requires_body(&descriptor.method) && descriptor.body.is_none() {
            warn!(method = %descriptor.method, path = %descriptor.path, "Missing request body");
            return ResponseEnvelope::from_failure(
                &GatewayError::ValidationFailure(format!(
                    "a request body is required for {} {}",
                    descriptor.method, descriptor.path
                )),
                1,
            );
        }

        let url = join_url(&self.base_url, &descriptor.path);
        let operation = format!("{} {}", descriptor.method, descriptor.path);
        let descriptor = &descriptor;
        let url = url.as_str();

        let result = self
            .retry
            .run(&operation, |attempt| async move {
                debug!(method = %descriptor.method, url, attempt, "Dispatching request");
                let result = self.attempt(descriptor, url).await;
                Outcome::classify(result, GatewayError::is_transient)
            })
            .await;

        match result {
            Ok(envelope) => envelope,
            Err(failure) => {
                if matches!(failure.error, GatewayError::Transport { .. }) {
                    error!(
                        method = %descriptor.method,
                        url,
                        attempts = failure.attempts,
                        error = %failure.error,
                        "Gateway call failed"
                    );
                } else {
                    warn!(
                        method = %descriptor.method,
                        url,
                        attempts = failure.attempts,
                        status = failure.error.status_code(),
                        "Gateway call failed"
                    );
                }
                ResponseEnvelope::from_failure(&failure.error, failure.attempts)
            }
        }
    }

    /// One network exchange, classified into an envelope or an error.
    async fn attempt(
        &self,
        descriptor: &RequestDescriptor,
        url: &str,
    ) -> Result<ResponseEnvelope, GatewayError> {
        let mut builder = self.http.request(descriptor.method.clone(), url);
        if let Some(body) = &descriptor.body {
            builder = builder.json(body);
        }
        let mut request = builder
            .build()
            .map_err(|e| GatewayError::ValidationFailure(format!("invalid request: {}", e)))?;

        for filter in &self.filters {
            debug!(filter = filter.name(), "Applying outbound filter");
            filter.apply(&mut request);
        }

        let response = self
            .http
            .execute(request)
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

        let code = status.as_u16();
        if descriptor.expected == ExpectedShape::Empty || status == StatusCode::NO_CONTENT {
            return Ok(ResponseEnvelope::success(code, None));
        }

        if is_blank(&bytes) {
            return Ok(ResponseEnvelope::new(
                code,
                EMPTY_BODY_MESSAGE,
                Some(empty_value_for(descriptor.expected)),
            ));
        }

        let value = decode_body(descriptor.expected, &bytes)?;
        Ok(ResponseEnvelope::success(code, Some(value)))
    }
}
