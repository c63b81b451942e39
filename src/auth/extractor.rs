//! Inbound bearer token extraction.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use http::header::AUTHORIZATION;
use tracing::{Instrument, debug, info_span};
use uuid::Uuid;

use crate::auth::context::{TokenContext, preview};

/// Scheme prefix of an `Authorization` header carrying a bearer token.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Extract the bearer token from an `Authorization` header value.
///
/// The token is everything after `Bearer `, untrimmed. Returns `None` for a
/// missing header, another scheme, or a blank remainder.
pub fn extract_bearer(header: Option<&str>) -> Option<String> {
    let token = header?.strip_prefix(BEARER_PREFIX)?;
    if token.trim().is_empty() {
        return None;
    }
    Some(token.to_string())
}

/// Middleware that binds the caller's bearer token for the duration of the
/// request. Requests without one pass through unbound.
pub async fn bind_bearer_token(request: Request, next: Next) -> Response {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    let token = extract_bearer(header);

    let request_id = Uuid::new_v4();
    let span = info_span!("inbound", %request_id, path = %request.uri().path());

    match token.as_deref() {
        Some(t) => debug!(parent: &span, token = %preview(t), "Bearer token found"),
        None => debug!(parent: &span, "No bearer token on request"),
    }

    TokenContext::scope(token, next.run(request))
        .instrument(span)
        .await
}
