//! Filters applied to every outbound request just before it is sent.

use reqwest::header::{AUTHORIZATION, COOKIE, HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, warn};

use crate::auth::context::{TokenContext, preview};

/// A hook that may inspect or amend an outbound request.
pub trait OutboundFilter: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, request: &mut reqwest::Request);
}

/// Attaches the current request's bearer token to outbound calls.
///
/// Only reads the token context. With no usable token the call goes out
/// unauthenticated.
#[derive(Debug, Default, Clone, Copy)]
pub struct OutboundTokenInjector;

impl OutboundFilter for OutboundTokenInjector {
    fn name(&self) -> &'static str {
        "token-injector"
    }

    fn apply(&self, request: &mut reqwest::Request) {
        let token = match TokenContext::current_token() {
            Ok(token) if !token.trim().is_empty() => token,
            _ => {
                debug!(url = %request.url(), "No bearer token bound, sending unauthenticated");
                return;
            }
        };

        match HeaderValue::from_str(&format!("Bearer {}", token)) {
            Ok(mut value) => {
                value.set_sensitive(true);
                request.headers_mut().insert(AUTHORIZATION, value);
                debug!(url = %request.url(), token = %preview(&token), "Bearer token attached");
            }
            Err(e) => {
                warn!(token = %preview(&token), error = %e, "Bearer token is not a valid header value, skipping");
            }
        }
    }
}

/// Debug-logs each outbound request.
///
/// reqwest merges the client's default headers only at execute time, so the
/// logger is given them up front to report what actually goes on the wire.
/// Credentials and headers whose name mentions a key, token or auth are masked.
#[derive(Debug, Default, Clone)]
pub struct RequestLogger {
    defaults: HeaderMap,
}

impl RequestLogger {
    pub fn new(defaults: HeaderMap) -> Self {
        Self { defaults }
    }

    /// `name: value` lines for every header sent, sensitive values masked.
    pub fn describe_headers(&self, request: &reqwest::Request) -> Vec<String> {
        let inherited = self
            .defaults
            .iter()
            .filter(|(name, _)| !request.headers().contains_key(*name));

        inherited
            .chain(request.headers().iter())
            .map(|(name, value)| format!("{}: {}", name, masked_value(name, value)))
            .collect()
    }
}

impl OutboundFilter for RequestLogger {
    fn name(&self) -> &'static str {
        "request-logger"
    }

    fn apply(&self, request: &mut reqwest::Request) {
        debug!(
            method = %request.method(),
            url = %request.url(),
            headers = ?self.describe_headers(request),
            "Outbound request"
        );
    }
}

/// Header names are lowercase once parsed.
fn is_sensitive_header(name: &HeaderName) -> bool {
    let name = name.as_str();
    name == COOKIE.as_str() || ["auth", "token", "key"].iter().any(|m| name.contains(m))
}

fn masked_value(name: &HeaderName, value: &HeaderValue) -> String {
    if name == AUTHORIZATION {
        mask_authorization(value)
    } else if value.is_sensitive() || is_sensitive_header(name) {
        "***".to_string()
    } else {
        value.to_str().unwrap_or("<binary>").to_string()
    }
}

fn mask_authorization(value: &HeaderValue) -> String {
    match value.to_str() {
        Ok(text) => match text.split_once(' ') {
            Some((scheme, credential)) => format!("{} {}", scheme, preview(credential)),
            None => "***".to_string(),
        },
        Err(_) => "***".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::{Method, Request};
    use url::Url;

    fn request() -> Request {
        Request::new(Method::GET, Url::parse("http://gateway.test/items").unwrap())
    }

    #[tokio::test]
    async fn test_injects_bound_token() {
        let mut req = request();
        TokenContext::scope(Some("T1".to_string()), async {
            OutboundTokenInjector.apply(&mut req);
        })
        .await;

        assert_eq!(req.headers()[AUTHORIZATION], "Bearer T1");
        assert!(req.headers()[AUTHORIZATION].is_sensitive());
    }

    #[tokio::test]
    async fn test_no_token_leaves_request_unauthenticated() {
        let mut req = request();
        OutboundTokenInjector.apply(&mut req);
        assert!(req.headers().get(AUTHORIZATION).is_none());

        TokenContext::scope(Some("  ".to_string()), async {
            OutboundTokenInjector.apply(&mut req);
        })
        .await;
        assert!(req.headers().get(AUTHORIZATION).is_none());
    }

    #[tokio::test]
    async fn test_invalid_header_value_is_skipped() {
        let mut req = request();
        TokenContext::scope(Some("bad\ntoken".to_string()), async {
            OutboundTokenInjector.apply(&mut req);
        })
        .await;
        assert!(req.headers().get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_mask_authorization() {
        let value = HeaderValue::from_static("Bearer eyJhbGciOiJIUzI1NiJ9.secret");
        assert_eq!(mask_authorization(&value), "Bearer eyJhbGciOi...");
        assert_eq!(mask_authorization(&HeaderValue::from_static("opaque")), "***");
    }

    #[tokio::test]
    async fn test_logger_reports_default_headers_masked() {
        let mut defaults = HeaderMap::new();
        defaults.insert("accept", HeaderValue::from_static("application/json"));
        defaults.insert("application_id", HeaderValue::from_static("app-1"));
        defaults.insert("public-key", HeaderValue::from_static("pk-secret"));
        defaults.insert("x-refresh-token", HeaderValue::from_static("rt-secret"));
        let logger = RequestLogger::new(defaults);

        let mut req = request();
        req.headers_mut()
            .insert("accept", HeaderValue::from_static("text/plain"));
        TokenContext::scope(Some("eyJhbGciOiJIUzI1NiJ9.secret".to_string()), async {
            OutboundTokenInjector.apply(&mut req);
        })
        .await;

        let mut lines = logger.describe_headers(&req);
        lines.sort();
        assert_eq!(
            lines,
            vec![
                "accept: text/plain",
                "application_id: app-1",
                "authorization: Bearer eyJhbGciOi...",
                "public-key: ***",
                "x-refresh-token: ***",
            ]
        );
        assert!(!lines.iter().any(|l| l.contains("secret")));
    }
}
