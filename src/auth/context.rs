//! Request-scoped bearer token storage.
//!
//! The inbound filter binds the caller's token for the lifetime of one
//! request future with [`TokenContext::scope`]. Anything awaited inside that
//! future (claim accessors, the outbound injector) sees the same token;
//! concurrent requests never see each other's. Tasks started with
//! `tokio::spawn` do not inherit the binding.

use std::fmt;
use std::future::Future;

use tracing::debug;

tokio::task_local! {
    static REQUEST_TOKEN: Option<String>;
}

/// Number of leading characters shown in log previews.
const PREVIEW_CHARS: usize = 10;

/// Errors raised when reading the request token or its claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// No token is bound to the current request.
    NoAuthenticationContext,
    /// The token is not a three-segment JWT with a JSON object payload.
    MalformedToken(String),
    /// A required claim is absent.
    MissingClaim(&'static str),
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoAuthenticationContext => write!(f, "no authentication context"),
            Self::MalformedToken(msg) => write!(f, "malformed token: {}", msg),
            Self::MissingClaim(claim) => write!(f, "missing claim: {}", claim),
        }
    }
}

impl std::error::Error for TokenError {}

/// Accessors for the token bound to the current request.
pub struct TokenContext;

impl TokenContext {
    /// Run `fut` with `token` bound as the current request token.
    ///
    /// The binding is released when `fut` completes, on success or failure.
    pub async fn scope<F>(token: Option<String>, fut: F) -> F::Output
    where
        F: Future,
    {
        if let Some(t) = token.as_deref() {
            debug!(token = %preview(t), "Binding request token");
        }
        REQUEST_TOKEN.scope(token, fut).await
    }

    /// The current request's token, returned as bound (a blank binding is
    /// returned as-is).
    pub fn current_token() -> Result<String, TokenError> {
        REQUEST_TOKEN
            .try_with(|token| token.clone())
            .ok()
            .flatten()
            .ok_or(TokenError::NoAuthenticationContext)
    }

    /// Whether a non-blank token is bound to the current request.
    pub fn has_token() -> bool {
        Self::current_token().is_ok_and(|t| !t.trim().is_empty())
    }
}

/// First characters of a token followed by `...`.
pub fn preview(token: &str) -> String {
    let head: String = token.chars().take(PREVIEW_CHARS).collect();
    format!("{}...", head)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_no_context_outside_scope() {
        assert_eq!(
            TokenContext::current_token(),
            Err(TokenError::NoAuthenticationContext)
        );
        assert!(!TokenContext::has_token());
    }

    #[tokio::test]
    async fn test_token_visible_inside_scope_and_released_after() {
        let seen = TokenContext::scope(Some("T1".to_string()), async {
            TokenContext::current_token()
        })
        .await;
        assert_eq!(seen.unwrap(), "T1");
        assert!(!TokenContext::has_token());
    }

    #[tokio::test]
    async fn test_blank_binding_is_returned_but_not_usable() {
        let (token, has) = TokenContext::scope(Some("   ".to_string()), async {
            (TokenContext::current_token(), TokenContext::has_token())
        })
        .await;
        assert_eq!(token.unwrap(), "   ");
        assert!(!has);
    }

    #[tokio::test]
    async fn test_concurrent_scopes_are_isolated() {
        let a = TokenContext::scope(Some("token-a".to_string()), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            TokenContext::current_token()
        });
        let b = TokenContext::scope(Some("token-b".to_string()), async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            TokenContext::current_token()
        });

        let (a, b) = tokio::join!(a, b);
        assert_eq!(a.unwrap(), "token-a");
        assert_eq!(b.unwrap(), "token-b");
    }

    #[tokio::test]
    async fn test_spawned_tasks_are_isolated() {
        let first = tokio::spawn(TokenContext::scope(Some("A".to_string()), async {
            tokio::task::yield_now().await;
            TokenContext::current_token()
        }));
        let second = tokio::spawn(TokenContext::scope(None, async {
            tokio::task::yield_now().await;
            TokenContext::current_token()
        }));

        assert_eq!(first.await.unwrap().unwrap(), "A");
        assert_eq!(
            second.await.unwrap(),
            Err(TokenError::NoAuthenticationContext)
        );
    }

    #[test]
    fn test_preview_truncates() {
        assert_eq!(preview("eyJhbGciOiJIUzI1NiJ9.payload"), "eyJhbGciOi...");
        assert_eq!(preview("short"), "short...");
    }
}
