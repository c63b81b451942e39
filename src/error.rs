//! Error taxonomy for outbound gateway calls.
//!
//! These errors never cross the dispatcher boundary: every variant is folded
//! into a [`ResponseEnvelope`](crate::ResponseEnvelope) before the caller sees
//! it. They exist so the retry loop can decide what is worth another attempt.

use std::fmt;

/// Substrings of a transport error description that mark it as transient.
///
/// Matched case-insensitively against the full error chain.
pub const TRANSIENT_MARKERS: [&str; 3] = ["connection reset", "timeout", "service unavailable"];

/// Failure of a single outbound exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The caller supplied no body for a body-carrying method, or an
    /// unusable path. Never retried.
    ValidationFailure(String),

    /// The upstream replied with a non-2xx status.
    UpstreamRejection {
        status: u16,
        reason: String,
        body: String,
    },

    /// The exchange failed below HTTP (connect, reset, timeout, ...).
    Transport {
        description: String,
        timed_out: bool,
    },

    /// A 2xx body could not be decoded into the expected shape.
    DecodeFailure(String),
}

impl GatewayError {
    /// Build a transport error from a reqwest failure, keeping the whole
    /// source chain so marker matching sees e.g. "connection reset by peer".
    pub fn from_transport(err: &reqwest::Error) -> Self {
        Self::Transport {
            description: describe_error_chain(err),
            timed_out: err.is_timeout(),
        }
    }

    /// Build an upstream rejection from a status code and raw body text.
    pub fn rejection(status: reqwest::StatusCode, body: String) -> Self {
        Self::UpstreamRejection {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            body,
        }
    }

    /// Whether another attempt may succeed.
    ///
    /// 5xx rejections and transport errors that timed out or mention one of
    /// [`TRANSIENT_MARKERS`] qualify; everything else is terminal.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::UpstreamRejection { status, .. } => (500..600).contains(status),
            Self::Transport {
                description,
                timed_out,
            } => *timed_out || has_transient_marker(description),
            Self::ValidationFailure(_) | Self::DecodeFailure(_) => false,
        }
    }

    /// HTTP status used when this error is surfaced in an envelope.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::ValidationFailure(_) => 400,
            Self::UpstreamRejection { status, .. } => *status,
            Self::Transport { .. } | Self::DecodeFailure(_) => 500,
        }
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationFailure(msg) => write!(f, "{}", msg),
            Self::UpstreamRejection {
                status,
                reason,
                body,
            } => write!(f, "HTTP error {} ({}): {}", status, reason, body),
            Self::Transport { description, .. } => {
                write!(f, "unexpected technical error: {}", description)
            }
            Self::DecodeFailure(msg) => write!(f, "failed to decode response body: {}", msg),
        }
    }
}

impl std::error::Error for GatewayError {}

/// Case-insensitive check for any of the [`TRANSIENT_MARKERS`].
pub fn has_transient_marker(description: &str) -> bool {
    let lowered = description.to_lowercase();
    TRANSIENT_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}

/// Join an error and all of its sources into one `a: b: c` line.
pub fn describe_error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        let text = inner.to_string();
        if !out.contains(&text) {
            out.push_str(": ");
            out.push_str(&text);
        }
        source = inner.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(description: &str) -> GatewayError {
        GatewayError::Transport {
            description: description.to_string(),
            timed_out: false,
        }
    }

    #[test]
    fn test_rejection_transience_follows_status_class() {
        let server_error = GatewayError::rejection(reqwest::StatusCode::BAD_GATEWAY, String::new());
        let client_error = GatewayError::rejection(reqwest::StatusCode::NOT_FOUND, String::new());

        assert!(server_error.is_transient());
        assert!(!client_error.is_transient());
        assert_eq!(server_error.status_code(), 502);
        assert_eq!(client_error.status_code(), 404);
    }

    #[test]
    fn test_transport_markers_are_case_insensitive() {
        assert!(transport("Connection Reset by peer").is_transient());
        assert!(transport("read TIMEOUT elapsed").is_transient());
        assert!(transport("503 Service Unavailable").is_transient());
        assert!(!transport("connection refused").is_transient());
        assert!(!transport("dns error: no such host").is_transient());
    }

    #[test]
    fn test_timed_out_transport_is_transient_without_marker() {
        let err = GatewayError::Transport {
            description: "operation timed out".to_string(),
            timed_out: true,
        };
        assert!(err.is_transient());
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn test_validation_and_decode_are_terminal() {
        assert!(!GatewayError::ValidationFailure("no body".into()).is_transient());
        assert!(!GatewayError::DecodeFailure("bad json".into()).is_transient());
        assert_eq!(
            GatewayError::ValidationFailure("no body".into()).status_code(),
            400
        );
        assert_eq!(GatewayError::DecodeFailure("bad json".into()).status_code(), 500);
    }

    #[test]
    fn test_display() {
        let err = GatewayError::UpstreamRejection {
            status: 404,
            reason: "Not Found".to_string(),
            body: "{\"error\":\"missing\"}".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "HTTP error 404 (Not Found): {\"error\":\"missing\"}"
        );
        assert_eq!(
            transport("connection reset").to_string(),
            "unexpected technical error: connection reset"
        );
    }

    #[test]
    fn test_describe_error_chain_includes_sources() {
        let inner = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset by peer");
        let outer = std::io::Error::new(std::io::ErrorKind::Other, inner);
        let text = describe_error_chain(&outer);
        assert!(text.contains("connection reset by peer"));
    }
}
