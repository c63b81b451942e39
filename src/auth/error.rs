//! Authentication failures and their envelope mapping.

use std::fmt;

use crate::envelope::ResponseEnvelope;
use crate::error::GatewayError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The token endpoint answered 2xx but without a usable token.
    UpstreamAuthFailure(String),
    /// The login endpoint refused the user's credentials.
    InvalidCredentials { status: u16, body: String },
    /// An auth endpoint replied with a non-2xx status.
    UpstreamRejected { status: u16, body: String },
    /// The auth service could not be reached.
    UpstreamUnavailable { description: String, transient: bool },
}

impl AuthError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::UpstreamAuthFailure(_) => 500,
            Self::InvalidCredentials { status, .. } | Self::UpstreamRejected { status, .. } => *status,
            Self::UpstreamUnavailable { .. } => 503,
        }
    }

    /// Whether a retry could change the outcome.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::UpstreamRejected { status, .. } => (500..600).contains(status),
            Self::UpstreamUnavailable { transient, .. } => *transient,
            Self::UpstreamAuthFailure(_) | Self::InvalidCredentials { .. } => false,
        }
    }

    pub fn to_envelope(&self) -> ResponseEnvelope {
        ResponseEnvelope::new(self.status_code(), self.to_string(), None)
    }
}

impl From<GatewayError> for AuthError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::UpstreamRejection { status, body, .. } => {
                Self::UpstreamRejected { status, body }
            }
            transport @ GatewayError::Transport { .. } => Self::UpstreamUnavailable {
                transient: transport.is_transient(),
                description: transport.to_string(),
            },
            GatewayError::ValidationFailure(msg) | GatewayError::DecodeFailure(msg) => {
                Self::UpstreamAuthFailure(msg)
            }
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpstreamAuthFailure(msg) => write!(f, "authentication failed upstream: {}", msg),
            Self::InvalidCredentials { status, body } => {
                write!(f, "invalid credentials (HTTP {}): {}", status, body)
            }
            Self::UpstreamRejected { status, body } => {
                write!(f, "auth service rejected the request (HTTP {}): {}", status, body)
            }
            Self::UpstreamUnavailable { description, .. } => {
                write!(f, "auth service unavailable: {}", description)
            }
        }
    }
}

impl std::error::Error for AuthError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_mapping() {
        let invalid = AuthError::InvalidCredentials {
            status: 401,
            body: "bad password".to_string(),
        };
        let envelope = invalid.to_envelope();
        assert_eq!(envelope.status(), 401);
        assert!(envelope.message().contains("bad password"));
        assert!(envelope.data().is_none());

        assert_eq!(
            AuthError::UpstreamAuthFailure("empty token".into()).to_envelope().status(),
            500
        );
        assert_eq!(
            AuthError::UpstreamUnavailable {
                description: "connection reset".into(),
                transient: true
            }
            .to_envelope()
            .status(),
            503
        );
    }

    #[test]
    fn test_from_gateway_error() {
        let rejected: AuthError = GatewayError::UpstreamRejection {
            status: 503,
            reason: "Service Unavailable".into(),
            body: "down".into(),
        }
        .into();
        assert_eq!(
            rejected,
            AuthError::UpstreamRejected {
                status: 503,
                body: "down".into()
            }
        );
        assert!(rejected.is_transient());

        let unavailable: AuthError = GatewayError::Transport {
            description: "connection refused".into(),
            timed_out: false,
        }
        .into();
        assert!(matches!(
            unavailable,
            AuthError::UpstreamUnavailable { transient: false, .. }
        ));
    }
}
