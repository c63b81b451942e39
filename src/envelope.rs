//! The uniform `{status, message, data}` result of every outbound call.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GatewayError;

/// Message used when a 2xx reply carried no body but one was expected.
pub const EMPTY_BODY_MESSAGE: &str = "operation succeeded, empty response received";

/// Result of one dispatched request.
///
/// Constructible from every outcome (success, upstream rejection, transport
/// failure, decode failure) and immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    status: u16,
    message: String,
    data: Option<Value>,
}

impl ResponseEnvelope {
    /// Create an envelope. A JSON `null` payload is stored as `None`.
    pub fn new(status: u16, message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            status,
            message: message.into(),
            data: data.filter(|v| !v.is_null()),
        }
    }

    /// Success envelope with the status-keyed canned message.
    pub fn success(status: u16, data: Option<Value>) -> Self {
        Self::new(status, success_message(status), data)
    }

    /// Error envelope for a failure observed after `attempts` attempts.
    pub fn from_failure(error: &GatewayError, attempts: u32) -> Self {
        let message = if attempts > 1 {
            format!("{} (gave up after {} attempts)", error, attempts)
        } else {
            error.to_string()
        };
        Self::new(error.status_code(), message, None)
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn into_data(self) -> Option<Value> {
        self.data
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the payload into a concrete type.
    ///
    /// Returns `Ok(None)` when the envelope carries no payload.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<Option<T>, serde_json::Error> {
        self.data
            .as_ref()
            .map(|v| T::deserialize(v))
            .transpose()
    }
}

/// Canned message for a 2xx status.
pub fn success_message(status: u16) -> String {
    match status {
        200 => "operation succeeded".to_string(),
        201 => "resource created".to_string(),
        202 => "accepted".to_string(),
        204 => "no content".to_string(),
        other => format!("operation succeeded with status {}", other),
    }
}
