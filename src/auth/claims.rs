//! Identity claims read from the request's bearer token.
//!
//! Only the payload segment is decoded. Signatures are checked upstream by the
//! gateway, never here.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::auth::context::{TokenContext, TokenError};

/// Decode the payload segment of a three-segment token into a JSON object.
pub fn decode_payload(token: &str) -> Result<Map<String, Value>, TokenError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(TokenError::MalformedToken(format!(
            "expected 3 segments, found {}",
            segments.len()
        )));
    }

    let bytes = URL_SAFE_NO_PAD
        .decode(segments[1].trim_end_matches('='))
        .map_err(|e| TokenError::MalformedToken(format!("payload is not base64url: {}", e)))?;

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(TokenError::MalformedToken(
            "payload is not a JSON object".to_string(),
        )),
        Err(e) => Err(TokenError::MalformedToken(format!(
            "payload is not JSON: {}",
            e
        ))),
    }
}

/// Decoded claims of one token.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenClaims {
    payload: Map<String, Value>,
}

impl TokenClaims {
    pub fn from_token(token: &str) -> Result<Self, TokenError> {
        Ok(Self {
            payload: decode_payload(token)?,
        })
    }

    /// Claims of the token bound to the current request.
    pub fn current() -> Result<Self, TokenError> {
        Self::from_token(&TokenContext::current_token()?)
    }

    /// The nested `user` object.
    pub fn user_info(&self) -> Result<&Map<String, Value>, TokenError> {
        self.payload
            .get("user")
            .and_then(Value::as_object)
            .ok_or(TokenError::MissingClaim("user"))
    }

    fn user_str(&self, key: &'static str) -> Result<Option<&str>, TokenError> {
        Ok(self.user_info()?.get(key).and_then(Value::as_str))
    }

    fn required_user_str(&self, key: &'static str) -> Result<String, TokenError> {
        self.user_str(key)?
            .map(str::to_string)
            .ok_or(TokenError::MissingClaim(key))
    }

    fn user_flag(&self, key: &'static str) -> Result<bool, TokenError> {
        Ok(self
            .user_info()?
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(false))
    }

    pub fn user_id(&self) -> Result<String, TokenError> {
        self.required_user_str("id")
    }

    pub fn first_name(&self) -> Result<String, TokenError> {
        Ok(self.user_str("firstName")?.unwrap_or_default().to_string())
    }

    pub fn last_name(&self) -> Result<String, TokenError> {
        Ok(self.user_str("lastName")?.unwrap_or_default().to_string())
    }

    /// `first last`, trimmed; empty when neither is set.
    pub fn full_name(&self) -> Result<String, TokenError> {
        let full = format!("{} {}", self.first_name()?, self.last_name()?);
        Ok(full.trim().to_string())
    }

    pub fn username(&self) -> Result<String, TokenError> {
        self.required_user_str("username")
    }

    pub fn email(&self) -> Result<String, TokenError> {
        self.required_user_str("email")
    }

    /// Phone number; an empty string counts as absent.
    pub fn phone_number(&self) -> Result<Option<String>, TokenError> {
        Ok(self
            .user_str("phoneNumber")?
            .filter(|p| !p.is_empty())
            .map(str::to_string))
    }

    pub fn email_verified(&self) -> Result<bool, TokenError> {
        self.user_flag("emailVerified")
    }

    pub fn phone_number_verified(&self) -> Result<bool, TokenError> {
        self.user_flag("phoneNumberVerified")
    }

    /// Granted authorities; empty when the claim is absent.
    pub fn authorities(&self) -> Vec<String> {
        self.payload
            .get("authorities")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities().iter().any(|a| a == authority)
    }

    pub fn subject(&self) -> Result<String, TokenError> {
        self.payload
            .get("sub")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(TokenError::MissingClaim("sub"))
    }

    pub fn issuer(&self) -> String {
        self.payload
            .get("iss")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }

    /// Expiry in seconds since the epoch; `0` when absent.
    pub fn expiration_time(&self) -> i64 {
        self.payload
            .get("exp")
            .and_then(Value::as_i64)
            .unwrap_or(0)
    }

    pub fn is_valid_at(&self, now_epoch_seconds: i64) -> bool {
        self.expiration_time() > now_epoch_seconds
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(chrono::Utc::now().timestamp())
    }

    /// Everything exposed about the caller, in one serialisable value.
    pub fn summary(&self) -> Result<IdentitySummary, TokenError> {
        Ok(IdentitySummary {
            user_id: self.user_id()?,
            username: self.username()?,
            email: self.email()?,
            full_name: self.full_name()?,
            phone_number: self.phone_number()?,
            email_verified: self.email_verified()?,
            phone_number_verified: self.phone_number_verified()?,
            authorities: self.authorities(),
            subject: self.subject()?,
            issuer: self.issuer(),
            expires_at: self.expiration_time(),
            valid: self.is_valid(),
        })
    }
}

/// Serialisable view of a caller's identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentitySummary {
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub phone_number: Option<String>,
    pub email_verified: bool,
    pub phone_number_verified: bool,
    pub authorities: Vec<String>,
    pub subject: String,
    pub issuer: String,
    pub expires_at: i64,
    pub valid: bool,
}

/// Whether the current request's token has not yet expired.
///
/// False when no token is bound or it cannot be decoded.
pub fn is_token_valid() -> bool {
    TokenClaims::current()
        .map(|claims| claims.is_valid())
        .unwrap_or(false)
}

#[cfg(test)]
pub(crate) fn encode_test_token(payload: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{}.{}.signature", header, body)
}
