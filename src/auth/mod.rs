//! Authentication against the gateway and per-request token propagation.
//!
//! - **Inbound**: [`bind_bearer_token`] reads `Authorization: Bearer ...` and
//!   binds the token to the request future ([`TokenContext`]). Claims are
//!   read from it on demand with [`TokenClaims`].
//! - **Service**: [`ClientCredentialsAuthenticator`] fetches a fresh OAuth2
//!   client-credentials token per call.
//! - **Users**: [`UserAuthenticator`] performs login and registration bearing
//!   that service token.
//!
//! ## Usage
//!
//! ```ignore
//! let app = Router::new()
//!     .route("/me", get(me))
//!     .layer(middleware::from_fn(bind_bearer_token));
//!
//! async fn me() -> String {
//!     TokenClaims::current()
//!         .and_then(|claims| claims.username())
//!         .unwrap_or_default()
//! }
//! ```

pub mod claims;
pub mod client_credentials;
pub mod context;
mod error;
pub mod extractor;
pub mod user;

pub use claims::{IdentitySummary, TokenClaims, is_token_valid};
pub use client_credentials::{AccessToken, ClientCredentialsAuthenticator};
pub use context::{TokenContext, TokenError};
pub use error::AuthError;
pub use extractor::{BEARER_PREFIX, bind_bearer_token, extract_bearer};
pub use user::{LoginRequest, LoginResponse, RegisterRequest, UserAuthenticator, UserProfile};
