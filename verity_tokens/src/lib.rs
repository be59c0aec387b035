//! OAuth2 bearer-token lifecycle for Verity API clients
//!
//! An [`OAuthClient`] drives the authorization code flow against the Verity
//! authorization server: it builds the URL the user is sent to, exchanges
//! the returned code for a [`Token`], and later refreshes, revokes or
//! introspects that token.
//!
//! Every network call is a single blocking attempt through an
//! [`HttpTransport`]. With the default `reqwest` feature, [`OAuthClient::new`]
//! uses a blocking `reqwest` client; any other HTTP stack can be plugged in
//! with [`OAuthClient::with_transport`].
//!
//! ```no_run
//! use verity_tokens::{OAuthClient, OAuthClientConfig, SharedToken, DEFAULT_EXPIRY_THRESHOLD};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = OAuthClientConfig::new("my-app", "my-secret", "https://my-app.example/cb")?;
//! let client = OAuthClient::new(config)?;
//!
//! let request = client.authorization_url(["record:read", "note:write"], None)?;
//! println!("send the user to {}", request.url);
//!
//! // ...the user returns to the redirect URI with `code` and `state`...
//! # let code = "code-from-redirect";
//! let token = client.exchange_code_for_token(code)?;
//!
//! let shared = SharedToken::new(token);
//! let token = shared.refresh_if_expiring(DEFAULT_EXPIRY_THRESHOLD)?;
//! println!("Authorization: {}", token.authorization_header());
//! # Ok(())
//! # }
//! ```
//!
//! Tokens never print their secrets: `Debug` and `Display` show at most the
//! last four characters of the access token.
//!
//! # Features
//!
//! * `reqwest` (default): Provides [`ReqwestTransport`], a transport backed
//!   by `reqwest`'s blocking client, and [`OAuthClient::new`].
//! * `default-tls`, `rustls-tls`: Enable the corresponding TLS backend in
//!   `reqwest`.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

mod client;
mod config;
mod dto;
mod error;
mod secrets;
mod shared;
mod token;
pub mod transport;

pub use client::{AuthorizationRequest, OAuthClient, Revocable, RevocationOutcome};
pub use config::{Endpoints, OAuthClientConfig, DEFAULT_API_BASE, DEFAULT_AUTH_BASE};
pub use dto::Introspection;
pub use error::{
    AuthorizationUrlError, ConfigurationError, InvalidToken, NotRevoked, TokenRequestError,
};
pub use secrets::{
    AccessToken, AuthorizationCode, ClientId, ClientIdRef, ClientSecret, RefreshToken, State,
    StateRef,
};
pub use shared::SharedToken;
pub use token::{Token, TokenBuilder, DEFAULT_EXPIRY_THRESHOLD};
#[cfg(feature = "reqwest")]
pub use transport::ReqwestTransport;
pub use transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};
