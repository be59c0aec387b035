//! Errors raised by the token lifecycle

use http::StatusCode;
use thiserror::Error;
use verity_scopes::InvalidScope;

use crate::{transport::TransportError, Token};

/// A constructor or call argument was unusable
///
/// These are always raised before any request leaves the process.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// No client ID was supplied
    #[error("client_id is required")]
    MissingClientId,
    /// No client secret was supplied
    #[error("client_secret is required")]
    MissingClientSecret,
    /// No redirect URI was supplied
    #[error("redirect_uri is required")]
    MissingRedirectUri,
    /// The redirect URI was not an absolute `http` or `https` URL
    #[error("redirect_uri must be a valid HTTP(S) URL")]
    InvalidRedirectUri,
    /// An endpoint base URL was not an absolute `http` or `https` URL
    #[error("endpoint must be a valid HTTP(S) URL: {url}")]
    InvalidEndpoint {
        /// The rejected URL
        url: String,
    },
    /// An authorization code exchange was attempted with an empty code
    #[error("authorization code is required")]
    MissingAuthorizationCode,
    /// A refresh was attempted with an empty refresh token
    #[error("refresh token is required")]
    MissingRefreshToken,
    /// The default HTTP transport could not be built
    #[error("unable to construct HTTP transport")]
    Transport(#[source] TransportError),
}

/// A token is malformed or cannot perform the requested lifecycle step
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum InvalidToken {
    /// The access token was empty
    #[error("access token cannot be empty")]
    EmptyAccessToken,
    /// The token type was something other than `Bearer`
    #[error("unsupported token type `{0}`, expected `Bearer`")]
    UnsupportedTokenType(String),
    /// A refresh was requested but the token carries no refresh token
    #[error("token has no refresh token")]
    MissingRefreshToken,
    /// A refresh or revocation was requested but no client is associated
    /// with the token
    #[error("token has no associated OAuth client")]
    MissingClient,
    /// The token has already been revoked
    #[error("token has been revoked")]
    Revoked,
}

/// A token that was not revoked, handed back unchanged
#[derive(Debug, Error)]
pub enum NotRevoked {
    /// No client is associated with the token
    #[error("token has no associated OAuth client")]
    MissingClient(Box<Token>),
    /// The authority could not be reached or did not accept the revocation
    #[error("authority did not revoke the token")]
    Refused(Box<Token>),
}

impl NotRevoked {
    /// Takes back the token that was not revoked
    pub fn into_token(self) -> Token {
        match self {
            Self::MissingClient(token) | Self::Refused(token) => *token,
        }
    }
}

/// An error while requesting something of the authorization server
#[derive(Debug, Error)]
pub enum TokenRequestError {
    /// The authority rejected the credentials (4xx)
    #[error("authentication failed with status {status}: {body}")]
    Authentication {
        /// The response status
        status: StatusCode,
        /// The response body, as text
        body: String,
    },
    /// The authority answered with a non-success, non-4xx status
    #[error("unexpected response status {status} from authority: {body}")]
    UnexpectedStatus {
        /// The response status
        status: StatusCode,
        /// The response body, as text
        body: String,
    },
    /// The request timed out in the transport
    #[error("request to authority timed out")]
    Timeout(#[source] TransportError),
    /// The authority could not be reached
    #[error("unable to reach authority")]
    Connection(#[source] TransportError),
    /// The response body could not be deserialized
    #[error("error deserializing response body from authority")]
    ResponseBody(#[from] serde_json::Error),
    /// The token returned, or the token being acted on, was unusable
    #[error(transparent)]
    InvalidToken(#[from] InvalidToken),
    /// A call argument was unusable
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl TokenRequestError {
    /// Whether the transport gave up waiting
    #[inline]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Whether the authority could not be reached at all
    #[inline]
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Whether the authority rejected the credentials
    #[inline]
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }
}

impl From<TransportError> for TokenRequestError {
    fn from(err: TransportError) -> Self {
        if err.is_timeout() {
            Self::Timeout(err)
        } else {
            Self::Connection(err)
        }
    }
}

/// An authorization URL could not be built
#[derive(Debug, Error)]
pub enum AuthorizationUrlError {
    /// A requested scope is not in the registry
    #[error(transparent)]
    InvalidScope(#[from] InvalidScope),
    /// The system random number generator failed while generating `state`
    #[error("unable to generate authorization state")]
    RandomnessUnavailable,
}
