//! Wire shapes exchanged with the authorization server

use serde::{Deserialize, Serialize};
use verity_clock::{DurationSecs, UnixTime};
use verity_scopes::Scopes;

use crate::{AccessToken, ClientId, RefreshToken};

/// Body of a successful token endpoint response
///
/// `access_token` is required; everything else may be omitted. An absent
/// `expires_in` describes a token that does not expire.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: AccessToken,
    #[serde(default)]
    pub refresh_token: Option<RefreshToken>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<DurationSecs>,
    #[serde(default)]
    pub scope: Scopes,
}

/// The authority's view of a token, per RFC 7662
///
/// Fields the authority returns beyond the standard ones are kept in
/// [`extra`](Self::extra).
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Introspection {
    /// Whether the token is currently usable
    pub active: bool,
    /// Scopes granted to the token
    #[serde(default, skip_serializing_if = "Scopes::is_empty")]
    pub scope: Scopes,
    /// The client the token was issued to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<ClientId>,
    /// When the token expires
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<UnixTime>,
    /// The token type, usually `Bearer`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Any other fields in the response
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
