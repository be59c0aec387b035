use std::{convert::TryFrom, fmt};

use http::HeaderValue;
use serde::{Deserialize, Serialize};
use verity_clock::{Clock, DurationSecs, System, UnixTime};
use verity_scopes::{ScopeRef, Scopes};

use crate::{
    dto::TokenResponse, AccessToken, InvalidToken, NotRevoked, OAuthClient, RefreshToken,
    TokenRequestError,
};

/// How close to expiry a token must be before [`Token::expires_soon`]
/// reports it, by default
pub const DEFAULT_EXPIRY_THRESHOLD: DurationSecs = DurationSecs(300);

const BEARER: &str = "Bearer";

/// An OAuth2 bearer credential
///
/// A token is an immutable value. Refreshing produces a new token rather
/// than altering this one; use [`SharedToken`](crate::SharedToken) when
/// several threads need to observe the replacement.
///
/// `Debug` and `Display` never reveal more than the last four characters of
/// the access token.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "StoredToken")]
pub struct Token {
    access_token: AccessToken,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<RefreshToken>,
    token_type: String,
    #[serde(skip_serializing_if = "Scopes::is_empty")]
    scope: Scopes,
    created_at: UnixTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_in: Option<DurationSecs>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<UnixTime>,
    #[serde(skip)]
    client: Option<OAuthClient>,
}

/// The persisted form of a token; `expires_at` is recomputed on load
#[derive(Deserialize)]
struct StoredToken {
    access_token: AccessToken,
    #[serde(default)]
    refresh_token: Option<RefreshToken>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    scope: Scopes,
    created_at: UnixTime,
    #[serde(default)]
    expires_in: Option<DurationSecs>,
}

impl TryFrom<StoredToken> for Token {
    type Error = InvalidToken;

    fn try_from(stored: StoredToken) -> Result<Self, Self::Error> {
        let mut builder = Token::builder(stored.access_token)
            .scope(stored.scope)
            .created_at(stored.created_at);
        if let Some(rt) = stored.refresh_token {
            builder = builder.refresh_token(rt);
        }
        if let Some(tt) = stored.token_type {
            builder = builder.token_type(tt);
        }
        if let Some(lifetime) = stored.expires_in {
            builder = builder.expires_in(lifetime);
        }
        builder.build()
    }
}

/// Assembles a [`Token`]
#[derive(Debug)]
#[must_use]
pub struct TokenBuilder {
    access_token: AccessToken,
    refresh_token: Option<RefreshToken>,
    token_type: Option<String>,
    scope: Scopes,
    created_at: Option<UnixTime>,
    expires_in: Option<DurationSecs>,
    client: Option<OAuthClient>,
}

impl TokenBuilder {
    /// Sets the refresh token
    pub fn refresh_token(mut self, refresh_token: impl Into<RefreshToken>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Sets the token type; must be `Bearer` or `bearer`
    pub fn token_type(mut self, token_type: impl Into<String>) -> Self {
        self.token_type = Some(token_type.into());
        self
    }

    /// Sets the granted scopes
    pub fn scope(mut self, scope: Scopes) -> Self {
        self.scope = scope;
        self
    }

    /// Sets the issue time; defaults to the time of [`build`](Self::build)
    pub fn created_at(mut self, created_at: UnixTime) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Sets the lifetime; without one the token never expires
    pub fn expires_in(mut self, expires_in: DurationSecs) -> Self {
        self.expires_in = Some(expires_in);
        self
    }

    /// Associates the client used to refresh and revoke the token
    pub fn client(mut self, client: OAuthClient) -> Self {
        self.client = Some(client);
        self
    }

    /// Validates and builds the token, stamping it with the system time
    /// if no issue time was given
    pub fn build(self) -> Result<Token, InvalidToken> {
        self.build_with_clock(&System)
    }

    /// Validates and builds the token, stamping it with `clock`'s time
    /// if no issue time was given
    pub fn build_with_clock<C: Clock>(self, clock: &C) -> Result<Token, InvalidToken> {
        if self.access_token.is_empty() {
            return Err(InvalidToken::EmptyAccessToken);
        }

        let token_type = self.token_type.unwrap_or_else(|| BEARER.to_owned());
        if token_type != "Bearer" && token_type != "bearer" {
            return Err(InvalidToken::UnsupportedTokenType(token_type));
        }

        let created_at = self.created_at.unwrap_or_else(|| clock.now());

        Ok(Token {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            token_type,
            scope: self.scope,
            created_at,
            expires_in: self.expires_in,
            expires_at: self.expires_in.map(|lifetime| created_at + lifetime),
            client: self.client,
        })
    }
}

impl Token {
    /// Starts building a token around an access token
    pub fn builder(access_token: impl Into<AccessToken>) -> TokenBuilder {
        TokenBuilder {
            access_token: access_token.into(),
            refresh_token: None,
            token_type: None,
            scope: Scopes::empty(),
            created_at: None,
            expires_in: None,
            client: None,
        }
    }

    pub(crate) fn from_response<C: Clock>(
        resp: TokenResponse,
        client: OAuthClient,
        clock: &C,
    ) -> Result<Self, InvalidToken> {
        let mut builder = Token::builder(resp.access_token)
            .scope(resp.scope)
            .client(client);
        if let Some(rt) = resp.refresh_token {
            builder = builder.refresh_token(rt);
        }
        if let Some(tt) = resp.token_type {
            builder = builder.token_type(tt);
        }
        if let Some(lifetime) = resp.expires_in {
            builder = builder.expires_in(lifetime);
        }
        builder.build_with_clock(clock)
    }

    /// The access token
    #[inline]
    pub fn access_token(&self) -> &AccessToken {
        &self.access_token
    }

    /// The refresh token, if one was issued
    #[inline]
    pub fn refresh_token(&self) -> Option<&RefreshToken> {
        self.refresh_token.as_ref()
    }

    /// The token type, with its original casing
    #[inline]
    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    /// The granted scopes
    #[inline]
    pub fn scope(&self) -> &Scopes {
        &self.scope
    }

    /// When the token was issued
    #[inline]
    pub fn created_at(&self) -> UnixTime {
        self.created_at
    }

    /// The token's lifetime, if it expires
    #[inline]
    pub fn expires_in(&self) -> Option<DurationSecs> {
        self.expires_in
    }

    /// When the token expires, if it does
    #[inline]
    pub fn expires_at(&self) -> Option<UnixTime> {
        self.expires_at
    }

    /// The client associated with this token
    #[inline]
    pub fn client(&self) -> Option<&OAuthClient> {
        self.client.as_ref()
    }

    /// Associates a client, enabling [`refresh`](Self::refresh) and
    /// [`revoke`](Self::revoke)
    pub fn with_client(self, client: OAuthClient) -> Self {
        Self {
            client: Some(client),
            ..self
        }
    }

    /// Whether the token has expired
    ///
    /// A token without an expiry never expires.
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.is_expired_with_clock(&System)
    }

    /// Whether the token has expired according to `clock`
    #[inline]
    pub fn is_expired_with_clock<C: Clock>(&self, clock: &C) -> bool {
        self.is_expired_at(clock.now())
    }

    /// Whether the token has expired as of `now`
    #[inline]
    pub fn is_expired_at(&self, now: UnixTime) -> bool {
        match self.expires_at {
            Some(expires_at) => now >= expires_at,
            None => false,
        }
    }

    /// Whether the token expires within `threshold`
    ///
    /// False once the token has expired, and for a token without an expiry.
    #[inline]
    pub fn expires_soon(&self, threshold: DurationSecs) -> bool {
        self.expires_soon_with_clock(threshold, &System)
    }

    /// Whether the token expires within `threshold` according to `clock`
    #[inline]
    pub fn expires_soon_with_clock<C: Clock>(&self, threshold: DurationSecs, clock: &C) -> bool {
        self.expires_soon_at(threshold, clock.now())
    }

    /// Whether the token expires within `threshold` of `now`
    #[inline]
    pub fn expires_soon_at(&self, threshold: DurationSecs, now: UnixTime) -> bool {
        match self.expires_at {
            Some(expires_at) => {
                let remaining = expires_at.seconds_since(now);
                (0..=threshold.as_signed()).contains(&remaining)
            }
            None => false,
        }
    }

    /// Whether the token was granted exactly this scope
    ///
    /// Unlike [`Scopes::includes`], `resource:write` does not imply
    /// `resource:read` here.
    #[inline]
    pub fn has_scope(&self, scope: &ScopeRef) -> bool {
        self.scope.contains(scope)
    }

    /// The value of an `Authorization` header carrying this token
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token.expose())
    }

    /// The `Authorization` header value, marked sensitive
    ///
    /// Fails if the access token contains bytes not allowed in a header.
    pub fn authorization_header_value(&self) -> Result<HeaderValue, http::header::InvalidHeaderValue> {
        let mut value = HeaderValue::try_from(self.authorization_header())?;
        value.set_sensitive(true);
        Ok(value)
    }

    /// Exchanges the refresh token for a new token
    ///
    /// The new token carries this token's refresh token forward when the
    /// authority does not rotate it. This token is left untouched.
    pub fn refresh(&self) -> Result<Token, TokenRequestError> {
        let refresh_token = self
            .refresh_token
            .as_ref()
            .ok_or(InvalidToken::MissingRefreshToken)?;
        let client = self.client.as_ref().ok_or(InvalidToken::MissingClient)?;

        let fresh = client.refresh_token(refresh_token)?;

        Ok(Token {
            refresh_token: fresh.refresh_token.or_else(|| self.refresh_token.clone()),
            ..fresh
        })
    }

    /// Revokes the access token with the associated client
    ///
    /// The token is consumed once the authority accepts the revocation.
    /// Otherwise it is handed back inside the error; revocation is
    /// best-effort, so [`NotRevoked::Refused`] does not mean the token is
    /// still known to be valid.
    pub fn revoke(self) -> Result<(), NotRevoked> {
        let revoked = match &self.client {
            Some(client) => client.revoke_token(&self),
            None => false,
        };

        if revoked {
            Ok(())
        } else if self.client.is_none() {
            Err(NotRevoked::MissingClient(Box::new(self)))
        } else {
            Err(NotRevoked::Refused(Box::new(self)))
        }
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &self.access_token)
            .field("refresh_token", &self.refresh_token)
            .field("token_type", &self.token_type)
            .field("scope", &format_args!("{}", self.scope))
            .field("created_at", &self.created_at.0)
            .field("expires_at", &self.expires_at.map(|t| t.0))
            .field("has_client", &self.client.is_some())
            .finish()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.token_type, self.access_token)
    }
}
