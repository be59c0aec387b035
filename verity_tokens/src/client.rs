use std::{fmt, sync::Arc};

use http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use ring::rand::{SecureRandom, SystemRandom};
use url::{form_urlencoded, Url};
use verity_clock::System;
use verity_scopes::validate;

use crate::{
    dto::{Introspection, TokenResponse},
    transport::{HttpRequest, HttpResponse, HttpTransport, TransportError},
    AccessToken, AuthorizationCode, AuthorizationUrlError, ConfigurationError, InvalidToken,
    OAuthClientConfig, RefreshToken, State, Token, TokenRequestError,
};

/// Number of random bytes behind a generated `state`
const STATE_BYTES: usize = 16;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_ACCEPT: &str = "application/json";

/// A client of the Verity authorization server
///
/// Cheap to clone; clones share the same configuration and transport.
/// Every network call is a single blocking attempt through the client's
/// [`HttpTransport`].
#[derive(Clone)]
pub struct OAuthClient {
    inner: Arc<Inner>,
}

struct Inner {
    config: OAuthClientConfig,
    transport: Box<dyn HttpTransport>,
}

impl fmt::Debug for OAuthClient {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("OAuthClient")
            .field("client_id", &self.inner.config.client_id())
            .field("redirect_uri", &self.inner.config.redirect_uri())
            .field("endpoints", self.inner.config.endpoints())
            .finish_non_exhaustive()
    }
}

/// The URL to send the user agent to, and the `state` it carries
///
/// The caller must keep `state` and compare it with the value returned on
/// the redirect URI.
#[derive(Clone, Debug)]
pub struct AuthorizationRequest {
    /// The authorization URL
    pub url: Url,
    /// The `state` embedded in the URL
    pub state: State,
}

/// Something that carries a token value the authority can revoke or
/// introspect
pub trait Revocable {
    /// The raw token value to send
    fn token_value(&self) -> &str;
}

impl Revocable for Token {
    #[inline]
    fn token_value(&self) -> &str {
        self.access_token().expose()
    }
}

impl Revocable for AccessToken {
    #[inline]
    fn token_value(&self) -> &str {
        self.expose()
    }
}

impl Revocable for RefreshToken {
    #[inline]
    fn token_value(&self) -> &str {
        self.expose()
    }
}

impl Revocable for str {
    #[inline]
    fn token_value(&self) -> &str {
        self
    }
}

impl Revocable for String {
    #[inline]
    fn token_value(&self) -> &str {
        self
    }
}

/// What happened when revocation was requested
#[derive(Debug)]
pub enum RevocationOutcome {
    /// The authority accepted the revocation
    Revoked,
    /// The authority answered with a non-success status
    Rejected {
        /// The response status
        status: StatusCode,
    },
    /// The request never produced a response
    Failed(TransportError),
    /// The token value was empty, so nothing was sent
    MissingToken,
}

impl RevocationOutcome {
    /// Whether the authority accepted the revocation
    #[inline]
    pub fn is_revoked(&self) -> bool {
        matches!(self, Self::Revoked)
    }
}

impl OAuthClient {
    /// Constructs a client that talks to the authority with `reqwest`
    #[cfg(feature = "reqwest")]
    pub fn new(config: OAuthClientConfig) -> Result<Self, ConfigurationError> {
        let transport =
            crate::transport::ReqwestTransport::new().map_err(ConfigurationError::Transport)?;
        Ok(Self::with_transport(config, transport))
    }

    /// Constructs a client that talks to the authority through `transport`
    pub fn with_transport(
        config: OAuthClientConfig,
        transport: impl HttpTransport + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                transport: Box::new(transport),
            }),
        }
    }

    /// The client's configuration
    #[inline]
    pub fn config(&self) -> &OAuthClientConfig {
        &self.inner.config
    }

    /// Builds the URL that starts the authorization code flow
    ///
    /// Every scope must be registered. When `state` is `None`, a random
    /// one is generated from the system's secure random number generator.
    /// No request is made.
    ///
    /// ```
    /// # use verity_tokens::{OAuthClient, OAuthClientConfig, State};
    /// # struct Offline;
    /// # impl verity_tokens::HttpTransport for Offline {
    /// #     fn execute(&self, _: verity_tokens::HttpRequest)
    /// #         -> Result<verity_tokens::HttpResponse, verity_tokens::TransportError> {
    /// #         unreachable!()
    /// #     }
    /// # }
    /// let config = OAuthClientConfig::new("my-app", "my-secret", "https://my-app.example/cb")?;
    /// let client = OAuthClient::with_transport(config, Offline);
    ///
    /// let req = client.authorization_url(["record:read", "note:write"], Some(State::from_static("xyz")))?;
    /// assert_eq!(
    ///     req.url.as_str(),
    ///     "https://auth.verity.io/authorize?client_id=my-app\
    ///      &redirect_uri=https%3A%2F%2Fmy-app.example%2Fcb\
    ///      &response_type=code&scope=record%3Aread+note%3Awrite&state=xyz",
    /// );
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    #[tracing::instrument(skip_all)]
    pub fn authorization_url<I, S>(
        &self,
        scopes: I,
        state: Option<State>,
    ) -> Result<AuthorizationRequest, AuthorizationUrlError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let scopes = validate(scopes)?;
        let state = match state {
            Some(state) => state,
            None => generate_state()?,
        };

        let scope = scopes
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let config = &self.inner.config;
        let mut url = config.endpoints().authorize().clone();
        url.query_pairs_mut()
            .append_pair("client_id", config.client_id().as_str())
            .append_pair("redirect_uri", config.redirect_uri())
            .append_pair("response_type", "code")
            .append_pair("scope", &scope)
            .append_pair("state", state.as_str());

        tracing::debug!(%scope, "built authorization URL");

        Ok(AuthorizationRequest { url, state })
    }

    /// Exchanges an authorization code for a token
    ///
    /// The returned token is associated with this client.
    #[tracing::instrument(
        skip_all,
        fields(
            endpoint = %self.inner.config.endpoints().token(),
            grant_type = "authorization_code"
        )
    )]
    pub fn exchange_code_for_token(
        &self,
        code: impl Into<AuthorizationCode>,
    ) -> Result<Token, TokenRequestError> {
        let code = code.into();
        if code.expose().trim().is_empty() {
            return Err(ConfigurationError::MissingAuthorizationCode.into());
        }

        self.request_token(
            "authorization_code",
            &[
                ("code", code.expose()),
                ("redirect_uri", self.inner.config.redirect_uri()),
            ],
        )
    }

    /// Exchanges a refresh token for a new token
    ///
    /// The response may or may not carry a rotated refresh token; see
    /// [`Token::refresh`] for a variant that keeps the old one.
    #[tracing::instrument(
        skip_all,
        fields(
            endpoint = %self.inner.config.endpoints().token(),
            grant_type = "refresh_token"
        )
    )]
    pub fn refresh_token(&self, refresh_token: &RefreshToken) -> Result<Token, TokenRequestError> {
        if refresh_token.expose().trim().is_empty() {
            return Err(ConfigurationError::MissingRefreshToken.into());
        }

        self.request_token("refresh_token", &[("refresh_token", refresh_token.expose())])
    }

    /// Asks the authority to revoke a token
    ///
    /// Never fails: any problem is logged and reported as `false`. Use
    /// [`revoke_token_with_outcome`](Self::revoke_token_with_outcome) to
    /// learn why.
    pub fn revoke_token<T: Revocable + ?Sized>(&self, token: &T) -> bool {
        self.revoke_token_with_outcome(token).is_revoked()
    }

    /// Asks the authority to revoke a token, reporting what happened
    #[tracing::instrument(
        skip_all,
        fields(endpoint = %self.inner.config.endpoints().revoke())
    )]
    pub fn revoke_token_with_outcome<T: Revocable + ?Sized>(&self, token: &T) -> RevocationOutcome {
        let value = token.token_value();
        if value.is_empty() {
            tracing::warn!("refusing to revoke an empty token");
            return RevocationOutcome::MissingToken;
        }

        let body = form_urlencoded::Serializer::new(String::new())
            .append_pair("token", value)
            .finish();

        match self.post_form(self.inner.config.endpoints().revoke(), body) {
            Ok(resp) if resp.status.is_success() => {
                tracing::info!("token revoked");
                RevocationOutcome::Revoked
            }
            Ok(resp) => {
                tracing::warn!(
                    status = resp.status.as_u16(),
                    "authority refused to revoke token"
                );
                RevocationOutcome::Rejected {
                    status: resp.status,
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "unable to revoke token");
                RevocationOutcome::Failed(err)
            }
        }
    }

    /// Asks the authority whether a token is active
    #[tracing::instrument(
        skip_all,
        fields(endpoint = %self.inner.config.endpoints().introspect())
    )]
    pub fn introspect_token<T: Revocable + ?Sized>(
        &self,
        token: &T,
    ) -> Result<Introspection, TokenRequestError> {
        let value = token.token_value();
        if value.is_empty() {
            return Err(InvalidToken::EmptyAccessToken.into());
        }

        let body = form_urlencoded::Serializer::new(String::new())
            .append_pair("token", value)
            .finish();

        let resp = self.post_form(self.inner.config.endpoints().introspect(), body)?;
        let resp = check_status(resp)?;
        let introspection: Introspection = serde_json::from_slice(&resp.body)?;

        tracing::debug!(active = introspection.active, "introspected token");
        Ok(introspection)
    }

    fn request_token(
        &self,
        grant_type: &str,
        params: &[(&str, &str)],
    ) -> Result<Token, TokenRequestError> {
        let config = &self.inner.config;

        let mut form = form_urlencoded::Serializer::new(String::new());
        form.append_pair("grant_type", grant_type);
        for (name, value) in params {
            form.append_pair(name, value);
        }
        form.append_pair("client_id", config.client_id().as_str());
        form.append_pair("client_secret", config.client_secret().expose());

        let resp = self.post_form(config.endpoints().token(), form.finish())?;
        let resp = check_status(resp)?;
        let body: TokenResponse = serde_json::from_slice(&resp.body)?;
        let token = Token::from_response(body, self.clone(), &System)?;

        tracing::info!(
            expires_in = token.expires_in().map(|d| d.0),
            scope = %token.scope(),
            has_refresh_token = token.refresh_token().is_some(),
            "received token from authority"
        );

        Ok(token)
    }

    fn post_form(&self, endpoint: &Url, body: String) -> Result<HttpResponse, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(FORM_CONTENT_TYPE),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static(JSON_ACCEPT));

        let request = HttpRequest {
            method: Method::POST,
            url: endpoint.clone(),
            headers,
            body: body.into_bytes(),
        };

        let resp = self.inner.transport.execute(request).map_err(|err| {
            tracing::debug!(error = %err, timeout = err.is_timeout(), "request to authority failed");
            err
        })?;

        tracing::debug!(status = resp.status.as_u16(), "authority responded");
        Ok(resp)
    }
}

fn check_status(resp: HttpResponse) -> Result<HttpResponse, TokenRequestError> {
    let status = resp.status;
    if status.is_success() {
        Ok(resp)
    } else if status.is_client_error() {
        Err(TokenRequestError::Authentication {
            status,
            body: resp.text(),
        })
    } else {
        Err(TokenRequestError::UnexpectedStatus {
            status,
            body: resp.text(),
        })
    }
}

fn generate_state() -> Result<State, AuthorizationUrlError> {
    let mut bytes = [0u8; STATE_BYTES];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| AuthorizationUrlError::RandomnessUnavailable)?;
    Ok(State::new(hex::encode(bytes)))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tracing_test::traced_test;

    use super::*;

    struct Offline;

    impl HttpTransport for Offline {
        fn execute(&self, _: HttpRequest) -> Result<HttpResponse, TransportError> {
            Err(TransportError::connection("offline"))
        }
    }

    fn client() -> OAuthClient {
        let config =
            OAuthClientConfig::new("my-app", "my-secret", "https://my-app.example/cb").unwrap();
        OAuthClient::with_transport(config, Offline)
    }

    fn query(url: &Url) -> HashMap<String, String> {
        url.query_pairs().into_owned().collect()
    }

    #[test]
    fn authorization_url_has_required_parameters() {
        let req = client()
            .authorization_url(["record:read", "note:write"], None)
            .unwrap();
        let params = query(&req.url);

        assert_eq!(req.url.host_str(), Some("auth.verity.io"));
        assert_eq!(req.url.path(), "/authorize");
        assert_eq!(params["client_id"], "my-app");
        assert_eq!(params["redirect_uri"], "https://my-app.example/cb");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["scope"], "record:read note:write");
        assert_eq!(params["state"], req.state.as_str());
        assert!(req.url.as_str().contains("scope=record%3Aread+note%3Awrite"));
    }

    #[test]
    fn generated_state_is_hex_and_unique() {
        let client = client();
        let a = client.authorization_url(["record:read"], None).unwrap().state;
        let b = client.authorization_url(["record:read"], None).unwrap().state;

        assert_eq!(a.as_str().len(), 32);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn supplied_state_is_kept() {
        let req = client()
            .authorization_url(["task:read"], Some(State::from_static("opaque-123")))
            .unwrap();
        assert_eq!(req.state.as_str(), "opaque-123");
        assert_eq!(query(&req.url)["state"], "opaque-123");
    }

    #[test]
    fn unregistered_scope_is_rejected_before_anything_else() {
        let err = client()
            .authorization_url(["record:read", "bogus:scope"], None)
            .unwrap_err();
        match err {
            AuthorizationUrlError::InvalidScope(err) => {
                assert_eq!(err.invalid_scopes(), ["bogus:scope"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_code_is_rejected_without_request() {
        let err = client().exchange_code_for_token("  ").unwrap_err();
        assert!(matches!(
            err,
            TokenRequestError::Configuration(ConfigurationError::MissingAuthorizationCode)
        ));
    }

    #[test]
    fn empty_refresh_token_is_rejected_without_request() {
        let err = client().refresh_token(&RefreshToken::new("")).unwrap_err();
        assert!(matches!(
            err,
            TokenRequestError::Configuration(ConfigurationError::MissingRefreshToken)
        ));
    }

    #[test]
    fn revoking_empty_token_sends_nothing() {
        let outcome = client().revoke_token_with_outcome("");
        assert!(matches!(outcome, RevocationOutcome::MissingToken));
    }

    #[test]
    #[traced_test]
    fn unreachable_authority_surfaces_as_connection_error() {
        let err = client().exchange_code_for_token("abc").unwrap_err();
        assert!(err.is_connection());
        assert!(logs_contain("authorization_code"));
        assert!(logs_contain("request to authority failed"));
        assert!(!logs_contain("my-secret"));
    }

    #[test]
    #[traced_test]
    fn failed_revocation_is_logged_and_swallowed() {
        assert!(!client().revoke_token("some-access-token"));
        assert!(logs_contain("unable to revoke token"));
        assert!(!logs_contain("some-access-token"));
    }

    #[test]
    fn debug_hides_secret() {
        let debug = format!("{:?}", client());
        assert!(debug.contains("my-app"));
        assert!(!debug.contains("my-secret"));
    }
}
