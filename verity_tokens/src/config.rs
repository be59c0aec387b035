use std::convert::TryFrom;

use serde::Deserialize;
use url::Url;

use crate::{ClientId, ClientIdRef, ClientSecret, ConfigurationError};

/// Base URL of the Verity authorization server, which serves `/authorize`
pub const DEFAULT_AUTH_BASE: &str = "https://auth.verity.io";

/// Base URL of the Verity API server, which serves `/oauth/*`
pub const DEFAULT_API_BASE: &str = "https://api.verity.io";

/// The four endpoints the token lifecycle talks to
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoints {
    authorize: Url,
    token: Url,
    revoke: Url,
    introspect: Url,
}

impl Endpoints {
    /// The production Verity endpoints
    pub fn verity() -> Result<Self, ConfigurationError> {
        Self::from_bases(DEFAULT_AUTH_BASE, DEFAULT_API_BASE)
    }

    /// Endpoints rooted at the given authorization and API servers
    ///
    /// Intended for sandbox deployments of the platform. Paths on the bases
    /// are kept, so `https://sandbox.example/v1` yields
    /// `https://sandbox.example/v1/oauth/token`.
    pub fn from_bases(auth_base: &str, api_base: &str) -> Result<Self, ConfigurationError> {
        let auth_base = parse_base(auth_base)?;
        let api_base = parse_base(api_base)?;

        Ok(Self {
            authorize: join(&auth_base, "authorize")?,
            token: join(&api_base, "oauth/token")?,
            revoke: join(&api_base, "oauth/revoke")?,
            introspect: join(&api_base, "oauth/introspect")?,
        })
    }

    /// `GET` endpoint the user agent is sent to
    #[inline]
    pub fn authorize(&self) -> &Url {
        &self.authorize
    }

    /// `POST` endpoint for code exchange and refresh
    #[inline]
    pub fn token(&self) -> &Url {
        &self.token
    }

    /// `POST` endpoint for revocation
    #[inline]
    pub fn revoke(&self) -> &Url {
        &self.revoke
    }

    /// `POST` endpoint for introspection
    #[inline]
    pub fn introspect(&self) -> &Url {
        &self.introspect
    }
}

fn is_http(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https") && url.has_host()
}

fn parse_base(raw: &str) -> Result<Url, ConfigurationError> {
    let invalid = || ConfigurationError::InvalidEndpoint {
        url: raw.to_owned(),
    };

    let mut url = Url::parse(raw).map_err(|_| invalid())?;
    if !is_http(&url) {
        return Err(invalid());
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn join(base: &Url, path: &str) -> Result<Url, ConfigurationError> {
    base.join(path)
        .map_err(|_| ConfigurationError::InvalidEndpoint {
            url: format!("{}{}", base, path),
        })
}

/// Validated OAuth client registration
///
/// Never mutated after construction. May also be deserialized, in which
/// case the same validation applies:
///
/// ```
/// use verity_tokens::OAuthClientConfig;
///
/// let config: OAuthClientConfig = serde_json::from_str(r#"{
///     "client_id": "my-app",
///     "client_secret": "my-secret",
///     "redirect_uri": "https://my-app.example/callback"
/// }"#).unwrap();
///
/// assert_eq!(config.client_id().as_str(), "my-app");
/// assert_eq!(config.endpoints().token().as_str(), "https://api.verity.io/oauth/token");
/// ```
#[derive(Clone, Debug, Deserialize)]
#[serde(try_from = "RawConfig")]
pub struct OAuthClientConfig {
    client_id: ClientId,
    client_secret: ClientSecret,
    redirect_uri: String,
    endpoints: Endpoints,
}

#[derive(Deserialize)]
struct RawConfig {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    #[serde(default)]
    auth_base: Option<String>,
    #[serde(default)]
    api_base: Option<String>,
}

impl TryFrom<RawConfig> for OAuthClientConfig {
    type Error = ConfigurationError;

    fn try_from(raw: RawConfig) -> Result<Self, Self::Error> {
        let config = Self::new(raw.client_id, raw.client_secret, &raw.redirect_uri)?;
        match (raw.auth_base, raw.api_base) {
            (None, None) => Ok(config),
            (auth, api) => {
                let endpoints = Endpoints::from_bases(
                    auth.as_deref().unwrap_or(DEFAULT_AUTH_BASE),
                    api.as_deref().unwrap_or(DEFAULT_API_BASE),
                )?;
                Ok(config.with_endpoints(endpoints))
            }
        }
    }
}

impl OAuthClientConfig {
    /// Validates a client registration against the production endpoints
    ///
    /// All three values must be non-empty and `redirect_uri` must be an
    /// absolute `http` or `https` URL. The redirect URI is kept as given,
    /// apart from surrounding whitespace, since authorities compare it
    /// byte for byte against the registered value.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: &str,
    ) -> Result<Self, ConfigurationError> {
        let client_id = client_id.into();
        let client_secret = client_secret.into();

        if client_id.trim().is_empty() {
            return Err(ConfigurationError::MissingClientId);
        }
        if client_secret.trim().is_empty() {
            return Err(ConfigurationError::MissingClientSecret);
        }
        let redirect_uri = redirect_uri.trim();
        if redirect_uri.is_empty() {
            return Err(ConfigurationError::MissingRedirectUri);
        }

        let parsed =
            Url::parse(redirect_uri).map_err(|_| ConfigurationError::InvalidRedirectUri)?;
        if !is_http(&parsed) {
            return Err(ConfigurationError::InvalidRedirectUri);
        }

        Ok(Self {
            client_id: ClientId::new(client_id),
            client_secret: ClientSecret::new(client_secret),
            redirect_uri: redirect_uri.to_owned(),
            endpoints: Endpoints::verity()?,
        })
    }

    /// Points the client at a different deployment
    pub fn with_endpoints(self, endpoints: Endpoints) -> Self {
        Self { endpoints, ..self }
    }

    /// The registered client ID
    #[inline]
    pub fn client_id(&self) -> &ClientIdRef {
        &self.client_id
    }

    /// The registered client secret
    #[inline]
    pub fn client_secret(&self) -> &ClientSecret {
        &self.client_secret
    }

    /// The registered redirect URI, exactly as configured
    #[inline]
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// The endpoints requests are sent to
    #[inline]
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }
}
