use aliri_braid::braid;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of trailing characters a redacted secret may reveal
const REVEALED_SUFFIX: usize = 4;

macro_rules! redacted_secret {
    ($(#[$meta:meta])* $ty:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $ty(String);

        impl $ty {
            /// Wraps a raw secret value
            #[inline]
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            /// The raw secret
            ///
            /// Only hand this to something that must transmit the value.
            #[inline]
            pub fn expose(&self) -> &str {
                &self.0
            }

            /// Whether the secret is the empty string
            #[inline]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl From<String> for $ty {
            #[inline]
            fn from(raw: String) -> Self {
                Self(raw)
            }
        }

        impl From<&'_ str> for $ty {
            #[inline]
            fn from(raw: &str) -> Self {
                Self(raw.to_owned())
            }
        }

        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                redact(&self.0, f)
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                redact(&self.0, f)
            }
        }
    };
}

/// Writes `***` followed by at most the last four characters
///
/// Secrets too short to hide anything behind the suffix are fully masked.
fn redact(unprotected: &str, f: &mut fmt::Formatter) -> fmt::Result {
    f.write_str("***")?;
    let len = unprotected.chars().count();
    if len > REVEALED_SUFFIX * 2 {
        let start = unprotected
            .char_indices()
            .nth(len - REVEALED_SUFFIX)
            .map_or(unprotected.len(), |(idx, _)| idx);
        f.write_str(&unprotected[start..])?;
    }
    Ok(())
}

redacted_secret! {
    /// An OAuth2 access token
    AccessToken
}

redacted_secret! {
    /// An OAuth2 refresh token
    RefreshToken
}

redacted_secret! {
    /// A client secret
    ClientSecret
}

redacted_secret! {
    /// A one-time authorization code received on the redirect URI
    AuthorizationCode
}

/// A client ID
#[braid(serde)]
pub struct ClientId;

/// The opaque `state` value that ties an authorization redirect back to the
/// request that started it
#[braid(serde)]
pub struct State;
