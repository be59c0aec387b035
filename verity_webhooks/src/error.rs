//! Errors raised while authenticating webhook deliveries

use std::fmt;

use thiserror::Error;

use crate::WebhookHeader;

/// Why a webhook delivery was not authenticated
///
/// The `Display` form of each reason is stable and may be matched on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum VerificationFailure {
    /// The payload was empty
    MissingPayload,
    /// No signature was supplied
    MissingSignature,
    /// No timestamp was supplied
    MissingTimestamp,
    /// The shared secret was empty
    MissingSecret,
    /// The timestamp was not a count of seconds since the epoch
    InvalidTimestamp,
    /// The timestamp is older than the tolerance allows
    TimestampTooOld,
    /// The timestamp is further in the future than the tolerance allows
    TimestampInFuture,
    /// No supplied signature matched the payload
    SignatureMismatch,
    /// A required header was absent from the request
    MissingHeader(WebhookHeader),
    /// The authenticated payload was not a JSON object
    InvalidJson,
}

impl VerificationFailure {
    /// The stable reason string
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingPayload => "Payload cannot be nil",
            Self::MissingSignature => "Signature cannot be nil or empty",
            Self::MissingTimestamp => "Timestamp cannot be nil or empty",
            Self::MissingSecret => "Secret cannot be nil or empty",
            Self::InvalidTimestamp => "Invalid timestamp format",
            Self::TimestampTooOld => "Timestamp too old",
            Self::TimestampInFuture => "Timestamp too far in the future",
            Self::SignatureMismatch => "Signature mismatch",
            Self::MissingHeader(WebhookHeader::Signature) => "Missing signature header",
            Self::MissingHeader(WebhookHeader::Timestamp) => "Missing timestamp header",
            Self::InvalidJson => "Invalid JSON payload",
        }
    }
}

impl fmt::Display for VerificationFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A webhook delivery could not be authenticated or decoded
#[derive(Debug, Error)]
#[error("Webhook signature verification failed: {reason}")]
pub struct SignatureVerificationError {
    reason: VerificationFailure,
    #[source]
    source: Option<serde_json::Error>,
}

impl SignatureVerificationError {
    /// Why verification failed
    #[inline]
    pub fn reason(&self) -> VerificationFailure {
        self.reason
    }
}

impl From<VerificationFailure> for SignatureVerificationError {
    #[inline]
    fn from(reason: VerificationFailure) -> Self {
        Self {
            reason,
            source: None,
        }
    }
}

impl From<MissingHeader> for SignatureVerificationError {
    #[inline]
    fn from(err: MissingHeader) -> Self {
        VerificationFailure::MissingHeader(err.header).into()
    }
}

#[inline]
pub(crate) fn invalid_json(source: serde_json::Error) -> SignatureVerificationError {
    SignatureVerificationError {
        reason: VerificationFailure::InvalidJson,
        source: Some(source),
    }
}

/// A webhook verifier was constructed without a secret
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("Secret cannot be nil or empty")]
pub struct EmptySecret {
    _p: (),
}

#[inline]
pub(crate) const fn empty_secret() -> EmptySecret {
    EmptySecret { _p: () }
}

/// A webhook header was absent
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("missing required header `{}`", .header.name())]
pub struct MissingHeader {
    header: WebhookHeader,
}

impl MissingHeader {
    /// The missing header
    #[inline]
    pub fn header(&self) -> WebhookHeader {
        self.header
    }
}

#[inline]
pub(crate) const fn missing_header(header: WebhookHeader) -> MissingHeader {
    MissingHeader { header }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_stable_reason() {
        let err = SignatureVerificationError::from(VerificationFailure::TimestampTooOld);
        assert_eq!(
            err.to_string(),
            "Webhook signature verification failed: Timestamp too old"
        );
        assert_eq!(err.reason(), VerificationFailure::TimestampTooOld);
    }

    #[test]
    fn missing_header_reasons() {
        let sig = SignatureVerificationError::from(missing_header(WebhookHeader::Signature));
        assert_eq!(sig.reason().as_str(), "Missing signature header");
        let ts = SignatureVerificationError::from(missing_header(WebhookHeader::Timestamp));
        assert_eq!(ts.reason().as_str(), "Missing timestamp header");
    }

    #[test]
    fn empty_secret_message() {
        assert_eq!(empty_secret().to_string(), "Secret cannot be nil or empty");
    }
}
