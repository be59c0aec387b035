use std::fmt;

use ring::hmac;
use verity_clock::{Clock, DurationSecs, System, UnixTime};

use crate::error::{empty_secret, EmptySecret, SignatureVerificationError, VerificationFailure};

/// How far a delivery's timestamp may drift from the local clock, in
/// either direction, by default
pub const DEFAULT_TOLERANCE: DurationSecs = DurationSecs(300);

const TIMESTAMP_KEY: &str = "t";
const SIGNATURE_SCHEME: &str = "v1";

/// Authenticates webhook deliveries signed with a shared secret
///
/// A delivery is authentic when its timestamp is within the tolerance of
/// the verifier's clock and one of its `v1` signatures is the hex-encoded
/// HMAC-SHA256 of `"{timestamp}.{payload}"` under the secret.
///
/// ```
/// use verity_webhooks::{calculate_signature, WebhookVerifier};
///
/// let verifier = WebhookVerifier::new("whsec_test")?;
///
/// let payload = br#"{"id":"evt_1","type":"record.created"}"#;
/// let now = std::time::SystemTime::now()
///     .duration_since(std::time::UNIX_EPOCH)?
///     .as_secs();
/// let header = format!("t={} {}", now, calculate_signature(payload, &now.to_string(), "whsec_test"));
///
/// assert!(verifier.verify(payload, &header));
/// assert!(!verifier.verify(payload, "t=0 v1=00"));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct WebhookVerifier<C = System> {
    key: hmac::Key,
    tolerance: DurationSecs,
    clock: C,
}

impl<C: fmt::Debug> fmt::Debug for WebhookVerifier<C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("tolerance", &self.tolerance)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    /// Constructs a verifier for the given shared secret
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, EmptySecret> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(empty_secret());
        }

        Ok(Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret),
            tolerance: DEFAULT_TOLERANCE,
            clock: System,
        })
    }
}

impl<C> WebhookVerifier<C> {
    /// Sets the tolerance used by [`verify`](Self::verify)
    #[must_use]
    pub fn with_tolerance(self, tolerance: DurationSecs) -> Self {
        Self { tolerance, ..self }
    }

    /// Replaces the clock deliveries are checked against
    pub fn with_clock<D>(self, clock: D) -> WebhookVerifier<D> {
        WebhookVerifier {
            key: self.key,
            tolerance: self.tolerance,
            clock,
        }
    }

    /// The configured tolerance
    #[inline]
    pub fn tolerance(&self) -> DurationSecs {
        self.tolerance
    }
}

impl<C: Clock> WebhookVerifier<C> {
    /// Whether `signature_header` authenticates `payload`
    ///
    /// Never fails: anything that is not a valid, timely signature yields
    /// `false`.
    pub fn verify(&self, payload: impl AsRef<[u8]>, signature_header: &str) -> bool {
        self.verify_with_tolerance(payload, signature_header, self.tolerance)
    }

    /// Whether `signature_header` authenticates `payload` within the given
    /// tolerance
    pub fn verify_with_tolerance(
        &self,
        payload: impl AsRef<[u8]>,
        signature_header: &str,
        tolerance: DurationSecs,
    ) -> bool {
        match self.check_header(payload.as_ref(), signature_header, tolerance) {
            Ok(()) => true,
            Err(reason) => {
                tracing::debug!(%reason, "rejected webhook signature");
                false
            }
        }
    }

    /// Authenticates a payload whose signature and timestamp arrived
    /// separately
    ///
    /// `signature` holds one or more `v1=<hex>` entries, or bare hex
    /// digests.
    pub fn verify_parts(
        &self,
        payload: impl AsRef<[u8]>,
        signature: &str,
        timestamp: &str,
    ) -> Result<(), SignatureVerificationError> {
        let payload = payload.as_ref();
        precheck(payload, signature, timestamp)
            .and_then(|candidates| {
                authenticate(
                    &self.key,
                    payload,
                    timestamp,
                    &candidates,
                    self.tolerance,
                    self.clock.now(),
                )
            })
            .map_err(|reason| {
                tracing::debug!(%reason, "rejected webhook signature");
                reason.into()
            })
    }

    fn check_header(
        &self,
        payload: &[u8],
        signature_header: &str,
        tolerance: DurationSecs,
    ) -> Result<(), VerificationFailure> {
        if payload.is_empty() {
            return Err(VerificationFailure::MissingPayload);
        }

        let (timestamp, candidates) = parse_signature_header(signature_header)?;
        authenticate(
            &self.key,
            payload,
            timestamp,
            &candidates,
            tolerance,
            self.clock.now(),
        )
    }
}

/// Authenticates a payload against a secret, reporting why it failed
///
/// Checks are made in a fixed order, so the same input always yields the
/// same [`VerificationFailure`].
pub fn verify_signature(
    payload: impl AsRef<[u8]>,
    signature: &str,
    timestamp: &str,
    secret: &str,
    tolerance: DurationSecs,
) -> Result<(), SignatureVerificationError> {
    verify_signature_with_clock(payload, signature, timestamp, secret, tolerance, &System)
}

/// Authenticates a payload against a secret according to `clock`
pub fn verify_signature_with_clock<C: Clock>(
    payload: impl AsRef<[u8]>,
    signature: &str,
    timestamp: &str,
    secret: &str,
    tolerance: DurationSecs,
    clock: &C,
) -> Result<(), SignatureVerificationError> {
    let payload = payload.as_ref();
    let candidates = precheck(payload, signature, timestamp)?;
    if secret.is_empty() {
        return Err(VerificationFailure::MissingSecret.into());
    }

    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    authenticate(&key, payload, timestamp, &candidates, tolerance, clock.now())?;
    Ok(())
}

/// The `v1=<hex>` signature of a payload sent at `timestamp`
pub fn calculate_signature(payload: impl AsRef<[u8]>, timestamp: &str, secret: &str) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    let tag = hmac::sign(&key, &signed_message(timestamp, payload.as_ref()));
    format!("{}={}", SIGNATURE_SCHEME, hex::encode(tag.as_ref()))
}

fn tokens(header: &str) -> impl Iterator<Item = &str> {
    header
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
}

/// Splits `t=<unix> v1=<hex> ...` into the timestamp and the candidate
/// digests; unknown keys are skipped
fn parse_signature_header(header: &str) -> Result<(&str, Vec<&str>), VerificationFailure> {
    let mut timestamp = None;
    let mut candidates = Vec::new();

    for token in tokens(header) {
        match token.split_once('=') {
            Some((TIMESTAMP_KEY, value)) => {
                if timestamp.replace(value).is_some() {
                    return Err(VerificationFailure::InvalidTimestamp);
                }
            }
            Some((SIGNATURE_SCHEME, value)) => candidates.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp
        .filter(|t| !t.is_empty())
        .ok_or(VerificationFailure::MissingTimestamp)?;
    if candidates.is_empty() {
        return Err(VerificationFailure::MissingSignature);
    }

    Ok((timestamp, candidates))
}

/// Candidate digests from a signature header that carries no timestamp
fn signature_candidates(signature: &str) -> Vec<&str> {
    tokens(signature)
        .filter_map(|token| match token.split_once('=') {
            Some((SIGNATURE_SCHEME, value)) => Some(value),
            Some(_) => None,
            None => Some(token),
        })
        .collect()
}

fn precheck<'a>(
    payload: &[u8],
    signature: &'a str,
    timestamp: &str,
) -> Result<Vec<&'a str>, VerificationFailure> {
    if payload.is_empty() {
        return Err(VerificationFailure::MissingPayload);
    }

    let candidates = signature_candidates(signature);
    if candidates.is_empty() {
        return Err(VerificationFailure::MissingSignature);
    }

    if timestamp.trim().is_empty() {
        return Err(VerificationFailure::MissingTimestamp);
    }

    Ok(candidates)
}

fn signed_message(timestamp: &str, payload: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(timestamp.len() + 1 + payload.len());
    message.extend_from_slice(timestamp.as_bytes());
    message.push(b'.');
    message.extend_from_slice(payload);
    message
}

fn authenticate(
    key: &hmac::Key,
    payload: &[u8],
    timestamp: &str,
    candidates: &[&str],
    tolerance: DurationSecs,
    now: UnixTime,
) -> Result<(), VerificationFailure> {
    let timestamp = timestamp.trim();
    let sent_at: UnixTime = timestamp
        .parse()
        .map_err(|_| VerificationFailure::InvalidTimestamp)?;

    if now.seconds_since(sent_at) > tolerance.as_signed() {
        return Err(VerificationFailure::TimestampTooOld);
    }
    if sent_at.seconds_since(now) > tolerance.as_signed() {
        return Err(VerificationFailure::TimestampInFuture);
    }

    let message = signed_message(timestamp, payload);
    let matched = candidates.iter().any(|candidate| {
        // a digest that is not hex, or not the length of a SHA-256 tag,
        // can never verify
        hex::decode(candidate)
            .map(|digest| hmac::verify(key, &message, &digest).is_ok())
            .unwrap_or(false)
    });

    if matched {
        Ok(())
    } else {
        Err(VerificationFailure::SignatureMismatch)
    }
}
