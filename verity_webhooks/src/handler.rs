use std::collections::HashMap;

use verity_clock::{Clock, DurationSecs, System};

use crate::{
    error::{invalid_json, EmptySecret, MissingHeader, SignatureVerificationError},
    extract_from_headers, SignatureHeaders, WebhookEvent, WebhookVerifier,
};

/// An inbound webhook delivery
pub trait WebhookRequest {
    /// The signature and timestamp the delivery carries
    fn signature_headers(&self) -> Result<SignatureHeaders, MissingHeader>;

    /// The raw request body
    fn body(&self) -> &[u8];
}

/// A framework-neutral webhook delivery
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawWebhookRequest {
    /// Request headers, under any casing or separator convention
    pub headers: HashMap<String, String>,
    /// The raw request body
    pub body: Vec<u8>,
}

impl WebhookRequest for RawWebhookRequest {
    fn signature_headers(&self) -> Result<SignatureHeaders, MissingHeader> {
        extract_from_headers(&self.headers)
    }

    #[inline]
    fn body(&self) -> &[u8] {
        &self.body
    }
}

impl<B: AsRef<[u8]>> WebhookRequest for http::Request<B> {
    fn signature_headers(&self) -> Result<SignatureHeaders, MissingHeader> {
        extract_from_headers(self.headers())
    }

    #[inline]
    fn body(&self) -> &[u8] {
        http::Request::body(self).as_ref()
    }
}

impl<R: WebhookRequest + ?Sized> WebhookRequest for &'_ R {
    #[inline]
    fn signature_headers(&self) -> Result<SignatureHeaders, MissingHeader> {
        (**self).signature_headers()
    }

    #[inline]
    fn body(&self) -> &[u8] {
        (**self).body()
    }
}

/// Authenticates and decodes webhook deliveries
#[derive(Debug)]
pub struct Handler<C = System> {
    verifier: WebhookVerifier<C>,
}

impl Handler {
    /// Constructs a handler for the given shared secret
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, EmptySecret> {
        Ok(Self {
            verifier: WebhookVerifier::new(secret)?,
        })
    }
}

impl<C> Handler<C> {
    /// Wraps an existing verifier
    pub fn from_verifier(verifier: WebhookVerifier<C>) -> Self {
        Self { verifier }
    }

    /// Sets the tolerance deliveries are checked with
    #[must_use]
    pub fn with_tolerance(self, tolerance: DurationSecs) -> Self {
        Self {
            verifier: self.verifier.with_tolerance(tolerance),
        }
    }

    /// The underlying verifier
    #[inline]
    pub fn verifier(&self) -> &WebhookVerifier<C> {
        &self.verifier
    }
}

impl<C: Clock> Handler<C> {
    /// Authenticates a delivery
    #[tracing::instrument(skip_all)]
    pub fn verify<R: WebhookRequest>(&self, request: &R) -> Result<(), SignatureVerificationError> {
        let headers = request.signature_headers().map_err(|err| {
            tracing::debug!(header = %err.header(), "webhook delivery missing header");
            err
        })?;

        self.verifier
            .verify_parts(request.body(), &headers.signature, &headers.timestamp)
    }

    /// Authenticates a delivery, then decodes its body
    #[tracing::instrument(skip_all)]
    pub fn parse_and_verify<R: WebhookRequest>(
        &self,
        request: &R,
    ) -> Result<WebhookEvent, SignatureVerificationError> {
        self.verify(request)?;

        let event: WebhookEvent = serde_json::from_slice(request.body()).map_err(|err| {
            tracing::debug!(error = %err, "authenticated webhook body is not a JSON object");
            invalid_json(err)
        })?;

        tracing::debug!(
            id = event.id(),
            event_type = event.raw_type(),
            "accepted webhook delivery"
        );
        Ok(event)
    }
}
