//! Signature verification and typed events for Verity webhooks
//!
//! Verity signs every webhook delivery with a secret shared with the
//! receiving application. The `X-Verity-Signature` header carries the
//! delivery timestamp and one or more HMAC-SHA256 digests:
//!
//! ```text
//! X-Verity-Signature: t=1700000000 v1=5257a869e7ecebeda32affa62cdca3fa51cad7e77a0e56ff536d0ce8e108d8bd
//! ```
//!
//! A delivery is authentic when its timestamp lies within a tolerance of
//! the local clock (five minutes unless configured otherwise) and any one
//! of the digests matches. Several digests appear while a secret is being
//! rotated.
//!
//! [`WebhookVerifier::verify`] answers yes or no and never fails.
//! [`verify_signature`] and [`Handler`] report a [`VerificationFailure`]
//! explaining the rejection, and [`Handler::parse_and_verify`] decodes the
//! authenticated body into a [`WebhookEvent`].
//!
//! ```
//! use verity_webhooks::{calculate_signature, Handler, RawWebhookRequest};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let handler = Handler::new("whsec_test")?;
//!
//! # let body = br#"{"id":"evt_1","type":"record.created","data":{"record_id":"rec_1"}}"#.to_vec();
//! # let now = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH)?.as_secs().to_string();
//! # let signature = calculate_signature(&body, &now, "whsec_test");
//! let request = RawWebhookRequest {
//!     headers: [
//!         ("HTTP_X_VERITY_SIGNATURE".to_owned(), signature),
//!         ("HTTP_X_VERITY_TIMESTAMP".to_owned(), now),
//!     ]
//!     .into_iter()
//!     .collect(),
//!     body,
//! };
//!
//! let event = handler.parse_and_verify(&request)?;
//! assert!(event.is_created_event());
//! assert_eq!(event.record_id(), Some("rec_1"));
//! # Ok(())
//! # }
//! ```

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

mod error;
mod event;
mod handler;
mod headers;
mod signature;

pub use error::{EmptySecret, MissingHeader, SignatureVerificationError, VerificationFailure};
pub use event::{EventAction, EventType, WebhookEvent};
pub use handler::{Handler, RawWebhookRequest, WebhookRequest};
pub use headers::{
    extract_from_headers, SignatureHeaders, WebhookHeader, SIGNATURE_HEADER, TIMESTAMP_HEADER,
};
pub use signature::{
    calculate_signature, verify_signature, verify_signature_with_clock, WebhookVerifier,
    DEFAULT_TOLERANCE,
};
