use std::fmt;

use crate::error::{missing_header, MissingHeader};

/// Header carrying `t=<unix> v1=<hex>`, or only the `v1` entries
pub const SIGNATURE_HEADER: &str = "X-Verity-Signature";

/// Header carrying the delivery timestamp when the signature header does
/// not
pub const TIMESTAMP_HEADER: &str = "X-Verity-Timestamp";

/// The headers a webhook delivery is authenticated with
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WebhookHeader {
    /// [`SIGNATURE_HEADER`]
    Signature,
    /// [`TIMESTAMP_HEADER`]
    Timestamp,
}

impl WebhookHeader {
    /// The canonical header name
    pub const fn name(self) -> &'static str {
        match self {
            Self::Signature => SIGNATURE_HEADER,
            Self::Timestamp => TIMESTAMP_HEADER,
        }
    }

    /// Whether `raw` names this header
    ///
    /// Matching ignores case, treats `_` as `-` and skips a CGI-style
    /// `HTTP_` prefix, so `HTTP_X_VERITY_SIGNATURE` names the signature
    /// header.
    pub fn matches(self, raw: &str) -> bool {
        let name = self.name();
        let raw = strip_cgi_prefix(raw);
        raw.len() == name.len()
            && raw
                .bytes()
                .zip(name.bytes())
                .all(|(r, n)| normalize(r) == normalize(n))
    }
}

impl fmt::Display for WebhookHeader {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn normalize(b: u8) -> u8 {
    match b {
        b'_' => b'-',
        b => b.to_ascii_lowercase(),
    }
}

fn strip_cgi_prefix(raw: &str) -> &str {
    const PREFIX: &[u8] = b"http-";
    let bytes = raw.as_bytes();
    if bytes.len() > PREFIX.len()
        && bytes[..PREFIX.len()]
            .iter()
            .zip(PREFIX)
            .all(|(&r, &p)| normalize(r) == p)
    {
        &raw[PREFIX.len()..]
    } else {
        raw
    }
}

/// The signature and timestamp of a webhook delivery
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureHeaders {
    /// The signature header value
    pub signature: String,
    /// The delivery timestamp
    pub timestamp: String,
}

/// Finds the signature and timestamp among a request's headers
///
/// Header names are matched as described in [`WebhookHeader::matches`].
/// When no timestamp header is present, the `t=` entry of the signature
/// header is used instead. Values that are not valid UTF-8 are treated as
/// absent.
///
/// ```
/// use std::collections::HashMap;
/// use verity_webhooks::extract_from_headers;
///
/// let mut headers = HashMap::new();
/// headers.insert("HTTP_X_VERITY_SIGNATURE", "v1=abc");
/// headers.insert("x-verity-timestamp", "1700000000");
///
/// let found = extract_from_headers(&headers)?;
/// assert_eq!(found.signature, "v1=abc");
/// assert_eq!(found.timestamp, "1700000000");
/// # Ok::<(), verity_webhooks::MissingHeader>(())
/// ```
pub fn extract_from_headers<I, K, V>(headers: I) -> Result<SignatureHeaders, MissingHeader>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<[u8]>,
{
    let mut signature = None;
    let mut timestamp = None;

    for (name, value) in headers {
        let name = name.as_ref();
        let slot = if WebhookHeader::Signature.matches(name) {
            &mut signature
        } else if WebhookHeader::Timestamp.matches(name) {
            &mut timestamp
        } else {
            continue;
        };

        if slot.is_none() {
            *slot = std::str::from_utf8(value.as_ref())
                .ok()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_owned);
        }
    }

    let signature = signature.ok_or(missing_header(WebhookHeader::Signature))?;
    let timestamp = match timestamp {
        Some(timestamp) => timestamp,
        None => embedded_timestamp(&signature)
            .ok_or(missing_header(WebhookHeader::Timestamp))?
            .to_owned(),
    };

    Ok(SignatureHeaders {
        signature,
        timestamp,
    })
}

fn embedded_timestamp(signature: &str) -> Option<&str> {
    signature
        .split(|c: char| c == ',' || c.is_whitespace())
        .find_map(|token| token.strip_prefix("t="))
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_names_are_forgiving() {
        for raw in [
            "X-Verity-Signature",
            "x-verity-signature",
            "X_VERITY_SIGNATURE",
            "HTTP_X_VERITY_SIGNATURE",
            "http-x-verity-signature",
        ] {
            assert!(WebhookHeader::Signature.matches(raw), "{raw}");
        }

        assert!(!WebhookHeader::Signature.matches("X-Verity-Timestamp"));
        assert!(!WebhookHeader::Signature.matches("X-Verity-Signatures"));
        assert!(!WebhookHeader::Signature.matches("HTTP_"));
        assert!(!WebhookHeader::Timestamp.matches("Verity-Timestamp"));
    }

    #[test]
    fn extracts_both_headers() {
        let headers = vec![
            ("Content-Type", "application/json"),
            ("X_Verity_Signature", " v1=abc "),
            ("X-VERITY-TIMESTAMP", "1700000000"),
        ];
        let found = extract_from_headers(headers).unwrap();
        assert_eq!(found.signature, "v1=abc");
        assert_eq!(found.timestamp, "1700000000");
    }

    #[test]
    fn falls_back_to_embedded_timestamp() {
        let headers = [("x-verity-signature", "t=1700000000,v1=abc")];
        let found = extract_from_headers(headers).unwrap();
        assert_eq!(found.timestamp, "1700000000");
    }

    #[test]
    fn missing_headers_are_reported() {
        let none: [(&str, &str); 0] = [];
        let err = extract_from_headers(none).unwrap_err();
        assert_eq!(err.header(), WebhookHeader::Signature);

        let err = extract_from_headers([("x-verity-signature", "v1=abc")]).unwrap_err();
        assert_eq!(err.header(), WebhookHeader::Timestamp);

        let err = extract_from_headers([("x-verity-signature", "")]).unwrap_err();
        assert_eq!(err.header(), WebhookHeader::Signature);
    }

    #[test]
    fn works_with_header_map() {
        let mut headers = http::HeaderMap::new();
        headers.insert("x-verity-signature", http::HeaderValue::from_static("v1=abc"));
        headers.insert("x-verity-timestamp", http::HeaderValue::from_static("42"));
        let found = extract_from_headers(&headers).unwrap();
        assert_eq!(found.timestamp, "42");
    }
}
