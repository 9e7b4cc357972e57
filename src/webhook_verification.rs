//! # Webhook Signature Verification
//!
//! Clerk delivers webhooks through svix. Every delivery carries three headers:
//! `svix-id`, `svix-timestamp` and `svix-signature`. The signature is an
//! HMAC-SHA256 over `"{id}.{timestamp}.{body}"` keyed with the base64-decoded
//! signing secret, encoded as base64 and prefixed with its scheme version
//! (`v1,<signature>`). Several space-separated signatures may be present while a
//! secret is being rotated; any matching `v1` entry is accepted.

use std::time::{SystemTime, UNIX_EPOCH};

use axum::http::HeaderMap;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::debug;
use zeroize::Zeroizing;

use crate::config::ConfigError;

type HmacSha256 = Hmac<Sha256>;

pub const SVIX_ID_HEADER: &str = "svix-id";
pub const SVIX_TIMESTAMP_HEADER: &str = "svix-timestamp";
pub const SVIX_SIGNATURE_HEADER: &str = "svix-signature";

const SECRET_PREFIX: &str = "whsec_";
const SIGNATURE_VERSION: &str = "v1";

/// Errors that can occur during webhook signature verification
#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("Missing required header: {header}")]
    MissingHeader { header: &'static str },

    #[error("Invalid timestamp format: {value}")]
    InvalidTimestamp { value: String },

    #[error("Timestamp too old: {seconds}s old, max allowed: {max_seconds}s")]
    TimestampTooOld { seconds: u64, max_seconds: u64 },

    #[error("Timestamp too far in future: {seconds}s in future, max allowed: {max_seconds}s")]
    TimestampTooFuture { seconds: u64, max_seconds: u64 },

    #[error("No v1 signature present in svix-signature header")]
    NoSupportedSignature,

    #[error("Signature verification failed")]
    VerificationFailed,
}

/// Result type for webhook verification
pub type VerificationResult<T> = Result<T, VerificationError>;

/// The three svix headers of a delivery, borrowed from the request.
#[derive(Debug, Clone, Copy)]
pub struct SvixHeaders<'a> {
    pub id: &'a str,
    pub timestamp: &'a str,
    pub signature: &'a str,
}

impl<'a> SvixHeaders<'a> {
    /// Extracts the svix headers, failing on the first one that is absent,
    /// empty or not valid visible ASCII.
    pub fn from_headers(headers: &'a HeaderMap) -> VerificationResult<Self> {
        Ok(Self {
            id: required_header(headers, SVIX_ID_HEADER)?,
            timestamp: required_header(headers, SVIX_TIMESTAMP_HEADER)?,
            signature: required_header(headers, SVIX_SIGNATURE_HEADER)?,
        })
    }
}

fn required_header<'a>(headers: &'a HeaderMap, name: &'static str) -> VerificationResult<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(VerificationError::MissingHeader { header: name })
}

/// Verifies (and produces) svix webhook signatures for a single signing secret.
pub struct WebhookVerifier {
    mac: HmacSha256,
    tolerance_seconds: u64,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("mac", &"[REDACTED]")
            .field("tolerance_seconds", &self.tolerance_seconds)
            .finish()
    }
}

impl WebhookVerifier {
    /// Builds a verifier from a `whsec_`-prefixed (or bare) base64 secret.
    pub fn new(secret: &str, tolerance_seconds: u64) -> Result<Self, ConfigError> {
        let encoded = secret.trim();
        let encoded = encoded.strip_prefix(SECRET_PREFIX).unwrap_or(encoded);

        let key = Zeroizing::new(
            STANDARD
                .decode(encoded)
                .map_err(|_| ConfigError::InvalidWebhookSecret)?,
        );
        if key.is_empty() {
            return Err(ConfigError::InvalidWebhookSecret);
        }

        let mac = HmacSha256::new_from_slice(&key).map_err(|_| ConfigError::InvalidWebhookSecret)?;

        Ok(Self {
            mac,
            tolerance_seconds,
        })
    }

    /// Verifies a delivery against the current wall clock.
    pub fn verify(&self, headers: &SvixHeaders<'_>, body: &[u8]) -> VerificationResult<()> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        self.verify_at(headers, body, now)
    }

    /// Verifies a delivery as if the current time were `now` (unix seconds).
    pub fn verify_at(
        &self,
        headers: &SvixHeaders<'_>,
        body: &[u8],
        now: u64,
    ) -> VerificationResult<()> {
        debug!(
            msg_id = %headers.id,
            body_size = body.len(),
            "Starting svix signature verification"
        );

        let timestamp = headers.timestamp.parse::<u64>().map_err(|_| {
            VerificationError::InvalidTimestamp {
                value: headers.timestamp.to_string(),
            }
        })?;
        self.check_timestamp(timestamp, now)?;

        let expected = self.compute(headers.id, headers.timestamp, body);

        let mut saw_supported = false;
        for entry in headers.signature.split_whitespace() {
            let Some((version, encoded)) = entry.split_once(',') else {
                continue;
            };
            if version != SIGNATURE_VERSION {
                continue;
            }
            saw_supported = true;

            let Ok(provided) = STANDARD.decode(encoded) else {
                continue;
            };
            if bool::from(expected.as_slice().ct_eq(provided.as_slice())) {
                return Ok(());
            }
        }

        if saw_supported {
            Err(VerificationError::VerificationFailed)
        } else {
            Err(VerificationError::NoSupportedSignature)
        }
    }

    /// Produces the `svix-signature` header value for a delivery.
    pub fn sign(&self, msg_id: &str, timestamp: u64, body: &[u8]) -> String {
        format!(
            "{},{}",
            SIGNATURE_VERSION,
            STANDARD.encode(self.compute(msg_id, &timestamp.to_string(), body))
        )
    }

    fn check_timestamp(&self, timestamp: u64, now: u64) -> VerificationResult<()> {
        let time_diff = now.abs_diff(timestamp);
        if time_diff <= self.tolerance_seconds {
            return Ok(());
        }

        if now > timestamp {
            Err(VerificationError::TimestampTooOld {
                seconds: time_diff,
                max_seconds: self.tolerance_seconds,
            })
        } else {
            Err(VerificationError::TimestampTooFuture {
                seconds: time_diff,
                max_seconds: self.tolerance_seconds,
            })
        }
    }

    /// HMAC over the signed content; `timestamp` is the header value as received.
    fn compute(&self, msg_id: &str, timestamp: &str, body: &[u8]) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(msg_id.as_bytes());
        mac.update(b".");
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(body);
        mac.finalize().into_bytes().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    // Example secret from the svix documentation.
    const SECRET: &str = "whsec_MfKQ9r8GKYqrTwjUPD8ILPZIo2LaLaSw";
    const MSG_ID: &str = "msg_p5jXN8AQM9LWM0D4loKWxJek";
    const NOW: u64 = 1_700_000_000;
    const BODY: &[u8] = br#"{"type":"user.created","data":{"id":"u1"}}"#;

    fn verifier() -> WebhookVerifier {
        WebhookVerifier::new(SECRET, 300).unwrap()
    }

    fn headers<'a>(timestamp: &'a str, signature: &'a str) -> SvixHeaders<'a> {
        SvixHeaders {
            id: MSG_ID,
            timestamp,
            signature,
        }
    }

    #[test]
    fn test_signature_verification_success() {
        let verifier = verifier();
        let signature = verifier.sign(MSG_ID, NOW, BODY);
        let timestamp = NOW.to_string();

        assert!(signature.starts_with("v1,"));
        assert!(
            verifier
                .verify_at(&headers(&timestamp, &signature), BODY, NOW)
                .is_ok()
        );
    }

    #[test]
    fn test_secret_without_prefix_is_equivalent() {
        let prefixed = verifier();
        let bare = WebhookVerifier::new(SECRET.trim_start_matches("whsec_"), 300).unwrap();

        assert_eq!(prefixed.sign(MSG_ID, NOW, BODY), bare.sign(MSG_ID, NOW, BODY));
    }

    #[test]
    fn test_tampered_body_rejected() {
        let verifier = verifier();
        let signature = verifier.sign(MSG_ID, NOW, BODY);
        let timestamp = NOW.to_string();

        let result = verifier.verify_at(
            &headers(&timestamp, &signature),
            br#"{"type":"user.created","data":{"id":"u2"}}"#,
            NOW,
        );
        assert!(matches!(result, Err(VerificationError::VerificationFailed)));
    }

    #[test]
    fn test_other_secret_rejected() {
        let other = WebhookVerifier::new("whsec_c2VjcmV0LWtleS1mb3ItdGVzdHM=", 300).unwrap();
        let signature = other.sign(MSG_ID, NOW, BODY);
        let timestamp = NOW.to_string();

        assert!(matches!(
            verifier().verify_at(&headers(&timestamp, &signature), BODY, NOW),
            Err(VerificationError::VerificationFailed)
        ));
    }

    #[test]
    fn test_any_matching_signature_in_list_accepted() {
        let verifier = verifier();
        let valid = verifier.sign(MSG_ID, NOW, BODY);
        let signature = format!("v1,bm90LWEtc2lnbmF0dXJl v2,ignored {valid}");
        let timestamp = NOW.to_string();

        assert!(
            verifier
                .verify_at(&headers(&timestamp, &signature), BODY, NOW)
                .is_ok()
        );
    }

    #[test]
    fn test_unsupported_versions_only() {
        let timestamp = NOW.to_string();
        assert!(matches!(
            verifier().verify_at(&headers(&timestamp, "v2,abc v1a,def"), BODY, NOW),
            Err(VerificationError::NoSupportedSignature)
        ));
    }

    #[test]
    fn test_timestamp_too_old() {
        let verifier = verifier();
        let sent_at = NOW - 400;
        let signature = verifier.sign(MSG_ID, sent_at, BODY);
        let timestamp = sent_at.to_string();

        assert!(matches!(
            verifier.verify_at(&headers(&timestamp, &signature), BODY, NOW),
            Err(VerificationError::TimestampTooOld {
                seconds: 400,
                max_seconds: 300
            })
        ));
    }

    #[test]
    fn test_timestamp_too_far_in_future() {
        let verifier = verifier();
        let sent_at = NOW + 301;
        let signature = verifier.sign(MSG_ID, sent_at, BODY);
        let timestamp = sent_at.to_string();

        assert!(matches!(
            verifier.verify_at(&headers(&timestamp, &signature), BODY, NOW),
            Err(VerificationError::TimestampTooFuture { .. })
        ));
    }

    #[test]
    fn test_invalid_timestamp() {
        assert!(matches!(
            verifier().verify_at(&headers("yesterday", "v1,abc"), BODY, NOW),
            Err(VerificationError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn test_invalid_secret_rejected() {
        assert!(matches!(
            WebhookVerifier::new("whsec_not base64!", 300),
            Err(ConfigError::InvalidWebhookSecret)
        ));
        assert!(matches!(
            WebhookVerifier::new("whsec_", 300),
            Err(ConfigError::InvalidWebhookSecret)
        ));
    }

    #[test]
    fn test_missing_headers_reported_by_name() {
        let mut map = HeaderMap::new();
        map.insert(SVIX_ID_HEADER, HeaderValue::from_static(MSG_ID));
        map.insert(SVIX_SIGNATURE_HEADER, HeaderValue::from_static("v1,abc"));

        assert!(matches!(
            SvixHeaders::from_headers(&map),
            Err(VerificationError::MissingHeader {
                header: SVIX_TIMESTAMP_HEADER
            })
        ));

        map.insert(SVIX_TIMESTAMP_HEADER, HeaderValue::from_static(""));
        assert!(SvixHeaders::from_headers(&map).is_err());

        map.insert(SVIX_TIMESTAMP_HEADER, HeaderValue::from_static("1700000000"));
        let parsed = SvixHeaders::from_headers(&map).unwrap();
        assert_eq!(parsed.id, MSG_ID);
        assert_eq!(parsed.timestamp, "1700000000");
    }
}
