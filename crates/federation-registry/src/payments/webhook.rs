use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::api::constant_time_eq;

use super::processor::PaymentError;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-webhook-signature";
pub const TIMESTAMP_HEADER: &str = "x-webhook-timestamp";

/// Callbacks signed further than this from the current time are refused.
pub const TIMESTAMP_TOLERANCE_SECS: i64 = 300;

/// Values above this are read as Unix milliseconds, anything else as seconds.
const MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// `base64(HMAC-SHA256(timestamp ‖ body))` with the configured secret.
pub fn sign(secret: &str, timestamp: &str, body: &[u8]) -> String {
    // HMAC accepts keys of any length
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(timestamp.as_bytes());
    mac.update(body);
    STANDARD.encode(mac.finalize().into_bytes())
}

/// Authenticates processor callbacks before anything in them is trusted.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: Option<String>,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("configured", &self.is_configured())
            .finish()
    }
}

impl WebhookVerifier {
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret: secret.filter(|value| !value.trim().is_empty()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.secret.is_some()
    }

    /// Without a secret every callback is refused.
    pub fn verify(
        &self,
        signature: Option<&str>,
        timestamp: Option<&str>,
        body: &[u8],
    ) -> Result<(), PaymentError> {
        self.verify_at(signature, timestamp, body, Utc::now())
    }

    /// Signature first, then the signed timestamp must fall within the tolerance of `now`.
    pub(crate) fn verify_at(
        &self,
        signature: Option<&str>,
        timestamp: Option<&str>,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<(), PaymentError> {
        let (Some(secret), Some(signature), Some(timestamp)) = (&self.secret, signature, timestamp)
        else {
            return Err(PaymentError::Unauthenticated);
        };

        let expected = sign(secret, timestamp, body);
        if expected.is_empty() || !constant_time_eq(signature.trim(), &expected) {
            return Err(PaymentError::Unauthenticated);
        }

        let signed_at = signed_at(timestamp).ok_or(PaymentError::StaleCallback)?;
        if (now - signed_at).num_seconds().abs() > TIMESTAMP_TOLERANCE_SECS {
            return Err(PaymentError::StaleCallback);
        }
        Ok(())
    }
}

fn signed_at(timestamp: &str) -> Option<DateTime<Utc>> {
    let raw: i64 = timestamp.trim().parse().ok()?;
    let seconds = if raw > MILLIS_THRESHOLD { raw / 1000 } else { raw };
    Utc.timestamp_opt(seconds, 0).single()
}
