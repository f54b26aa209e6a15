//! Slack request signature verification.
//!
//! Slack signs `v0:{timestamp}:{raw body}` with the app's signing secret
//! (HMAC-SHA256, hex, `v0=` prefix). Requests are rejected when either header
//! is missing, the timestamp is more than five minutes away from now, or the
//! signature does not match.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::error::{DispatchError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the request timestamp (unix seconds).
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";

/// Header carrying the request signature.
pub const SIGNATURE_HEADER: &str = "x-slack-signature";

/// Maximum accepted distance between the request timestamp and now.
pub const MAX_SKEW_SECS: i64 = 300;

const VERSION: &str = "v0";

/// Signature-relevant request headers.
#[derive(Debug, Clone, Default)]
pub struct CallbackHeaders {
    /// `X-Slack-Request-Timestamp`
    pub timestamp: Option<String>,
    /// `X-Slack-Signature`
    pub signature: Option<String>,
}

impl CallbackHeaders {
    /// Parse headers from a request
    #[must_use]
    pub fn from_header_map(get_header: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            timestamp: get_header(TIMESTAMP_HEADER),
            signature: get_header(SIGNATURE_HEADER),
        }
    }
}

/// Verifies signed callbacks against a shared secret.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: String,
}

impl fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl SignatureVerifier {
    /// Create a verifier for a signing secret.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Compute the `v0=` signature for a timestamp and body.
    pub fn sign(&self, timestamp: &str, body: &[u8]) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| DispatchError::SignatureInvalid(format!("unusable signing key: {e}")))?;
        mac.update(VERSION.as_bytes());
        mac.update(b":");
        mac.update(timestamp.as_bytes());
        mac.update(b":");
        mac.update(body);
        Ok(format!(
            "{VERSION}={}",
            hex::encode(mac.finalize().into_bytes())
        ))
    }

    /// Verify a request. `now` is the current unix time in seconds.
    ///
    /// # Errors
    /// [`DispatchError::SignatureInvalid`] for missing, malformed or mismatching
    /// headers, [`DispatchError::StaleRequest`] outside the replay window.
    pub fn verify(&self, headers: &CallbackHeaders, body: &[u8], now: i64) -> Result<()> {
        let (Some(timestamp), Some(signature)) =
            (headers.timestamp.as_deref(), headers.signature.as_deref())
        else {
            return Err(DispatchError::SignatureInvalid(
                "missing timestamp or signature header".to_string(),
            ));
        };

        let ts: i64 = timestamp.trim().parse().map_err(|_| {
            DispatchError::SignatureInvalid(format!("unparseable timestamp: {timestamp}"))
        })?;

        let skew_secs = now.saturating_sub(ts).saturating_abs();
        if skew_secs > MAX_SKEW_SECS {
            debug!(skew_secs, "Rejecting stale callback");
            return Err(DispatchError::StaleRequest { skew_secs });
        }

        let expected = self.sign(timestamp, body)?;
        if bool::from(expected.as_bytes().ct_eq(signature.as_bytes())) {
            Ok(())
        } else {
            Err(DispatchError::SignatureInvalid(
                "signature mismatch".to_string(),
            ))
        }
    }
}
