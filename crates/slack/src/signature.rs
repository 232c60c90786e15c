//! Slack request signing (`v0` scheme).

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-slack-signature";
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
pub const DEFAULT_TOLERANCE_SECS: i64 = 5 * 60;

const VERSION: &str = "v0";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing `{0}` header")]
    MissingHeader(&'static str),
    #[error("request timestamp `{0}` is not a unix time")]
    MalformedTimestamp(String),
    #[error("request timestamp is {skew_secs}s away from now")]
    Expired { skew_secs: i64 },
    #[error("signature does not match the request body")]
    Mismatch,
}

#[derive(Clone)]
pub struct SignatureVerifier {
    signing_secret: SecretString,
    tolerance_secs: i64,
}

impl SignatureVerifier {
    pub fn new(signing_secret: SecretString) -> Self {
        Self { signing_secret, tolerance_secs: DEFAULT_TOLERANCE_SECS }
    }

    pub fn with_tolerance(mut self, tolerance_secs: i64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }

    /// `v0=` + hex(HMAC-SHA256(secret, "v0:{timestamp}:{body}")).
    pub fn sign(&self, timestamp: &str, body: &[u8]) -> String {
        match self.mac(timestamp, body) {
            Some(mac) => format!("{VERSION}={}", hex::encode(mac.finalize().into_bytes())),
            None => String::new(),
        }
    }

    pub fn verify(
        &self,
        timestamp: Option<&str>,
        signature: Option<&str>,
        body: &[u8],
        now_unix: i64,
    ) -> Result<(), SignatureError> {
        let timestamp = timestamp.ok_or(SignatureError::MissingHeader(TIMESTAMP_HEADER))?.trim();
        let signature = signature.ok_or(SignatureError::MissingHeader(SIGNATURE_HEADER))?.trim();

        let sent_at = timestamp
            .parse::<i64>()
            .map_err(|_| SignatureError::MalformedTimestamp(timestamp.to_owned()))?;
        let skew_secs = now_unix - sent_at;
        if skew_secs.abs() > self.tolerance_secs {
            return Err(SignatureError::Expired { skew_secs });
        }

        let digest = signature
            .strip_prefix(VERSION)
            .and_then(|rest| rest.strip_prefix('='))
            .and_then(|hex_digest| hex::decode(hex_digest).ok())
            .ok_or(SignatureError::Mismatch)?;
        let mac = self.mac(timestamp, body).ok_or(SignatureError::Mismatch)?;
        mac.verify_slice(&digest).map_err(|_| SignatureError::Mismatch)
    }

    fn mac(&self, timestamp: &str, body: &[u8]) -> Option<HmacSha256> {
        // HMAC takes keys of any length.
        let mut mac =
            HmacSha256::new_from_slice(self.signing_secret.expose_secret().as_bytes()).ok()?;
        mac.update(VERSION.as_bytes());
        mac.update(b":");
        mac.update(timestamp.as_bytes());
        mac.update(b":");
        mac.update(body);
        Some(mac)
    }
}
