//! Timestamped HMAC-SHA256 webhook signatures.
//!
//! Header format: `t=<unix seconds>,v1=<hex digest>[,v1=<hex digest>...]`, where
//! each digest is HMAC-SHA256 over `"{t}.{raw body}"`. Both the scheduling
//! provider and Stripe sign their webhooks this way.

use constant_time_eq::constant_time_eq;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature header is missing")]
    MissingHeader,
    #[error("signature header is malformed: {0}")]
    Malformed(String),
    #[error("signature timestamp {timestamp} is outside the {tolerance_secs}s tolerance")]
    Expired { timestamp: i64, tolerance_secs: i64 },
    #[error("no signature matched")]
    Mismatch,
    #[error("no signing secret configured")]
    NoSecret,
}

/// Parsed `t=..,v1=..` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    /// Raw timestamp text; the signed string uses it verbatim.
    pub timestamp_raw: String,
    pub signatures: Vec<String>,
}

impl SignatureHeader {
    pub fn parse(header: &str) -> Result<Self, SignatureError> {
        let mut timestamp_raw = None;
        let mut signatures = Vec::new();

        for item in header.split(',') {
            let Some((key, value)) = item.trim().split_once('=') else {
                continue;
            };
            match key {
                "t" => timestamp_raw = Some(value.to_string()),
                "v1" => signatures.push(value.to_string()),
                _ => {}
            }
        }

        let timestamp_raw = timestamp_raw
            .ok_or_else(|| SignatureError::Malformed("missing timestamp 't'".to_string()))?;
        let timestamp = timestamp_raw
            .parse::<i64>()
            .map_err(|_| SignatureError::Malformed("timestamp is not an integer".to_string()))?;
        if signatures.is_empty() {
            return Err(SignatureError::Malformed("missing 'v1' signature".to_string()));
        }

        Ok(Self {
            timestamp,
            timestamp_raw,
            signatures,
        })
    }
}

/// Hex HMAC-SHA256 of `"{timestamp}.{payload}"`.
pub fn compute_signature(secret: &str, timestamp: &str, payload: &[u8]) -> String {
    // HMAC accepts keys of any length, so construction cannot fail.
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Builds a header value signing `payload` at `timestamp`.
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let t = timestamp.to_string();
    format!("t={},v1={}", t, compute_signature(secret, &t, payload))
}

/// Verifies a signature header against the raw payload.
///
/// Any of `secrets` may have produced any of the `v1` entries. A
/// `tolerance_secs` of 0 disables the timestamp check.
pub fn verify_signature(
    payload: &[u8],
    header: Option<&str>,
    secrets: &[&str],
    tolerance_secs: i64,
    now_unix: i64,
) -> Result<(), SignatureError> {
    let header = header.ok_or(SignatureError::MissingHeader)?;
    let parsed = SignatureHeader::parse(header)?;

    if secrets.is_empty() {
        return Err(SignatureError::NoSecret);
    }
    if tolerance_secs > 0 && (now_unix - parsed.timestamp).abs() > tolerance_secs {
        return Err(SignatureError::Expired {
            timestamp: parsed.timestamp,
            tolerance_secs,
        });
    }

    for secret in secrets {
        let expected = compute_signature(secret, &parsed.timestamp_raw, payload);
        if parsed
            .signatures
            .iter()
            .any(|provided| constant_time_eq(expected.as_bytes(), provided.as_bytes()))
        {
            return Ok(());
        }
    }
    Err(SignatureError::Mismatch)
}
