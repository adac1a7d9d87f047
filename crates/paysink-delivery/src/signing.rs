//! HMAC-SHA256 payload signing.
//!
//! Outbound webhooks carry `X-Signature: base64(HMAC-SHA256(body, secret))`.
//! Receivers recompute the MAC over the raw body with the shared secret and
//! compare; [`verify_signature`] does that in constant time.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Signature generation and verification errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SigningError {
    /// No secret configured.
    #[error("signing secret is empty")]
    EmptySecret,

    /// The signature is not valid base64.
    #[error("invalid signature encoding: {0}")]
    InvalidEncoding(String),

    /// The signature does not match the payload.
    #[error("signature verification failed")]
    Mismatch,
}

fn mac(secret: &str) -> Result<HmacSha256, SigningError> {
    if secret.is_empty() {
        return Err(SigningError::EmptySecret);
    }
    HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SigningError::EmptySecret)
}

/// Signs `payload` and returns the base64-encoded HMAC-SHA256.
///
/// The same payload and secret always produce the same signature.
///
/// # Errors
///
/// Returns `SigningError::EmptySecret` if `secret` is empty.
pub fn sign_payload(payload: &[u8], secret: &str) -> Result<String, SigningError> {
    let mut mac = mac(secret)?;
    mac.update(payload);
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Checks a base64 signature against `payload` in constant time.
///
/// # Errors
///
/// Returns `SigningError::InvalidEncoding` for malformed input and
/// `SigningError::Mismatch` when the MAC differs.
pub fn verify_signature(payload: &[u8], signature: &str, secret: &str) -> Result<(), SigningError> {
    let expected = STANDARD
        .decode(signature.trim())
        .map_err(|e| SigningError::InvalidEncoding(e.to_string()))?;

    let mut mac = mac(secret)?;
    mac.update(payload);
    mac.verify_slice(&expected).map_err(|_| SigningError::Mismatch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_matches_known_vector() {
        // RFC 4231 test case 2
        let signature = sign_payload(b"what do ya want for nothing?", "Jefe").unwrap();
        assert_eq!(signature, "W9zBRr9gdU5qBCQmCJV1x1oAPwidJzmDnexYuWTsOEM=");
    }

    #[test]
    fn verification_accepts_own_signature() {
        let payload = br#"{"id":"evt_1","type":"payment.updated"}"#;
        let signature = sign_payload(payload, "secret").unwrap();

        assert_eq!(verify_signature(payload, &signature, "secret"), Ok(()));
    }

    #[test]
    fn verification_rejects_tampering() {
        let signature = sign_payload(b"original", "secret").unwrap();

        assert_eq!(verify_signature(b"tampered", &signature, "secret"), Err(SigningError::Mismatch));
        assert_eq!(verify_signature(b"original", &signature, "other"), Err(SigningError::Mismatch));
        assert!(matches!(
            verify_signature(b"original", "not base64!", "secret"),
            Err(SigningError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn empty_secret_rejected() {
        assert_eq!(sign_payload(b"payload", ""), Err(SigningError::EmptySecret));
    }
}
