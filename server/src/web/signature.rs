//! Interaction request signature verification.
//!
//! The platform signs every callback with Ed25519 over the concatenation of
//! the `X-Signature-Timestamp` header and the raw request body. Both the
//! signature and the application public key are hex-encoded.

use ed25519_dalek::{Signature, VerifyingKey};
use tracing::debug;

/// Verifies a request signature. Implementations must never panic and must
/// report every malformed input as `false`.
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, body: &[u8], signature: &str, timestamp: &str, public_key: &str) -> bool;
}

/// Production verifier backed by `ed25519-dalek`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Verifier;

impl SignatureVerifier for Ed25519Verifier {
    fn verify(&self, body: &[u8], signature: &str, timestamp: &str, public_key: &str) -> bool {
        verify_signature(body, signature, timestamp, public_key)
    }
}

/// Verify a hex-encoded signature with a hex-encoded public key.
///
/// # Returns
///
/// `true` if `signature` is a valid Ed25519 signature by `public_key` over
/// `timestamp || body`, `false` otherwise (including any decoding failure).
pub fn verify_signature(body: &[u8], signature: &str, timestamp: &str, public_key: &str) -> bool {
    let (signature, public_key) = match (hex::decode(signature), hex::decode(public_key)) {
        (Ok(s), Ok(k)) => (s, k),
        _ => {
            debug!("interaction_signature_not_hex");
            return false;
        }
    };

    verify_signature_bytes(body, &signature, timestamp, &public_key)
}

/// Verify a raw 64-byte signature with a raw 32-byte public key.
pub fn verify_signature_bytes(
    body: &[u8],
    signature: &[u8],
    timestamp: &str,
    public_key: &[u8],
) -> bool {
    let Ok(signature) = Signature::from_slice(signature) else {
        debug!(signature_length = signature.len(), "interaction_signature_bad_length");
        return false;
    };

    let key_bytes: &[u8; 32] = match public_key.try_into() {
        Ok(k) => k,
        Err(_) => {
            debug!(key_length = public_key.len(), "interaction_public_key_bad_length");
            return false;
        }
    };

    let Ok(key) = VerifyingKey::from_bytes(key_bytes) else {
        debug!("interaction_public_key_invalid");
        return false;
    };

    let mut message = Vec::with_capacity(timestamp.len() + body.len());
    message.extend_from_slice(timestamp.as_bytes());
    message.extend_from_slice(body);

    key.verify_strict(&message, &signature).is_ok()
}
