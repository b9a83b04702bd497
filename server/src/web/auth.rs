//! Request authentication for the interactions endpoint.
//!
//! Checks run in a fixed order and stop at the first failure:
//! method, signature headers, body, credential, replay window, signature.
//! Nothing downstream sees a body that did not pass all of them.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::http::{HeaderMap, Method};
use tracing::warn;

use crate::credentials::Credentials;
use crate::error::InteractionError;
use crate::web::signature::{Ed25519Verifier, SignatureVerifier};

/// Header carrying the hex-encoded Ed25519 signature.
pub const SIGNATURE_HEADER: &str = "x-signature-ed25519";

/// Header carrying the signed timestamp.
pub const TIMESTAMP_HEADER: &str = "x-signature-timestamp";

/// An inbound request, borrowed from the HTTP layer for verification.
#[derive(Debug, Clone, Copy)]
pub struct RawRequest<'a> {
    pub method: &'a Method,
    pub headers: &'a HeaderMap,
    pub body: &'a [u8],
}

/// Signature headers extracted from a request that passed the envelope checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeaders {
    pub signature: String,
    pub timestamp: String,
}

/// Authenticates interaction requests.
#[derive(Clone)]
pub struct Authenticator {
    credentials: Arc<Credentials>,
    verifier: Arc<dyn SignatureVerifier>,
    max_age_secs: Option<u64>,
}

impl Authenticator {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials: Arc::new(credentials),
            verifier: Arc::new(Ed25519Verifier),
            max_age_secs: None,
        }
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn SignatureVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn with_max_age(mut self, max_age_secs: Option<u64>) -> Self {
        self.max_age_secs = max_age_secs;
        self
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Checks that need no body: method and presence of signature headers.
    pub fn admit(
        &self,
        method: &Method,
        headers: &HeaderMap,
    ) -> Result<SignatureHeaders, InteractionError> {
        if *method != Method::POST {
            return Err(InteractionError::MethodNotAllowed);
        }

        let signature = header_value(headers, SIGNATURE_HEADER);
        let timestamp = header_value(headers, TIMESTAMP_HEADER);

        match (signature, timestamp) {
            (Some(signature), Some(timestamp)) => Ok(SignatureHeaders {
                signature,
                timestamp,
            }),
            (signature, timestamp) => {
                warn!(
                    has_signature = signature.is_some(),
                    has_timestamp = timestamp.is_some(),
                    "interaction_signature_headers_missing"
                );
                Err(InteractionError::Malformed(
                    "missing signature headers".to_string(),
                ))
            }
        }
    }

    /// Checks that need the body: non-empty body, credential, replay window, signature.
    pub fn verify(
        &self,
        signed: &SignatureHeaders,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<(), InteractionError> {
        if body.is_empty() {
            warn!("interaction_body_empty");
            return Err(InteractionError::Malformed("empty body".to_string()));
        }

        let public_key = self.credentials.resolve_public_key(headers)?;

        if let Some(max_age) = self.max_age_secs {
            if !timestamp_is_fresh(&signed.timestamp, max_age) {
                return Err(InteractionError::Unauthorized);
            }
        }

        if !self
            .verifier
            .verify(body, &signed.signature, &signed.timestamp, &public_key)
        {
            warn!(
                signature_length = signed.signature.len(),
                body_length = body.len(),
                "interaction_signature_invalid"
            );
            return Err(InteractionError::Unauthorized);
        }

        Ok(())
    }

    /// Run every check against a fully buffered request.
    pub fn authenticate(&self, request: &RawRequest<'_>) -> Result<(), InteractionError> {
        let signed = self.admit(request.method, request.headers)?;
        self.verify(&signed, request.headers, request.body)
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Check a unix-seconds timestamp is within `max_age_secs` of now, either direction.
fn timestamp_is_fresh(timestamp: &str, max_age_secs: u64) -> bool {
    let sent: u64 = match timestamp.parse() {
        Ok(t) => t,
        Err(_) => {
            warn!(timestamp = %timestamp, "interaction_signature_invalid_timestamp");
            return false;
        }
    };

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    let age = now.abs_diff(sent);
    if age > max_age_secs {
        warn!(
            sent_time = sent,
            current_time = now,
            age_seconds = age,
            max_age_seconds = max_age_secs,
            "interaction_signature_stale"
        );
        return false;
    }

    true
}
