//! Deployment credentials, resolved per request.
//!
//! A credential is either a fixed value or a function of the incoming
//! request's headers (multi-tenant deployments route on `Host`). Values are
//! resolved for every request and never cached.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use axum::http::{header::HOST, HeaderMap};

use crate::config::Config;
use crate::error::InteractionError;

type DeriveFn = dyn Fn(&HeaderMap) -> Option<String> + Send + Sync;

/// A credential value: static, or derived from request context.
#[derive(Clone)]
pub enum Credential {
    Static(String),
    Derived(Arc<DeriveFn>),
}

impl Credential {
    /// Build a derived credential from a closure.
    pub fn derived<F>(f: F) -> Self
    where
        F: Fn(&HeaderMap) -> Option<String> + Send + Sync + 'static,
    {
        Credential::Derived(Arc::new(f))
    }

    /// Resolve against the current request. Blank values count as missing.
    pub fn resolve(&self, headers: &HeaderMap) -> Option<String> {
        let value = match self {
            Credential::Static(value) => Some(value.clone()),
            Credential::Derived(f) => f(headers),
        };
        value.filter(|v| !v.trim().is_empty())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Static(_) => f.write_str("Credential::Static(..)"),
            Credential::Derived(_) => f.write_str("Credential::Derived(..)"),
        }
    }
}

/// Credentials consumed by request processing.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub public_key: Credential,
    pub application_id: Option<Credential>,
}

impl Credentials {
    pub fn new(public_key: Credential) -> Self {
        Self {
            public_key,
            application_id: None,
        }
    }

    pub fn with_application_id(mut self, application_id: Credential) -> Self {
        self.application_id = Some(application_id);
        self
    }

    /// Build credentials from configuration.
    ///
    /// Per-host keys take precedence over a single static key. Having
    /// neither, or a static key that is not a valid Ed25519 key, is a
    /// startup error.
    pub fn from_config(config: &Config) -> Result<Self, InteractionError> {
        let public_key = match (&config.tenant_public_keys, &config.public_key) {
            (Some(pairs), _) => {
                for (host, key) in pairs {
                    validate_public_key(key).map_err(|e| {
                        InteractionError::Configuration(format!("public key for {host}: {e}"))
                    })?;
                }
                by_host(pairs.iter().cloned().collect())
            }
            (None, Some(key)) => {
                validate_public_key(key).map_err(InteractionError::Configuration)?;
                Credential::Static(key.clone())
            }
            (None, None) => {
                return Err(InteractionError::Configuration(
                    "DISCORD_PUBLIC_KEY or DISCORD_PUBLIC_KEYS must be set".to_string(),
                ))
            }
        };

        let mut credentials = Credentials::new(public_key);
        if let Some(id) = &config.application_id {
            credentials = credentials.with_application_id(Credential::Static(id.clone()));
        }
        Ok(credentials)
    }

    /// Resolve the public key for this request.
    pub fn resolve_public_key(&self, headers: &HeaderMap) -> Result<String, InteractionError> {
        self.public_key.resolve(headers).ok_or_else(|| {
            InteractionError::Configuration("public key did not resolve for request".to_string())
        })
    }

    pub fn resolve_application_id(&self, headers: &HeaderMap) -> Option<String> {
        self.application_id.as_ref().and_then(|c| c.resolve(headers))
    }
}

/// Derive a credential from the request's `Host` header, ignoring any port.
fn by_host(keys: HashMap<String, String>) -> Credential {
    Credential::derived(move |headers| {
        let host = headers.get(HOST)?.to_str().ok()?;
        keys.get(&host_without_port(host).to_ascii_lowercase()).cloned()
    })
}

/// Strip the port from a `Host` value, keeping bracketed IPv6 literals whole.
fn host_without_port(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    host.rsplit_once(':').map_or(host, |(name, _)| name)
}

/// Check that a value is a hex-encoded 32-byte Ed25519 public key.
pub fn validate_public_key(key: &str) -> Result<(), String> {
    let bytes = hex::decode(key.trim()).map_err(|e| format!("public key is not hex: {e}"))?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|b: Vec<u8>| format!("public key must be 32 bytes, got {}", b.len()))?;
    ed25519_dalek::VerifyingKey::from_bytes(&bytes)
        .map(|_| ())
        .map_err(|e| format!("public key is not a curve point: {e}"))
}
