//! Web server module for the interactions endpoint.
//!
//! This module provides a thin web server that:
//! - Verifies the signature of every interaction callback
//! - Answers liveness probes directly
//! - Hands everything else to the dispatcher and returns its first reply
//!
//! Handler work after the first reply continues in the background.

pub mod auth;
pub mod handlers;
pub mod signature;

use axum::{
    routing::{any, get},
    Router,
};
use tower_http::trace::TraceLayer;

pub use auth::{Authenticator, RawRequest, SignatureHeaders, SIGNATURE_HEADER, TIMESTAMP_HEADER};
pub use handlers::{interactions, not_found, root, AppState, LIVENESS_TEXT};
pub use signature::{verify_signature, verify_signature_bytes, Ed25519Verifier, SignatureVerifier};

/// Build the router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/interactions", any(interactions))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
