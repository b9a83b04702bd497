//! Error types for request processing.
//!
//! Every variant terminates the request before any handler runs and maps to
//! a distinct HTTP status.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Rejection raised while authenticating or dispatching an interaction.
#[derive(Debug, Error)]
pub enum InteractionError {
    /// Anything other than POST on the interactions endpoint.
    #[error("method not allowed")]
    MethodNotAllowed,

    /// Missing signature headers, empty body, or a body that is not an interaction.
    #[error("malformed request: {0}")]
    Malformed(String),

    /// Signature verification failed, for whatever reason.
    #[error("invalid request signature")]
    Unauthorized,

    /// A credential could not be resolved. This is a deployment defect.
    #[error("credential not configured: {0}")]
    Configuration(String),

    /// The interaction type is known but no handler is registered for it.
    #[error("interaction type {0} is not implemented")]
    Unsupported(&'static str),

    /// The interaction type is outside the known set.
    #[error("unknown interaction type {0}")]
    UnknownType(u64),
}

impl InteractionError {
    pub fn status(&self) -> StatusCode {
        match self {
            InteractionError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            InteractionError::Malformed(_) => StatusCode::BAD_REQUEST,
            InteractionError::Unauthorized => StatusCode::UNAUTHORIZED,
            InteractionError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            InteractionError::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
            InteractionError::UnknownType(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Client-facing message. Deliberately coarse so rejections leak nothing.
    fn public_message(&self) -> &'static str {
        match self {
            InteractionError::MethodNotAllowed => "Method Not Allowed",
            InteractionError::Malformed(_) => "Bad Request",
            InteractionError::Unauthorized => "Unauthorized",
            InteractionError::Configuration(_) => "Internal Server Error",
            InteractionError::Unsupported(_) => "Not Implemented",
            InteractionError::UnknownType(_) => "Unknown Type",
        }
    }
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
}

impl IntoResponse for InteractionError {
    fn into_response(self) -> Response {
        if let InteractionError::Configuration(detail) = &self {
            error!(detail = %detail, "credential_resolution_failed");
        }

        (
            self.status(),
            Json(ErrorResponse {
                error: self.public_message(),
            }),
        )
            .into_response()
    }
}
