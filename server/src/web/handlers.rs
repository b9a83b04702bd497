//! HTTP endpoint handlers.
//!
//! The interactions endpoint only authenticates, parses, and hands off to the
//! dispatcher. Handler logic after the first reply runs in the background
//! and never holds up the response.

use axum::{
    body::to_bytes,
    extract::{Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::warn;

use crate::dispatch::Dispatcher;
use crate::error::InteractionError;
use crate::web::auth::Authenticator;

/// Upper bound on interaction bodies read into memory.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub authenticator: Authenticator,
    pub dispatcher: Dispatcher,
}

impl AppState {
    pub fn new(authenticator: Authenticator, dispatcher: Dispatcher) -> Self {
        Self {
            authenticator,
            dispatcher,
        }
    }
}

// =============================================================================
// Liveness
// =============================================================================

/// Liveness text for `GET /`.
pub const LIVENESS_TEXT: &str = "Interaction relay is running";

pub async fn root() -> &'static str {
    LIVENESS_TEXT
}

pub async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not Found")
}

// =============================================================================
// Interactions
// =============================================================================

/// Interactions endpoint.
///
/// This endpoint:
/// 1. Rejects non-POST requests and requests without signature headers
/// 2. Reads the body and verifies its signature
/// 3. Dispatches the interaction and returns its synchronous response
pub async fn interactions(State(state): State<AppState>, request: Request) -> Response {
    match handle_interaction(&state, request).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn handle_interaction(
    state: &AppState,
    request: Request,
) -> Result<Response, InteractionError> {
    let (parts, body) = request.into_parts();

    let signed = state.authenticator.admit(&parts.method, &parts.headers)?;

    let body = to_bytes(body, MAX_BODY_BYTES).await.map_err(|e| {
        warn!(error = %e, "interaction_body_read_failed");
        InteractionError::Malformed("unreadable body".to_string())
    })?;

    state.authenticator.verify(&signed, &parts.headers, &body)?;

    let application_id = state
        .authenticator
        .credentials()
        .resolve_application_id(&parts.headers);

    let response = state
        .dispatcher
        .dispatch_body(&body, application_id.as_deref())
        .await?;

    Ok((StatusCode::OK, Json(response)).into_response())
}
