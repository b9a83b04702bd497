//! Interaction dispatch.
//!
//! Routes a verified body to the right outcome:
//!
//! ```text
//! Liveness       → Pong, no handler runs
//! Action(kind)   → registered handler via the broker, or Not Implemented
//! Unknown(code)  → Unknown Type
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tracing::{info, warn};

use crate::broker::{handler_fn, DeferredResponseBroker, InteractionContext, InteractionHandler};
use crate::error::InteractionError;
use crate::interaction::{ActionKind, Interaction, InteractionPayload, InteractionResponse};

/// Handlers keyed by interaction kind.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<ActionKind, Arc<dyn InteractionHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous one for `kind`.
    pub fn register(mut self, kind: ActionKind, handler: Arc<dyn InteractionHandler>) -> Self {
        self.handlers.insert(kind, handler);
        self
    }

    /// Register a closure as the handler for `kind`.
    pub fn on<F, Fut>(self, kind: ActionKind, f: F) -> Self
    where
        F: Fn(InteractionPayload, InteractionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.register(kind, handler_fn(f))
    }

    pub fn get(&self, kind: ActionKind) -> Option<Arc<dyn InteractionHandler>> {
        self.handlers.get(&kind).cloned()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        let mut kinds: Vec<_> = self.handlers.keys().map(|k| k.as_str()).collect();
        kinds.sort_unstable();
        kinds
    }
}

/// Classifies verified interactions and produces their synchronous response.
#[derive(Clone)]
pub struct Dispatcher {
    registry: HandlerRegistry,
    broker: DeferredResponseBroker,
}

impl Dispatcher {
    pub fn new(registry: HandlerRegistry, broker: DeferredResponseBroker) -> Self {
        Self { registry, broker }
    }

    pub fn broker(&self) -> &DeferredResponseBroker {
        &self.broker
    }

    /// Parse a verified body and dispatch it.
    pub async fn dispatch_body(
        &self,
        body: &[u8],
        fallback_application_id: Option<&str>,
    ) -> Result<InteractionResponse, InteractionError> {
        let payload = InteractionPayload::from_slice(body).map_err(|e| {
            warn!(error = %e, body_length = body.len(), "interaction_parse_failed");
            InteractionError::Malformed(e.to_string())
        })?;

        info!(
            interaction_id = %payload.id,
            interaction_type = payload.kind,
            guild_id = ?payload.guild_id,
            command = ?payload.command_name(),
            "interaction_received"
        );

        self.dispatch(Interaction::classify(payload), fallback_application_id)
            .await
    }

    pub async fn dispatch(
        &self,
        interaction: Interaction,
        fallback_application_id: Option<&str>,
    ) -> Result<InteractionResponse, InteractionError> {
        match interaction {
            Interaction::Liveness => Ok(InteractionResponse::pong()),
            Interaction::Action(kind, payload) => match self.registry.get(kind) {
                Some(handler) => Ok(self
                    .broker
                    .run(handler, kind, payload, fallback_application_id)
                    .await),
                None => {
                    warn!(kind = kind.as_str(), "interaction_handler_not_registered");
                    Err(InteractionError::Unsupported(kind.as_str()))
                }
            },
            Interaction::Unknown(code) => {
                warn!(interaction_type = code, "interaction_type_unknown");
                Err(InteractionError::UnknownType(code))
            }
        }
    }
}
