//! Deferred response broker.
//!
//! Runs a handler on its own task and turns its first `reply` into the
//! synchronous HTTP response. Whatever the handler does after that keeps
//! running detached from the request.
//!
//! ## Lifecycle
//!
//! ```text
//! run() ─ spawn handler ─┬─ reply()          → response returned
//!                        ├─ deadline elapsed → deferred acknowledgment returned
//!                        └─ handler done     → deferred acknowledgment returned
//! ```
//!
//! Handler continuations and follow-ups share one task tracker, drained by
//! [`DeferredResponseBroker::shutdown`].

pub mod context;
pub mod follow_up;

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::interaction::{ActionKind, InteractionPayload, InteractionResponse};

pub use context::{InteractionContext, ReplySlot, ReplyState};
pub use follow_up::{FollowUpError, FollowUpSink, FollowUpTarget, FollowUps, WebhookFollowUp};

/// Handler logic for one kind of interaction.
///
/// Implemented for any `Fn(InteractionPayload, InteractionContext) -> impl Future`
/// returning `anyhow::Result<()>`.
///
/// Panics are caught and logged, which needs `panic = "unwind"` in the build
/// profile; under `abort` a handler panic ends the process.
pub trait InteractionHandler: Send + Sync + 'static {
    fn handle(
        &self,
        interaction: InteractionPayload,
        ctx: InteractionContext,
    ) -> BoxFuture<'static, anyhow::Result<()>>;
}

impl<F, Fut> InteractionHandler for F
where
    F: Fn(InteractionPayload, InteractionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    fn handle(
        &self,
        interaction: InteractionPayload,
        ctx: InteractionContext,
    ) -> BoxFuture<'static, anyhow::Result<()>> {
        Box::pin(self(interaction, ctx))
    }
}

/// Wrap a closure as a shareable handler.
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn InteractionHandler>
where
    F: Fn(InteractionPayload, InteractionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(f)
}

/// Why a handler did not finish cleanly. Only ever logged.
#[derive(Debug, Error)]
pub enum HandlerFailure {
    #[error("handler returned an error: {0:#}")]
    Returned(anyhow::Error),

    #[error("handler panicked: {0}")]
    Panicked(String),

    #[error("handler cancelled by shutdown")]
    Cancelled,
}

/// Runs handlers and captures their first reply as the HTTP response.
#[derive(Clone)]
pub struct DeferredResponseBroker {
    reply_deadline: Duration,
    follow_ups: FollowUps,
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl DeferredResponseBroker {
    pub fn new(sink: Arc<dyn FollowUpSink>, reply_deadline: Duration, max_pending: usize) -> Self {
        let tracker = TaskTracker::new();
        let shutdown = CancellationToken::new();
        let follow_ups = FollowUps::new(sink, max_pending, tracker.clone(), shutdown.clone());

        Self {
            reply_deadline,
            follow_ups,
            tracker,
            shutdown,
        }
    }

    pub fn reply_deadline(&self) -> Duration {
        self.reply_deadline
    }

    /// Number of handler continuations and follow-ups still running.
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Run `handler` for one interaction and return the synchronous response.
    ///
    /// Resolves on the handler's first reply. If none arrives before the
    /// deadline, or the handler finishes without replying, the deferred
    /// acknowledgment for `kind` is returned instead.
    pub async fn run(
        &self,
        handler: Arc<dyn InteractionHandler>,
        kind: ActionKind,
        interaction: InteractionPayload,
        fallback_application_id: Option<&str>,
    ) -> InteractionResponse {
        let (tx, rx) = oneshot::channel();
        let target = FollowUpTarget::for_payload(&interaction, fallback_application_id);
        let ctx = InteractionContext::new(
            &interaction.id,
            kind,
            ReplySlot::new(tx),
            target,
            self.follow_ups.clone(),
        );
        let interaction_id = interaction.id.clone();

        self.spawn_handler(handler, kind, interaction, ctx);

        match tokio::time::timeout(self.reply_deadline, rx).await {
            Ok(Ok(response)) => {
                info!(
                    interaction_id = %interaction_id,
                    kind = kind.as_str(),
                    response_type = response.kind,
                    "interaction_replied"
                );
                response
            }
            Ok(Err(_)) => {
                warn!(
                    interaction_id = %interaction_id,
                    kind = kind.as_str(),
                    "interaction_handler_finished_without_reply"
                );
                InteractionResponse::deferred(kind)
            }
            Err(_) => {
                warn!(
                    interaction_id = %interaction_id,
                    kind = kind.as_str(),
                    deadline_ms = self.reply_deadline.as_millis() as u64,
                    "interaction_reply_deadline_elapsed"
                );
                InteractionResponse::deferred(kind)
            }
        }
    }

    fn spawn_handler(
        &self,
        handler: Arc<dyn InteractionHandler>,
        kind: ActionKind,
        interaction: InteractionPayload,
        ctx: InteractionContext,
    ) {
        let shutdown = self.shutdown.clone();
        let interaction_id = interaction.id.clone();

        self.tracker.spawn(async move {
            // Calling `handle` inside the guarded future also catches panics
            // raised before the handler's own future is returned.
            let work = AssertUnwindSafe(async move { handler.handle(interaction, ctx).await })
                .catch_unwind();

            let failure = tokio::select! {
                outcome = work => match outcome {
                    Ok(Ok(())) => None,
                    Ok(Err(e)) => Some(HandlerFailure::Returned(e)),
                    Err(panic) => Some(HandlerFailure::Panicked(panic_message(panic.as_ref()))),
                },
                _ = shutdown.cancelled() => Some(HandlerFailure::Cancelled),
            };

            match failure {
                None => debug!(
                    interaction_id = %interaction_id,
                    kind = kind.as_str(),
                    "interaction_handler_completed"
                ),
                Some(failure) => error!(
                    interaction_id = %interaction_id,
                    kind = kind.as_str(),
                    error = %failure,
                    "interaction_handler_failed"
                ),
            }
        });
    }

    /// Stop accepting background work and wait for what is running.
    ///
    /// Anything still running after `drain` is cancelled.
    pub async fn shutdown(&self, drain: Duration) {
        self.tracker.close();
        info!(pending = self.tracker.len(), "broker_draining");

        if tokio::time::timeout(drain, self.tracker.wait()).await.is_err() {
            warn!(pending = self.tracker.len(), "broker_drain_timeout");
            self.shutdown.cancel();
            self.tracker.wait().await;
        }

        info!("broker_drained");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
