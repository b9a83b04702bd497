//! Follow-up delivery: editing the original response after it was sent.
//!
//! Follow-ups are fire-and-forget. Each one runs on its own tracked task,
//! the number in flight is bounded, failures are logged and never retried.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};
use url::Url;

use crate::interaction::InteractionPayload;

/// Failure while delivering a follow-up.
#[derive(Debug, Error)]
pub enum FollowUpError {
    #[error("interaction has no application id or token to follow up on")]
    MissingTarget,

    /// Transport failure. The request URL is stripped since it carries the token.
    #[error("follow-up request failed: {0}")]
    Http(reqwest::Error),

    #[error("follow-up rejected with status {0}")]
    Status(u16),
}

/// Addresses the original response of one interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowUpTarget {
    pub application_id: String,
    pub token: String,
}

impl FollowUpTarget {
    pub fn new(application_id: String, token: String) -> Result<Self, FollowUpError> {
        if application_id.is_empty() || token.is_empty() {
            return Err(FollowUpError::MissingTarget);
        }
        Ok(Self {
            application_id,
            token,
        })
    }

    /// Target for a payload, using `fallback_application_id` when the payload has none.
    pub fn for_payload(
        payload: &InteractionPayload,
        fallback_application_id: Option<&str>,
    ) -> Result<Self, FollowUpError> {
        let application_id = if payload.application_id.is_empty() {
            fallback_application_id.unwrap_or_default().to_string()
        } else {
            payload.application_id.clone()
        };
        Self::new(application_id, payload.token.clone())
    }
}

/// Delivers an edit of an interaction's original response.
pub trait FollowUpSink: Send + Sync + 'static {
    fn edit_original<'a>(
        &'a self,
        target: &'a FollowUpTarget,
        content: &'a str,
    ) -> BoxFuture<'a, Result<(), FollowUpError>>;
}

// =============================================================================
// Webhook sink
// =============================================================================

#[derive(Serialize)]
struct EditMessage<'a> {
    content: &'a str,
}

/// Sends follow-ups to the platform's interaction webhook endpoint.
#[derive(Debug, Clone)]
pub struct WebhookFollowUp {
    client: Client,
    api_base: Url,
    timeout: Duration,
}

impl WebhookFollowUp {
    pub fn new(client: Client, api_base: Url, timeout: Duration) -> Self {
        Self {
            client,
            api_base,
            timeout,
        }
    }

    /// URL of the original response for `target`.
    pub fn original_message_url(&self, target: &FollowUpTarget) -> String {
        format!(
            "{}/webhooks/{}/{}/messages/@original",
            self.api_base.as_str().trim_end_matches('/'),
            target.application_id,
            target.token
        )
    }

    async fn patch_original(
        &self,
        target: &FollowUpTarget,
        content: &str,
    ) -> Result<(), FollowUpError> {
        let url = self.original_message_url(target);

        let response = self
            .client
            .patch(&url)
            .timeout(self.timeout)
            .json(&EditMessage { content })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    warn!(
                        application_id = %target.application_id,
                        timeout_seconds = self.timeout.as_secs_f64(),
                        "follow_up_timeout"
                    );
                }
                FollowUpError::Http(e.without_url())
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FollowUpError::Status(status.as_u16()));
        }

        Ok(())
    }
}

impl FollowUpSink for WebhookFollowUp {
    fn edit_original<'a>(
        &'a self,
        target: &'a FollowUpTarget,
        content: &'a str,
    ) -> BoxFuture<'a, Result<(), FollowUpError>> {
        Box::pin(self.patch_original(target, content))
    }
}

// =============================================================================
// Dispatch of follow-up tasks
// =============================================================================

/// Spawns follow-up deliveries as detached, tracked tasks.
#[derive(Clone)]
pub struct FollowUps {
    sink: Arc<dyn FollowUpSink>,
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl FollowUps {
    pub fn new(
        sink: Arc<dyn FollowUpSink>,
        max_pending: usize,
        tracker: TaskTracker,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            sink,
            permits: Arc::new(Semaphore::new(max_pending)),
            tracker,
            shutdown,
        }
    }

    /// Start delivering `content` to `target` in the background.
    ///
    /// Returns `false` if the follow-up was dropped because too many are
    /// already in flight.
    pub fn submit(&self, target: FollowUpTarget, content: String) -> bool {
        let permit = match Arc::clone(&self.permits).try_acquire_owned() {
            Ok(p) => p,
            Err(_) => {
                warn!(
                    application_id = %target.application_id,
                    "follow_up_dropped_saturated"
                );
                return false;
            }
        };

        let sink = Arc::clone(&self.sink);
        let shutdown = self.shutdown.clone();

        self.tracker.spawn(async move {
            let _permit = permit;

            tokio::select! {
                result = sink.edit_original(&target, &content) => match result {
                    Ok(()) => info!(
                        application_id = %target.application_id,
                        content_length = content.len(),
                        "follow_up_delivered"
                    ),
                    Err(e) => error!(
                        application_id = %target.application_id,
                        error = %e,
                        "follow_up_failed"
                    ),
                },
                _ = shutdown.cancelled() => {
                    warn!(application_id = %target.application_id, "follow_up_cancelled");
                }
            }
        });

        true
    }

    /// Number of follow-ups that may still be started.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}
