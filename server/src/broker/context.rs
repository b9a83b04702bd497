//! Capabilities handed to interaction handlers.
//!
//! - `reply` - supply the synchronous HTTP response (first call wins)
//! - `edit_reply` - edit that response later, in the background
//!
//! A reply that arrives after the deadline acknowledgment was sent becomes an
//! edit of the deferred message.
//!
//! # Example
//!
//! ```ignore
//! async fn slow_lookup(interaction: InteractionPayload, ctx: InteractionContext) -> anyhow::Result<()> {
//!     ctx.reply("Looking that up...");
//!     let answer = lookup(interaction.command_name()).await?;
//!     ctx.edit_reply(answer);
//!     Ok(())
//! }
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::follow_up::{FollowUpError, FollowUpTarget, FollowUps};
use crate::interaction::{ActionKind, InteractionResponse};

/// What happened to a reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyState {
    /// This reply became the HTTP response.
    Sent,
    /// An earlier reply already did.
    AlreadyReplied,
    /// The response was already sent as a deferred acknowledgment; the
    /// reply is handed back.
    Expired(InteractionResponse),
}

/// Once-settable slot for the synchronous response.
#[derive(Debug)]
pub struct ReplySlot {
    sender: Mutex<Option<oneshot::Sender<InteractionResponse>>>,
}

impl ReplySlot {
    pub fn new(sender: oneshot::Sender<InteractionResponse>) -> Self {
        Self {
            sender: Mutex::new(Some(sender)),
        }
    }

    pub fn fill(&self, response: InteractionResponse) -> ReplyState {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match sender {
            None => ReplyState::AlreadyReplied,
            Some(tx) => match tx.send(response) {
                Ok(()) => ReplyState::Sent,
                Err(response) => ReplyState::Expired(response),
            },
        }
    }

    pub fn is_filled(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

/// Context passed to interaction handlers.
///
/// `InteractionContext` is `Clone`; clones share the same reply slot, so a
/// reply from any clone counts as the one reply. The synchronous response
/// falls back to a deferred acknowledgment once every clone is dropped
/// without replying.
#[derive(Clone)]
pub struct InteractionContext {
    interaction_id: Arc<str>,
    kind: ActionKind,
    reply: Arc<ReplySlot>,
    target: Result<FollowUpTarget, Arc<FollowUpError>>,
    follow_ups: FollowUps,
}

impl InteractionContext {
    pub(crate) fn new(
        interaction_id: &str,
        kind: ActionKind,
        reply: ReplySlot,
        target: Result<FollowUpTarget, FollowUpError>,
        follow_ups: FollowUps,
    ) -> Self {
        Self {
            interaction_id: Arc::from(interaction_id),
            kind,
            reply: Arc::new(reply),
            target: target.map_err(Arc::new),
            follow_ups,
        }
    }

    pub fn interaction_id(&self) -> &str {
        &self.interaction_id
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    /// Send `message` as the synchronous response.
    ///
    /// Only the first call has an effect. Later calls are ignored and
    /// return `false`.
    pub fn reply(&self, message: impl Into<String>) -> bool {
        self.reply_with(InteractionResponse::message(message))
    }

    /// Send a prepared response body as the synchronous response.
    ///
    /// After the deadline its content is delivered as an edit of the deferred
    /// message instead. Bodies without content, and autocomplete results,
    /// are dropped.
    pub fn reply_with(&self, response: InteractionResponse) -> bool {
        match self.reply.fill(response) {
            ReplyState::Sent => true,
            ReplyState::AlreadyReplied => {
                debug!(interaction_id = %self.interaction_id, "interaction_reply_ignored");
                false
            }
            ReplyState::Expired(late) => match late.data.and_then(|data| data.content) {
                Some(content) if self.kind != ActionKind::ApplicationCommandAutocomplete => {
                    warn!(
                        interaction_id = %self.interaction_id,
                        kind = self.kind.as_str(),
                        "interaction_reply_after_deadline"
                    );
                    self.edit_reply(content)
                }
                _ => {
                    warn!(
                        interaction_id = %self.interaction_id,
                        kind = self.kind.as_str(),
                        "interaction_reply_after_deadline_dropped"
                    );
                    false
                }
            },
        }
    }

    pub fn has_replied(&self) -> bool {
        self.reply.is_filled()
    }

    /// Edit the original response in the background.
    ///
    /// Never blocks and is never awaited by the HTTP layer. Returns `false`
    /// if the edit could not be started.
    pub fn edit_reply(&self, message: impl Into<String>) -> bool {
        match &self.target {
            Ok(target) => self.follow_ups.submit(target.clone(), message.into()),
            Err(e) => {
                warn!(
                    interaction_id = %self.interaction_id,
                    error = %e,
                    "follow_up_target_missing"
                );
                false
            }
        }
    }
}
