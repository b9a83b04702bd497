//! Interaction Relay - signature-verifying interaction webhook server.
//!
//! This library provides the pieces of the `relay-server` binary:
//! - `web`: router, request authentication, and Ed25519 signature checks
//! - `dispatch`: classification of verified interactions and handler registry
//! - `broker`: deferred responses, where a handler's first reply becomes the
//!   HTTP response and everything after it runs in the background
//!
//! ## Architecture
//!
//! ```text
//! POST /interactions → Authenticator → Dispatcher → Broker → HTTP response
//!                                                      └──→ follow-up edits (background)
//! ```

pub mod broker;
pub mod config;
pub mod credentials;
pub mod dispatch;
pub mod error;
pub mod interaction;
pub mod web;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use broker::{
    handler_fn, DeferredResponseBroker, FollowUpSink, InteractionContext, InteractionHandler,
    WebhookFollowUp,
};
pub use config::Config;
pub use credentials::{Credential, Credentials};
pub use dispatch::{Dispatcher, HandlerRegistry};
pub use error::InteractionError;
pub use interaction::{ActionKind, Interaction, InteractionPayload, InteractionResponse};
pub use web::{build_router, AppState, Authenticator};
