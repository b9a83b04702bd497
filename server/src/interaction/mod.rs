//! Interaction model: inbound payloads and the responses sent back.
//!
//! ## Flow
//!
//! ```text
//! verified body → InteractionPayload → Interaction::classify() → InteractionResponse
//! ```

pub mod response;
pub mod types;

pub use response::{response_type, InteractionResponse, ResponseData};
pub use types::{ActionKind, Interaction, InteractionPayload, PING};
