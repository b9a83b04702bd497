//! Interaction response bodies returned on the synchronous HTTP response.

use serde::{Deserialize, Serialize};

use super::types::ActionKind;

/// Interaction response type codes.
pub mod response_type {
    pub const PONG: u8 = 1;
    pub const CHANNEL_MESSAGE_WITH_SOURCE: u8 = 4;
    pub const DEFERRED_CHANNEL_MESSAGE_WITH_SOURCE: u8 = 5;
    pub const DEFERRED_UPDATE_MESSAGE: u8 = 6;
    pub const AUTOCOMPLETE_RESULT: u8 = 8;
}

/// Body of the synchronous response to an interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionResponse {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<serde_json::Value>>,
}

impl InteractionResponse {
    /// Acknowledge a liveness probe.
    pub fn pong() -> Self {
        Self {
            kind: response_type::PONG,
            data: None,
        }
    }

    /// Respond with a message carrying `content`.
    pub fn message(content: impl Into<String>) -> Self {
        Self {
            kind: response_type::CHANNEL_MESSAGE_WITH_SOURCE,
            data: Some(ResponseData {
                content: Some(content.into()),
                choices: None,
            }),
        }
    }

    /// Acknowledgment sent when a handler has not replied in time.
    ///
    /// Commands and modals get a "thinking" placeholder that can be edited
    /// later, components keep their message as-is, and autocomplete (which
    /// cannot be deferred) gets an empty choice list.
    pub fn deferred(kind: ActionKind) -> Self {
        match kind {
            ActionKind::ApplicationCommand | ActionKind::ModalSubmit => Self {
                kind: response_type::DEFERRED_CHANNEL_MESSAGE_WITH_SOURCE,
                data: None,
            },
            ActionKind::MessageComponent => Self {
                kind: response_type::DEFERRED_UPDATE_MESSAGE,
                data: None,
            },
            ActionKind::ApplicationCommandAutocomplete => Self {
                kind: response_type::AUTOCOMPLETE_RESULT,
                data: Some(ResponseData {
                    content: None,
                    choices: Some(Vec::new()),
                }),
            },
        }
    }

    pub fn content(&self) -> Option<&str> {
        self.data.as_ref()?.content.as_deref()
    }
}
