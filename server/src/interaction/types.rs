//! Inbound interaction payloads.
//!
//! Only the fields the relay needs are typed; everything under `data` is
//! passed through to handlers untouched.

use serde::{Deserialize, Serialize};

/// Interaction type code of the platform's liveness probe.
pub const PING: u64 = 1;

// =============================================================================
// Payload
// =============================================================================

/// A verified interaction payload as sent by the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionPayload {
    /// Interaction id
    #[serde(default)]
    pub id: String,
    /// Application the interaction is addressed to
    #[serde(default)]
    pub application_id: String,
    /// Interaction type code
    #[serde(rename = "type")]
    pub kind: u64,
    /// Continuation token used to edit the original response
    #[serde(default)]
    pub token: String,
    /// Type-specific data (command name and options, component id, modal values)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

impl InteractionPayload {
    /// Parse a verified request body.
    pub fn from_slice(body: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(body)
    }

    /// Name of the invoked command, if the payload carries one.
    pub fn command_name(&self) -> Option<&str> {
        self.data.as_ref()?.get("name")?.as_str()
    }

    /// Custom id of the component or modal that produced this interaction.
    pub fn custom_id(&self) -> Option<&str> {
        self.data.as_ref()?.get("custom_id")?.as_str()
    }
}

// =============================================================================
// Classification
// =============================================================================

/// Interaction types that are routed to handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    ApplicationCommand,
    MessageComponent,
    ApplicationCommandAutocomplete,
    ModalSubmit,
}

impl ActionKind {
    pub const ALL: [ActionKind; 4] = [
        ActionKind::ApplicationCommand,
        ActionKind::MessageComponent,
        ActionKind::ApplicationCommandAutocomplete,
        ActionKind::ModalSubmit,
    ];

    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            2 => Some(ActionKind::ApplicationCommand),
            3 => Some(ActionKind::MessageComponent),
            4 => Some(ActionKind::ApplicationCommandAutocomplete),
            5 => Some(ActionKind::ModalSubmit),
            _ => None,
        }
    }

    pub fn code(self) -> u64 {
        match self {
            ActionKind::ApplicationCommand => 2,
            ActionKind::MessageComponent => 3,
            ActionKind::ApplicationCommandAutocomplete => 4,
            ActionKind::ModalSubmit => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::ApplicationCommand => "application_command",
            ActionKind::MessageComponent => "message_component",
            ActionKind::ApplicationCommandAutocomplete => "application_command_autocomplete",
            ActionKind::ModalSubmit => "modal_submit",
        }
    }
}

/// A classified interaction.
#[derive(Debug, Clone)]
pub enum Interaction {
    /// Liveness probe, answered without running any handler.
    Liveness,
    /// An action that needs a handler.
    Action(ActionKind, InteractionPayload),
    /// Type code outside the known set.
    Unknown(u64),
}

impl Interaction {
    pub fn classify(payload: InteractionPayload) -> Self {
        if payload.kind == PING {
            return Interaction::Liveness;
        }
        match ActionKind::from_code(payload.kind) {
            Some(kind) => Interaction::Action(kind, payload),
            None => Interaction::Unknown(payload.kind),
        }
    }
}
