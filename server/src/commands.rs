//! Built-in slash commands served by the relay binary.

use std::time::Instant;

use relay::{ActionKind, HandlerRegistry, InteractionContext, InteractionPayload};
use tracing::info;

/// Registry with the built-in command handler.
pub fn registry() -> HandlerRegistry {
    HandlerRegistry::new().on(ActionKind::ApplicationCommand, application_command)
}

/// Handle an application command.
///
/// `/ping` replies immediately and then edits the reply with how long the
/// reply took; anything else gets a short notice.
async fn application_command(
    interaction: InteractionPayload,
    ctx: InteractionContext,
) -> anyhow::Result<()> {
    let started = Instant::now();

    match interaction.command_name() {
        Some("ping") => {
            ctx.reply("Pong!");
            let elapsed_ms = started.elapsed().as_millis();
            info!(interaction_id = %interaction.id, elapsed_ms = elapsed_ms as u64, "ping_replied");
            ctx.edit_reply(format!("Pong! Replied in {elapsed_ms} ms."));
        }
        Some(name) => {
            ctx.reply(format!("Unknown command `/{name}`."));
        }
        None => {
            ctx.reply("Command payload had no name.");
        }
    }

    Ok(())
}
