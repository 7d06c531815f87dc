//! Gateway event fan-out.

pub mod guild;
pub mod message;
pub mod reaction;

use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing::error;

use crate::discord::InteractionEvent;
use crate::{Data, Error};

pub async fn handle_event(event: &serenity::FullEvent, data: &Arc<Data>) -> Result<(), Error> {
    match event {
        serenity::FullEvent::InteractionCreate { interaction } => {
            if let Some(event) = InteractionEvent::from_serenity(interaction) {
                // The registry answers on its own task so the gateway loop
                // never waits on a handler.
                data.registry.dispatch(Arc::clone(data), event);
            }
        }
        serenity::FullEvent::ReactionAdd { add_reaction } => {
            if let Err(e) = reaction::handle_reaction_add(add_reaction, data).await {
                error!(message_id = %add_reaction.message_id, error = %e, "Failed to handle reaction");
            }
        }
        serenity::FullEvent::Message { new_message } => {
            if let Err(e) = message::handle_message(new_message, data).await {
                error!(message_id = %new_message.id, error = %e, "Failed to handle message");
            }
        }
        serenity::FullEvent::GuildCreate { guild, is_new } => {
            if let Err(e) = guild::handle_guild_create(guild, *is_new, data).await {
                error!(guild_id = %guild.id, error = %e, "Failed to handle guild create");
            }
        }
        _ => {}
    }
    Ok(())
}
