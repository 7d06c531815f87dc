use poise::serenity_prelude as serenity;
use tracing::debug;

use crate::managers::signup_manager::{handle_reaction, ReactionEmoji, ReactionEvent};
use crate::{Data, Error};

fn reaction_emoji(emoji: &serenity::ReactionType) -> Option<ReactionEmoji> {
    match emoji {
        serenity::ReactionType::Unicode(glyph) => Some(ReactionEmoji::Unicode(glyph.clone())),
        serenity::ReactionType::Custom { id, name, .. } => Some(ReactionEmoji::Custom {
            id: id.to_string(),
            name: name.clone(),
        }),
        _ => None,
    }
}

pub async fn handle_reaction_add(reaction: &serenity::Reaction, data: &Data) -> Result<(), Error> {
    let (user_id, emoji) = match (reaction.user_id, reaction_emoji(&reaction.emoji)) {
        (Some(user_id), Some(emoji)) => (user_id, emoji),
        _ => return Ok(()),
    };

    let event = ReactionEvent {
        guild_id: reaction.guild_id.map(|g| g.to_string()),
        channel_id: reaction.channel_id.to_string(),
        message_id: reaction.message_id.to_string(),
        user_id: user_id.to_string(),
        emoji,
    };
    if handle_reaction(data, event).await? {
        debug!(user_id = %user_id, "Signup prompt sent");
    }
    Ok(())
}
