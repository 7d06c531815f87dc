use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing::info;

use crate::commands::sync_for;
use crate::{Data, Error};

/// A freshly joined guild gets its commands right away. Guilds that come
/// back on reconnect are covered by the startup sync.
pub async fn handle_guild_create(
    guild: &serenity::Guild,
    is_new: Option<bool>,
    data: &Arc<Data>,
) -> Result<(), Error> {
    if is_new != Some(true) {
        return Ok(());
    }
    info!(guild_id = %guild.id, guild_name = %guild.name, "Joined new guild");

    let data = Arc::clone(data);
    let guild_id = guild.id.to_string();
    tokio::spawn(async move {
        sync_for(&data, &guild_id).await;
    });
    Ok(())
}
