use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use std::sync::Arc;

use super::{finish_publish, guild_of, publish_correlated, reject};
use crate::bus::{topics, EventOrigin};
use crate::discord::{InteractionEvent, InteractionReply};
use crate::error::{BotError, HandlerOutcome, Result};
use crate::registry::{PermissionLevel, Registration, RegistryBuilder};
use crate::Data;

#[derive(Debug, Serialize)]
struct IdentityUpdate<'a> {
    guild_id: &'a str,
    user_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

pub fn register(builder: &mut RegistryBuilder) {
    builder.register(
        Registration::command("set-udisc-name", handle_set_udisc_name)
            .permission(PermissionLevel::Player)
            .requires_setup(),
    );
}

/// UDisc usernames are matched case-insensitively by the backend.
fn normalize(value: Option<&str>) -> Option<String> {
    value
        .map(|v| v.trim().trim_start_matches('@').to_lowercase())
        .filter(|v| !v.is_empty())
}

fn handle_set_udisc_name(data: Arc<Data>, event: InteractionEvent) -> BoxFuture<'static, Result<HandlerOutcome>> {
    set_udisc_name(data, event).boxed()
}

async fn set_udisc_name(data: Arc<Data>, event: InteractionEvent) -> Result<HandlerOutcome> {
    let guild_id = guild_of(&event)?.to_string();
    let username = normalize(event.option_str("username"));
    let name = event
        .option_str("name")
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string);

    if username.is_none() && name.is_none() {
        return reject(
            &data,
            &event.handle,
            BotError::invalid_input(
                "Provide your UDisc username, your display name, or both",
                "/set-udisc-name username:discdave name:Dave Smith",
            ),
        )
        .await;
    }

    data.session
        .respond(&event.handle, InteractionReply::Defer { ephemeral: true })
        .await?;

    let payload = IdentityUpdate {
        guild_id: &guild_id,
        user_id: event.user_id(),
        username,
        name,
    };
    let published = publish_correlated(
        &data,
        &event.handle,
        topics::UDISC_IDENTITY_UPDATE_REQUEST,
        &EventOrigin::from_interaction(&event.handle, &guild_id),
        &payload,
        None,
    )
    .await;
    finish_publish(&data, &event.handle, published).await
}
