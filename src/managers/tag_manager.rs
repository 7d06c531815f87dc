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
struct TagClaim<'a> {
    guild_id: &'a str,
    user_id: &'a str,
    tag_number: i64,
}

pub fn register(builder: &mut RegistryBuilder) {
    builder.register(
        Registration::command("claimtag", handle_claim_tag)
            .permission(PermissionLevel::Player)
            .requires_setup(),
    );
}

fn handle_claim_tag(data: Arc<Data>, event: InteractionEvent) -> BoxFuture<'static, Result<HandlerOutcome>> {
    claim_tag(data, event).boxed()
}

async fn claim_tag(data: Arc<Data>, event: InteractionEvent) -> Result<HandlerOutcome> {
    let guild_id = guild_of(&event)?.to_string();
    let tag_number = match event.options.get("tag").and_then(|v| v.as_i64()).filter(|n| *n > 0) {
        Some(tag) => tag,
        None => {
            return reject(
                &data,
                &event.handle,
                BotError::invalid_input("Tag number must be a positive whole number", "13"),
            )
            .await
        }
    };

    data.session
        .respond(&event.handle, InteractionReply::Defer { ephemeral: true })
        .await?;

    let payload = TagClaim {
        guild_id: &guild_id,
        user_id: event.user_id(),
        tag_number,
    };
    let published = publish_correlated(
        &data,
        &event.handle,
        topics::TAG_CLAIM_REQUESTED,
        &EventOrigin::from_interaction(&event.handle, &guild_id),
        &payload,
        None,
    )
    .await;
    finish_publish(&data, &event.handle, published).await
}
