use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use super::{finish_publish, guild_of, publish_correlated};
use crate::bus::{topics, EventOrigin};
use crate::discord::{InteractionEvent, InteractionReply, OutgoingMessage};
use crate::error::{HandlerOutcome, Result};
use crate::registry::permissions::BOOTSTRAP_COMMAND;
use crate::registry::{Registration, RegistryBuilder};
use crate::Data;

#[derive(Debug, Serialize)]
struct SetupRequest<'a> {
    guild_id: &'a str,
    requested_by: &'a str,
}

pub fn register(builder: &mut RegistryBuilder) {
    // The registry lets this command through unconditionally; the handler
    // itself insists on Discord's administrator bit.
    builder.register(Registration::command(BOOTSTRAP_COMMAND, handle_setup));
}

fn handle_setup(data: Arc<Data>, event: InteractionEvent) -> BoxFuture<'static, Result<HandlerOutcome>> {
    setup(data, event).boxed()
}

async fn setup(data: Arc<Data>, event: InteractionEvent) -> Result<HandlerOutcome> {
    let guild_id = guild_of(&event)?.to_string();
    if !event.is_guild_admin {
        data.session
            .respond(
                &event.handle,
                InteractionReply::Message(OutgoingMessage::ephemeral(
                    "⛔ You need the Administrator permission to run `/frolf-setup`.",
                )),
            )
            .await?;
        return Ok(HandlerOutcome::Failure("not a guild administrator".into()));
    }

    data.session
        .respond(&event.handle, InteractionReply::Defer { ephemeral: true })
        .await?;

    info!(guild_id = %guild_id, user_id = %event.user_id(), "Guild setup requested");
    let payload = SetupRequest {
        guild_id: &guild_id,
        requested_by: event.user_id(),
    };
    let published = publish_correlated(
        &data,
        &event.handle,
        topics::GUILD_SETUP_REQUESTED,
        &EventOrigin::from_interaction(&event.handle, &guild_id),
        &payload,
        None,
    )
    .await;
    finish_publish(&data, &event.handle, published).await
}
