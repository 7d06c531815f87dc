pub mod guild_config_manager;
pub mod invite_manager;
pub mod reset_manager;
pub mod role_manager;
pub mod round_manager;
pub mod scorecard_manager;
pub mod setup_manager;
pub mod signup_manager;
pub mod tag_manager;
pub mod udisc_manager;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::bus::{build, EventOrigin};
use crate::discord::{InteractionHandle, InteractionReply, OutgoingMessage};
use crate::error::{BotError, HandlerOutcome, Result};
use crate::registry::{InteractionRegistry, RegistryBuilder};
use crate::Data;

pub use guild_config_manager::{
    create_shared_guild_config_resolver, BusConfigRequester, SharedGuildConfigResolver,
};

/// Every interaction handler the bot knows about.
pub fn build_registry() -> InteractionRegistry {
    let mut builder = RegistryBuilder::new();
    setup_manager::register(&mut builder);
    reset_manager::register(&mut builder);
    role_manager::register(&mut builder);
    signup_manager::register(&mut builder);
    udisc_manager::register(&mut builder);
    tag_manager::register(&mut builder);
    round_manager::register(&mut builder);
    scorecard_manager::register(&mut builder);
    invite_manager::register(&mut builder);
    builder.build()
}

/// Park `handle` under a correlation ID and publish the request carrying it.
///
/// The entry is removed again if the publish fails, so a failed request never
/// leaves an orphan behind. Returns the correlation ID.
pub async fn publish_correlated<T: Serialize + Sync>(
    data: &Data,
    handle: &InteractionHandle,
    topic: &str,
    origin: &EventOrigin,
    payload: &T,
    correlation_id: Option<String>,
) -> Result<String> {
    let correlation_id = correlation_id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let envelope = build(payload, topic, origin, Some(correlation_id.clone()))?;

    data.correlations.set(&correlation_id, handle.clone(), None)?;
    if let Err(e) = data.bus.publish(&envelope).await {
        data.correlations.delete(&correlation_id);
        return Err(e);
    }
    info!(correlation_id = %correlation_id, topic, guild_id = %origin.guild_id, "Published request");
    Ok(correlation_id)
}

/// Publish without expecting a reply.
pub async fn publish_uncorrelated<T: Serialize + Sync>(
    data: &Data,
    topic: &str,
    origin: &EventOrigin,
    payload: &T,
) -> Result<String> {
    let envelope = build(payload, topic, origin, None)?;
    data.bus.publish(&envelope).await?;
    let correlation_id = envelope.correlation_id().unwrap_or_default().to_string();
    info!(correlation_id = %correlation_id, topic, guild_id = %origin.guild_id, "Published event");
    Ok(correlation_id)
}

/// Answer an unacknowledged interaction with an ephemeral rejection.
pub async fn reject(data: &Data, handle: &InteractionHandle, err: BotError) -> Result<HandlerOutcome> {
    data.session
        .respond(
            handle,
            InteractionReply::Message(OutgoingMessage::ephemeral(err.user_message())),
        )
        .await?;
    Ok(HandlerOutcome::Failure(err.to_string()))
}

/// Replace an already acknowledged response with the error's user message.
pub async fn report_after_ack(data: &Data, handle: &InteractionHandle, err: BotError) -> Result<HandlerOutcome> {
    warn!(interaction_id = %handle.interaction_id, error = %err, "Request could not be sent");
    data.session
        .edit_response(handle, OutgoingMessage::ephemeral(err.user_message()))
        .await?;
    Ok(HandlerOutcome::Failure(err.to_string()))
}

/// Outcome of a publish made after the interaction was acknowledged.
pub async fn finish_publish(
    data: &Data,
    handle: &InteractionHandle,
    published: Result<String>,
) -> Result<HandlerOutcome> {
    match published {
        Ok(_) => Ok(HandlerOutcome::Success),
        Err(e) => report_after_ack(data, handle, e).await,
    }
}

/// The gate already refuses guild-only handlers in DMs.
pub(crate) fn guild_of(event: &crate::discord::InteractionEvent) -> Result<&str> {
    event
        .guild_id()
        .ok_or_else(|| BotError::internal(format!("'{}' reached a handler without a guild", event.key)))
}
