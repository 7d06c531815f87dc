//! `/updaterole`: editors pick a club role for a member from a button row.

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use std::sync::Arc;

use super::{finish_publish, guild_of, publish_correlated, reject};
use crate::bus::{topics, EventOrigin};
use crate::discord::{ButtonSpec, ButtonStyle, InteractionEvent, InteractionReply, OutgoingMessage};
use crate::error::{BotError, HandlerOutcome, Result};
use crate::registry::{custom_id, PermissionLevel, Registration, RegistryBuilder};
use crate::Data;

pub const BUTTON_PREFIX: &str = "role_button";
pub const CANCEL_ID: &str = "role_button_cancel";

/// Club roles a member can be given, as the backend names them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClubRole {
    Player,
    Editor,
    Admin,
}

impl ClubRole {
    pub const ALL: [ClubRole; 3] = [ClubRole::Player, ClubRole::Editor, ClubRole::Admin];

    pub fn as_str(self) -> &'static str {
        match self {
            ClubRole::Player => "player",
            ClubRole::Editor => "editor",
            ClubRole::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(value.trim()))
    }

    fn label(self) -> &'static str {
        match self {
            ClubRole::Player => "Player",
            ClubRole::Editor => "Editor",
            ClubRole::Admin => "Admin",
        }
    }
}

#[derive(Debug, Serialize)]
struct RoleUpdateRequest<'a> {
    guild_id: &'a str,
    user_id: &'a str,
    role: ClubRole,
    requested_by: &'a str,
}

pub fn register(builder: &mut RegistryBuilder) {
    builder
        .register(
            Registration::command("updaterole", handle_update_role)
                .permission(PermissionLevel::Editor)
                .requires_setup(),
        )
        .register(
            Registration::component(BUTTON_PREFIX, handle_role_button)
                .permission(PermissionLevel::Editor)
                .requires_setup(),
        )
        .register(Registration::component_exact(CANCEL_ID, handle_cancel).permission(PermissionLevel::Editor));
}

fn handle_update_role(data: Arc<Data>, event: InteractionEvent) -> BoxFuture<'static, Result<HandlerOutcome>> {
    update_role(data, event).boxed()
}

async fn update_role(data: Arc<Data>, event: InteractionEvent) -> Result<HandlerOutcome> {
    let target = match event.option_str("user") {
        Some(target) => target.to_string(),
        None => {
            return reject(
                &data,
                &event.handle,
                BotError::invalid_input("Pick the member whose role should change", "/updaterole user:@member"),
            )
            .await
        }
    };

    let message = ClubRole::ALL.into_iter().fold(
        OutgoingMessage::ephemeral(format!("Select a new role for <@{}>:", target)),
        |msg, role| {
            msg.with_button(ButtonSpec::new(
                custom_id::build(BUTTON_PREFIX, &[role.as_str(), &target]),
                role.label(),
                ButtonStyle::Primary,
            ))
        },
    );
    let message = message.with_button(ButtonSpec::new(CANCEL_ID, "Cancel", ButtonStyle::Secondary));

    data.session
        .respond(&event.handle, InteractionReply::Message(message))
        .await?;
    Ok(HandlerOutcome::Success)
}

fn handle_role_button(data: Arc<Data>, event: InteractionEvent) -> BoxFuture<'static, Result<HandlerOutcome>> {
    role_button(data, event).boxed()
}

async fn role_button(data: Arc<Data>, event: InteractionEvent) -> Result<HandlerOutcome> {
    let guild_id = guild_of(&event)?.to_string();
    let role = custom_id::positional(&event.key, 0).and_then(ClubRole::parse);
    let target = custom_id::positional(&event.key, 1);
    let (role, target) = match (role, target) {
        (Some(role), Some(target)) => (role, target.to_string()),
        _ => {
            data.session
                .respond(
                    &event.handle,
                    InteractionReply::UpdateMessage(OutgoingMessage::ephemeral(
                        "❌ That role selection is no longer valid. Run `/updaterole` again.",
                    )),
                )
                .await?;
            return Ok(HandlerOutcome::Failure(format!("malformed role button '{}'", event.key)));
        }
    };

    data.session
        .respond(
            &event.handle,
            InteractionReply::UpdateMessage(OutgoingMessage::ephemeral(format!(
                "⏳ Updating <@{}> to {}…",
                target,
                role.label()
            ))),
        )
        .await?;

    let payload = RoleUpdateRequest {
        guild_id: &guild_id,
        user_id: &target,
        role,
        requested_by: event.user_id(),
    };
    let published = publish_correlated(
        &data,
        &event.handle,
        topics::ROLE_UPDATE_REQUEST,
        &EventOrigin::from_interaction(&event.handle, &guild_id),
        &payload,
        None,
    )
    .await;
    finish_publish(&data, &event.handle, published).await
}

fn handle_cancel(data: Arc<Data>, event: InteractionEvent) -> BoxFuture<'static, Result<HandlerOutcome>> {
    cancel(data, event).boxed()
}

async fn cancel(data: Arc<Data>, event: InteractionEvent) -> Result<HandlerOutcome> {
    data.session
        .respond(
            &event.handle,
            InteractionReply::UpdateMessage(OutgoingMessage::ephemeral("Role update cancelled.")),
        )
        .await?;
    Ok(HandlerOutcome::Success)
}
