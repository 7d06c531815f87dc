//! `/frolf-reset`: two-step confirmation before the guild config is deleted.

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use super::{finish_publish, guild_of, publish_correlated};
use crate::bus::{topics, EventOrigin};
use crate::discord::{ButtonSpec, ButtonStyle, InteractionEvent, InteractionReply, OutgoingMessage};
use crate::error::{HandlerOutcome, Result};
use crate::registry::{custom_id, PermissionLevel, Registration, RegistryBuilder};
use crate::Data;

pub const CONFIRM_PREFIX: &str = "frolf_reset_confirm";
pub const CANCEL_ID: &str = "frolf_reset_cancel";

#[derive(Debug, Serialize)]
struct DeletionRequest<'a> {
    guild_id: &'a str,
    requested_by: &'a str,
}

pub fn register(builder: &mut RegistryBuilder) {
    builder
        .register(
            Registration::command("frolf-reset", handle_reset_command)
                .permission(PermissionLevel::Admin)
                .requires_setup(),
        )
        .register(
            Registration::component(CONFIRM_PREFIX, handle_confirm)
                .permission(PermissionLevel::Admin)
                .requires_setup(),
        )
        .register(Registration::component_exact(CANCEL_ID, handle_cancel).permission(PermissionLevel::Admin));
}

fn handle_reset_command(data: Arc<Data>, event: InteractionEvent) -> BoxFuture<'static, Result<HandlerOutcome>> {
    reset_command(data, event).boxed()
}

async fn reset_command(data: Arc<Data>, event: InteractionEvent) -> Result<HandlerOutcome> {
    let cid = Uuid::new_v4().to_string();
    let confirm_id = custom_id::build(CONFIRM_PREFIX, &[&format!("cid={}", cid)]);
    let message = OutgoingMessage::ephemeral(
        "⚠️ This deletes the frolf configuration for this server. Signups, roles and channels stop working until `/frolf-setup` runs again. Continue?",
    )
    .with_button(ButtonSpec::new(confirm_id, "Reset", ButtonStyle::Danger))
    .with_button(ButtonSpec::new(CANCEL_ID, "Cancel", ButtonStyle::Secondary));

    data.session
        .respond(&event.handle, InteractionReply::Message(message))
        .await?;
    Ok(HandlerOutcome::Success)
}

fn handle_confirm(data: Arc<Data>, event: InteractionEvent) -> BoxFuture<'static, Result<HandlerOutcome>> {
    confirm(data, event).boxed()
}

async fn confirm(data: Arc<Data>, event: InteractionEvent) -> Result<HandlerOutcome> {
    let guild_id = guild_of(&event)?.to_string();

    // Bare legacy ids carry no correlation and are no longer honoured.
    let cid = match custom_id::param(&event.key, "cid") {
        Some(cid) => cid.to_string(),
        None => {
            data.session
                .respond(
                    &event.handle,
                    InteractionReply::UpdateMessage(OutgoingMessage::ephemeral(
                        "⌛ This confirmation has expired, run `/frolf-reset` again.",
                    )),
                )
                .await?;
            return Ok(HandlerOutcome::Failure("expired reset confirmation".into()));
        }
    };

    data.session
        .respond(
            &event.handle,
            InteractionReply::UpdateMessage(OutgoingMessage::ephemeral("🧹 Resetting guild configuration…")),
        )
        .await?;

    let payload = DeletionRequest {
        guild_id: &guild_id,
        requested_by: event.user_id(),
    };
    let published = publish_correlated(
        &data,
        &event.handle,
        topics::GUILD_CONFIG_DELETION_REQUESTED,
        &EventOrigin::from_interaction(&event.handle, &guild_id),
        &payload,
        Some(cid),
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
            InteractionReply::UpdateMessage(OutgoingMessage::ephemeral("Reset cancelled.")),
        )
        .await?;
    Ok(HandlerOutcome::Success)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discord::fake::SessionCall;
    use crate::testing::{component_event, slash_event, TestHarness, ADMIN_ROLE, EDITOR_ROLE};

    fn confirm_id_from(harness: &TestHarness) -> String {
        harness
            .session
            .calls()
            .into_iter()
            .find_map(|c| match c {
                SessionCall::Respond {
                    reply: InteractionReply::Message(m),
                    ..
                } => m.buttons.first().map(|b| b.custom_id.clone()),
                _ => None,
            })
            .unwrap()
    }

    #[tokio::test]
    async fn test_confirm_uses_minted_correlation_id() {
        let harness = TestHarness::with_complete_guild("G1");
        let mut command = slash_event("G1", "U1", "frolf-reset");
        command.member_roles = vec![ADMIN_ROLE.to_string()];
        harness.dispatch(command).await;

        let confirm_id = confirm_id_from(&harness);
        let cid = custom_id::param(&confirm_id, "cid").unwrap().to_string();

        let mut press = component_event("G1", "U1", &confirm_id);
        press.member_roles = vec![ADMIN_ROLE.to_string()];
        harness.dispatch(press).await;

        let published = harness.bus.published_on(topics::GUILD_CONFIG_DELETION_REQUESTED);
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].correlation_id(), Some(cid.as_str()));
        assert!(harness.data.correlations.get(&cid).is_some());
    }

    #[tokio::test]
    async fn test_bare_legacy_confirm_is_expired() {
        let harness = TestHarness::with_complete_guild("G1");
        let mut press = component_event("G1", "U1", CONFIRM_PREFIX);
        press.member_roles = vec![ADMIN_ROLE.to_string()];
        harness.dispatch(press).await;

        assert!(harness.bus.published().is_empty());
        assert!(harness.session.contents()[0].contains("expired"));
    }

    #[tokio::test]
    async fn test_editor_cannot_reset() {
        let harness = TestHarness::with_complete_guild("G1");
        let mut command = slash_event("G1", "U1", "frolf-reset");
        command.member_roles = vec![EDITOR_ROLE.to_string()];
        harness.dispatch(command).await;

        assert!(harness.session.contents()[0]
            .to_lowercase()
            .contains("insufficient permissions"));
    }

    #[tokio::test]
    async fn test_publish_failure_reports_and_leaves_no_entry() {
        let harness = TestHarness::with_complete_guild("G1");
        harness.bus.fail_next_publishes(1);
        let mut press = component_event("G1", "U1", "frolf_reset_confirm|cid=abc");
        press.member_roles = vec![ADMIN_ROLE.to_string()];
        harness.dispatch(press).await;

        assert!(harness.data.correlations.get("abc").is_none());
        let contents = harness.session.contents();
        assert!(contents.last().unwrap().contains("try again"));
    }
}
