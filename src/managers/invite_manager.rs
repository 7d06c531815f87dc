use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;
use tracing::warn;

use super::{guild_of, report_after_ack};
use crate::discord::{InteractionEvent, InteractionReply, OutgoingMessage};
use crate::error::{HandlerOutcome, Result};
use crate::registry::{Registration, RegistryBuilder};
use crate::Data;

/// Invites expire after a day.
const INVITE_MAX_AGE_SECS: u32 = 86_400;

pub fn register(builder: &mut RegistryBuilder) {
    builder.register(Registration::command("invite", handle_invite).requires_setup());
}

fn handle_invite(data: Arc<Data>, event: InteractionEvent) -> BoxFuture<'static, Result<HandlerOutcome>> {
    invite(data, event).boxed()
}

async fn invite(data: Arc<Data>, event: InteractionEvent) -> Result<HandlerOutcome> {
    let guild_id = guild_of(&event)?.to_string();
    data.session
        .respond(&event.handle, InteractionReply::Defer { ephemeral: true })
        .await?;

    let config = match data.guild_configs.get(&guild_id).await {
        Ok(config) => config,
        Err(e) => return report_after_ack(&data, &event.handle, e.into_bot_error(&guild_id)).await,
    };

    let code = match data
        .session
        .create_channel_invite(&config.signup_channel_id, INVITE_MAX_AGE_SECS)
        .await
    {
        Ok(code) => code,
        Err(e) => {
            warn!(guild_id = %guild_id, error = %e, "Invite creation failed");
            return report_after_ack(&data, &event.handle, e.into()).await;
        }
    };

    let mut content = format!("🔗 Invite for the next 24 hours: https://discord.gg/{}", code);
    if let Some(pwa) = &data.config.pwa_base_url {
        content.push_str(&format!("\n📱 League app: {}/guild/{}", pwa, guild_id));
    }
    data.session
        .edit_response(&event.handle, OutgoingMessage::ephemeral(content))
        .await?;
    Ok(HandlerOutcome::Success)
}

#[cfg(test)]
mod tests {
    use crate::discord::fake::SessionCall;
    use crate::discord::DiscordError;
    use crate::testing::{slash_event, TestHarness, SIGNUP_CHANNEL};

    #[tokio::test]
    async fn test_invite_links_signup_channel_and_app() {
        let harness = TestHarness::with_complete_guild("G1");
        harness.dispatch(slash_event("G1", "U1", "invite")).await;

        assert!(harness.session.calls().contains(&SessionCall::CreateChannelInvite {
            channel_id: SIGNUP_CHANNEL.into()
        }));
        let reply = harness.session.contents().pop().unwrap();
        assert!(reply.contains(&format!("https://discord.gg/inv{}", SIGNUP_CHANNEL)));
        assert!(reply.contains("https://frolf.example/guild/G1"));
    }

    #[tokio::test]
    async fn test_invite_failure_is_reported() {
        let harness = TestHarness::with_complete_guild("G1");
        harness.session.fail_next(
            "create_channel_invite",
            DiscordError::Status {
                status: 403,
                message: "Missing Permissions".into(),
            },
        );
        harness.dispatch(slash_event("G1", "U1", "invite")).await;

        let reply = harness.session.contents().pop().unwrap();
        assert!(reply.contains("Something went wrong"));
    }

    #[tokio::test]
    async fn test_invite_needs_setup() {
        let harness = TestHarness::new();
        harness.data.guild_configs.on_config_received("G1", Default::default());
        harness.dispatch(slash_event("G1", "U1", "invite")).await;

        assert!(harness.session.contents()[0].contains("Guild not set up"));
    }
}
