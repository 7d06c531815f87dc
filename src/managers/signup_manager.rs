//! Signup flow: reaction on the signup message, DM button, tag modal.
//!
//! The reaction opens a DM whose button custom-id carries the originating
//! guild, because interactions inside a DM have no guild context. The button
//! opens a modal and the modal submit publishes `user.signup.request`; the
//! reply router later edits the modal's ephemeral with the backend's answer.

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{finish_publish, publish_correlated, publish_uncorrelated, reject};
use crate::bus::{topics, EventOrigin};
use crate::config::GuildConfig;
use crate::discord::{
    ButtonSpec, ButtonStyle, DiscordError, DiscordResult, InteractionEvent, InteractionReply, ModalSpec,
    OutgoingMessage, TextField,
};
use crate::emoji::emoji_matches;
use crate::error::{BotError, HandlerOutcome, Result};
use crate::registry::{custom_id, Registration, RegistryBuilder};
use crate::Data;

pub const BUTTON_PREFIX: &str = "signup_button";
pub const MODAL_PREFIX: &str = "signup_modal";
pub const TAG_FIELD: &str = "tag_number";

/// Emoji on a reaction, independent of the gateway library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReactionEmoji {
    Unicode(String),
    Custom { id: String, name: Option<String> },
}

impl ReactionEmoji {
    /// Compare against the configured emoji, which may be a unicode glyph, a
    /// custom emoji name or ID, or the `<:name:id>` mention form.
    pub fn matches(&self, configured: &str) -> bool {
        let configured = configured.trim();
        match self {
            ReactionEmoji::Unicode(glyph) => emoji_matches(glyph, configured),
            ReactionEmoji::Custom { id, name } => {
                if configured == id {
                    return true;
                }
                let name = name.as_deref().unwrap_or_default();
                if !name.is_empty() && configured == name {
                    return true;
                }
                configured
                    .trim_start_matches("<a:")
                    .trim_start_matches("<:")
                    .trim_end_matches('>')
                    .rsplit(':')
                    .next()
                    .map_or(false, |tail| tail == id)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReactionEvent {
    pub guild_id: Option<String>,
    pub channel_id: String,
    pub message_id: String,
    pub user_id: String,
    pub emoji: ReactionEmoji,
}

#[derive(Debug, Serialize)]
struct ProfileSyncRequest<'a> {
    guild_id: &'a str,
    user_id: &'a str,
}

#[derive(Debug, Serialize)]
struct SignupRequest<'a> {
    guild_id: &'a str,
    user_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    tag_number: Option<i64>,
}

pub fn register(builder: &mut RegistryBuilder) {
    builder
        .register(Registration::component(BUTTON_PREFIX, handle_signup_button).dm_bypass())
        .register(Registration::modal(MODAL_PREFIX, handle_signup_modal).dm_bypass());
}

fn is_signup_target(config: &GuildConfig, reaction: &ReactionEvent) -> bool {
    if reaction.channel_id != config.signup_channel_id {
        return false;
    }
    if !config.signup_message_id.is_empty() && reaction.message_id != config.signup_message_id {
        return false;
    }
    reaction.emoji.matches(&config.signup_emoji)
}

/// React to a reaction on the signup message. Returns `true` when a signup
/// DM went out.
pub async fn handle_reaction(data: &Data, reaction: ReactionEvent) -> Result<bool> {
    let guild_id = match reaction.guild_id.as_deref().filter(|g| !g.is_empty()) {
        Some(guild_id) => guild_id.to_string(),
        None => return Ok(false),
    };
    if data.bot_user_id.get().map(String::as_str) == Some(reaction.user_id.as_str()) {
        return Ok(false);
    }

    let config = match data.guild_configs.get(&guild_id).await {
        Ok(config) => config,
        Err(e) => {
            debug!(guild_id = %guild_id, error = %e, "Ignoring reaction without guild config");
            return Ok(false);
        }
    };
    if !config.is_setup_complete() || !is_signup_target(&config, &reaction) {
        return Ok(false);
    }

    info!(guild_id = %guild_id, user_id = %reaction.user_id, "Signup reaction received");

    let button_id = custom_id::build(
        BUTTON_PREFIX,
        &[&reaction.user_id, &format!("guild_id={}", guild_id)],
    );
    let message = OutgoingMessage::public("👋 Ready to join the league? Press the button to sign up.")
        .with_button(ButtonSpec::new(button_id, "Sign Up", ButtonStyle::Success));

    match send_dm(data, &reaction.user_id, message).await {
        Ok(_) => {}
        Err(DiscordError::Status { status: 403, .. }) => {
            warn!(user_id = %reaction.user_id, "User does not accept DMs, skipping signup prompt");
            return Ok(false);
        }
        Err(e) => return Err(e.into()),
    }

    let sync = ProfileSyncRequest {
        guild_id: &guild_id,
        user_id: &reaction.user_id,
    };
    if let Err(e) = publish_uncorrelated(
        data,
        topics::USER_PROFILE_SYNC_REQUEST,
        &EventOrigin::user(guild_id.as_str(), reaction.user_id.as_str()),
        &sync,
    )
    .await
    {
        warn!(guild_id = %guild_id, user_id = %reaction.user_id, error = %e, "Profile sync request failed");
    }
    Ok(true)
}

async fn send_dm(data: &Data, user_id: &str, message: OutgoingMessage) -> DiscordResult<String> {
    let dm_channel = data.session.create_dm_channel(user_id).await?;
    data.session.send_message(&dm_channel, message).await
}

fn handle_signup_button(data: Arc<Data>, event: InteractionEvent) -> BoxFuture<'static, Result<HandlerOutcome>> {
    signup_button(data, event).boxed()
}

async fn signup_button(data: Arc<Data>, event: InteractionEvent) -> Result<HandlerOutcome> {
    let guild_id = custom_id::param(&event.key, "guild_id")
        .or_else(|| event.guild_id())
        .map(str::to_string);
    let guild_id = match guild_id {
        Some(guild_id) => guild_id,
        None => {
            return reject(
                &data,
                &event.handle,
                BotError::internal("signup button without a guild"),
            )
            .await
        }
    };
    if let Some(owner) = custom_id::positional(&event.key, 0) {
        if owner != event.user_id() {
            data.session
                .respond(
                    &event.handle,
                    InteractionReply::Message(OutgoingMessage::ephemeral(
                        "❌ This signup button belongs to someone else. React on the signup message to get your own.",
                    )),
                )
                .await?;
            return Ok(HandlerOutcome::Failure("signup button pressed by another user".into()));
        }
    }

    let cid = Uuid::new_v4().to_string();
    data.correlations.set(&cid, event.handle.clone(), None)?;

    let modal = ModalSpec {
        custom_id: custom_id::build(
            MODAL_PREFIX,
            &[&format!("guild_id={}", guild_id), &format!("cid={}", cid)],
        ),
        title: "Frolf Signup".to_string(),
        fields: vec![TextField::short(TAG_FIELD, "Tag number (optional)", false).placeholder("13")],
    };
    if let Err(e) = data
        .session
        .respond(&event.handle, InteractionReply::Modal(modal))
        .await
    {
        data.correlations.delete(&cid);
        return Err(e.into());
    }
    Ok(HandlerOutcome::Success)
}

fn parse_tag(raw: Option<&str>) -> Result<Option<i64>> {
    match raw {
        None => Ok(None),
        Some(raw) => raw
            .parse::<i64>()
            .ok()
            .filter(|n| *n > 0)
            .map(Some)
            .ok_or_else(|| BotError::invalid_input("Tag number must be a positive whole number", "13")),
    }
}

fn handle_signup_modal(data: Arc<Data>, event: InteractionEvent) -> BoxFuture<'static, Result<HandlerOutcome>> {
    signup_modal(data, event).boxed()
}

async fn signup_modal(data: Arc<Data>, event: InteractionEvent) -> Result<HandlerOutcome> {
    let guild_id = custom_id::param(&event.key, "guild_id")
        .or_else(|| event.guild_id())
        .map(str::to_string);
    let guild_id = match guild_id {
        Some(guild_id) => guild_id,
        None => return reject(&data, &event.handle, BotError::internal("signup modal without a guild")).await,
    };
    let tag_number = match parse_tag(event.field(TAG_FIELD)) {
        Ok(tag) => tag,
        Err(e) => return reject(&data, &event.handle, e).await,
    };

    data.session
        .respond(
            &event.handle,
            InteractionReply::Message(OutgoingMessage::ephemeral("⏳ Processing your signup…")),
        )
        .await?;

    // The button parked its own handle under this ID; the modal's handle
    // takes over so the reply edits the processing message.
    let cid = custom_id::param(&event.key, "cid").map(str::to_string);
    if let Some(cid) = &cid {
        data.correlations.delete(cid);
    }

    let payload = SignupRequest {
        guild_id: &guild_id,
        user_id: event.user_id(),
        tag_number,
    };
    let published = publish_correlated(
        &data,
        &event.handle,
        topics::USER_SIGNUP_REQUEST,
        &EventOrigin::from_interaction(&event.handle, &guild_id),
        &payload,
        cid,
    )
    .await;
    finish_publish(&data, &event.handle, published).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discord::fake::SessionCall;
    use crate::testing::{component_event, dm_component_event, dm_modal_event, TestHarness, SIGNUP_CHANNEL, SIGNUP_EMOJI, SIGNUP_MESSAGE};

    fn reaction(user: &str, emoji: ReactionEmoji) -> ReactionEvent {
        ReactionEvent {
            guild_id: Some("G1".into()),
            channel_id: SIGNUP_CHANNEL.into(),
            message_id: SIGNUP_MESSAGE.into(),
            user_id: user.into(),
            emoji,
        }
    }

    #[test]
    fn test_custom_emoji_matching() {
        let custom = ReactionEmoji::Custom {
            id: "555".into(),
            name: Some("frolf".into()),
        };
        assert!(custom.matches("frolf"));
        assert!(custom.matches("555"));
        assert!(custom.matches("<:frolf:555>"));
        assert!(!custom.matches("<:frolf:556>"));
        assert!(!custom.matches("🥏"));
    }

    #[test]
    fn test_parse_tag() {
        assert_eq!(parse_tag(None).unwrap(), None);
        assert_eq!(parse_tag(Some("13")).unwrap(), Some(13));
        assert!(parse_tag(Some("abc")).is_err());
        assert!(parse_tag(Some("0")).is_err());
    }

    #[tokio::test]
    async fn test_reaction_sends_dm_with_guild_in_button() {
        let harness = TestHarness::with_complete_guild("G1");
        let sent = handle_reaction(&harness.data, reaction("U1", ReactionEmoji::Unicode(SIGNUP_EMOJI.into())))
            .await
            .unwrap();
        assert!(sent);

        let calls = harness.session.calls();
        assert!(calls.contains(&SessionCall::CreateDmChannel { user_id: "U1".into() }));
        let button = calls
            .iter()
            .find_map(|c| match c {
                SessionCall::SendMessage { channel_id, message } if channel_id == "dm-U1" => {
                    message.buttons.first().cloned()
                }
                _ => None,
            })
            .unwrap();
        assert_eq!(button.custom_id, "signup_button|U1|guild_id=G1");
        assert_eq!(harness.bus.published_on(topics::USER_PROFILE_SYNC_REQUEST).len(), 1);
    }

    #[tokio::test]
    async fn test_variation_selector_emoji_still_matches() {
        let harness = TestHarness::with_complete_guild("G1");
        let glyph = format!("{}\u{FE0F}", SIGNUP_EMOJI);
        let sent = handle_reaction(&harness.data, reaction("U1", ReactionEmoji::Unicode(glyph)))
            .await
            .unwrap();
        assert!(sent);
    }

    #[tokio::test]
    async fn test_reaction_elsewhere_is_ignored() {
        let harness = TestHarness::with_complete_guild("G1");
        let mut wrong_channel = reaction("U1", ReactionEmoji::Unicode(SIGNUP_EMOJI.into()));
        wrong_channel.channel_id = "other".into();
        assert!(!handle_reaction(&harness.data, wrong_channel).await.unwrap());

        let wrong_emoji = reaction("U1", ReactionEmoji::Unicode("👍".into()));
        assert!(!handle_reaction(&harness.data, wrong_emoji).await.unwrap());
        assert!(harness.session.calls().is_empty());
    }

    #[tokio::test]
    async fn test_bot_reaction_is_ignored() {
        let harness = TestHarness::with_complete_guild("G1");
        let _ = harness.data.bot_user_id.set("BOT".into());
        let sent = handle_reaction(&harness.data, reaction("BOT", ReactionEmoji::Unicode(SIGNUP_EMOJI.into())))
            .await
            .unwrap();
        assert!(!sent);
    }

    #[tokio::test]
    async fn test_closed_dms_are_not_an_error() {
        let harness = TestHarness::with_complete_guild("G1");
        harness.session.fail_next(
            "send_message",
            DiscordError::Status {
                status: 403,
                message: "Cannot send messages to this user".into(),
            },
        );
        let sent = handle_reaction(&harness.data, reaction("U1", ReactionEmoji::Unicode(SIGNUP_EMOJI.into())))
            .await
            .unwrap();
        assert!(!sent);
        assert!(harness.bus.published().is_empty());
    }

    #[tokio::test]
    async fn test_button_in_dm_opens_modal_with_guild() {
        let harness = TestHarness::new();
        harness.dispatch(dm_component_event("U1", "signup_button|U1|guild_id=G1")).await;

        let modal = harness
            .session
            .calls()
            .into_iter()
            .find_map(|c| match c {
                SessionCall::Respond {
                    reply: InteractionReply::Modal(m),
                    ..
                } => Some(m),
                _ => None,
            })
            .unwrap();
        assert!(modal.custom_id.starts_with("signup_modal|guild_id=G1|cid="));
        let cid = custom_id::param(&modal.custom_id, "cid").unwrap();
        assert!(harness.data.correlations.get(cid).is_some());
    }

    #[tokio::test]
    async fn test_button_pressed_by_someone_else() {
        let harness = TestHarness::new();
        harness
            .dispatch(component_event("G1", "U2", "signup_button|U1|guild_id=G1"))
            .await;
        assert!(harness.session.contents()[0].contains("belongs to someone else"));
        assert!(harness.data.correlations.is_empty());
    }

    #[tokio::test]
    async fn test_modal_publishes_signup_under_button_correlation() {
        let harness = TestHarness::new();
        harness
            .data
            .correlations
            .set("cid-1", dm_component_event("U1", "signup_button|U1|guild_id=G1").handle, None)
            .unwrap();

        let modal = dm_modal_event("U1", "signup_modal|guild_id=G1|cid=cid-1", &[(TAG_FIELD, "13")]);
        let modal_interaction = modal.handle.interaction_id.clone();
        harness.dispatch(modal).await;

        let published = harness.bus.published_on(topics::USER_SIGNUP_REQUEST);
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].correlation_id(), Some("cid-1"));
        let payload: serde_json::Value = published[0].parse().unwrap();
        assert_eq!(payload["guild_id"], "G1");
        assert_eq!(payload["tag_number"], 13);

        let parked = harness.data.correlations.get("cid-1").unwrap();
        assert_eq!(parked.interaction_id, modal_interaction);
        assert!(harness.session.contents()[0].contains("Processing"));
    }

    #[tokio::test]
    async fn test_modal_without_tag_omits_it() {
        let harness = TestHarness::new();
        harness
            .dispatch(dm_modal_event("U1", "signup_modal|guild_id=G1", &[(TAG_FIELD, "  ")]))
            .await;

        let published = harness.bus.published_on(topics::USER_SIGNUP_REQUEST);
        let payload: serde_json::Value = published[0].parse().unwrap();
        assert!(payload.get("tag_number").is_none());
    }

    #[tokio::test]
    async fn test_malformed_tag_is_rejected_with_example() {
        let harness = TestHarness::new();
        harness
            .dispatch(dm_modal_event("U1", "signup_modal|guild_id=G1", &[(TAG_FIELD, "twelve")]))
            .await;

        assert!(harness.bus.published().is_empty());
        let contents = harness.session.contents();
        assert!(contents[0].contains("`13`"));
    }
}
