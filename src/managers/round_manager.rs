//! Round creation and score entry.

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use std::sync::Arc;

use super::{finish_publish, guild_of, publish_correlated, reject};
use crate::bus::{topics, EventOrigin};
use crate::discord::{InteractionEvent, InteractionReply, ModalSpec, OutgoingMessage, TextField};
use crate::error::{BotError, HandlerOutcome, Result};
use crate::registry::{custom_id, PermissionLevel, Registration, RegistryBuilder};
use crate::Data;

pub const CREATE_MODAL_ID: &str = "create_round_modal";
pub const ENTER_SCORE_PREFIX: &str = "round_enter_score";
pub const SCORE_MODAL_PREFIX: &str = "submit_score_modal";

#[derive(Debug, Serialize)]
struct RoundCreation<'a> {
    guild_id: &'a str,
    user_id: &'a str,
    channel_id: &'a str,
    title: &'a str,
    start_time: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct ScoreUpdate<'a> {
    guild_id: &'a str,
    round_id: &'a str,
    user_id: &'a str,
    score: i64,
}

pub fn register(builder: &mut RegistryBuilder) {
    builder
        .register(
            Registration::command("createround", handle_create_round)
                .permission(PermissionLevel::Player)
                .requires_setup(),
        )
        .register(
            Registration::modal(CREATE_MODAL_ID, handle_create_round_modal)
                .permission(PermissionLevel::Player)
                .requires_setup(),
        )
        .register(
            Registration::component(ENTER_SCORE_PREFIX, handle_enter_score)
                .permission(PermissionLevel::Player)
                .requires_setup(),
        )
        .register(
            Registration::modal(SCORE_MODAL_PREFIX, handle_score_modal)
                .permission(PermissionLevel::Player)
                .requires_setup(),
        );
}

fn handle_create_round(data: Arc<Data>, event: InteractionEvent) -> BoxFuture<'static, Result<HandlerOutcome>> {
    create_round(data, event).boxed()
}

async fn create_round(data: Arc<Data>, event: InteractionEvent) -> Result<HandlerOutcome> {
    let modal = ModalSpec {
        custom_id: CREATE_MODAL_ID.to_string(),
        title: "Create Round".to_string(),
        fields: vec![
            TextField::short("title", "Title", true).placeholder("Sunday Doubles"),
            TextField::short("start_time", "Start time", true).placeholder("tomorrow 6pm"),
            TextField::short("location", "Course", false),
            TextField::paragraph("description", "Description", false),
        ],
    };
    data.session
        .respond(&event.handle, InteractionReply::Modal(modal))
        .await?;
    Ok(HandlerOutcome::Success)
}

fn handle_create_round_modal(data: Arc<Data>, event: InteractionEvent) -> BoxFuture<'static, Result<HandlerOutcome>> {
    create_round_modal(data, event).boxed()
}

async fn create_round_modal(data: Arc<Data>, event: InteractionEvent) -> Result<HandlerOutcome> {
    let guild_id = guild_of(&event)?.to_string();
    let (title, start_time) = match (event.field("title"), event.field("start_time")) {
        (Some(title), Some(start_time)) => (title.to_string(), start_time.to_string()),
        _ => {
            return reject(
                &data,
                &event.handle,
                BotError::invalid_input("A round needs a title and a start time", "tomorrow 6pm"),
            )
            .await
        }
    };

    data.session
        .respond(
            &event.handle,
            InteractionReply::Message(OutgoingMessage::ephemeral("⏳ Creating round…")),
        )
        .await?;

    let payload = RoundCreation {
        guild_id: &guild_id,
        user_id: event.user_id(),
        channel_id: &event.handle.channel_id,
        title: &title,
        start_time: &start_time,
        location: event.field("location"),
        description: event.field("description"),
    };
    let published = publish_correlated(
        &data,
        &event.handle,
        topics::ROUND_CREATION_REQUESTED,
        &EventOrigin::from_interaction(&event.handle, &guild_id),
        &payload,
        None,
    )
    .await;
    finish_publish(&data, &event.handle, published).await
}

fn round_id_of(event: &InteractionEvent) -> Option<String> {
    custom_id::positional(&event.key, 0).map(str::to_string)
}

fn handle_enter_score(data: Arc<Data>, event: InteractionEvent) -> BoxFuture<'static, Result<HandlerOutcome>> {
    enter_score(data, event).boxed()
}

async fn enter_score(data: Arc<Data>, event: InteractionEvent) -> Result<HandlerOutcome> {
    let round_id = match round_id_of(&event) {
        Some(round_id) => round_id,
        None => return reject(&data, &event.handle, BotError::internal("score button without a round")).await,
    };
    let modal = ModalSpec {
        custom_id: custom_id::build(SCORE_MODAL_PREFIX, &[&round_id]),
        title: "Submit Score".to_string(),
        fields: vec![TextField::short("score", "Score relative to par", true).placeholder("-3")],
    };
    data.session
        .respond(&event.handle, InteractionReply::Modal(modal))
        .await?;
    Ok(HandlerOutcome::Success)
}

fn parse_score(raw: Option<&str>) -> Result<i64> {
    raw.map(|r| r.trim_start_matches('+'))
        .and_then(|r| r.parse::<i64>().ok())
        .ok_or_else(|| BotError::invalid_input("Score must be a whole number relative to par", "-3"))
}

fn handle_score_modal(data: Arc<Data>, event: InteractionEvent) -> BoxFuture<'static, Result<HandlerOutcome>> {
    score_modal(data, event).boxed()
}

async fn score_modal(data: Arc<Data>, event: InteractionEvent) -> Result<HandlerOutcome> {
    let guild_id = guild_of(&event)?.to_string();
    let round_id = match round_id_of(&event) {
        Some(round_id) => round_id,
        None => return reject(&data, &event.handle, BotError::internal("score modal without a round")).await,
    };
    let score = match parse_score(event.field("score")) {
        Ok(score) => score,
        Err(e) => return reject(&data, &event.handle, e).await,
    };

    data.session
        .respond(
            &event.handle,
            InteractionReply::Message(OutgoingMessage::ephemeral("⏳ Submitting score…")),
        )
        .await?;

    let payload = ScoreUpdate {
        guild_id: &guild_id,
        round_id: &round_id,
        user_id: event.user_id(),
        score,
    };
    let published = publish_correlated(
        &data,
        &event.handle,
        topics::SCORE_UPDATE_REQUEST,
        &EventOrigin::from_interaction(&event.handle, &guild_id),
        &payload,
        None,
    )
    .await;
    finish_publish(&data, &event.handle, published).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discord::fake::SessionCall;
    use crate::testing::{component_event, modal_event, slash_event, TestHarness, PLAYER_ROLE};

    fn as_player(mut event: InteractionEvent) -> InteractionEvent {
        event.member_roles = vec![PLAYER_ROLE.to_string()];
        event
    }

    fn opened_modal(harness: &TestHarness) -> ModalSpec {
        harness
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
            .unwrap()
    }

    #[test]
    fn test_parse_score() {
        assert_eq!(parse_score(Some("-3")).unwrap(), -3);
        assert_eq!(parse_score(Some("+2")).unwrap(), 2);
        assert_eq!(parse_score(Some("0")).unwrap(), 0);
        assert!(parse_score(Some("par")).is_err());
        assert!(parse_score(None).is_err());
    }

    #[tokio::test]
    async fn test_createround_opens_modal() {
        let harness = TestHarness::with_complete_guild("G1");
        harness.dispatch(as_player(slash_event("G1", "U1", "createround"))).await;
        assert_eq!(opened_modal(&harness).custom_id, CREATE_MODAL_ID);
    }

    #[tokio::test]
    async fn test_create_round_modal_publishes() {
        let harness = TestHarness::with_complete_guild("G1");
        let event = modal_event(
            "G1",
            "U1",
            CREATE_MODAL_ID,
            &[("title", "Sunday Doubles"), ("start_time", "tomorrow 6pm"), ("location", "")],
        );
        harness.dispatch(as_player(event)).await;

        let published = harness.bus.published_on(topics::ROUND_CREATION_REQUESTED);
        assert_eq!(published.len(), 1);
        let payload: serde_json::Value = published[0].parse().unwrap();
        assert_eq!(payload["title"], "Sunday Doubles");
        assert!(payload.get("location").is_none());
        assert!(harness.session.contents()[0].contains("Creating round"));
    }

    #[tokio::test]
    async fn test_score_button_carries_round_into_modal() {
        let harness = TestHarness::with_complete_guild("G1");
        harness
            .dispatch(as_player(component_event("G1", "U1", "round_enter_score|R42")))
            .await;
        assert_eq!(opened_modal(&harness).custom_id, "submit_score_modal|R42");
    }

    #[tokio::test]
    async fn test_score_modal_publishes_score() {
        let harness = TestHarness::with_complete_guild("G1");
        let event = modal_event("G1", "U1", "submit_score_modal|R42", &[("score", "-3")]);
        harness.dispatch(as_player(event)).await;

        let published = harness.bus.published_on(topics::SCORE_UPDATE_REQUEST);
        assert_eq!(published.len(), 1);
        let payload: serde_json::Value = published[0].parse().unwrap();
        assert_eq!(payload["round_id"], "R42");
        assert_eq!(payload["score"], -3);
    }

    #[tokio::test]
    async fn test_malformed_score_is_rejected() {
        let harness = TestHarness::with_complete_guild("G1");
        let event = modal_event("G1", "U1", "submit_score_modal|R42", &[("score", "three under")]);
        harness.dispatch(as_player(event)).await;

        assert!(harness.bus.published().is_empty());
        assert!(harness.session.contents()[0].contains("`-3`"));
    }
}
