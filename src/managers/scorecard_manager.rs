//! Scorecard import, either from a UDisc URL or from a file posted in the
//! channel after the modal.

use base64::Engine;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::{finish_publish, guild_of, publish_correlated, publish_uncorrelated, reject};
use crate::bus::{topics, EventOrigin};
use crate::discord::{InteractionEvent, InteractionReply, ModalSpec, OutgoingMessage, TextField};
use crate::error::{BotError, HandlerOutcome, Result};
use crate::registry::{custom_id, PermissionLevel, Registration, RegistryBuilder};
use crate::state::PendingUpload;
use crate::Data;

pub const UPLOAD_BUTTON_PREFIX: &str = "round_upload_scorecard";
pub const UPLOAD_MODAL_PREFIX: &str = "scorecard_upload_modal";

pub const MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;
/// Larger files travel by URL only.
pub const INLINE_LIMIT_BYTES: usize = 256 * 1024;
const ACCEPTED_EXTENSIONS: &[&str] = &[".csv", ".xlsx"];

const MSG_NO_PENDING: &str =
    "❌ No pending scorecard upload found. Press **Upload Scorecard** on the round first.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub url: String,
    pub size: u64,
}

/// A channel message as far as the upload flow cares.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub channel_id: String,
    pub author_id: String,
    pub author_is_bot: bool,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Ignored,
    NoPending,
    Rejected(String),
    Published { correlation_id: String },
}

#[derive(Debug, Serialize)]
struct ScorecardUrlRequest<'a> {
    guild_id: &'a str,
    round_id: &'a str,
    user_id: &'a str,
    channel_id: &'a str,
    udisc_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct ScorecardUploaded<'a> {
    guild_id: &'a str,
    round_id: &'a str,
    user_id: &'a str,
    channel_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_id: Option<&'a str>,
    file_name: &'a str,
    file_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<&'a str>,
}

pub fn register(builder: &mut RegistryBuilder) {
    builder
        .register(
            Registration::component(UPLOAD_BUTTON_PREFIX, handle_upload_button)
                .permission(PermissionLevel::Player)
                .requires_setup(),
        )
        .register(
            Registration::modal(UPLOAD_MODAL_PREFIX, handle_upload_modal)
                .permission(PermissionLevel::Player)
                .requires_setup(),
        );
}

fn handle_upload_button(data: Arc<Data>, event: InteractionEvent) -> BoxFuture<'static, Result<HandlerOutcome>> {
    upload_button(data, event).boxed()
}

async fn upload_button(data: Arc<Data>, event: InteractionEvent) -> Result<HandlerOutcome> {
    let round_id = match custom_id::positional(&event.key, 0) {
        Some(round_id) => round_id.to_string(),
        None => return reject(&data, &event.handle, BotError::internal("upload button without a round")).await,
    };
    let modal = ModalSpec {
        custom_id: custom_id::build(UPLOAD_MODAL_PREFIX, &[&round_id]),
        title: "Upload Scorecard".to_string(),
        fields: vec![
            TextField::short("udisc_url", "UDisc scorecard URL (leave empty to upload a file)", false)
                .placeholder("https://udisc.com/scorecards/..."),
            TextField::paragraph("notes", "Notes", false),
        ],
    };
    data.session
        .respond(&event.handle, InteractionReply::Modal(modal))
        .await?;
    Ok(HandlerOutcome::Success)
}

fn validate_url(raw: &str) -> Result<()> {
    let lower = raw.to_ascii_lowercase();
    let rest = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"));
    match rest {
        Some(host) if !host.is_empty() && !host.starts_with('/') => Ok(()),
        _ => Err(BotError::invalid_input(
            "That doesn't look like a scorecard link",
            "https://udisc.com/scorecards/abc123",
        )),
    }
}

fn handle_upload_modal(data: Arc<Data>, event: InteractionEvent) -> BoxFuture<'static, Result<HandlerOutcome>> {
    upload_modal(data, event).boxed()
}

async fn upload_modal(data: Arc<Data>, event: InteractionEvent) -> Result<HandlerOutcome> {
    let guild_id = guild_of(&event)?.to_string();
    let round_id = match custom_id::positional(&event.key, 0) {
        Some(round_id) => round_id.to_string(),
        None => return reject(&data, &event.handle, BotError::internal("upload modal without a round")).await,
    };
    let notes = event.field("notes");

    let url = match event.field("udisc_url") {
        Some(url) => url.to_string(),
        None => {
            data.pending_uploads.remember(
                event.user_id(),
                &event.handle.channel_id,
                PendingUpload {
                    round_id,
                    guild_id,
                    notes: notes.map(str::to_string),
                    source_message_id: event.handle.message_id.clone(),
                    created_at: Instant::now(),
                },
            );
            data.session
                .respond(
                    &event.handle,
                    InteractionReply::Message(OutgoingMessage::ephemeral(
                        "📎 Upload your scorecard file (.csv or .xlsx) in this channel within 5 minutes.",
                    )),
                )
                .await?;
            return Ok(HandlerOutcome::Success);
        }
    };
    if let Err(e) = validate_url(&url) {
        return reject(&data, &event.handle, e).await;
    }

    data.session
        .respond(
            &event.handle,
            InteractionReply::Message(OutgoingMessage::ephemeral("⏳ Importing scorecard…")),
        )
        .await?;

    let payload = ScorecardUrlRequest {
        guild_id: &guild_id,
        round_id: &round_id,
        user_id: event.user_id(),
        channel_id: &event.handle.channel_id,
        udisc_url: &url,
        notes,
    };
    let published = publish_correlated(
        &data,
        &event.handle,
        topics::SCORECARD_URL_REQUESTED,
        &EventOrigin::from_interaction(&event.handle, &guild_id),
        &payload,
        None,
    )
    .await;
    finish_publish(&data, &event.handle, published).await
}

fn scorecard_attachment(message: &IncomingMessage) -> Option<&Attachment> {
    message.attachments.iter().find(|a| {
        let name = a.filename.to_ascii_lowercase();
        ACCEPTED_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
    })
}

async fn notify(data: &Data, channel_id: &str, content: String) {
    if let Err(e) = data
        .session
        .send_message(channel_id, OutgoingMessage::public(content))
        .await
    {
        warn!(channel_id, error = %e, "Could not post scorecard notice");
    }
}

/// Turn a file posted after the scorecard modal into a `scorecard.uploaded`
/// event. The pending entry survives a failed download or publish so the
/// user can retry.
pub async fn handle_attachment_message(data: &Data, message: IncomingMessage) -> Result<UploadOutcome> {
    if message.author_is_bot {
        return Ok(UploadOutcome::Ignored);
    }
    let attachment = match scorecard_attachment(&message) {
        Some(attachment) => attachment.clone(),
        None => return Ok(UploadOutcome::Ignored),
    };

    let pending = match data.pending_uploads.peek(&message.author_id, &message.channel_id) {
        Some(pending) => pending,
        None => {
            notify(data, &message.channel_id, format!("<@{}> {}", message.author_id, MSG_NO_PENDING)).await;
            return Ok(UploadOutcome::NoPending);
        }
    };

    if attachment.size > MAX_FILE_BYTES {
        let err = BotError::Attachment {
            message: format!("`{}` is larger than 10 MiB", attachment.filename),
        };
        notify(data, &message.channel_id, err.user_message()).await;
        return Ok(UploadOutcome::Rejected(err.to_string()));
    }

    let body = match data
        .session
        .download_attachment(&attachment.url, MAX_FILE_BYTES)
        .await
    {
        Ok(body) => body,
        Err(e) => {
            warn!(user_id = %message.author_id, file = %attachment.filename, error = %e, "Scorecard download failed");
            notify(
                data,
                &message.channel_id,
                "❌ Couldn't download that file. Please try uploading it again.".to_string(),
            )
            .await;
            return Ok(UploadOutcome::Rejected(e.to_string()));
        }
    };

    // Another message from the same user may have claimed the entry while
    // this one was downloading.
    let pending = match data
        .pending_uploads
        .consume(&message.author_id, &message.channel_id)
    {
        Some(pending) => pending,
        None => {
            debug!(user_id = %message.author_id, file = %attachment.filename, "Pending upload already claimed");
            return Ok(UploadOutcome::NoPending);
        }
    };

    let file_data = (body.len() <= INLINE_LIMIT_BYTES)
        .then(|| base64::engine::general_purpose::STANDARD.encode(&body));
    let payload = ScorecardUploaded {
        guild_id: &pending.guild_id,
        round_id: &pending.round_id,
        user_id: &message.author_id,
        channel_id: &message.channel_id,
        message_id: pending.source_message_id.as_deref(),
        file_name: &attachment.filename,
        file_url: &attachment.url,
        file_data,
        notes: pending.notes.as_deref(),
    };
    let origin = EventOrigin::user(pending.guild_id.as_str(), message.author_id.as_str())
        .in_channel(message.channel_id.as_str())
        .with_message(pending.source_message_id.clone());

    let correlation_id = match publish_uncorrelated(data, topics::SCORECARD_UPLOADED, &origin, &payload).await {
        Ok(correlation_id) => correlation_id,
        Err(e) => {
            warn!(user_id = %message.author_id, round_id = %pending.round_id, error = %e, "Scorecard upload not forwarded");
            notify(data, &message.channel_id, e.user_message()).await;
            let reason = e.to_string();
            data.pending_uploads
                .remember(&message.author_id, &message.channel_id, pending);
            return Ok(UploadOutcome::Rejected(reason));
        }
    };
    info!(
        correlation_id = %correlation_id,
        round_id = %pending.round_id,
        bytes = body.len(),
        "Scorecard file forwarded"
    );
    notify(data, &message.channel_id, "📥 Scorecard received, processing…".to_string()).await;
    Ok(UploadOutcome::Published { correlation_id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discord::fake::SessionCall;
    use crate::testing::{modal_event, TestHarness, PLAYER_ROLE};

    fn upload_message(file: &str, size: u64) -> IncomingMessage {
        IncomingMessage {
            channel_id: "C-round".into(),
            author_id: "U1".into(),
            author_is_bot: false,
            attachments: vec![Attachment {
                filename: file.into(),
                url: format!("https://cdn.example/{}", file),
                size,
            }],
        }
    }

    fn remember(harness: &TestHarness) {
        harness.data.pending_uploads.remember(
            "U1",
            "C-round",
            PendingUpload {
                round_id: "R1".into(),
                guild_id: "G1".into(),
                notes: Some("windy".into()),
                source_message_id: Some("M-round".into()),
                created_at: Instant::now(),
            },
        );
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://udisc.com/scorecards/x").is_ok());
        assert!(validate_url("HTTP://udisc.com").is_ok());
        assert!(validate_url("udisc.com/scorecards/x").is_err());
        assert!(validate_url("https://").is_err());
    }

    #[tokio::test]
    async fn test_modal_with_url_publishes_request() {
        let harness = TestHarness::with_complete_guild("G1");
        let mut event = modal_event(
            "G1",
            "U1",
            "scorecard_upload_modal|R1",
            &[("udisc_url", "https://udisc.com/scorecards/abc"), ("notes", "")],
        );
        event.member_roles = vec![PLAYER_ROLE.to_string()];
        harness.dispatch(event).await;

        let published = harness.bus.published_on(topics::SCORECARD_URL_REQUESTED);
        assert_eq!(published.len(), 1);
        let payload: serde_json::Value = published[0].parse().unwrap();
        assert_eq!(payload["round_id"], "R1");
        assert!(harness.data.pending_uploads.is_empty());
    }

    #[tokio::test]
    async fn test_modal_without_url_waits_for_file() {
        let harness = TestHarness::with_complete_guild("G1");
        let mut event = modal_event("G1", "U1", "scorecard_upload_modal|R1", &[("notes", "windy")]);
        event.member_roles = vec![PLAYER_ROLE.to_string()];
        let channel = event.handle.channel_id.clone();
        harness.dispatch(event).await;

        assert!(harness.bus.published().is_empty());
        let pending = harness.data.pending_uploads.peek("U1", &channel).unwrap();
        assert_eq!(pending.round_id, "R1");
        assert_eq!(pending.notes.as_deref(), Some("windy"));
        assert!(harness.session.contents()[0].contains("within 5 minutes"));
    }

    #[tokio::test]
    async fn test_upload_is_published_inline_and_consumed() {
        let harness = TestHarness::new();
        remember(&harness);
        harness
            .session
            .set_attachment("https://cdn.example/round.csv", b"name,score\nalice,-3\n");

        let outcome = handle_attachment_message(&harness.data, upload_message("round.csv", 20))
            .await
            .unwrap();
        assert!(matches!(outcome, UploadOutcome::Published { .. }));

        let published = harness.bus.published_on(topics::SCORECARD_UPLOADED);
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].meta(crate::bus::envelope::CHANNEL_ID), Some("C-round"));
        let payload: serde_json::Value = published[0].parse().unwrap();
        assert_eq!(payload["notes"], "windy");
        assert!(payload["file_data"].is_string());
        assert!(harness.data.pending_uploads.is_empty());
        assert!(harness.session.contents().last().unwrap().contains("Scorecard received"));
    }

    #[tokio::test]
    async fn test_large_file_travels_by_url_only() {
        let harness = TestHarness::new();
        remember(&harness);
        let body = vec![b'x'; INLINE_LIMIT_BYTES + 1];
        harness.session.set_attachment("https://cdn.example/round.xlsx", &body);

        handle_attachment_message(&harness.data, upload_message("round.xlsx", body.len() as u64))
            .await
            .unwrap();

        let payload: serde_json::Value = harness.bus.published_on(topics::SCORECARD_UPLOADED)[0]
            .parse()
            .unwrap();
        assert!(payload.get("file_data").is_none());
        assert_eq!(payload["file_url"], "https://cdn.example/round.xlsx");
    }

    #[tokio::test]
    async fn test_second_upload_has_no_pending_entry() {
        let harness = TestHarness::new();
        remember(&harness);
        harness.session.set_attachment("https://cdn.example/round.csv", b"a,b\n");

        handle_attachment_message(&harness.data, upload_message("round.csv", 4))
            .await
            .unwrap();
        let second = handle_attachment_message(&harness.data, upload_message("round.csv", 4))
            .await
            .unwrap();

        assert_eq!(second, UploadOutcome::NoPending);
        assert!(harness
            .session
            .contents()
            .iter()
            .any(|c| c.contains("No pending scorecard upload found")));
    }

    #[tokio::test]
    async fn test_failed_download_keeps_pending_entry() {
        let harness = TestHarness::new();
        remember(&harness);

        let outcome = handle_attachment_message(&harness.data, upload_message("round.csv", 4))
            .await
            .unwrap();

        assert!(matches!(outcome, UploadOutcome::Rejected(_)));
        assert!(harness.data.pending_uploads.peek("U1", "C-round").is_some());
        assert!(harness.bus.published().is_empty());
    }

    #[tokio::test]
    async fn test_failed_publish_keeps_pending_entry_and_tells_channel() {
        let harness = TestHarness::new();
        remember(&harness);
        harness.session.set_attachment("https://cdn.example/round.csv", b"a,b\n");
        harness.bus.fail_next_publishes(1);

        let outcome = handle_attachment_message(&harness.data, upload_message("round.csv", 4))
            .await
            .unwrap();

        assert!(matches!(outcome, UploadOutcome::Rejected(_)));
        assert!(harness.data.pending_uploads.peek("U1", "C-round").is_some());
        assert!(matches!(
            harness.session.calls().last(),
            Some(SessionCall::SendMessage { channel_id, .. }) if channel_id == "C-round"
        ));
        assert!(harness.session.contents().last().unwrap().contains("try again"));

        // The retry goes through.
        let retry = handle_attachment_message(&harness.data, upload_message("round.csv", 4))
            .await
            .unwrap();
        assert!(matches!(retry, UploadOutcome::Published { .. }));
        assert_eq!(harness.bus.published_on(topics::SCORECARD_UPLOADED).len(), 1);
    }

    #[tokio::test]
    async fn test_overlapping_uploads_publish_once() {
        let harness = TestHarness::new();
        remember(&harness);
        harness.session.set_attachment("https://cdn.example/round.csv", b"a,b\n");

        let (first, second) = tokio::join!(
            handle_attachment_message(&harness.data, upload_message("round.csv", 4)),
            handle_attachment_message(&harness.data, upload_message("round.csv", 4)),
        );
        let outcomes = [first.unwrap(), second.unwrap()];

        assert_eq!(
            outcomes
                .iter()
                .filter(|o| matches!(o, UploadOutcome::Published { .. }))
                .count(),
            1
        );
        assert!(outcomes.contains(&UploadOutcome::NoPending));
        assert_eq!(harness.bus.published_on(topics::SCORECARD_UPLOADED).len(), 1);
    }

    #[tokio::test]
    async fn test_oversized_file_is_rejected_without_download() {
        let harness = TestHarness::new();
        remember(&harness);

        let outcome = handle_attachment_message(&harness.data, upload_message("round.csv", MAX_FILE_BYTES + 1))
            .await
            .unwrap();

        assert!(matches!(outcome, UploadOutcome::Rejected(_)));
        assert!(!harness
            .session
            .calls()
            .iter()
            .any(|c| matches!(c, SessionCall::DownloadAttachment { .. })));
    }

    #[tokio::test]
    async fn test_other_messages_are_ignored() {
        let harness = TestHarness::new();
        remember(&harness);

        let mut bot = upload_message("round.csv", 4);
        bot.author_is_bot = true;
        assert_eq!(handle_attachment_message(&harness.data, bot).await.unwrap(), UploadOutcome::Ignored);

        let image = upload_message("photo.png", 4);
        assert_eq!(handle_attachment_message(&harness.data, image).await.unwrap(), UploadOutcome::Ignored);
        assert!(harness.session.calls().is_empty());
    }
}
