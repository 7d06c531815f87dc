use async_trait::async_trait;
use bytes::Bytes;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{
    ButtonSpec, ButtonStyle, CommandOptionKind, CommandSpec, DiscordError, DiscordResult,
    DiscordSession, InteractionHandle, InteractionReply, ModalSpec, OutgoingMessage,
    RegisteredCommand, TextFieldStyle,
};

/// Timeout for attachment downloads.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// [`DiscordSession`] backed by serenity's HTTP client.
pub struct SerenitySession {
    http: Arc<serenity::Http>,
    client: reqwest::Client,
}

impl SerenitySession {
    pub fn new(http: Arc<serenity::Http>) -> Self {
        Self {
            http,
            client: reqwest::Client::new(),
        }
    }
}

fn parse_id(value: &str) -> DiscordResult<u64> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|id| *id != 0)
        .ok_or_else(|| DiscordError::InvalidId {
            value: value.to_string(),
        })
}

fn button_style(style: ButtonStyle) -> serenity::ButtonStyle {
    match style {
        ButtonStyle::Primary => serenity::ButtonStyle::Primary,
        ButtonStyle::Secondary => serenity::ButtonStyle::Secondary,
        ButtonStyle::Success => serenity::ButtonStyle::Success,
        ButtonStyle::Danger => serenity::ButtonStyle::Danger,
    }
}

/// Discord allows at most five buttons per action row.
fn button_rows(buttons: &[ButtonSpec]) -> Vec<serenity::CreateActionRow> {
    buttons
        .chunks(5)
        .map(|chunk| {
            serenity::CreateActionRow::Buttons(
                chunk
                    .iter()
                    .map(|b| {
                        serenity::CreateButton::new(b.custom_id.clone())
                            .label(b.label.clone())
                            .style(button_style(b.style))
                    })
                    .collect(),
            )
        })
        .collect()
}

fn response_message(message: OutgoingMessage) -> serenity::CreateInteractionResponseMessage {
    serenity::CreateInteractionResponseMessage::new()
        .content(message.content)
        .ephemeral(message.ephemeral)
        .components(button_rows(&message.buttons))
}

fn modal(spec: ModalSpec) -> serenity::CreateModal {
    let rows = spec
        .fields
        .into_iter()
        .map(|field| {
            let style = match field.style {
                TextFieldStyle::Short => serenity::InputTextStyle::Short,
                TextFieldStyle::Paragraph => serenity::InputTextStyle::Paragraph,
            };
            let mut input = serenity::CreateInputText::new(style, field.label, field.custom_id)
                .required(field.required);
            if let Some(placeholder) = field.placeholder {
                input = input.placeholder(placeholder);
            }
            serenity::CreateActionRow::InputText(input)
        })
        .collect();
    serenity::CreateModal::new(spec.custom_id, spec.title).components(rows)
}

fn command(spec: &CommandSpec) -> serenity::CreateCommand {
    spec.options.iter().fold(
        serenity::CreateCommand::new(spec.name.clone()).description(spec.description.clone()),
        |cmd, opt| {
            let kind = match opt.kind {
                CommandOptionKind::String => serenity::CommandOptionType::String,
                CommandOptionKind::Integer => serenity::CommandOptionType::Integer,
                CommandOptionKind::User => serenity::CommandOptionType::User,
            };
            cmd.add_option(
                serenity::CreateCommandOption::new(kind, opt.name.clone(), opt.description.clone())
                    .required(opt.required),
            )
        },
    )
}

#[async_trait]
impl DiscordSession for SerenitySession {
    async fn respond(
        &self,
        handle: &InteractionHandle,
        reply: InteractionReply,
    ) -> DiscordResult<()> {
        let interaction_id = serenity::InteractionId::new(parse_id(&handle.interaction_id)?);
        let response = match reply {
            InteractionReply::Message(message) => {
                serenity::CreateInteractionResponse::Message(response_message(message))
            }
            InteractionReply::Defer { ephemeral } => serenity::CreateInteractionResponse::Defer(
                serenity::CreateInteractionResponseMessage::new().ephemeral(ephemeral),
            ),
            InteractionReply::DeferUpdate => serenity::CreateInteractionResponse::Acknowledge,
            InteractionReply::UpdateMessage(message) => {
                serenity::CreateInteractionResponse::UpdateMessage(response_message(message))
            }
            InteractionReply::Modal(spec) => serenity::CreateInteractionResponse::Modal(modal(spec)),
        };

        self.http
            .create_interaction_response(interaction_id, &handle.token, &response, Vec::new())
            .await?;
        Ok(())
    }

    async fn edit_response(
        &self,
        handle: &InteractionHandle,
        message: OutgoingMessage,
    ) -> DiscordResult<()> {
        let builder = serenity::EditInteractionResponse::new()
            .content(message.content)
            .components(button_rows(&message.buttons));
        self.http
            .edit_original_interaction_response(&handle.token, &builder, Vec::new())
            .await?;
        Ok(())
    }

    async fn followup(
        &self,
        handle: &InteractionHandle,
        message: OutgoingMessage,
    ) -> DiscordResult<()> {
        let builder = serenity::CreateInteractionResponseFollowup::new()
            .content(message.content)
            .ephemeral(message.ephemeral)
            .components(button_rows(&message.buttons));
        self.http
            .create_followup_message(&handle.token, &builder, Vec::new())
            .await?;
        Ok(())
    }

    async fn create_dm_channel(&self, user_id: &str) -> DiscordResult<String> {
        let channel = serenity::UserId::new(parse_id(user_id)?)
            .create_dm_channel(&self.http)
            .await?;
        Ok(channel.id.to_string())
    }

    async fn send_message(
        &self,
        channel_id: &str,
        message: OutgoingMessage,
    ) -> DiscordResult<String> {
        let builder = serenity::CreateMessage::new()
            .content(message.content)
            .components(button_rows(&message.buttons));
        let sent = serenity::ChannelId::new(parse_id(channel_id)?)
            .send_message(&self.http, builder)
            .await?;
        Ok(sent.id.to_string())
    }

    async fn list_guild_commands(&self, guild_id: &str) -> DiscordResult<Vec<RegisteredCommand>> {
        let commands = serenity::GuildId::new(parse_id(guild_id)?)
            .get_commands(&self.http)
            .await?;
        Ok(commands
            .into_iter()
            .map(|c| RegisteredCommand {
                id: c.id.to_string(),
                name: Some(c.name).filter(|n| !n.is_empty()),
            })
            .collect())
    }

    async fn create_guild_command(&self, guild_id: &str, spec: &CommandSpec) -> DiscordResult<()> {
        serenity::GuildId::new(parse_id(guild_id)?)
            .create_command(&self.http, command(spec))
            .await?;
        Ok(())
    }

    async fn create_channel_invite(
        &self,
        channel_id: &str,
        max_age_secs: u32,
    ) -> DiscordResult<String> {
        let invite = serenity::ChannelId::new(parse_id(channel_id)?)
            .create_invite(&self.http, serenity::CreateInvite::new().max_age(max_age_secs))
            .await?;
        Ok(invite.code)
    }

    async fn download_attachment(&self, url: &str, max_bytes: u64) -> DiscordResult<Bytes> {
        let response = self
            .client
            .get(url)
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;

        if let Some(len) = response.content_length() {
            if len > max_bytes {
                return Err(DiscordError::other(format!(
                    "attachment is {} bytes, limit is {}",
                    len, max_bytes
                )));
            }
        }

        let body = response.bytes().await?;
        if body.len() as u64 > max_bytes {
            return Err(DiscordError::other(format!(
                "attachment is {} bytes, limit is {}",
                body.len(),
                max_bytes
            )));
        }
        debug!("Downloaded {} bytes from {}", body.len(), url);
        Ok(body)
    }
}
