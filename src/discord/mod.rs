//! Narrow capability interface over the Discord client.
//!
//! Everything above this module talks to Discord through [`DiscordSession`],
//! so the serenity-backed implementation can be swapped for the recording
//! fake in tests and wrapped with retries in production.

pub mod error;
#[cfg(test)]
pub mod fake;
pub mod interaction;
pub mod retrying;
pub mod serenity_session;

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

pub use error::{DiscordError, NetworkErrorKind};
pub use interaction::{InteractionEvent, InteractionHandle, InteractionKind};
pub use retrying::RetryingSession;
pub use serenity_session::SerenitySession;

pub type DiscordResult<T> = std::result::Result<T, DiscordError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonStyle {
    Primary,
    Secondary,
    Success,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonSpec {
    pub custom_id: String,
    pub label: String,
    pub style: ButtonStyle,
}

impl ButtonSpec {
    pub fn new(custom_id: impl Into<String>, label: impl Into<String>, style: ButtonStyle) -> Self {
        Self {
            custom_id: custom_id.into(),
            label: label.into(),
            style,
        }
    }
}

/// Message body used for replies, edits, follow-ups and channel sends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub content: String,
    pub ephemeral: bool,
    pub buttons: Vec<ButtonSpec>,
}

impl OutgoingMessage {
    pub fn ephemeral(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ephemeral: true,
            buttons: Vec::new(),
        }
    }

    pub fn public(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ephemeral: false,
            buttons: Vec::new(),
        }
    }

    pub fn with_button(mut self, button: ButtonSpec) -> Self {
        self.buttons.push(button);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFieldStyle {
    Short,
    Paragraph,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextField {
    pub custom_id: String,
    pub label: String,
    pub placeholder: Option<String>,
    pub required: bool,
    pub style: TextFieldStyle,
}

impl TextField {
    pub fn short(custom_id: &str, label: &str, required: bool) -> Self {
        Self {
            custom_id: custom_id.to_string(),
            label: label.to_string(),
            placeholder: None,
            required,
            style: TextFieldStyle::Short,
        }
    }

    pub fn paragraph(custom_id: &str, label: &str, required: bool) -> Self {
        Self {
            style: TextFieldStyle::Paragraph,
            ..Self::short(custom_id, label, required)
        }
    }

    pub fn placeholder(mut self, placeholder: &str) -> Self {
        self.placeholder = Some(placeholder.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModalSpec {
    pub custom_id: String,
    pub title: String,
    pub fields: Vec<TextField>,
}

/// Initial acknowledgement of an interaction. Must be sent within 3 seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionReply {
    Message(OutgoingMessage),
    /// Extends the deadline to ~15 minutes; the response is edited later.
    Defer { ephemeral: bool },
    /// Component-only: acknowledge without changing the message.
    DeferUpdate,
    /// Component-only: replace the message the component is attached to.
    UpdateMessage(OutgoingMessage),
    Modal(ModalSpec),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOptionKind {
    String,
    Integer,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOptionSpec {
    pub name: String,
    pub description: String,
    pub kind: CommandOptionKind,
    pub required: bool,
}

/// Slash-command definition as registered per guild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: String,
    pub description: String,
    pub options: Vec<CommandOptionSpec>,
}

/// A command as Discord currently lists it for a guild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredCommand {
    pub id: String,
    pub name: Option<String>,
}

#[async_trait]
pub trait DiscordSession: Send + Sync {
    async fn respond(&self, handle: &InteractionHandle, reply: InteractionReply)
        -> DiscordResult<()>;

    /// Edit the original response of an acknowledged interaction.
    async fn edit_response(
        &self,
        handle: &InteractionHandle,
        message: OutgoingMessage,
    ) -> DiscordResult<()>;

    async fn followup(&self, handle: &InteractionHandle, message: OutgoingMessage)
        -> DiscordResult<()>;

    /// Returns the DM channel ID.
    async fn create_dm_channel(&self, user_id: &str) -> DiscordResult<String>;

    /// Returns the new message ID.
    async fn send_message(&self, channel_id: &str, message: OutgoingMessage)
        -> DiscordResult<String>;

    async fn list_guild_commands(&self, guild_id: &str) -> DiscordResult<Vec<RegisteredCommand>>;

    async fn create_guild_command(&self, guild_id: &str, command: &CommandSpec)
        -> DiscordResult<()>;

    /// Returns the invite code.
    async fn create_channel_invite(&self, channel_id: &str, max_age_secs: u32)
        -> DiscordResult<String>;

    /// Download an attachment, refusing bodies larger than `max_bytes`.
    async fn download_attachment(&self, url: &str, max_bytes: u64) -> DiscordResult<Bytes>;
}

pub type SharedDiscordSession = Arc<dyn DiscordSession>;

/// Send an ephemeral message whether or not the interaction was already
/// acknowledged: try the initial response first, then fall back to a follow-up.
pub async fn reply_ephemeral(
    session: &dyn DiscordSession,
    handle: &InteractionHandle,
    content: impl Into<String>,
) -> DiscordResult<()> {
    let message = OutgoingMessage::ephemeral(content);
    match session
        .respond(handle, InteractionReply::Message(message.clone()))
        .await
    {
        Ok(()) => Ok(()),
        // 40060 "already acknowledged" comes back as a 400
        Err(DiscordError::Status { status: 400, .. }) => session.followup(handle, message).await,
        Err(e) => Err(e),
    }
}
