//! Programmable test double that records every call in order.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

use super::{
    CommandSpec, DiscordError, DiscordResult, DiscordSession, InteractionHandle,
    InteractionReply, OutgoingMessage, RegisteredCommand,
};

#[derive(Debug, Clone, PartialEq)]
pub enum SessionCall {
    Respond {
        interaction_id: String,
        reply: InteractionReply,
    },
    EditResponse {
        interaction_id: String,
        message: OutgoingMessage,
    },
    Followup {
        interaction_id: String,
        message: OutgoingMessage,
    },
    CreateDmChannel {
        user_id: String,
    },
    SendMessage {
        channel_id: String,
        message: OutgoingMessage,
    },
    ListGuildCommands {
        guild_id: String,
    },
    CreateGuildCommand {
        guild_id: String,
        name: String,
    },
    CreateChannelInvite {
        channel_id: String,
    },
    DownloadAttachment {
        url: String,
    },
}

#[derive(Default)]
pub struct FakeSession {
    calls: Mutex<Vec<SessionCall>>,
    failures: Mutex<HashMap<&'static str, VecDeque<DiscordError>>>,
    guild_commands: Mutex<HashMap<String, Vec<RegisteredCommand>>>,
    attachments: Mutex<HashMap<String, Bytes>>,
    next_id: Mutex<u64>,
}

impl FakeSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an error for the next call of `operation` (the trait method name).
    pub fn fail_next(&self, operation: &'static str, err: DiscordError) {
        self.failures
            .lock()
            .entry(operation)
            .or_default()
            .push_back(err);
    }

    pub fn set_guild_commands(&self, guild_id: &str, names: &[Option<&str>]) {
        let commands = names
            .iter()
            .enumerate()
            .map(|(i, n)| RegisteredCommand {
                id: format!("cmd-{}", i),
                name: n.map(str::to_string),
            })
            .collect();
        self.guild_commands
            .lock()
            .insert(guild_id.to_string(), commands);
    }

    pub fn set_attachment(&self, url: &str, body: &[u8]) {
        self.attachments
            .lock()
            .insert(url.to_string(), Bytes::copy_from_slice(body));
    }

    pub fn calls(&self) -> Vec<SessionCall> {
        self.calls.lock().clone()
    }

    pub fn created_commands(&self, guild_id: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                SessionCall::CreateGuildCommand { guild_id: g, name } if g == guild_id => Some(name),
                _ => None,
            })
            .collect()
    }

    /// Every message content shown to the user, in call order.
    pub fn contents(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                SessionCall::Respond {
                    reply: InteractionReply::Message(m) | InteractionReply::UpdateMessage(m),
                    ..
                } => Some(m.content),
                SessionCall::EditResponse { message, .. }
                | SessionCall::Followup { message, .. }
                | SessionCall::SendMessage { message, .. } => Some(message.content),
                _ => None,
            })
            .collect()
    }

    fn record(&self, operation: &'static str, call: SessionCall) -> DiscordResult<()> {
        self.calls.lock().push(call);
        match self
            .failures
            .lock()
            .get_mut(operation)
            .and_then(VecDeque::pop_front)
        {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn mint_id(&self) -> String {
        let mut next = self.next_id.lock();
        *next += 1;
        format!("{}", 9_000 + *next)
    }
}

#[async_trait]
impl DiscordSession for FakeSession {
    async fn respond(
        &self,
        handle: &InteractionHandle,
        reply: InteractionReply,
    ) -> DiscordResult<()> {
        self.record(
            "respond",
            SessionCall::Respond {
                interaction_id: handle.interaction_id.clone(),
                reply,
            },
        )
    }

    async fn edit_response(
        &self,
        handle: &InteractionHandle,
        message: OutgoingMessage,
    ) -> DiscordResult<()> {
        self.record(
            "edit_response",
            SessionCall::EditResponse {
                interaction_id: handle.interaction_id.clone(),
                message,
            },
        )
    }

    async fn followup(
        &self,
        handle: &InteractionHandle,
        message: OutgoingMessage,
    ) -> DiscordResult<()> {
        self.record(
            "followup",
            SessionCall::Followup {
                interaction_id: handle.interaction_id.clone(),
                message,
            },
        )
    }

    async fn create_dm_channel(&self, user_id: &str) -> DiscordResult<String> {
        self.record(
            "create_dm_channel",
            SessionCall::CreateDmChannel {
                user_id: user_id.to_string(),
            },
        )?;
        Ok(format!("dm-{}", user_id))
    }

    async fn send_message(
        &self,
        channel_id: &str,
        message: OutgoingMessage,
    ) -> DiscordResult<String> {
        self.record(
            "send_message",
            SessionCall::SendMessage {
                channel_id: channel_id.to_string(),
                message,
            },
        )?;
        Ok(self.mint_id())
    }

    async fn list_guild_commands(&self, guild_id: &str) -> DiscordResult<Vec<RegisteredCommand>> {
        self.record(
            "list_guild_commands",
            SessionCall::ListGuildCommands {
                guild_id: guild_id.to_string(),
            },
        )?;
        Ok(self
            .guild_commands
            .lock()
            .get(guild_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_guild_command(&self, guild_id: &str, command: &CommandSpec) -> DiscordResult<()> {
        self.record(
            "create_guild_command",
            SessionCall::CreateGuildCommand {
                guild_id: guild_id.to_string(),
                name: command.name.clone(),
            },
        )?;
        let id = self.mint_id();
        self.guild_commands
            .lock()
            .entry(guild_id.to_string())
            .or_default()
            .push(RegisteredCommand {
                id,
                name: Some(command.name.clone()),
            });
        Ok(())
    }

    async fn create_channel_invite(
        &self,
        channel_id: &str,
        _max_age_secs: u32,
    ) -> DiscordResult<String> {
        self.record(
            "create_channel_invite",
            SessionCall::CreateChannelInvite {
                channel_id: channel_id.to_string(),
            },
        )?;
        Ok(format!("inv{}", channel_id))
    }

    async fn download_attachment(&self, url: &str, max_bytes: u64) -> DiscordResult<Bytes> {
        // Downloads are the one slow call, so let other tasks interleave here.
        tokio::task::yield_now().await;
        self.record(
            "download_attachment",
            SessionCall::DownloadAttachment {
                url: url.to_string(),
            },
        )?;
        let body = self
            .attachments
            .lock()
            .get(url)
            .cloned()
            .ok_or_else(|| DiscordError::Status {
                status: 404,
                message: "Not Found".into(),
            })?;
        if body.len() as u64 > max_bytes {
            return Err(DiscordError::other("attachment too large"));
        }
        Ok(body)
    }
}
