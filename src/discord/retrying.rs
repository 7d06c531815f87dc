use async_trait::async_trait;
use bytes::Bytes;

use super::{
    CommandSpec, DiscordResult, DiscordSession, InteractionHandle, InteractionReply,
    OutgoingMessage, RegisteredCommand, SharedDiscordSession,
};
use crate::retry::{is_transient, retry, RetryPolicy};
use crate::shutdown::Shutdown;

/// Wraps a session so every call is retried on transient failures.
pub struct RetryingSession {
    inner: SharedDiscordSession,
    policy: RetryPolicy,
    shutdown: Shutdown,
}

impl RetryingSession {
    pub fn new(inner: SharedDiscordSession, policy: RetryPolicy, shutdown: Shutdown) -> Self {
        Self {
            inner,
            policy,
            shutdown,
        }
    }
}

#[async_trait]
impl DiscordSession for RetryingSession {
    async fn respond(
        &self,
        handle: &InteractionHandle,
        reply: InteractionReply,
    ) -> DiscordResult<()> {
        retry(
            &self.policy,
            &self.shutdown,
            "respond",
            || self.inner.respond(handle, reply.clone()),
            is_transient,
        )
        .await
    }

    async fn edit_response(
        &self,
        handle: &InteractionHandle,
        message: OutgoingMessage,
    ) -> DiscordResult<()> {
        retry(
            &self.policy,
            &self.shutdown,
            "edit_response",
            || self.inner.edit_response(handle, message.clone()),
            is_transient,
        )
        .await
    }

    async fn followup(
        &self,
        handle: &InteractionHandle,
        message: OutgoingMessage,
    ) -> DiscordResult<()> {
        retry(
            &self.policy,
            &self.shutdown,
            "followup",
            || self.inner.followup(handle, message.clone()),
            is_transient,
        )
        .await
    }

    async fn create_dm_channel(&self, user_id: &str) -> DiscordResult<String> {
        retry(
            &self.policy,
            &self.shutdown,
            "create_dm_channel",
            || self.inner.create_dm_channel(user_id),
            is_transient,
        )
        .await
    }

    async fn send_message(
        &self,
        channel_id: &str,
        message: OutgoingMessage,
    ) -> DiscordResult<String> {
        retry(
            &self.policy,
            &self.shutdown,
            "send_message",
            || self.inner.send_message(channel_id, message.clone()),
            is_transient,
        )
        .await
    }

    async fn list_guild_commands(&self, guild_id: &str) -> DiscordResult<Vec<RegisteredCommand>> {
        retry(
            &self.policy,
            &self.shutdown,
            "list_guild_commands",
            || self.inner.list_guild_commands(guild_id),
            is_transient,
        )
        .await
    }

    async fn create_guild_command(&self, guild_id: &str, command: &CommandSpec) -> DiscordResult<()> {
        retry(
            &self.policy,
            &self.shutdown,
            "create_guild_command",
            || self.inner.create_guild_command(guild_id, command),
            is_transient,
        )
        .await
    }

    async fn create_channel_invite(
        &self,
        channel_id: &str,
        max_age_secs: u32,
    ) -> DiscordResult<String> {
        retry(
            &self.policy,
            &self.shutdown,
            "create_channel_invite",
            || self.inner.create_channel_invite(channel_id, max_age_secs),
            is_transient,
        )
        .await
    }

    async fn download_attachment(&self, url: &str, max_bytes: u64) -> DiscordResult<Bytes> {
        retry(
            &self.policy,
            &self.shutdown,
            "download_attachment",
            || self.inner.download_attachment(url, max_bytes),
            is_transient,
        )
        .await
    }
}
