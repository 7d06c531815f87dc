//! Routes backend replies back to the Discord interaction that asked.
//!
//! The router also consumes the guild config feed on behalf of the
//! resolver, so a single subscription covers every inbound topic.

pub mod render;

use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::bus::envelope::{CHANNEL_ID, GUILD_ID};
use crate::bus::{topics, Delivery, Envelope, SharedEventBus};
use crate::config::GuildConfig;
use crate::discord::{InteractionHandle, OutgoingMessage, SharedDiscordSession};
use crate::error::{GuildConfigError, Result};
use crate::managers::SharedGuildConfigResolver;
use crate::shutdown::Shutdown;
use crate::state::CorrelationLookup;

use render::{render, Rendered, Visibility};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The parked ephemeral response was edited.
    Edited,
    /// A channel-visible reply was posted for a parked interaction.
    ChannelPosted,
    /// No parked interaction; posted to the channel from the metadata.
    ChannelFallback,
    Suppressed,
    ConfigApplied,
    Dropped(String),
}

pub struct ReplyRouter {
    session: SharedDiscordSession,
    correlations: Arc<dyn CorrelationLookup>,
    guild_configs: SharedGuildConfigResolver,
    suppressed: Vec<String>,
    /// Guild IDs whose commands should be re-synced.
    sync_tx: Option<mpsc::UnboundedSender<String>>,
}

impl ReplyRouter {
    pub fn new(
        session: SharedDiscordSession,
        correlations: Arc<dyn CorrelationLookup>,
        guild_configs: SharedGuildConfigResolver,
        suppressed: Vec<String>,
    ) -> Self {
        Self {
            session,
            correlations,
            guild_configs,
            suppressed,
            sync_tx: None,
        }
    }

    pub fn with_sync_requests(mut self, tx: mpsc::UnboundedSender<String>) -> Self {
        self.sync_tx = Some(tx);
        self
    }

    /// Consume every reply topic, one message at a time, until shutdown.
    pub async fn run(self, bus: SharedEventBus, shutdown: Shutdown) -> Result<()> {
        let mut deliveries = bus.subscribe(topics::REPLY_TOPICS).await?;
        info!(topics = topics::REPLY_TOPICS.len(), "Reply router listening");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Reply router stopping");
                    break;
                }
                next = deliveries.next() => match next {
                    Some(delivery) => {
                        let outcome = self.route(&delivery).await;
                        debug!(
                            topic = %delivery.topic,
                            correlation_id = delivery.envelope.correlation_id().unwrap_or_default(),
                            ?outcome,
                            "Reply routed"
                        );
                    }
                    None => {
                        warn!("Reply subscription closed");
                        break;
                    }
                },
            }
        }
        Ok(())
    }

    pub async fn route(&self, delivery: &Delivery) -> RouteOutcome {
        let topic = delivery.topic.as_str();
        let envelope = &delivery.envelope;

        match topic {
            topics::GUILD_CONFIG_RETRIEVED | topics::GUILD_CONFIG_UPDATED => {
                return self.apply_config(topic, envelope);
            }
            topics::GUILD_CONFIG_RETRIEVAL_FAILED => {
                return self.apply_config_failure(envelope);
            }
            topics::GUILD_CONFIG_DELETED => {
                if let Some(guild_id) = envelope.meta(GUILD_ID) {
                    self.guild_configs.invalidate(guild_id);
                }
            }
            topics::GUILD_CONFIG_CREATED => {
                if let Some(guild_id) = self.store_config(envelope) {
                    self.request_sync(guild_id);
                }
            }
            _ => {}
        }

        self.reply(topic, envelope).await
    }

    fn apply_config(&self, topic: &str, envelope: &Envelope) -> RouteOutcome {
        match self.store_config(envelope) {
            Some(_) => RouteOutcome::ConfigApplied,
            None => {
                warn!(topic, "Unreadable guild config payload");
                RouteOutcome::Dropped("unreadable guild config".to_string())
            }
        }
    }

    /// Returns the guild the config was stored for.
    fn store_config(&self, envelope: &Envelope) -> Option<String> {
        let config = config_from(envelope)?;
        let guild_id = config.guild_id.clone();
        self.guild_configs.on_config_received(&guild_id, config);
        Some(guild_id)
    }

    fn apply_config_failure(&self, envelope: &Envelope) -> RouteOutcome {
        let guild_id = match envelope
            .meta(GUILD_ID)
            .map(str::to_string)
            .or_else(|| envelope.payload_str("guild_id"))
        {
            Some(guild_id) => guild_id,
            None => return RouteOutcome::Dropped("config failure without guild".to_string()),
        };
        let reason = envelope
            .payload_str("reason")
            .or_else(|| envelope.payload_str("error"))
            .unwrap_or_else(|| "unknown error".to_string());

        let error = if reason.to_lowercase().contains("not found") {
            GuildConfigError::NotFound
        } else {
            GuildConfigError::Unavailable(reason)
        };
        self.guild_configs.on_config_failed(&guild_id, error);
        RouteOutcome::ConfigApplied
    }

    fn request_sync(&self, guild_id: String) {
        if let Some(tx) = &self.sync_tx {
            if tx.send(guild_id).is_err() {
                warn!("Command sync consumer is gone");
            }
        }
    }

    fn is_suppressed(&self, reason: &str) -> bool {
        let reason = reason.to_lowercase();
        self.suppressed.iter().any(|s| reason.contains(s.as_str()))
    }

    async fn reply(&self, topic: &str, envelope: &Envelope) -> RouteOutcome {
        let rendered = match render(topic, envelope) {
            Some(rendered) => rendered,
            None => return RouteOutcome::Dropped(format!("no reply rendering for '{}'", topic)),
        };

        let correlation_id = match envelope.correlation_id() {
            Some(correlation_id) => correlation_id,
            None => {
                warn!(topic, "Reply without correlation ID");
                return RouteOutcome::Dropped("missing correlation id".to_string());
            }
        };

        if let Some(reason) = rendered.reason.as_deref().filter(|r| self.is_suppressed(r)) {
            info!(topic, correlation_id, reason, "Suppressed benign failure reply");
            self.correlations.delete(correlation_id);
            return RouteOutcome::Suppressed;
        }

        match self.correlations.get(correlation_id) {
            Some(handle) => self.answer(topic, correlation_id, envelope, &handle, rendered).await,
            None => self.channel_fallback(topic, correlation_id, envelope, rendered).await,
        }
    }

    async fn answer(
        &self,
        topic: &str,
        correlation_id: &str,
        envelope: &Envelope,
        handle: &InteractionHandle,
        rendered: Rendered,
    ) -> RouteOutcome {
        let result = match rendered.visibility {
            Visibility::Channel => {
                let channel_id = reply_channel(envelope).unwrap_or_else(|| handle.channel_id.clone());
                self.session
                    .send_message(&channel_id, OutgoingMessage::public(rendered.content))
                    .await
                    .map(|_| RouteOutcome::ChannelPosted)
            }
            Visibility::Ephemeral => self
                .session
                .edit_response(handle, OutgoingMessage::ephemeral(rendered.content))
                .await
                .map(|_| RouteOutcome::Edited),
        };

        self.correlations.delete(correlation_id);
        match result {
            Ok(outcome) => {
                info!(topic, correlation_id, status = ?rendered.status, "Reply delivered");
                outcome
            }
            Err(e) => {
                error!(topic, correlation_id, error = %e, "Failed to deliver reply");
                RouteOutcome::Dropped(format!("discord error: {}", e))
            }
        }
    }

    async fn channel_fallback(
        &self,
        topic: &str,
        correlation_id: &str,
        envelope: &Envelope,
        rendered: Rendered,
    ) -> RouteOutcome {
        let channel_id = match reply_channel(envelope) {
            Some(channel_id) => channel_id,
            None => {
                info!(topic, correlation_id, "No parked interaction or channel for reply");
                return RouteOutcome::Dropped("no interaction or channel".to_string());
            }
        };

        match self
            .session
            .send_message(&channel_id, OutgoingMessage::public(rendered.content))
            .await
        {
            Ok(_) => {
                info!(topic, correlation_id, channel_id = %channel_id, "Reply posted to channel");
                RouteOutcome::ChannelFallback
            }
            Err(e) => {
                error!(topic, correlation_id, channel_id = %channel_id, error = %e, "Channel fallback failed");
                RouteOutcome::Dropped(format!("discord error: {}", e))
            }
        }
    }
}

fn reply_channel(envelope: &Envelope) -> Option<String> {
    envelope
        .meta(CHANNEL_ID)
        .map(str::to_string)
        .or_else(|| envelope.payload_str("channel_id"))
}

/// The backend sends the config either flat or nested under `config`.
fn config_from(envelope: &Envelope) -> Option<GuildConfig> {
    let value: serde_json::Value = envelope.parse().ok()?;
    let inner = match value.get("config") {
        Some(nested) if nested.is_object() => nested.clone(),
        _ => value,
    };
    let mut config: GuildConfig = serde_json::from_value(inner).ok()?;
    if config.guild_id.is_empty() {
        config.guild_id = envelope.meta(GUILD_ID)?.to_string();
    }
    Some(config)
}
