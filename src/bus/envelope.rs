use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

use super::topics;
use crate::discord::InteractionHandle;
use crate::error::{BotError, Result};

pub const GUILD_ID: &str = "guild_id";
pub const USER_ID: &str = "user_id";
pub const CORRELATION_ID: &str = "correlation_id";
pub const CAUSATION_ID: &str = "causation_id";
pub const MESSAGE_TYPE: &str = "message_type";
pub const EMITTED_AT: &str = "emitted_at";
pub const TOPIC: &str = "topic";
pub const DOMAIN: &str = "domain";
pub const CHANNEL_ID: &str = "channel_id";
pub const MESSAGE_ID: &str = "message_id";
/// Broker-honored dedup header (JetStream drops repeats within its window).
pub const DEDUP_HEADER: &str = "Nats-Msg-Id";

pub const DOMAIN_VALUE: &str = "discord";

/// Keys every envelope must carry. `user_id` is checked separately because
/// system-originated events have no user.
pub const REQUIRED_KEYS: &[&str] = &[
    GUILD_ID,
    CORRELATION_ID,
    CAUSATION_ID,
    MESSAGE_TYPE,
    EMITTED_AT,
    TOPIC,
    DOMAIN,
    DEDUP_HEADER,
];

/// Every metadata key the bus transports, in a fixed order.
pub const KNOWN_KEYS: &[&str] = &[
    GUILD_ID,
    USER_ID,
    CORRELATION_ID,
    CAUSATION_ID,
    MESSAGE_TYPE,
    EMITTED_AT,
    TOPIC,
    DOMAIN,
    CHANNEL_ID,
    MESSAGE_ID,
    DEDUP_HEADER,
];

#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub uuid: Uuid,
    pub payload: Bytes,
    pub metadata: BTreeMap<String, String>,
}

impl Envelope {
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn topic(&self) -> Option<&str> {
        self.meta(TOPIC)
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.meta(CORRELATION_ID)
    }

    pub fn parse<T: DeserializeOwned>(&self) -> std::result::Result<T, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }

    /// Look up a string field in the JSON payload (used for channel fallbacks).
    pub fn payload_str(&self, field: &str) -> Option<String> {
        let value: serde_json::Value = serde_json::from_slice(&self.payload).ok()?;
        match value.get(field)? {
            serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Refuse envelopes missing required metadata. A failure here is a
    /// programming error in the caller, never a runtime condition.
    pub fn validate(&self) -> Result<()> {
        let topic = self.topic().unwrap_or("<unknown>").to_string();
        for key in REQUIRED_KEYS {
            if self.meta(key).is_none() {
                return Err(BotError::MissingMetadata { topic, key });
            }
        }
        Ok(())
    }
}

/// Who and where an event originates from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventOrigin {
    pub guild_id: String,
    pub user_id: Option<String>,
    pub channel_id: Option<String>,
    pub message_id: Option<String>,
    /// User-originated events must carry a user ID.
    pub user_originated: bool,
}

impl EventOrigin {
    pub fn user(guild_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            guild_id: guild_id.into(),
            user_id: Some(user_id.into()),
            channel_id: None,
            message_id: None,
            user_originated: true,
        }
    }

    pub fn system(guild_id: impl Into<String>) -> Self {
        Self {
            guild_id: guild_id.into(),
            user_id: None,
            channel_id: None,
            message_id: None,
            user_originated: false,
        }
    }

    /// Origin of an interaction. DMs carry no guild, so callers that know it
    /// from the custom-id pass it in.
    pub fn from_interaction(handle: &InteractionHandle, guild_id: &str) -> Self {
        Self {
            guild_id: guild_id.to_string(),
            user_id: Some(handle.user_id.clone()),
            channel_id: Some(handle.channel_id.clone()),
            message_id: handle.message_id.clone(),
            user_originated: true,
        }
    }

    pub fn in_channel(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = Some(channel_id.into());
        self
    }

    pub fn with_message(mut self, message_id: Option<String>) -> Self {
        self.message_id = message_id;
        self
    }
}

/// Build a bus message with all mandatory metadata.
///
/// A fresh correlation ID is minted when none is given. The envelope UUID
/// doubles as causation ID and dedup token.
pub fn build<T: Serialize>(
    payload: &T,
    topic: &str,
    origin: &EventOrigin,
    correlation_id: Option<String>,
) -> Result<Envelope> {
    if origin.guild_id.trim().is_empty() {
        return Err(BotError::MissingMetadata {
            topic: topic.to_string(),
            key: GUILD_ID,
        });
    }
    let user_id = origin.user_id.clone().filter(|u| !u.trim().is_empty());
    if origin.user_originated && user_id.is_none() {
        return Err(BotError::MissingMetadata {
            topic: topic.to_string(),
            key: USER_ID,
        });
    }

    let bytes = serde_json::to_vec(payload).map_err(|source| BotError::Serialize {
        topic: topic.to_string(),
        source,
    })?;

    let uuid = Uuid::new_v4();
    let correlation_id = correlation_id
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let mut metadata = BTreeMap::new();
    metadata.insert(GUILD_ID.to_string(), origin.guild_id.clone());
    if let Some(user_id) = user_id {
        metadata.insert(USER_ID.to_string(), user_id);
    }
    metadata.insert(CORRELATION_ID.to_string(), correlation_id);
    metadata.insert(CAUSATION_ID.to_string(), uuid.to_string());
    metadata.insert(MESSAGE_TYPE.to_string(), topics::message_type(topic));
    metadata.insert(
        EMITTED_AT.to_string(),
        Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true),
    );
    metadata.insert(TOPIC.to_string(), topic.to_string());
    metadata.insert(DOMAIN.to_string(), DOMAIN_VALUE.to_string());
    metadata.insert(DEDUP_HEADER.to_string(), uuid.to_string());
    if let Some(channel_id) = &origin.channel_id {
        metadata.insert(CHANNEL_ID.to_string(), channel_id.clone());
    }
    if let Some(message_id) = &origin.message_id {
        metadata.insert(MESSAGE_ID.to_string(), message_id.clone());
    }

    Ok(Envelope {
        uuid,
        payload: Bytes::from(bytes),
        metadata,
    })
}
