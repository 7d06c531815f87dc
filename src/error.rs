use thiserror::Error;

use crate::discord::DiscordError;

#[derive(Error, Debug)]
pub enum BotError {
    // Configuration errors
    #[error("Invalid config: {message}")]
    Config { message: String },

    // Envelope errors
    #[error("Event envelope for '{topic}' is missing required metadata '{key}'")]
    MissingMetadata { topic: String, key: &'static str },

    #[error("Failed to serialize payload for '{topic}': {source}")]
    Serialize {
        topic: String,
        #[source]
        source: serde_json::Error,
    },

    // Bus errors
    #[error("Failed to publish '{topic}': {message}")]
    Publish { topic: String, message: String },

    #[error("Failed to subscribe: {message}")]
    Subscribe { message: String },

    // Discord errors
    #[error("Discord API error: {0}")]
    Discord(#[from] DiscordError),

    // Guild config errors
    #[error("Guild config unavailable for {guild_id}: {reason}")]
    GuildConfigUnavailable { guild_id: String, reason: String },

    #[error("Guild {guild_id} has no configuration")]
    GuildConfigNotFound { guild_id: String },

    // State errors
    #[error("Correlation store is closed")]
    CorrelationStoreClosed,

    // User input errors
    #[error("Invalid input: {message} (example: {example})")]
    InvalidInput { message: String, example: String },

    #[error("Attachment rejected: {message}")]
    Attachment { message: String },

    // Generic errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl BotError {
    pub fn internal(message: impl Into<String>) -> Self {
        BotError::Internal {
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>, example: impl Into<String>) -> Self {
        BotError::InvalidInput {
            message: message.into(),
            example: example.into(),
        }
    }

    /// Text shown to the user when a handler gives up with this error.
    pub fn user_message(&self) -> String {
        match self {
            BotError::InvalidInput { message, example } => {
                format!("❌ {}. Example: `{}`", message, example)
            }
            BotError::Publish { .. } | BotError::CorrelationStoreClosed => {
                "⚠️ Couldn't reach the server right now, please try again.".to_string()
            }
            BotError::GuildConfigUnavailable { .. } => {
                "⚠️ Couldn't load this server's configuration. Please try again shortly.".to_string()
            }
            BotError::GuildConfigNotFound { .. } => {
                "⚠️ Guild not set up. An administrator needs to run `/frolf-setup` first.".to_string()
            }
            BotError::Attachment { message } => format!("❌ {}", message),
            _ => "❌ Something went wrong while handling that. Please try again.".to_string(),
        }
    }
}

/// Outcome of a guild config fetch, shared by every waiter of one fetch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GuildConfigError {
    #[error("no configuration stored")]
    NotFound,

    #[error("{0}")]
    Unavailable(String),
}

impl GuildConfigError {
    pub fn into_bot_error(self, guild_id: &str) -> BotError {
        match self {
            GuildConfigError::NotFound => BotError::GuildConfigNotFound {
                guild_id: guild_id.to_string(),
            },
            GuildConfigError::Unavailable(reason) => BotError::GuildConfigUnavailable {
                guild_id: guild_id.to_string(),
                reason,
            },
        }
    }
}

/// What a handler reports once it has answered the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    Success,
    /// A domain outcome already rendered to the user.
    Failure(String),
}

pub type Result<T> = std::result::Result<T, BotError>;
