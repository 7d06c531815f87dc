use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-guild configuration as the backend stores it.
///
/// Empty strings mean "not configured".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuildConfig {
    pub guild_id: String,
    pub signup_channel_id: String,
    pub signup_message_id: String,
    pub signup_emoji: String,
    pub event_channel_id: String,
    pub leaderboard_channel_id: String,
    pub registered_role_id: String,
    pub editor_role_id: String,
    pub admin_role_id: String,
    pub setup_complete: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

impl GuildConfig {
    /// The backend's flag, cross-checked against the fields it implies.
    pub fn is_setup_complete(&self) -> bool {
        self.setup_complete
            && !self.signup_channel_id.is_empty()
            && !self.registered_role_id.is_empty()
            && !self.editor_role_id.is_empty()
            && !self.admin_role_id.is_empty()
    }

    /// `true` when `other` may replace `self` in a cache.
    pub fn is_superseded_by(&self, other: &GuildConfig) -> bool {
        match (self.updated_at, other.updated_at) {
            (Some(current), Some(incoming)) => incoming >= current,
            _ => true,
        }
    }
}
