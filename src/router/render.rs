//! Backend reply -> user-facing text.

use serde_json::Value;

use crate::bus::{topics, Envelope};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Edit the parked ephemeral response.
    Ephemeral,
    /// Post to the channel the flow started in.
    Channel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub status: ReplyStatus,
    pub visibility: Visibility,
    pub content: String,
    /// Failure reason as the backend reported it.
    pub reason: Option<String>,
}

impl Rendered {
    fn success(content: String) -> Self {
        Self {
            status: ReplyStatus::Success,
            visibility: Visibility::Ephemeral,
            content,
            reason: None,
        }
    }

    fn failure(what: &str, reason: String) -> Self {
        Self {
            status: ReplyStatus::Failure,
            visibility: Visibility::Ephemeral,
            content: format!("❌ {}: {}", what, reason),
            reason: Some(reason),
        }
    }

    fn in_channel(mut self) -> Self {
        self.visibility = Visibility::Channel;
        self
    }
}

fn field(payload: &Value, key: &str) -> Option<String> {
    match payload.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn reason(payload: &Value) -> String {
    ["reason", "error", "message"]
        .iter()
        .find_map(|key| field(payload, key))
        .unwrap_or_else(|| "unknown error".to_string())
}

/// Render a reply topic. `None` for topics that carry no user-facing reply.
pub fn render(topic: &str, envelope: &Envelope) -> Option<Rendered> {
    let payload: Value = envelope.parse().unwrap_or(Value::Null);

    let rendered = match topic {
        topics::USER_CREATED => {
            let mut content = "🎉 Signup successful! Welcome to the league.".to_string();
            if let Some(tag) = field(&payload, "tag_number") {
                content.push_str(&format!(" Your tag is **#{}**.", tag));
            }
            Rendered::success(content)
        }
        topics::USER_CREATION_FAILED => Rendered::failure("Signup failed", reason(&payload)),

        topics::UDISC_IDENTITY_UPDATED => Rendered::success("✅ UDisc identity updated.".to_string()),
        topics::UDISC_IDENTITY_UPDATE_FAILED => {
            Rendered::failure("Couldn't update your UDisc identity", reason(&payload))
        }

        topics::USER_ROLE_UPDATED => {
            let who = field(&payload, "user_id").map_or_else(|| "The member".to_string(), |u| format!("<@{}>", u));
            let role = field(&payload, "role").unwrap_or_else(|| "updated".to_string());
            Rendered::success(format!("✅ {} now has the **{}** role.", who, role))
        }
        topics::USER_ROLE_UPDATE_FAILED => Rendered::failure("Role update failed", reason(&payload)),

        topics::SCORE_UPDATED => {
            let score = field(&payload, "score").map_or_else(String::new, |s| format!(" ({})", s));
            Rendered::success(format!("✅ Score recorded{}.", score))
        }
        topics::SCORE_UPDATE_FAILED => Rendered::failure("Score update failed", reason(&payload)),

        topics::ROUND_SCORES_PROCESSED => {
            let round = field(&payload, "round_id").map_or_else(String::new, |r| format!(" for round {}", r));
            Rendered::success(format!("📊 Scorecard imported{}.", round)).in_channel()
        }
        topics::ROUND_SCORES_PROCESSED_FAILED => {
            Rendered::failure("Scorecard import failed", reason(&payload)).in_channel()
        }

        topics::ROUND_CREATED => {
            let title = field(&payload, "title").map_or_else(String::new, |t| format!(" **{}**", t));
            Rendered::success(format!("✅ Round{} created!", title))
        }
        topics::ROUND_CREATION_FAILED => Rendered::failure("Round creation failed", reason(&payload)),

        topics::TAG_CLAIMED => {
            let tag = field(&payload, "tag_number").map_or_else(String::new, |t| format!(" #{}", t));
            Rendered::success(format!("🏷️ Tag{} is yours!", tag))
        }
        topics::TAG_CLAIM_FAILED => Rendered::failure("Tag claim failed", reason(&payload)),

        topics::GUILD_CONFIG_CREATED => Rendered::success(
            "✅ Setup complete! Commands for this server are being registered now.".to_string(),
        ),
        topics::GUILD_CONFIG_CREATION_FAILED => Rendered::failure("Setup failed", reason(&payload)),

        topics::GUILD_CONFIG_DELETED => Rendered::success("🧹 Guild configuration reset.".to_string()),
        topics::GUILD_CONFIG_DELETION_FAILED => Rendered::failure("Reset failed", reason(&payload)),

        _ => return None,
    };
    Some(rendered)
}
