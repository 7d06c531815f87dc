//! Topic taxonomy. Names are unversioned; `message_type` carries the `.v1` suffix.

// Requests (bot -> backend)
pub const USER_SIGNUP_REQUEST: &str = "user.signup.request";
pub const USER_PROFILE_SYNC_REQUEST: &str = "user.profile.sync.request";
pub const UDISC_IDENTITY_UPDATE_REQUEST: &str = "user.udisc.identity.update.request";
pub const ROLE_UPDATE_REQUEST: &str = "role.update.request";
pub const SCORE_UPDATE_REQUEST: &str = "score.update.request";
pub const SCORECARD_URL_REQUESTED: &str = "scorecard.url.requested";
pub const SCORECARD_UPLOADED: &str = "scorecard.uploaded";
pub const GUILD_CONFIG_DELETION_REQUESTED: &str = "guild.config.deletion.requested";
pub const GUILD_CONFIG_RETRIEVAL_REQUESTED: &str = "guild.config.retrieval.requested";
pub const GUILD_SETUP_REQUESTED: &str = "guild.setup.requested";
pub const ROUND_CREATION_REQUESTED: &str = "round.creation.requested";
pub const TAG_CLAIM_REQUESTED: &str = "leaderboard.tag.claim.requested";

// Replies (backend -> bot)
pub const USER_CREATED: &str = "user.created";
pub const USER_CREATION_FAILED: &str = "user.creation.failed";
pub const UDISC_IDENTITY_UPDATED: &str = "user.udisc.identity.updated";
pub const UDISC_IDENTITY_UPDATE_FAILED: &str = "user.udisc.identity.update.failed";
pub const USER_ROLE_UPDATED: &str = "user.role.updated";
pub const USER_ROLE_UPDATE_FAILED: &str = "user.role.update.failed";
pub const SCORE_UPDATED: &str = "score.updated";
pub const SCORE_UPDATE_FAILED: &str = "score.update.failed";
pub const ROUND_SCORES_PROCESSED: &str = "round.scores.processed";
pub const ROUND_SCORES_PROCESSED_FAILED: &str = "round.scores.processed.failed";
pub const ROUND_CREATED: &str = "round.created";
pub const ROUND_CREATION_FAILED: &str = "round.creation.failed";
pub const TAG_CLAIMED: &str = "leaderboard.tag.claimed";
pub const TAG_CLAIM_FAILED: &str = "leaderboard.tag.claim.failed";
pub const GUILD_CONFIG_CREATED: &str = "guild.config.created";
pub const GUILD_CONFIG_CREATION_FAILED: &str = "guild.config.creation.failed";
pub const GUILD_CONFIG_DELETED: &str = "guild.config.deleted";
pub const GUILD_CONFIG_DELETION_FAILED: &str = "guild.config.deletion.failed";

// Config feed consumed on behalf of the guild config resolver
pub const GUILD_CONFIG_RETRIEVED: &str = "guild.config.retrieved";
pub const GUILD_CONFIG_RETRIEVAL_FAILED: &str = "guild.config.retrieval.failed";
pub const GUILD_CONFIG_UPDATED: &str = "guild.config.updated";

/// Every topic the reply router subscribes to.
pub const REPLY_TOPICS: &[&str] = &[
    USER_CREATED,
    USER_CREATION_FAILED,
    UDISC_IDENTITY_UPDATED,
    UDISC_IDENTITY_UPDATE_FAILED,
    USER_ROLE_UPDATED,
    USER_ROLE_UPDATE_FAILED,
    SCORE_UPDATED,
    SCORE_UPDATE_FAILED,
    ROUND_SCORES_PROCESSED,
    ROUND_SCORES_PROCESSED_FAILED,
    ROUND_CREATED,
    ROUND_CREATION_FAILED,
    TAG_CLAIMED,
    TAG_CLAIM_FAILED,
    GUILD_CONFIG_CREATED,
    GUILD_CONFIG_CREATION_FAILED,
    GUILD_CONFIG_DELETED,
    GUILD_CONFIG_DELETION_FAILED,
    GUILD_CONFIG_RETRIEVED,
    GUILD_CONFIG_RETRIEVAL_FAILED,
    GUILD_CONFIG_UPDATED,
];

pub fn message_type(topic: &str) -> String {
    format!("{}.v1", topic)
}
