//! Shared fixtures: a fully wired `Data` over the recording session and the
//! in-memory bus, plus interaction builders.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::bus::InMemoryBus;
use crate::config::{BotConfig, GuildConfig};
use crate::discord::fake::FakeSession;
use crate::discord::{InteractionEvent, InteractionHandle, InteractionKind};
use crate::managers::{build_registry, create_shared_guild_config_resolver, BusConfigRequester};
use crate::shutdown::Shutdown;
use crate::state::{create_shared_correlation_store, create_shared_pending_uploads};
use crate::Data;

pub const PLAYER_ROLE: &str = "R-player";
pub const EDITOR_ROLE: &str = "R-editor";
pub const ADMIN_ROLE: &str = "R-admin";
pub const SIGNUP_CHANNEL: &str = "C-signup";
pub const SIGNUP_MESSAGE: &str = "M-signup";
pub const SIGNUP_EMOJI: &str = "🥏";

pub fn complete_config(guild_id: &str) -> GuildConfig {
    GuildConfig {
        guild_id: guild_id.to_string(),
        signup_channel_id: SIGNUP_CHANNEL.to_string(),
        signup_message_id: SIGNUP_MESSAGE.to_string(),
        signup_emoji: SIGNUP_EMOJI.to_string(),
        event_channel_id: "C-events".to_string(),
        leaderboard_channel_id: "C-leaderboard".to_string(),
        registered_role_id: PLAYER_ROLE.to_string(),
        editor_role_id: EDITOR_ROLE.to_string(),
        admin_role_id: ADMIN_ROLE.to_string(),
        setup_complete: true,
        updated_at: None,
    }
}

pub struct TestHarness {
    pub data: Arc<Data>,
    pub session: Arc<FakeSession>,
    pub bus: Arc<InMemoryBus>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(BotConfig::for_tests())
    }

    pub fn with_config(config: BotConfig) -> Self {
        let session = Arc::new(FakeSession::new());
        let bus = Arc::new(InMemoryBus::new());
        let guild_configs = create_shared_guild_config_resolver(
            Arc::new(BusConfigRequester::new(bus.clone())),
            config.guild_config_ttl,
            config.guild_config_fetch_timeout,
        );

        let data = Data {
            correlations: create_shared_correlation_store(config.correlation_ttl),
            pending_uploads: create_shared_pending_uploads(config.pending_upload_ttl),
            config: Arc::new(config),
            session: session.clone(),
            bus: bus.clone(),
            guild_configs,
            registry: Arc::new(build_registry()),
            bot_user_id: once_cell::sync::OnceCell::new(),
            shutdown: Shutdown::new(),
        };

        Self {
            data: Arc::new(data),
            session,
            bus,
        }
    }

    pub fn with_complete_guild(guild_id: &str) -> Self {
        let harness = Self::new();
        harness
            .data
            .guild_configs
            .on_config_received(guild_id, complete_config(guild_id));
        harness
    }

    /// Dispatch through the registry and wait for the handler task.
    pub async fn dispatch(&self, event: InteractionEvent) {
        let task = self
            .data
            .registry
            .dispatch(self.data.clone(), event)
            .expect("no handler registered");
        task.await.expect("handler task panicked");
    }
}

static NEXT_INTERACTION: AtomicU64 = AtomicU64::new(1);

fn event(guild_id: Option<&str>, user_id: &str, kind: InteractionKind, key: &str) -> InteractionEvent {
    let n = NEXT_INTERACTION.fetch_add(1, Ordering::Relaxed);
    InteractionEvent {
        handle: InteractionHandle {
            interaction_id: format!("I{}", n),
            token: format!("token-{}", n),
            guild_id: guild_id.map(str::to_string),
            user_id: user_id.to_string(),
            channel_id: match guild_id {
                Some(_) => "C-round".to_string(),
                None => format!("dm-{}", user_id),
            },
            message_id: match kind {
                InteractionKind::SlashCommand => None,
                _ => Some("M-round".to_string()),
            },
            kind,
        },
        key: key.to_string(),
        user_name: format!("user-{}", user_id),
        member_roles: Vec::new(),
        is_guild_admin: false,
        options: HashMap::new(),
        fields: HashMap::new(),
    }
}

fn with_fields(mut event: InteractionEvent, fields: &[(&str, &str)]) -> InteractionEvent {
    event.fields = fields
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    event
}

pub fn slash_event(guild_id: &str, user_id: &str, name: &str) -> InteractionEvent {
    event(Some(guild_id), user_id, InteractionKind::SlashCommand, name)
}

pub fn component_event(guild_id: &str, user_id: &str, custom_id: &str) -> InteractionEvent {
    event(Some(guild_id), user_id, InteractionKind::MessageComponent, custom_id)
}

pub fn modal_event(guild_id: &str, user_id: &str, custom_id: &str, fields: &[(&str, &str)]) -> InteractionEvent {
    with_fields(
        event(Some(guild_id), user_id, InteractionKind::ModalSubmit, custom_id),
        fields,
    )
}

pub fn dm_component_event(user_id: &str, custom_id: &str) -> InteractionEvent {
    event(None, user_id, InteractionKind::MessageComponent, custom_id)
}

pub fn dm_modal_event(user_id: &str, custom_id: &str, fields: &[(&str, &str)]) -> InteractionEvent {
    with_fields(
        event(None, user_id, InteractionKind::ModalSubmit, custom_id),
        fields,
    )
}
