//! Dispatch table for slash commands, buttons and modals.
//!
//! Handlers register once at startup through [`RegistryBuilder`]; the built
//! [`InteractionRegistry`] is immutable, so lookups take no locks.

pub mod custom_id;
pub mod permissions;

use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::discord::{reply_ephemeral, InteractionEvent, InteractionKind};
use crate::error::{GuildConfigError, HandlerOutcome, Result};
use crate::logging::instrument_handler;
use crate::Data;

use permissions::{evaluate_gate, ConfigState, GateDecision, GateRequest};
pub use permissions::PermissionLevel;

pub type HandlerFn = fn(Arc<Data>, InteractionEvent) -> BoxFuture<'static, Result<HandlerOutcome>>;

pub const MSG_NOT_SET_UP: &str =
    "⚠️ Guild not set up. An administrator needs to run `/frolf-setup` first.";
pub const MSG_INSUFFICIENT: &str = "⛔ Insufficient permissions for this action.";
pub const MSG_CONFIG_UNAVAILABLE: &str =
    "⚠️ Couldn't load this server's configuration. Please try again shortly.";
pub const MSG_DM_DENIED: &str = "This action only works inside a server.";

/// Longest the gate waits on a guild config before answering. Discord drops
/// interactions that get no response within 3 s.
pub const GATE_CONFIG_WAIT: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    Exact(String),
    Prefix(String),
}

#[derive(Clone)]
pub struct Registration {
    pub kind: InteractionKind,
    pub pattern: Pattern,
    pub handler: HandlerFn,
    pub permission: PermissionLevel,
    pub requires_setup: bool,
    pub dm_bypass: bool,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("kind", &self.kind)
            .field("pattern", &self.pattern)
            .field("permission", &self.permission)
            .field("requires_setup", &self.requires_setup)
            .field("dm_bypass", &self.dm_bypass)
            .finish()
    }
}

impl Registration {
    fn new(kind: InteractionKind, pattern: Pattern, handler: HandlerFn) -> Self {
        Self {
            kind,
            pattern,
            handler,
            permission: PermissionLevel::None,
            requires_setup: false,
            dm_bypass: false,
        }
    }

    pub fn command(name: &str, handler: HandlerFn) -> Self {
        Self::new(InteractionKind::SlashCommand, Pattern::Exact(name.to_string()), handler)
    }

    pub fn component(prefix: &str, handler: HandlerFn) -> Self {
        Self::new(InteractionKind::MessageComponent, Pattern::Prefix(prefix.to_string()), handler)
    }

    pub fn component_exact(custom_id: &str, handler: HandlerFn) -> Self {
        Self::new(InteractionKind::MessageComponent, Pattern::Exact(custom_id.to_string()), handler)
    }

    pub fn modal(prefix: &str, handler: HandlerFn) -> Self {
        Self::new(InteractionKind::ModalSubmit, Pattern::Prefix(prefix.to_string()), handler)
    }

    pub fn permission(mut self, level: PermissionLevel) -> Self {
        self.permission = level;
        self
    }

    pub fn requires_setup(mut self) -> Self {
        self.requires_setup = true;
        self
    }

    pub fn dm_bypass(mut self) -> Self {
        self.dm_bypass = true;
        self
    }

    fn label(&self) -> &str {
        match &self.pattern {
            Pattern::Exact(s) | Pattern::Prefix(s) => s,
        }
    }
}

#[derive(Default)]
pub struct RegistryBuilder {
    exact: HashMap<(InteractionKind, String), Registration>,
    prefixes: Vec<Registration>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, registration: Registration) -> &mut Self {
        match registration.pattern.clone() {
            Pattern::Exact(key) => {
                if self
                    .exact
                    .insert((registration.kind, key.clone()), registration)
                    .is_some()
                {
                    warn!(key = %key, "Handler registered twice, keeping the last one");
                }
            }
            Pattern::Prefix(prefix) => {
                self.prefixes
                    .retain(|r| !(r.kind == registration.kind && r.pattern == Pattern::Prefix(prefix.clone())));
                self.prefixes.push(registration);
            }
        }
        self
    }

    pub fn build(mut self) -> InteractionRegistry {
        // Longest prefix wins.
        self.prefixes
            .sort_by(|a, b| b.label().len().cmp(&a.label().len()).then_with(|| a.label().cmp(b.label())));
        InteractionRegistry {
            exact: self.exact,
            prefixes: self.prefixes,
        }
    }
}

pub struct InteractionRegistry {
    exact: HashMap<(InteractionKind, String), Registration>,
    prefixes: Vec<Registration>,
}

impl InteractionRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn len(&self) -> usize {
        self.exact.len() + self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Exact match first, then registered prefixes.
    pub fn resolve(&self, kind: InteractionKind, raw_key: &str) -> Option<&Registration> {
        let key = custom_id::normalize(raw_key)?;
        if let Some(registration) = self.exact.get(&(kind, key.to_string())) {
            return Some(registration);
        }
        self.prefixes.iter().find(|r| {
            r.kind == kind
                && matches!(&r.pattern, Pattern::Prefix(p) if custom_id::matches_prefix(key, p))
        })
    }

    /// Resolve and run a handler on its own task. Returns `None` when no
    /// handler matches.
    pub fn dispatch(&self, data: Arc<Data>, event: InteractionEvent) -> Option<JoinHandle<()>> {
        let registration = match self.resolve(event.kind(), &event.key) {
            Some(r) => r.clone(),
            None => {
                debug!(key = %event.key, kind = ?event.kind(), "No handler for interaction");
                return None;
            }
        };
        Some(tokio::spawn(run_gated(data, registration, event)))
    }
}

async fn run_gated(data: Arc<Data>, registration: Registration, event: InteractionEvent) {
    let decision = check_gate(&data, &registration, &event).await;
    let session = data.session.clone();
    let denial = match decision {
        GateDecision::Allow => {
            let key = event.key.clone();
            let handle = event.handle.clone();
            let future = (registration.handler)(data, event);
            if let Err(e) = instrument_handler(&key, registration.kind, future).await {
                if let Err(reply_err) = reply_ephemeral(session.as_ref(), &handle, e.user_message()).await {
                    warn!(key = %key, error = %reply_err, "Could not report handler failure");
                }
            }
            return;
        }
        GateDecision::DenyDm => MSG_DM_DENIED,
        GateDecision::NotSetUp => MSG_NOT_SET_UP,
        GateDecision::ConfigUnavailable => MSG_CONFIG_UNAVAILABLE,
        GateDecision::Insufficient => MSG_INSUFFICIENT,
    };

    debug!(key = %event.key, user_id = %event.user_id(), ?decision, "Interaction denied");
    if let Err(e) = reply_ephemeral(session.as_ref(), &event.handle, denial).await {
        warn!(key = %event.key, error = %e, "Could not send denial");
    }
}

async fn check_gate(data: &Data, registration: &Registration, event: &InteractionEvent) -> GateDecision {
    let request = GateRequest {
        kind: event.kind(),
        key: &event.key,
        is_dm: event.handle.is_dm(),
        is_guild_admin: event.is_guild_admin,
        member_roles: &event.member_roles,
        required: registration.permission,
        requires_setup: registration.requires_setup,
        dm_bypass: registration.dm_bypass,
    };

    if !request.needs_config() {
        return evaluate_gate(&request, ConfigState::Skipped);
    }

    let guild_id = event.guild_id().unwrap_or_default();
    // The request is already on the bus, so a late reply still warms the cache.
    let fetched = tokio::time::timeout(GATE_CONFIG_WAIT, data.guild_configs.get(guild_id))
        .await
        .unwrap_or_else(|_| Err(GuildConfigError::Unavailable("gate wait elapsed".into())));
    match fetched {
        Ok(config) => evaluate_gate(&request, ConfigState::Loaded(&config)),
        Err(GuildConfigError::NotFound) => evaluate_gate(&request, ConfigState::Missing),
        Err(GuildConfigError::Unavailable(reason)) => {
            warn!(guild_id, reason = %reason, "Guild config unavailable during dispatch");
            evaluate_gate(&request, ConfigState::Unavailable)
        }
    }
}
