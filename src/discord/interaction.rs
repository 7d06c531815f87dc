use poise::serenity_prelude as serenity;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InteractionKind {
    SlashCommand,
    MessageComponent,
    ModalSubmit,
}

/// Everything needed to answer one in-flight Discord interaction later.
///
/// Tokens stay valid for about 15 minutes, which bounds how long a handle may
/// be parked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionHandle {
    pub interaction_id: String,
    pub token: String,
    /// `None` for DMs.
    pub guild_id: Option<String>,
    pub user_id: String,
    pub channel_id: String,
    pub message_id: Option<String>,
    pub kind: InteractionKind,
}

impl InteractionHandle {
    pub fn is_dm(&self) -> bool {
        self.guild_id.as_deref().map_or(true, str::is_empty)
    }
}

/// Typed value of a slash-command option.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    String(String),
    Integer(i64),
    User(String),
    Other(String),
}

impl OptionValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::String(s) | OptionValue::User(s) | OptionValue::Other(s) => Some(s),
            OptionValue::Integer(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            OptionValue::Integer(n) => Some(*n),
            OptionValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// A Discord interaction normalized for dispatch.
#[derive(Debug, Clone)]
pub struct InteractionEvent {
    pub handle: InteractionHandle,
    /// Command name for slash commands, custom-id otherwise.
    pub key: String,
    pub user_name: String,
    pub member_roles: Vec<String>,
    /// Carries Discord's ADMINISTRATOR permission bit.
    pub is_guild_admin: bool,
    pub options: HashMap<String, OptionValue>,
    /// Modal text inputs by custom-id.
    pub fields: HashMap<String, String>,
}

impl InteractionEvent {
    pub fn kind(&self) -> InteractionKind {
        self.handle.kind
    }

    pub fn guild_id(&self) -> Option<&str> {
        self.handle.guild_id.as_deref().filter(|g| !g.is_empty())
    }

    pub fn user_id(&self) -> &str {
        &self.handle.user_id
    }

    pub fn option_str(&self, name: &str) -> Option<&str> {
        self.options.get(name).and_then(OptionValue::as_str)
    }

    /// Trimmed modal field; empty strings count as absent.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Normalize a gateway interaction. Pings and autocomplete are not dispatched.
    pub fn from_serenity(interaction: &serenity::Interaction) -> Option<Self> {
        match interaction {
            serenity::Interaction::Command(command) => Some(Self::from_command(command)),
            serenity::Interaction::Component(component) => Some(Self::from_component(component)),
            serenity::Interaction::Modal(modal) => Some(Self::from_modal(modal)),
            _ => None,
        }
    }

    fn from_command(command: &serenity::CommandInteraction) -> Self {
        let options = command
            .data
            .options
            .iter()
            .map(|opt| (opt.name.clone(), option_value(&opt.value)))
            .collect();

        let (member_roles, is_guild_admin) = member_info(command.member.as_deref());
        Self {
            handle: InteractionHandle {
                interaction_id: command.id.to_string(),
                token: command.token.clone(),
                guild_id: command.guild_id.map(|g| g.to_string()),
                user_id: command.user.id.to_string(),
                channel_id: command.channel_id.to_string(),
                message_id: None,
                kind: InteractionKind::SlashCommand,
            },
            key: command.data.name.clone(),
            user_name: command.user.name.clone(),
            member_roles,
            is_guild_admin,
            options,
            fields: HashMap::new(),
        }
    }

    fn from_component(component: &serenity::ComponentInteraction) -> Self {
        let (member_roles, is_guild_admin) = member_info(component.member.as_ref());
        Self {
            handle: InteractionHandle {
                interaction_id: component.id.to_string(),
                token: component.token.clone(),
                guild_id: component.guild_id.map(|g| g.to_string()),
                user_id: component.user.id.to_string(),
                channel_id: component.channel_id.to_string(),
                message_id: Some(component.message.id.to_string()),
                kind: InteractionKind::MessageComponent,
            },
            key: component.data.custom_id.clone(),
            user_name: component.user.name.clone(),
            member_roles,
            is_guild_admin,
            options: HashMap::new(),
            fields: HashMap::new(),
        }
    }

    fn from_modal(modal: &serenity::ModalInteraction) -> Self {
        let mut fields = HashMap::new();
        for row in &modal.data.components {
            for component in &row.components {
                if let serenity::ActionRowComponent::InputText(input) = component {
                    fields.insert(
                        input.custom_id.clone(),
                        input.value.clone().unwrap_or_default(),
                    );
                }
            }
        }

        let (member_roles, is_guild_admin) = member_info(modal.member.as_ref());
        Self {
            handle: InteractionHandle {
                interaction_id: modal.id.to_string(),
                token: modal.token.clone(),
                guild_id: modal.guild_id.map(|g| g.to_string()),
                user_id: modal.user.id.to_string(),
                channel_id: modal.channel_id.to_string(),
                message_id: modal.message.as_ref().map(|m| m.id.to_string()),
                kind: InteractionKind::ModalSubmit,
            },
            key: modal.data.custom_id.clone(),
            user_name: modal.user.name.clone(),
            member_roles,
            is_guild_admin,
            options: HashMap::new(),
            fields,
        }
    }
}

fn member_info(member: Option<&serenity::Member>) -> (Vec<String>, bool) {
    match member {
        Some(member) => {
            let roles = member.roles.iter().map(|r| r.to_string()).collect();
            let is_admin = member
                .permissions
                .map(|p| p.administrator())
                .unwrap_or(false);
            (roles, is_admin)
        }
        None => (Vec::new(), false),
    }
}

fn option_value(value: &serenity::CommandDataOptionValue) -> OptionValue {
    match value {
        serenity::CommandDataOptionValue::String(s) => OptionValue::String(s.clone()),
        serenity::CommandDataOptionValue::Integer(n) => OptionValue::Integer(*n),
        serenity::CommandDataOptionValue::User(id) => OptionValue::User(id.to_string()),
        other => OptionValue::Other(format!("{:?}", other)),
    }
}
