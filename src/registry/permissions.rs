use crate::config::GuildConfig;
use crate::discord::InteractionKind;

/// Command that must work before a guild has any configuration.
pub const BOOTSTRAP_COMMAND: &str = "frolf-setup";

/// Cumulative: admin satisfies editor, editor satisfies player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PermissionLevel {
    None,
    Player,
    Editor,
    Admin,
}

/// What the gate knows about the guild's configuration.
#[derive(Debug, Clone, Copy)]
pub enum ConfigState<'a> {
    /// Not needed for this decision, so never fetched.
    Skipped,
    Loaded(&'a GuildConfig),
    Missing,
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    DenyDm,
    NotSetUp,
    ConfigUnavailable,
    Insufficient,
}

/// The facts the gate decides on.
#[derive(Debug, Clone, Copy)]
pub struct GateRequest<'a> {
    pub kind: InteractionKind,
    pub key: &'a str,
    pub is_dm: bool,
    pub is_guild_admin: bool,
    pub member_roles: &'a [String],
    pub required: PermissionLevel,
    pub requires_setup: bool,
    pub dm_bypass: bool,
}

impl GateRequest<'_> {
    fn is_bootstrap(&self) -> bool {
        self.kind == InteractionKind::SlashCommand && self.key == BOOTSTRAP_COMMAND
    }

    /// Whether [`evaluate_gate`] will look at the guild config at all.
    pub fn needs_config(&self) -> bool {
        if self.is_dm || self.is_bootstrap() {
            return false;
        }
        self.requires_setup || (self.required != PermissionLevel::None && !self.is_guild_admin)
    }
}

/// Highest level the member's roles grant. Unset role IDs grant nothing.
pub fn granted_level(config: &GuildConfig, member_roles: &[String]) -> PermissionLevel {
    let has = |role_id: &str| !role_id.is_empty() && member_roles.iter().any(|r| r == role_id);
    if has(&config.admin_role_id) {
        PermissionLevel::Admin
    } else if has(&config.editor_role_id) {
        PermissionLevel::Editor
    } else if has(&config.registered_role_id) {
        PermissionLevel::Player
    } else {
        PermissionLevel::None
    }
}

/// Pure gate: DM bypass, bootstrap bypass, setup, then permission.
pub fn evaluate_gate(request: &GateRequest<'_>, config: ConfigState<'_>) -> GateDecision {
    if request.is_dm {
        return if request.dm_bypass {
            GateDecision::Allow
        } else {
            GateDecision::DenyDm
        };
    }
    if request.is_bootstrap() {
        return GateDecision::Allow;
    }

    if request.requires_setup {
        match config {
            ConfigState::Loaded(c) if c.is_setup_complete() => {}
            ConfigState::Unavailable => return GateDecision::ConfigUnavailable,
            _ => return GateDecision::NotSetUp,
        }
    }

    if request.required == PermissionLevel::None || request.is_guild_admin {
        return GateDecision::Allow;
    }

    match config {
        ConfigState::Loaded(c) if granted_level(c, request.member_roles) >= request.required => {
            GateDecision::Allow
        }
        ConfigState::Unavailable => GateDecision::ConfigUnavailable,
        _ => GateDecision::Insufficient,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> GuildConfig {
        GuildConfig {
            guild_id: "G1".into(),
            signup_channel_id: "C1".into(),
            registered_role_id: "player".into(),
            editor_role_id: "editor".into(),
            admin_role_id: "admin".into(),
            setup_complete: true,
            ..Default::default()
        }
    }

    fn request<'a>(key: &'a str, roles: &'a [String], required: PermissionLevel) -> GateRequest<'a> {
        GateRequest {
            kind: InteractionKind::SlashCommand,
            key,
            is_dm: false,
            is_guild_admin: false,
            member_roles: roles,
            required,
            requires_setup: true,
            dm_bypass: false,
        }
    }

    fn roles(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_role_ordering_is_cumulative() {
        let cfg = config();
        let admin = roles(&["admin"]);
        let editor = roles(&["editor"]);
        let player = roles(&["player"]);
        let nobody = roles(&["someone-else"]);

        let cases = [
            (&admin, PermissionLevel::Editor, GateDecision::Allow),
            (&admin, PermissionLevel::Player, GateDecision::Allow),
            (&editor, PermissionLevel::Player, GateDecision::Allow),
            (&editor, PermissionLevel::Admin, GateDecision::Insufficient),
            (&player, PermissionLevel::Editor, GateDecision::Insufficient),
            (&nobody, PermissionLevel::Player, GateDecision::Insufficient),
        ];
        for (member_roles, required, expected) in cases {
            let req = request("updaterole", member_roles, required);
            assert_eq!(
                evaluate_gate(&req, ConfigState::Loaded(&cfg)),
                expected,
                "{:?} needing {:?}",
                member_roles,
                required
            );
        }
    }

    #[test]
    fn test_admin_bit_satisfies_any_level() {
        let cfg = config();
        let none = roles(&[]);
        let mut req = request("frolf-reset", &none, PermissionLevel::Admin);
        req.is_guild_admin = true;
        assert_eq!(evaluate_gate(&req, ConfigState::Loaded(&cfg)), GateDecision::Allow);
    }

    #[test]
    fn test_unconfigured_role_grants_nothing() {
        let mut cfg = config();
        cfg.editor_role_id.clear();
        // an empty member role must not match an empty configured ID
        let member = roles(&[""]);
        assert_eq!(granted_level(&cfg, &member), PermissionLevel::None);
        let editor = roles(&["editor"]);
        assert_eq!(granted_level(&cfg, &editor), PermissionLevel::None);
    }

    #[test]
    fn test_dm_requires_bypass() {
        let none = roles(&[]);
        let mut req = request("signup_button|U1|guild_id=G1", &none, PermissionLevel::None);
        req.kind = InteractionKind::MessageComponent;
        req.is_dm = true;
        assert_eq!(evaluate_gate(&req, ConfigState::Skipped), GateDecision::DenyDm);
        req.dm_bypass = true;
        assert_eq!(evaluate_gate(&req, ConfigState::Skipped), GateDecision::Allow);
        assert!(!req.needs_config());
    }

    #[test]
    fn test_bootstrap_command_bypasses_everything() {
        let none = roles(&[]);
        let req = request(BOOTSTRAP_COMMAND, &none, PermissionLevel::Admin);
        assert!(!req.needs_config());
        assert_eq!(evaluate_gate(&req, ConfigState::Missing), GateDecision::Allow);
    }

    #[test]
    fn test_setup_gate() {
        let none = roles(&[]);
        let req = request("claimtag", &none, PermissionLevel::None);
        let mut incomplete = config();
        incomplete.setup_complete = false;

        assert_eq!(evaluate_gate(&req, ConfigState::Missing), GateDecision::NotSetUp);
        assert_eq!(
            evaluate_gate(&req, ConfigState::Loaded(&incomplete)),
            GateDecision::NotSetUp
        );
        assert_eq!(
            evaluate_gate(&req, ConfigState::Unavailable),
            GateDecision::ConfigUnavailable
        );
        assert_eq!(evaluate_gate(&req, ConfigState::Loaded(&config())), GateDecision::Allow);
    }

    #[test]
    fn test_decision_is_deterministic() {
        let cfg = config();
        let member = roles(&["editor"]);
        let req = request("role_button|player|U2", &member, PermissionLevel::Editor);
        let first = evaluate_gate(&req, ConfigState::Loaded(&cfg));
        for _ in 0..10 {
            assert_eq!(evaluate_gate(&req, ConfigState::Loaded(&cfg)), first);
        }
    }
}
