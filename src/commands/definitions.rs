//! Slash commands registered per guild.

use crate::discord::{CommandOptionKind, CommandOptionSpec, CommandSpec};
use crate::registry::permissions::BOOTSTRAP_COMMAND;

fn option(name: &str, description: &str, kind: CommandOptionKind, required: bool) -> CommandOptionSpec {
    CommandOptionSpec {
        name: name.to_string(),
        description: description.to_string(),
        kind,
        required,
    }
}

fn command(name: &str, description: &str, options: Vec<CommandOptionSpec>) -> CommandSpec {
    CommandSpec {
        name: name.to_string(),
        description: description.to_string(),
        options,
    }
}

fn setup_command() -> CommandSpec {
    command(
        BOOTSTRAP_COMMAND,
        "Set up the frolf bot for this server (administrators only)",
        Vec::new(),
    )
}

/// Everything a set-up guild gets.
pub fn desired_commands() -> Vec<CommandSpec> {
    vec![
        command(
            "updaterole",
            "Change a member's league role",
            vec![option("user", "Member to update", CommandOptionKind::User, true)],
        ),
        command("createround", "Schedule a new round", Vec::new()),
        command("frolf-reset", "Delete this server's frolf configuration", Vec::new()),
        command(
            "set-udisc-name",
            "Link your UDisc identity for scorecard imports",
            vec![
                option("username", "Your UDisc username", CommandOptionKind::String, false),
                option("name", "Your name as shown on UDisc scorecards", CommandOptionKind::String, false),
            ],
        ),
        command(
            "claimtag",
            "Claim a leaderboard tag number",
            vec![option("tag", "Tag number to claim", CommandOptionKind::Integer, true)],
        ),
        command("invite", "Get an invite link to the signup channel", Vec::new()),
        setup_command(),
    ]
}

/// Guilds that are not set up only see the setup command.
pub fn bootstrap_commands() -> Vec<CommandSpec> {
    vec![setup_command()]
}
