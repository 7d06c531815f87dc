//! Reconcile a guild's registered slash commands with the desired set.

use std::collections::HashSet;
use tracing::{error, info, warn};

use super::definitions::{bootstrap_commands, desired_commands};
use crate::discord::{CommandSpec, DiscordSession};
use crate::shutdown::Shutdown;
use crate::Data;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub created: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
    /// Set when shutdown interrupted the sweep.
    pub aborted: bool,
}

/// Create every desired command the guild does not have yet. Existing
/// commands are never rewritten, so repeated runs are free.
pub async fn sync_guild(
    session: &dyn DiscordSession,
    guild_id: &str,
    desired: &[CommandSpec],
    shutdown: &Shutdown,
) -> SyncReport {
    let mut report = SyncReport::default();

    let existing: HashSet<String> = match session.list_guild_commands(guild_id).await {
        Ok(commands) => commands
            .into_iter()
            .filter_map(|c| c.name)
            .filter(|n| !n.is_empty())
            .collect(),
        Err(e) => {
            warn!(guild_id, error = %e, "Could not list guild commands, creating all");
            HashSet::new()
        }
    };

    for spec in desired {
        if shutdown.is_triggered() {
            info!(guild_id, "Command sync aborted by shutdown");
            report.aborted = true;
            break;
        }
        if existing.contains(&spec.name) {
            report.skipped.push(spec.name.clone());
            continue;
        }
        match session.create_guild_command(guild_id, spec).await {
            Ok(()) => report.created.push(spec.name.clone()),
            Err(e) => {
                error!(guild_id, command = %spec.name, error = %e, "Failed to create command");
                report.failed.push(spec.name.clone());
            }
        }
    }

    info!(
        guild_id,
        created = report.created.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "Command sync finished"
    );
    report
}

/// Full command set for set-up guilds, the setup command otherwise.
pub async fn sync_for(data: &Data, guild_id: &str) -> SyncReport {
    let desired = match data.guild_configs.get(guild_id).await {
        Ok(config) if config.is_setup_complete() => desired_commands(),
        _ => bootstrap_commands(),
    };
    sync_guild(data.session.as_ref(), guild_id, &desired, &data.shutdown).await
}
