use anyhow::Result;
use clap::Parser;
use dotenv::dotenv;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Discord front-end for the frolf league backend
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Sync the full command set on startup, even for guilds not yet set up
    #[arg(long, short = 's')]
    sync_commands: bool,

    /// Only sync commands for this guild (defaults to DISCORD_GUILD_ID, then every guild)
    #[arg(long)]
    guild_id: Option<u64>,

    /// Use the in-process bus instead of NATS (local development only)
    #[arg(long)]
    memory_bus: bool,
}

mod bus;
mod commands;
mod config;
mod discord;
mod emoji;
mod error;
mod events;
mod logging;
mod managers;
mod registry;
mod retry;
mod router;
mod shutdown;
mod state;
#[cfg(test)]
mod testing;

use bus::{InMemoryBus, NatsBus, SharedEventBus};
use config::BotConfig;
use discord::{RetryingSession, SerenitySession, SharedDiscordSession};
use managers::{create_shared_guild_config_resolver, BusConfigRequester, SharedGuildConfigResolver};
use registry::InteractionRegistry;
use retry::RetryPolicy;
use router::ReplyRouter;
use shutdown::Shutdown;
use state::{
    create_shared_correlation_store, create_shared_pending_uploads, SharedCorrelationStore,
    SharedPendingUploads,
};

type Error = Box<dyn std::error::Error + Send + Sync>;

/// How long pending bus publishes get to drain on shutdown.
const BUS_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared application state
pub struct Data {
    pub config: Arc<BotConfig>,
    pub session: SharedDiscordSession,
    pub bus: SharedEventBus,
    pub correlations: SharedCorrelationStore,
    pub guild_configs: SharedGuildConfigResolver,
    pub pending_uploads: SharedPendingUploads,
    pub registry: Arc<InteractionRegistry>,
    /// Set once the gateway reports ready.
    pub bot_user_id: once_cell::sync::OnceCell<String>,
    pub shutdown: Shutdown,
}

async fn event_handler(
    _ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Arc<Data>, Error>,
    data: &Arc<Data>,
) -> Result<(), Error> {
    events::handle_event(event, data).await
}

/// Spawn the background tasks that live as long as the bot.
fn spawn_background(data: &Arc<Data>, startup_guilds: Vec<String>, force_full_sync: bool) {
    data.correlations
        .spawn_sweeper(data.config.sweep_interval, data.shutdown.clone());
    data.pending_uploads
        .spawn_sweeper(data.config.sweep_interval, data.shutdown.clone());

    let (sync_tx, mut sync_rx) = mpsc::unbounded_channel::<String>();
    let router = ReplyRouter::new(
        data.session.clone(),
        data.correlations.clone(),
        data.guild_configs.clone(),
        data.config.suppressed_failure_reasons.clone(),
    )
    .with_sync_requests(sync_tx);
    let bus = data.bus.clone();
    let shutdown = data.shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = router.run(bus, shutdown).await {
            error!(error = %e, "Reply router stopped");
        }
    });

    // Setup completion asks for a full command set.
    let sync_data = Arc::clone(data);
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = sync_data.shutdown.cancelled() => break,
                next = sync_rx.recv() => match next {
                    Some(guild_id) => {
                        commands::sync_for(&sync_data, &guild_id).await;
                    }
                    None => break,
                },
            }
        }
    });

    for guild_id in startup_guilds {
        let data = Arc::clone(data);
        tokio::spawn(async move {
            if force_full_sync {
                let desired = commands::desired_commands();
                commands::sync_guild(data.session.as_ref(), &guild_id, &desired, &data.shutdown).await;
            } else {
                commands::sync_for(&data, &guild_id).await;
            }
        });
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();
    logging::init();

    let config = Arc::new(BotConfig::from_env()?);
    let shutdown = Shutdown::new();

    let bus: SharedEventBus = if args.memory_bus {
        warn!("--memory-bus: replies from the backend will never arrive");
        Arc::new(InMemoryBus::new())
    } else {
        info!(url = %config.nats_url, "Connecting to NATS");
        Arc::new(NatsBus::connect(&config.nats_url).await?)
    };

    let correlations = create_shared_correlation_store(config.correlation_ttl);
    let pending_uploads = create_shared_pending_uploads(config.pending_upload_ttl);
    let guild_configs = create_shared_guild_config_resolver(
        Arc::new(BusConfigRequester::new(bus.clone())),
        config.guild_config_ttl,
        config.guild_config_fetch_timeout,
    );
    let registry = Arc::new(managers::build_registry());
    info!(handlers = registry.len(), "Interaction registry built");

    let target_guild = args
        .guild_id
        .map(|g| g.to_string())
        .or_else(|| config.default_guild_id.clone());
    let force_full_sync = args.sync_commands;
    if force_full_sync {
        info!("--sync-commands: pushing the full command set to every guild");
    }
    if let Some(gid) = &target_guild {
        info!("Startup command sync limited to guild {}", gid);
    }

    let framework = {
        let config = config.clone();
        let bus = bus.clone();
        let correlations = correlations.clone();
        let shutdown = shutdown.clone();

        poise::Framework::builder()
            .options(poise::FrameworkOptions {
                // Every interaction goes through the registry instead.
                commands: Vec::new(),
                event_handler: |ctx, event, framework, data| {
                    Box::pin(event_handler(ctx, event, framework, data))
                },
                on_error: |error| {
                    Box::pin(async move {
                        match error {
                            poise::FrameworkError::UnknownInteraction { interaction, .. } => {
                                debug!(command = %interaction.data.name, "Interaction left to the registry");
                            }
                            poise::FrameworkError::EventHandler { error, event, .. } => {
                                error!("Event handler error in {}: {}", event.snake_case_name(), error);
                            }
                            other => {
                                error!("Other framework error: {}", other);
                            }
                        }
                    })
                },
                ..Default::default()
            })
            .setup(move |ctx, ready, _framework| {
                Box::pin(async move {
                    info!("Bot logged in as: {}", ready.user.name);

                    let serenity_session: SharedDiscordSession =
                        Arc::new(SerenitySession::new(ctx.http.clone()));
                    let session: SharedDiscordSession = Arc::new(RetryingSession::new(
                        serenity_session,
                        RetryPolicy::default(),
                        shutdown.clone(),
                    ));

                    let data = Arc::new(Data {
                        config,
                        session,
                        bus,
                        correlations,
                        guild_configs,
                        pending_uploads,
                        registry,
                        bot_user_id: once_cell::sync::OnceCell::new(),
                        shutdown,
                    });
                    let _ = data.bot_user_id.set(ready.user.id.to_string());

                    let startup_guilds: Vec<String> = match target_guild {
                        Some(gid) => vec![gid],
                        None => ready.guilds.iter().map(|g| g.id.to_string()).collect(),
                    };
                    if startup_guilds.is_empty() {
                        warn!("Bot is not in any guilds - skipping command sync");
                    }
                    spawn_background(&data, startup_guilds, force_full_sync);

                    Ok(data)
                })
            })
            .build()
    };

    let intents = serenity::GatewayIntents::non_privileged() | serenity::GatewayIntents::MESSAGE_CONTENT;
    info!("Requesting privileged intents: [\"MESSAGE_CONTENT\"]");

    let mut client = serenity::ClientBuilder::new(config.discord_token.clone(), intents)
        .framework(framework)
        .await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Could not listen for ctrl-c: {}", e);
            return;
        }
        info!("Shutdown requested");
        shutdown.trigger();
        correlations.close();
        match tokio::time::timeout(BUS_DRAIN_TIMEOUT, bus.flush()).await {
            Ok(Ok(())) => info!("Bus drained"),
            Ok(Err(e)) => warn!(error = %e, "Bus flush failed"),
            Err(_) => warn!("Bus drain timed out"),
        }
        shard_manager.shutdown_all().await;
    });

    info!("Starting bot...");
    if let Err(e) = client.start().await {
        let err_str = e.to_string();
        if err_str.contains("Disallowed") || err_str.contains("intents") {
            error!("Failed to start bot: {}", e);
            error!("Enable the MESSAGE_CONTENT privileged intent in the Discord Developer Portal");
            return Err(anyhow::anyhow!("Disallowed gateway intents: MESSAGE_CONTENT"));
        }
        return Err(e.into());
    }
    warn!("Bot ended.");

    Ok(())
}
