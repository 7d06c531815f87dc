//! Per-guild config cache with single-flight fetches over the bus.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::bus::{build, topics, EventOrigin, SharedEventBus};
use crate::config::GuildConfig;
use crate::error::{GuildConfigError, Result};

pub type FetchResult = std::result::Result<GuildConfig, GuildConfigError>;

/// Asks the backend for a guild's config. The answer arrives later through
/// [`GuildConfigResolver::on_config_received`] or `on_config_failed`.
#[async_trait]
pub trait GuildConfigRequester: Send + Sync {
    async fn request(&self, guild_id: &str) -> Result<()>;
}

pub struct BusConfigRequester {
    bus: SharedEventBus,
}

impl BusConfigRequester {
    pub fn new(bus: SharedEventBus) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl GuildConfigRequester for BusConfigRequester {
    async fn request(&self, guild_id: &str) -> Result<()> {
        let envelope = build(
            &json!({ "guild_id": guild_id }),
            topics::GUILD_CONFIG_RETRIEVAL_REQUESTED,
            &EventOrigin::system(guild_id),
            None,
        )?;
        self.bus.publish(&envelope).await
    }
}

struct CachedConfig {
    config: GuildConfig,
    fetched_at: Instant,
}

struct Inflight {
    started_at: Instant,
    waiters: Vec<oneshot::Sender<FetchResult>>,
}

pub struct GuildConfigResolver {
    cache: RwLock<HashMap<String, CachedConfig>>,
    inflight: Mutex<HashMap<String, Inflight>>,
    requester: Arc<dyn GuildConfigRequester>,
    ttl: Duration,
    fetch_timeout: Duration,
}

pub type SharedGuildConfigResolver = Arc<GuildConfigResolver>;

pub fn create_shared_guild_config_resolver(
    requester: Arc<dyn GuildConfigRequester>,
    ttl: Duration,
    fetch_timeout: Duration,
) -> SharedGuildConfigResolver {
    Arc::new(GuildConfigResolver::new(requester, ttl, fetch_timeout))
}

impl GuildConfigResolver {
    pub fn new(requester: Arc<dyn GuildConfigRequester>, ttl: Duration, fetch_timeout: Duration) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
            requester,
            ttl,
            fetch_timeout,
        }
    }

    /// Cached config if fresh, otherwise one fetch shared by every concurrent caller.
    pub async fn get(&self, guild_id: &str) -> FetchResult {
        let now = Instant::now();
        if let Some(config) = self.fresh(guild_id, now) {
            return Ok(config);
        }

        let (tx, rx) = oneshot::channel();
        let leader = {
            let mut inflight = self.inflight.lock();
            let joinable = inflight
                .get(guild_id)
                .map_or(false, |e| now.saturating_duration_since(e.started_at) < self.fetch_timeout);
            if joinable {
                if let Some(entry) = inflight.get_mut(guild_id) {
                    entry.waiters.push(tx);
                }
                false
            } else {
                // absent, or abandoned by a caller that never cleared it
                let previous = inflight.insert(
                    guild_id.to_string(),
                    Inflight {
                        started_at: now,
                        waiters: vec![tx],
                    },
                );
                if let Some(stale) = previous {
                    fail_all(stale.waiters, GuildConfigError::Unavailable("config fetch restarted".into()));
                }
                true
            }
        };

        if leader {
            debug!(guild_id, "Fetching guild config");
            if let Err(e) = self.requester.request(guild_id).await {
                warn!(guild_id, error = %e, "Guild config request failed");
                self.fail_inflight(guild_id, GuildConfigError::Unavailable(e.to_string()));
            }
        }

        match tokio::time::timeout(self.fetch_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(GuildConfigError::Unavailable("config fetch abandoned".into())),
            Err(_) => {
                warn!(guild_id, "Timed out waiting for guild config");
                self.clear_inflight(guild_id);
                Err(GuildConfigError::Unavailable("timed out waiting for guild config".into()))
            }
        }
    }

    /// Looks at the cache only, stale or not. Never fetches.
    pub fn is_setup_complete(&self, guild_id: &str) -> bool {
        self.cache
            .read()
            .get(guild_id)
            .map_or(false, |c| c.config.is_setup_complete())
    }

    pub fn cached(&self, guild_id: &str) -> Option<GuildConfig> {
        self.cache.read().get(guild_id).map(|c| c.config.clone())
    }

    /// Store a config and wake everyone waiting on it. Older updates than
    /// the cached one are ignored, and the waiters get the cached value.
    pub fn on_config_received(&self, guild_id: &str, config: GuildConfig) {
        let effective = {
            let mut cache = self.cache.write();
            match cache.get_mut(guild_id) {
                Some(current) if !current.config.is_superseded_by(&config) => {
                    debug!(guild_id, "Ignoring stale guild config update");
                    current.config.clone()
                }
                _ => {
                    info!(
                        guild_id,
                        setup_complete = config.is_setup_complete(),
                        "Guild config cached"
                    );
                    cache.insert(
                        guild_id.to_string(),
                        CachedConfig {
                            config: config.clone(),
                            fetched_at: Instant::now(),
                        },
                    );
                    config
                }
            }
        };

        if let Some(inflight) = self.inflight.lock().remove(guild_id) {
            for waiter in inflight.waiters {
                let _ = waiter.send(Ok(effective.clone()));
            }
        }
    }

    /// Wake waiters with an error. Nothing is cached.
    pub fn on_config_failed(&self, guild_id: &str, error: GuildConfigError) {
        debug!(guild_id, error = %error, "Guild config fetch failed");
        self.fail_inflight(guild_id, error);
    }

    /// Drop the inflight marker, failing anyone still waiting.
    pub fn clear_inflight(&self, guild_id: &str) {
        self.fail_inflight(
            guild_id,
            GuildConfigError::Unavailable("guild config fetch did not complete".into()),
        );
    }

    pub fn invalidate(&self, guild_id: &str) {
        if self.cache.write().remove(guild_id).is_some() {
            info!(guild_id, "Guild config invalidated");
        }
    }

    fn fresh(&self, guild_id: &str, now: Instant) -> Option<GuildConfig> {
        self.cache
            .read()
            .get(guild_id)
            .filter(|c| now.saturating_duration_since(c.fetched_at) < self.ttl)
            .map(|c| c.config.clone())
    }

    fn fail_inflight(&self, guild_id: &str, error: GuildConfigError) {
        if let Some(inflight) = self.inflight.lock().remove(guild_id) {
            fail_all(inflight.waiters, error);
        }
    }

    #[cfg(test)]
    fn waiting(&self, guild_id: &str) -> usize {
        self.inflight
            .lock()
            .get(guild_id)
            .map_or(0, |i| i.waiters.len())
    }
}

fn fail_all(waiters: Vec<oneshot::Sender<FetchResult>>, error: GuildConfigError) {
    for waiter in waiters {
        let _ = waiter.send(Err(error.clone()));
    }
}
