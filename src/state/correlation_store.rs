use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::discord::InteractionHandle;
use crate::error::{BotError, Result};
use crate::shutdown::Shutdown;

/// Interaction tokens expire after 15 minutes; an entry may not outlive one.
pub const MAX_TTL: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_TTL: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone)]
struct Entry {
    handle: InteractionHandle,
    created_at: Instant,
    ttl: Duration,
}

impl Entry {
    fn expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) > self.ttl
    }
}

/// Read-and-delete view of the store. The reply router only ever gets this,
/// so it cannot park new interactions.
pub trait CorrelationLookup: Send + Sync {
    fn get(&self, correlation_id: &str) -> Option<InteractionHandle>;
    fn delete(&self, correlation_id: &str);
}

/// Correlation ID -> parked interaction handle, bounded by TTL.
pub struct CorrelationStore {
    entries: DashMap<String, Entry>,
    default_ttl: Duration,
    closed: AtomicBool,
}

pub type SharedCorrelationStore = Arc<CorrelationStore>;

pub fn create_shared_correlation_store(default_ttl: Duration) -> SharedCorrelationStore {
    Arc::new(CorrelationStore::new(default_ttl))
}

impl CorrelationStore {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            default_ttl: default_ttl.min(MAX_TTL),
            closed: AtomicBool::new(false),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Park `handle` under `correlation_id`. Fails only once the store is closed.
    pub fn set(&self, correlation_id: &str, handle: InteractionHandle, ttl: Option<Duration>) -> Result<()> {
        self.set_at(correlation_id, handle, ttl, Instant::now())
    }

    pub fn set_at(
        &self,
        correlation_id: &str,
        handle: InteractionHandle,
        ttl: Option<Duration>,
        now: Instant,
    ) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BotError::CorrelationStoreClosed);
        }
        let ttl = ttl.unwrap_or(self.default_ttl).min(MAX_TTL);
        let previous = self.entries.insert(
            correlation_id.to_string(),
            Entry {
                handle,
                created_at: now,
                ttl,
            },
        );
        if previous.is_some() {
            warn!(correlation_id, "Correlation ID parked twice, overwriting");
        }
        Ok(())
    }

    pub fn get(&self, correlation_id: &str) -> Option<InteractionHandle> {
        self.get_at(correlation_id, Instant::now())
    }

    /// Expired entries read as absent even before the sweeper removes them.
    pub fn get_at(&self, correlation_id: &str, now: Instant) -> Option<InteractionHandle> {
        self.entries
            .get(correlation_id)
            .filter(|e| !e.expired_at(now))
            .map(|e| e.handle.clone())
    }

    pub fn delete(&self, correlation_id: &str) {
        self.entries.remove(correlation_id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every entry older than its TTL. Returns how many were evicted.
    pub fn sweep_expired_at(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| !e.expired_at(now));
        before.saturating_sub(self.entries.len())
    }

    /// Refuse further `set`s. Existing entries stay readable.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration, shutdown: Shutdown) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!("Correlation sweeper stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        let evicted = store.sweep_expired_at(Instant::now());
                        if evicted > 0 {
                            info!(evicted, remaining = store.len(), "Evicted expired correlations");
                        }
                    }
                }
            }
        })
    }
}

impl CorrelationLookup for CorrelationStore {
    fn get(&self, correlation_id: &str) -> Option<InteractionHandle> {
        CorrelationStore::get(self, correlation_id)
    }

    fn delete(&self, correlation_id: &str) {
        CorrelationStore::delete(self, correlation_id)
    }
}
