//! Expectations that a user will follow the scorecard modal with a file.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::shutdown::Shutdown;

pub const DEFAULT_PENDING_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpload {
    pub round_id: String,
    pub guild_id: String,
    pub notes: Option<String>,
    /// The round message the upload button was pressed on.
    pub source_message_id: Option<String>,
    pub created_at: Instant,
}

type Key = (String, String);

pub struct PendingUploads {
    entries: Mutex<HashMap<Key, PendingUpload>>,
    ttl: Duration,
}

pub type SharedPendingUploads = Arc<PendingUploads>;

pub fn create_shared_pending_uploads(ttl: Duration) -> SharedPendingUploads {
    Arc::new(PendingUploads::new(ttl))
}

fn key(user_id: &str, channel_id: &str) -> Key {
    (user_id.to_string(), channel_id.to_string())
}

impl PendingUploads {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Replaces any earlier expectation for the same user and channel.
    pub fn remember(&self, user_id: &str, channel_id: &str, upload: PendingUpload) {
        self.entries.lock().insert(key(user_id, channel_id), upload);
    }

    pub fn peek_at(&self, user_id: &str, channel_id: &str, now: Instant) -> Option<PendingUpload> {
        let entries = self.entries.lock();
        entries
            .get(&key(user_id, channel_id))
            .filter(|p| !self.expired(p, now))
            .cloned()
    }

    pub fn peek(&self, user_id: &str, channel_id: &str) -> Option<PendingUpload> {
        self.peek_at(user_id, channel_id, Instant::now())
    }

    /// Single-shot: the entry is gone afterwards whether or not it had expired.
    pub fn consume_at(&self, user_id: &str, channel_id: &str, now: Instant) -> Option<PendingUpload> {
        self.entries
            .lock()
            .remove(&key(user_id, channel_id))
            .filter(|p| !self.expired(p, now))
    }

    pub fn consume(&self, user_id: &str, channel_id: &str) -> Option<PendingUpload> {
        self.consume_at(user_id, channel_id, Instant::now())
    }

    pub fn sweep_expired_at(&self, now: Instant) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, p| !self.expired(p, now));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn expired(&self, upload: &PendingUpload, now: Instant) -> bool {
        now.saturating_duration_since(upload.created_at) > self.ttl
    }

    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration, shutdown: Shutdown) -> JoinHandle<()> {
        let uploads = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!("Pending upload sweeper stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        let evicted = uploads.sweep_expired_at(Instant::now());
                        if evicted > 0 {
                            info!(evicted, "Dropped stale pending scorecard uploads");
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(created_at: Instant) -> PendingUpload {
        PendingUpload {
            round_id: "R1".to_string(),
            guild_id: "G1".to_string(),
            notes: None,
            source_message_id: Some("M1".to_string()),
            created_at,
        }
    }

    #[test]
    fn test_consume_is_single_shot() {
        let uploads = PendingUploads::new(DEFAULT_PENDING_TTL);
        let now = Instant::now();
        uploads.remember("U1", "C1", upload(now));

        assert_eq!(uploads.consume_at("U1", "C1", now).unwrap().round_id, "R1");
        assert!(uploads.consume_at("U1", "C1", now).is_none());
    }

    #[test]
    fn test_keyed_by_user_and_channel() {
        let uploads = PendingUploads::new(DEFAULT_PENDING_TTL);
        let now = Instant::now();
        uploads.remember("U1", "C1", upload(now));

        assert!(uploads.peek_at("U1", "C2", now).is_none());
        assert!(uploads.peek_at("U2", "C1", now).is_none());
        assert!(uploads.peek_at("U1", "C1", now).is_some());
    }

    #[test]
    fn test_expired_entry_reads_as_absent() {
        let uploads = PendingUploads::new(DEFAULT_PENDING_TTL);
        let start = Instant::now();
        uploads.remember("U1", "C1", upload(start));

        let later = start + Duration::from_secs(6 * 60);
        assert!(uploads.peek_at("U1", "C1", later).is_none());
        assert!(uploads.consume_at("U1", "C1", later).is_none());
        assert_eq!(uploads.len(), 0);
    }

    #[test]
    fn test_sweep_keeps_fresh_entries() {
        let uploads = PendingUploads::new(DEFAULT_PENDING_TTL);
        let start = Instant::now();
        uploads.remember("U1", "C1", upload(start));
        uploads.remember("U2", "C1", upload(start + Duration::from_secs(240)));

        assert_eq!(uploads.sweep_expired_at(start + Duration::from_secs(301)), 1);
        assert_eq!(uploads.len(), 1);
    }
}
