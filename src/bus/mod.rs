//! Message bus plumbing: envelopes, topics and transports.

pub mod envelope;
pub mod memory;
pub mod nats;
pub mod topics;

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;

use crate::error::Result;

pub use envelope::{build, Envelope, EventOrigin};
pub use memory::InMemoryBus;
pub use nats::NatsBus;

/// A message received from a subscription.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub topic: String,
    pub envelope: Envelope,
}

#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish a validated envelope on its topic.
    async fn publish(&self, envelope: &Envelope) -> Result<()>;

    async fn subscribe(&self, topics: &[&str]) -> Result<BoxStream<'static, Delivery>>;

    /// Flush buffered publishes. Called on shutdown.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

pub type SharedEventBus = Arc<dyn EventBus>;
