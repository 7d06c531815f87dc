//! In-process bus used by tests and `--memory-bus` development mode.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use super::{Delivery, Envelope, EventBus};
use crate::error::Result;

const SUBSCRIBER_BUFFER: usize = 256;

#[derive(Default)]
pub struct InMemoryBus {
    subscribers: Mutex<HashMap<String, Vec<mpsc::Sender<Delivery>>>>,
    #[cfg(test)]
    published: Mutex<Vec<Envelope>>,
    #[cfg(test)]
    fail_publishes: Mutex<usize>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every envelope accepted so far, in publish order.
    #[cfg(test)]
    pub fn published(&self) -> Vec<Envelope> {
        self.published.lock().clone()
    }

    #[cfg(test)]
    pub fn published_on(&self, topic: &str) -> Vec<Envelope> {
        self.published
            .lock()
            .iter()
            .filter(|e| e.topic() == Some(topic))
            .cloned()
            .collect()
    }

    /// Make the next `count` publishes fail.
    #[cfg(test)]
    pub fn fail_next_publishes(&self, count: usize) {
        *self.fail_publishes.lock() = count;
    }
}

#[async_trait]
impl EventBus for InMemoryBus {
    async fn publish(&self, envelope: &Envelope) -> Result<()> {
        envelope.validate()?;
        let topic = envelope.topic().unwrap_or_default().to_string();

        #[cfg(test)]
        {
            let mut failures = self.fail_publishes.lock();
            if *failures > 0 {
                *failures -= 1;
                return Err(crate::error::BotError::Publish {
                    topic,
                    message: "publisher unavailable".to_string(),
                });
            }
        }

        #[cfg(test)]
        self.published.lock().push(envelope.clone());

        let senders = self
            .subscribers
            .lock()
            .get(&topic)
            .cloned()
            .unwrap_or_default();
        for sender in senders {
            let delivery = Delivery {
                topic: topic.clone(),
                envelope: envelope.clone(),
            };
            if sender.send(delivery).await.is_err() {
                debug!(topic = %topic, "Dropping delivery for closed subscriber");
            }
        }
        Ok(())
    }

    async fn subscribe(&self, topics: &[&str]) -> Result<BoxStream<'static, Delivery>> {
        let mut streams = Vec::with_capacity(topics.len());
        let mut subscribers = self.subscribers.lock();
        for topic in topics {
            let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
            subscribers.entry(topic.to_string()).or_default().push(tx);
            streams.push(ReceiverStream::new(rx));
        }
        Ok(stream::select_all(streams).boxed())
    }
}
