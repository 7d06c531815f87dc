use async_nats::HeaderMap;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::BTreeMap;
use tracing::{info, warn};
use uuid::Uuid;

use super::envelope::{CAUSATION_ID, KNOWN_KEYS};
use super::{Delivery, Envelope, EventBus};
use crate::error::{BotError, Result};

/// NATS transport. Subjects are topic names; metadata travels as headers.
pub struct NatsBus {
    client: async_nats::Client,
}

impl NatsBus {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = async_nats::connect(url).await.map_err(|e| BotError::Config {
            message: format!("cannot connect to NATS at {}: {}", url, e),
        })?;
        info!("Connected to NATS at {}", url);
        Ok(Self { client })
    }
}

fn headers_for(envelope: &Envelope) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (key, value) in &envelope.metadata {
        headers.insert(key.as_str(), value.as_str());
    }
    headers
}

fn envelope_from(headers: Option<&HeaderMap>, payload: bytes::Bytes) -> Envelope {
    let mut metadata = BTreeMap::new();
    if let Some(headers) = headers {
        for key in KNOWN_KEYS {
            if let Some(value) = headers.get(*key) {
                metadata.insert(key.to_string(), value.as_str().to_string());
            }
        }
    }
    // The sender's dedup header carries its envelope ID.
    let uuid = metadata
        .get(super::envelope::DEDUP_HEADER)
        .or_else(|| metadata.get(CAUSATION_ID))
        .and_then(|v| Uuid::parse_str(v).ok())
        .unwrap_or_else(Uuid::new_v4);
    Envelope {
        uuid,
        payload,
        metadata,
    }
}

#[async_trait]
impl EventBus for NatsBus {
    async fn publish(&self, envelope: &Envelope) -> Result<()> {
        envelope.validate()?;
        let topic = envelope.topic().unwrap_or_default().to_string();
        self.client
            .publish_with_headers(topic.clone(), headers_for(envelope), envelope.payload.clone())
            .await
            .map_err(|e| BotError::Publish {
                topic,
                message: e.to_string(),
            })
    }

    async fn subscribe(&self, topics: &[&str]) -> Result<BoxStream<'static, Delivery>> {
        let mut streams = Vec::with_capacity(topics.len());
        for topic in topics {
            let subscriber = self
                .client
                .subscribe(topic.to_string())
                .await
                .map_err(|e| BotError::Subscribe {
                    message: format!("{}: {}", topic, e),
                })?;
            streams.push(subscriber.boxed());
        }

        Ok(stream::select_all(streams)
            .map(|message| {
                let topic = message.subject.to_string();
                let mut envelope = envelope_from(message.headers.as_ref(), message.payload);
                if envelope.topic().is_none() {
                    warn!(topic = %topic, "Message arrived without topic header");
                    envelope
                        .metadata
                        .insert(super::envelope::TOPIC.to_string(), topic.clone());
                }
                Delivery { topic, envelope }
            })
            .boxed())
    }

    async fn flush(&self) -> Result<()> {
        self.client.flush().await.map_err(|e| BotError::Publish {
            topic: "<flush>".to_string(),
            message: e.to_string(),
        })
    }
}
