//! Event producers

use async_trait::async_trait;

use super::{Event, ProducerError};

/// Sink that accepts serialized events
#[async_trait]
pub trait Producer: Send + Sync + 'static {
    /// Deliver one serialized event. `Ok` means the sink has taken ownership of it.
    async fn send(&self, event: &Event, payload: &[u8]) -> Result<(), ProducerError>;
}

/// Posts events as JSON to an HTTP endpoint
#[derive(Debug, Clone)]
pub struct HttpProducer {
    client: reqwest::Client,
    url: String,
    topic: String,
}

impl HttpProducer {
    pub fn new(url: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            topic: topic.into(),
        }
    }
}

#[async_trait]
impl Producer for HttpProducer {
    async fn send(&self, event: &Event, payload: &[u8]) -> Result<(), ProducerError> {
        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header("X-Event-Topic", &self.topic)
            .header("X-Event-Id", event.eid.to_string())
            .body(payload.to_vec())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProducerError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// Writes events to the log. Used when no sink is configured.
#[derive(Debug, Clone, Default)]
pub struct LogProducer;

#[async_trait]
impl Producer for LogProducer {
    async fn send(&self, event: &Event, payload: &[u8]) -> Result<(), ProducerError> {
        tracing::info!(
            eid = %event.eid,
            name = %event.name,
            payload = %String::from_utf8_lossy(payload),
            "Event emitted"
        );
        Ok(())
    }
}
