//! Event Publisher
//!
//! Stages events keyed by their id and delivers them concurrently on
//! [`EventPublisher::publish`]. A failed or timed-out attempt leaves the event
//! staged for the next call; nothing is retried inside a single publish.
//! An event replaced while its delivery was in flight stays staged.

use futures::future::join_all;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use uuid::Uuid;

use super::{Event, Producer, PublishError};

/// Default limit on one delivery attempt
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// A delivery attempt that did not succeed
#[derive(Debug)]
pub struct DeliveryFailure {
    pub eid: Uuid,
    pub name: String,
    pub error: PublishError,
}

/// Outcome of one publish round
#[derive(Debug, Default)]
pub struct PublishReport {
    /// Ids of the events acknowledged in this round
    pub delivered: Vec<Uuid>,
    pub failures: Vec<DeliveryFailure>,
    /// Events still staged after the round
    pub pending: usize,
}

impl PublishReport {
    pub fn is_drained(&self) -> bool {
        self.pending == 0
    }
}

pub struct EventPublisher<P: Producer> {
    producer: Arc<P>,
    staged: Mutex<HashMap<Uuid, Event>>,
    send_timeout: Duration,
}

impl<P: Producer> EventPublisher<P> {
    pub fn new(producer: Arc<P>) -> Self {
        Self::with_timeout(producer, DEFAULT_SEND_TIMEOUT)
    }

    pub fn with_timeout(producer: Arc<P>, send_timeout: Duration) -> Self {
        Self {
            producer,
            staged: Mutex::new(HashMap::new()),
            send_timeout,
        }
    }

    /// Stage an event. Registering an id that is already staged replaces it.
    pub fn register(&self, event: Event) {
        tracing::debug!(eid = %event.eid, name = %event.name, "Event staged");
        self.staged().insert(event.eid, event);
    }

    pub fn staged_count(&self) -> usize {
        self.staged().len()
    }

    pub fn is_staged(&self, eid: Uuid) -> bool {
        self.staged().contains_key(&eid)
    }

    /// Attempt delivery of every staged event once, concurrently, and wait for
    /// all attempts. Acknowledged events are removed; the rest stay staged.
    pub async fn publish(&self) -> PublishReport {
        let batch: Vec<Event> = self.staged().values().cloned().collect();
        if batch.is_empty() {
            return PublishReport::default();
        }

        let attempts = batch.iter().map(|event| self.deliver(event));
        let outcomes = join_all(attempts).await;

        let mut report = PublishReport::default();
        let mut sent = Vec::new();
        for (event, outcome) in batch.into_iter().zip(outcomes) {
            match outcome {
                Ok(()) => {
                    report.delivered.push(event.eid);
                    sent.push(event);
                }
                Err(error) => {
                    tracing::warn!(
                        eid = %event.eid,
                        name = %event.name,
                        error = %error,
                        "Event kept for redelivery"
                    );
                    report.failures.push(DeliveryFailure {
                        eid: event.eid,
                        name: event.name,
                        error,
                    });
                }
            }
        }

        let mut staged = self.staged();
        for event in &sent {
            if staged.get(&event.eid) == Some(event) {
                staged.remove(&event.eid);
            }
        }
        report.pending = staged.len();
        drop(staged);

        tracing::info!(
            delivered = report.delivered.len(),
            failed = report.failures.len(),
            pending = report.pending,
            "Publish round finished"
        );
        report
    }

    /// Run publish rounds until nothing is staged or `max_rounds` is reached,
    /// sleeping `backoff * round` between rounds. Returns the last report.
    pub async fn publish_with_retry(&self, max_rounds: u32, backoff: Duration) -> PublishReport {
        let mut report = PublishReport {
            pending: self.staged_count(),
            ..PublishReport::default()
        };

        for round in 0..max_rounds {
            report = self.publish().await;
            if report.is_drained() {
                break;
            }
            if round + 1 < max_rounds {
                tracing::warn!(
                    "Events still pending, retrying (round {}/{})",
                    round + 1,
                    max_rounds
                );
                tokio::time::sleep(backoff * (round + 1)).await;
            }
        }

        report
    }

    async fn deliver(&self, event: &Event) -> Result<(), PublishError> {
        let payload = serde_json::to_vec(event)?;
        match tokio::time::timeout(self.send_timeout, self.producer.send(event, &payload)).await {
            Ok(result) => {
                result?;
                tracing::debug!(eid = %event.eid, name = %event.name, "Event delivered");
                Ok(())
            }
            Err(_) => Err(PublishError::Timeout(self.send_timeout)),
        }
    }

    fn staged(&self) -> MutexGuard<'_, HashMap<Uuid, Event>> {
        self.staged.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
