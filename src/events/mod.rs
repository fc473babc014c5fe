//! Domain events
//!
//! Events are staged on an [`EventPublisher`] after a transfer commits and
//! handed to a [`Producer`] on the next publish. Delivery is at least once:
//! an event leaves the staged set only when its producer acknowledged it.

mod error;
mod producer;
mod publisher;

pub use error::{ProducerError, PublishError};
pub use producer::{HttpProducer, LogProducer, Producer};
pub use publisher::{DeliveryFailure, EventPublisher, PublishReport};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Name of the event emitted for every committed transfer
pub const TRANSACTION_CREATED: &str = "wallet.core.transaction.created";

/// Wire envelope of a domain event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub eid: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub name: String,
    pub content: serde_json::Value,
}

impl Event {
    /// Create an event with a fresh id, timestamped now
    pub fn new<C: Serialize>(
        name: impl Into<String>,
        content: &C,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            eid: Uuid::new_v4(),
            occurred_at: Utc::now(),
            name: name.into(),
            content: serde_json::to_value(content)?,
        })
    }
}
