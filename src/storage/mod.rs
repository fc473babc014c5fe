//! Storage adapters
//!
//! Backends for the unit of work together with the gateways bound to their
//! transactions. `memory` keeps everything in process; `postgres` persists to
//! PostgreSQL through `sqlx`.

pub mod memory;
pub mod postgres;

pub use memory::{Fault, MemoryStorage, MemoryTx};
pub use postgres::{PgStorage, PgTransaction};
