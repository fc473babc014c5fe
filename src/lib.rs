//! wallet_core Library
//!
//! Ledger entities, the unit of work that makes a transfer's writes atomic,
//! storage adapters, and at-least-once event publication.

pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod events;
pub mod gateway;
pub mod storage;
pub mod uow;
pub mod usecase;

pub use config::Config;
pub use domain::{
    Account, Balance, Customer, DomainError, Transaction, TransactionRecord, TransactionStatus,
};
pub use error::{AppError, AppResult};
pub use events::{Event, EventPublisher, Producer};
pub use uow::{Storage, StorageTx, UnitOfWork};
