//! Domain module
//!
//! Ledger entities and business rules. No I/O.

pub mod account;
pub mod customer;
pub mod error;
pub mod money;
pub mod transaction;

pub use account::Account;
pub use customer::Customer;
pub use error::DomainError;
pub use money::Balance;
pub use transaction::{Transaction, TransactionRecord, TransactionStatus};
