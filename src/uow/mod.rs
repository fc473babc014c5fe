//! Unit of Work module
//!
//! Transaction-scope coordination across independently written repositories.

mod error;
mod storage;
mod unit_of_work;

pub use error::{StorageError, UnitOfWorkError};
pub use storage::{Storage, StorageTx, TxHandle};
pub use unit_of_work::UnitOfWork;
