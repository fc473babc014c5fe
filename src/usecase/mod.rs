//! Use cases
//!
//! Each use case runs its writes inside one unit-of-work scope. The unit of
//! work handed to the constructor is a template: every `execute` call forks it,
//! so one use case instance can serve concurrent callers.

mod commands;
mod create_account;
mod create_transaction;

pub use commands::{
    CreateAccountCommand, CreateAccountOutput, CreateTransactionCommand, CreateTransactionOutput,
};
pub use create_account::CreateAccountUseCase;
pub use create_transaction::CreateTransactionUseCase;
