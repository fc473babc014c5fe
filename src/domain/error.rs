//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Business rule violations and entity invariant failures.
///
/// These errors are independent of the storage and messaging layers.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// A transfer was requested without a source or destination account
    #[error("neither 'from_account' nor 'to_account' can be absent")]
    MissingAccount,

    /// Zero or negative amount where a positive one is required
    #[error("Invalid amount: {0}")]
    InvalidAmount(Decimal),

    /// Debit larger than the available balance
    #[error("Insufficient funds: balance {balance}, debit amount {amount}")]
    InsufficientFunds { balance: Decimal, amount: Decimal },

    /// Commit attempted on a transfer that already completed
    #[error("Transaction {0} is already completed")]
    AlreadyCompleted(Uuid),

    /// Commit attempted on a transfer whose previous commit partially applied
    #[error("Transaction {0} was aborted and cannot be committed again")]
    TransferAborted(Uuid),

    /// Transfer to same account
    #[error("Cannot transfer to the same account")]
    SameAccountTransfer,

    /// Balance arithmetic exceeded the decimal range
    #[error("Balance overflow on account {0}")]
    BalanceOverflow(Uuid),

    /// Customer attributes failed validation
    #[error("{0}")]
    InvalidCustomer(String),
}

impl DomainError {
    /// Create an insufficient funds error
    pub fn insufficient_funds(balance: Decimal, amount: Decimal) -> Self {
        Self::InsufficientFunds { balance, amount }
    }

    /// Check if this is a client error (caller can correct the request)
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::BalanceOverflow(_) | Self::TransferAborted(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_funds_error() {
        let err = DomainError::insufficient_funds(Decimal::new(50, 0), Decimal::new(100, 0));

        assert!(err.is_client_error());
        assert!(err.to_string().contains("100"));
        assert!(err.to_string().contains("50"));
    }

    #[test]
    fn test_overflow_is_not_client_error() {
        let err = DomainError::BalanceOverflow(Uuid::new_v4());
        assert!(!err.is_client_error());
    }
}
