//! Transfer entity
//!
//! A `Transaction` moves money between two accounts: debit the source, then
//! credit the destination. It borrows both accounts for the duration of one
//! transfer and commits exactly once.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::money::fits_scale;
use super::{Account, DomainError};

/// Transfer status. `Completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Failed,
    Completed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "failed" => Ok(TransactionStatus::Failed),
            "completed" => Ok(TransactionStatus::Completed),
            other => Err(format!("unknown transaction status '{other}'")),
        }
    }
}

/// A transfer between two borrowed accounts
#[derive(Debug)]
pub struct Transaction<'a> {
    id: Uuid,
    from_account: &'a mut Account,
    to_account: &'a mut Account,
    status: TransactionStatus,
    amount: Decimal,
    created_at: DateTime<Utc>,
}

impl<'a> Transaction<'a> {
    /// Validate and immediately commit a transfer.
    ///
    /// # Errors
    /// - `DomainError::MissingAccount` if either account is absent
    /// - `DomainError::InvalidAmount` if amount <= 0 or has more decimal
    ///   places than storage keeps
    /// - `DomainError::SameAccountTransfer` if both sides are the same account
    /// - any error from [`Transaction::commit`]
    pub fn new_transfer(
        from_account: Option<&'a mut Account>,
        to_account: Option<&'a mut Account>,
        amount: Decimal,
    ) -> Result<Self, DomainError> {
        let (from_account, to_account) = match (from_account, to_account) {
            (Some(from), Some(to)) => (from, to),
            _ => return Err(DomainError::MissingAccount),
        };

        if amount <= Decimal::ZERO || !fits_scale(amount) {
            return Err(DomainError::InvalidAmount(amount));
        }

        if from_account.id() == to_account.id() {
            return Err(DomainError::SameAccountTransfer);
        }

        let mut transaction = Self {
            id: Uuid::new_v4(),
            from_account,
            to_account,
            status: TransactionStatus::Pending,
            amount,
            created_at: Utc::now(),
        };
        transaction.commit()?;

        Ok(transaction)
    }

    /// Debit the source and credit the destination, once.
    ///
    /// A debit failure leaves both balances untouched and the status pending.
    /// A credit failure after a successful debit restores the source account
    /// and marks the transfer failed; it can then never be committed.
    pub fn commit(&mut self) -> Result<(), DomainError> {
        match self.status {
            TransactionStatus::Completed => return Err(DomainError::AlreadyCompleted(self.id)),
            TransactionStatus::Failed => return Err(DomainError::TransferAborted(self.id)),
            TransactionStatus::Pending => {}
        }

        let source_before = self.from_account.clone();
        self.from_account.debit(self.amount)?;
        if let Err(e) = self.to_account.credit(self.amount) {
            *self.from_account = source_before;
            self.status = TransactionStatus::Failed;
            return Err(e);
        }

        self.status = TransactionStatus::Completed;
        Ok(())
    }

    /// Snapshot for persistence
    pub fn record(&self) -> TransactionRecord {
        TransactionRecord {
            id: self.id,
            from_account_id: self.from_account.id(),
            to_account_id: self.to_account.id(),
            amount: self.amount,
            status: self.status,
            created_at: self.created_at,
        }
    }

    // =========================================================================
    // Getters
    // =========================================================================

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn from_account(&self) -> &Account {
        self.from_account
    }

    pub fn to_account(&self) -> &Account {
        self.to_account
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Persisted form of a transfer; references accounts by id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub from_account_id: Uuid,
    pub to_account_id: Uuid,
    pub amount: Decimal,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}
