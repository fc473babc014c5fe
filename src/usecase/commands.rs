//! Command definitions
//!
//! Inputs and outputs of the use cases.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::TransactionRecord;

// =========================================================================
// CreateTransaction
// =========================================================================

/// Command to move `amount` from one account to another
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTransactionCommand {
    pub from_account_id: Uuid,
    pub to_account_id: Uuid,
    pub amount: Decimal,
}

impl CreateTransactionCommand {
    pub fn new(from_account_id: Uuid, to_account_id: Uuid, amount: Decimal) -> Self {
        Self {
            from_account_id,
            to_account_id,
            amount,
        }
    }
}

/// Committed transfer. Also the content of the transaction-created event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTransactionOutput {
    pub id: Uuid,
    pub from_account_id: Uuid,
    pub to_account_id: Uuid,
    pub amount: Decimal,
}

impl From<&TransactionRecord> for CreateTransactionOutput {
    fn from(record: &TransactionRecord) -> Self {
        Self {
            id: record.id,
            from_account_id: record.from_account_id,
            to_account_id: record.to_account_id,
            amount: record.amount,
        }
    }
}

// =========================================================================
// CreateAccount
// =========================================================================

/// Command to open a zero-balance account for an existing customer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccountCommand {
    pub customer_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateAccountOutput {
    pub id: Uuid,
}
