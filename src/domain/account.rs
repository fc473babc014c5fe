//! Account entity
//!
//! An account holds a customer's balance. Its balance only changes through
//! [`Account::credit`] and [`Account::debit`], which enforce the
//! non-negative balance invariant.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::money::fits_scale;
use super::{Balance, Customer, DomainError};

/// Customer account with a non-negative balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Unique account ID
    id: Uuid,

    /// Owning customer (reference only)
    customer_id: Uuid,

    /// Current balance
    balance: Balance,

    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Account {
    /// Open a new zero-balance account for an existing customer
    pub fn new(customer: &Customer) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            customer_id: customer.id,
            balance: Balance::zero(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild an account from persisted state.
    ///
    /// # Errors
    /// - `DomainError::InvalidAmount` if the stored balance is negative
    pub fn from_stored(
        id: Uuid,
        customer_id: Uuid,
        balance: Decimal,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            id,
            customer_id,
            balance: Balance::new(balance)?,
            created_at,
            updated_at,
        })
    }

    /// Credit (deposit) money to the account.
    ///
    /// Fails with `InvalidAmount` if amount <= 0 or has more decimal places
    /// than storage keeps.
    pub fn credit(&mut self, amount: Decimal) -> Result<(), DomainError> {
        if amount <= Decimal::ZERO || !fits_scale(amount) {
            return Err(DomainError::InvalidAmount(amount));
        }

        self.balance = self
            .balance
            .credit(amount)
            .ok_or(DomainError::BalanceOverflow(self.id))?;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Debit (withdraw) money from the account.
    ///
    /// Fails with `InvalidAmount` if amount < 0 or too finely scaled, and with
    /// `InsufficientFunds` if amount exceeds the balance. The balance is
    /// untouched on failure.
    pub fn debit(&mut self, amount: Decimal) -> Result<(), DomainError> {
        if amount < Decimal::ZERO || !fits_scale(amount) {
            return Err(DomainError::InvalidAmount(amount));
        }

        self.balance = self.balance.debit(amount)?;
        self.updated_at = Utc::now();
        Ok(())
    }

    // =========================================================================
    // Getters
    // =========================================================================

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn customer_id(&self) -> Uuid {
        self.customer_id
    }

    pub fn balance(&self) -> Decimal {
        self.balance.value()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
