//! Balance type
//!
//! Domain primitive for account balances. A `Balance` can be zero but never
//! negative; every operation that would break that returns an error instead.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::DomainError;

/// Decimal places a stored amount can carry (`NUMERIC(30, 8)`)
pub const MAX_SCALE: u32 = 8;

/// Check if `amount` can be stored without rounding
pub fn fits_scale(amount: Decimal) -> bool {
    amount.normalize().scale() <= MAX_SCALE
}

/// Non-negative monetary balance.
///
/// # Example
/// ```
/// use rust_decimal::Decimal;
/// use wallet_core::domain::Balance;
///
/// let balance = Balance::new(Decimal::new(100, 0)).unwrap();
/// let balance = balance.debit(Decimal::new(30, 0)).unwrap();
/// assert_eq!(balance.value(), Decimal::new(70, 0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Balance(Decimal);

impl Balance {
    /// Create a balance from a stored value.
    ///
    /// # Errors
    /// - `DomainError::InvalidAmount` if value < 0
    pub fn new(value: Decimal) -> Result<Self, DomainError> {
        if value < Decimal::ZERO {
            return Err(DomainError::InvalidAmount(value));
        }
        Ok(Self(value))
    }

    /// Create a zero balance
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Get the underlying value
    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Check if balance is sufficient for withdrawal
    pub fn is_sufficient_for(&self, amount: Decimal) -> bool {
        self.0 >= amount
    }

    /// Add amount to balance. Returns `None` on decimal overflow.
    pub fn credit(&self, amount: Decimal) -> Option<Balance> {
        self.0.checked_add(amount).map(Self)
    }

    /// Subtract amount from balance
    pub fn debit(&self, amount: Decimal) -> Result<Balance, DomainError> {
        if !self.is_sufficient_for(amount) {
            return Err(DomainError::insufficient_funds(self.0, amount));
        }
        Ok(Self(self.0 - amount))
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for Balance {
    fn default() -> Self {
        Self::zero()
    }
}

impl From<Balance> for Decimal {
    fn from(balance: Balance) -> Self {
        balance.0
    }
}
