//! Customer entity
//!
//! Account owners. Only identity and contact data live here; accounts
//! reference customers by id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::DomainError;

/// Account owner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// Create a new customer with a fresh id.
    ///
    /// # Errors
    /// - `DomainError::InvalidCustomer` if the name is blank or the email is malformed
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Result<Self, DomainError> {
        let now = Utc::now();
        let customer = Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            created_at: now,
            updated_at: now,
        };
        customer.validate()?;
        Ok(customer)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::InvalidCustomer(
                "'name' should not be blank".to_string(),
            ));
        }
        if !is_valid_email(&self.email) {
            return Err(DomainError::InvalidCustomer("'email' is invalid".to_string()));
        }
        Ok(())
    }
}

/// Accepts `local@domain` with no whitespace and exactly one `@`.
fn is_valid_email(email: &str) -> bool {
    let mut parts = email.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty()
                && !domain.is_empty()
                && !email.chars().any(char::is_whitespace)
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        _ => false,
    }
}
