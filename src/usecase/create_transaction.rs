//! Transfer use case
//!
//! Loads both accounts, commits the transfer entity, persists the new balances
//! and the transaction record in one unit-of-work scope, then stages and
//! publishes the transaction-created event. Event delivery happens after the
//! commit and never fails the transfer; undelivered events stay staged on the
//! shared publisher.
//!
//! Accounts are always loaded in ascending id order, so two transfers in
//! opposite directions lock rows in the same order. A scope that loses a
//! write conflict is retried from the start.

use futures::FutureExt;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::{Account, Transaction};
use crate::error::{AppError, AppResult};
use crate::events::{Event, EventPublisher, Producer, TRANSACTION_CREATED};
use crate::gateway::{
    SharedAccountGateway, SharedTransactionGateway, ACCOUNT_GATEWAY, TRANSACTION_GATEWAY,
};
use crate::uow::{Storage, StorageError, UnitOfWork};

use super::{CreateTransactionCommand, CreateTransactionOutput};

pub struct CreateTransactionUseCase<S: Storage, P: Producer> {
    uow: UnitOfWork<S>,
    publisher: Arc<EventPublisher<P>>,
}

impl<S: Storage, P: Producer> CreateTransactionUseCase<S, P> {
    pub fn new(uow: UnitOfWork<S>, publisher: Arc<EventPublisher<P>>) -> Self {
        Self { uow, publisher }
    }

    pub fn publisher(&self) -> &Arc<EventPublisher<P>> {
        &self.publisher
    }

    /// Execute the transfer command
    pub async fn execute(
        &self,
        command: CreateTransactionCommand,
    ) -> AppResult<CreateTransactionOutput> {
        const MAX_ATTEMPTS: u32 = 3;

        let mut attempt = 0;
        let output = loop {
            attempt += 1;
            match self.transfer(command.clone()).await {
                Err(e) if e.is_conflict() && attempt < MAX_ATTEMPTS => {
                    tracing::warn!(
                        "Write conflict, retrying transfer (attempt {}/{})",
                        attempt,
                        MAX_ATTEMPTS
                    );
                    tokio::time::sleep(Duration::from_millis(10 * u64::from(attempt))).await;
                }
                result => break result?,
            }
        };

        tracing::info!(
            transaction_id = %output.id,
            from_account_id = %output.from_account_id,
            to_account_id = %output.to_account_id,
            amount = %output.amount,
            "Transfer committed"
        );

        self.emit(&output).await;
        Ok(output)
    }

    /// One attempt in a fresh unit-of-work scope
    async fn transfer(
        &self,
        command: CreateTransactionCommand,
    ) -> AppResult<CreateTransactionOutput> {
        let uow = self.uow.fork();

        uow.run(move |uow| {
            async move {
                let accounts = uow
                    .get_repository::<SharedAccountGateway>(ACCOUNT_GATEWAY)
                    .await?;
                let transactions = uow
                    .get_repository::<SharedTransactionGateway>(TRANSACTION_GATEWAY)
                    .await?;

                let (mut from, mut to) =
                    load_pair(&accounts, command.from_account_id, command.to_account_id).await?;

                let transaction =
                    Transaction::new_transfer(Some(&mut from), Some(&mut to), command.amount)?;
                let record = transaction.record();

                accounts
                    .update_balance(record.from_account_id, transaction.from_account().balance())
                    .await?;
                accounts
                    .update_balance(record.to_account_id, transaction.to_account().balance())
                    .await?;
                transactions.create(&record).await?;

                Ok::<_, AppError>(CreateTransactionOutput::from(&record))
            }
            .boxed()
        })
        .await
    }

    async fn emit(&self, output: &CreateTransactionOutput) {
        let event = match Event::new(TRANSACTION_CREATED, output) {
            Ok(event) => event,
            Err(e) => {
                tracing::error!(
                    transaction_id = %output.id,
                    error = %e,
                    "Failed to build transaction event"
                );
                return;
            }
        };
        self.publisher.register(event);

        let report = self.publisher.publish().await;
        if !report.is_drained() {
            tracing::warn!(
                transaction_id = %output.id,
                pending = report.pending,
                "Transaction events pending delivery"
            );
        }
    }
}

/// Load the source and destination accounts, locking the lower id first
async fn load_pair(
    accounts: &SharedAccountGateway,
    from_id: Uuid,
    to_id: Uuid,
) -> Result<(Account, Account), StorageError> {
    if from_id <= to_id {
        let from = accounts.get_by_id(from_id).await?;
        let to = accounts.get_by_id(to_id).await?;
        Ok((from, to))
    } else {
        let to = accounts.get_by_id(to_id).await?;
        let from = accounts.get_by_id(from_id).await?;
        Ok((from, to))
    }
}
