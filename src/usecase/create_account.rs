//! Account opening use case

use futures::FutureExt;

use crate::domain::Account;
use crate::error::{AppError, AppResult};
use crate::gateway::{
    SharedAccountGateway, SharedCustomerGateway, ACCOUNT_GATEWAY, CUSTOMER_GATEWAY,
};
use crate::uow::{Storage, UnitOfWork};

use super::{CreateAccountCommand, CreateAccountOutput};

/// Opens a zero-balance account for an existing customer
pub struct CreateAccountUseCase<S: Storage> {
    uow: UnitOfWork<S>,
}

impl<S: Storage> CreateAccountUseCase<S> {
    pub fn new(uow: UnitOfWork<S>) -> Self {
        Self { uow }
    }

    pub async fn execute(&self, command: CreateAccountCommand) -> AppResult<CreateAccountOutput> {
        let uow = self.uow.fork();

        let account = uow
            .run(move |uow| {
                async move {
                    let customers = uow
                        .get_repository::<SharedCustomerGateway>(CUSTOMER_GATEWAY)
                        .await?;
                    let accounts = uow
                        .get_repository::<SharedAccountGateway>(ACCOUNT_GATEWAY)
                        .await?;

                    let customer = customers.get_by_id(command.customer_id).await?;
                    let account = Account::new(&customer);
                    accounts.create(&account).await?;

                    Ok::<_, AppError>(account)
                }
                .boxed()
            })
            .await?;

        tracing::info!(
            account_id = %account.id(),
            customer_id = %account.customer_id(),
            "Account opened"
        );

        Ok(CreateAccountOutput { id: account.id() })
    }
}
