//! Common test utilities
#![allow(dead_code)]

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use wallet_core::events::{Event, EventPublisher, Producer, ProducerError};
use wallet_core::storage::memory::{self, MemoryStorage};
use wallet_core::usecase::CreateTransactionUseCase;
use wallet_core::{Account, Customer, UnitOfWork};

// =========================================================================
// In-memory fixtures
// =========================================================================

/// Producer that records delivered events and can be switched off
#[derive(Default)]
pub struct TestProducer {
    delivered: Mutex<Vec<Event>>,
    down: AtomicBool,
}

impl TestProducer {
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn delivered(&self) -> Vec<Event> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl Producer for TestProducer {
    async fn send(&self, event: &Event, payload: &[u8]) -> Result<(), ProducerError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(ProducerError::Unavailable("test sink is down".to_string()));
        }
        let decoded: Event = serde_json::from_slice(payload).unwrap();
        assert_eq!(&decoded, event);
        self.delivered.lock().unwrap().push(decoded);
        Ok(())
    }
}

pub struct Harness {
    pub storage: MemoryStorage,
    pub producer: Arc<TestProducer>,
    pub usecase: CreateTransactionUseCase<MemoryStorage, TestProducer>,
    pub customer: Customer,
}

impl Harness {
    pub fn new() -> Self {
        let storage = MemoryStorage::new();
        let customer = Customer::new("alex", "alex@example.com").unwrap();
        storage.seed_customer(customer.clone());

        let producer = Arc::new(TestProducer::default());
        let publisher = Arc::new(EventPublisher::new(Arc::clone(&producer)));
        let usecase = CreateTransactionUseCase::new(memory_unit_of_work(&storage), publisher);

        Self {
            storage,
            producer,
            usecase,
            customer,
        }
    }

    /// Store an account holding `balance`
    pub fn account(&self, balance: Decimal) -> Account {
        let mut account = Account::new(&self.customer);
        if balance > Decimal::ZERO {
            account.credit(balance).unwrap();
        }
        self.storage.seed_account(account.clone());
        account
    }

    pub fn balance(&self, account: &Account) -> Decimal {
        self.storage.account(account.id()).unwrap().balance()
    }
}

pub fn memory_unit_of_work(storage: &MemoryStorage) -> UnitOfWork<MemoryStorage> {
    let mut uow = UnitOfWork::new(Arc::new(storage.clone()));
    memory::register_gateways(&mut uow);
    uow
}

// =========================================================================
// PostgreSQL
// =========================================================================

/// Connect to `DATABASE_URL` and make sure the wallet tables exist.
/// Tests use fresh ids, so nothing is truncated.
pub async fn setup_test_db() -> PgPool {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set for tests");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    pool.execute(include_str!("../../migrations/0001_wallet_core.sql"))
        .await
        .expect("Failed to apply schema");

    pool
}
