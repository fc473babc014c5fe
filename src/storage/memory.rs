//! In-memory storage
//!
//! A transactional store held in process memory. Writes made through a
//! [`MemoryTx`] are staged and only become visible to other transactions on
//! commit; rollback or drop discards them. Faults can be injected to make any
//! step fail, which is how the atomicity of the transfer flow is tested.
//!
//! Accounts are versioned. A transaction remembers the version of every
//! account it reads or writes, and its commit fails with
//! `StorageError::Conflict` if another transaction committed that account in
//! the meantime.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use crate::domain::{Account, Customer, TransactionRecord};
use crate::gateway::{
    AccountGateway, CustomerGateway, SharedAccountGateway, SharedCustomerGateway,
    SharedTransactionGateway, TransactionGateway, ACCOUNT_GATEWAY, CUSTOMER_GATEWAY,
    TRANSACTION_GATEWAY,
};
use crate::uow::{Storage, StorageError, StorageTx, TxHandle, UnitOfWork};

/// Step that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    Begin,
    Commit,
    Rollback,
    WriteCustomer,
    WriteAccount,
    WriteTransaction,
}

#[derive(Debug, Default, Clone)]
struct Tables {
    customers: HashMap<Uuid, Customer>,
    accounts: HashMap<Uuid, Account>,
    transactions: HashMap<Uuid, TransactionRecord>,
    /// Commit count per account; absent means never committed
    account_versions: HashMap<Uuid, u64>,
}

impl Tables {
    fn account_version(&self, id: Uuid) -> u64 {
        self.account_versions.get(&id).copied().unwrap_or(0)
    }

    fn put_account(&mut self, account: Account) {
        *self.account_versions.entry(account.id()).or_insert(0) += 1;
        self.accounts.insert(account.id(), account);
    }

    /// First account whose committed version moved away from `expected`
    fn conflict(&self, expected: &HashMap<Uuid, u64>) -> Option<Uuid> {
        expected
            .iter()
            .find(|(id, version)| self.account_version(**id) != **version)
            .map(|(id, _)| *id)
    }

    fn merge(&mut self, staged: Tables) {
        self.customers.extend(staged.customers);
        for account in staged.accounts.into_values() {
            self.put_account(account);
        }
        self.transactions.extend(staged.transactions);
    }
}

#[derive(Debug, Default)]
struct Shared {
    committed: Mutex<Tables>,
    faults: Mutex<HashSet<Fault>>,
    begins: AtomicUsize,
}

/// In-process transactional store
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    shared: Arc<Shared>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `fault` fail until cleared
    pub fn inject(&self, fault: Fault) {
        lock(&self.shared.faults).insert(fault);
    }

    pub fn clear(&self, fault: Fault) {
        lock(&self.shared.faults).remove(&fault);
    }

    fn check(&self, fault: Fault) -> Result<(), StorageError> {
        if lock(&self.shared.faults).contains(&fault) {
            return Err(StorageError::Backend(format!("injected {fault:?} failure")));
        }
        Ok(())
    }

    /// Number of transactions begun so far
    pub fn begin_count(&self) -> usize {
        self.shared.begins.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Committed state (bypasses transactions)
    // =========================================================================

    pub fn seed_customer(&self, customer: Customer) {
        lock(&self.shared.committed).customers.insert(customer.id, customer);
    }

    pub fn seed_account(&self, account: Account) {
        lock(&self.shared.committed).put_account(account);
    }

    pub fn customer(&self, id: Uuid) -> Option<Customer> {
        lock(&self.shared.committed).customers.get(&id).cloned()
    }

    pub fn account(&self, id: Uuid) -> Option<Account> {
        lock(&self.shared.committed).accounts.get(&id).cloned()
    }

    pub fn transaction(&self, id: Uuid) -> Option<TransactionRecord> {
        lock(&self.shared.committed).transactions.get(&id).cloned()
    }

    pub fn transaction_count(&self) -> usize {
        lock(&self.shared.committed).transactions.len()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, StorageError> {
        self.check(Fault::Begin)?;
        self.shared.begins.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryTx {
            storage: self.clone(),
            staged: Tables::default(),
            observed: HashMap::new(),
            open: true,
        })
    }
}

/// Open transaction against a [`MemoryStorage`]
#[derive(Debug)]
pub struct MemoryTx {
    storage: MemoryStorage,
    staged: Tables,
    /// Committed version of each account when this transaction first touched it
    observed: HashMap<Uuid, u64>,
    open: bool,
}

impl MemoryTx {
    fn ensure_open(&self) -> Result<(), StorageError> {
        if !self.open {
            return Err(StorageError::TransactionClosed);
        }
        Ok(())
    }

    fn committed(&self) -> MutexGuard<'_, Tables> {
        lock(&self.storage.shared.committed)
    }

    pub fn customer(&self, id: Uuid) -> Result<Customer, StorageError> {
        self.ensure_open()?;
        self.staged
            .customers
            .get(&id)
            .cloned()
            .or_else(|| self.committed().customers.get(&id).cloned())
            .ok_or(StorageError::not_found("Customer", id))
    }

    pub fn put_customer(&mut self, customer: Customer) -> Result<(), StorageError> {
        self.ensure_open()?;
        self.storage.check(Fault::WriteCustomer)?;
        self.staged.customers.insert(customer.id, customer);
        Ok(())
    }

    pub fn account(&mut self, id: Uuid) -> Result<Account, StorageError> {
        self.ensure_open()?;
        if let Some(account) = self.staged.accounts.get(&id) {
            return Ok(account.clone());
        }

        let committed = lock(&self.storage.shared.committed);
        self.observed
            .entry(id)
            .or_insert_with(|| committed.account_version(id));
        committed
            .accounts
            .get(&id)
            .cloned()
            .ok_or(StorageError::not_found("Account", id))
    }

    pub fn put_account(&mut self, account: Account) -> Result<(), StorageError> {
        self.ensure_open()?;
        self.storage.check(Fault::WriteAccount)?;
        if !self.observed.contains_key(&account.id()) {
            let version = self.committed().account_version(account.id());
            self.observed.insert(account.id(), version);
        }
        self.staged.accounts.insert(account.id(), account);
        Ok(())
    }

    pub fn transaction(&self, id: Uuid) -> Result<TransactionRecord, StorageError> {
        self.ensure_open()?;
        self.staged
            .transactions
            .get(&id)
            .cloned()
            .or_else(|| self.committed().transactions.get(&id).cloned())
            .ok_or(StorageError::not_found("Transaction", id))
    }

    pub fn put_transaction(&mut self, record: TransactionRecord) -> Result<(), StorageError> {
        self.ensure_open()?;
        self.storage.check(Fault::WriteTransaction)?;
        self.staged.transactions.insert(record.id, record);
        Ok(())
    }
}

#[async_trait]
impl StorageTx for MemoryTx {
    async fn commit(&mut self) -> Result<(), StorageError> {
        self.ensure_open()?;
        self.storage.check(Fault::Commit)?;

        let mut committed = lock(&self.storage.shared.committed);
        if let Some(id) = committed.conflict(&self.observed) {
            return Err(StorageError::Conflict { entity: "Account", id });
        }
        committed.merge(std::mem::take(&mut self.staged));
        drop(committed);

        self.observed.clear();
        self.open = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StorageError> {
        if !self.open {
            return Ok(());
        }
        self.storage.check(Fault::Rollback)?;

        self.staged = Tables::default();
        self.observed.clear();
        self.open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

// =========================================================================
// Gateways
// =========================================================================

pub struct MemoryAccountGateway {
    tx: TxHandle<MemoryTx>,
}

impl MemoryAccountGateway {
    pub fn new(tx: TxHandle<MemoryTx>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl AccountGateway for MemoryAccountGateway {
    async fn create(&self, account: &Account) -> Result<(), StorageError> {
        let mut tx = self.tx.lock().await;
        tx.customer(account.customer_id())?;
        tx.put_account(account.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Account, StorageError> {
        self.tx.lock().await.account(id)
    }

    async fn update_balance(&self, id: Uuid, balance: Decimal) -> Result<(), StorageError> {
        let mut tx = self.tx.lock().await;
        let current = tx.account(id)?;
        let updated = Account::from_stored(
            current.id(),
            current.customer_id(),
            balance,
            current.created_at(),
            Utc::now(),
        )
        .map_err(|e| StorageError::CorruptRecord(e.to_string()))?;
        tx.put_account(updated)
    }
}

pub struct MemoryTransactionGateway {
    tx: TxHandle<MemoryTx>,
}

impl MemoryTransactionGateway {
    pub fn new(tx: TxHandle<MemoryTx>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl TransactionGateway for MemoryTransactionGateway {
    async fn create(&self, transaction: &TransactionRecord) -> Result<(), StorageError> {
        self.tx.lock().await.put_transaction(transaction.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<TransactionRecord, StorageError> {
        self.tx.lock().await.transaction(id)
    }
}

pub struct MemoryCustomerGateway {
    tx: TxHandle<MemoryTx>,
}

impl MemoryCustomerGateway {
    pub fn new(tx: TxHandle<MemoryTx>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl CustomerGateway for MemoryCustomerGateway {
    async fn save(&self, customer: &Customer) -> Result<(), StorageError> {
        self.tx.lock().await.put_customer(customer.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Customer, StorageError> {
        self.tx.lock().await.customer(id)
    }
}

/// Register the in-memory gateways under their standard names
pub fn register_gateways(uow: &mut UnitOfWork<MemoryStorage>) {
    uow.add(ACCOUNT_GATEWAY, |tx| {
        Arc::new(MemoryAccountGateway::new(tx)) as SharedAccountGateway
    });
    uow.add(TRANSACTION_GATEWAY, |tx| {
        Arc::new(MemoryTransactionGateway::new(tx)) as SharedTransactionGateway
    });
    uow.add(CUSTOMER_GATEWAY, |tx| {
        Arc::new(MemoryCustomerGateway::new(tx)) as SharedCustomerGateway
    });
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn seeded() -> (MemoryStorage, Customer, Account) {
        let storage = MemoryStorage::new();
        let customer = Customer::new("alex", "alex@example.com").unwrap();
        let account = Account::new(&customer);
        storage.seed_customer(customer.clone());
        storage.seed_account(account.clone());
        (storage, customer, account)
    }

    #[tokio::test]
    async fn test_staged_writes_hidden_until_commit() {
        let (storage, _, account) = seeded();
        let mut tx = storage.begin().await.unwrap();

        let gateway = MemoryAccountGateway::new(TxHandle::new(storage.begin().await.unwrap()));
        gateway.update_balance(account.id(), dec!(42)).await.unwrap();

        // visible inside the writing transaction only
        assert_eq!(gateway.get_by_id(account.id()).await.unwrap().balance(), dec!(42));
        assert_eq!(tx.account(account.id()).unwrap().balance(), Decimal::ZERO);
        assert_eq!(storage.account(account.id()).unwrap().balance(), Decimal::ZERO);

        gateway.tx.lock().await.commit().await.unwrap();
        assert_eq!(storage.account(account.id()).unwrap().balance(), dec!(42));

        tx.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_rollback_discards_and_closes() {
        let (storage, customer, _) = seeded();
        let mut tx = storage.begin().await.unwrap();
        let other = Account::new(&customer);

        tx.put_account(other.clone()).unwrap();
        tx.rollback().await.unwrap();

        assert!(!tx.is_open());
        assert!(storage.account(other.id()).is_none());
        assert!(matches!(tx.account(other.id()), Err(StorageError::TransactionClosed)));
        // second rollback is a no-op
        tx.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_dropped_transaction_discards() {
        let (storage, customer, _) = seeded();
        let other = Account::new(&customer);
        {
            let mut tx = storage.begin().await.unwrap();
            tx.put_account(other.clone()).unwrap();
        }
        assert!(storage.account(other.id()).is_none());
    }

    #[tokio::test]
    async fn test_injected_faults() {
        let (storage, customer, _) = seeded();
        storage.inject(Fault::WriteAccount);

        let mut tx = storage.begin().await.unwrap();
        let result = tx.put_account(Account::new(&customer));
        assert!(matches!(
            result,
            Err(StorageError::Backend(msg)) if msg == "injected WriteAccount failure"
        ));

        storage.clear(Fault::WriteAccount);
        assert!(tx.put_account(Account::new(&customer)).is_ok());

        storage.inject(Fault::Commit);
        assert!(tx.commit().await.is_err());
        assert!(tx.is_open());
    }

    #[tokio::test]
    async fn test_account_gateway_not_found() {
        let storage = MemoryStorage::new();
        let gateway = MemoryAccountGateway::new(TxHandle::new(storage.begin().await.unwrap()));
        let id = Uuid::new_v4();

        let err = gateway.get_by_id(id).await.unwrap_err();
        assert!(matches!(
            err,
            StorageError::NotFound { entity: "Account", id: missing } if missing == id
        ));
    }

    #[tokio::test]
    async fn test_account_create_requires_customer() {
        let storage = MemoryStorage::new();
        let gateway = MemoryAccountGateway::new(TxHandle::new(storage.begin().await.unwrap()));
        let orphan = Account::new(&Customer::new("ghost", "ghost@example.com").unwrap());

        let err = gateway.create(&orphan).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_update_balance_rejects_negative() {
        let (storage, _, account) = seeded();
        let gateway = MemoryAccountGateway::new(TxHandle::new(storage.begin().await.unwrap()));

        let err = gateway.update_balance(account.id(), dec!(-1)).await.unwrap_err();
        assert!(matches!(err, StorageError::CorruptRecord(_)));
    }

    #[tokio::test]
    async fn test_concurrent_writer_conflicts_on_commit() {
        let (storage, _, account) = seeded();
        let mut first = storage.begin().await.unwrap();
        let mut second = storage.begin().await.unwrap();

        let mut a = first.account(account.id()).unwrap();
        let mut b = second.account(account.id()).unwrap();
        a.credit(dec!(10)).unwrap();
        b.credit(dec!(20)).unwrap();
        first.put_account(a).unwrap();
        second.put_account(b).unwrap();

        first.commit().await.unwrap();
        let err = second.commit().await.unwrap_err();

        assert!(err.is_conflict());
        assert!(matches!(
            err,
            StorageError::Conflict { entity: "Account", id } if id == account.id()
        ));
        assert_eq!(storage.account(account.id()).unwrap().balance(), dec!(10));
        second.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_read_of_stale_account_conflicts() {
        let (storage, customer, account) = seeded();
        let mut reader = storage.begin().await.unwrap();
        reader.account(account.id()).unwrap();

        let mut writer = storage.begin().await.unwrap();
        let mut updated = writer.account(account.id()).unwrap();
        updated.credit(dec!(1)).unwrap();
        writer.put_account(updated).unwrap();
        writer.commit().await.unwrap();

        // reader writes something else based on what it saw
        reader.put_account(Account::new(&customer)).unwrap();
        assert!(reader.commit().await.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn test_sequential_transactions_do_not_conflict() {
        let (storage, _, account) = seeded();

        for expected in [dec!(1), dec!(2)] {
            let mut tx = storage.begin().await.unwrap();
            let mut current = tx.account(account.id()).unwrap();
            current.credit(dec!(1)).unwrap();
            tx.put_account(current).unwrap();
            tx.commit().await.unwrap();
            assert_eq!(storage.account(account.id()).unwrap().balance(), expected);
        }
    }
}
