//! Transfer flow against in-memory storage

mod common;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use common::Harness;
use wallet_core::events::TRANSACTION_CREATED;
use wallet_core::storage::Fault;
use wallet_core::usecase::CreateTransactionCommand;
use wallet_core::{AppError, DomainError, TransactionStatus};

#[tokio::test]
async fn test_transfer_moves_funds_and_records_completed_transaction() {
    let harness = Harness::new();
    let from = harness.account(dec!(2000));
    let to = harness.account(Decimal::ZERO);

    let output = harness
        .usecase
        .execute(CreateTransactionCommand::new(from.id(), to.id(), dec!(1000)))
        .await
        .unwrap();

    assert_eq!(harness.balance(&from), dec!(1000));
    assert_eq!(harness.balance(&to), dec!(1000));
    assert_eq!(output.from_account_id, from.id());
    assert_eq!(output.to_account_id, to.id());
    assert_eq!(output.amount, dec!(1000));

    let record = harness.storage.transaction(output.id).unwrap();
    assert_eq!(record.status, TransactionStatus::Completed);
}

#[tokio::test]
async fn test_transfer_publishes_transaction_created_event() {
    let harness = Harness::new();
    let from = harness.account(dec!(300));
    let to = harness.account(dec!(5));

    let output = harness
        .usecase
        .execute(CreateTransactionCommand::new(from.id(), to.id(), dec!(120.50)))
        .await
        .unwrap();

    let delivered = harness.producer.delivered();
    assert_eq!(delivered.len(), 1);
    let event = &delivered[0];
    assert_eq!(event.name, TRANSACTION_CREATED);
    assert_eq!(event.content["id"], output.id.to_string());
    assert_eq!(event.content["from_account_id"], from.id().to_string());
    assert_eq!(event.content["to_account_id"], to.id().to_string());
    assert_eq!(event.content["amount"], "120.50");
    assert_eq!(harness.usecase.publisher().staged_count(), 0);
}

#[tokio::test]
async fn test_insufficient_funds_leaves_no_trace() {
    let harness = Harness::new();
    let from = harness.account(Decimal::ZERO);
    let to = harness.account(dec!(7));

    let err = harness
        .usecase
        .execute(CreateTransactionCommand::new(from.id(), to.id(), dec!(100)))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Domain(DomainError::InsufficientFunds { .. })));
    assert_eq!(harness.balance(&from), Decimal::ZERO);
    assert_eq!(harness.balance(&to), dec!(7));
    assert_eq!(harness.storage.transaction_count(), 0);
    assert!(harness.producer.delivered().is_empty());
}

#[tokio::test]
async fn test_invalid_amounts_rejected() {
    let harness = Harness::new();
    let from = harness.account(dec!(50));
    let to = harness.account(Decimal::ZERO);

    for amount in [Decimal::ZERO, dec!(-5)] {
        let err = harness
            .usecase
            .execute(CreateTransactionCommand::new(from.id(), to.id(), amount))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Domain(DomainError::InvalidAmount(_))));
    }
    assert_eq!(harness.balance(&from), dec!(50));
    assert_eq!(harness.storage.transaction_count(), 0);
}

#[tokio::test]
async fn test_failed_record_insert_rolls_back_balances() {
    let harness = Harness::new();
    let from = harness.account(dec!(2000));
    let to = harness.account(Decimal::ZERO);
    harness.storage.inject(Fault::WriteTransaction);

    let err = harness
        .usecase
        .execute(CreateTransactionCommand::new(from.id(), to.id(), dec!(1000)))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "injected WriteTransaction failure");
    assert_eq!(harness.balance(&from), dec!(2000));
    assert_eq!(harness.balance(&to), Decimal::ZERO);
    assert_eq!(harness.storage.transaction_count(), 0);
    assert!(harness.producer.delivered().is_empty());
}

#[tokio::test]
async fn test_failed_commit_rolls_back_balances() {
    let harness = Harness::new();
    let from = harness.account(dec!(10));
    let to = harness.account(Decimal::ZERO);
    harness.storage.inject(Fault::Commit);

    let err = harness
        .usecase
        .execute(CreateTransactionCommand::new(from.id(), to.id(), dec!(10)))
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), "transaction_error");
    assert_eq!(harness.balance(&from), dec!(10));
    assert_eq!(harness.storage.transaction_count(), 0);
}

#[tokio::test]
async fn test_failure_and_rollback_failure_both_reported() {
    let harness = Harness::new();
    let from = harness.account(dec!(10));
    let to = harness.account(Decimal::ZERO);
    harness.storage.inject(Fault::WriteTransaction);
    harness.storage.inject(Fault::Rollback);

    let err = harness
        .usecase
        .execute(CreateTransactionCommand::new(from.id(), to.id(), dec!(10)))
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "transaction error: injected WriteTransaction failure | rollback error: injected Rollback failure"
    );
    assert_eq!(err.error_code(), "rollback_failed");
    // nothing was committed either way
    assert_eq!(harness.balance(&from), dec!(10));
}

#[tokio::test]
async fn test_unknown_account_is_not_found() {
    let harness = Harness::new();
    let to = harness.account(Decimal::ZERO);

    let err = harness
        .usecase
        .execute(CreateTransactionCommand::new(Uuid::new_v4(), to.id(), dec!(1)))
        .await
        .unwrap_err();

    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_producer_failure_does_not_fail_transfer() {
    let harness = Harness::new();
    let from = harness.account(dec!(100));
    let to = harness.account(Decimal::ZERO);
    harness.producer.set_down(true);

    let output = harness
        .usecase
        .execute(CreateTransactionCommand::new(from.id(), to.id(), dec!(60)))
        .await
        .unwrap();

    assert_eq!(harness.balance(&from), dec!(40));
    assert!(harness.storage.transaction(output.id).is_some());
    assert_eq!(harness.usecase.publisher().staged_count(), 1);

    // the next publish delivers what was kept
    harness.producer.set_down(false);
    let report = harness.usecase.publisher().publish().await;
    assert!(report.is_drained());
    let delivered = harness.producer.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].content["id"], output.id.to_string());
}

#[tokio::test]
async fn test_pending_event_delivered_with_next_transfer() {
    let harness = Harness::new();
    let from = harness.account(dec!(100));
    let to = harness.account(Decimal::ZERO);

    harness.producer.set_down(true);
    harness
        .usecase
        .execute(CreateTransactionCommand::new(from.id(), to.id(), dec!(10)))
        .await
        .unwrap();
    harness.producer.set_down(false);
    harness
        .usecase
        .execute(CreateTransactionCommand::new(from.id(), to.id(), dec!(20)))
        .await
        .unwrap();

    assert_eq!(harness.producer.delivered().len(), 2);
    assert_eq!(harness.usecase.publisher().staged_count(), 0);
    assert_eq!(harness.balance(&from), dec!(70));
    assert_eq!(harness.balance(&to), dec!(30));
}

#[tokio::test]
async fn test_concurrent_transfers_on_shared_use_case() {
    let harness = std::sync::Arc::new(Harness::new());
    let pairs: Vec<_> = (0..4)
        .map(|_| (harness.account(dec!(10)), harness.account(Decimal::ZERO)))
        .collect();

    let tasks = pairs.iter().map(|(from, to)| {
        let harness = std::sync::Arc::clone(&harness);
        let command = CreateTransactionCommand::new(from.id(), to.id(), dec!(10));
        tokio::spawn(async move { harness.usecase.execute(command).await })
    });
    for result in futures::future::join_all(tasks).await {
        result.unwrap().unwrap();
    }

    for (from, to) in &pairs {
        assert_eq!(harness.balance(from), Decimal::ZERO);
        assert_eq!(harness.balance(to), dec!(10));
    }
    assert_eq!(harness.storage.transaction_count(), 4);
    assert_eq!(harness.producer.delivered().len(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_contended_pair_conserves_funds() {
    let harness = std::sync::Arc::new(Harness::new());
    let from = harness.account(dec!(100));
    let to = harness.account(Decimal::ZERO);

    let tasks = (0..50).map(|_| {
        let harness = std::sync::Arc::clone(&harness);
        let command = CreateTransactionCommand::new(from.id(), to.id(), dec!(1));
        tokio::spawn(async move { harness.usecase.execute(command).await })
    });

    let mut committed = 0usize;
    for result in futures::future::join_all(tasks).await {
        match result.unwrap() {
            Ok(_) => committed += 1,
            Err(e) => assert!(e.is_conflict(), "unexpected error: {e}"),
        }
    }

    assert!(committed > 0);
    assert_eq!(harness.balance(&from) + harness.balance(&to), dec!(100));
    assert_eq!(harness.balance(&to), Decimal::from(committed));
    assert_eq!(harness.storage.transaction_count(), committed);
}
