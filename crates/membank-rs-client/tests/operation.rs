//! Waiting on long-running operations.

use membank_rs_client::{
    CreateMemory, GenerateMemories, MemoryBankClient, MemoryBankError, PollOptions,
};
use membank_rs_protocol::{Content, EngineName, LocationName, user_scope};
use membank_rs_test_utils::InMemoryBank;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn fast_polling() -> PollOptions {
    PollOptions {
        initial_interval: Duration::from_millis(1),
        max_interval: Duration::from_millis(5),
        multiplier: 2.0,
        timeout: Duration::from_secs(5),
    }
}

fn setup() -> (Arc<InMemoryBank>, MemoryBankClient, EngineName) {
    let bank = Arc::new(InMemoryBank::new());
    let engine = bank.seed_engine(&LocationName::new("test-project", "us-central1"));
    let client = MemoryBankClient::new(bank.clone()).with_poll_options(fast_polling());
    (bank, client, engine)
}

/// Finished operations resolve without polling.
#[tokio::test]
async fn done_operations_skip_polling() {
    let (bank, client, engine) = setup();
    client
        .create_memory(&engine, CreateMemory::new("Likes tea", user_scope("u1")))
        .await
        .expect("create");
    assert_eq!(bank.operation_polls(), 0);
}

/// The poller keeps asking until the operation reports done.
#[tokio::test]
async fn polls_until_done() {
    let (bank, client, engine) = setup();
    bank.set_pending_polls(3);
    let memory = client
        .create_memory(&engine, CreateMemory::new("Likes tea", user_scope("u1")))
        .await
        .expect("create");
    assert_eq!(memory.fact, "Likes tea");
    assert_eq!(bank.operation_polls(), 3);
}

/// A wait that outlives its budget times out; the remote work still happened.
#[tokio::test]
async fn wait_times_out() {
    let (bank, client, engine) = setup();
    bank.set_pending_polls(usize::MAX);
    let pending = client
        .generate_memories(
            &engine,
            GenerateMemories::from_contents([Content::user_text("I like tea")], user_scope("u1")),
        )
        .await
        .expect("start");
    assert!(!pending.is_done());

    let err = pending
        .with_options(fast_polling().with_timeout(Duration::from_millis(30)))
        .wait()
        .await
        .unwrap_err();
    assert!(matches!(err, MemoryBankError::Timeout(_)));
    assert!(bank.operation_polls() > 0);
    assert_eq!(bank.memories().len(), 1);
}

/// Cancelling stops the wait with a dedicated error.
#[tokio::test]
async fn wait_can_be_cancelled() {
    let (bank, client, engine) = setup();
    bank.set_pending_polls(usize::MAX);
    let pending = client
        .generate_memories(
            &engine,
            GenerateMemories::from_contents([Content::user_text("I like tea")], user_scope("u1")),
        )
        .await
        .expect("start");
    let name = pending.name().to_string();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });
    let err = pending.wait_with_cancel(&cancel).await.unwrap_err();
    match err {
        MemoryBankError::Cancelled(operation) => assert_eq!(operation, name),
        other => panic!("unexpected error: {other}"),
    }
}

/// Operation errors map to `MemoryBankError::Operation`.
#[tokio::test]
async fn failed_operation_surfaces_status() {
    let (bank, client, engine) = setup();
    bank.fail_next_operation(13, "internal failure");
    let err = client
        .create_memory(&engine, CreateMemory::new("Likes tea", user_scope("u1")))
        .await
        .unwrap_err();
    match err {
        MemoryBankError::Operation { code, message } => {
            assert_eq!(code, 13);
            assert_eq!(message, "internal failure");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(bank.memories().is_empty());
}
