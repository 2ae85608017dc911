//! RemoteClient pipeline tests: retry, rate limit, cancellation, transfers

use std::sync::Arc;
use std::time::Duration;

use netsync_core::context::ClientContext;
use netsync_core::domain::RemoteError;
use netsync_remote::MemoryStorage;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::common::{client_for, client_with, rp, test_retry, tight_rate_limit};

#[tokio::test(start_paused = true)]
async fn retries_wait_for_backoff() {
    let storage = Arc::new(MemoryStorage::new());
    storage.add_dir("/cp").unwrap();
    storage.fail_next("/cp", RemoteError::Transient("reset".into()));
    storage.fail_next("/cp", RemoteError::Transient("reset".into()));

    let client = client_for(&storage);
    let start = Instant::now();
    client.list(&rp("/cp")).await.unwrap();

    // 100ms + 200ms of backoff
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(300), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(400), "elapsed {elapsed:?}");
    assert_eq!(storage.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_surface_last_error() {
    let storage = Arc::new(MemoryStorage::new());
    storage.add_dir("/cp").unwrap();
    for n in 1..=3 {
        storage.fail_next("/cp", RemoteError::Transient(format!("attempt {n}")));
    }

    let client = client_for(&storage);
    let err = client.list(&rp("/cp")).await.unwrap_err();
    assert_eq!(err.to_string(), "transient remote failure: attempt 3");
}

#[tokio::test(start_paused = true)]
async fn rate_limit_spaces_out_requests() {
    let storage = Arc::new(MemoryStorage::new());
    storage.add_dir("/cp").unwrap();

    let ctx = ClientContext::default()
        .with_retry(test_retry())
        .with_rate_limit(tight_rate_limit());
    let client = client_with(&storage, ctx);

    let start = Instant::now();
    for _ in 0..4 {
        client.list(&rp("/cp")).await.unwrap();
    }
    // two tokens up front, then one every 250ms
    assert!(start.elapsed() >= Duration::from_millis(500));
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_in_flight_call() {
    let storage = Arc::new(MemoryStorage::new().with_latency(Duration::from_secs(10)));
    storage.add_dir("/cp").unwrap();

    let token = CancellationToken::new();
    let ctx = ClientContext::default()
        .with_retry(test_retry())
        .with_cancellation(token.clone());
    let client = client_with(&storage, ctx);

    let handle = tokio::spawn(async move { client.list(&rp("/cp")).await });
    tokio::time::sleep(Duration::from_millis(100)).await;
    token.cancel();

    let err = handle.await.unwrap().unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(storage.call_count(), 1);
    assert_eq!(storage.in_flight(), 0);
}

#[tokio::test]
async fn upload_then_stamp_mtime_then_download() {
    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("index.html");
    tokio::fs::write(&src, b"<html></html>").await.unwrap();

    let storage = Arc::new(MemoryStorage::new());
    let client = client_for(&storage);

    client.ensure_directory(&rp("/cp/site")).await.unwrap();
    client
        .upload_file(&src, &rp("/cp/site/index.html"))
        .await
        .unwrap();
    client
        .set_modification_time(&rp("/cp/site/index.html"), 1_600_000_000)
        .await
        .unwrap();

    let meta = client
        .get_metadata(&rp("/cp/site/index.html"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(meta.size, Some(13));
    assert_eq!(meta.mtime, 1_600_000_000);

    let dst = tmp.path().join("copy.html");
    client
        .download_file(&rp("/cp/site/index.html"), &dst)
        .await
        .unwrap();
    assert_eq!(tokio::fs::read(&dst).await.unwrap(), b"<html></html>");
}

#[tokio::test]
async fn symlink_and_delete_primitives() {
    let storage = Arc::new(MemoryStorage::new());
    storage.add_file("/cp/a.txt", "a", 0).unwrap();
    let client = client_for(&storage);

    client
        .create_symlink("/cp/a.txt", &rp("/cp/link"))
        .await
        .unwrap();
    assert!(storage.meta("/cp/link").unwrap().is_symlink());

    client.delete_file(&rp("/cp/link")).await.unwrap();
    client.make_directory(&rp("/cp/empty")).await.unwrap();
    client.delete_directory(&rp("/cp/empty")).await.unwrap();
    assert_eq!(storage.paths(), vec!["/cp".to_string(), "/cp/a.txt".to_string()]);

    let err = client.delete_directory(&rp("/")).await.unwrap_err();
    assert!(matches!(err, RemoteError::Validation(_)));
}
