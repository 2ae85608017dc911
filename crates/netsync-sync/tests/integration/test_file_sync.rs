//! Single-file sync and ambiguity detection

use netsync_core::domain::{DeleteScope, Side, TransferDirection};
use netsync_sync::{SyncError, SyncOptions};

use crate::common::{rp, Harness};

#[tokio::test]
async fn test_sync_single_file_upload() {
    let h = Harness::new();
    let local = h.write_local("report.csv", b"a,b,c");

    let result = h
        .engine
        .sync_file(&local, &rp("/cp/root/report.csv"), &SyncOptions::default())
        .await
        .unwrap();

    assert_eq!(result.transferred.len(), 1);
    let event = &result.transferred[0];
    assert_eq!(event.direction, TransferDirection::Upload);
    assert_eq!(event.relative_path, "report.csv");
    assert_eq!(h.storage.contents("/cp/root/report.csv").unwrap(), b"a,b,c");
}

#[tokio::test]
async fn test_local_directory_against_remote_file_is_ambiguous() {
    let h = Harness::new();
    h.write_local("thing/inside.txt", b"x");
    h.storage.add_file("/cp/root/thing", b"file".to_vec(), 0).unwrap();

    let err = h
        .engine
        .sync_file(&h.local.join("thing"), &rp("/cp/root/thing"), &SyncOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Ambiguity { .. }));
    assert!(err.to_string().contains("local directory, remote file"));
}

#[tokio::test]
async fn test_local_file_against_remote_directory_is_ambiguous() {
    let h = Harness::new();
    let local = h.write_local("thing", b"x");
    h.storage.add_dir("/cp/root/thing").unwrap();

    let err = h
        .engine
        .sync_file(&local, &rp("/cp/root/thing"), &SyncOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Ambiguity { .. }));
}

#[tokio::test]
async fn test_remote_symlink_against_local_directory_is_ambiguous() {
    let h = Harness::new();
    h.write_local("thing/inside.txt", b"x");
    h.storage.add_symlink("/cp/root/thing", "/cp/elsewhere", 0).unwrap();

    let err = h
        .engine
        .sync_file(&h.local.join("thing"), &rp("/cp/root/thing"), &SyncOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Ambiguity { .. }));
}

#[tokio::test]
async fn test_local_directory_syncs_as_tree() {
    let h = Harness::new();
    h.write_local("project/a.txt", b"a");
    h.write_local("project/lib/b.txt", b"b");

    let result = h
        .engine
        .sync_file(&h.local.join("project"), &rp("/cp/root/project"), &SyncOptions::default())
        .await
        .unwrap();

    assert_eq!(result.transferred.len(), 2);
    assert!(h.storage.contains("/cp/root/project/lib/b.txt"));
}

#[tokio::test]
async fn test_extraneous_single_file_is_deleted() {
    let h = Harness::new();
    h.storage.add_file("/cp/root/gone.txt", b"old".to_vec(), 0).unwrap();
    let options = SyncOptions {
        delete_extraneous: DeleteScope::Remote,
        ..SyncOptions::default()
    };

    let result = h
        .engine
        .sync_file(&h.local.join("gone.txt"), &rp("/cp/root/gone.txt"), &options)
        .await
        .unwrap();

    assert_eq!(result.deleted.len(), 1);
    assert_eq!(result.deleted[0].side, Side::Remote);
    assert_eq!(result.deleted[0].path, "/cp/root/gone.txt");
    assert!(result.transferred.is_empty());
    assert!(!h.storage.contains("/cp/root/gone.txt"));
}
