//! Directory sync: idempotence, concurrency bound, deletion, failures

use std::sync::Arc;
use std::time::Duration;

use netsync_conflict::{ConflictRule, ConflictRules};
use netsync_core::domain::{
    CompareStrategy, ConflictAction, ConflictResolution, DeleteScope, Direction, FileMeta,
    LocalEntry, RemoteEntry, RemoteError, Side, SkipReason, TransferDirection,
};
use netsync_remote::MemoryStorage;
use netsync_sync::SyncOptions;

use crate::common::{remote_root, rp, sorted, Harness, RecordingSink};

#[tokio::test]
async fn test_second_run_transfers_nothing() {
    let h = Harness::new();
    h.write_local("a.txt", b"alpha");
    h.write_local("nested/b.txt", b"bravo!");
    h.write_local("nested/inner/c.txt", b"c");
    let options = SyncOptions::default();

    let first = h
        .engine
        .sync_directory(h.local_root(), &remote_root(), &options)
        .await
        .unwrap();
    assert_eq!(first.transferred.len(), 3);
    assert_eq!(first.bytes_transferred(), 12);
    assert_eq!(h.storage.contents("/cp/root/nested/b.txt").unwrap(), b"bravo!");
    assert!(h.storage.meta("/cp/root/nested/inner").unwrap().is_dir());

    let second = h
        .engine
        .sync_directory(h.local_root(), &remote_root(), &options)
        .await
        .unwrap();
    assert!(second.transferred.is_empty());
    assert_eq!(second.skipped.len(), 3);
    assert!(second
        .skipped
        .iter()
        .all(|s| matches!(s.reason, SkipReason::Compare(CompareStrategy::Size))));
}

#[tokio::test]
async fn test_concurrency_is_bounded() {
    let h = Harness::with_storage(MemoryStorage::new().with_latency(Duration::from_millis(15)));
    for i in 0..10 {
        h.write_local(&format!("file-{i:02}.bin"), &[i as u8; 8]);
    }
    let options = SyncOptions {
        max_concurrency: 2,
        ..SyncOptions::default()
    };

    h.storage.reset_counters();
    let result = h
        .engine
        .sync_directory(h.local_root(), &remote_root(), &options)
        .await
        .unwrap();

    assert_eq!(result.transferred.len(), 10);
    assert_eq!(h.storage.max_in_flight(), 2);
}

#[tokio::test]
async fn test_zero_concurrency_still_runs() {
    let h = Harness::new();
    h.write_local("only.txt", b"x");
    let options = SyncOptions {
        max_concurrency: 0,
        ..SyncOptions::default()
    };

    let result = h
        .engine
        .sync_directory(h.local_root(), &remote_root(), &options)
        .await
        .unwrap();
    assert_eq!(result.transferred.len(), 1);
}

#[tokio::test]
async fn test_delete_extraneous_both_sides() {
    let h = Harness::new();
    let a = h.write_local("a", b"a");
    let b = h.write_local("b", b"b");
    h.storage.add_file("/cp/root/b", b"b".to_vec(), 0).unwrap();
    h.storage.add_file("/cp/root/c", b"c".to_vec(), 0).unwrap();

    let local_entries = vec![
        LocalEntry {
            local_path: a,
            relative_path: "a".into(),
            is_directory: false,
        },
        LocalEntry {
            local_path: b,
            relative_path: "b".into(),
            is_directory: false,
        },
    ];
    let remote_entries: Vec<RemoteEntry> = ["b", "c"]
        .iter()
        .map(|name| RemoteEntry {
            path: remote_root().join(name).unwrap(),
            parent: remote_root(),
            relative_path: name.to_string(),
            depth: 0,
            file: FileMeta::file(*name, 1, 0),
        })
        .collect();

    let result = h
        .engine
        .delete_extraneous(
            DeleteScope::Both,
            h.local_root(),
            &remote_root(),
            &local_entries,
            &remote_entries,
            false,
            None,
        )
        .await;

    assert!(result.skipped.is_empty());
    let deleted: Vec<(Side, &str)> = result
        .deleted
        .iter()
        .map(|e| (e.side, e.relative_path.as_str()))
        .collect();
    assert_eq!(deleted, vec![(Side::Remote, "c"), (Side::Local, "a")]);
    assert!(!h.storage.contains("/cp/root/c"));
    assert!(h.storage.contains("/cp/root/b"));
    assert!(!h.has_local("a"));
    assert!(h.has_local("b"));
}

#[tokio::test]
async fn test_delete_scope_none_is_noop() {
    let h = Harness::new();
    let remote_entries = vec![RemoteEntry {
        path: rp("/cp/root/c"),
        parent: remote_root(),
        relative_path: "c".into(),
        depth: 0,
        file: FileMeta::file("c", 1, 0),
    }];

    let result = h
        .engine
        .delete_extraneous(
            DeleteScope::None,
            h.local_root(),
            &remote_root(),
            &[],
            &remote_entries,
            false,
            None,
        )
        .await;
    assert!(result.is_empty());
}

#[tokio::test]
async fn test_remote_directories_deleted_after_contents() {
    let h = Harness::new();
    h.storage.add_file("/cp/root/old/deeper/x.txt", b"x".to_vec(), 0).unwrap();
    h.storage.add_file("/cp/root/old/y.txt", b"y".to_vec(), 0).unwrap();
    h.write_local("keep.txt", b"k");
    let sink = Arc::new(RecordingSink::default());
    let options = SyncOptions {
        delete_extraneous: DeleteScope::Remote,
        ..SyncOptions::default()
    }
    .with_events(sink.clone());

    let result = h
        .engine
        .sync_directory(h.local_root(), &remote_root(), &options)
        .await
        .unwrap();

    let order: Vec<&str> = result.deleted.iter().map(|e| e.relative_path.as_str()).collect();
    assert_eq!(order, vec!["old/deeper/x.txt", "old/y.txt", "old/deeper", "old"]);
    assert!(!h.storage.contains("/cp/root/old"));
    assert_eq!(result.transferred.len(), 1);
    // deleted paths are not evaluated for transfer
    assert!(result.skipped.is_empty());
    assert_eq!(
        sorted(sink.events()),
        vec![
            "delete:remote:old",
            "delete:remote:old/deeper",
            "delete:remote:old/deeper/x.txt",
            "delete:remote:old/y.txt",
            "transfer:upload:keep.txt",
        ]
    );
}

#[tokio::test]
async fn test_local_directory_removed_once() {
    let h = Harness::new();
    h.write_local("stale/a.txt", b"a");
    h.write_local("stale/sub/b.txt", b"b");
    let options = SyncOptions {
        direction: Direction::Download,
        conflict_resolution: ConflictResolution::PreferRemote,
        delete_extraneous: DeleteScope::Local,
        ..SyncOptions::default()
    };

    let result = h
        .engine
        .sync_directory(h.local_root(), &remote_root(), &options)
        .await
        .unwrap();

    assert!(!h.has_local("stale"));
    assert!(result.deleted.iter().all(|e| e.side == Side::Local));
    assert_eq!(result.deleted.len(), 4);
    assert!(result.skipped.is_empty());
}

#[tokio::test]
async fn test_failed_entry_does_not_abort() {
    let h = Harness::new();
    h.write_local("good-1.txt", b"1");
    h.write_local("bad.txt", b"2");
    h.write_local("good-2.txt", b"3");
    h.storage.fail_next(
        "/cp/root/bad.txt",
        RemoteError::Status {
            code: 403,
            message: "forbidden".into(),
        },
    );
    let sink = Arc::new(RecordingSink::default());
    let options = SyncOptions::default().with_events(sink.clone());

    let result = h
        .engine
        .sync_directory(h.local_root(), &remote_root(), &options)
        .await
        .unwrap();

    assert_eq!(result.transferred.len(), 2);
    let errors: Vec<_> = result.errors().collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].relative_path, "bad.txt");
    assert!(errors[0].reason.to_string().contains("403"));
    assert!(sink.events().contains(&"skip:error:bad.txt".to_string()));
    assert!(h.storage.contains("/cp/root/good-1.txt"));
    assert!(!h.storage.contains("/cp/root/bad.txt"));
}

#[tokio::test]
async fn test_failed_deletion_does_not_abort() {
    let h = Harness::new();
    h.write_local("keep.txt", b"k");
    h.storage.add_file("/cp/root/stale-a.txt", b"a".to_vec(), 0).unwrap();
    h.storage.add_file("/cp/root/stale-b.txt", b"b".to_vec(), 0).unwrap();
    h.storage.fail_next(
        "/cp/root/stale-b.txt",
        RemoteError::Status {
            code: 403,
            message: "forbidden".into(),
        },
    );
    let sink = Arc::new(RecordingSink::default());
    let options = SyncOptions {
        delete_extraneous: DeleteScope::Remote,
        ..SyncOptions::default()
    }
    .with_events(sink.clone());

    let result = h
        .engine
        .sync_directory(h.local_root(), &remote_root(), &options)
        .await
        .unwrap();

    let deleted: Vec<&str> = result.deleted.iter().map(|e| e.relative_path.as_str()).collect();
    assert_eq!(deleted, vec!["stale-a.txt"]);
    let transferred: Vec<&str> = result
        .transferred
        .iter()
        .map(|t| t.relative_path.as_str())
        .collect();
    assert_eq!(transferred, vec!["keep.txt"]);
    let errors: Vec<_> = result.errors().collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].relative_path, "stale-b.txt");
    assert!(errors[0].reason.to_string().contains("403"));
    // the failed path is not evaluated a second time
    assert_eq!(result.skipped.len(), 1);

    assert!(!h.storage.contains("/cp/root/stale-a.txt"));
    assert!(h.storage.contains("/cp/root/stale-b.txt"));
    assert!(h.storage.contains("/cp/root/keep.txt"));
    assert_eq!(
        sorted(sink.events()),
        vec![
            "delete:remote:stale-a.txt",
            "skip:error:stale-b.txt",
            "transfer:upload:keep.txt",
        ]
    );
}

#[tokio::test]
async fn test_dry_run_changes_nothing() {
    let h = Harness::new();
    h.write_local("local-only.txt", b"l");
    h.storage.add_file("/cp/root/remote-only.txt", b"r".to_vec(), 0).unwrap();
    let options = SyncOptions {
        dry_run: true,
        delete_extraneous: DeleteScope::Remote,
        ..SyncOptions::default()
    };

    let result = h
        .engine
        .sync_directory(h.local_root(), &remote_root(), &options)
        .await
        .unwrap();

    assert_eq!(result.deleted.len(), 1);
    assert!(result.deleted[0].dry_run);
    assert_eq!(result.transferred.len(), 1);
    assert!(result.transferred[0].dry_run);
    assert!(h.storage.contains("/cp/root/remote-only.txt"));
    assert!(!h.storage.contains("/cp/root/local-only.txt"));
}

#[tokio::test]
async fn test_download_materializes_tree() {
    let h = Harness::new();
    h.storage.add_file("/cp/root/a.txt", b"alpha".to_vec(), 0).unwrap();
    h.storage.add_file("/cp/root/nested/inner/c.txt", b"charlie".to_vec(), 0).unwrap();
    h.storage.add_symlink("/cp/root/link", "/cp/root/a.txt", 0).unwrap();
    let options = SyncOptions {
        direction: Direction::Download,
        conflict_resolution: ConflictResolution::PreferRemote,
        ..SyncOptions::default()
    };

    let result = h
        .engine
        .sync_directory(h.local_root(), &remote_root(), &options)
        .await
        .unwrap();

    assert_eq!(result.transferred.len(), 2);
    assert!(result
        .transferred
        .iter()
        .all(|t| t.direction == TransferDirection::Download));
    assert_eq!(
        std::fs::read(h.local.join("nested/inner/c.txt")).unwrap(),
        b"charlie"
    );
    let skipped: Vec<_> = result.skipped.iter().map(|s| s.reason.label()).collect();
    assert_eq!(skipped, vec!["symlink"]);
    assert!(!h.has_local("link"));
}

#[tokio::test]
async fn test_conflict_rules_gate_transfers() {
    let h = Harness::new();
    h.write_local("debug.log", b"log");
    h.write_local("docs/notes.txt", b"notes");
    h.write_local("image.png", b"png");
    let rules = ConflictRules::new(&[
        ConflictRule::new("*.log", ConflictAction::Skip),
        ConflictRule::new("**/*.txt", ConflictAction::Upload),
    ])
    .unwrap();
    let options = SyncOptions {
        conflict_resolution: ConflictResolution::Manual,
        conflict_rules: Some(rules),
        ..SyncOptions::default()
    };

    let result = h
        .engine
        .sync_directory(h.local_root(), &remote_root(), &options)
        .await
        .unwrap();

    let transferred: Vec<_> = result
        .transferred
        .iter()
        .map(|t| t.relative_path.as_str())
        .collect();
    assert_eq!(transferred, vec!["docs/notes.txt"]);
    let mut skipped: Vec<_> = result
        .skipped
        .iter()
        .map(|s| (s.relative_path.as_str(), s.reason.label()))
        .collect();
    skipped.sort();
    assert_eq!(
        skipped,
        vec![
            ("debug.log", "conflictRules skip"),
            ("image.png", "conflictRules skip"),
        ]
    );
}

#[tokio::test]
async fn test_ignored_paths_are_pruned() {
    let h = Harness::new();
    h.write_local(".git/HEAD", b"ref");
    h.write_local("src/main.rs", b"fn main() {}");
    let options = SyncOptions {
        ignore: vec![".git".into()],
        ..SyncOptions::default()
    };

    let result = h
        .engine
        .sync_directory(h.local_root(), &remote_root(), &options)
        .await
        .unwrap();

    assert_eq!(result.transferred.len(), 1);
    assert!(!h.storage.contains("/cp/root/.git"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_followed_alias_keeps_real_remote_tree() {
    let h = Harness::new();
    h.write_local("real/x.txt", b"x");
    std::os::unix::fs::symlink(h.local.join("real"), h.local.join("alias")).unwrap();
    h.storage.add_file("/cp/root/real/x.txt", b"x".to_vec(), 0).unwrap();
    let options = SyncOptions {
        follow_symlinks: true,
        delete_extraneous: DeleteScope::Remote,
        ..SyncOptions::default()
    };

    let result = h
        .engine
        .sync_directory(h.local_root(), &remote_root(), &options)
        .await
        .unwrap();

    assert!(result.deleted.is_empty());
    assert!(result.errors().next().is_none());
    assert!(h.storage.contains("/cp/root/real/x.txt"));
    assert!(h.storage.contains("/cp/root/alias/x.txt"));
}

#[tokio::test]
async fn test_missing_remote_root_is_created() {
    let h = Harness::new();
    h.write_local("nested/a.txt", b"a");

    let result = h
        .engine
        .sync_directory(h.local_root(), &rp("/cp/fresh"), &SyncOptions::default())
        .await
        .unwrap();

    assert_eq!(result.transferred.len(), 1);
    assert!(h.storage.meta("/cp/fresh/nested").unwrap().is_dir());
    assert!(h.storage.contains("/cp/fresh/nested/a.txt"));
}

#[tokio::test]
async fn test_remote_walk_failure_is_fatal() {
    let h = Harness::new();
    h.storage.add_dir("/cp/root/locked").unwrap();
    h.storage.fail_next(
        "/cp/root/locked",
        RemoteError::Status {
            code: 403,
            message: "denied".into(),
        },
    );

    let err = h
        .engine
        .sync_directory(h.local_root(), &remote_root(), &SyncOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        netsync_sync::SyncError::Remote(RemoteError::Status { code: 403, .. })
    ));
}
