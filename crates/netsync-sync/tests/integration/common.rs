//! Shared fixtures for sync engine integration tests

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Once};

use netsync_core::context::{ClientContext, RetrySettings};
use netsync_core::domain::{DeleteEvent, RemotePath, SkipEvent, TransferEvent};
use netsync_core::ports::{IRemoteStorage, ISyncEventSink};
use netsync_remote::{MemoryStorage, RemoteClient};
use netsync_sync::filesystem::LocalFileSystemAdapter;
use netsync_sync::SyncEngine;
use tempfile::TempDir;

static TRACING: Once = Once::new();

/// Routes engine logs to the test harness; `RUST_LOG` overrides the default
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("netsync_sync=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

pub struct Harness {
    _dir: TempDir,
    pub local: PathBuf,
    pub storage: Arc<MemoryStorage>,
    pub engine: SyncEngine,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_storage(MemoryStorage::new())
    }

    pub fn with_storage(storage: MemoryStorage) -> Self {
        init_tracing();
        let dir = tempfile::tempdir().expect("temp dir");
        let local = dir.path().join("local");
        std::fs::create_dir_all(&local).expect("local root");

        let storage = Arc::new(storage);
        storage.add_dir("/cp/root").expect("remote root");
        let ctx = ClientContext::default().with_retry(RetrySettings {
            max_attempts: 1,
            ..RetrySettings::default()
        });
        let client = RemoteClient::new(
            Arc::clone(&storage) as Arc<dyn IRemoteStorage>,
            Arc::new(ctx),
        );
        let engine = SyncEngine::new(client, Arc::new(LocalFileSystemAdapter::new()));
        Self {
            _dir: dir,
            local,
            storage,
            engine,
        }
    }

    pub fn write_local(&self, relative: &str, content: &[u8]) -> PathBuf {
        let path = self.local.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("local parent");
        }
        std::fs::write(&path, content).expect("local write");
        path
    }

    pub fn has_local(&self, relative: &str) -> bool {
        self.local.join(relative).exists()
    }

    pub fn local_root(&self) -> &Path {
        &self.local
    }
}

pub fn remote_root() -> RemotePath {
    rp("/cp/root")
}

pub fn rp(path: &str) -> RemotePath {
    RemotePath::new(path).expect("valid remote path")
}

/// Sink recording every event as a short string
#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().expect("sink lock").clone()
    }

    fn push(&self, event: String) {
        self.events.lock().expect("sink lock").push(event);
    }
}

impl ISyncEventSink for RecordingSink {
    fn on_transfer(&self, event: &TransferEvent) {
        self.push(format!("transfer:{}:{}", event.direction, event.relative_path));
    }

    fn on_skip(&self, event: &SkipEvent) {
        self.push(format!("skip:{}:{}", event.reason.label(), event.relative_path));
    }

    fn on_delete(&self, event: &DeleteEvent) {
        self.push(format!("delete:{}:{}", event.side, event.relative_path));
    }
}

pub fn sorted(mut items: Vec<String>) -> Vec<String> {
    items.sort();
    items
}
