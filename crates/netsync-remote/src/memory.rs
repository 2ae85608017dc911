//! In-memory remote storage adapter
//!
//! [`MemoryStorage`] implements [`IRemoteStorage`] over an in-process tree.
//! It follows the service's observable behavior closely enough to drive the
//! sync engine end to end: parents must exist for mkdir/upload/symlink,
//! directories must be empty before removal, and listings come back in name
//! order.
//!
//! Instrumentation for tests:
//! - optional per-call latency
//! - current and maximum number of calls in flight
//! - queued failures per path, consumed one per call

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use md5::{Digest, Md5};
use tracing::trace;

use netsync_core::domain::{DomainError, FileKind, FileMeta, RemoteError, RemotePath};
use netsync_core::ports::{IRemoteStorage, ListResponse, OpStatus};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone)]
struct Node {
    meta: FileMeta,
    content: Vec<u8>,
}

/// In-process remote tree
#[derive(Debug, Default)]
pub struct MemoryStorage {
    nodes: Mutex<BTreeMap<RemotePath, Node>>,
    failures: Mutex<HashMap<RemotePath, VecDeque<RemoteError>>>,
    latency: Option<Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Decrements the in-flight counter when the call finishes or is dropped
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every call by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    // ========================================================================
    // Fixtures
    // ========================================================================

    /// Inserts a directory, creating missing ancestors
    pub fn add_dir(&self, path: &str) -> Result<(), DomainError> {
        let path = RemotePath::new(path)?;
        let mut nodes = lock(&self.nodes);
        Self::insert_ancestors(&mut nodes, &path);
        if !path.is_root() {
            let name = path.file_name().unwrap_or_default().to_string();
            nodes.entry(path).or_insert(Node {
                meta: FileMeta::dir(name, 0),
                content: Vec::new(),
            });
        }
        Ok(())
    }

    /// Inserts a file with `content`, creating missing ancestors
    pub fn add_file(
        &self,
        path: &str,
        content: impl Into<Vec<u8>>,
        mtime: i64,
    ) -> Result<(), DomainError> {
        let path = RemotePath::new(path)?;
        let content = content.into();
        let name = Self::name_of(&path)?;
        let meta = FileMeta::file(name, content.len() as u64, mtime).with_md5(md5_hex(&content));

        let mut nodes = lock(&self.nodes);
        Self::insert_ancestors(&mut nodes, &path);
        nodes.insert(path, Node { meta, content });
        Ok(())
    }

    /// Inserts a file whose metadata is given verbatim (e.g. without a size)
    pub fn add_meta(&self, path: &str, meta: FileMeta) -> Result<(), DomainError> {
        let path = RemotePath::new(path)?;
        let mut nodes = lock(&self.nodes);
        Self::insert_ancestors(&mut nodes, &path);
        nodes.insert(
            path,
            Node {
                meta,
                content: Vec::new(),
            },
        );
        Ok(())
    }

    /// Inserts a symlink, creating missing ancestors
    pub fn add_symlink(&self, path: &str, target: &str, mtime: i64) -> Result<(), DomainError> {
        let path = RemotePath::new(path)?;
        let name = Self::name_of(&path)?;
        let mut nodes = lock(&self.nodes);
        Self::insert_ancestors(&mut nodes, &path);
        nodes.insert(
            path,
            Node {
                meta: FileMeta::symlink(name, target, mtime),
                content: Vec::new(),
            },
        );
        Ok(())
    }

    /// Queues `err` to be returned by the next call addressing `path`
    pub fn fail_next(&self, path: &str, err: RemoteError) {
        if let Ok(path) = RemotePath::new(path) {
            lock(&self.failures).entry(path).or_default().push_back(err);
        }
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    pub fn meta(&self, path: &str) -> Option<FileMeta> {
        let path = RemotePath::new(path).ok()?;
        lock(&self.nodes).get(&path).map(|node| node.meta.clone())
    }

    pub fn contents(&self, path: &str) -> Option<Vec<u8>> {
        let path = RemotePath::new(path).ok()?;
        lock(&self.nodes)
            .get(&path)
            .filter(|node| node.meta.is_file())
            .map(|node| node.content.clone())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.meta(path).is_some()
    }

    /// All stored paths in sorted order
    pub fn paths(&self) -> Vec<String> {
        lock(&self.nodes)
            .keys()
            .map(|p| p.as_str().to_string())
            .collect()
    }

    /// Number of port calls made so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of calls observed in flight at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn reset_counters(&self) {
        self.calls.store(0, Ordering::SeqCst);
        self.max_in_flight.store(self.in_flight(), Ordering::SeqCst);
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn name_of(path: &RemotePath) -> Result<String, DomainError> {
        path.file_name()
            .map(str::to_string)
            .ok_or_else(|| DomainError::InvalidRemotePath("the root has no name".into()))
    }

    fn insert_ancestors(nodes: &mut BTreeMap<RemotePath, Node>, path: &RemotePath) {
        let mut cursor = path.parent();
        while let Some(dir) = cursor {
            if dir.is_root() {
                break;
            }
            cursor = dir.parent();
            let name = dir.file_name().unwrap_or_default().to_string();
            nodes.entry(dir).or_insert(Node {
                meta: FileMeta::dir(name, 0),
                content: Vec::new(),
            });
        }
    }

    /// Bookkeeping shared by every port call
    async fn enter(&self, op: &str, path: &RemotePath) -> Result<InFlight<'_>, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let guard = InFlight(&self.in_flight);
        trace!(op, path = %path, in_flight = now, "memory storage call");

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let injected = lock(&self.failures)
            .get_mut(path)
            .and_then(VecDeque::pop_front);
        match injected {
            Some(err) => Err(err),
            None => Ok(guard),
        }
    }

    fn is_dir(nodes: &BTreeMap<RemotePath, Node>, path: &RemotePath) -> bool {
        path.is_root() || nodes.get(path).is_some_and(|n| n.meta.is_dir())
    }

    fn require_parent(
        nodes: &BTreeMap<RemotePath, Node>,
        path: &RemotePath,
    ) -> Result<(), RemoteError> {
        let parent = path.parent().unwrap_or_else(RemotePath::root);
        if Self::is_dir(nodes, &parent) {
            Ok(())
        } else {
            Err(RemoteError::NotFound(parent.to_string()))
        }
    }

    fn children<'a>(
        nodes: &'a BTreeMap<RemotePath, Node>,
        dir: &'a RemotePath,
    ) -> impl Iterator<Item = &'a Node> + 'a {
        nodes
            .iter()
            .filter(move |(path, _)| path.parent().as_ref() == Some(dir))
            .map(|(_, node)| node)
    }

    fn conflict(message: impl Into<String>) -> RemoteError {
        RemoteError::Status {
            code: 409,
            message: message.into(),
        }
    }
}

fn md5_hex(content: &[u8]) -> String {
    hex::encode(Md5::digest(content))
}

fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

#[async_trait::async_trait]
impl IRemoteStorage for MemoryStorage {
    async fn list(&self, path: &RemotePath) -> Result<ListResponse, RemoteError> {
        let _guard = self.enter("list", path).await?;
        let nodes = lock(&self.nodes);
        if !Self::is_dir(&nodes, path) {
            return Err(RemoteError::NotFound(path.to_string()));
        }
        let directory_entries = Self::children(&nodes, path)
            .map(|node| node.meta.clone())
            .collect();
        Ok(ListResponse { directory_entries })
    }

    async fn get_metadata(&self, path: &RemotePath) -> Result<Option<FileMeta>, RemoteError> {
        let _guard = self.enter("stat", path).await?;
        if path.is_root() {
            return Ok(Some(FileMeta::dir("", 0)));
        }
        Ok(lock(&self.nodes).get(path).map(|node| node.meta.clone()))
    }

    async fn upload_file(
        &self,
        local_path: &Path,
        remote_path: &RemotePath,
    ) -> Result<OpStatus, RemoteError> {
        let _guard = self.enter("upload", remote_path).await?;
        let content = tokio::fs::read(local_path).await?;

        let mut nodes = lock(&self.nodes);
        Self::require_parent(&nodes, remote_path)?;
        if Self::is_dir(&nodes, remote_path) {
            return Err(Self::conflict(format!("{remote_path} is a directory")));
        }
        let name = Self::name_of(remote_path)?;
        let meta =
            FileMeta::file(name, content.len() as u64, now_secs()).with_md5(md5_hex(&content));
        nodes.insert(remote_path.clone(), Node { meta, content });
        Ok(OpStatus::OK)
    }

    async fn download_file(
        &self,
        remote_path: &RemotePath,
        local_path: &Path,
    ) -> Result<OpStatus, RemoteError> {
        let _guard = self.enter("download", remote_path).await?;
        let content = {
            let nodes = lock(&self.nodes);
            match nodes.get(remote_path) {
                Some(node) if node.meta.is_file() => node.content.clone(),
                Some(node) => {
                    return Err(Self::conflict(format!(
                        "{remote_path} is a {}",
                        node.meta.kind
                    )))
                }
                None => return Err(RemoteError::NotFound(remote_path.to_string())),
            }
        };
        tokio::fs::write(local_path, content).await?;
        Ok(OpStatus::OK)
    }

    async fn delete_file(&self, path: &RemotePath) -> Result<OpStatus, RemoteError> {
        let _guard = self.enter("delete", path).await?;
        let mut nodes = lock(&self.nodes);
        match nodes.get(path).map(|node| node.meta.kind) {
            Some(FileKind::Dir) => Err(Self::conflict(format!("{path} is a directory"))),
            Some(_) => {
                nodes.remove(path);
                Ok(OpStatus::OK)
            }
            None => Err(RemoteError::NotFound(path.to_string())),
        }
    }

    async fn delete_directory(&self, path: &RemotePath) -> Result<OpStatus, RemoteError> {
        let _guard = self.enter("rmdir", path).await?;
        let mut nodes = lock(&self.nodes);
        match nodes.get(path).map(|node| node.meta.kind) {
            Some(FileKind::Dir) => {
                if Self::children(&nodes, path).next().is_some() {
                    return Err(Self::conflict(format!("{path} is not empty")));
                }
                nodes.remove(path);
                Ok(OpStatus::OK)
            }
            Some(_) => Err(Self::conflict(format!("{path} is not a directory"))),
            None => Err(RemoteError::NotFound(path.to_string())),
        }
    }

    async fn make_directory(&self, path: &RemotePath) -> Result<OpStatus, RemoteError> {
        let _guard = self.enter("mkdir", path).await?;
        let mut nodes = lock(&self.nodes);
        Self::require_parent(&nodes, path)?;
        if nodes.contains_key(path) {
            return Err(Self::conflict(format!("{path} already exists")));
        }
        let name = Self::name_of(path)?;
        nodes.insert(
            path.clone(),
            Node {
                meta: FileMeta::dir(name, now_secs()),
                content: Vec::new(),
            },
        );
        Ok(OpStatus::OK)
    }

    async fn create_symlink(
        &self,
        target: &str,
        link_path: &RemotePath,
    ) -> Result<OpStatus, RemoteError> {
        let _guard = self.enter("symlink", link_path).await?;
        let mut nodes = lock(&self.nodes);
        Self::require_parent(&nodes, link_path)?;
        let name = Self::name_of(link_path)?;
        nodes.insert(
            link_path.clone(),
            Node {
                meta: FileMeta::symlink(name, target, now_secs()),
                content: Vec::new(),
            },
        );
        Ok(OpStatus::OK)
    }

    async fn set_modification_time(
        &self,
        path: &RemotePath,
        unix_seconds: i64,
    ) -> Result<OpStatus, RemoteError> {
        let _guard = self.enter("mtime", path).await?;
        let mut nodes = lock(&self.nodes);
        match nodes.get_mut(path) {
            Some(node) => {
                node.meta.mtime = unix_seconds;
                Ok(OpStatus::OK)
            }
            None => Err(RemoteError::NotFound(path.to_string())),
        }
    }
}
