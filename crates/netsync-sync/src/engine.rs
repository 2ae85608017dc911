//! Sync orchestration
//!
//! The [`SyncEngine`] brings a local tree and a remote tree in line according
//! to a [`SyncOptions`] set: direction, compare strategy, conflict policy and
//! extraneous deletion.
//!
//! ## Sync Flow (directory)
//!
//! 1. **Walk**: materialize the remote walk and the local walk. A walk error
//!    is fatal.
//! 2. **Delete**: remove extraneous entries from the configured side(s). A
//!    failed deletion becomes a skip event and the call carries on.
//! 3. **Evaluate**: every non-directory relative path becomes an independent
//!    task. Tasks are gated by a semaphore scoped to the call.
//! 4. **Collect**: task outcomes are appended into one [`SyncResult`]. A
//!    failed or panicked task becomes a skip event with an `error` reason.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn, Instrument};

use netsync_conflict::{is_transfer_allowed, resolve_action, ConflictError, ConflictRules};
use netsync_core::config::SyncConfig;
use netsync_core::domain::{
    CompareStrategy, ConflictAction, ConflictResolution, DeleteEvent, DeleteScope, Direction,
    EntryOutcome, FileMeta, LocalEntry, RemoteEntry, RemotePath, Side, SkipEvent, SkipReason,
    SyncResult, TransferDirection, TransferEvent,
};
use netsync_core::ports::{ILocalFileSystem, ISyncEventSink};
use netsync_remote::RemoteClient;

use crate::compare::needs_transfer;
use crate::local_walker::{self, LocalWalkOptions};
use crate::remote_walker::{self, WalkOptions};
use crate::{Result, SyncError};

/// Default number of per-entry tasks in flight
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;

// ============================================================================
// SyncOptions
// ============================================================================

/// Per-call sync settings
#[derive(Clone)]
pub struct SyncOptions {
    pub direction: Direction,
    pub compare_strategy: CompareStrategy,
    pub conflict_resolution: ConflictResolution,
    /// Ordered rules; `None` means no rule-based action for any path
    pub conflict_rules: Option<ConflictRules>,
    pub delete_extraneous: DeleteScope,
    /// Log and report intended actions without touching either side
    pub dry_run: bool,
    /// Per-entry tasks in flight; 0 is treated as 1
    pub max_concurrency: usize,
    /// Globs pruned from the local walk
    pub ignore: Vec<String>,
    pub follow_symlinks: bool,
    /// Deepest relative depth considered on both sides
    pub max_depth: Option<usize>,
    pub events: Option<Arc<dyn ISyncEventSink>>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            direction: Direction::default(),
            compare_strategy: CompareStrategy::default(),
            conflict_resolution: ConflictResolution::default(),
            conflict_rules: None,
            delete_extraneous: DeleteScope::default(),
            dry_run: false,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            ignore: Vec::new(),
            follow_symlinks: false,
            max_depth: None,
            events: None,
        }
    }
}

impl std::fmt::Debug for SyncOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOptions")
            .field("direction", &self.direction)
            .field("compare_strategy", &self.compare_strategy)
            .field("conflict_resolution", &self.conflict_resolution)
            .field("conflict_rules", &self.conflict_rules.as_ref().map(ConflictRules::len))
            .field("delete_extraneous", &self.delete_extraneous)
            .field("dry_run", &self.dry_run)
            .field("max_concurrency", &self.max_concurrency)
            .field("ignore", &self.ignore)
            .field("follow_symlinks", &self.follow_symlinks)
            .field("max_depth", &self.max_depth)
            .field("events", &self.events.is_some())
            .finish()
    }
}

impl SyncOptions {
    /// Builds options from the `sync` configuration section.
    ///
    /// # Errors
    /// [`ConflictError::InvalidPattern`] for an invalid conflict rule or
    /// ignore glob.
    pub fn from_config(config: &SyncConfig) -> std::result::Result<Self, ConflictError> {
        let conflict_rules = if config.conflict_rules.is_empty() {
            None
        } else {
            Some(ConflictRules::from_config(&config.conflict_rules)?)
        };
        // ignore globs are only compiled at walk time otherwise
        LocalWalkOptions::new().with_ignore(&config.ignore)?;

        Ok(Self {
            direction: config.direction,
            compare_strategy: config.compare_strategy,
            conflict_resolution: config.conflict_resolution,
            conflict_rules,
            delete_extraneous: config.delete_extraneous,
            dry_run: config.dry_run,
            max_concurrency: config.max_concurrency,
            ignore: config.ignore.clone(),
            follow_symlinks: config.follow_symlinks,
            max_depth: None,
            events: None,
        })
    }

    pub fn with_events(mut self, sink: Arc<dyn ISyncEventSink>) -> Self {
        self.events = Some(sink);
        self
    }

    fn sink(&self) -> Option<&dyn ISyncEventSink> {
        self.events.as_deref()
    }

    fn permits(&self) -> usize {
        self.max_concurrency.max(1)
    }

    fn within_depth(&self, relative_path: &str) -> bool {
        self.max_depth
            .map_or(true, |max| relative_path.matches('/').count() <= max)
    }
}

// ============================================================================
// EntryPair
// ============================================================================

/// Both sides of one relative path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPair {
    pub relative_path: String,
    pub local_path: PathBuf,
    pub remote_path: RemotePath,
    /// Local entry, when the path exists locally
    pub local: Option<LocalEntry>,
    /// Remote metadata, when the path exists remotely
    pub remote: Option<FileMeta>,
}

// ============================================================================
// SyncEngine
// ============================================================================

/// Orchestrates single-entry, single-file and directory syncs
#[derive(Clone)]
pub struct SyncEngine {
    client: RemoteClient,
    fs: Arc<dyn ILocalFileSystem>,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

impl SyncEngine {
    pub fn new(client: RemoteClient, fs: Arc<dyn ILocalFileSystem>) -> Self {
        Self { client, fs }
    }

    pub fn client(&self) -> &RemoteClient {
        &self.client
    }

    // ========================================================================
    // Single entry
    // ========================================================================

    /// Evaluates one entry and transfers it if needed.
    ///
    /// With [`Direction::Both`] an upload is tried first (when the local side
    /// exists), then a download (when the remote side exists). The first
    /// transfer wins; otherwise the first skip is reported.
    ///
    /// # Errors
    /// Remote or local failures of the transfer itself, and an ambiguity
    /// error when one side is a directory and the other is not.
    #[instrument(skip(self, pair, options), fields(path = %pair.relative_path))]
    pub async fn sync_entry(
        &self,
        pair: &EntryPair,
        direction: Direction,
        options: &SyncOptions,
    ) -> Result<EntryOutcome> {
        let outcome = self.evaluate_entry(pair, direction, options).await?;
        if let Some(sink) = options.sink() {
            match &outcome {
                EntryOutcome::Transferred(event) => sink.on_transfer(event),
                EntryOutcome::Skipped(event) => sink.on_skip(event),
            }
        }
        Ok(outcome)
    }

    async fn evaluate_entry(
        &self,
        pair: &EntryPair,
        direction: Direction,
        options: &SyncOptions,
    ) -> Result<EntryOutcome> {
        let action = resolve_action(&pair.relative_path, options.conflict_rules.as_ref());
        if action == Some(ConflictAction::Skip) {
            debug!(path = %pair.relative_path, "Skipped by conflict rules");
            return Ok(skipped(pair, SkipReason::ConflictRules));
        }

        let candidates: Vec<TransferDirection> = match direction {
            Direction::Both => direction
                .transfers()
                .iter()
                .copied()
                .filter(|td| match td {
                    TransferDirection::Upload => pair.local.is_some(),
                    TransferDirection::Download => pair.remote.is_some(),
                })
                .collect(),
            _ => direction.transfers().to_vec(),
        };

        let mut first_skip = None;
        for td in candidates {
            match self.evaluate_transfer(pair, td, action, options).await? {
                transferred @ EntryOutcome::Transferred(_) => return Ok(transferred),
                skip => {
                    first_skip.get_or_insert(skip);
                }
            }
        }

        Ok(first_skip
            .unwrap_or_else(|| skipped(pair, SkipReason::Compare(options.compare_strategy))))
    }

    async fn evaluate_transfer(
        &self,
        pair: &EntryPair,
        direction: TransferDirection,
        action: Option<ConflictAction>,
        options: &SyncOptions,
    ) -> Result<EntryOutcome> {
        let strategy = options.compare_strategy;
        let source_present = match direction {
            TransferDirection::Upload => pair.local.is_some(),
            TransferDirection::Download => pair.remote.is_some(),
        };
        if !source_present {
            return Ok(skipped(pair, SkipReason::Compare(strategy)));
        }

        check_kinds(pair)?;
        if direction == TransferDirection::Download
            && pair.remote.as_ref().is_some_and(FileMeta::is_symlink)
        {
            debug!(path = %pair.relative_path, "Remote symlink not downloaded");
            return Ok(skipped(pair, SkipReason::Symlink));
        }

        let needed = needs_transfer(
            self.fs.as_ref(),
            strategy,
            direction,
            &pair.local_path,
            pair.remote.as_ref(),
        )
        .await;
        let allowed = is_transfer_allowed(strategy, direction, action, options.conflict_resolution);
        if !(needed && allowed) {
            debug!(
                path = %pair.relative_path,
                direction = %direction,
                needed,
                allowed,
                "Nothing to transfer"
            );
            return Ok(skipped(pair, SkipReason::Compare(strategy)));
        }

        let size = match direction {
            TransferDirection::Upload => self.upload(pair, options.dry_run).await?,
            TransferDirection::Download => self.download(pair, options.dry_run).await?,
        };
        Ok(EntryOutcome::Transferred(TransferEvent {
            direction,
            relative_path: pair.relative_path.clone(),
            local_path: pair.local_path.clone(),
            remote_path: pair.remote_path.clone(),
            size,
            dry_run: options.dry_run,
        }))
    }

    /// Uploads the local file, creating missing remote parents first and
    /// stamping the remote mtime with the local one.
    async fn upload(&self, pair: &EntryPair, dry_run: bool) -> Result<Option<u64>> {
        let state = self.fs.get_state(&pair.local_path).await?;
        if dry_run {
            info!(
                local = %pair.local_path.display(),
                remote = %pair.remote_path,
                size = state.size,
                "Dry run: would upload"
            );
            return Ok(Some(state.size));
        }

        if let Some(parent) = pair.remote_path.parent() {
            self.client.ensure_directory(&parent).await?;
        }
        self.client
            .upload_file(&pair.local_path, &pair.remote_path)
            .await?;
        if let Some(secs) = state.modified_secs().filter(|s| *s >= 0) {
            self.client
                .set_modification_time(&pair.remote_path, secs)
                .await?;
        }

        info!(path = %pair.relative_path, size = state.size, "Uploaded");
        Ok(Some(state.size))
    }

    /// Downloads the remote file, creating missing local parents first
    async fn download(&self, pair: &EntryPair, dry_run: bool) -> Result<Option<u64>> {
        let size = pair.remote.as_ref().and_then(|r| r.size);
        if dry_run {
            info!(
                remote = %pair.remote_path,
                local = %pair.local_path.display(),
                size,
                "Dry run: would download"
            );
            return Ok(size);
        }

        if let Some(parent) = pair.local_path.parent() {
            self.fs.create_dir_all(parent).await?;
        }
        self.client
            .download_file(&pair.remote_path, &pair.local_path)
            .await?;

        info!(path = %pair.relative_path, size, "Downloaded");
        Ok(size)
    }

    // ========================================================================
    // Single file
    // ========================================================================

    /// Syncs one path.
    ///
    /// Delegates to [`SyncEngine::sync_directory`] when either side is a
    /// directory and the other side is absent or a directory too.
    ///
    /// # Errors
    /// [`SyncError::Ambiguity`] for a local directory against a remote file,
    /// a local file against a remote directory, or a remote symlink against
    /// a local directory. Remote and local failures are propagated.
    #[instrument(skip_all, fields(local = %local_path.display(), remote = %remote_path))]
    pub async fn sync_file(
        &self,
        local_path: &Path,
        remote_path: &RemotePath,
        options: &SyncOptions,
    ) -> Result<SyncResult> {
        let local_state = self.fs.get_state(local_path).await?;
        let remote = match self.client.get_metadata(remote_path).await {
            Err(err) if err.is_not_found() => None,
            other => other?,
        };

        let local_dir = local_state.is_directory();
        let ambiguity = match &remote {
            Some(meta) if local_dir && meta.is_file() => Some("local directory, remote file"),
            Some(meta) if local_dir && meta.is_symlink() => {
                Some("local directory, remote symlink")
            }
            Some(meta) if local_state.is_regular_file() && meta.is_dir() => {
                Some("local file, remote directory")
            }
            _ => None,
        };
        if let Some(reason) = ambiguity {
            return Err(SyncError::Ambiguity {
                local: local_path.to_path_buf(),
                remote: remote_path.clone(),
                reason: reason.to_string(),
            });
        }

        let remote_dir = remote.as_ref().is_some_and(FileMeta::is_dir);
        if local_dir || (remote_dir && !local_state.exists) {
            debug!("Directory on one side, syncing as a tree");
            return self.sync_directory(local_path, remote_path, options).await;
        }

        warn_mtime_direction(options);

        let name = remote_path
            .file_name()
            .map(str::to_string)
            .or_else(|| local_path.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_default();

        let local_entries: Vec<LocalEntry> = if local_state.exists {
            vec![LocalEntry {
                local_path: local_path.to_path_buf(),
                relative_path: name.clone(),
                is_directory: false,
            }]
        } else {
            Vec::new()
        };
        let remote_entries: Vec<RemoteEntry> = remote
            .iter()
            .map(|meta| RemoteEntry {
                path: remote_path.clone(),
                parent: remote_path.parent().unwrap_or_else(RemotePath::root),
                relative_path: name.clone(),
                depth: 0,
                file: meta.clone(),
            })
            .collect();

        let local_root = local_path.parent().unwrap_or(local_path);
        let remote_root = remote_path.parent().unwrap_or_else(RemotePath::root);
        let deletions = self
            .delete_extraneous(
                options.delete_extraneous,
                local_root,
                &remote_root,
                &local_entries,
                &remote_entries,
                options.dry_run,
                options.sink(),
            )
            .await;
        if !deletions.is_empty() {
            return Ok(deletions);
        }

        let pair = EntryPair {
            relative_path: name,
            local_path: local_path.to_path_buf(),
            remote_path: remote_path.clone(),
            local: local_entries.into_iter().next(),
            remote,
        };
        let mut result = SyncResult::new();
        result.record(self.sync_entry(&pair, options.direction, options).await?);
        Ok(result)
    }

    // ========================================================================
    // Directory
    // ========================================================================

    /// Syncs the tree below `local_root` with the tree below `remote_root`.
    ///
    /// A missing root on either side is treated as an empty tree.
    ///
    /// # Errors
    /// Walk failures and a root that is a file on either side. Failed
    /// deletions and per-entry failures are reported as skip events instead.
    #[instrument(skip_all, fields(local = %local_root.display(), remote = %remote_root))]
    pub async fn sync_directory(
        &self,
        local_root: &Path,
        remote_root: &RemotePath,
        options: &SyncOptions,
    ) -> Result<SyncResult> {
        warn_mtime_direction(options);

        let remote_entries = self.walk_remote(local_root, remote_root, options).await?;
        let local_entries = self.walk_local(local_root, remote_root, options).await?;
        info!(
            remote_entries = remote_entries.len(),
            local_entries = local_entries.len(),
            "Trees walked"
        );

        let mut result = self
            .delete_extraneous(
                options.delete_extraneous,
                local_root,
                remote_root,
                &local_entries,
                &remote_entries,
                options.dry_run,
                options.sink(),
            )
            .await;
        // entries whose deletion was attempted are not evaluated again
        let removed: HashSet<String> = result
            .deleted
            .iter()
            .map(|e| e.relative_path.clone())
            .chain(result.skipped.iter().map(|e| e.relative_path.clone()))
            .collect();

        let pairs = pair_entries(local_root, remote_root, &local_entries, &remote_entries, &removed)?;
        info!(entries = pairs.len(), permits = options.permits(), "Evaluating entries");

        let semaphore = Arc::new(Semaphore::new(options.permits()));
        let shared = Arc::new(options.clone());
        let mut tasks = JoinSet::new();
        for pair in pairs {
            let engine = self.clone();
            let options = Arc::clone(&shared);
            let semaphore = Arc::clone(&semaphore);
            let span = tracing::debug_span!("entry", path = %pair.relative_path);

            tasks.spawn(
                async move {
                    let relative_path = pair.relative_path.clone();
                    let Ok(_permit) = semaphore.acquire_owned().await else {
                        return (relative_path, Err(SyncError::Task("semaphore closed".into())));
                    };
                    let outcome = AssertUnwindSafe(engine.sync_entry(&pair, options.direction, &options))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|panic| Err(SyncError::Task(panic_message(&*panic))));
                    (relative_path, outcome)
                }
                .instrument(span),
            );
        }

        while let Some(joined) = tasks.join_next().await {
            let (relative_path, outcome) =
                joined.map_err(|err| SyncError::Task(err.to_string()))?;
            match outcome {
                Ok(outcome) => result.record(outcome),
                Err(err) => record_failure(&mut result, options.sink(), &relative_path, err),
            }
        }

        info!(
            transferred = result.transferred.len(),
            skipped = result.skipped.len(),
            deleted = result.deleted.len(),
            errors = result.errors().count(),
            "Directory sync complete"
        );
        Ok(result)
    }

    async fn walk_remote(
        &self,
        local_root: &Path,
        remote_root: &RemotePath,
        options: &SyncOptions,
    ) -> Result<Vec<RemoteEntry>> {
        let meta = match self.client.get_metadata(remote_root).await {
            Err(err) if err.is_not_found() => None,
            other => other?,
        };
        match meta {
            None => {
                debug!(remote = %remote_root, "Remote root missing, treating as empty");
                Ok(Vec::new())
            }
            Some(meta) if meta.is_dir() => {
                let walk = WalkOptions {
                    max_depth: options.max_depth,
                    include: None,
                };
                Ok(remote_walker::collect_walk(self.client.clone(), remote_root.clone(), walk).await?)
            }
            Some(meta) => Err(SyncError::Ambiguity {
                local: local_root.to_path_buf(),
                remote: remote_root.clone(),
                reason: format!("remote root is a {}", meta.kind),
            }),
        }
    }

    async fn walk_local(
        &self,
        local_root: &Path,
        remote_root: &RemotePath,
        options: &SyncOptions,
    ) -> Result<Vec<LocalEntry>> {
        let state = self.fs.get_state(local_root).await?;
        if state.exists && !state.is_dir {
            return Err(SyncError::Ambiguity {
                local: local_root.to_path_buf(),
                remote: remote_root.clone(),
                reason: "local root is not a directory".to_string(),
            });
        }

        let walk = LocalWalkOptions::new()
            .with_ignore(&options.ignore)?
            .follow_symlinks(options.follow_symlinks)
            .include_dirs(true);
        let mut entries = local_walker::collect_walk(local_root, walk).await?;
        entries.retain(|e| options.within_depth(&e.relative_path));
        Ok(entries)
    }

    // ========================================================================
    // Extraneous deletion
    // ========================================================================

    /// Deletes entries present on one side only.
    ///
    /// `Remote`/`Both` remove remote paths missing locally, `Local`/`Both`
    /// remove local paths missing remotely. Deletions run deepest first.
    /// Roots are used for logging only; entries carry their own paths.
    ///
    /// The returned result holds one delete event per removed entry. A
    /// deletion that fails becomes a skip event with an `error` reason and
    /// the remaining deletions carry on.
    #[allow(clippy::too_many_arguments)]
    #[instrument(skip_all, fields(scope = ?scope, local = %local_root.display(), remote = %remote_root, dry_run = dry_run))]
    pub async fn delete_extraneous(
        &self,
        scope: DeleteScope,
        local_root: &Path,
        remote_root: &RemotePath,
        local_entries: &[LocalEntry],
        remote_entries: &[RemoteEntry],
        dry_run: bool,
        sink: Option<&dyn ISyncEventSink>,
    ) -> SyncResult {
        let mut result = SyncResult::new();
        if scope == DeleteScope::None {
            return result;
        }

        let local_paths: HashSet<&str> =
            local_entries.iter().map(|e| e.relative_path.as_str()).collect();
        let remote_paths: HashSet<&str> =
            remote_entries.iter().map(|e| e.relative_path.as_str()).collect();

        if scope.includes_remote() {
            let mut extraneous: Vec<&RemoteEntry> = remote_entries
                .iter()
                .filter(|e| !local_paths.contains(e.relative_path.as_str()))
                .collect();
            extraneous.sort_by(|a, b| deepest_first(&a.relative_path, &b.relative_path));

            for entry in extraneous {
                let outcome = if dry_run {
                    info!(path = %entry.path, kind = %entry.file.kind, "Dry run: would delete remote");
                    Ok(())
                } else if entry.file.is_dir() {
                    self.client.delete_directory(&entry.path).await.map(|_| {
                        info!(path = %entry.path, "Deleted remote directory");
                    })
                } else {
                    self.client.delete_file(&entry.path).await.map(|_| {
                        info!(path = %entry.path, "Deleted remote file");
                    })
                };

                match outcome {
                    Ok(()) => record_deletion(
                        &mut result,
                        sink,
                        DeleteEvent {
                            side: Side::Remote,
                            relative_path: entry.relative_path.clone(),
                            path: entry.path.to_string(),
                            dry_run,
                        },
                    ),
                    Err(err) => {
                        let err = SyncError::from(err);
                        record_failure(&mut result, sink, &entry.relative_path, err);
                    }
                }
            }
        }

        if scope.includes_local() {
            let mut extraneous: Vec<&LocalEntry> = local_entries
                .iter()
                .filter(|e| !remote_paths.contains(e.relative_path.as_str()))
                .collect();
            extraneous.sort_by(|a, b| deepest_first(&a.relative_path, &b.relative_path));

            let mut removed_dirs: Vec<&str> = Vec::new();
            for entry in extraneous {
                if removed_dirs
                    .iter()
                    .any(|dir| is_under(&entry.relative_path, dir))
                {
                    debug!(path = %entry.relative_path, "Already removed with its directory");
                    continue;
                }

                let outcome = if dry_run {
                    info!(path = %entry.local_path.display(), "Dry run: would delete local");
                    Ok(())
                } else if entry.is_directory {
                    self.fs.remove_dir_all(&entry.local_path).await.map(|()| {
                        info!(path = %entry.local_path.display(), "Deleted local directory");
                    })
                } else {
                    self.fs.remove_file(&entry.local_path).await.map(|()| {
                        info!(path = %entry.local_path.display(), "Deleted local file");
                    })
                };

                match outcome {
                    Ok(()) => {
                        if entry.is_directory {
                            removed_dirs.push(&entry.relative_path);
                        }
                        record_deletion(
                            &mut result,
                            sink,
                            DeleteEvent {
                                side: Side::Local,
                                relative_path: entry.relative_path.clone(),
                                path: entry.local_path.display().to_string(),
                                dry_run,
                            },
                        );
                    }
                    Err(err) => {
                        let err = SyncError::from(err);
                        record_failure(&mut result, sink, &entry.relative_path, err);
                    }
                }
            }
        }

        result
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn record_deletion(result: &mut SyncResult, sink: Option<&dyn ISyncEventSink>, event: DeleteEvent) {
    if let Some(sink) = sink {
        sink.on_delete(&event);
    }
    result.record_deletion(event);
}

/// Records a failed entry as an `error` skip
fn record_failure(
    result: &mut SyncResult,
    sink: Option<&dyn ISyncEventSink>,
    relative_path: &str,
    err: SyncError,
) {
    warn!(path = %relative_path, error = %err, "Entry failed, continuing");
    let event = SkipEvent {
        relative_path: relative_path.to_string(),
        reason: SkipReason::Error(Arc::new(anyhow::Error::new(err))),
    };
    if let Some(sink) = sink {
        sink.on_skip(&event);
    }
    result.record(EntryOutcome::Skipped(event));
}

fn skipped(pair: &EntryPair, reason: SkipReason) -> EntryOutcome {
    EntryOutcome::Skipped(SkipEvent {
        relative_path: pair.relative_path.clone(),
        reason,
    })
}

/// Rejects pairs where one side is a directory and the other is not
fn check_kinds(pair: &EntryPair) -> Result<()> {
    let (Some(local), Some(remote)) = (&pair.local, &pair.remote) else {
        return Ok(());
    };
    if local.is_directory != remote.is_dir() {
        return Err(SyncError::Ambiguity {
            local: pair.local_path.clone(),
            remote: pair.remote_path.clone(),
            reason: format!(
                "local {}, remote {}",
                if local.is_directory { "directory" } else { "file" },
                remote.kind
            ),
        });
    }
    Ok(())
}

/// Joins both walks on relative path, keeping non-directory paths not
/// already removed. Ordered by relative path.
fn pair_entries(
    local_root: &Path,
    remote_root: &RemotePath,
    local_entries: &[LocalEntry],
    remote_entries: &[RemoteEntry],
    removed: &HashSet<String>,
) -> Result<Vec<EntryPair>> {
    let local_by_path: HashMap<&str, &LocalEntry> = local_entries
        .iter()
        .map(|e| (e.relative_path.as_str(), e))
        .collect();
    let remote_by_path: HashMap<&str, &RemoteEntry> = remote_entries
        .iter()
        .map(|e| (e.relative_path.as_str(), e))
        .collect();

    let paths: BTreeSet<&str> = local_entries
        .iter()
        .filter(|e| !e.is_directory)
        .map(|e| e.relative_path.as_str())
        .chain(
            remote_entries
                .iter()
                .filter(|e| !e.file.is_dir())
                .map(|e| e.relative_path.as_str()),
        )
        .filter(|path| !is_removed(path, removed))
        .collect();

    paths
        .into_iter()
        .map(|relative_path| {
            let local = local_by_path.get(relative_path).map(|e| (*e).clone());
            let remote = remote_by_path.get(relative_path);
            let local_path = match &local {
                Some(entry) => entry.local_path.clone(),
                None => relative_path
                    .split('/')
                    .fold(local_root.to_path_buf(), |acc, part| acc.join(part)),
            };
            let remote_path = match remote {
                Some(entry) => entry.path.clone(),
                None => remote_root.join_relative(relative_path)?,
            };
            Ok(EntryPair {
                relative_path: relative_path.to_string(),
                local_path,
                remote_path,
                local,
                remote: remote.map(|e| e.file.clone()),
            })
        })
        .collect()
}

fn is_under(path: &str, dir: &str) -> bool {
    path.len() > dir.len() && path.starts_with(dir) && path.as_bytes()[dir.len()] == b'/'
}

fn is_removed(path: &str, removed: &HashSet<String>) -> bool {
    removed.contains(path) || removed.iter().any(|dir| is_under(path, dir))
}

fn deepest_first(a: &str, b: &str) -> std::cmp::Ordering {
    let depth = |p: &str| p.matches('/').count();
    depth(b).cmp(&depth(a)).then_with(|| b.cmp(a))
}

fn warn_mtime_direction(options: &SyncOptions) {
    if options.compare_strategy == CompareStrategy::Mtime && options.direction.allows_download() {
        warn!(
            direction = %options.direction,
            "mtime compares only whether the local copy is newer; downloads of newer remote files are not detected"
        );
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        format!("task panicked: {msg}")
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        format!("task panicked: {msg}")
    } else {
        "task panicked".to_string()
    }
}

// ============================================================================
// Unit tests
// ============================================================================
