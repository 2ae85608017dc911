//! Synchronization vocabulary and results
//!
//! The enums here are shared by configuration (they deserialize from
//! `snake_case` strings), the conflict policy, and the sync engine.
//! [`SyncResult`] is the append-only record of what one sync call did.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::newtypes::RemotePath;

/// Configured direction of a sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Local → remote only
    #[default]
    Upload,
    /// Remote → local only
    Download,
    /// Both ways; conflict resolution breaks ties
    Both,
}

impl Direction {
    /// The concrete transfer directions this setting evaluates, in order
    pub fn transfers(&self) -> &'static [TransferDirection] {
        match self {
            Direction::Upload => &[TransferDirection::Upload],
            Direction::Download => &[TransferDirection::Download],
            Direction::Both => &[TransferDirection::Upload, TransferDirection::Download],
        }
    }

    /// Whether remote → local transfers can happen under this setting
    pub fn allows_download(&self) -> bool {
        matches!(self, Direction::Download | Direction::Both)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::Upload => "upload",
            Direction::Download => "download",
            Direction::Both => "both",
        };
        write!(f, "{}", s)
    }
}

/// Direction of one concrete transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferDirection {
    Upload,
    Download,
}

impl fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransferDirection::Upload => "upload",
            TransferDirection::Download => "download",
        };
        write!(f, "{}", s)
    }
}

/// How the engine decides whether an entry needs a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareStrategy {
    /// Transfer only when the destination is missing
    Exists,
    /// Transfer when byte sizes differ
    #[default]
    Size,
    /// Transfer when the local copy is newer
    Mtime,
    /// Transfer when MD5 digests differ
    Checksum,
}

impl fmt::Display for CompareStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareStrategy::Exists => "exists",
            CompareStrategy::Size => "size",
            CompareStrategy::Mtime => "mtime",
            CompareStrategy::Checksum => "checksum",
        };
        write!(f, "{}", s)
    }
}

/// Action a conflict rule assigns to a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictAction {
    Upload,
    Download,
    Skip,
}

impl ConflictAction {
    /// Whether this action permits a transfer in `direction`
    pub fn matches(&self, direction: TransferDirection) -> bool {
        matches!(
            (self, direction),
            (ConflictAction::Upload, TransferDirection::Upload)
                | (ConflictAction::Download, TransferDirection::Download)
        )
    }
}

impl fmt::Display for ConflictAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConflictAction::Upload => "upload",
            ConflictAction::Download => "download",
            ConflictAction::Skip => "skip",
        };
        write!(f, "{}", s)
    }
}

/// Default outcome when no conflict rule names an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    /// Local wins: only uploads are allowed
    #[default]
    PreferLocal,
    /// Remote wins: only downloads are allowed
    PreferRemote,
    /// Neither side wins; only explicit rules allow transfers
    Manual,
}

impl ConflictResolution {
    /// Whether this default aligns with `direction`
    pub fn aligns_with(&self, direction: TransferDirection) -> bool {
        matches!(
            (self, direction),
            (ConflictResolution::PreferLocal, TransferDirection::Upload)
                | (ConflictResolution::PreferRemote, TransferDirection::Download)
        )
    }
}

impl fmt::Display for ConflictResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConflictResolution::PreferLocal => "prefer_local",
            ConflictResolution::PreferRemote => "prefer_remote",
            ConflictResolution::Manual => "manual",
        };
        write!(f, "{}", s)
    }
}

/// Which side extraneous entries are deleted from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteScope {
    #[default]
    None,
    Local,
    Remote,
    Both,
}

impl DeleteScope {
    pub fn includes_remote(&self) -> bool {
        matches!(self, DeleteScope::Remote | DeleteScope::Both)
    }

    pub fn includes_local(&self) -> bool {
        matches!(self, DeleteScope::Local | DeleteScope::Both)
    }
}

/// Side of a sync an event touched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Local,
    Remote,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Local => write!(f, "local"),
            Side::Remote => write!(f, "remote"),
        }
    }
}

/// A completed (or, in dry-run mode, simulated) transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferEvent {
    pub direction: TransferDirection,
    pub relative_path: String,
    pub local_path: PathBuf,
    pub remote_path: RemotePath,
    /// Bytes moved, when known
    pub size: Option<u64>,
    pub dry_run: bool,
}

/// Why an entry was not transferred
#[derive(Debug, Clone)]
pub enum SkipReason {
    /// A conflict rule mapped the path to `skip`
    ConflictRules,
    /// The compare strategy found nothing to do, or conflict policy refused
    Compare(CompareStrategy),
    /// Remote symlinks are never materialized locally
    Symlink,
    /// The per-entry task failed; the batch carried on
    Error(Arc<anyhow::Error>),
}

impl SkipReason {
    /// Stable short label for reports and logs
    pub fn label(&self) -> &'static str {
        match self {
            SkipReason::ConflictRules => "conflictRules skip",
            SkipReason::Compare(CompareStrategy::Exists) => "exists",
            SkipReason::Compare(CompareStrategy::Size) => "size",
            SkipReason::Compare(CompareStrategy::Mtime) => "mtime",
            SkipReason::Compare(CompareStrategy::Checksum) => "checksum",
            SkipReason::Symlink => "symlink",
            SkipReason::Error(_) => "error",
        }
    }

    /// The underlying error for [`SkipReason::Error`]
    pub fn error(&self) -> Option<&anyhow::Error> {
        match self {
            SkipReason::Error(err) => Some(err.as_ref()),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, SkipReason::Error(_))
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Error(err) => write!(f, "error: {err:#}"),
            other => write!(f, "{}", other.label()),
        }
    }
}

/// An entry that was looked at and left alone
#[derive(Debug, Clone)]
pub struct SkipEvent {
    pub relative_path: String,
    pub reason: SkipReason,
}

/// An extraneous entry removed (or, in dry-run mode, that would be removed)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteEvent {
    pub side: Side,
    pub relative_path: String,
    /// Full local path or remote path that was deleted
    pub path: String,
    pub dry_run: bool,
}

/// Outcome of evaluating a single entry
#[derive(Debug, Clone)]
pub enum EntryOutcome {
    Transferred(TransferEvent),
    Skipped(SkipEvent),
}

/// Everything one sync call did
///
/// Collections are order-independent: entries are processed concurrently.
#[derive(Debug, Clone, Default)]
pub struct SyncResult {
    pub transferred: Vec<TransferEvent>,
    pub skipped: Vec<SkipEvent>,
    pub deleted: Vec<DeleteEvent>,
}

impl SyncResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the outcome of one entry
    pub fn record(&mut self, outcome: EntryOutcome) {
        match outcome {
            EntryOutcome::Transferred(event) => self.transferred.push(event),
            EntryOutcome::Skipped(event) => self.skipped.push(event),
        }
    }

    pub fn record_deletion(&mut self, event: DeleteEvent) {
        self.deleted.push(event);
    }

    /// Skip events caused by per-entry failures
    pub fn errors(&self) -> impl Iterator<Item = &SkipEvent> {
        self.skipped.iter().filter(|s| s.reason.is_error())
    }

    /// Total bytes transferred, counting only events with a known size
    pub fn bytes_transferred(&self) -> u64 {
        self.transferred.iter().filter_map(|t| t.size).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.transferred.is_empty() && self.skipped.is_empty() && self.deleted.is_empty()
    }
}
