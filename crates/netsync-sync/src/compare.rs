//! Compare strategies: does an entry need a transfer?
//!
//! Evaluation fails open. Whenever the information needed to prove the two
//! sides equal is missing (an absent side, an unknown size or digest, a local
//! I/O error) the entry is transferred.

use std::path::Path;

use tracing::{debug, trace};

use netsync_core::domain::{CompareStrategy, FileMeta, TransferDirection};
use netsync_core::ports::{FileSystemState, ILocalFileSystem};

/// Decides whether the entry at `local_path` / `remote` needs a transfer in
/// `direction` under `strategy`.
///
/// `Mtime` ignores `direction`: it transfers when the local copy is newer.
pub async fn needs_transfer(
    fs: &dyn ILocalFileSystem,
    strategy: CompareStrategy,
    direction: TransferDirection,
    local_path: &Path,
    remote: Option<&FileMeta>,
) -> bool {
    if strategy == CompareStrategy::Exists && direction == TransferDirection::Upload {
        return remote.is_none();
    }

    let local = match fs.get_state(local_path).await {
        Ok(state) => state,
        Err(err) => {
            debug!(path = %local_path.display(), error = %err, "Local stat failed, transferring");
            return true;
        }
    };

    let needed = match strategy {
        CompareStrategy::Exists => !local.exists,
        CompareStrategy::Size => size_differs(&local, remote),
        CompareStrategy::Mtime => local_is_newer(&local, remote),
        CompareStrategy::Checksum => checksum_differs(fs, &local, local_path, remote).await,
    };
    trace!(
        path = %local_path.display(),
        strategy = %strategy,
        direction = %direction,
        needed,
        "Compared entry"
    );
    needed
}

fn size_differs(local: &FileSystemState, remote: Option<&FileMeta>) -> bool {
    match (local.exists, remote.and_then(|r| r.size)) {
        (true, Some(remote_size)) => local.size != remote_size,
        _ => true,
    }
}

fn local_is_newer(local: &FileSystemState, remote: Option<&FileMeta>) -> bool {
    let (Some(remote), Some(local_ms)) = (remote, local.modified_ms.filter(|_| local.exists))
    else {
        return true;
    };
    local_ms > remote.mtime.saturating_mul(1000)
}

async fn checksum_differs(
    fs: &dyn ILocalFileSystem,
    local: &FileSystemState,
    local_path: &Path,
    remote: Option<&FileMeta>,
) -> bool {
    let Some(remote_md5) = remote.and_then(|r| r.md5.as_deref()) else {
        return true;
    };
    if !local.exists {
        return true;
    }

    match fs.compute_md5(local_path).await {
        Ok(local_md5) => !local_md5.eq_ignore_ascii_case(remote_md5),
        Err(err) => {
            debug!(path = %local_path.display(), error = %err, "Local checksum failed, transferring");
            true
        }
    }
}
