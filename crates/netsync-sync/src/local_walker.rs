//! Recursive walk of a local tree
//!
//! [`walk`] returns a lazy stream of [`LocalEntry`]s built on
//! `tokio::fs::read_dir`. Entries of one directory are yielded together,
//! sorted by name, before descending into its subdirectories.
//!
//! - Paths matching an ignore glob are pruned: ignored directories are not
//!   descended into.
//! - Symlinks are skipped unless `follow_symlinks` is set. A followed symlink
//!   to a directory already walked (an ancestor included) is not descended
//!   into, so cycles terminate. Real directories are always walked.
//! - A missing root yields an empty walk.

use std::collections::{HashSet, VecDeque};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, Stream, TryStreamExt};
use glob::{MatchOptions, Pattern};
use tracing::{debug, trace};

use netsync_conflict::ConflictError;
use netsync_core::domain::LocalEntry;

/// Same matching rules as conflict patterns: `*` crosses `/`
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Callback invoked with the relative path of each directory entered
pub type EnterDirFn = Arc<dyn Fn(&str) + Send + Sync>;

/// Options for a local walk
#[derive(Clone, Default)]
pub struct LocalWalkOptions {
    ignore: Vec<Pattern>,
    /// Descend into symlinked directories and yield symlinked files
    pub follow_symlinks: bool,
    /// Yield directory entries as well as files
    pub include_dirs: bool,
    /// Called for every directory below the root before its children are read
    pub on_enter_dir: Option<EnterDirFn>,
}

impl std::fmt::Debug for LocalWalkOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalWalkOptions")
            .field(
                "ignore",
                &self.ignore.iter().map(Pattern::as_str).collect::<Vec<_>>(),
            )
            .field("follow_symlinks", &self.follow_symlinks)
            .field("include_dirs", &self.include_dirs)
            .field("on_enter_dir", &self.on_enter_dir.is_some())
            .finish()
    }
}

impl LocalWalkOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles the ignore globs.
    ///
    /// # Errors
    /// [`ConflictError::InvalidPattern`] for the first invalid pattern.
    pub fn with_ignore<S: AsRef<str>>(mut self, patterns: &[S]) -> Result<Self, ConflictError> {
        self.ignore = patterns
            .iter()
            .map(|p| {
                Pattern::new(p.as_ref()).map_err(|e| ConflictError::InvalidPattern {
                    pattern: p.as_ref().to_string(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<_, _>>()?;
        Ok(self)
    }

    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    pub fn include_dirs(mut self, include: bool) -> Self {
        self.include_dirs = include;
        self
    }

    pub fn on_enter_dir(mut self, callback: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_enter_dir = Some(Arc::new(callback));
        self
    }

    /// Whether `relative_path` matches an ignore glob
    pub fn is_ignored(&self, relative_path: &str) -> bool {
        self.ignore
            .iter()
            .any(|p| p.matches_with(relative_path, MATCH_OPTIONS))
    }
}

struct WalkState {
    root: PathBuf,
    options: LocalWalkOptions,
    /// Directories still to read, with their relative path
    dirs: Vec<(PathBuf, String)>,
    pending: VecDeque<LocalEntry>,
    /// Canonical paths of directories already queued
    visited: HashSet<PathBuf>,
    started: bool,
    finished: bool,
}

fn join_relative(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

impl WalkState {
    async fn next(&mut self) -> Option<io::Result<LocalEntry>> {
        loop {
            if let Some(entry) = self.pending.pop_front() {
                return Some(Ok(entry));
            }
            if self.finished {
                return None;
            }
            if !self.started {
                self.started = true;
                match self.start().await {
                    Ok(true) => {}
                    Ok(false) => return None,
                    Err(err) => return self.fail(err),
                }
                continue;
            }

            let (dir, relative) = self.dirs.pop()?;
            if let Err(err) = self.read_dir(&dir, &relative).await {
                return self.fail(err);
            }
        }
    }

    fn fail(&mut self, err: io::Error) -> Option<io::Result<LocalEntry>> {
        debug!(error = %err, "Local walk stopped");
        self.finished = true;
        self.dirs.clear();
        Some(Err(err))
    }

    /// Queues the root; `false` when it does not exist
    async fn start(&mut self) -> io::Result<bool> {
        match tokio::fs::metadata(&self.root).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(io::Error::new(
                    ErrorKind::Other,
                    format!("{} is not a directory", self.root.display()),
                ))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(root = %self.root.display(), "Local root missing, nothing to walk");
                return Ok(false);
            }
            Err(err) => return Err(err),
        }

        let canonical = tokio::fs::canonicalize(&self.root).await?;
        self.visited.insert(canonical);
        self.dirs.push((self.root.clone(), String::new()));
        Ok(true)
    }

    async fn read_dir(&mut self, dir: &Path, relative: &str) -> io::Result<()> {
        if !relative.is_empty() {
            if let Some(callback) = &self.options.on_enter_dir {
                callback(relative);
            }
        }

        let mut children = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            children.push(entry);
        }
        children.sort_by_key(|e| e.file_name());

        let mut subdirs = Vec::new();
        for entry in children {
            let name = entry.file_name().to_string_lossy().into_owned();
            let rel = join_relative(relative, &name);
            if self.options.is_ignored(&rel) {
                trace!(path = %rel, "Ignored");
                continue;
            }

            let local_path = entry.path();
            let file_type = entry.file_type().await?;
            let is_link = file_type.is_symlink();
            let is_dir = if is_link {
                if !self.options.follow_symlinks {
                    trace!(path = %rel, "Skipping symlink");
                    continue;
                }
                match tokio::fs::metadata(&local_path).await {
                    Ok(meta) => meta.is_dir(),
                    Err(err) => {
                        debug!(path = %rel, error = %err, "Skipping dangling symlink");
                        continue;
                    }
                }
            } else {
                file_type.is_dir()
            };

            if is_dir {
                // Real directories are always walked. A linked directory is
                // dropped when its target was already walked; every ancestor
                // is in `visited`, so this also breaks cycles.
                let canonical = tokio::fs::canonicalize(&local_path).await?;
                if !self.visited.insert(canonical) && is_link {
                    debug!(path = %rel, "Link target already visited, not descending");
                    continue;
                }
                subdirs.push((local_path.clone(), rel.clone()));
                if self.options.include_dirs {
                    self.pending.push_back(LocalEntry {
                        local_path,
                        relative_path: rel,
                        is_directory: true,
                    });
                }
            } else {
                self.pending.push_back(LocalEntry {
                    local_path,
                    relative_path: rel,
                    is_directory: false,
                });
            }
        }

        // Stack: push in reverse so subdirectories are read in name order
        self.dirs.extend(subdirs.into_iter().rev());
        Ok(())
    }
}

/// Walks the tree below `root`
pub fn walk(
    root: impl Into<PathBuf>,
    options: LocalWalkOptions,
) -> impl Stream<Item = io::Result<LocalEntry>> + Send {
    let state = WalkState {
        root: root.into(),
        options,
        dirs: Vec::new(),
        pending: VecDeque::new(),
        visited: HashSet::new(),
        started: false,
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        let item = state.next().await?;
        Some((item, state))
    })
}

/// Materializes a full walk, failing on the first I/O error
pub async fn collect_walk(
    root: impl Into<PathBuf>,
    options: LocalWalkOptions,
) -> io::Result<Vec<LocalEntry>> {
    walk(root, options).try_collect().await
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tempfile::TempDir;

    use super::*;

    async fn tree() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        tokio::fs::create_dir_all(root.join("nested/inner")).await.unwrap();
        tokio::fs::create_dir_all(root.join(".git")).await.unwrap();
        tokio::fs::write(root.join("a.txt"), b"a").await.unwrap();
        tokio::fs::write(root.join("debug.log"), b"log").await.unwrap();
        tokio::fs::write(root.join("nested/b.txt"), b"b").await.unwrap();
        tokio::fs::write(root.join("nested/inner/c.txt"), b"c").await.unwrap();
        tokio::fs::write(root.join(".git/HEAD"), b"ref").await.unwrap();
        dir
    }

    fn relative_paths(entries: &[LocalEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.relative_path.as_str()).collect()
    }

    #[tokio::test]
    async fn test_walk_files_only_by_default() {
        let dir = tree().await;
        let entries = collect_walk(dir.path(), LocalWalkOptions::new()).await.unwrap();
        assert_eq!(
            relative_paths(&entries),
            // a directory's files come before its subdirectories
            vec![
                "a.txt",
                "debug.log",
                ".git/HEAD",
                "nested/b.txt",
                "nested/inner/c.txt",
            ]
        );
        assert!(entries.iter().all(|e| !e.is_directory));
    }

    #[tokio::test]
    async fn test_include_dirs() {
        let dir = tree().await;
        let entries = collect_walk(dir.path(), LocalWalkOptions::new().include_dirs(true))
            .await
            .unwrap();
        let dirs: Vec<_> = entries
            .iter()
            .filter(|e| e.is_directory)
            .map(|e| e.relative_path.as_str())
            .collect();
        assert_eq!(dirs, vec![".git", "nested", "nested/inner"]);
    }

    #[tokio::test]
    async fn test_ignore_prunes_directories() {
        let dir = tree().await;
        let options = LocalWalkOptions::new()
            .include_dirs(true)
            .with_ignore(&[".git", "*.log"])
            .unwrap();
        let entries = collect_walk(dir.path(), options).await.unwrap();
        assert_eq!(
            relative_paths(&entries),
            vec!["a.txt", "nested", "nested/b.txt", "nested/inner", "nested/inner/c.txt"]
        );
    }

    #[tokio::test]
    async fn test_invalid_ignore_pattern_rejected() {
        let err = LocalWalkOptions::new().with_ignore(&["[oops"]).unwrap_err();
        assert!(matches!(err, ConflictError::InvalidPattern { .. }));
    }

    #[tokio::test]
    async fn test_on_enter_dir_called_for_each_directory() {
        let dir = tree().await;
        let entered = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&entered);
        let options = LocalWalkOptions::new()
            .with_ignore(&[".git"])
            .unwrap()
            .on_enter_dir(move |rel| sink.lock().unwrap().push(rel.to_string()));

        collect_walk(dir.path(), options).await.unwrap();
        assert_eq!(*entered.lock().unwrap(), vec!["nested", "nested/inner"]);
    }

    #[tokio::test]
    async fn test_missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let entries = collect_walk(dir.path().join("missing"), LocalWalkOptions::new())
            .await
            .unwrap();
        assert!(entries.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinks_skipped_unless_followed() {
        let dir = tree().await;
        let root = dir.path();
        tokio::fs::symlink(root.join("nested"), root.join("link"))
            .await
            .unwrap();
        // cycle back to the root
        tokio::fs::symlink(root, root.join("nested/inner/loop"))
            .await
            .unwrap();

        let options = LocalWalkOptions::new().with_ignore(&[".git"]).unwrap();
        let plain = collect_walk(root, options.clone()).await.unwrap();
        assert!(!relative_paths(&plain).iter().any(|p| p.starts_with("link")));

        let followed = collect_walk(root, options.follow_symlinks(true))
            .await
            .unwrap();
        let paths = relative_paths(&followed);
        assert!(paths.contains(&"link/b.txt"));
        assert!(paths.contains(&"nested/b.txt"));
        assert!(paths.contains(&"nested/inner/c.txt"));
        assert!(!paths.iter().any(|p| p.contains("loop")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_real_directory_walked_when_alias_read_first() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        tokio::fs::create_dir_all(root.join("real")).await.unwrap();
        tokio::fs::write(root.join("real/x.txt"), b"x").await.unwrap();
        tokio::fs::symlink(root.join("real"), root.join("alias"))
            .await
            .unwrap();

        let options = LocalWalkOptions::new().include_dirs(true).follow_symlinks(true);
        let entries = collect_walk(root, options).await.unwrap();
        assert_eq!(
            relative_paths(&entries),
            vec!["alias", "real", "alias/x.txt", "real/x.txt"]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_second_alias_to_same_directory_not_descended() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let target = tempfile::tempdir().unwrap();
        tokio::fs::write(target.path().join("x.txt"), b"x").await.unwrap();
        tokio::fs::symlink(target.path(), root.join("one")).await.unwrap();
        tokio::fs::symlink(target.path(), root.join("two")).await.unwrap();

        let options = LocalWalkOptions::new().follow_symlinks(true);
        let entries = collect_walk(root, options).await.unwrap();
        assert_eq!(relative_paths(&entries), vec!["one/x.txt"]);
    }
}
