//! Breadth-first walk of a remote tree
//!
//! [`walk`] returns a lazy, single-pass stream of [`RemoteEntry`]s. One
//! listing call is made per directory on the frontier, through the
//! [`RemoteClient`] and therefore under its retry policy. Children are
//! yielded in the order the service returns them.
//!
//! A failed listing is yielded as the last item; entries yielded before it
//! stay valid.

use std::collections::VecDeque;
use std::sync::Arc;

use futures::stream::{self, Stream, TryStreamExt};
use tracing::{debug, trace};

use netsync_core::domain::{RemoteEntry, RemoteError, RemotePath};
use netsync_remote::RemoteClient;

/// Predicate deciding whether an entry is yielded
pub type IncludeFn = Arc<dyn Fn(&RemoteEntry) -> bool + Send + Sync>;

/// Options for a remote walk
#[derive(Clone, Default)]
pub struct WalkOptions {
    /// Deepest depth yielded; root-level entries have depth 0. Unbounded when `None`.
    pub max_depth: Option<usize>,
    /// Filters yielded entries. Never prunes traversal: directories that are
    /// filtered out are still descended into.
    pub include: Option<IncludeFn>,
}

impl std::fmt::Debug for WalkOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalkOptions")
            .field("max_depth", &self.max_depth)
            .field("include", &self.include.is_some())
            .finish()
    }
}

impl WalkOptions {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    pub fn with_include(mut self, include: impl Fn(&RemoteEntry) -> bool + Send + Sync + 'static) -> Self {
        self.include = Some(Arc::new(include));
        self
    }
}

struct WalkState {
    client: RemoteClient,
    root: RemotePath,
    options: WalkOptions,
    /// Directories still to list, with the depth of their children
    frontier: VecDeque<(RemotePath, usize)>,
    pending: VecDeque<RemoteEntry>,
    finished: bool,
}

impl WalkState {
    async fn next(&mut self) -> Option<Result<RemoteEntry, RemoteError>> {
        loop {
            if let Some(entry) = self.pending.pop_front() {
                return Some(Ok(entry));
            }
            if self.finished {
                return None;
            }
            let (dir, depth) = self.frontier.pop_front()?;

            if let Err(err) = self.expand(&dir, depth).await {
                debug!(path = %dir, error = %err, "Remote walk stopped");
                self.finished = true;
                self.frontier.clear();
                return Some(Err(err));
            }
        }
    }

    async fn expand(&mut self, dir: &RemotePath, depth: usize) -> Result<(), RemoteError> {
        let listing = self.client.list(dir).await?;
        trace!(path = %dir, children = listing.directory_entries.len(), "Listed remote directory");

        for file in listing.directory_entries {
            let path = dir.join(&file.name)?;
            let relative_path = path
                .relative_to(&self.root)
                .unwrap_or_else(|| file.name.clone());

            let descend = file.is_dir() && self.options.max_depth.map_or(true, |max| depth < max);
            if descend {
                self.frontier.push_back((path.clone(), depth + 1));
            }

            let entry = RemoteEntry {
                path,
                parent: dir.clone(),
                relative_path,
                depth,
                file,
            };
            let included = self.options.include.as_ref().map_or(true, |f| f(&entry));
            if included {
                self.pending.push_back(entry);
            }
        }
        Ok(())
    }
}

/// Walks the tree below `root` breadth-first
pub fn walk(
    client: RemoteClient,
    root: RemotePath,
    options: WalkOptions,
) -> impl Stream<Item = Result<RemoteEntry, RemoteError>> + Send {
    let state = WalkState {
        client,
        frontier: VecDeque::from([(root.clone(), 0)]),
        root,
        options,
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        let item = state.next().await?;
        Some((item, state))
    })
}

/// Materializes a full walk, failing on the first listing error
pub async fn collect_walk(
    client: RemoteClient,
    root: RemotePath,
    options: WalkOptions,
) -> Result<Vec<RemoteEntry>, RemoteError> {
    walk(client, root, options).try_collect().await
}
