//! Tree entries produced by the remote and local walkers
//!
//! Both entry kinds carry a `relative_path` using `/` separators so that a
//! remote walk and a local walk of the same logical tree can be joined on it.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::RemotePath;

/// Kind of a remote object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    File,
    Dir,
    Symlink,
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FileKind::File => "file",
            FileKind::Dir => "dir",
            FileKind::Symlink => "symlink",
        };
        write!(f, "{}", s)
    }
}

/// Metadata of a single remote object as returned by `list`/`get_metadata`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    pub kind: FileKind,
    /// Last path component
    pub name: String,
    /// Modification time in unix seconds
    pub mtime: i64,
    /// Size in bytes; absent for directories and when the service omits it
    pub size: Option<u64>,
    /// Lower-case hex MD5 digest, when the service reports one
    pub md5: Option<String>,
    /// Link target for symlinks
    pub target: Option<String>,
}

impl FileMeta {
    /// Metadata for a regular file
    pub fn file(name: impl Into<String>, size: u64, mtime: i64) -> Self {
        Self {
            kind: FileKind::File,
            name: name.into(),
            mtime,
            size: Some(size),
            md5: None,
            target: None,
        }
    }

    /// Metadata for a directory
    pub fn dir(name: impl Into<String>, mtime: i64) -> Self {
        Self {
            kind: FileKind::Dir,
            name: name.into(),
            mtime,
            size: None,
            md5: None,
            target: None,
        }
    }

    /// Metadata for a symbolic link
    pub fn symlink(name: impl Into<String>, target: impl Into<String>, mtime: i64) -> Self {
        Self {
            kind: FileKind::Symlink,
            name: name.into(),
            mtime,
            size: None,
            md5: None,
            target: Some(target.into()),
        }
    }

    /// Attach an MD5 digest
    pub fn with_md5(mut self, md5: impl Into<String>) -> Self {
        self.md5 = Some(md5.into());
        self
    }

    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Dir
    }

    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }

    pub fn is_symlink(&self) -> bool {
        self.kind == FileKind::Symlink
    }

    /// Modification time as a UTC timestamp, `None` if out of range
    pub fn modified(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.mtime, 0)
    }
}

/// An entry yielded by the remote tree walker
///
/// Invariant: `path == parent.join(file.name)`. Root-level entries have depth 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub path: RemotePath,
    pub parent: RemotePath,
    pub relative_path: String,
    pub depth: usize,
    pub file: FileMeta,
}

impl RemoteEntry {
    /// Byte size contributed to directory aggregates (0 for non-files)
    pub fn byte_size(&self) -> u64 {
        if self.file.is_file() {
            self.file.size.unwrap_or(0)
        } else {
            0
        }
    }
}

/// An entry yielded by the local tree walker
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocalEntry {
    pub local_path: PathBuf,
    pub relative_path: String,
    pub is_directory: bool,
}
