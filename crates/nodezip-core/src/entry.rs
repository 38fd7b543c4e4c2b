//! Archive entries.

use crate::error::EntryError;
use futures::stream::BoxStream;
use std::io;
use std::path::{Path, PathBuf};

/// A lazy stream of archive entries.
///
/// Entries come in no particular order; consumers may only rely on the set.
pub type EntryStream = BoxStream<'static, Result<ArchiveEntry, EntryError>>;

/// A file destined for an archive: where it goes and where to read it from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    archive_path: String,
    content: EntryContent,
}

impl ArchiveEntry {
    /// Create an entry. `archive_path` must already be normalized.
    #[must_use]
    pub fn new(archive_path: String, content: EntryContent) -> Self {
        Self {
            archive_path,
            content,
        }
    }

    /// Archive-relative path with `/` separators and no leading slash.
    #[must_use]
    pub fn archive_path(&self) -> &str {
        &self.archive_path
    }

    #[must_use]
    pub fn content(&self) -> &EntryContent {
        &self.content
    }

    #[must_use]
    pub fn into_parts(self) -> (String, EntryContent) {
        (self.archive_path, self.content)
    }
}

/// Deferred byte source for an entry.
///
/// Nothing is opened until [`open`](Self::open) or
/// [`open_blocking`](Self::open_blocking) is called, and the returned handle
/// belongs to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryContent {
    source: PathBuf,
}

impl EntryContent {
    #[must_use]
    pub fn new(source: PathBuf) -> Self {
        Self { source }
    }

    /// Path the bytes are read from. For symlinked files this is the link
    /// path; opening it reads the link target.
    #[must_use]
    pub fn source_path(&self) -> &Path {
        &self.source
    }

    /// Open the file for async reading.
    pub async fn open(&self) -> io::Result<tokio::fs::File> {
        tokio::fs::File::open(&self.source).await
    }

    /// Open the file for synchronous archive writers.
    pub fn open_blocking(&self) -> io::Result<std::fs::File> {
        std::fs::File::open(&self.source)
    }
}
