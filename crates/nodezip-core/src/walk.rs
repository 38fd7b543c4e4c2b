//! Folder walking.
//!
//! Enumerates a directory tree with an explicit work stack, so depth is
//! bounded by memory and not by the call stack. Each poll of the stream does
//! at most one directory listing plus the stats needed to classify the
//! children it reads; nothing is listed ahead of demand.

use crate::entry::{ArchiveEntry, EntryContent, EntryStream};
use crate::error::EntryError;
use crate::ignore::IgnoreMatcher;
use futures::stream::{self, StreamExt};
use nodezip_util::path::{child_path, normalize_archive_path};
use std::fs::FileType;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{self, DirEntry, ReadDir};
use tracing::{debug, trace};

/// What to walk and where its entries land in the archive.
#[derive(Debug, Clone)]
pub struct WalkRequest {
    source_root: PathBuf,
    archive_prefix: String,
    ignore: Arc<IgnoreMatcher>,
}

impl WalkRequest {
    /// Walk `source_root` into the archive root with nothing ignored.
    pub fn new(source_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            archive_prefix: String::new(),
            ignore: Arc::new(IgnoreMatcher::empty()),
        }
    }

    /// Place entries under `prefix`. `""` and `"/"` mean the archive root.
    pub fn with_archive_prefix(mut self, prefix: &str) -> Self {
        self.archive_prefix = normalize_archive_path(prefix);
        self
    }

    pub fn with_ignore(self, ignore: IgnoreMatcher) -> Self {
        self.with_shared_ignore(Arc::new(ignore))
    }

    /// Share one compiled matcher between several walks.
    pub fn with_shared_ignore(mut self, ignore: Arc<IgnoreMatcher>) -> Self {
        self.ignore = ignore;
        self
    }

    #[must_use]
    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    #[must_use]
    pub fn archive_prefix(&self) -> &str {
        &self.archive_prefix
    }

    #[must_use]
    pub fn ignore(&self) -> &IgnoreMatcher {
        &self.ignore
    }
}

/// Walk a folder, yielding one entry per regular file not ignored.
///
/// Symbolic links are followed: links to files yield the file, links to
/// directories are descended into, and dangling links or links to anything
/// else are skipped. The source root is validated when the stream is first
/// polled. Any I/O failure after that ends the stream with an error.
pub fn walk_folder(request: WalkRequest) -> EntryStream {
    let walker = Walker::new(request);
    stream::try_unfold(walker, |mut walker| async move {
        let next = walker.next_entry().await?;
        Ok(next.map(|entry| (entry, walker)))
    })
    .boxed()
}

/// Real location of a directory on the current path, linked to its parent.
#[derive(Debug)]
struct DirNode {
    real: PathBuf,
    parent: Option<Arc<DirNode>>,
}

impl DirNode {
    fn ancestors(&self) -> impl Iterator<Item = &DirNode> {
        std::iter::successors(Some(self), |node| node.parent.as_deref())
    }
}

struct PendingDir {
    path: PathBuf,
    rel: String,
    node: Arc<DirNode>,
}

struct OpenDir {
    read_dir: ReadDir,
    path: PathBuf,
    rel: String,
    node: Arc<DirNode>,
}

enum Visit {
    Skip,
    Descend(PendingDir),
    Yield(ArchiveEntry),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Kind {
    Dir,
    File,
    Other,
}

impl From<FileType> for Kind {
    fn from(ft: FileType) -> Self {
        if ft.is_dir() {
            Self::Dir
        } else if ft.is_file() {
            Self::File
        } else {
            Self::Other
        }
    }
}

struct Walker {
    request: WalkRequest,
    started: bool,
    stack: Vec<PendingDir>,
    current: Option<OpenDir>,
}

impl Walker {
    fn new(request: WalkRequest) -> Self {
        Self {
            request,
            started: false,
            stack: Vec::new(),
            current: None,
        }
    }

    async fn next_entry(&mut self) -> Result<Option<ArchiveEntry>, EntryError> {
        if !self.started {
            self.started = true;
            self.start().await?;
        }

        loop {
            let Some(dir) = self.current.as_mut() else {
                let Some(next) = self.stack.pop() else {
                    return Ok(None);
                };
                trace!(dir = %next.path.display(), "listing");
                let read_dir = fs::read_dir(&next.path)
                    .await
                    .map_err(|e| EntryError::walk_io(&next.path, &e))?;
                self.current = Some(OpenDir {
                    read_dir,
                    path: next.path,
                    rel: next.rel,
                    node: next.node,
                });
                continue;
            };

            let child = dir
                .read_dir
                .next_entry()
                .await
                .map_err(|e| EntryError::walk_io(&dir.path, &e))?;
            let Some(child) = child else {
                self.current = None;
                continue;
            };

            match classify(&dir.rel, &dir.node, &self.request, child).await? {
                Visit::Skip => {}
                Visit::Descend(pending) => self.stack.push(pending),
                Visit::Yield(entry) => return Ok(Some(entry)),
            }
        }
    }

    async fn start(&mut self) -> Result<(), EntryError> {
        let root = self.request.source_root.clone();
        debug!(
            root = %root.display(),
            prefix = %self.request.archive_prefix,
            "walking folder"
        );

        let meta = fs::metadata(&root)
            .await
            .map_err(|e| EntryError::walk_root_invalid(&root, &e.to_string()))?;
        if !meta.is_dir() {
            return Err(EntryError::walk_root_invalid(&root, "not a directory"));
        }
        let real = fs::canonicalize(&root)
            .await
            .map_err(|e| EntryError::walk_root_invalid(&root, &e.to_string()))?;

        self.stack.push(PendingDir {
            path: root,
            rel: String::new(),
            node: Arc::new(DirNode { real, parent: None }),
        });
        Ok(())
    }
}

async fn classify(
    parent_rel: &str,
    parent: &Arc<DirNode>,
    request: &WalkRequest,
    child: DirEntry,
) -> Result<Visit, EntryError> {
    let path = child.path();
    let name = child.file_name();
    let Some(name) = name.to_str() else {
        return Err(EntryError::walk_path_not_utf8(&path));
    };

    let file_type = child
        .file_type()
        .await
        .map_err(|e| EntryError::walk_io(&path, &e))?;
    let is_symlink = file_type.is_symlink();

    let kind = if is_symlink {
        match fs::metadata(&path).await {
            Ok(meta) => Kind::from(meta.file_type()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                // The link is still there but its target is not: dangling.
                if fs::symlink_metadata(&path).await.is_ok() {
                    return Ok(Visit::Skip);
                }
                return Err(EntryError::walk_io(&path, &e));
            }
            // Unreadable targets and link loops are not dangling links.
            Err(e) => return Err(EntryError::walk_io(&path, &e)),
        }
    } else {
        Kind::from(file_type)
    };

    if kind == Kind::Other {
        return Ok(Visit::Skip);
    }

    let rel = child_path(parent_rel, name);
    if request.ignore.ignores_entry(&rel, kind == Kind::Dir) {
        trace!(path = %rel, "ignored");
        return Ok(Visit::Skip);
    }

    if kind == Kind::File {
        // `rel` is built from raw host names; a `\` in a Unix name stays part
        // of that name instead of being re-split into a separator.
        let archive_path = child_path(&request.archive_prefix, &rel);
        return Ok(Visit::Yield(ArchiveEntry::new(
            archive_path,
            EntryContent::new(path),
        )));
    }

    let real = if is_symlink {
        let target = fs::canonicalize(&path)
            .await
            .map_err(|e| EntryError::walk_io(&path, &e))?;
        if parent.ancestors().any(|node| node.real.starts_with(&target)) {
            return Err(EntryError::walk_symlink_cycle(&path, &target));
        }
        target
    } else {
        parent.real.join(name)
    };

    Ok(Visit::Descend(PendingDir {
        path,
        rel,
        node: Arc::new(DirNode {
            real,
            parent: Some(Arc::clone(parent)),
        }),
    }))
}
