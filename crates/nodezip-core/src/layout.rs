//! Package manager layout resolution.
//!
//! npm and yarn leave a flat `node_modules` that can be walked as is. pnpm
//! keeps every package version once under `node_modules/.pnpm` and records
//! in `node_modules/.modules.yaml` which packages are hoisted to the top
//! level. For pnpm the whole store is emitted under `<prefix>/.pnpm`, then
//! each hoisted package is emitted a second time under `<prefix>/<alias>`.
//! The second copy duplicates bytes; it mirrors what module resolution
//! sees on disk in a pnpm install.

use crate::entry::EntryStream;
use crate::error::EntryError;
use crate::ignore::IgnoreMatcher;
use crate::walk::{walk_folder, WalkRequest};
use futures::stream::{self, StreamExt};
use nodezip_util::path::join_archive_path;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::debug;

/// pnpm's state file inside `node_modules`.
pub const MODULES_MANIFEST_NAME: &str = ".modules.yaml";

/// pnpm's content-addressable store inside `node_modules`.
pub const PNPM_STORE_DIR: &str = ".pnpm";

/// Package manager that produced an install, decided by lockfile name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageManager {
    Npm,
    Yarn,
    Pnpm,
}

impl PackageManager {
    /// Pick the manager from the lockfile's file name.
    ///
    /// `package-lock.json` is npm, `yarn.lock` is yarn and `pnpm-lock.yaml`
    /// is pnpm. Anything else is an error.
    pub fn from_lockfile(path: &Path) -> Result<Self, EntryError> {
        match path.file_name().and_then(|n| n.to_str()) {
            Some("package-lock.json") => Ok(Self::Npm),
            Some("yarn.lock") => Ok(Self::Yarn),
            Some("pnpm-lock.yaml") => Ok(Self::Pnpm),
            _ => Err(EntryError::lockfile_unrecognized(path)),
        }
    }

    #[must_use]
    pub fn lockfile_name(self) -> &'static str {
        match self {
            Self::Npm => "package-lock.json",
            Self::Yarn => "yarn.lock",
            Self::Pnpm => "pnpm-lock.yaml",
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Npm => "npm",
            Self::Yarn => "yarn",
            Self::Pnpm => "pnpm",
        }
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hoisted packages from pnpm's `.modules.yaml`:
/// `name@version` → alias name → hoisting kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct HoistMap(BTreeMap<String, BTreeMap<String, String>>);

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModulesManifest {
    #[serde(default)]
    hoisted_dependencies: Option<HoistMap>,
}

impl HoistMap {
    /// Parse the `hoistedDependencies` section out of `.modules.yaml` content.
    /// A manifest without the section hoists nothing.
    pub fn parse(yaml: &str) -> Result<Self, EntryError> {
        let manifest: ModulesManifest = serde_yaml::from_str(yaml).map_err(|e| {
            EntryError::layout_manifest_invalid(format!("invalid {MODULES_MANIFEST_NAME}: {e}"))
        })?;
        Ok(manifest.hoisted_dependencies.unwrap_or_default())
    }

    /// Read and parse `<node_modules>/.modules.yaml`.
    pub async fn read(node_modules: &Path) -> Result<Self, EntryError> {
        let path = node_modules.join(MODULES_MANIFEST_NAME);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(EntryError::layout_manifest_missing(&path));
            }
            Err(e) => {
                return Err(EntryError::layout_manifest_invalid(format!(
                    "failed to read {}: {e}",
                    path.display()
                )));
            }
        };
        Self::parse(&content)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `(name@version, alias)` pairs in key order.
    pub fn hoisted(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().flat_map(|(key, aliases)| {
            aliases
                .keys()
                .map(move |alias| (key.as_str(), alias.as_str()))
        })
    }
}

/// Split a hoisting key into its store directory name and package name.
///
/// Keys look like `lodash@4.17.21`, `@babel/core@7.22.0`, optionally with
/// a leading `/` (older pnpm) and a peer suffix such as `(react@18.2.0)`.
/// In the store, `/` in the key becomes `+` and peer parentheses become `_`.
fn store_location(key: &str) -> Option<(String, &str)> {
    let key = key.strip_prefix('/').unwrap_or(key);
    let base = key.split_once('(').map_or(key, |(base, _)| base);
    let at = base.rfind('@').filter(|&idx| idx > 0)?;
    let name = &base[..at];
    if name.is_empty() || name.ends_with('/') {
        return None;
    }

    let dir = key
        .replace(")(", "_")
        .replace('(', "_")
        .replace(')', "")
        .replace('/', "+");
    Some((dir, name))
}

/// Produce the archive entries of an install.
///
/// `install_dir` is the directory holding `node_modules`. For pnpm the
/// hoisting manifest is read and every hoisted package is checked to exist
/// in the store before the stream is returned, so layout problems fail the
/// call up front instead of half-way through the stream.
pub async fn resolve_package_entries(
    manager: PackageManager,
    install_dir: &Path,
    archive_prefix: &str,
    ignore: IgnoreMatcher,
) -> Result<EntryStream, EntryError> {
    let node_modules = install_dir.join("node_modules");
    let ignore = Arc::new(ignore);

    match manager {
        PackageManager::Npm | PackageManager::Yarn => Ok(walk_folder(
            WalkRequest::new(node_modules)
                .with_archive_prefix(archive_prefix)
                .with_shared_ignore(ignore),
        )),
        PackageManager::Pnpm => {
            let requests = pnpm_walks(&node_modules, archive_prefix, &ignore).await?;
            Ok(stream::iter(requests).flat_map(walk_folder).boxed())
        }
    }
}

async fn pnpm_walks(
    node_modules: &Path,
    archive_prefix: &str,
    ignore: &Arc<IgnoreMatcher>,
) -> Result<Vec<WalkRequest>, EntryError> {
    let hoisted = HoistMap::read(node_modules).await?;
    let store = node_modules.join(PNPM_STORE_DIR);
    ensure_dir(&store, PNPM_STORE_DIR).await?;

    debug!(
        store = %store.display(),
        hoisted = hoisted.len(),
        "resolving pnpm layout"
    );

    let mut requests = vec![WalkRequest::new(&store)
        .with_archive_prefix(&join_archive_path(archive_prefix, PNPM_STORE_DIR))
        .with_shared_ignore(Arc::clone(ignore))];

    for (key, alias) in hoisted.hoisted() {
        let Some((dir, name)) = store_location(key) else {
            return Err(EntryError::layout_manifest_invalid(format!(
                "invalid hoisted package key '{key}' in {MODULES_MANIFEST_NAME}"
            )));
        };
        let source: PathBuf = store.join(dir).join("node_modules").join(name);
        ensure_dir(&source, key).await?;

        requests.push(
            WalkRequest::new(source)
                .with_archive_prefix(&join_archive_path(archive_prefix, alias))
                .with_shared_ignore(Arc::clone(ignore)),
        );
    }

    Ok(requests)
}

async fn ensure_dir(path: &Path, what: &str) -> Result<(), EntryError> {
    match fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        _ => Err(EntryError::layout_store_missing(what, path)),
    }
}
