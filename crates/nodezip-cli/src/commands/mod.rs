pub mod deps;
pub mod folder;
pub mod output;
pub mod version;

use std::path::{Path, PathBuf};

/// Resolve a command-line path against the configured working directory.
fn resolve(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}
