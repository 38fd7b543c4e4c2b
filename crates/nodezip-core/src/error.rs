//! Error types for nodezip.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error for configuration loading.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to read config at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Entry enumeration error codes.
pub mod codes {
    // Configuration
    pub const LOCKFILE_UNRECOGNIZED: &str = "LOCKFILE_UNRECOGNIZED";
    pub const PACKAGE_JSON_INVALID: &str = "PACKAGE_JSON_INVALID";
    pub const DEP_NOT_FOUND: &str = "DEP_NOT_FOUND";

    // Install
    pub const SCRATCH_WRITE_FAILED: &str = "SCRATCH_WRITE_FAILED";
    pub const INSTALL_SPAWN_FAILED: &str = "INSTALL_SPAWN_FAILED";
    pub const INSTALL_FAILED: &str = "INSTALL_FAILED";

    // Layout
    pub const LAYOUT_MANIFEST_MISSING: &str = "LAYOUT_MANIFEST_MISSING";
    pub const LAYOUT_MANIFEST_INVALID: &str = "LAYOUT_MANIFEST_INVALID";
    pub const LAYOUT_STORE_MISSING: &str = "LAYOUT_STORE_MISSING";

    // Walk
    pub const WALK_ROOT_INVALID: &str = "WALK_ROOT_INVALID";
    pub const WALK_IO: &str = "WALK_IO";
    pub const WALK_PATH_NOT_UTF8: &str = "WALK_PATH_NOT_UTF8";
    pub const WALK_SYMLINK_CYCLE: &str = "WALK_SYMLINK_CYCLE";
}

/// Broad category of an [`EntryError`]. Every class is fatal to the call
/// that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad input detected before any heavy I/O.
    Configuration,
    /// The package manager could not be run or exited non-zero.
    Install,
    /// The installed `node_modules` tree is inconsistent.
    Layout,
    /// The filesystem failed us during a walk.
    Filesystem,
}

/// Error produced while building or consuming an entry stream.
#[derive(Debug)]
pub struct EntryError {
    code: &'static str,
    message: String,
    exit_code: Option<i32>,
}

impl EntryError {
    /// Create a new error with the given code and message.
    #[must_use]
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            exit_code: None,
        }
    }

    /// Get the error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// Get the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Exit code of the package manager, for [`codes::INSTALL_FAILED`].
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// Classify the error.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self.code {
            codes::LOCKFILE_UNRECOGNIZED | codes::PACKAGE_JSON_INVALID | codes::DEP_NOT_FOUND => {
                ErrorClass::Configuration
            }
            codes::SCRATCH_WRITE_FAILED | codes::INSTALL_SPAWN_FAILED | codes::INSTALL_FAILED => {
                ErrorClass::Install
            }
            codes::LAYOUT_MANIFEST_MISSING
            | codes::LAYOUT_MANIFEST_INVALID
            | codes::LAYOUT_STORE_MISSING => ErrorClass::Layout,
            _ => ErrorClass::Filesystem,
        }
    }

    #[must_use]
    pub fn lockfile_unrecognized(path: &Path) -> Self {
        Self::new(
            codes::LOCKFILE_UNRECOGNIZED,
            format!(
                "unknown lockfile type for path '{}' (expected package-lock.json, yarn.lock or pnpm-lock.yaml)",
                path.display()
            ),
        )
    }

    pub fn package_json_invalid(msg: impl Into<String>) -> Self {
        Self::new(codes::PACKAGE_JSON_INVALID, msg)
    }

    #[must_use]
    pub fn dep_not_found(name: &str, package_json: &Path) -> Self {
        Self::new(
            codes::DEP_NOT_FOUND,
            format!("cannot find dependency {name} in {}", package_json.display()),
        )
    }

    pub fn scratch_write_failed(msg: impl Into<String>) -> Self {
        Self::new(codes::SCRATCH_WRITE_FAILED, msg)
    }

    #[must_use]
    pub fn install_spawn_failed(program: &str, err: &io::Error) -> Self {
        Self::new(
            codes::INSTALL_SPAWN_FAILED,
            format!("failed to spawn {program}: {err}"),
        )
    }

    #[must_use]
    pub fn install_failed(program: &str, exit_code: i32) -> Self {
        Self {
            code: codes::INSTALL_FAILED,
            message: format!("{program} exited with non-zero error code {exit_code}"),
            exit_code: Some(exit_code),
        }
    }

    #[must_use]
    pub fn layout_manifest_missing(path: &Path) -> Self {
        Self::new(
            codes::LAYOUT_MANIFEST_MISSING,
            format!("pnpm hoisting manifest not found: {}", path.display()),
        )
    }

    pub fn layout_manifest_invalid(msg: impl Into<String>) -> Self {
        Self::new(codes::LAYOUT_MANIFEST_INVALID, msg)
    }

    #[must_use]
    pub fn layout_store_missing(what: &str, path: &Path) -> Self {
        Self::new(
            codes::LAYOUT_STORE_MISSING,
            format!("pnpm store entry {what} is missing: {}", path.display()),
        )
    }

    #[must_use]
    pub fn walk_root_invalid(path: &Path, reason: &str) -> Self {
        Self::new(
            codes::WALK_ROOT_INVALID,
            format!("cannot walk {}: {reason}", path.display()),
        )
    }

    #[must_use]
    pub fn walk_io(path: &Path, err: &io::Error) -> Self {
        Self::new(codes::WALK_IO, format!("{}: {err}", path.display()))
    }

    #[must_use]
    pub fn walk_path_not_utf8(path: &Path) -> Self {
        Self::new(
            codes::WALK_PATH_NOT_UTF8,
            format!("file name is not valid UTF-8: {}", path.display()),
        )
    }

    #[must_use]
    pub fn walk_symlink_cycle(link: &Path, target: &Path) -> Self {
        Self::new(
            codes::WALK_SYMLINK_CYCLE,
            format!(
                "symlink {} points back to its own ancestor {}",
                link.display(),
                target.display()
            ),
        )
    }
}

impl fmt::Display for EntryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for EntryError {}
