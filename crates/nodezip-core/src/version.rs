//! Build identification for `nodezip version` and log headers.

use serde::Serialize;
use std::fmt;

/// Crate version from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// What this binary was built from.
///
/// `git_hash` is filled from `NODEZIP_BUILD_GIT_HASH` when the build
/// environment exports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    pub version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_hash: Option<&'static str>,
}

impl BuildInfo {
    #[must_use]
    pub const fn current() -> Self {
        Self {
            version: VERSION,
            git_hash: option_env!("NODEZIP_BUILD_GIT_HASH"),
        }
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "nodezip {}", self.version)?;
        match self.git_hash {
            Some(hash) => write!(f, " ({hash})"),
            None => Ok(()),
        }
    }
}
