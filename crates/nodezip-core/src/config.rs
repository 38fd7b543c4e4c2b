use crate::error::Error;
use nodezip_util::fs::read_optional_lossy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the optional per-project configuration file.
pub const PROJECT_CONFIG_NAME: &str = "nodezip.json";

/// Runtime configuration for the nodezip CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Current working directory.
    pub cwd: PathBuf,

    /// Whether to emit JSON logs.
    pub json_logs: bool,

    /// Verbosity level (0 = INFO, 1 = DEBUG, 2+ = TRACE).
    pub verbosity: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            json_logs: false,
            verbosity: 0,
        }
    }
}

impl Config {
    /// Create a new config with the given working directory.
    #[must_use]
    pub fn new(cwd: PathBuf) -> Self {
        Self {
            cwd,
            ..Default::default()
        }
    }

    /// Set verbosity level.
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set JSON log output.
    #[must_use]
    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.json_logs = json;
        self
    }

    /// Load `nodezip.json` from the working directory, if present.
    pub fn project(&self) -> Result<ProjectConfig, Error> {
        ProjectConfig::load(&self.cwd)
    }
}

/// Defaults read from `nodezip.json`.
///
/// ```json
/// { "ignore": ["*.map", "test/"], "arch": "arm64", "platform": "linux", "prefix": "node_modules" }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProjectConfig {
    /// Ignore patterns applied before any given on the command line.
    #[serde(default)]
    pub ignore: Vec<String>,

    /// Target CPU architecture for package installs.
    #[serde(default)]
    pub arch: Option<String>,

    /// Target OS platform for package installs.
    #[serde(default)]
    pub platform: Option<String>,

    /// Archive prefix for entries.
    #[serde(default)]
    pub prefix: Option<String>,
}

impl ProjectConfig {
    /// Load the project config from `dir`. A missing file yields the defaults.
    pub fn load(dir: &Path) -> Result<Self, Error> {
        let path = dir.join(PROJECT_CONFIG_NAME);
        let content = read_optional_lossy(&path).map_err(|source| Error::ConfigRead {
            path: path.clone(),
            source,
        })?;

        match content {
            Some(content) => {
                serde_json::from_str(&content).map_err(|source| Error::ConfigParse { path, source })
            }
            None => Ok(Self::default()),
        }
    }

    /// Combine file patterns with command-line patterns.
    ///
    /// File patterns come first so command-line patterns take precedence.
    #[must_use]
    pub fn ignore_with(&self, extra: &[String]) -> Vec<String> {
        self.ignore.iter().chain(extra).cloned().collect()
    }
}
