#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

//! Core of nodezip.
//!
//! Produces lazy streams of archive entries from folders on disk and from
//! the `node_modules` tree left behind by npm, yarn or pnpm.

pub mod config;
pub mod entry;
pub mod error;
pub mod ignore;
pub mod install;
pub mod layout;
pub mod version;
pub mod walk;

pub use config::{Config, ProjectConfig, PROJECT_CONFIG_NAME};
pub use entry::{ArchiveEntry, EntryContent, EntryStream};
pub use error::{codes as entry_codes, EntryError, Error, ErrorClass};
pub use ignore::IgnoreMatcher;
pub use install::{
    install_packages, CommandRunner, InstallCommand, InstallOptions, InstalledPackages,
    ManifestSlice, SystemRunner, DEFAULT_PACKAGE_PREFIX,
};
pub use layout::{resolve_package_entries, HoistMap, PackageManager, MODULES_MANIFEST_NAME};
pub use version::{BuildInfo, VERSION};
pub use walk::{walk_folder, WalkRequest};
