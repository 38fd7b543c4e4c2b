//! `nodezip deps` command implementation.
//!
//! Installs the named dependencies with the project's package manager in a
//! scratch directory and lists the archive entries of the result. The
//! scratch directory is removed before the command exits, so listed source
//! paths are informational.

use super::{output, resolve};
use futures::TryStreamExt;
use miette::{IntoDiagnostic, Result};
use nodezip_core::{
    install_packages, Config, EntryError, IgnoreMatcher, InstallOptions, SystemRunner,
    DEFAULT_PACKAGE_PREFIX,
};
use std::path::PathBuf;

/// Arguments of `nodezip deps`.
#[derive(Debug)]
pub struct DepsArgs {
    pub names: Vec<String>,
    pub package_json: PathBuf,
    pub lockfile: PathBuf,
    pub prefix: Option<String>,
    pub arch: Option<String>,
    pub platform: Option<String>,
    pub ignore: Vec<String>,
}

pub fn run(config: &Config, args: &DepsArgs, json: bool) -> Result<()> {
    let project = config.project().into_diagnostic()?;

    let options = InstallOptions::new(
        resolve(&config.cwd, &args.package_json),
        resolve(&config.cwd, &args.lockfile),
        args.names.clone(),
    )
    .with_arch(args.arch.clone().or(project.arch.clone()))
    .with_platform(args.platform.clone().or(project.platform.clone()));

    let prefix = args
        .prefix
        .as_deref()
        .or(project.prefix.as_deref())
        .unwrap_or(DEFAULT_PACKAGE_PREFIX);
    let ignore = IgnoreMatcher::new(project.ignore_with(&args.ignore));

    let rt = tokio::runtime::Runtime::new().into_diagnostic()?;
    let result = rt.block_on(async {
        let installed = install_packages(&options, &SystemRunner).await?;
        let entries = installed
            .entries(prefix, ignore)
            .await?
            .try_collect::<Vec<_>>()
            .await?;
        Ok::<_, EntryError>(entries)
    });

    output::report(result, json)
}
