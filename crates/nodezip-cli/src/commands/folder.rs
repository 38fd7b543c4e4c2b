//! `nodezip folder` command implementation.
//!
//! Walks a folder and lists the archive entries it would contribute.

use super::{output, resolve};
use futures::TryStreamExt;
use miette::{IntoDiagnostic, Result};
use nodezip_core::{walk_folder, Config, IgnoreMatcher, WalkRequest};
use std::path::Path;
use tracing::debug;

pub fn run(
    config: &Config,
    source: &Path,
    prefix: Option<&str>,
    ignore: &[String],
    json: bool,
) -> Result<()> {
    let project = config.project().into_diagnostic()?;

    let source = resolve(&config.cwd, source);
    let prefix = prefix.or(project.prefix.as_deref()).unwrap_or("");
    let ignore = IgnoreMatcher::new(project.ignore_with(ignore));
    debug!(
        source = %source.display(),
        prefix,
        patterns = ignore.len(),
        "listing folder"
    );

    let request = WalkRequest::new(source)
        .with_archive_prefix(prefix)
        .with_ignore(ignore);

    let rt = tokio::runtime::Runtime::new().into_diagnostic()?;
    let result = rt.block_on(walk_folder(request).try_collect::<Vec<_>>());

    output::report(result, json)
}
