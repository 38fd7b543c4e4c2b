//! Printing entry listings and failures.

use miette::Result;
use nodezip_core::{ArchiveEntry, EntryError};
use serde::Serialize;

#[derive(Serialize)]
struct ListedEntry<'a> {
    path: &'a str,
    source: String,
}

#[derive(Serialize)]
struct Listing<'a> {
    ok: bool,
    count: usize,
    entries: Vec<ListedEntry<'a>>,
}

/// Print the outcome of an enumeration.
///
/// Entries are sorted by archive path so repeated runs print the same
/// listing. In JSON mode a failure is printed to stdout and the process
/// exits 1; otherwise it becomes a diagnostic.
pub fn report(result: Result<Vec<ArchiveEntry>, EntryError>, json: bool) -> Result<()> {
    let mut entries = match result {
        Ok(entries) => entries,
        Err(err) => return fail(&err, json),
    };
    entries.sort_by(|a, b| a.archive_path().cmp(b.archive_path()));

    if json {
        let listing = Listing {
            ok: true,
            count: entries.len(),
            entries: entries
                .iter()
                .map(|e| ListedEntry {
                    path: e.archive_path(),
                    source: e.content().source_path().to_string_lossy().into_owned(),
                })
                .collect(),
        };
        println!("{}", serde_json::to_string_pretty(&listing).unwrap_or_default());
    } else {
        for entry in &entries {
            println!("{}", entry.archive_path());
        }
        println!("\n{} entries", entries.len());
    }

    Ok(())
}

/// Report a failed command.
pub fn fail(err: &EntryError, json: bool) -> Result<()> {
    if json {
        let mut error = serde_json::json!({
            "code": err.code(),
            "message": err.message(),
        });
        if let Some(code) = err.exit_code() {
            error["exitCode"] = code.into();
        }
        println!("{}", serde_json::json!({ "ok": false, "error": error }));
        std::process::exit(1);
    }

    Err(miette::miette!(
        code = err.code(),
        help = help_for(err),
        "{}",
        err.message()
    ))
}

fn help_for(err: &EntryError) -> &'static str {
    use nodezip_core::ErrorClass;

    match err.class() {
        ErrorClass::Configuration => "check the package.json, lockfile and dependency names",
        ErrorClass::Install => "the package manager output above has the details",
        ErrorClass::Layout => "the installed node_modules tree is incomplete; reinstall",
        ErrorClass::Filesystem => "check that the folder exists and is readable",
    }
}
