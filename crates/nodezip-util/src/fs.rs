use std::fs;
use std::io;
use std::path::Path;

/// Read a file to string, replacing invalid UTF-8 sequences with the replacement character.
///
/// # Errors
/// Returns an error if the file cannot be read.
pub fn read_to_string_lossy(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Read a file if it exists.
///
/// Returns `Ok(None)` when the file is absent so callers can treat optional
/// configuration files without racing an `exists()` check.
///
/// # Errors
/// Returns an error if the file exists but cannot be read.
pub fn read_optional_lossy(path: &Path) -> io::Result<Option<String>> {
    match read_to_string_lossy(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
