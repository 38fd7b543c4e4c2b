//! Archive path helpers.
//!
//! Archive paths always use `/` separators and never carry a leading slash,
//! whatever the host path conventions are.

/// Normalize a caller-supplied archive path or prefix.
///
/// Backslashes become `/`, empty and `.` components are dropped, so `"/"`,
/// `""` and `"./"` all normalize to the archive root (`""`). Not for names
/// read from disk: on Unix `\` is an ordinary file-name character.
#[must_use]
pub fn normalize_archive_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for component in path.split(['/', '\\']) {
        if component.is_empty() || component == "." {
            continue;
        }
        if !out.is_empty() {
            out.push('/');
        }
        out.push_str(component);
    }
    out
}

/// Join an archive prefix with a path relative to it.
///
/// Both sides are normalized first. An empty prefix yields the relative path
/// unchanged.
#[must_use]
pub fn join_archive_path(prefix: &str, relative: &str) -> String {
    let prefix = normalize_archive_path(prefix);
    let relative = normalize_archive_path(relative);

    match (prefix.is_empty(), relative.is_empty()) {
        (true, _) => relative,
        (false, true) => prefix,
        (false, false) => format!("{prefix}/{relative}"),
    }
}

/// Append a single path component to a relative archive path.
///
/// `parent` must already be normalized. `name` is appended verbatim, so a
/// host file name keeps any backslashes it contains.
#[must_use]
pub fn child_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        let mut out = String::with_capacity(parent.len() + 1 + name.len());
        out.push_str(parent);
        out.push('/');
        out.push_str(name);
        out
    }
}
