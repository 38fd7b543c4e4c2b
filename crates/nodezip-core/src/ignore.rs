//! Gitignore-style path matching.
//!
//! Patterns are evaluated in order and the last matching pattern decides,
//! so `!pattern` can re-include something excluded earlier. Paths are
//! archive-relative with `/` separators; directories are queried with a
//! trailing `/` so directory-only patterns such as `build/` apply to them.

use glob::{MatchOptions, Pattern};
use nodezip_util::path::normalize_archive_path;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

#[derive(Debug, Clone)]
struct Rule {
    pattern: Pattern,
    negated: bool,
    dir_only: bool,
    // Matched against the whole relative path instead of the last component.
    anchored: bool,
}

impl Rule {
    fn parse(line: &str) -> Option<Self> {
        if line.starts_with('#') {
            return None;
        }

        let mut body = trim_trailing_spaces(line);
        let mut negated = false;

        if let Some(rest) = body.strip_prefix('!') {
            negated = true;
            body = rest.to_string();
        } else if body.starts_with("\\!") || body.starts_with("\\#") {
            body.remove(0);
        }

        let dir_only = body.ends_with('/');
        let body = body.trim_end_matches('/');
        let anchored = body.contains('/');
        let body = body.trim_start_matches('/');

        if body.is_empty() {
            return None;
        }

        Some(Self {
            pattern: compile(body)?,
            negated,
            dir_only,
            anchored,
        })
    }

    fn matches(&self, path: &str, is_dir: bool) -> bool {
        if self.dir_only && !is_dir {
            return false;
        }

        if self.anchored {
            self.pattern.matches_with(path, MATCH_OPTIONS)
        } else {
            let name = path.rsplit('/').next().unwrap_or(path);
            self.pattern.matches_with(name, MATCH_OPTIONS)
        }
    }
}

/// Compile a glob, falling back to a literal match for malformed globs
/// such as an unclosed `[`.
fn compile(body: &str) -> Option<Pattern> {
    let (glob, literal) = translate_escapes(body);
    Pattern::new(&glob)
        .or_else(|_| Pattern::new(&Pattern::escape(&literal)))
        .ok()
}

/// Rewrite gitignore `\x` escapes for the `glob` crate, which has none.
///
/// Returns the glob source, with escaped metacharacters wrapped in a
/// one-character class, and the unescaped literal text. A trailing lone
/// backslash is kept as is.
fn translate_escapes(body: &str) -> (String, String) {
    let mut glob = String::with_capacity(body.len());
    let mut literal = String::with_capacity(body.len());
    let mut chars = body.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            glob.push(c);
            literal.push(c);
            continue;
        }
        match chars.next() {
            Some(escaped @ ('*' | '?' | '[' | ']')) => {
                glob.push('[');
                glob.push(escaped);
                glob.push(']');
                literal.push(escaped);
            }
            Some(escaped) => {
                glob.push(escaped);
                literal.push(escaped);
            }
            None => {
                glob.push_str("[\\]");
                literal.push('\\');
            }
        }
    }

    (glob, literal)
}

/// Trim trailing spaces unless they are escaped with a backslash.
fn trim_trailing_spaces(line: &str) -> String {
    let trimmed = line.trim_end_matches([' ', '\t', '\r']);
    if trimmed.ends_with('\\') && trimmed.len() < line.len() {
        let mut kept = trimmed[..trimmed.len() - 1].to_string();
        kept.push(' ');
        kept
    } else {
        trimmed.to_string()
    }
}

/// Ordered set of ignore patterns.
#[derive(Debug, Clone, Default)]
pub struct IgnoreMatcher {
    rules: Vec<Rule>,
}

impl IgnoreMatcher {
    /// Build a matcher from patterns in precedence order (later wins).
    ///
    /// Blank lines and `#` comments are skipped. Malformed globs are kept
    /// as literal patterns rather than rejected.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let rules = patterns
            .into_iter()
            .filter_map(|p| Rule::parse(p.as_ref()))
            .collect();
        Self { rules }
    }

    /// A matcher that ignores nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Number of effective patterns (comments and blanks excluded).
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether `path` is ignored.
    ///
    /// A trailing `/` marks a directory. A path inside an ignored directory
    /// is ignored even if a later negation would match it, since the
    /// directory is never descended into.
    #[must_use]
    pub fn ignores(&self, path: &str) -> bool {
        if self.rules.is_empty() {
            return false;
        }

        let is_dir = path.ends_with('/') || path.ends_with('\\');
        let path = normalize_archive_path(path);
        if path.is_empty() {
            return false;
        }

        for (idx, _) in path.match_indices('/') {
            if self.decide(&path[..idx], true) {
                return true;
            }
        }

        self.decide(&path, is_dir)
    }

    /// Test a single walker entry whose ancestors are known not to be ignored.
    pub(crate) fn ignores_entry(&self, path: &str, is_dir: bool) -> bool {
        !self.rules.is_empty() && self.decide(path, is_dir)
    }

    fn decide(&self, path: &str, is_dir: bool) -> bool {
        self.rules
            .iter()
            .rev()
            .find(|rule| rule.matches(path, is_dir))
            .is_some_and(|rule| !rule.negated)
    }
}
