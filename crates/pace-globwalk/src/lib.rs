//! Glob expansion and matching for task inputs and outputs.
//!
//! Patterns support literal names, `?`, `*`, character classes and `**`.
//! Expansion is anchored to an explicit base directory rather than the
//! process working directory so that concurrent runs (and tests) cannot
//! observe each other.

use std::path::{Path, PathBuf};

use glob::{glob_with, MatchOptions, Pattern};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum WalkError {
    #[error("bad pattern {pattern}: {source}")]
    BadPattern {
        pattern: String,
        source: glob::PatternError,
    },
}

fn match_options() -> MatchOptions {
    MatchOptions {
        case_sensitive: true,
        // `*` and `?` must not cross path separators, only `**` walks
        // directories.
        require_literal_separator: true,
        require_literal_leading_dot: false,
    }
}

/// Expand a single pattern under `base`, returning matches relative to
/// `base` in deterministic lexicographic order.
///
/// A pattern that matches nothing yields an empty list, not an error.
pub fn globwalk(base: &Path, pattern: &str) -> Result<Vec<PathBuf>, WalkError> {
    let anchored = if Path::new(pattern).is_absolute() {
        pattern.to_string()
    } else {
        base.join(pattern).to_string_lossy().into_owned()
    };

    let entries = glob_with(&anchored, match_options()).map_err(|source| WalkError::BadPattern {
        pattern: pattern.to_string(),
        source,
    })?;

    let mut matches = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) => {
                let relative = path
                    .strip_prefix(base)
                    .map(Path::to_path_buf)
                    .unwrap_or(path);
                matches.push(relative);
            }
            // An unreadable directory mid-walk is treated the same way as a
            // missing file: the entry is skipped.
            Err(e) => debug!("skipping unreadable glob entry: {e}"),
        }
    }
    matches.sort();
    Ok(matches)
}

/// Check whether `path` matches `pattern`.
///
/// The full path is matched, not just the file name, and separators are
/// normalized so the same patterns work on every platform. A malformed
/// pattern matches nothing.
pub fn matches(pattern: &str, path: &Path) -> bool {
    let Ok(pattern) = Pattern::new(&normalize(pattern)) else {
        return false;
    };
    pattern.matches_with(&normalize(&path.to_string_lossy()), match_options())
}

fn normalize(path: &str) -> String {
    if std::path::MAIN_SEPARATOR == '/' {
        path.to_string()
    } else {
        path.replace(std::path::MAIN_SEPARATOR, "/")
    }
}

#[cfg(test)]
mod test {
    use std::fs;

    use test_case::test_case;

    use super::*;

    fn setup() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/nested")).unwrap();
        fs::create_dir_all(root.join("docs")).unwrap();
        fs::write(root.join("src/main.go"), "package main").unwrap();
        fs::write(root.join("src/util.go"), "package main").unwrap();
        fs::write(root.join("src/nested/deep.go"), "package nested").unwrap();
        fs::write(root.join("docs/readme.md"), "# readme").unwrap();
        fs::write(root.join("config.json"), "{}").unwrap();
        dir
    }

    #[test]
    fn test_single_star_stays_in_directory() {
        let dir = setup();
        let found = globwalk(dir.path(), "src/*.go").unwrap();
        assert_eq!(
            found,
            vec![PathBuf::from("src/main.go"), PathBuf::from("src/util.go")]
        );
    }

    #[test]
    fn test_double_star_walks_segments() {
        let dir = setup();
        let found = globwalk(dir.path(), "src/**/*.go").unwrap();
        assert_eq!(
            found,
            vec![
                PathBuf::from("src/main.go"),
                PathBuf::from("src/nested/deep.go"),
                PathBuf::from("src/util.go"),
            ]
        );
    }

    #[test]
    fn test_missing_pattern_is_empty_not_error() {
        let dir = setup();
        let found = globwalk(dir.path(), "build/*.o").unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_literal_name() {
        let dir = setup();
        let found = globwalk(dir.path(), "config.json").unwrap();
        assert_eq!(found, vec![PathBuf::from("config.json")]);
    }

    #[test]
    fn test_expansion_order_is_lexicographic() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.txt", "c.txt", "a.txt"] {
            fs::write(dir.path().join(name), name).unwrap();
        }
        let found = globwalk(dir.path(), "*.txt").unwrap();
        assert_eq!(
            found,
            vec![
                PathBuf::from("a.txt"),
                PathBuf::from("b.txt"),
                PathBuf::from("c.txt"),
            ]
        );
    }

    #[test]
    fn test_bad_pattern_is_an_error() {
        let dir = setup();
        assert!(globwalk(dir.path(), "src/[").is_err());
    }

    #[test_case("src/*.go", "src/main.go", true ; "star in directory")]
    #[test_case("src/*.go", "src/nested/deep.go", false ; "star does not cross separators")]
    #[test_case("src/**/*.go", "src/nested/deep.go", true ; "double star crosses separators")]
    #[test_case("*.go", "src/main.go", false ; "full path is matched, not the basename")]
    #[test_case("src/ma?n.go", "src/main.go", true ; "question mark")]
    #[test_case("src/[mu]*.go", "src/util.go", true ; "character class")]
    #[test_case("src/[", "src/main.go", false ; "malformed pattern matches nothing")]
    fn test_matches(pattern: &str, path: &str, expected: bool) {
        assert_eq!(matches(pattern, Path::new(path)), expected);
    }
}
