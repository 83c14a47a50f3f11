//! `.gyattignore` matching: shell globs (`*`, `?`, `[set]`) with `!`
//! negation and `#` comments. A path is ignored when the last matching
//! pattern for it (or for any of its directory prefixes) is not negated.
//! The metadata directory is always ignored.

use std::path::{Path, PathBuf};

use glob::Pattern;

use crate::internal::errors::GyattError;
use crate::utils::util;

/// Content written by `init`.
pub const DEFAULT_IGNORE: &str = "\
# gyatt metadata
.gyatt/

# build artifacts
*.o
*.obj
*.exe
target/
build/

# editor and OS cruft
.DS_Store
*.swp
*~
";

struct IgnoreRule {
    pattern: Pattern,
    negated: bool,
    /// Directory patterns (written with a trailing slash) also match
    /// everything below the named directory.
    dir_only: bool,
}

pub struct IgnoreMatcher {
    rules: Vec<IgnoreRule>,
}

impl IgnoreMatcher {
    /// Load the root `.gyattignore` of the current repository; a missing
    /// file yields a matcher with only the implicit metadata rule.
    pub fn load() -> Result<IgnoreMatcher, GyattError> {
        let file = util::working_dir()?.join(util::IGNORE_FILE);
        if !file.exists() {
            return Ok(IgnoreMatcher { rules: Vec::new() });
        }
        IgnoreMatcher::from_content(&std::fs::read_to_string(file)?)
    }

    pub fn from_content(content: &str) -> Result<IgnoreMatcher, GyattError> {
        let mut rules = Vec::new();
        for raw in content.lines() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (negated, body) = match line.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, line),
            };
            let (dir_only, body) = match body.strip_suffix('/') {
                Some(rest) => (true, rest),
                None => (false, body),
            };
            let pattern = Pattern::new(body)
                .map_err(|e| GyattError::BadFormat(format!("ignore pattern '{line}': {e}")))?;
            rules.push(IgnoreRule {
                pattern,
                negated,
                dir_only,
            });
        }
        Ok(IgnoreMatcher { rules })
    }

    /// Decide for a repository-root-relative path. Later rules override
    /// earlier ones; directory prefixes are consulted as well so ignoring
    /// `build/` covers everything below it. The metadata directory and the
    /// ignore file itself are always ignored.
    pub fn is_ignored(&self, rel: &Path) -> bool {
        let rel_str = util::path_to_string(rel);
        if rel_str == util::ROOT_DIR
            || rel_str.starts_with(&format!("{}/", util::ROOT_DIR))
            || rel_str == util::IGNORE_FILE
        {
            return true;
        }

        let mut candidates = vec![rel_str.clone()];
        let mut prefix = PathBuf::new();
        for component in rel.components() {
            prefix.push(component);
            let p = util::path_to_string(&prefix);
            if p != rel_str {
                candidates.push(p);
            }
        }

        let mut ignored = false;
        for rule in &self.rules {
            let matched = candidates.iter().enumerate().any(|(i, candidate)| {
                // index 0 is the full path; the rest are directory prefixes
                if rule.dir_only && i == 0 && candidates.len() == 1 {
                    // a file never matches a dir-only rule by its own name
                    return false;
                }
                rule.pattern.matches(candidate)
            });
            if matched {
                ignored = !rule.negated;
            }
        }
        ignored
    }

    /// Retain only the non-ignored paths.
    pub fn filter_workdir_paths(&self, paths: Vec<PathBuf>) -> Vec<PathBuf> {
        paths
            .into_iter()
            .filter(|p| !self.is_ignored(p))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_dir_is_always_ignored() {
        let matcher = IgnoreMatcher::from_content("").unwrap();
        assert!(matcher.is_ignored(Path::new(".gyatt/index")));
        assert!(matcher.is_ignored(Path::new(".gyatt")));
        assert!(matcher.is_ignored(Path::new(".gyattignore")));
        assert!(!matcher.is_ignored(Path::new("a.txt")));
    }

    #[test]
    fn negation_overrides_earlier_match() {
        let matcher = IgnoreMatcher::from_content("*.log\n!important.log\n").unwrap();
        assert!(matcher.is_ignored(Path::new("x.log")));
        assert!(!matcher.is_ignored(Path::new("important.log")));
        assert!(!matcher.is_ignored(Path::new("x.txt")));
    }

    #[test]
    fn later_pattern_wins_over_negation() {
        let matcher = IgnoreMatcher::from_content("!keep.log\n*.log\n").unwrap();
        assert!(matcher.is_ignored(Path::new("keep.log")));
    }

    #[test]
    fn directory_pattern_covers_contents() {
        let matcher = IgnoreMatcher::from_content("build/\ntarget/\n").unwrap();
        assert!(matcher.is_ignored(Path::new("build/out.bin")));
        assert!(matcher.is_ignored(Path::new("target/debug/app")));
        assert!(!matcher.is_ignored(Path::new("src/build.rs")));
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let matcher = IgnoreMatcher::from_content("# comment\n\n*.tmp\n").unwrap();
        assert!(matcher.is_ignored(Path::new("a.tmp")));
        assert!(!matcher.is_ignored(Path::new("# comment")));
    }

    #[test]
    fn is_ignored_is_idempotent() {
        let matcher = IgnoreMatcher::from_content(DEFAULT_IGNORE).unwrap();
        for path in ["a.o", "src/lib.rs", "target/x", ".DS_Store"] {
            let first = matcher.is_ignored(Path::new(path));
            let second = matcher.is_ignored(Path::new(path));
            assert_eq!(first, second);
        }
    }

    #[test]
    fn character_classes_match() {
        let matcher = IgnoreMatcher::from_content("file[0-9].txt\nnote?.md\n").unwrap();
        assert!(matcher.is_ignored(Path::new("file3.txt")));
        assert!(!matcher.is_ignored(Path::new("fileA.txt")));
        assert!(matcher.is_ignored(Path::new("note1.md")));
        assert!(!matcher.is_ignored(Path::new("note12.md")));
    }
}
