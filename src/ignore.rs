//! Ignore rules for excluded paths.
//!
//! Consulted before a Create event is admitted into the tree: ignored paths
//! are never inserted and never contribute to ancestor hashes. A pattern
//! matches either an exact entry name anywhere in the path (e.g. `.git`,
//! `target`) or a root-relative path prefix (e.g. `build/cache`).

use crate::tree::path::TreePath;

/// Built-in defaults, always active unless rules are constructed empty.
const BUILTIN_DEFAULTS: &[&str] = &[".git", "target", "node_modules", ".cargo"];

/// Pattern list predicate over tree paths.
#[derive(Debug, Clone)]
pub struct IgnoreList {
    names: Vec<String>,
    prefixes: Vec<Vec<String>>,
}

impl IgnoreList {
    /// Rules containing only the built-in defaults.
    pub fn builtin() -> Self {
        Self::from_patterns(BUILTIN_DEFAULTS.iter().map(|s| s.to_string()))
    }

    /// Rules matching nothing.
    pub fn empty() -> Self {
        Self {
            names: Vec::new(),
            prefixes: Vec::new(),
        }
    }

    /// Build rules from pattern strings. Patterns containing `/` are
    /// treated as root-relative prefixes; bare names match any segment.
    pub fn from_patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut names = Vec::new();
        let mut prefixes = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref().trim().trim_matches('/');
            if pattern.is_empty() {
                continue;
            }
            if pattern.contains('/') {
                prefixes.push(pattern.split('/').map(|s| s.to_string()).collect());
            } else {
                names.push(pattern.to_string());
            }
        }
        Self { names, prefixes }
    }

    /// True if the path (or any of its ancestors) matches a rule.
    pub fn should_ignore(&self, path: &TreePath) -> bool {
        for segment in path.segments() {
            if self.names.iter().any(|n| n == segment) {
                return true;
            }
        }
        for prefix in &self.prefixes {
            if path.segments().len() >= prefix.len()
                && path.segments()[..prefix.len()] == prefix[..]
            {
                return true;
            }
        }
        false
    }
}

impl Default for IgnoreList {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> TreePath {
        TreePath::parse(s).unwrap()
    }

    #[test]
    fn test_builtin_defaults_match_anywhere() {
        let rules = IgnoreList::builtin();
        assert!(rules.should_ignore(&p("/.git")));
        assert!(rules.should_ignore(&p("/sub/.git/config")));
        assert!(rules.should_ignore(&p("/target/debug/app")));
        assert!(!rules.should_ignore(&p("/src/main.rs")));
    }

    #[test]
    fn test_prefix_patterns_are_root_relative() {
        let rules = IgnoreList::from_patterns(["build/cache"]);
        assert!(rules.should_ignore(&p("/build/cache")));
        assert!(rules.should_ignore(&p("/build/cache/deep/file")));
        assert!(!rules.should_ignore(&p("/other/build/cache")));
        assert!(!rules.should_ignore(&p("/build")));
    }

    #[test]
    fn test_empty_matches_nothing() {
        let rules = IgnoreList::empty();
        assert!(!rules.should_ignore(&p("/.git")));
        assert!(!rules.should_ignore(&p("/")));
    }
}
