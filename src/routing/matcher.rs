//! Path exclusion matching.
//!
//! # Responsibilities
//! - Match path prefixes (case-sensitive)
//! - Match exact paths
//! - Match trailing file extensions (case-sensitive)
//! - Combine rules with OR semantics
//!
//! # Design Decisions
//! - Only the URI path is considered, never the query string
//! - Paths arrive already normalized (see `normalize.rs`)
//! - No regex to guarantee O(n) matching

use crate::config::ExclusionConfig;

/// Trait for matching request paths against a rule.
pub trait PathMatcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the path matches this rule.
    fn matches(&self, path: &str) -> bool;
}

/// Matches a path prefix.
#[derive(Debug, Clone)]
pub struct PrefixMatcher {
    prefix: String,
}

impl PrefixMatcher {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl PathMatcher for PrefixMatcher {
    fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.prefix)
    }
}

/// Matches one exact path.
#[derive(Debug, Clone)]
pub struct ExactMatcher {
    path: String,
}

impl ExactMatcher {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl PathMatcher for ExactMatcher {
    fn matches(&self, path: &str) -> bool {
        path == self.path
    }
}

/// Matches paths ending in `.<ext>` for any of the given extensions.
#[derive(Debug, Clone)]
pub struct ExtensionMatcher {
    suffixes: Vec<String>,
}

impl ExtensionMatcher {
    /// Extensions are given without the dot.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            suffixes: extensions
                .into_iter()
                .map(|ext| format!(".{}", ext.as_ref()))
                .collect(),
        }
    }
}

impl PathMatcher for ExtensionMatcher {
    fn matches(&self, path: &str) -> bool {
        self.suffixes.iter().any(|suffix| path.ends_with(suffix.as_str()))
    }
}

/// The set of paths the gate must not touch. Any rule matching excludes.
#[derive(Debug, Default)]
pub struct ExclusionSet {
    matchers: Vec<Box<dyn PathMatcher>>,
}

impl ExclusionSet {
    /// Compile the configured rules.
    pub fn from_config(config: &ExclusionConfig) -> Self {
        let mut matchers: Vec<Box<dyn PathMatcher>> = Vec::new();
        for prefix in &config.prefixes {
            matchers.push(Box::new(PrefixMatcher::new(prefix.as_str())));
        }
        for path in &config.exact {
            matchers.push(Box::new(ExactMatcher::new(path.as_str())));
        }
        if !config.extensions.is_empty() {
            matchers.push(Box::new(ExtensionMatcher::new(&config.extensions)));
        }
        Self { matchers }
    }

    /// Returns true if the gate should be bypassed for this path.
    pub fn is_excluded(&self, path: &str) -> bool {
        self.matchers.iter().any(|m| m.matches(path))
    }
}
