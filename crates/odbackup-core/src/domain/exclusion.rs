//! Exclusion rules
//!
//! A path is excluded when any configured pattern occurs in it as a
//! case-insensitive substring. The filter holds no state about previous
//! observations, so callers re-evaluate it on every sighting of an entity.

/// Case-insensitive substring matcher over relative paths
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionFilter {
    /// Lowercased patterns, in configuration order
    patterns: Vec<String>,
}

impl ExclusionFilter {
    /// Builds a filter from configured patterns
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// Returns true if `path` matches any pattern
    pub fn is_excluded(&self, path: &str) -> bool {
        if self.patterns.is_empty() {
            return false;
        }
        let haystack = path.to_lowercase();
        self.patterns.iter().any(|p| haystack.contains(p.as_str()))
    }

    /// Returns true if no patterns are configured
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
