//! Category and Collection definitions
//!
//! Both are owned by the store and read-only to the pipeline.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GuideError, Result};
use crate::path::has_escaping_component;

/// Maximum length of a category or collection name
pub const MAX_NAME_LEN: usize = 30;

/// Characters reserved by the expression syntax
const RESERVED_NAME_CHARS: &[char] = &['/', ',', '+'];

/// A named directory plus glob patterns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    /// Directory relative to the docroot
    pub dir: String,
    /// Glob patterns, in priority order. Empty means "serve nothing".
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Category {
    pub fn new(name: impl Into<String>, dir: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
            patterns: Vec::new(),
            description: None,
        }
    }

    pub fn with_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        validate_relative_dir(&self.dir)
    }
}

/// A named group of categories and nested collections.
///
/// Each member entry uses the expression term syntax, so `"policies/security*"`
/// names the `policies` category with its own pattern override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub name: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Override applied to every member that has none of its own
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patterns: Vec<String>,
}

impl Collection {
    pub fn new<I, S>(name: impl Into<String>, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            categories: categories.into_iter().map(Into::into).collect(),
            description: None,
            patterns: Vec::new(),
        }
    }

    pub fn with_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Pattern override for the whole collection, if any
    pub fn pattern_override(&self) -> Option<&[String]> {
        if self.patterns.is_empty() {
            None
        } else {
            Some(&self.patterns)
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)
    }
}

/// Validate a category or collection name.
pub fn validate_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| {
        Err(GuideError::InvalidName {
            name: name.to_string(),
            reason: reason.to_string(),
        })
    };

    if name.is_empty() {
        return invalid("name must not be empty");
    }
    if name.chars().count() > MAX_NAME_LEN {
        return invalid("name must be at most 30 characters");
    }
    if name.starts_with('_') || name.starts_with('-') {
        return invalid("name must not start with '_' or '-'");
    }
    if name.chars().any(char::is_whitespace) {
        return invalid("name must not contain whitespace");
    }
    if name.contains(RESERVED_NAME_CHARS) {
        return invalid("name must not contain '/', ',' or '+'");
    }
    Ok(())
}

/// A category dir must stay relative and never climb out of the docroot.
fn validate_relative_dir(dir: &str) -> Result<()> {
    if has_escaping_component(Path::new(dir)) {
        return Err(GuideError::PathEscape {
            path: PathBuf::from(dir),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert!(validate_name("guidelines").is_ok());
        assert!(validate_name("team-docs_v2").is_ok());
        assert!(validate_name(&"a".repeat(30)).is_ok());
    }

    #[test]
    fn test_invalid_names() {
        assert!(validate_name("").is_err());
        assert!(validate_name(&"a".repeat(31)).is_err());
        assert!(validate_name("_private").is_err());
        assert!(validate_name("-flag").is_err());
        assert!(validate_name("two words").is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name("a,b").is_err());
    }

    #[test]
    fn test_category_dir_must_stay_relative() {
        assert!(Category::new("docs", "docs/api").validate().is_ok());
        assert!(Category::new("docs", "../outside").validate().is_err());
        assert!(Category::new("docs", "/etc").validate().is_err());
    }

    #[test]
    fn test_collection_override() {
        let plain = Collection::new("team", ["guidelines"]);
        assert!(plain.pattern_override().is_none());

        let narrowed = plain.with_patterns(["*.md"]);
        assert_eq!(narrowed.pattern_override().unwrap(), ["*.md".to_string()]);
    }
}
