//! Pattern Matcher
//!
//! Glob matching over a directory listing, with two additions:
//!
//! - **Extensionless fallback**: `intro` is tried as `intro.md`, then
//!   `intro.markdown`, then `intro.txt`; the first extension with any match wins.
//! - **Template awareness**: every candidate is also tried with each template
//!   suffix (`intro.md.mustache`). When a plain file and its template share a
//!   name, only the plain file is returned.

use std::path::Path;

use glob::{MatchOptions, Pattern};
use tracing::debug;
use walkdir::WalkDir;

use crate::config::{Config, DEFAULT_EXTENSIONS, DEFAULT_TEMPLATE_EXTENSIONS};
use crate::error::{GuideError, Result};
use crate::path::to_slash;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

#[derive(Debug, Clone)]
pub struct PatternMatcher {
    default_extensions: Vec<String>,
    template_extensions: Vec<String>,
}

impl Default for PatternMatcher {
    fn default() -> Self {
        Self::new(
            DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            DEFAULT_TEMPLATE_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }
}

impl PatternMatcher {
    pub fn new(default_extensions: Vec<String>, template_extensions: Vec<String>) -> Self {
        Self {
            default_extensions,
            template_extensions,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.content.default_extensions.clone(),
            config.templates.extensions.clone(),
        )
    }

    /// True when the file name ends in a template suffix.
    pub fn is_template(&self, path: &str) -> bool {
        self.template_suffix(path).is_some()
    }

    /// `guide/intro.md.mustache` -> `guide/intro.md`
    pub fn strip_template_suffix<'a>(&self, path: &'a str) -> &'a str {
        match self.template_suffix(path) {
            Some(ext) => &path[..path.len() - ext.len() - 1],
            None => path,
        }
    }

    fn template_suffix(&self, path: &str) -> Option<&str> {
        self.template_extensions
            .iter()
            .map(String::as_str)
            .find(|ext| {
                path.len() > ext.len() + 1
                    && path.ends_with(ext)
                    && path.as_bytes()[path.len() - ext.len() - 1] == b'.'
            })
    }

    /// Match a single pattern under `dir`.
    pub fn match_pattern(&self, dir: &Path, pattern: &str) -> Result<Vec<String>> {
        self.match_patterns(dir, &[pattern.to_string()])
    }

    /// Match several patterns under `dir`, unioned in pattern order.
    ///
    /// Returns relative `/`-separated paths. A missing directory yields an
    /// empty list.
    pub fn match_patterns(&self, dir: &Path, patterns: &[String]) -> Result<Vec<String>> {
        if patterns.is_empty() {
            return Ok(Vec::new());
        }
        if !dir.is_dir() {
            debug!(dir = %dir.display(), "pattern directory does not exist");
            return Ok(Vec::new());
        }

        let files = list_files(dir);
        let mut matched: Vec<String> = Vec::new();

        for pattern in patterns {
            for path in self.match_listing(&files, pattern)? {
                if !matched.contains(&path) {
                    matched.push(path);
                }
            }
        }

        Ok(self.prefer_plain(matched))
    }

    /// Match one pattern against an existing listing.
    fn match_listing(&self, files: &[String], pattern: &str) -> Result<Vec<String>> {
        for group in self.candidate_groups(pattern) {
            let compiled = group
                .iter()
                .map(|candidate| compile(candidate))
                .collect::<Result<Vec<_>>>()?;

            let hits: Vec<String> = files
                .iter()
                .filter(|file| compiled.iter().any(|p| p.matches_with(file, MATCH_OPTIONS)))
                .cloned()
                .collect();

            if !hits.is_empty() {
                return Ok(hits);
            }
        }
        Ok(Vec::new())
    }

    /// Candidate globs for a pattern, grouped by fallback priority.
    ///
    /// Each group holds the plain candidate followed by its template variants.
    fn candidate_groups(&self, pattern: &str) -> Vec<Vec<String>> {
        let bases: Vec<String> = if is_extensionless(pattern) {
            let stem = if last_segment(pattern) == "**" {
                format!("{}/*", pattern)
            } else {
                pattern.to_string()
            };
            self.default_extensions
                .iter()
                .map(|ext| format!("{}.{}", stem, ext))
                .collect()
        } else {
            vec![pattern.to_string()]
        };

        bases
            .into_iter()
            .map(|base| {
                let mut group = Vec::with_capacity(self.template_extensions.len() + 1);
                for ext in &self.template_extensions {
                    group.push(format!("{}.{}", base, ext));
                }
                group.insert(0, base);
                group
            })
            .collect()
    }

    /// Drop a template when its rendered counterpart is also present.
    fn prefer_plain(&self, matched: Vec<String>) -> Vec<String> {
        let shadowed: Vec<bool> = matched
            .iter()
            .map(|path| {
                self.is_template(path) && {
                    let plain = self.strip_template_suffix(path);
                    matched.iter().any(|other| other == plain)
                }
            })
            .collect();

        matched
            .into_iter()
            .zip(shadowed)
            .filter_map(|(path, shadowed)| (!shadowed).then_some(path))
            .collect()
    }
}

fn compile(pattern: &str) -> Result<Pattern> {
    Pattern::new(pattern).map_err(|e| GuideError::InvalidGlob {
        pattern: pattern.to_string(),
        message: e.msg.to_string(),
    })
}

fn last_segment(pattern: &str) -> &str {
    pattern.rsplit('/').next().unwrap_or(pattern)
}

/// A pattern whose final segment has no `.`
pub fn is_extensionless(pattern: &str) -> bool {
    !last_segment(pattern).contains('.')
}

/// True when the text contains glob metacharacters.
pub fn has_glob_chars(text: &str) -> bool {
    text.contains(['*', '?', '[', ']'])
}

/// Regular files under `dir`, relative and sorted.
fn list_files(dir: &Path) -> Vec<String> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!(error = %e, "skipping unreadable directory entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() || entry.path_is_symlink())
        .filter_map(|entry| {
            entry
                .path()
                .strip_prefix(dir)
                .ok()
                .map(|relative| to_slash(relative))
        })
        .collect()
}
