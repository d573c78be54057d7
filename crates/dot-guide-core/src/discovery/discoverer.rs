//! File Discoverer
//!
//! Turns a category (dir + patterns) into `FileInfo`s, keeping every result
//! inside the docroot.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::file_info::FileInfo;
use super::pattern::PatternMatcher;
use crate::category::Category;
use crate::error::{GuideError, Result};
use crate::path::{has_escaping_component, is_within, resolve_within};

pub struct FileDiscoverer {
    docroot: PathBuf,
    matcher: PatternMatcher,
}

impl FileDiscoverer {
    pub fn new(docroot: impl Into<PathBuf>, matcher: PatternMatcher) -> Self {
        Self {
            docroot: docroot.into(),
            matcher,
        }
    }

    /// Absolute category directory, guaranteed to be under the docroot.
    pub fn category_dir(&self, category: &Category) -> Result<PathBuf> {
        resolve_within(&self.docroot, &category.dir)
    }

    /// True when `segment` names an existing directory inside the category.
    pub fn is_subdirectory(&self, category: &Category, segment: &str) -> bool {
        let segment = segment.trim_end_matches('/');
        if segment.is_empty() || has_escaping_component(Path::new(segment)) {
            return false;
        }
        self.category_dir(category)
            .map(|dir| dir.join(segment).is_dir())
            .unwrap_or(false)
    }

    /// Discover files for a category.
    ///
    /// `override_patterns` replaces the category's own patterns.
    pub fn discover(
        &self,
        category: &Category,
        override_patterns: Option<&[String]>,
    ) -> Result<Vec<FileInfo>> {
        let patterns = override_patterns.unwrap_or(&category.patterns);
        let dir = self.category_dir(category)?;
        let matched = self.matcher.match_patterns(&dir, patterns)?;
        Ok(self.describe(category, &dir, matched))
    }

    /// Discover the category's files below `subdir` only.
    pub fn discover_subdir(&self, category: &Category, subdir: &str) -> Result<Vec<FileInfo>> {
        let subdir = subdir.trim_end_matches('/');
        if has_escaping_component(Path::new(subdir)) {
            return Err(GuideError::PathEscape {
                path: PathBuf::from(subdir),
            });
        }

        let prefix = format!("{}/", subdir);
        let patterns: Vec<String> = category
            .patterns
            .iter()
            .map(|pattern| format!("{}{}", prefix, pattern))
            .collect();

        let dir = self.category_dir(category)?;
        let matched = self
            .matcher
            .match_patterns(&dir, &patterns)?
            .into_iter()
            .filter(|path| path.starts_with(&prefix))
            .collect();
        Ok(self.describe(category, &dir, matched))
    }

    fn describe(&self, category: &Category, dir: &Path, matched: Vec<String>) -> Vec<FileInfo> {
        matched
            .into_iter()
            .filter_map(|relative| self.stat(category, dir, relative))
            .collect()
    }

    /// Stat a single match. Any failure drops the file; it may have been
    /// removed since the listing.
    fn stat(&self, category: &Category, dir: &Path, relative: String) -> Option<FileInfo> {
        let absolute = dir.join(&relative);

        let canonical = match absolute.canonicalize() {
            Ok(path) => path,
            Err(e) => {
                debug!(path = %absolute.display(), error = %e, "skipping file that vanished");
                return None;
            }
        };
        if !is_within(&self.docroot, &canonical) {
            warn!(path = %absolute.display(), "skipping file that resolves outside the docroot");
            return None;
        }

        let metadata = match fs::metadata(&canonical) {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => return None,
            Err(e) => {
                debug!(path = %absolute.display(), error = %e, "skipping file that failed stat");
                return None;
            }
        };

        let rendered_path = self.matcher.strip_template_suffix(&relative).to_string();
        let basename = rendered_path
            .rsplit('/')
            .next()
            .unwrap_or(&rendered_path)
            .to_string();

        Some(FileInfo {
            template: self.matcher.is_template(&relative),
            basename,
            rendered_path,
            category: category.name.clone(),
            collection: None,
            size: metadata.len(),
            mtime: metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| DateTime::<Utc>::from(std::time::UNIX_EPOCH)),
            ctime: metadata.created().ok().map(DateTime::<Utc>::from),
            absolute_path: canonical,
            path: relative,
            content: None,
        })
    }
}
