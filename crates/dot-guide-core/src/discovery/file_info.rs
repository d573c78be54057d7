use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::error::{GuideError, Result};

/// A discovered file plus (after `load_content`) its text.
#[derive(Debug, Clone, Serialize)]
pub struct FileInfo {
    /// Path relative to the category dir, `/`-separated
    pub path: String,
    /// File name without any template suffix
    pub basename: String,
    pub category: String,
    /// Set only when reached through a collection
    pub collection: Option<String>,
    /// Bytes on disk; replaced by the rendered size for templates
    pub size: u64,
    pub mtime: DateTime<Utc>,
    /// `None` where the platform has no creation time
    pub ctime: Option<DateTime<Utc>>,
    /// Whether the file is rendered as a template
    pub template: bool,
    /// Path with the template suffix removed
    pub rendered_path: String,
    /// De-duplication identity
    #[serde(skip)]
    pub absolute_path: PathBuf,
    #[serde(skip)]
    pub content: Option<String>,
}

impl FileInfo {
    /// Read the file once; later calls reuse the loaded text.
    ///
    /// Bytes that are not UTF-8 become U+FFFD rather than an error.
    pub fn load_content(&mut self) -> Result<&str> {
        if self.content.is_none() {
            let bytes = fs::read(&self.absolute_path).map_err(|source| GuideError::FileRead {
                path: self.absolute_path.clone(),
                source,
            })?;
            let text = match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(e) => {
                    debug!(
                        path = %self.absolute_path.display(),
                        "content is not valid UTF-8, decoding lossily"
                    );
                    String::from_utf8_lossy(e.as_bytes()).into_owned()
                }
            };
            self.content = Some(text);
        }
        Ok(self.content.as_deref().unwrap_or_default())
    }

    /// Extension of the rendered file (`md` for `intro.md.mustache`)
    pub fn extension(&self) -> Option<&str> {
        let name = self.rendered_path.rsplit('/').next()?;
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() {
            None
        } else {
            Some(ext)
        }
    }
}

#[cfg(test)]
pub(crate) fn sample(path: &str, category: &str) -> FileInfo {
    FileInfo {
        path: path.to_string(),
        basename: path.rsplit('/').next().unwrap_or(path).to_string(),
        category: category.to_string(),
        collection: None,
        size: 0,
        mtime: DateTime::<Utc>::from(std::time::UNIX_EPOCH),
        ctime: None,
        template: false,
        rendered_path: path.to_string(),
        absolute_path: PathBuf::from("/docs").join(category).join(path),
        content: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_uses_rendered_path() {
        let mut file = sample("guide/intro.md.mustache", "docs");
        file.rendered_path = "guide/intro.md".to_string();
        assert_eq!(file.extension(), Some("md"));

        let dotfile = sample(".profile", "docs");
        assert_eq!(dotfile.extension(), None);
    }

    #[test]
    fn test_load_content_reads_once() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("a.md");
        fs::write(&path, "Hello").unwrap();

        let mut file = sample("a.md", "docs");
        file.absolute_path = path.clone();
        assert_eq!(file.load_content().unwrap(), "Hello");

        fs::remove_file(&path).unwrap();
        assert_eq!(file.load_content().unwrap(), "Hello");
    }

    #[test]
    fn test_load_content_tolerates_latin1() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("cafe.md");
        fs::write(&path, b"caf\xe9 au lait").unwrap();

        let mut file = sample("cafe.md", "docs");
        file.absolute_path = path;
        assert_eq!(file.load_content().unwrap(), "caf\u{fffd} au lait");
    }

    #[test]
    fn test_load_content_missing_file_is_read_error() {
        let mut file = sample("missing.md", "docs");
        file.absolute_path = PathBuf::from("/definitely/not/here.md");
        assert!(matches!(
            file.load_content(),
            Err(GuideError::FileRead { .. })
        ));
    }
}
