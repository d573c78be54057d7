//! Content Formatter
//!
//! One file is returned verbatim. Two or more are wrapped in an RFC 2046
//! `multipart/mixed` body:
//!
//! ```text
//! --guide-<hex>\r\n
//! Content-Type: text/markdown\r\n
//! Content-Location: guide://category/docs/intro.md\r\n
//! Content-Length: 5\r\n
//! \r\n
//! Hello\r\n
//! --guide-<hex>--
//! ```

use std::fmt::Write as _;

use serde::{Serialize, Serializer};
use tracing::debug;
use uuid::Uuid;

use crate::config::{Config, DEFAULT_URI_SCHEME};
use crate::discovery::FileInfo;
use crate::error::{GuideError, Result};

pub const BOUNDARY_PREFIX: &str = "guide-";
pub const MAX_BOUNDARY_ATTEMPTS: usize = 8;

const CRLF: &str = "\r\n";

/// Produces candidate multipart boundaries.
pub trait BoundarySource: Send + Sync {
    fn next_boundary(&self) -> String;
}

/// `guide-` followed by 32 random hex characters.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomBoundary;

impl BoundarySource for RandomBoundary {
    fn next_boundary(&self) -> String {
        format!("{}{}", BOUNDARY_PREFIX, Uuid::new_v4().simple())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentType {
    PlainText,
    Multipart { boundary: String },
}

impl ContentType {
    pub fn mime(&self) -> &'static str {
        match self {
            Self::PlainText => "text/plain",
            Self::Multipart { .. } => "multipart/mixed",
        }
    }

    /// Full `Content-Type` header value, including the boundary parameter.
    pub fn header_value(&self) -> String {
        match self {
            Self::PlainText => self.mime().to_string(),
            Self::Multipart { boundary } => format!("{}; boundary=\"{}\"", self.mime(), boundary),
        }
    }

    pub fn boundary(&self) -> Option<&str> {
        match self {
            Self::PlainText => None,
            Self::Multipart { boundary } => Some(boundary),
        }
    }
}

impl Serialize for ContentType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.mime())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormattedContent {
    pub body: String,
    pub content_type: ContentType,
}

/// MIME type for a file extension; anything unknown is `text/plain`.
pub fn mime_for_extension(extension: Option<&str>) -> &'static str {
    match extension.map(str::to_ascii_lowercase).as_deref() {
        Some("md") | Some("markdown") => "text/markdown",
        Some("json") => "application/json",
        Some("yaml") | Some("yml") => "application/yaml",
        Some("toml") => "application/toml",
        Some("html") | Some("htm") => "text/html",
        _ => "text/plain",
    }
}

pub struct ContentFormatter {
    uri_scheme: String,
    boundaries: Box<dyn BoundarySource>,
}

impl Default for ContentFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_URI_SCHEME)
    }
}

impl ContentFormatter {
    pub fn new(uri_scheme: impl Into<String>) -> Self {
        Self {
            uri_scheme: uri_scheme.into(),
            boundaries: Box::new(RandomBoundary),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.content.uri_scheme.clone())
    }

    pub fn with_boundary_source(mut self, source: impl BoundarySource + 'static) -> Self {
        self.boundaries = Box::new(source);
        self
    }

    /// Format files whose `content` has been loaded (and rendered).
    pub fn format(&self, files: &[FileInfo]) -> Result<FormattedContent> {
        match files {
            [] => Ok(FormattedContent {
                body: String::new(),
                content_type: ContentType::PlainText,
            }),
            [file] => Ok(FormattedContent {
                body: content_of(file).to_string(),
                content_type: ContentType::PlainText,
            }),
            _ => {
                let boundary = self.pick_boundary(files)?;
                Ok(FormattedContent {
                    body: self.multipart_body(files, &boundary),
                    content_type: ContentType::Multipart { boundary },
                })
            }
        }
    }

    /// `scheme://collection/<name>/<path>` or `scheme://category/<name>/<path>`
    pub fn content_location(&self, file: &FileInfo) -> String {
        let (kind, name) = match &file.collection {
            Some(collection) => ("collection", collection.as_str()),
            None => ("category", file.category.as_str()),
        };
        format!("{}://{}/{}/{}", self.uri_scheme, kind, name, file.rendered_path)
    }

    fn pick_boundary(&self, files: &[FileInfo]) -> Result<String> {
        for attempt in 1..=MAX_BOUNDARY_ATTEMPTS {
            let boundary = self.boundaries.next_boundary();
            if files.iter().all(|f| !content_of(f).contains(&boundary)) {
                return Ok(boundary);
            }
            debug!(attempt, boundary = %boundary, "boundary collides with content, retrying");
        }
        Err(GuideError::BoundaryExhausted {
            attempts: MAX_BOUNDARY_ATTEMPTS,
        })
    }

    fn multipart_body(&self, files: &[FileInfo], boundary: &str) -> String {
        let mut body = String::new();
        for file in files {
            let content = content_of(file);
            // Writing to a String cannot fail.
            let _ = write!(body, "--{}{}", boundary, CRLF);
            let _ = write!(
                body,
                "Content-Type: {}{}",
                mime_for_extension(file.extension()),
                CRLF
            );
            let _ = write!(body, "Content-Location: {}{}", self.content_location(file), CRLF);
            let _ = write!(body, "Content-Length: {}{}", content.len(), CRLF);
            body.push_str(CRLF);
            body.push_str(content);
            body.push_str(CRLF);
        }
        let _ = write!(body, "--{}--", boundary);
        body
    }
}

fn content_of(file: &FileInfo) -> &str {
    file.content.as_deref().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::sample_file;
    use std::sync::Mutex;

    /// Hands out scripted boundaries, then falls back to random ones.
    struct Scripted(Mutex<Vec<String>>);

    impl Scripted {
        fn new(boundaries: &[&str]) -> Self {
            Self(Mutex::new(boundaries.iter().rev().map(|s| s.to_string()).collect()))
        }
    }

    impl BoundarySource for Scripted {
        fn next_boundary(&self) -> String {
            self.0
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| RandomBoundary.next_boundary())
        }
    }

    struct Constant(&'static str);

    impl BoundarySource for Constant {
        fn next_boundary(&self) -> String {
            self.0.to_string()
        }
    }

    fn file(path: &str, category: &str, content: &str) -> FileInfo {
        let mut file = sample_file(path, category);
        file.content = Some(content.to_string());
        file
    }

    #[test]
    fn test_single_file_is_verbatim() {
        let out = ContentFormatter::default()
            .format(&[file("intro.md", "guidelines", "Hello")])
            .unwrap();
        assert_eq!(out.body, "Hello");
        assert_eq!(out.content_type, ContentType::PlainText);
    }

    #[test]
    fn test_no_files_is_empty_plain_text() {
        let out = ContentFormatter::default().format(&[]).unwrap();
        assert_eq!(out.body, "");
        assert_eq!(out.content_type.mime(), "text/plain");
    }

    #[test]
    fn test_multipart_framing() {
        let formatter = ContentFormatter::new("guide").with_boundary_source(Constant("guide-b"));
        let out = formatter
            .format(&[file("a.md", "docs", "Hello"), file("b.json", "docs", "{}\n")])
            .unwrap();

        let expected = "--guide-b\r\n\
             Content-Type: text/markdown\r\n\
             Content-Location: guide://category/docs/a.md\r\n\
             Content-Length: 5\r\n\
             \r\n\
             Hello\r\n\
             --guide-b\r\n\
             Content-Type: application/json\r\n\
             Content-Location: guide://category/docs/b.json\r\n\
             Content-Length: 3\r\n\
             \r\n\
             {}\n\r\n\
             --guide-b--";
        assert_eq!(out.body, expected);
        assert_eq!(out.content_type.mime(), "multipart/mixed");
        assert_eq!(
            out.content_type.header_value(),
            "multipart/mixed; boundary=\"guide-b\""
        );
    }

    #[test]
    fn test_random_boundary_shape() {
        let out = ContentFormatter::default()
            .format(&[file("a.md", "docs", "A"), file("b.md", "docs", "B")])
            .unwrap();
        let boundary = out.content_type.boundary().unwrap().to_string();

        assert!(boundary.starts_with(BOUNDARY_PREFIX));
        assert_eq!(boundary.len(), BOUNDARY_PREFIX.len() + 32);
        assert!(boundary.len() <= 70);
        assert!(out.body.starts_with(&format!("--{}", boundary)));
        assert!(out.body.ends_with(&format!("--{}--", boundary)));
        assert_eq!(out.body.matches("Content-Length:").count(), 2);
    }

    #[test]
    fn test_content_length_counts_utf8_bytes() {
        let formatter = ContentFormatter::new("guide").with_boundary_source(Constant("guide-b"));
        let out = formatter
            .format(&[file("a.txt", "docs", "héllo"), file("b.txt", "docs", "✓")])
            .unwrap();
        assert!(out.body.contains("Content-Length: 6\r\n"));
        assert!(out.body.contains("Content-Length: 3\r\n"));
    }

    #[test]
    fn test_boundary_collision_retries() {
        let formatter = ContentFormatter::new("guide")
            .with_boundary_source(Scripted::new(&["guide-taken", "guide-free"]));
        let out = formatter
            .format(&[
                file("a.md", "docs", "mentions guide-taken inline"),
                file("b.md", "docs", "B"),
            ])
            .unwrap();
        assert_eq!(out.content_type.boundary(), Some("guide-free"));
    }

    #[test]
    fn test_boundary_exhaustion() {
        let formatter = ContentFormatter::new("guide").with_boundary_source(Constant("guide-x"));
        let err = formatter
            .format(&[file("a.md", "docs", "guide-x"), file("b.md", "docs", "B")])
            .unwrap_err();
        assert!(matches!(
            err,
            GuideError::BoundaryExhausted {
                attempts: MAX_BOUNDARY_ATTEMPTS
            }
        ));
    }

    #[test]
    fn test_content_location_prefers_collection() {
        let formatter = ContentFormatter::new("kb");
        let mut tagged = file("intro.md", "guidelines", "");
        tagged.collection = Some("team".to_string());

        assert_eq!(
            formatter.content_location(&tagged),
            "kb://collection/team/intro.md"
        );
        assert_eq!(
            formatter.content_location(&file("intro.md", "guidelines", "")),
            "kb://category/guidelines/intro.md"
        );
    }

    #[test]
    fn test_mime_for_extension() {
        assert_eq!(mime_for_extension(Some("md")), "text/markdown");
        assert_eq!(mime_for_extension(Some("YML")), "application/yaml");
        assert_eq!(mime_for_extension(Some("txt")), "text/plain");
        assert_eq!(mime_for_extension(Some("rs")), "text/plain");
        assert_eq!(mime_for_extension(None), "text/plain");
    }

    #[test]
    fn test_content_type_serializes_as_mime() {
        let json = serde_json::to_string(&ContentType::Multipart {
            boundary: "guide-b".to_string(),
        })
        .unwrap();
        assert_eq!(json, "\"multipart/mixed\"");
    }
}
