use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GuideError {
    #[error("Category or collection not found: {name}")]
    NotFound { name: String },

    #[error("Invalid expression near '{segment}' (offset {position}): {reason}")]
    InvalidExpression {
        segment: String,
        position: usize,
        reason: String,
    },

    #[error("Invalid glob pattern '{pattern}': {message}")]
    InvalidGlob { pattern: String, message: String },

    #[error("Template error in {file}: {message}")]
    Template { file: String, message: String },

    #[error("Failed to read {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Path escapes the docroot: {path}")]
    PathEscape { path: PathBuf },

    #[error("Collection cycle detected: {chain}")]
    CollectionCycle { chain: String },

    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Invalid template value for '{key}': {reason}")]
    InvalidContextValue { key: String, reason: String },

    #[error("Could not find a multipart boundary absent from content after {attempts} attempts")]
    BoundaryExhausted { attempts: usize },

    #[error("Config parse error in {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error("Config key not found: {key}")]
    ConfigKeyNotFound { key: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("Home directory not found")]
    HomeNotFound,
}

pub type Result<T> = std::result::Result<T, GuideError>;

/// Caller-facing error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    NoMatches,
    InvalidPattern,
    TemplateError,
    IoError,
    ConfigError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::NoMatches => "no_matches",
            Self::InvalidPattern => "invalid_pattern",
            Self::TemplateError => "template_error",
            Self::IoError => "io_error",
            Self::ConfigError => "config_error",
        }
    }

    /// Guidance attached to the caller-facing result.
    pub fn instruction(&self) -> &'static str {
        match self {
            Self::NotFound => {
                "No category or collection has this name. List the available names instead of retrying."
            }
            Self::NoMatches => {
                "The name resolved but no files matched. Adjust the pattern rather than retrying the same request."
            }
            Self::InvalidPattern => "Fix the expression syntax at the reported segment and try again.",
            Self::TemplateError => {
                "A template failed to render. Report the file and problem to the user; do not retry."
            }
            Self::IoError => {
                "The filesystem refused the read. This is an environment problem outside agent control."
            }
            Self::ConfigError => "The content configuration is invalid. Report it to the user.",
        }
    }

    /// Process exit status used by the CLI
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotFound => 2,
            Self::InvalidPattern => 3,
            Self::TemplateError => 4,
            Self::IoError => 5,
            Self::ConfigError => 6,
            Self::NoMatches => 0,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl GuideError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidExpression { .. } | Self::InvalidGlob { .. } => ErrorKind::InvalidPattern,
            Self::Template { .. } => ErrorKind::TemplateError,
            Self::FileRead { .. } | Self::Io(_) => ErrorKind::IoError,
            Self::PathEscape { .. }
            | Self::CollectionCycle { .. }
            | Self::InvalidName { .. }
            | Self::InvalidContextValue { .. }
            | Self::BoundaryExhausted { .. }
            | Self::ConfigParse { .. }
            | Self::ConfigKeyNotFound { .. }
            | Self::TomlSer(_)
            | Self::TomlDe(_)
            | Self::HomeNotFound => ErrorKind::ConfigError,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.kind().exit_code()
    }

    pub(crate) fn template(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Template {
            file: file.into(),
            message: message.into(),
        }
    }
}

/// Serializable error payload returned alongside a response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResult {
    pub kind: ErrorKind,
    pub message: String,
    pub instruction: String,
}

impl From<&GuideError> for ErrorResult {
    fn from(err: &GuideError) -> Self {
        let kind = err.kind();
        Self {
            kind,
            message: err.to_string(),
            instruction: kind.instruction().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        let err = GuideError::NotFound {
            name: "nonexistent".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.kind().as_str(), "not_found");

        let err = GuideError::CollectionCycle {
            chain: "a -> b -> a".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::ConfigError);
    }

    #[test]
    fn test_error_result_carries_instruction() {
        let err = GuideError::template("intro.md.mustache", "unclosed section 'x'");
        let result = ErrorResult::from(&err);
        assert_eq!(result.kind, ErrorKind::TemplateError);
        assert!(result.message.contains("intro.md.mustache"));
        assert!(!result.instruction.is_empty());
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::InvalidPattern).unwrap();
        assert_eq!(json, "\"invalid_pattern\"");
    }
}
