use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GuideError, Result};

const CONFIG_FILE: &str = "config.toml";

/// Extensions tried, in order, for patterns whose last segment has no `.`
pub const DEFAULT_EXTENSIONS: &[&str] = &["md", "markdown", "txt"];

/// Filename suffixes that mark a file as a template
pub const DEFAULT_TEMPLATE_EXTENSIONS: &[&str] = &["mustache", "hbs"];

pub const DEFAULT_URI_SCHEME: &str = "guide";
pub const DEFAULT_CACHE_SIZE: usize = 128;
pub const DEFAULT_MAX_PARTIAL_DEPTH: usize = 16;

/// Default config template with rich comments
const DEFAULT_CONFIG_TEMPLATE: &str = r#"# dot-guide configuration file
# Location: ~/.dot-guide/config.toml

[content]
# Scheme used in the Content-Location header of multipart responses
uri_scheme = "guide"

# Extensions tried (in order) when a pattern has no extension
# Example: "intro" resolves to "intro.md" before "intro.txt"
default_extensions = ["md", "markdown", "txt"]

[templates]
# Filename suffixes rendered as templates ("intro.md.mustache")
extensions = ["mustache", "hbs"]

# Parsed-template cache entries (0 disables the cache)
cache_size = 128

# Maximum nesting of {{>partial}} includes
max_partial_depth = 16
"#;

/// Global configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub content: ContentConfig,

    #[serde(default)]
    pub templates: TemplateConfig,
}

/// Discovery and wire-format settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    #[serde(default = "default_uri_scheme")]
    pub uri_scheme: String,

    #[serde(default = "default_extensions")]
    pub default_extensions: Vec<String>,
}

/// Template rendering settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateConfig {
    #[serde(default = "default_template_extensions")]
    pub extensions: Vec<String>,

    #[serde(default = "default_cache_size")]
    pub cache_size: usize,

    #[serde(default = "default_max_partial_depth")]
    pub max_partial_depth: usize,
}

fn default_uri_scheme() -> String {
    DEFAULT_URI_SCHEME.to_string()
}

fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect()
}

fn default_template_extensions() -> Vec<String> {
    DEFAULT_TEMPLATE_EXTENSIONS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_cache_size() -> usize {
    DEFAULT_CACHE_SIZE
}

fn default_max_partial_depth() -> usize {
    DEFAULT_MAX_PARTIAL_DEPTH
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            uri_scheme: default_uri_scheme(),
            default_extensions: default_extensions(),
        }
    }
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            extensions: default_template_extensions(),
            cache_size: default_cache_size(),
            max_partial_depth: default_max_partial_depth(),
        }
    }
}

impl Config {
    /// Default base directory (`~/.dot-guide`)
    pub fn default_base_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or(GuideError::HomeNotFound)?;
        Ok(home.join(".dot-guide"))
    }

    /// Load config from base directory
    pub fn load(base_dir: &Path) -> Result<Self> {
        let path = base_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content).map_err(|e| GuideError::ConfigParse {
            path: path.clone(),
            message: e.to_string(),
        })?;

        Ok(config)
    }

    /// Save config to base directory
    pub fn save(&self, base_dir: &Path) -> Result<()> {
        let path = base_dir.join(CONFIG_FILE);
        fs::create_dir_all(base_dir)?;

        let content = toml::to_string_pretty(self).map_err(|e| GuideError::ConfigParse {
            path: path.clone(),
            message: e.to_string(),
        })?;

        fs::write(&path, content)?;
        Ok(())
    }

    /// Get config file path
    pub fn path(base_dir: &Path) -> PathBuf {
        base_dir.join(CONFIG_FILE)
    }

    /// Initialize config with default template (rich comments)
    pub fn init(base_dir: &Path) -> Result<PathBuf> {
        let path = base_dir.join(CONFIG_FILE);
        fs::create_dir_all(base_dir)?;

        if !path.exists() {
            fs::write(&path, DEFAULT_CONFIG_TEMPLATE)?;
        }

        Ok(path)
    }

    /// Get a config value by dot-notation key
    pub fn get(&self, key: &str) -> Option<String> {
        self.list()
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Set a config value by dot-notation key
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "content.uri_scheme" => {
                self.content.uri_scheme = value.trim().to_string();
            }
            "content.default_extensions" => {
                self.content.default_extensions = parse_string_list(value)?;
            }
            "templates.extensions" => {
                self.templates.extensions = parse_string_list(value)?;
            }
            "templates.cache_size" => {
                self.templates.cache_size = parse_usize(key, value)?;
            }
            "templates.max_partial_depth" => {
                self.templates.max_partial_depth = parse_usize(key, value)?;
            }
            _ => {
                return Err(GuideError::ConfigKeyNotFound {
                    key: key.to_string(),
                })
            }
        }
        Ok(())
    }

    /// List all config keys with their current values
    pub fn list(&self) -> Vec<(String, String)> {
        vec![
            (
                "content.uri_scheme".to_string(),
                self.content.uri_scheme.clone(),
            ),
            (
                "content.default_extensions".to_string(),
                format!("{:?}", self.content.default_extensions),
            ),
            (
                "templates.extensions".to_string(),
                format!("{:?}", self.templates.extensions),
            ),
            (
                "templates.cache_size".to_string(),
                self.templates.cache_size.to_string(),
            ),
            (
                "templates.max_partial_depth".to_string(),
                self.templates.max_partial_depth.to_string(),
            ),
        ]
    }
}

fn parse_usize(key: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|e| GuideError::ConfigParse {
            path: PathBuf::from(key),
            message: format!("expected a non-negative integer: {}", e),
        })
}

/// Parse a comma-separated or JSON-like list string
fn parse_string_list(value: &str) -> Result<Vec<String>> {
    let trimmed = value.trim();

    // Try JSON array format first: ["a", "b"]
    let inner = if trimmed.starts_with('[') && trimmed.ends_with(']') {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    };

    let items: Vec<String> = inner
        .split(',')
        .map(|s| s.trim().trim_matches('"').trim_matches('\'').to_string())
        .filter(|s| !s.is_empty())
        .collect();

    Ok(items)
}
