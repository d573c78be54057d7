use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "dot-guide")]
#[command(about = "Resolve and render agent guidance documents")]
#[command(version)]
pub struct Cli {
    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Project file (default: ./guide.toml)
    #[arg(short, long, global = true)]
    pub project: Option<PathBuf>,

    /// Base directory (default: ~/.dot-guide)
    #[arg(long, global = true)]
    pub base_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve an expression and print the rendered content
    Get {
        /// Expression (e.g., "guidelines", "team,policies", "docs/intro+setup")
        expression: String,

        /// Pattern override applied to every term without its own
        #[arg(long)]
        pattern: Option<String>,

        /// Print the full response as JSON
        #[arg(long)]
        json: bool,

        /// Feature flag exposed to templates as `flags.<name>` (NAME or NAME=VALUE)
        #[arg(long = "flag", value_name = "NAME[=VALUE]")]
        flags: Vec<String>,
    },

    /// List categories in the project
    Categories,

    /// List collections in the project
    Collections,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a config value
    Get {
        /// Config key (e.g., templates.cache_size)
        key: String,
    },

    /// Set a config value
    Set {
        /// Config key (e.g., content.default_extensions)
        key: String,

        /// Value to set (e.g., "md,txt" or "[md, txt]")
        value: String,
    },

    /// List all config values
    List,

    /// Show config file path
    Path,

    /// Initialize config file with defaults
    Init,
}
