use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{CommandFactory, Parser};
use clap_complete::generate;
use colored::Colorize;
use tracing::debug;

use dot_guide_core::config::Config;
use dot_guide_core::{
    ContentPipeline, GuideError, ProjectStore, Result, SnapshotSource, StaticSession,
    TemplateValue, PROJECT_FILE,
};

mod args;
use args::{Cli, Commands, ConfigAction, Shell};

const BASE_DIR_ENV: &str = "DOT_GUIDE_BASE";
const PROJECT_ENV: &str = "DOT_GUIDE_PROJECT";

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    match run(cli) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            eprintln!("{} {}", "[ERROR]".red().bold(), e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let project = resolve_project_file(cli.project);

    match cli.command {
        Some(Commands::Get {
            expression,
            pattern,
            json,
            flags,
        }) => {
            let base_dir = resolve_base_dir(cli.base_dir)?;
            handle_get(
                &base_dir,
                &project,
                &expression,
                pattern.as_deref(),
                json,
                &flags,
            )
        }
        Some(Commands::Categories) => handle_categories(&project),
        Some(Commands::Collections) => handle_collections(&project),
        Some(Commands::Config { action }) => {
            let base_dir = resolve_base_dir(cli.base_dir)?;
            handle_config(action, &base_dir).map(|()| 0)
        }
        Some(Commands::Completions { shell }) => {
            handle_completions(shell);
            Ok(0)
        }
        None => {
            Cli::command().print_help().ok();
            Ok(0)
        }
    }
}

fn handle_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let shell = match shell {
        Shell::Bash => clap_complete::Shell::Bash,
        Shell::Zsh => clap_complete::Shell::Zsh,
        Shell::Fish => clap_complete::Shell::Fish,
        Shell::PowerShell => clap_complete::Shell::PowerShell,
        Shell::Elvish => clap_complete::Shell::Elvish,
    };
    generate(shell, &mut cmd, "dot-guide", &mut io::stdout());
}

/// `--base-dir`, then `$DOT_GUIDE_BASE`, then `~/.dot-guide`.
fn resolve_base_dir(cli_base: Option<PathBuf>) -> Result<PathBuf> {
    match cli_base.or_else(|| env::var_os(BASE_DIR_ENV).map(PathBuf::from)) {
        Some(base) => Ok(base),
        None => Config::default_base_dir(),
    }
}

/// `--project`, then `$DOT_GUIDE_PROJECT`, then `./guide.toml`.
fn resolve_project_file(cli_project: Option<PathBuf>) -> PathBuf {
    cli_project
        .or_else(|| env::var_os(PROJECT_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(PROJECT_FILE))
}

fn handle_get(
    base_dir: &Path,
    project: &Path,
    expression: &str,
    pattern: Option<&str>,
    json: bool,
    flags: &[String],
) -> Result<i32> {
    let config = Config::load(base_dir)?;
    debug!(project = %project.display(), "loading project file");
    let store = Arc::new(ProjectStore::load(project)?);

    let mut session = StaticSession::new();
    if let Some(info) = store.snapshot().project() {
        session = session.with_project(info.clone());
    }
    for flag in flags {
        let (name, value) = parse_flag(flag);
        session = session.with_flag(name, value);
    }

    let pipeline = ContentPipeline::new(store, Arc::new(session), config);
    let response = pipeline.resolve_and_render(expression, pattern);

    if json {
        let text = serde_json::to_string_pretty(&response)
            .map_err(|e| GuideError::Io(io::Error::other(e)))?;
        println!("{}", text);
    } else if let Some(error) = &response.error {
        eprintln!("{} {}", "[ERROR]".red().bold(), error.message);
        eprintln!("{} {}", "Hint:".yellow(), error.instruction);
    } else {
        print!("{}", response.body);
        if response.files.is_empty() {
            println!();
        }
    }

    Ok(response.error.map(|e| e.kind.exit_code()).unwrap_or(0))
}

/// `NAME` is `true`; `NAME=VALUE` is parsed as bool, then integer, then text.
fn parse_flag(flag: &str) -> (String, TemplateValue) {
    match flag.split_once('=') {
        None => (flag.to_string(), TemplateValue::Bool(true)),
        Some((name, value)) => {
            let value = if let Ok(b) = value.parse::<bool>() {
                TemplateValue::Bool(b)
            } else if let Ok(n) = value.parse::<i64>() {
                TemplateValue::from(n)
            } else {
                TemplateValue::from(value)
            };
            (name.to_string(), value)
        }
    }
}

fn handle_categories(project: &Path) -> Result<i32> {
    let store = ProjectStore::load(project)?;
    let snapshot = store.snapshot();

    let mut categories = snapshot.categories().peekable();
    if categories.peek().is_none() {
        println!("No categories defined in {}", project.display());
        return Ok(0);
    }

    println!();
    for category in categories {
        println!("  {}", category.name.cyan().bold());
        println!("    Dir: {}", category.dir);
        if !category.patterns.is_empty() {
            println!("    Patterns: {}", category.patterns.join(", "));
        }
        if let Some(description) = &category.description {
            println!("    {}", description.dimmed());
        }
        println!();
    }
    Ok(0)
}

fn handle_collections(project: &Path) -> Result<i32> {
    let store = ProjectStore::load(project)?;
    let snapshot = store.snapshot();

    let mut collections = snapshot.collections().peekable();
    if collections.peek().is_none() {
        println!("No collections defined in {}", project.display());
        return Ok(0);
    }

    println!();
    for collection in collections {
        println!("  {}", collection.name.cyan().bold());
        println!("    Members: {}", collection.categories.join(", "));
        if !collection.patterns.is_empty() {
            println!("    Patterns: {}", collection.patterns.join(", "));
        }
        if let Some(description) = &collection.description {
            println!("    {}", description.dimmed());
        }
        println!();
    }
    Ok(0)
}

fn handle_config(action: ConfigAction, base_dir: &Path) -> Result<()> {
    // Path and Init work without an existing config file.
    let mut config = match action {
        ConfigAction::Path => {
            println!("{}", Config::path(base_dir).display());
            return Ok(());
        }
        ConfigAction::Init => {
            let path = Config::init(base_dir)?;
            println!("{} {}", "Initialized:".green(), path.display());
            return Ok(());
        }
        _ => Config::load(base_dir)?,
    };

    match action {
        ConfigAction::Get { key } => match config.get(&key) {
            Some(value) => println!("{}", value),
            None => return Err(GuideError::ConfigKeyNotFound { key }),
        },
        ConfigAction::Set { key, value } => {
            config.set(&key, &value)?;
            config.save(base_dir)?;
            println!("{} {} = {}", "Set:".green(), key, value);
        }
        ConfigAction::List => {
            let entries = config.list();
            let width = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
            for (key, value) in entries {
                println!("  {} = {}", format!("{:width$}", key).cyan(), value);
            }
        }
        ConfigAction::Path | ConfigAction::Init => {}
    }
    Ok(())
}
