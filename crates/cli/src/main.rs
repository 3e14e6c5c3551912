//! Mergepane command-line host.
//!
//! Provides subcommands for listing conflicted files, inspecting their
//! regions, resolving them region by region, previewing the result, and
//! generating / validating configuration files.

mod commands;
mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mergepane_core::config::AppConfig;
use mergepane_core::{FallbackProvider, FsWorkingCopy, MergeWorkspace};

use commands::Choice;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// Resolve three-way merge conflicts region by region.
#[derive(Parser, Debug)]
#[command(
    name = "mergepane",
    version,
    about = "Resolve three-way merge conflicts region by region"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, overriding `[logging] level` (e.g. "debug").
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Working tree root.
    #[arg(short, long, global = true, default_value = ".")]
    repo: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List files with unresolved conflicts.
    List,

    /// Show the conflict regions of a file.
    Show {
        /// File path relative to the working tree root.
        path: PathBuf,

        /// Print the merge view as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Resolve a file's regions and write the merged result.
    Resolve {
        /// File path relative to the working tree root.
        path: PathBuf,

        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Print the patch resolving a file would apply, without writing it.
    Preview {
        /// File path relative to the working tree root.
        path: PathBuf,

        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Generate a default configuration file.
    Init {
        /// Output path (defaults to the per-user config location).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a configuration file.
    Validate,
}

/// Apply one decision to every region without prompting.
#[derive(Args, Debug)]
#[group(multiple = false)]
struct BatchArgs {
    /// Keep our version of every region.
    #[arg(long)]
    ours: bool,

    /// Keep their version of every region.
    #[arg(long)]
    theirs: bool,

    /// Keep both versions, ours first.
    #[arg(long)]
    both: bool,
}

impl BatchArgs {
    fn choice(&self) -> Option<Choice> {
        if self.ours {
            Some(Choice::Ours)
        } else if self.theirs {
            Some(Choice::Theirs)
        } else if self.both {
            Some(Choice::Both)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config_path = cli.config.clone().or_else(AppConfig::default_path);
    let file_level = config_path
        .as_deref()
        .and_then(|p| AppConfig::load_or_default(p).ok())
        .map(|c| c.logging.level);
    let level = cli
        .log_level
        .clone()
        .or(file_level)
        .unwrap_or_else(|| "warn".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    match run(cli, config_path).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config_path: Option<PathBuf>) -> Result<()> {
    let (repo, command) = match cli.command {
        Commands::Init { output } => {
            let output = output
                .or(config_path)
                .context("no output path given and no per-user config directory")?;
            return cmd_init(&output);
        }
        Commands::Validate => {
            let path = config_path.context("no config path given and no per-user config directory")?;
            return cmd_validate(&path);
        }
        Commands::List => (cli.repo, ViewCommand::List),
        Commands::Show { path, json } => (cli.repo, ViewCommand::Show { path, json }),
        Commands::Resolve { path, batch } => (
            cli.repo,
            ViewCommand::Resolve {
                path,
                batch: batch.choice(),
            },
        ),
        Commands::Preview { path, batch } => (
            cli.repo,
            ViewCommand::Preview {
                path,
                batch: batch.choice(),
            },
        ),
    };

    let config = load_config(config_path.as_deref())?;
    let ws = open_workspace(&repo, config);
    match command {
        ViewCommand::List => commands::run_list(&ws).await,
        ViewCommand::Show { path, json } => commands::run_show(&ws, &path, json).await,
        ViewCommand::Resolve { path, batch } => commands::run_resolve(&ws, &path, batch).await,
        ViewCommand::Preview { path, batch } => commands::run_preview(&ws, &path, batch).await,
    }
}

/// Subcommands that run against a working tree.
#[derive(Debug)]
enum ViewCommand {
    List,
    Show { path: PathBuf, json: bool },
    Resolve { path: PathBuf, batch: Option<Choice> },
    Preview { path: PathBuf, batch: Option<Choice> },
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let Some(path) = path else {
        return Ok(AppConfig::default());
    };
    AppConfig::load_and_validate(path).context("failed to load configuration file")
}

fn open_workspace(repo: &Path, config: AppConfig) -> MergeWorkspace {
    let provider = FallbackProvider::discover(repo, config.markers.marker_size);
    MergeWorkspace::new(
        Arc::new(provider),
        Arc::new(FsWorkingCopy::new(repo)),
        config,
    )
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn cmd_init(output: &Path) -> Result<()> {
    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent).context("failed to create config directory")?;
    }

    std::fs::write(output, AppConfig::default_template())
        .context("failed to write config file")?;

    println!(
        "{}",
        style::success(&format!(
            "Default configuration written to {}",
            output.display()
        ))
    );
    println!();
    println!("Next steps:");
    println!("  1. Adjust conflict labels and marker size if your tooling differs");
    println!(
        "  2. Validate with: mergepane validate --config {}",
        output.display()
    );
    println!("  3. List conflicts: mergepane list --repo <working tree>");

    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let config = AppConfig::load_or_default(config_path).context("failed to parse configuration")?;
    println!("  [OK] TOML structure is valid");

    match config.validate() {
        Ok(()) => {
            println!("  [OK] All fields are valid");
        }
        Err(e) => {
            println!("  [FAIL] Validation error: {}", e);
            anyhow::bail!("configuration validation failed");
        }
    }

    println!();
    println!("Configuration summary:");
    println!("  Log level      : {}", config.logging.level);
    println!("  Read retries   : {}", config.session.stage_read_retries);
    println!(
        "  Initial mode   : {}",
        if config.session.start_in_resolve_mode {
            "resolve"
        } else {
            "read-only"
        }
    );
    println!("  Ours label     : {}", config.labels.ours);
    println!("  Theirs label   : {}", config.labels.theirs);
    println!("  Base label     : {}", config.labels.base);
    println!("  Marker size    : {}", config.markers.marker_size);
    println!();
    println!("Configuration is valid.");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_batch_flags_are_exclusive() {
        assert!(Cli::try_parse_from(["mergepane", "resolve", "f.txt", "--ours", "--theirs"]).is_err());
        let cli = Cli::try_parse_from(["mergepane", "resolve", "f.txt", "--both"]).unwrap();
        match cli.command {
            Commands::Resolve { batch, .. } => assert_eq!(batch.choice(), Some(Choice::Both)),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_config_commands_skip_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cli = Cli::try_parse_from([
            "mergepane",
            "--repo",
            "/nonexistent/tree",
            "init",
            "--output",
            path.to_str().unwrap(),
        ])
        .unwrap();
        run(cli, None).await.unwrap();

        let cli = Cli::try_parse_from(["mergepane", "--repo", "/nonexistent/tree", "validate"]).unwrap();
        run(cli, Some(path)).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_on_clean_tree() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("clean.txt"), "nothing to merge\n").unwrap();
        let cli = Cli::try_parse_from([
            "mergepane",
            "--repo",
            dir.path().to_str().unwrap(),
            "list",
        ])
        .unwrap();
        run(cli, None).await.unwrap();
    }

    #[test]
    fn test_init_then_validate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        cmd_init(&path).unwrap();
        assert!(cmd_init(&path).is_err());
        cmd_validate(&path).unwrap();
        assert_eq!(
            load_config(Some(&path)).unwrap().markers.marker_size,
            AppConfig::default().markers.marker_size
        );
    }
}
