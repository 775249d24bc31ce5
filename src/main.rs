// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! imgsearch: describe, classify and index photo collections with local AI

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tracing::{error, info};

use imgsearch::config::AppConfig;
use imgsearch::db::{Database, ImageStore};
use imgsearch::models::build_models;
use imgsearch::pipeline::{IngestionPipeline, ItemOutcome};
use imgsearch::scanner::discover;
use imgsearch::{ImageSearchError, Result};

/// imgsearch CLI - AI descriptions and categories for image libraries
#[derive(Parser, Debug)]
#[command(name = "imgsearch")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version)]
#[command(about = "Describe, classify and index images with local AI models", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "config.json", global = true)]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Describe and store every new image under the configured directories
    Ingest {
        /// Library root (overrides config)
        #[arg(short, long)]
        root: Option<PathBuf>,

        /// Subdirectory of the root to scan, repeatable (overrides config)
        #[arg(short, long)]
        subdir: Vec<String>,

        /// List the files that would be processed without calling any model
        #[arg(long)]
        dry_run: bool,

        /// Skip the backend health check on startup
        #[arg(long)]
        skip_health_check: bool,
    },

    /// Database operations
    Db {
        #[command(subcommand)]
        action: DbCommands,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Show AI engine and database status
    Status,
}

#[derive(Subcommand, Debug)]
enum DbCommands {
    /// Show database statistics
    Stats,

    /// Export all records to JSON
    Export {
        /// Output file
        output: PathBuf,
    },

    /// Vacuum database (reclaim space)
    Vacuum,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if let Err(e) = run(cli).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Some(Commands::Ingest { root, subdir, dry_run, skip_health_check }) => {
            run_ingest(config, root, subdir, dry_run, skip_health_check, cli.quiet).await
        }
        Some(Commands::Db { action }) => run_db_command(config, action),
        Some(Commands::Config { action }) => run_config_command(config, action, &cli.config),
        Some(Commands::Status) => run_status(config).await,
        None => run_ingest(config, None, Vec::new(), false, false, cli.quiet).await,
    }
}

/// Discover images and push each through the pipeline
async fn run_ingest(
    mut config: AppConfig,
    root: Option<PathBuf>,
    subdirs: Vec<String>,
    dry_run: bool,
    skip_health_check: bool,
    quiet: bool,
) -> Result<()> {
    if let Some(root) = root {
        config.root_dir = root.to_string_lossy().to_string();
    }
    if !subdirs.is_empty() {
        config.subdirs = subdirs;
    }

    let roots = config.scan_roots();
    info!("Scanning {:?}", roots);
    let files = discover(&roots, &config.extensions);
    info!("Found {} image files", files.len());

    let db = Database::open(&config.database.path)?;

    if dry_run {
        for file in &files {
            let state = if db.exists(&file.to_string_lossy())? { "duplicate" } else { "new" };
            println!("{:>9}  {}", state, file.display());
        }
        return Ok(());
    }

    let models = build_models(&config.ai_engine)?;
    if !skip_health_check {
        models.vision.health_check().await?;
    }

    let pipeline =
        IngestionPipeline::from_config(&config, models.vision.as_ref(), models.text.as_ref(), &db);

    let progress = if quiet {
        ProgressBar::hidden()
    } else {
        create_progress_bar(files.len() as u64)
    };

    let report = pipeline
        .run(&files, |path, outcome| {
            if let ItemOutcome::SkippedOnError { reason } = outcome {
                progress.println(format!("skipped {}: {}", path.display(), reason));
            }
            progress.set_message(
                path.file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default(),
            );
            progress.inc(1);
        })
        .await;
    progress.finish_and_clear();
    let report = report?;

    println!(
        "Processed {} files: {} stored, {} already present, {} skipped",
        report.discovered, report.persisted, report.duplicates, report.failed
    );

    Ok(())
}

fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
    );
    pb
}

/// Run database commands
fn run_db_command(config: AppConfig, action: DbCommands) -> Result<()> {
    let db = Database::open(&config.database.path)?;

    match action {
        DbCommands::Stats => {
            let stats = db.get_stats()?;
            println!("Database Statistics:");
            println!("  Images: {}", stats.record_count);
            println!("  Ignored: {}", stats.ignored_count);
            for (column, count) in &stats.categories {
                println!("  {}: {}", column, count);
            }
        }
        DbCommands::Export { output } => {
            let records = db.all_records()?;
            let json = serde_json::to_string_pretty(&records)?;
            std::fs::write(&output, json)?;
            println!("Exported {} records to {:?}", records.len(), output);
        }
        DbCommands::Vacuum => {
            db.vacuum()?;
            println!("Database vacuumed successfully");
        }
    }

    Ok(())
}

/// Run config commands
fn run_config_command(config: AppConfig, action: ConfigCommands, config_path: &Path) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
        ConfigCommands::Generate { output } => {
            if output.exists() {
                return Err(ImageSearchError::Config(format!(
                    "{:?} already exists",
                    output
                )));
            }
            AppConfig::default().save(&output)?;
            println!("Generated config at {:?}", output);
        }
        ConfigCommands::Validate => {
            // load() has already validated
            println!("Configuration at {:?} is valid", config_path);
            println!("  Scan roots: {:?}", config.scan_roots());
            println!("  Backend: {:?} at {}", config.ai_engine.backend, config.ai_engine.url);
            println!("  Vision model: {}", config.ai_engine.models.vision);
            println!("  Text model: {}", config.ai_engine.models.text);
            println!("  Database: {}", config.database.path);
        }
    }

    Ok(())
}

/// Run status check
async fn run_status(config: AppConfig) -> Result<()> {
    let models = build_models(&config.ai_engine)?;

    println!("imgsearch v{} Status", env!("CARGO_PKG_VERSION"));
    println!("======================");

    match models.vision.health_check().await {
        Ok(()) => println!("Backend ({}): Running", config.ai_engine.url),
        Err(e) => println!("Backend ({}): Error - {}", config.ai_engine.url, e),
    }

    match models.vision.list_models().await {
        Ok(available) => {
            println!("\nAvailable models:");
            for m in &available {
                let marker = if m.starts_with(models.vision.name()) || m.starts_with(models.text.name()) {
                    "→"
                } else {
                    " "
                };
                println!("  {} {}", marker, m);
            }
        }
        Err(e) => println!("  Error listing models: {}", e),
    }

    match Database::open(&config.database.path).and_then(|db| db.get_stats()) {
        Ok(stats) => {
            println!("\nDatabase ({}):", config.database.path);
            println!("  Images: {}", stats.record_count);
        }
        Err(e) => println!("\nDatabase: ✗ Error - {}", e),
    }

    println!("\nConfiguration:");
    println!("  Scan roots: {:?}", config.scan_roots());
    println!("  Vision model: {}", config.ai_engine.models.vision);
    println!("  Text model: {}", config.ai_engine.models.text);

    Ok(())
}
