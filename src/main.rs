//! # screenshot-search CLI
//!
//! Indexes a screenshots folder with OCR and searches the recognized text.
//!
//! ```bash
//! screenshot-search config set screenshots_folder ~/Pictures/Screenshots
//! screenshot-search scan
//! screenshot-search search "invoice" --date month --folder 2024/03
//! ```

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use screenshot_search_lib::commands::{indexing_commands, search_commands, settings_commands};
use screenshot_search_lib::config::{default_config_path, default_db_path};
use screenshot_search_lib::models::search::{SearchResult, DEFAULT_SEARCH_LIMIT};
use screenshot_search_lib::services::ocr_service::{TesseractCli, TextRecognizer};
use screenshot_search_lib::services::search_service;
use screenshot_search_lib::AppState;

#[derive(Parser)]
#[command(name = "screenshot-search")]
#[command(about = "Search the text inside your screenshots")]
#[command(version)]
struct Cli {
    /// Path to the index database (default: per-user data dir)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Path to the config file (default: per-user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// OCR and index new screenshots
    Scan {
        /// Folder to scan (default: configured screenshots folder)
        root: Option<String>,
    },

    /// Search indexed text
    Search {
        query: String,

        /// Maximum results
        #[arg(short, long, default_value_t = DEFAULT_SEARCH_LIMIT)]
        limit: usize,

        /// today, week, month, year or all
        #[arg(short, long)]
        date: Option<String>,

        /// Only paths containing this folder, e.g. 2024/03
        #[arg(long)]
        folder: Option<String>,
    },

    /// Show index statistics
    Stats,

    /// Remove index entries whose files were deleted
    Gc,

    /// List folder filter labels
    Folders,

    /// Print the stored text of one screenshot
    Text { path: String },

    /// Check OCR availability and configuration
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Print one setting
    Get { key: String },
    /// Change one setting
    Set { key: String, value: String },
    /// Show config file path
    Path,
}

#[derive(Serialize)]
struct SearchOutput<'a> {
    query: &'a str,
    results: &'a [SearchResult],
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}

fn recognizer_for(state: &AppState) -> Arc<dyn TextRecognizer> {
    Arc::new(TesseractCli::from_config(&state.config()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = match cli.config {
        Some(path) => path,
        None => default_config_path().context("Failed to resolve config path")?,
    };
    let db_path = match cli.db {
        Some(path) => path,
        None => default_db_path().context("Failed to resolve database path")?,
    };

    let state = AppState::open(&db_path, &config_path)
        .with_context(|| format!("Failed to open index at {}", db_path.display()))?;
    let format = cli.format;

    match cli.command {
        Commands::Scan { root } => {
            let recognizer = recognizer_for(&state);
            if !indexing_commands::check_ocr_available(recognizer.as_ref()) {
                warn!("tesseract not found; every new screenshot will be recorded without text");
            }

            let show_progress = format == OutputFormat::Text;
            let handle = indexing_commands::start_indexing(
                &state,
                root.as_deref(),
                recognizer,
                move |current, total, name| {
                    if show_progress {
                        eprint!("\r\x1b[2K[{current}/{total}] {name}");
                        let _ = std::io::stderr().flush();
                    }
                },
            )?;
            let stats = handle.join().context("Scan failed")?;
            if show_progress && stats.total > 0 {
                eprintln!();
            }

            match format {
                OutputFormat::Json => print_json(&stats)?,
                OutputFormat::Text => println!(
                    "Indexed {}, skipped {}, no text {} (of {})",
                    stats.indexed, stats.skipped, stats.failed, stats.total
                ),
            }
        }

        Commands::Search {
            query,
            limit,
            date,
            folder,
        } => {
            let results = search_commands::search(
                &state,
                &query,
                Some(limit),
                date.as_deref(),
                folder.as_deref(),
            )?;

            match format {
                OutputFormat::Json => print_json(&SearchOutput {
                    query: &query,
                    results: &results,
                })?,
                OutputFormat::Text => {
                    if results.is_empty() {
                        println!("No screenshots found for \"{query}\"");
                    }
                    for (i, result) in results.iter().enumerate() {
                        println!("{}. {}", i + 1, result.file_path);
                        println!("   {}", search_service::strip_markers(&result.snippet));
                    }
                }
            }
        }

        Commands::Stats => {
            let stats = indexing_commands::get_index_stats(&state)?;
            match format {
                OutputFormat::Json => print_json(&stats)?,
                OutputFormat::Text => println!("{} screenshots indexed", stats.total_indexed),
            }
        }

        Commands::Gc => {
            let removed = indexing_commands::remove_missing_files(&state)?;
            match format {
                OutputFormat::Json => print_json(&serde_json::json!({ "removed": removed }))?,
                OutputFormat::Text => println!("Removed {removed} stale entries"),
            }
        }

        Commands::Folders => {
            let folders = search_commands::list_folders(&state);
            match format {
                OutputFormat::Json => print_json(&folders)?,
                OutputFormat::Text => folders.iter().for_each(|f| println!("{f}")),
            }
        }

        Commands::Text { path } => {
            let text = search_commands::get_screenshot_text(&state, &path)?;
            println!("{text}");
        }

        Commands::Doctor => {
            let available = indexing_commands::check_ocr_available(recognizer_for(&state).as_ref());
            let configured = state.config().is_configured();
            match format {
                OutputFormat::Json => print_json(&serde_json::json!({
                    "ocr_available": available,
                    "configured": configured,
                    "db_path": db_path,
                    "config_path": config_path,
                }))?,
                OutputFormat::Text => {
                    println!("OCR available: {}", if available { "yes" } else { "no" });
                    println!("Screenshots folder configured: {}", if configured { "yes" } else { "no" });
                    println!("Index: {}", db_path.display());
                    if !available {
                        println!(
                            "Install Tesseract OCR (https://github.com/tesseract-ocr/tesseract) \
                             or set tesseract_cmd. Already indexed screenshots stay searchable."
                        );
                    }
                }
            }
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let config = settings_commands::get_settings(&state);
                match format {
                    OutputFormat::Json => print_json(&config)?,
                    OutputFormat::Text => {
                        println!("screenshots_folder = {:?}", config.screenshots_folder);
                        println!("tesseract_cmd = {:?}", config.tesseract_cmd);
                        println!("ocr_timeout_secs = {}", config.ocr_timeout_secs);
                        println!("ocr_language = {:?}", config.ocr_language);
                    }
                }
            }
            ConfigAction::Get { key } => {
                println!("{}", settings_commands::get_setting(&state, &key)?);
            }
            ConfigAction::Set { key, value } => {
                settings_commands::set_setting(&state, &key, &value)?;
            }
            ConfigAction::Path => println!("{}", config_path.display()),
        },
    }

    Ok(())
}
