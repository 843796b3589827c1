//! StrokeLab CLI: command-line interface for stroke analysis.
//!
//! Usage:
//!   strokelab analyze <FRAMES>    Analyze a pose stream and write a bundle
//!   strokelab validate <FRAMES>   Check a pose stream before analysis
//!   strokelab info <DIR>          Show a written analysis bundle
//!   strokelab cache clear         Remove every cached stage result
//!   strokelab config              Print the default analysis config

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use strokelab_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "strokelab",
    about = "Phase-segmented batting stroke analysis from pose keypoints",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a pose stream (JSONL) and write the evaluation bundle
    Analyze {
        /// Path to the frames file (one JSON frame per line)
        frames: PathBuf,

        /// Bat detections file (JSONL)
        #[arg(long)]
        detections: Option<PathBuf>,

        /// Analysis config file (JSON); defaults are used otherwise
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output directory for the bundle
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Recompute every stage without reading or writing the cache
        #[arg(long)]
        no_cache: bool,

        /// Cache directory
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },

    /// Check a pose stream for ordering, coverage and timing problems
    Validate {
        /// Path to the frames file
        frames: PathBuf,
    },

    /// Show an analysis bundle
    Info {
        /// Bundle directory written by `analyze`
        path: PathBuf,
    },

    /// Manage the stage cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Print the default analysis config as JSON
    Config {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Remove every cached stage result
    Clear {
        /// Cache directory
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let app_config = AppConfig::load();

    let mut logging = app_config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    strokelab_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Analyze {
            frames,
            detections,
            config,
            output,
            no_cache,
            cache_dir,
        } => {
            commands::analyze::run(
                &app_config,
                frames,
                detections,
                config,
                output,
                no_cache,
                cache_dir,
            )
            .await
        }
        Commands::Validate { frames } => commands::validate::run(frames),
        Commands::Info { path } => commands::info::run(path),
        Commands::Cache {
            action: CacheAction::Clear { cache_dir },
        } => commands::cache::clear(&app_config, cache_dir),
        Commands::Config { output } => commands::config::run(output),
    }
}
