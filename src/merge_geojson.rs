/*
cargo run --bin merge_geojson

cargo run --bin merge_geojson -- --sort --numbered-partials --log-dir logs/merge
*/

use std::fs::{create_dir_all, File};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use log::{error, info};
use simplelog::{
    ColorChoice, CombinedLogger, Config as LogConfig, LevelFilter, TermLogger, TerminalMode,
    WriteLogger,
};

use geojson_merge::merger::{FLUSH_THRESHOLD, INPUT_DIR};
use geojson_merge::{run, EntryOrder, MergeOptions, PartialNaming};

// Merge every .geojson file under the fixed input directory into merged.geojson,
// flushing to merged_partial.geojson each time the pending feature count passes the threshold.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    // Directory for the run log
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,

    // Merge files in file-name order instead of directory-listing order
    #[arg(long)]
    sort: bool,

    // Write each flush to its own merged_partial_<n>.geojson
    #[arg(long)]
    numbered_partials: bool,

    // Pretty-print the output files
    #[arg(long)]
    pretty: bool,

    // Hide the progress bar
    #[arg(short, long)]
    quiet: bool,
}

fn init_logging(log_dir: &Path) -> Result<PathBuf> {
    create_dir_all(log_dir)
        .with_context(|| format!("creating log directory {}", log_dir.display()))?;
    let ts = Local::now().format("%Y%m%d_%H%M%S");
    let log_path = log_dir.join(format!("merge_geojson_{ts}.log"));

    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Warn,
            LogConfig::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(
            LevelFilter::Info,
            LogConfig::default(),
            File::create(&log_path)
                .with_context(|| format!("creating log file {}", log_path.display()))?,
        ),
    ])?;
    Ok(log_path)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_path = init_logging(&cli.log_dir)?;
    info!("Starting GeoJSON merge, log at {}", log_path.display());

    let options = MergeOptions {
        threshold: FLUSH_THRESHOLD,
        order: if cli.sort {
            EntryOrder::Lexical
        } else {
            EntryOrder::Listing
        },
        partials: if cli.numbered_partials {
            PartialNaming::Numbered
        } else {
            PartialNaming::Overwrite
        },
        pretty: cli.pretty,
        progress: !cli.quiet,
    };
    info!("Input: {INPUT_DIR}, options: {options:?}");

    let report = match run(Path::new(INPUT_DIR), &options) {
        Ok(report) => report,
        Err(e) => {
            error!("Merge failed: {e:#}");
            return Err(e);
        }
    };

    info!(
        "Merged {} feature(s) from {} file(s); {} flush(es), {} feature(s) in {}",
        report.features_read,
        report.files_merged,
        report.flushes.len(),
        report.final_features,
        report.final_output.display()
    );
    println!("GeoJSON files merged successfully!");
    Ok(())
}
