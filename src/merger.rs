use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use serde_json::Value;

use crate::collection::{read_collection, write_collection, FEATURE_COLLECTION};

pub const INPUT_DIR: &str = "./data/img_s2_geojson/2023-07/";
pub const FLUSH_THRESHOLD: usize = 10_000;
pub const GEOJSON_SUFFIX: &str = ".geojson";
pub const PARTIAL_OUTPUT: &str = "merged_partial.geojson";
pub const FINAL_OUTPUT: &str = "merged.geojson";

/// Order in which qualifying directory entries are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryOrder {
    /// Whatever order the OS listing yields
    #[default]
    Listing,
    /// Sorted by file name
    Lexical,
}

/// Where a flush goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartialNaming {
    /// Every flush replaces `merged_partial.geojson`; only the last one survives
    #[default]
    Overwrite,
    /// Flush n goes to `merged_partial_<n>.geojson`, counting from 1
    Numbered,
}

impl PartialNaming {
    fn path(self, dir: &Path, flush_no: usize) -> PathBuf {
        match self {
            PartialNaming::Overwrite => dir.join(PARTIAL_OUTPUT),
            PartialNaming::Numbered => dir.join(format!("merged_partial_{flush_no}{GEOJSON_SUFFIX}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Flush once the pending feature count is strictly greater than this
    pub threshold: usize,
    pub order: EntryOrder,
    pub partials: PartialNaming,
    pub pretty: bool,
    pub progress: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            threshold: FLUSH_THRESHOLD,
            order: EntryOrder::default(),
            partials: PartialNaming::default(),
            pretty: false,
            progress: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flush {
    pub path: PathBuf,
    pub features: usize,
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReport {
    pub files_merged: usize,
    pub features_read: usize,
    /// Partial writes in the order they happened
    pub flushes: Vec<Flush>,
    pub final_output: PathBuf,
    pub final_features: usize,
}

fn is_output_name(name: &str) -> bool {
    name == FINAL_OUTPUT || (name.starts_with("merged_partial") && name.ends_with(GEOJSON_SUFFIX))
}

/// Snapshot the `.geojson` entries of `dir`. Taken before anything is
/// written, so outputs of this run are never read back by it.
fn geojson_entries(dir: &Path, order: EntryOrder) -> Result<Vec<PathBuf>> {
    let listing = fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))?;

    let mut entries = Vec::new();
    for entry in listing {
        let entry = entry.with_context(|| format!("listing {}", dir.display()))?;
        if entry.file_name().to_string_lossy().ends_with(GEOJSON_SUFFIX) {
            entries.push(entry.path());
        }
    }

    if order == EntryOrder::Lexical {
        entries.sort();
    }
    Ok(entries)
}

/// Concatenate the features of every `.geojson` file in `dir`.
///
/// Features are appended file by file. Whenever the pending count exceeds
/// `options.threshold` they are written to the partial output and the
/// accumulator starts over; whatever is left at the end (possibly nothing)
/// goes to `merged.geojson`. The first failure aborts the run, leaving any
/// partial output already written in place.
pub fn run(dir: &Path, options: &MergeOptions) -> Result<MergeReport> {
    let inputs = geojson_entries(dir, options.order)?;
    info!("Found {} GeoJSON file(s) in {}", inputs.len(), dir.display());

    let bar = if options.progress {
        ProgressBar::new(inputs.len() as u64)
    } else {
        ProgressBar::hidden()
    };
    bar.set_style(ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
    )?);

    let mut accumulator: Vec<Value> = Vec::new();
    let mut report = MergeReport {
        files_merged: 0,
        features_read: 0,
        flushes: Vec::new(),
        final_output: dir.join(FINAL_OUTPUT),
        final_features: 0,
    };

    for path in &inputs {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        bar.set_message(name.clone());
        if is_output_name(&name) {
            bar.suspend(|| {
                warn!("{} looks like an earlier merge output; merging it anyway", path.display())
            });
        }

        let collection = read_collection(path)?;
        if !collection.is_tagged() {
            bar.suspend(|| {
                warn!(
                    "{} has type {:?}, expected {FEATURE_COLLECTION}",
                    path.display(),
                    collection.kind
                )
            });
        }

        let count = collection.features.len();
        accumulator.extend(collection.features);
        report.files_merged += 1;
        report.features_read += count;
        info!(
            "Merged {count} feature(s) from {} ({} pending)",
            path.display(),
            accumulator.len()
        );

        if accumulator.len() > options.threshold {
            let partial = options.partials.path(dir, report.flushes.len() + 1);
            write_collection(&partial, &accumulator, options.pretty)?;
            info!("Flushed {} feature(s) to {}", accumulator.len(), partial.display());
            report.flushes.push(Flush {
                path: partial,
                features: accumulator.len(),
            });
            accumulator.clear();
        }
        bar.inc(1);
    }
    bar.finish_with_message("merge complete");

    write_collection(&report.final_output, &accumulator, options.pretty)?;
    report.final_features = accumulator.len();
    info!(
        "Wrote {} feature(s) to {}",
        report.final_features,
        report.final_output.display()
    );

    Ok(report)
}
