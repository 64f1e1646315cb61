//! Run-level result accumulation and tabular outputs.
//!
//! One [`RunRecord`] is appended per processed measurement file and the
//! whole table is persisted after every append, so partial progress
//! survives an interrupted run. Alongside the CSV table the accumulator
//! maintains a small JSON manifest (start time, thresholds, record
//! count) for quick human inspection without opening the table.
//!
//! [`compile_runs`] concatenates the per-folder summary tables of a
//! whole experiment campaign into one master table.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use log::info;
use serde::{Deserialize, Serialize};

use crate::detect::{PlateauQuality, ThresholdSet};
use crate::estimate::Polarity;
use crate::trace::Trace;

/// Errors from summary and table I/O.
#[derive(Debug, thiserror::Error)]
pub enum SummaryError {
    /// I/O error.
    #[error("summary I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV encoding/decoding error.
    #[error("summary table error: {0}")]
    Csv(#[from] csv::Error),

    /// Manifest serialization error.
    #[error("manifest error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One row of the run summary table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Hours elapsed between the experiment start and this measurement.
    pub hours: f64,
    /// Instrument date stamp.
    pub date: String,
    /// Instrument time stamp.
    pub time: String,
    /// Plateau potential in volts.
    pub potential: f64,
    /// Half the plateau voltage range, in volts.
    pub uncertainty: f64,
    /// Plateau duration in seconds.
    pub plateau_duration: f64,
    /// Detection quality flag for operator auditing.
    pub quality: PlateauQuality,
}

/// Analysis settings echoed into the run manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    /// Configured experiment start time.
    pub start_time: NaiveDateTime,
    /// Detection thresholds in force for the run.
    pub thresholds: ThresholdSet,
    /// Evaluation horizon in seconds.
    pub time_horizon: f64,
    /// Reported sign convention.
    pub polarity: Polarity,
    /// Number of records written so far.
    pub records_written: usize,
}

/// Accumulates one record per measurement and persists the growing table.
///
/// Owned by the run driver and passed by mutable reference into each
/// processing step; nothing else writes to the table.
#[derive(Debug)]
pub struct RunAccumulator {
    summary_path: PathBuf,
    manifest_path: PathBuf,
    manifest: RunManifest,
    records: Vec<RunRecord>,
}

impl RunAccumulator {
    /// Create an accumulator that persists to `summary_path` (CSV) and a
    /// sibling `.json` manifest.
    pub fn new(summary_path: PathBuf, manifest: RunManifest) -> Self {
        let manifest_path = summary_path.with_extension("json");
        Self {
            summary_path,
            manifest_path,
            manifest,
            records: Vec::new(),
        }
    }

    /// Records accumulated so far, in processing order.
    pub fn records(&self) -> &[RunRecord] {
        &self.records
    }

    /// Append one record. Call [`RunAccumulator::persist`] afterwards.
    pub fn append(&mut self, record: RunRecord) {
        self.records.push(record);
    }

    /// Rewrite the summary table and manifest.
    ///
    /// The table is small (one row per measurement), so a full rewrite
    /// after every file keeps the on-disk state consistent without any
    /// append bookkeeping.
    pub fn persist(&mut self) -> Result<(), SummaryError> {
        let mut writer = csv::Writer::from_path(&self.summary_path)?;
        for record in &self.records {
            writer.serialize(record)?;
        }
        writer.flush()?;

        self.manifest.records_written = self.records.len();
        let file = File::create(&self.manifest_path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), &self.manifest)?;

        info!(
            "persisted {} record(s) to {}",
            self.records.len(),
            self.summary_path.display()
        );
        Ok(())
    }
}

/// Hours elapsed from `start` to `stamp`; negative when `stamp` precedes it.
pub fn elapsed_hours(start: NaiveDateTime, stamp: NaiveDateTime) -> f64 {
    (stamp - start).num_milliseconds() as f64 / 3_600_000.0
}

/// Persist the preprocessed trace with its derived columns.
///
/// One row per sample: time, raw voltage, spline-fitted voltage, first
/// derivative, smoothed concavity. This is the traceability artifact the
/// operator audits when a record is flagged unconverged.
pub fn write_trace_table<P: AsRef<Path>>(path: P, trace: &Trace) -> Result<(), SummaryError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([
        "time_s",
        "voltage_v",
        "smoothed_v",
        "derivative_v_per_s",
        "concavity_v_per_s2",
    ])?;
    for i in 0..trace.len() {
        writer.write_record([
            trace.times[i].to_string(),
            trace.voltages[i].to_string(),
            trace.smoothed[i].to_string(),
            trace.derivative[i].to_string(),
            trace.concavity[i].to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a persisted summary table back into records.
pub fn read_summary<P: AsRef<Path>>(path: P) -> Result<Vec<RunRecord>, SummaryError> {
    let file = File::open(path)?;
    let mut reader = csv::Reader::from_reader(BufReader::new(file));
    let mut records = Vec::new();
    for record in reader.deserialize() {
        records.push(record?);
    }
    Ok(records)
}

/// Concatenate the per-folder summaries under `root` into one master table.
///
/// Scans the immediate subdirectories of `root` (sorted by name for a
/// stable output order), picks up every one containing `summary_name`,
/// and writes the combined table to `output`. Returns the number of
/// records compiled.
pub fn compile_runs(
    root: &Path,
    summary_name: &str,
    output: &Path,
) -> Result<usize, SummaryError> {
    let mut folders: Vec<PathBuf> = std::fs::read_dir(root)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    folders.sort();

    let mut combined = Vec::new();
    for folder in folders {
        let candidate = folder.join(summary_name);
        if !candidate.is_file() {
            continue;
        }
        let records = read_summary(&candidate)?;
        info!("{}: {} record(s)", candidate.display(), records.len());
        combined.extend(records);
    }

    let mut writer = csv::Writer::from_path(output)?;
    for record in &combined {
        writer.serialize(record)?;
    }
    writer.flush()?;

    Ok(combined.len())
}
