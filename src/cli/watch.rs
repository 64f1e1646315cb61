//! Sequential run driver: follow an experiment folder file by file.
//!
//! Measurement files are named `<prefix><index>.DTA` with a 1-based
//! index. The driver polls for each file in turn, runs the analysis
//! pipeline on it, appends the record to the run summary and persists
//! before moving on, so a killed run loses nothing. One explicit loop;
//! the retry and next-file transitions are iterative, never recursive.

use anyhow::{Context, Result};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Duration;

use dbre::detect::detect_with_retry;
use dbre::estimate::{estimate, EstimateError};
use dbre::poll::AcquisitionPoller;
use dbre::summary::{elapsed_hours, write_trace_table, RunAccumulator, RunManifest, RunRecord};
use dbre::trace::{preprocess, TraceError};

use super::config::{AnalysisArgs, Config, RunArgs};

/// Follow one experiment folder to completion.
pub fn run(
    dir: PathBuf,
    config: Option<PathBuf>,
    count: Option<usize>,
    analysis: AnalysisArgs,
    run_args: RunArgs,
) -> Result<()> {
    if !dir.is_dir() {
        anyhow::bail!("Not a directory: {}", dir.display());
    }

    let config = Config::load(config.as_deref())?;
    let settings = analysis.resolve(&config.analysis);
    let run_settings = run_args.resolve(&config.run)?;

    let count = match count {
        Some(n) => n,
        None => count_measurements(&dir, &run_settings.file_prefix)?,
    };
    if count == 0 {
        anyhow::bail!(
            "No {}*.DTA files found in {} and no --count given",
            run_settings.file_prefix,
            dir.display()
        );
    }
    info!(
        "watching {} for {} measurement(s), prefix {:?}",
        dir.display(),
        count,
        run_settings.file_prefix
    );

    let poller = AcquisitionPoller::new(Duration::from_secs_f64(run_settings.reset_time_s));
    let mut start_time = run_settings.start_time;
    let mut accumulator: Option<RunAccumulator> = None;

    for index in 1..=count {
        let name = format!("{}{}.DTA", run_settings.file_prefix, index);
        let path = dir.join(&name);

        let measurement = poller
            .wait_for(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let stamp = measurement
            .header
            .timestamp()
            .with_context(|| format!("Bad header stamp in {}", path.display()))?;

        // The experiment start defaults to the first file's own stamp.
        let start = *start_time.get_or_insert(stamp);
        let accumulator = accumulator.get_or_insert_with(|| {
            RunAccumulator::new(
                dir.join(&run_settings.summary_name),
                RunManifest {
                    start_time: start,
                    thresholds: settings.thresholds,
                    time_horizon: settings.time_horizon,
                    polarity: settings.polarity,
                    records_written: 0,
                },
            )
        });

        let trace = match preprocess(
            &measurement.samples,
            settings.time_horizon,
            settings.smoothing,
        ) {
            Ok(trace) => trace,
            Err(err @ TraceError::InsufficientData(_)) => {
                error!("{name}: {err}; no record emitted");
                continue;
            }
            Err(err) => {
                return Err(err).with_context(|| format!("Failed to preprocess {name}"));
            }
        };

        let detection = detect_with_retry(
            &trace,
            measurement.header.charging_time,
            &settings.thresholds,
            settings.time_horizon,
        );

        let result = match estimate(&trace, &detection.window, settings.polarity) {
            Ok(result) => result,
            Err(err @ EstimateError::EmptyWindow { .. }) => {
                error!("{name}: {err}; no record emitted");
                continue;
            }
            Err(err) => {
                return Err(err).with_context(|| format!("Failed to characterize {name}"));
            }
        };

        let trace_path = path.with_file_name(format!(
            "{}_trace.csv",
            path.file_stem().unwrap_or_default().to_string_lossy()
        ));
        write_trace_table(&trace_path, &trace)
            .with_context(|| format!("Failed to write trace table for {name}"))?;

        let record = RunRecord {
            hours: elapsed_hours(start, stamp),
            date: measurement.header.date.clone(),
            time: measurement.header.time.clone(),
            potential: result.potential,
            uncertainty: result.uncertainty,
            plateau_duration: result.duration,
            quality: detection.quality,
        };
        info!(
            "{name}: {:.5} V +/- {:.5} V over {:.1} s ({})",
            record.potential, record.uncertainty, record.plateau_duration, record.quality
        );
        accumulator.append(record);
        accumulator
            .persist()
            .context("Failed to persist run summary")?;

        if run_settings.cycle_time_s > 0.0 && index < count {
            std::thread::sleep(Duration::from_secs_f64(run_settings.cycle_time_s));
        }
    }

    match accumulator {
        Some(acc) => {
            let unconverged = acc
                .records()
                .iter()
                .filter(|r| r.quality != dbre::detect::PlateauQuality::Converged)
                .count();
            if unconverged > 0 {
                warn!("{unconverged} record(s) need auditing (relaxed or unconverged)");
            }
            println!(
                "Processed {} of {} measurement(s) in {}",
                acc.records().len(),
                count,
                dir.display()
            );
        }
        None => println!("No measurements processed in {}", dir.display()),
    }

    Ok(())
}

/// Count `<prefix><n>.DTA` files in `dir` to infer the expected total.
fn count_measurements(dir: &Path, prefix: &str) -> Result<usize> {
    let mut count = 0;
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list {}", dir.display()))?
    {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(prefix) && name.ends_with(".DTA") {
            count += 1;
        }
    }
    Ok(count)
}
