//! One-shot analysis of a single measurement file.

use anyhow::{Context, Result};
use log::info;
use std::path::PathBuf;

use dbre::detect::detect_with_retry;
use dbre::estimate::estimate;
use dbre::dta;
use dbre::summary::write_trace_table;
use dbre::trace::preprocess;

use super::config::{AnalysisArgs, Config};

/// Analyze one DTA file and print the plateau characterization.
pub fn run(
    file: PathBuf,
    config: Option<PathBuf>,
    analysis: AnalysisArgs,
    charging_time: Option<f64>,
    trace_table: Option<PathBuf>,
) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("Input file does not exist: {}", file.display());
    }

    let config = Config::load(config.as_deref())?;
    let settings = analysis.resolve(&config.analysis);

    let measurement = dta::read_measurement(&file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let charging = charging_time.unwrap_or(measurement.header.charging_time);
    info!(
        "{}: {} samples, stamped {} {}, charging time {:.1}s",
        file.display(),
        measurement.samples.len(),
        measurement.header.date,
        measurement.header.time,
        charging
    );

    let trace = preprocess(&measurement.samples, settings.time_horizon, settings.smoothing)
        .context("Failed to preprocess trace")?;
    let detection = detect_with_retry(
        &trace,
        charging,
        &settings.thresholds,
        settings.time_horizon,
    );
    let result = estimate(&trace, &detection.window, settings.polarity)
        .context("Failed to characterize plateau")?;

    if let Some(path) = trace_table {
        write_trace_table(&path, &trace)
            .with_context(|| format!("Failed to write trace table {}", path.display()))?;
        info!("trace table written to {}", path.display());
    }

    println!("File:        {}", file.display());
    println!(
        "Stamp:       {} {}",
        measurement.header.date, measurement.header.time
    );
    println!(
        "Plateau:     t = {:.2}s .. {:.2}s ({} samples)",
        trace.times[detection.window.start],
        trace.times[detection.window.end],
        detection.window.end - detection.window.start + 1
    );
    println!("Duration:    {:.2} s", result.duration);
    println!("Potential:   {:.5} V", result.potential);
    println!("Uncertainty: {:.5} V", result.uncertainty);
    println!("Quality:     {}", detection.quality);

    Ok(())
}
