//! Generate a synthetic experiment folder for testing.
//!
//! Writes a sequence of DTA files with a realistic discharge shape: an
//! exponential transient settling onto a slowly drifting plateau with
//! low-frequency noise, ending in a sharp voltage rise once the
//! discharge is exhausted. The noise is deterministic (sine-based), so
//! repeated runs produce identical folders.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use log::info;
use std::path::PathBuf;

use dbre::dta::{write_measurement, MeasurementHeader};
use dbre::trace::Sample;

/// Sampling interval of the synthetic instrument, in seconds.
const SAMPLE_INTERVAL: f64 = 0.1;
/// Length of each synthetic recording, in seconds.
const RECORD_LENGTH: f64 = 110.0;
/// End of the plateau; the voltage rises sharply afterwards.
const DISCHARGE_END: f64 = 100.0;

/// Write `count` synthetic measurements into `dir`.
pub fn run(dir: PathBuf, count: usize, interval_minutes: f64) -> Result<()> {
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let start = NaiveDateTime::parse_from_str("2020-10-27 15:00:00", "%Y-%m-%d %H:%M:%S")
        .context("Bad built-in start stamp")?;

    info!("writing {count} synthetic measurement(s) to {}", dir.display());
    for index in 1..=count {
        let stamp = start + chrono::Duration::seconds((interval_minutes * 60.0) as i64 * (index as i64 - 1));
        let header = MeasurementHeader {
            date: stamp.format("%m/%d/%Y").to_string(),
            time: stamp.format("%H:%M:%S").to_string(),
            charging_time: 3.0,
        };
        let samples = synth_discharge(index);
        let path = dir.join(format!("A_DBRE_#{index}.DTA"));
        write_measurement(&path, &header, &samples)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("  {} ({} samples)", path.display(), samples.len());
    }

    println!(
        "Wrote {} synthetic measurement(s) to {}",
        count,
        dir.display()
    );
    println!("Analyze them with: dbre watch {} --horizon 150", dir.display());
    Ok(())
}

/// One synthetic discharge curve; the plateau drifts a little from file
/// to file so the run summary shows a trend.
fn synth_discharge(index: usize) -> Vec<Sample> {
    let level = -1.2 - 0.002 * (index as f64 - 1.0);
    let phase = index as f64 * 0.7;
    let n = (RECORD_LENGTH / SAMPLE_INTERVAL) as usize;

    (0..=n)
        .map(|i| {
            let t = i as f64 * SAMPLE_INTERVAL;
            let transient = 0.4 * (-t / 0.8).exp();
            let noise = 0.01 * (0.05 * t + phase).sin();
            let tail = if t > DISCHARGE_END {
                0.08 * (t - DISCHARGE_END)
            } else {
                0.0
            };
            Sample::new(t, level + transient + noise + tail)
        })
        .collect()
}
