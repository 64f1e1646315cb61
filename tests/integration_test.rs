//! Integration tests for dbre
//!
//! These tests verify the full pipeline from measurement files on disk to
//! compiled summary tables.

use dbre::detect::{detect_with_retry, PlateauQuality, ThresholdSet};
use dbre::estimate::{estimate, Polarity};
use dbre::dta::{self, MeasurementHeader};
use dbre::summary::{
    compile_runs, elapsed_hours, read_summary, write_trace_table, RunAccumulator, RunManifest,
    RunRecord,
};
use dbre::trace::{preprocess, Sample, DEFAULT_SMOOTHING};
use std::path::Path;
use tempfile::tempdir;

const THRESHOLDS: ThresholdSet = ThresholdSet {
    slope_threshold: 0.008,
    concavity_threshold: 0.001,
    min_plateau_length: 15.0,
};
const HORIZON: f64 = 100.0;

/// Synthetic discharge: exponential transient from -0.8 V settling onto a
/// -1.2 V plateau with slow +/-0.01 V noise, then a sharp drop after
/// 100 s. Sampled at 10 Hz out to 110 s.
fn synth_discharge(phase: f64) -> Vec<Sample> {
    (0..=1100)
        .map(|i| {
            let t = i as f64 * 0.1;
            let transient = 0.4 * (-t / 0.8).exp();
            let noise = 0.01 * (0.1 * t + phase).sin();
            let tail = if t > 100.0 { -0.08 * (t - 100.0) } else { 0.0 };
            Sample::new(t, -1.2 + transient + noise + tail)
        })
        .collect()
}

fn write_synth(path: &Path, date: &str, time: &str, phase: f64) {
    let header = MeasurementHeader {
        date: date.to_string(),
        time: time.to_string(),
        charging_time: 3.0,
    };
    dta::write_measurement(path, &header, &synth_discharge(phase)).unwrap();
}

/// The headline scenario: the trace is flat from the end of the transient
/// all the way to the horizon, so detection soft-fails (the drop is
/// truncated away), yet the best-effort window yields the right numbers.
#[test]
fn test_end_to_end_plateau_characterization() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("A_DBRE_#1.DTA");
    write_synth(&path, "10/27/2020", "15:00:00", 0.3);

    let measurement = dta::read_measurement(&path).unwrap();
    assert_eq!(measurement.header.charging_time, 3.0);
    assert_eq!(measurement.samples.len(), 1101);

    let trace = preprocess(&measurement.samples, HORIZON, DEFAULT_SMOOTHING).unwrap();
    // Truncated at the horizon: the drop after 100 s is gone.
    assert!(trace.times.last().copied().unwrap() <= HORIZON);
    assert_eq!(trace.len(), trace.derivative.len());
    assert_eq!(trace.len(), trace.concavity.len());

    let detection = detect_with_retry(
        &trace,
        measurement.header.charging_time,
        &THRESHOLDS,
        HORIZON,
    );
    // The scan runs into the horizon even after relaxation.
    assert_eq!(detection.quality, PlateauQuality::Unconverged);

    let result = estimate(&trace, &detection.window, Polarity::Positive).unwrap();
    assert!(
        (result.potential - -1.2).abs() < 0.01,
        "potential = {}",
        result.potential
    );
    assert!(
        (result.uncertainty - 0.01).abs() < 0.002,
        "uncertainty = {}",
        result.uncertainty
    );
    assert!(
        (result.duration - 95.0).abs() < 2.0,
        "duration = {}",
        result.duration
    );
}

/// A trace that ends in a sharp rise before the horizon converges on the
/// first attempt and brackets the plateau tightly.
#[test]
fn test_convergent_detection_on_a_rising_tail() {
    let samples: Vec<Sample> = (0..=1100)
        .map(|i| {
            let t = i as f64 * 0.1;
            let transient = 0.4 * (-t / 0.8).exp();
            let tail = if t > 100.0 { 0.08 * (t - 100.0) } else { 0.0 };
            Sample::new(t, -1.2 + transient + tail)
        })
        .collect();

    let trace = preprocess(&samples, 150.0, DEFAULT_SMOOTHING).unwrap();
    let detection = detect_with_retry(&trace, 3.0, &THRESHOLDS, 150.0);
    assert_eq!(detection.quality, PlateauQuality::Converged);

    let end_time = trace.times[detection.window.end];
    assert!(
        (99.0..103.0).contains(&end_time),
        "plateau end at t = {end_time}"
    );

    let result = estimate(&trace, &detection.window, Polarity::Negative).unwrap();
    // Negative polarity reports against the reference couple.
    assert!((result.potential - 1.2).abs() < 0.01);
}

/// Full run flow: process a folder of measurements into a persisted
/// summary, then compile two runs into a master table.
#[test]
fn test_run_accumulation_and_compilation() {
    let root = tempdir().unwrap();

    for (folder, date) in [("salt_a", "10/27/2020"), ("salt_b", "10/28/2020")] {
        let dir = root.path().join(folder);
        std::fs::create_dir(&dir).unwrap();
        for index in 1..=3usize {
            let time = format!("{:02}:00:00", 14 + index);
            write_synth(
                &dir.join(format!("A_DBRE_#{index}.DTA")),
                date,
                &time,
                index as f64 * 0.7,
            );
        }

        let mut start: Option<chrono::NaiveDateTime> = None;
        let mut accumulator: Option<RunAccumulator> = None;

        for index in 1..=3usize {
            let path = dir.join(format!("A_DBRE_#{index}.DTA"));
            let measurement = dta::read_measurement(&path).unwrap();
            let stamp = measurement.header.timestamp().unwrap();
            let start = *start.get_or_insert(stamp);
            let accumulator = accumulator.get_or_insert_with(|| {
                RunAccumulator::new(
                    dir.join("summary.csv"),
                    RunManifest {
                        start_time: start,
                        thresholds: THRESHOLDS,
                        time_horizon: HORIZON,
                        polarity: Polarity::Negative,
                        records_written: 0,
                    },
                )
            });

            let trace = preprocess(&measurement.samples, HORIZON, DEFAULT_SMOOTHING).unwrap();
            let detection = detect_with_retry(
                &trace,
                measurement.header.charging_time,
                &THRESHOLDS,
                HORIZON,
            );
            let result = estimate(&trace, &detection.window, Polarity::Negative).unwrap();

            write_trace_table(dir.join(format!("A_DBRE_#{index}_trace.csv")), &trace).unwrap();

            accumulator.append(RunRecord {
                hours: elapsed_hours(start, stamp),
                date: measurement.header.date.clone(),
                time: measurement.header.time.clone(),
                potential: result.potential,
                uncertainty: result.uncertainty,
                plateau_duration: result.duration,
                quality: detection.quality,
            });
            accumulator.persist().unwrap();
        }

        let records = read_summary(dir.join("summary.csv")).unwrap();
        assert_eq!(records.len(), 3);
        // Hourly stamps, hours measured from the first file.
        assert_eq!(records[0].hours, 0.0);
        assert!((records[1].hours - 1.0).abs() < 1e-9);
        assert!((records[2].hours - 2.0).abs() < 1e-9);
        for record in &records {
            assert!((record.potential - 1.2).abs() < 0.02);
            assert!(record.uncertainty < 0.02);
        }

        // The manifest tracks the record count.
        let manifest: RunManifest = serde_json::from_str(
            &std::fs::read_to_string(dir.join("summary.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(manifest.records_written, 3);
    }

    let output = root.path().join("summary_all.csv");
    let compiled = compile_runs(root.path(), "summary.csv", &output).unwrap();
    assert_eq!(compiled, 6);

    let combined = read_summary(&output).unwrap();
    assert_eq!(combined.len(), 6);
    // salt_a sorts before salt_b.
    assert_eq!(combined[0].date, "10/27/2020");
    assert_eq!(combined[5].date, "10/28/2020");
}

/// Malformed header metadata must fail loudly, not produce a record.
#[test]
fn test_corrupt_header_aborts() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("A_DBRE_#1.DTA");
    write_synth(&path, "10/27/2020", "15:00:00", 0.0);

    // Corrupt the charging-time line.
    let content = std::fs::read_to_string(&path).unwrap();
    let corrupted = content.replace("TCHARGE\tQUANT\t3\t", "TCHARGE\tQUANT\tnope\t");
    std::fs::write(&path, corrupted).unwrap();

    let err = dta::read_measurement(&path).unwrap_err();
    assert!(!err.is_not_ready());
}
