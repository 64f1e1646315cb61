//! # dbre - Plateau Analysis for Discharge Reference Electrode Recordings
//!
//! `dbre` processes the voltage-versus-time traces a potentiostat writes
//! to disk while a discharge reference electrode (DBRE) experiment runs:
//! it waits for each measurement file to appear, locates the
//! quasi-steady-state plateau of the discharge curve, and condenses the
//! plateau into a potential, an uncertainty and a duration that
//! accumulate into a run-level summary table.
//!
//! ## Pipeline
//!
//! ```text
//! poll -> dta -> trace (preprocess) -> detect (+ retry) -> estimate -> summary
//! ```
//!
//! - [`poll`]: block until the instrument has written a non-empty file.
//! - [`dta`]: parse the tab-delimited measurement format (fixed header
//!   lines carrying date/time stamps and the charging time, then the
//!   data rows).
//! - [`trace`]: truncate to the evaluation horizon and derive the first
//!   derivative and the spline-smoothed concavity.
//! - [`detect`]: two independent threshold scans (slope, concavity) with
//!   a conservative tie-break, wrapped in a one-shot relaxed retry when
//!   no plateau lands before the horizon.
//! - [`estimate`]: trapezoidal time-weighted potential, half-range
//!   uncertainty, plateau duration.
//! - [`summary`]: per-run record accumulation, per-file trace tables,
//!   cross-run compilation.
//!
//! ## Example
//!
//! ```rust,no_run
//! use dbre::detect::{detect_with_retry, ThresholdSet};
//! use dbre::estimate::{estimate, Polarity};
//! use dbre::trace::{preprocess, DEFAULT_SMOOTHING};
//! use dbre::dta;
//!
//! let measurement = dta::read_measurement("A_DBRE_#1.DTA")?;
//! let trace = preprocess(&measurement.samples, 600.0, DEFAULT_SMOOTHING)?;
//!
//! let thresholds = ThresholdSet {
//!     slope_threshold: 0.008,
//!     concavity_threshold: 0.001,
//!     min_plateau_length: 15.0,
//! };
//! let detection = detect_with_retry(
//!     &trace,
//!     measurement.header.charging_time,
//!     &thresholds,
//!     600.0,
//! );
//! let result = estimate(&trace, &detection.window, Polarity::Negative)?;
//! println!(
//!     "{:.4} V +/- {:.4} V over {:.1} s ({})",
//!     result.potential, result.uncertainty, result.duration, detection.quality
//! );
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Failure model
//!
//! Missing or still-streaming files are "not yet ready" and polled, not
//! errors. Corrupt header metadata aborts the run: the stamps and the
//! charging time feed every downstream number. A plateau that never
//! lands before the horizon, even after the one relaxed retry, still
//! produces a best-effort record, flagged
//! [`detect::PlateauQuality::Unconverged`] so the operator knows to
//! audit the trace table.

// Documentation lints - enforce complete documentation for publication
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

pub mod detect;
pub mod dta;
pub mod estimate;
pub mod poll;
pub mod spline;
pub mod summary;
pub mod trace;

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::detect::{
        detect, detect_with_retry, Detection, PlateauQuality, PlateauWindow, ThresholdSet,
    };
    pub use crate::dta::{read_measurement, DtaError, Measurement, MeasurementHeader};
    pub use crate::estimate::{estimate, EstimateError, PlateauResult, Polarity};
    pub use crate::poll::AcquisitionPoller;
    pub use crate::summary::{
        compile_runs, elapsed_hours, write_trace_table, RunAccumulator, RunManifest, RunRecord,
        SummaryError,
    };
    pub use crate::trace::{preprocess, Sample, Trace, TraceError, DEFAULT_SMOOTHING};
}
