//! Trace model and signal preprocessing.
//!
//! A [`Trace`] owns one measurement's voltage-versus-time samples together
//! with the derived signals the plateau detector consumes: the numerical
//! first derivative and a spline-smoothed second derivative (concavity).
//! All derived vectors are index-aligned with the samples.
//!
//! Preprocessing truncates the recording at a caller-supplied time horizon
//! before deriving anything. This bounds evaluation cost and keeps
//! instrument end-of-log noise out of the analysis window.

use serde::{Deserialize, Serialize};

use crate::spline::{self, SplineError};

/// Default curvature penalty for the concavity spline fit.
///
/// Tuned for 10 Hz potentiostat traces; a fixed constant by design, never
/// derived from the data.
pub const DEFAULT_SMOOTHING: f64 = 1e-3;

/// Errors raised while preparing a trace for detection.
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    /// Fewer samples than the spline fit needs (cubic order + 1).
    #[error("insufficient data: {0} samples within the horizon, need at least 4")]
    InsufficientData(usize),

    /// Sample times must be strictly increasing.
    #[error("sample times not strictly increasing at index {0}")]
    NonMonotonicTime(usize),

    /// A sample carried NaN or infinite time/voltage.
    #[error("non-finite sample at index {0}")]
    NonFiniteValue(usize),
}

impl From<SplineError> for TraceError {
    fn from(error: SplineError) -> Self {
        match error {
            SplineError::TooFewPoints(n) => TraceError::InsufficientData(n),
            SplineError::NonMonotonic(i) => TraceError::NonMonotonicTime(i),
            // Unreachable for the fixed smoothing constants used here, but
            // map it somewhere sensible rather than panicking.
            SplineError::InvalidSmoothing(_) => TraceError::InsufficientData(0),
        }
    }
}

/// One potentiostat reading: elapsed time in seconds, cell voltage in volts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Elapsed time since the start of the measurement, in seconds.
    pub time: f64,
    /// Measured cell voltage, in volts.
    pub voltage: f64,
}

impl Sample {
    /// Convenience constructor.
    pub fn new(time: f64, voltage: f64) -> Self {
        Self { time, voltage }
    }
}

/// A measurement trace with its derived signals.
///
/// Invariant: `times`, `voltages`, `smoothed`, `derivative` and
/// `concavity` all have the same length and share indices.
#[derive(Debug, Clone)]
pub struct Trace {
    /// Sample times in seconds, strictly increasing.
    pub times: Vec<f64>,
    /// Raw voltages, parallel to `times`.
    pub voltages: Vec<f64>,
    /// Spline-fitted (smoothed) voltages, parallel to `times`.
    pub smoothed: Vec<f64>,
    /// Numerical dV/dt, parallel to `times`.
    pub derivative: Vec<f64>,
    /// Smoothed d2V/dt2 from the spline fit, parallel to `times`.
    pub concavity: Vec<f64>,
}

impl Trace {
    /// Number of samples in the trace.
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Whether the trace holds no samples.
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

/// Build a [`Trace`] from raw samples.
///
/// Keeps samples with `time <= time_horizon`, computes the central
/// difference derivative and the spline-smoothed concavity, and validates
/// the trace contract. `smoothing` is the spline curvature penalty; pass
/// [`DEFAULT_SMOOTHING`] unless the sampling cadence calls for retuning.
pub fn preprocess(
    samples: &[Sample],
    time_horizon: f64,
    smoothing: f64,
) -> Result<Trace, TraceError> {
    let mut times = Vec::with_capacity(samples.len());
    let mut voltages = Vec::with_capacity(samples.len());
    for (i, sample) in samples.iter().enumerate() {
        if !sample.time.is_finite() || !sample.voltage.is_finite() {
            return Err(TraceError::NonFiniteValue(i));
        }
        if sample.time > time_horizon {
            continue;
        }
        times.push(sample.time);
        voltages.push(sample.voltage);
    }

    if times.len() < 4 {
        return Err(TraceError::InsufficientData(times.len()));
    }
    for i in 1..times.len() {
        if times[i] <= times[i - 1] {
            return Err(TraceError::NonMonotonicTime(i));
        }
    }

    let derivative = gradient(&times, &voltages);
    let fit = spline::fit(&times, &voltages, smoothing)?;

    Ok(Trace {
        times,
        voltages,
        smoothed: fit.fitted,
        derivative,
        concavity: fit.second_derivative,
    })
}

/// Central difference gradient over an irregular grid.
///
/// Interior points use `(v[i+1] - v[i-1]) / (t[i+1] - t[i-1])`; the two
/// boundary points fall back to one-sided differences.
fn gradient(times: &[f64], values: &[f64]) -> Vec<f64> {
    let n = times.len();
    debug_assert!(n >= 2);
    let mut out = Vec::with_capacity(n);
    out.push((values[1] - values[0]) / (times[1] - times[0]));
    for i in 1..n - 1 {
        out.push((values[i + 1] - values[i - 1]) / (times[i + 1] - times[i - 1]));
    }
    out.push((values[n - 1] - values[n - 2]) / (times[n - 1] - times[n - 2]));
    out
}
