//! Plateau characterization: duration, time-weighted potential, uncertainty.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::detect::PlateauWindow;
use crate::trace::Trace;

/// Errors from plateau estimation.
#[derive(Debug, thiserror::Error)]
pub enum EstimateError {
    /// Window holds fewer than 2 points; integration is undefined.
    #[error("plateau window [{start}, {end}] has fewer than 2 points")]
    EmptyWindow {
        /// Window start index.
        start: usize,
        /// Window end index.
        end: usize,
    },

    /// Window indices fall outside the trace.
    #[error("plateau window end {end} out of bounds for trace of length {len}")]
    OutOfBounds {
        /// Window end index.
        end: usize,
        /// Trace length.
        len: usize,
    },
}

/// Sign convention for the reported potential.
///
/// Cells wired with the working electrode negative produce negative
/// voltage traces; reporting against the reference couple then flips the
/// sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    /// Report the time-weighted mean voltage as measured.
    Positive,
    /// Negate the time-weighted mean voltage.
    #[default]
    Negative,
}

impl Polarity {
    fn apply(self, value: f64) -> f64 {
        match self {
            Polarity::Positive => value,
            Polarity::Negative => -value,
        }
    }
}

/// Characterization of one detected plateau. Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlateauResult {
    /// Plateau duration in seconds.
    pub duration: f64,
    /// Time-weighted mean potential over the plateau, in volts.
    pub potential: f64,
    /// Half the voltage range within the plateau, in volts.
    pub uncertainty: f64,
}

/// Characterize the plateau spanned by `window` (inclusive on both ends).
///
/// The duration is the trapezoidal integral of the constant 1 over time
/// and the potential is the trapezoidal time integral of voltage divided
/// by that duration, so the two stay numerically consistent on irregular
/// grids. The uncertainty is half the voltage excursion in the window.
pub fn estimate(
    trace: &Trace,
    window: &PlateauWindow,
    polarity: Polarity,
) -> Result<PlateauResult, EstimateError> {
    if window.end >= trace.len() {
        return Err(EstimateError::OutOfBounds {
            end: window.end,
            len: trace.len(),
        });
    }
    if window.end <= window.start {
        return Err(EstimateError::EmptyWindow {
            start: window.start,
            end: window.end,
        });
    }

    let times = &trace.times[window.start..=window.end];
    let voltages = &trace.voltages[window.start..=window.end];

    let ones = vec![1.0; times.len()];
    let duration = trapezoid(times, &ones);
    let mean = trapezoid(times, voltages) / duration;

    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for &v in voltages {
        lo = lo.min(v);
        hi = hi.max(v);
    }

    Ok(PlateauResult {
        duration,
        potential: polarity.apply(mean),
        uncertainty: (hi - lo) / 2.0,
    })
}

/// Trapezoidal rule over an irregular grid.
fn trapezoid(x: &[f64], y: &[f64]) -> f64 {
    let mut acc = 0.0;
    for i in 0..x.len() - 1 {
        acc += (x[i + 1] - x[i]) * (y[i + 1] + y[i]) / 2.0;
    }
    acc
}
