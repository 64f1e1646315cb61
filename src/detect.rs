//! Plateau detection over a preprocessed trace.
//!
//! Two independent single-pass scans walk the post-charging samples: one
//! thresholds the first derivative, the other thresholds the smoothed
//! concavity with a symmetric band around zero. Each scan arms itself on
//! the first in-band sample and disarms (ends the plateau) on the first
//! above-threshold sample after a sustained in-plateau stretch. The
//! tighter of the two windows wins.
//!
//! Detection is total: it always returns some window, even a degenerate
//! one, and leaves the "was this credible" judgment to
//! [`detect_with_retry`], which relaxes the thresholds once when the
//! window runs into the time horizon.

use serde::{Deserialize, Serialize};

use crate::trace::Trace;

/// Threshold parameters for one detection attempt.
///
/// `Copy` on purpose: relaxation during retry happens on a copy, so a
/// failed attempt can never leak adjusted values back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSet {
    /// Maximum first derivative for a sample to count as in-plateau (V/s).
    pub slope_threshold: f64,
    /// Symmetric band on the smoothed second derivative (V/s^2).
    pub concavity_threshold: f64,
    /// Minimum in-plateau stretch, in samples, before an exit may trigger.
    pub min_plateau_length: f64,
}

impl ThresholdSet {
    /// The relaxed set used for the single retry attempt.
    pub fn relaxed(&self) -> Self {
        Self {
            slope_threshold: self.slope_threshold / 5.0,
            concavity_threshold: self.concavity_threshold / 3.0,
            min_plateau_length: self.min_plateau_length / 1.5,
        }
    }
}

/// Detected plateau region, as inclusive indices into the trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlateauWindow {
    /// First index of the plateau.
    pub start: usize,
    /// Last index of the plateau, `end >= start`.
    pub end: usize,
}

/// How trustworthy a detection is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlateauQuality {
    /// Found comfortably before the time horizon on the first attempt.
    Converged,
    /// Found only after the one-shot threshold relaxation.
    Relaxed,
    /// Best-effort window; the scan ran into the horizon even when
    /// relaxed. The operator should audit the trace table for this file.
    Unconverged,
}

impl std::fmt::Display for PlateauQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlateauQuality::Converged => write!(f, "converged"),
            PlateauQuality::Relaxed => write!(f, "relaxed"),
            PlateauQuality::Unconverged => write!(f, "unconverged"),
        }
    }
}

/// A window together with the retry outcome that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    /// The selected plateau window.
    pub window: PlateauWindow,
    /// Outcome of the retry protocol.
    pub quality: PlateauQuality,
}

/// Run both scans and return the tighter window.
///
/// Samples with `time <= charging_time` are excluded from the scans (the
/// chronopotentiometric charging transient is never part of the plateau);
/// the returned indices are absolute into `trace`. When no sample
/// survives the cut the degenerate window `(0, 0)` is returned.
pub fn detect(trace: &Trace, charging_time: f64, thresholds: &ThresholdSet) -> PlateauWindow {
    let offset = match trace.times.iter().position(|&t| t > charging_time) {
        Some(i) => i,
        None => return PlateauWindow { start: 0, end: 0 },
    };

    let by_slope = scan(
        &trace.derivative[offset..],
        |d| d < thresholds.slope_threshold,
        |d| d > thresholds.slope_threshold,
        thresholds.min_plateau_length,
    );
    let by_concavity = scan(
        &trace.concavity[offset..],
        |c| c.abs() < thresholds.concavity_threshold,
        |c| c > thresholds.concavity_threshold,
        thresholds.min_plateau_length,
    );

    // The smaller end index is the more conservative estimate; on an
    // exact tie the concavity window is preferred.
    let (start, end) = if by_slope.1 < by_concavity.1 {
        by_slope
    } else {
        by_concavity
    };

    PlateauWindow {
        start: offset + start,
        end: offset + end,
    }
}

/// Single-pass arm/disarm scan shared by both criteria.
///
/// Arms at the first sample where `enters` holds (that index becomes the
/// window start and is never moved), and stops at the first later sample
/// where `exits` holds after more than `min_len` samples in-plateau. If
/// the scan runs off the end of the data, the last index is the end.
fn scan(
    signal: &[f64],
    enters: impl Fn(f64) -> bool,
    exits: impl Fn(f64) -> bool,
    min_len: f64,
) -> (usize, usize) {
    let mut start: Option<usize> = None;
    for (i, &x) in signal.iter().enumerate() {
        if start.is_none() && enters(x) {
            start = Some(i);
        }
        if let Some(s) = start {
            if exits(x) && (i - s) as f64 > min_len {
                return (s, i);
            }
        }
    }
    let end = signal.len().saturating_sub(1);
    (start.unwrap_or(0).min(end), end)
}

/// Detect with the caller's thresholds, retrying once with a relaxed set.
///
/// Success means the window's end time sits strictly before
/// `time_horizon`. On failure the thresholds are relaxed (slope / 5,
/// concavity / 3, minimum length / 1.5) and detection runs exactly once
/// more; the relaxation happens on a copy, so the caller's `ThresholdSet`
/// is untouched regardless of the outcome and repeated calls with the
/// same inputs give the same answer.
pub fn detect_with_retry(
    trace: &Trace,
    charging_time: f64,
    thresholds: &ThresholdSet,
    time_horizon: f64,
) -> Detection {
    if trace.is_empty() {
        return Detection {
            window: PlateauWindow { start: 0, end: 0 },
            quality: PlateauQuality::Unconverged,
        };
    }

    let window = detect(trace, charging_time, thresholds);
    if trace.times[window.end] < time_horizon {
        return Detection {
            window,
            quality: PlateauQuality::Converged,
        };
    }

    log::warn!(
        "plateau end at t={:.1}s reached the {:.1}s horizon; retrying with relaxed thresholds",
        trace.times[window.end],
        time_horizon
    );
    let window = detect(trace, charging_time, &thresholds.relaxed());
    let quality = if trace.times[window.end] < time_horizon {
        PlateauQuality::Relaxed
    } else {
        log::warn!("no plateau within the horizon even after relaxation");
        PlateauQuality::Unconverged
    };

    Detection { window, quality }
}
