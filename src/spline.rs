//! Natural cubic smoothing spline (Reinsch algorithm).
//!
//! Fits a smoothing spline to irregularly sampled `(t, y)` data by
//! minimizing
//!
//! ```text
//! sum_i (y_i - g(t_i))^2  +  alpha * integral g''(t)^2 dt
//! ```
//!
//! over natural cubic splines `g` with knots at the sample times. The
//! minimizer satisfies the banded system
//!
//! ```text
//! (R + alpha * Q' Q) gamma = Q' y,      g = y - alpha * Q gamma
//! ```
//!
//! where `gamma[j] = g''(t_{j+1})` at the interior knots and `Q`, `R` are
//! the standard second-divided-difference and inner-product matrices. The
//! system is symmetric positive definite and pentadiagonal, so it is
//! solved with a bandwidth-2 LDL' factorization in O(n).
//!
//! Because the knots are the sample times, the smoothed second derivative
//! at every sample is read off directly from `gamma` (zero at the two
//! boundary knots, the natural end conditions).

/// Errors from spline fitting.
#[derive(Debug, thiserror::Error)]
pub enum SplineError {
    /// Not enough points to form an interior knot.
    #[error("smoothing spline requires at least 3 points, got {0}")]
    TooFewPoints(usize),

    /// Knot times must be strictly increasing.
    #[error("knot times must be strictly increasing (violation at index {0})")]
    NonMonotonic(usize),

    /// The smoothing factor must be finite and non-negative.
    #[error("invalid smoothing factor: {0}")]
    InvalidSmoothing(f64),
}

/// Result of a smoothing spline fit, index-aligned with the input samples.
#[derive(Debug, Clone)]
pub struct SmoothingSpline {
    /// Fitted (smoothed) values `g(t_i)`.
    pub fitted: Vec<f64>,
    /// Second derivative `g''(t_i)` at each knot; zero at both ends.
    pub second_derivative: Vec<f64>,
}

/// Fit a natural cubic smoothing spline to `(times, values)`.
///
/// `smoothing` is the curvature penalty weight `alpha`: zero gives the
/// interpolating natural spline, larger values give a stiffer fit. It is a
/// fixed tuning constant, never derived from the data.
pub fn fit(times: &[f64], values: &[f64], smoothing: f64) -> Result<SmoothingSpline, SplineError> {
    let n = times.len().min(values.len());
    if n < 3 {
        return Err(SplineError::TooFewPoints(n));
    }
    if !smoothing.is_finite() || smoothing < 0.0 {
        return Err(SplineError::InvalidSmoothing(smoothing));
    }

    // Interval widths and their reciprocals; 1/h blows up on repeated
    // knots, so reject non-increasing times here.
    let mut h = Vec::with_capacity(n - 1);
    for i in 0..n - 1 {
        let dt = times[i + 1] - times[i];
        if !(dt > 0.0) {
            return Err(SplineError::NonMonotonic(i + 1));
        }
        h.push(dt);
    }
    let e: Vec<f64> = h.iter().map(|dt| 1.0 / dt).collect();

    let m = n - 2;

    // Bands of A = R + alpha * Q'Q and the right-hand side Q'y.
    let mut diag = vec![0.0; m];
    let mut band1 = vec![0.0; m.saturating_sub(1)];
    let mut band2 = vec![0.0; m.saturating_sub(2)];
    let mut rhs = vec![0.0; m];

    for j in 0..m {
        diag[j] = (h[j] + h[j + 1]) / 3.0
            + smoothing * (e[j] * e[j] + (e[j] + e[j + 1]) * (e[j] + e[j + 1]) + e[j + 1] * e[j + 1]);
        rhs[j] = e[j] * values[j] - (e[j] + e[j + 1]) * values[j + 1] + e[j + 1] * values[j + 2];
    }
    for j in 0..m.saturating_sub(1) {
        band1[j] = h[j + 1] / 6.0
            - smoothing * e[j + 1] * (e[j] + 2.0 * e[j + 1] + e[j + 2]);
    }
    for j in 0..m.saturating_sub(2) {
        band2[j] = smoothing * e[j + 1] * e[j + 2];
    }

    let gamma = solve_pentadiagonal(&diag, &band1, &band2, &rhs);

    // Natural end conditions: zero curvature at the boundary knots.
    let mut second_derivative = vec![0.0; n];
    second_derivative[1..n - 1].copy_from_slice(&gamma);

    // g = y - alpha * Q gamma, with gamma zero-padded at the ends.
    let mut fitted = Vec::with_capacity(n);
    for i in 0..n {
        let mut qg = 0.0;
        if i + 1 < n - 1 {
            qg += e[i] * second_derivative[i + 1];
        }
        if i >= 1 && i < n - 1 {
            qg -= (e[i - 1] + e[i]) * second_derivative[i];
        }
        if i >= 2 {
            qg += e[i - 1] * second_derivative[i - 1];
        }
        fitted.push(values[i] - smoothing * qg);
    }

    Ok(SmoothingSpline {
        fitted,
        second_derivative,
    })
}

/// Solve `A x = b` for a symmetric positive definite pentadiagonal `A`
/// given by its diagonal and first/second superdiagonals, via LDL'.
fn solve_pentadiagonal(diag: &[f64], band1: &[f64], band2: &[f64], b: &[f64]) -> Vec<f64> {
    let m = diag.len();
    let mut d = vec![0.0; m];
    let mut l1 = vec![0.0; m];
    let mut l2 = vec![0.0; m];

    d[0] = diag[0];
    if m > 1 {
        l1[1] = band1[0] / d[0];
        d[1] = diag[1] - l1[1] * l1[1] * d[0];
    }
    for j in 2..m {
        l2[j] = band2[j - 2] / d[j - 2];
        l1[j] = (band1[j - 1] - l1[j - 1] * l2[j] * d[j - 2]) / d[j - 1];
        d[j] = diag[j] - l1[j] * l1[j] * d[j - 1] - l2[j] * l2[j] * d[j - 2];
    }

    // Forward substitution L z = b.
    let mut x = vec![0.0; m];
    for j in 0..m {
        let mut z = b[j];
        if j >= 1 {
            z -= l1[j] * x[j - 1];
        }
        if j >= 2 {
            z -= l2[j] * x[j - 2];
        }
        x[j] = z;
    }
    // Diagonal scaling and back substitution L' x = w.
    for j in (0..m).rev() {
        let mut w = x[j] / d[j];
        if j + 1 < m {
            w -= l1[j + 1] * x[j + 1];
        }
        if j + 2 < m {
            w -= l2[j + 2] * x[j + 2];
        }
        x[j] = w;
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_data_has_zero_curvature() {
        let t: Vec<f64> = (0..50).map(|i| i as f64 * 0.1).collect();
        let y = vec![-1.2; 50];
        let spl = fit(&t, &y, 1e-3).unwrap();
        for (g, c) in spl.fitted.iter().zip(&spl.second_derivative) {
            assert!((g - -1.2).abs() < 1e-12);
            assert!(c.abs() < 1e-12);
        }
    }

    #[test]
    fn linear_data_is_reproduced_exactly() {
        let t: Vec<f64> = (0..40).map(|i| i as f64 * 0.25).collect();
        let y: Vec<f64> = t.iter().map(|&x| 0.3 * x - 1.0).collect();
        let spl = fit(&t, &y, 0.01).unwrap();
        for ((g, c), &yi) in spl.fitted.iter().zip(&spl.second_derivative).zip(&y) {
            assert!((g - yi).abs() < 1e-10);
            assert!(c.abs() < 1e-10);
        }
    }

    #[test]
    fn parabola_curvature_recovered_in_the_interior() {
        // y = x^2 has constant second derivative 2; with light smoothing
        // the interior knot curvatures should sit close to it.
        let t: Vec<f64> = (0..101).map(|i| i as f64 * 0.1).collect();
        let y: Vec<f64> = t.iter().map(|&x| x * x).collect();
        let spl = fit(&t, &y, 1e-6).unwrap();
        for i in 5..96 {
            assert!(
                (spl.second_derivative[i] - 2.0).abs() < 0.05,
                "curvature at i={} was {}",
                i,
                spl.second_derivative[i]
            );
        }
    }

    #[test]
    fn zero_smoothing_interpolates() {
        let t = vec![0.0, 1.0, 2.0, 3.0, 4.0];
        let y = vec![0.0, 0.8, 0.1, -0.5, 0.3];
        let spl = fit(&t, &y, 0.0).unwrap();
        for (g, yi) in spl.fitted.iter().zip(&y) {
            assert!((g - yi).abs() < 1e-12);
        }
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(
            fit(&[0.0, 1.0], &[0.0, 1.0], 0.1),
            Err(SplineError::TooFewPoints(2))
        ));
        assert!(matches!(
            fit(&[0.0, 1.0, 1.0, 2.0], &[0.0; 4], 0.1),
            Err(SplineError::NonMonotonic(2))
        ));
        assert!(matches!(
            fit(&[0.0, 1.0, 2.0, 3.0], &[0.0; 4], -1.0),
            Err(SplineError::InvalidSmoothing(_))
        ));
    }
}
