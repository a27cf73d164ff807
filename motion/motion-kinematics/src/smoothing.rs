use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Savitzky–Golay filter with a precomputed coefficient table.
///
/// Each output is the value of a least squares polynomial of degree
/// `polynomial_order` fitted to the `window_length` samples around it. The
/// first and last `window_length / 2` outputs come from the polynomial
/// fitted to the first and last full window, evaluated at their position
/// within it, so no frames are dropped at the edges.
///
/// NaN inputs poison every output whose window contains them.
#[derive(Debug, Clone, PartialEq)]
pub struct SavitzkyGolay {
    window_length: usize,
    polynomial_order: usize,
    /// `weights[j]` evaluates the fitted polynomial at window position `j`.
    weights: Vec<Vec<f64>>,
}

impl SavitzkyGolay {
    pub fn new(window_length: usize, polynomial_order: usize) -> Result<Self> {
        if window_length < 3 || window_length % 2 == 0 {
            return Err(Error::Config(format!(
                "smoothing window must be odd and at least 3, got {window_length}"
            )));
        }
        if polynomial_order >= window_length {
            return Err(Error::Config(format!(
                "polynomial order {polynomial_order} must be less than window length {window_length}"
            )));
        }

        // Offsets scaled to [-1, 1] keep high powers well conditioned.
        let half = (window_length / 2) as f64;
        let ncols = polynomial_order + 1;
        let vandermonde = DMatrix::from_fn(window_length, ncols, |i, k| {
            ((i as f64 - half) / half).powi(k as i32)
        });
        // The fitted values at the window positions are U * U^T * window,
        // with U the left singular vectors spanning the polynomial space.
        let svd = nalgebra::linalg::SVD::new(vandermonde, true, false);
        let u = svd
            .u
            .ok_or_else(|| Error::Config("cannot fit smoothing polynomial".into()))?;

        let weights = (0..window_length)
            .map(|j| {
                (0..window_length)
                    .map(|i| u.row(j).dot(&u.row(i)))
                    .collect()
            })
            .collect();

        Ok(Self {
            window_length,
            polynomial_order,
            weights,
        })
    }

    pub fn window_length(&self) -> usize {
        self.window_length
    }

    pub fn polynomial_order(&self) -> usize {
        self.polynomial_order
    }

    /// Weights producing the output at the window center.
    pub fn center_weights(&self) -> &[f64] {
        &self.weights[self.window_length / 2]
    }

    pub fn apply(&self, series: &[f64]) -> Result<Vec<f64>> {
        let w = self.window_length;
        let n = series.len();
        if n < w {
            return Err(Error::Config(format!(
                "smoothing window {w} is longer than the series ({n} samples)"
            )));
        }
        let half = w / 2;
        let dot = |weights: &[f64], window: &[f64]| -> f64 {
            weights.iter().zip(window).map(|(a, b)| a * b).sum()
        };

        let mut result = Vec::with_capacity(n);
        let first = &series[..w];
        for j in 0..half {
            result.push(dot(&self.weights[j], first));
        }
        let center = self.center_weights();
        for i in half..n - half {
            result.push(dot(center, &series[i - half..=i + half]));
        }
        let last = &series[n - w..];
        for j in w - half..w {
            result.push(dot(&self.weights[j], last));
        }
        Ok(result)
    }
}

/// Smooth `series` with a Savitzky–Golay filter.
pub fn smooth(series: &[f64], window_length: usize, polynomial_order: usize) -> Result<Vec<f64>> {
    SavitzkyGolay::new(window_length, polynomial_order)?.apply(series)
}

/// Smooth `series` when `filter` is set and the series is long enough;
/// otherwise return it unchanged.
pub(crate) fn smooth_if_possible(
    filter: Option<&SavitzkyGolay>,
    series: Vec<f64>,
    what: &str,
) -> Vec<f64> {
    let Some(filter) = filter else {
        return series;
    };
    if series.len() < filter.window_length() {
        tracing::debug!(
            "not smoothing {what}: {} samples, window is {}",
            series.len(),
            filter.window_length()
        );
        return series;
    }
    // Only fails for short series, checked above.
    filter.apply(&series).unwrap_or(series)
}

/// Smooth each run of consecutive frames with finite values on its own.
///
/// Missing values and frame gaps split the series, so one untracked frame
/// does not spread over a whole window. Runs shorter than the window are
/// left unchanged.
pub(crate) fn smooth_runs(
    filter: Option<&SavitzkyGolay>,
    frames: &[u64],
    values: &[f64],
    what: &str,
) -> Vec<f64> {
    let mut result = values.to_vec();
    if filter.is_none() {
        return result;
    }
    let mut start = 0;
    while start < values.len() {
        if !values[start].is_finite() {
            start += 1;
            continue;
        }
        let mut stop = start + 1;
        while stop < values.len()
            && values[stop].is_finite()
            && frames[stop] == frames[stop - 1] + 1
        {
            stop += 1;
        }
        let smoothed = smooth_if_possible(filter, values[start..stop].to_vec(), what);
        result[start..stop].copy_from_slice(&smoothed);
        start = stop;
    }
    result
}

/// How positions, angles and their derivatives are smoothed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    pub window_length: usize,
    pub polynomial_order: usize,
    /// Smooth positions and angles before differentiating.
    pub smooth_positions: bool,
    /// Smooth each velocity and acceleration series after differentiating.
    pub smooth_derivatives: bool,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            window_length: 11,
            polynomial_order: 3,
            smooth_positions: true,
            smooth_derivatives: false,
        }
    }
}

impl SmoothingConfig {
    /// No smoothing at all.
    pub fn disabled() -> Self {
        Self {
            smooth_positions: false,
            smooth_derivatives: false,
            ..Default::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.smooth_positions || self.smooth_derivatives
    }

    /// Build the filter, or `None` when smoothing is disabled.
    pub fn filter(&self) -> Result<Option<SavitzkyGolay>> {
        if !self.is_enabled() {
            return Ok(None);
        }
        SavitzkyGolay::new(self.window_length, self.polynomial_order).map(Some)
    }
}
