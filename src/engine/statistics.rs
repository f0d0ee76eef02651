//! Post-processing of accumulated moments.
//!
//! Pure functions turning a [`Moments`] value and a history count into the
//! quantities reported for a tally: mean, sample variance, relative error,
//! relative variance of the variance (VOV) and figure of merit (FOM).
//!
//! With `N` histories and power sums `m1..m4`:
//!
//! ```text
//! mean      = m1 / N
//! variance  = (m2/N - mean²) · N/(N-1)
//! RE        = sqrt((N·m2/m1² - 1) / (N-1))
//! VOV       = (m4 - 4·m1·m3/N + 8·m2·m1²/N² - 4·m1⁴/N³ - m2²/N) / (m2 - m1²/N)²
//! FOM       = 1 / (RE² · t)
//! ```
//!
//! Degenerate inputs (no histories, a zero mean, a zero spread, no elapsed
//! time) yield `0.0` rather than NaN so reports stay printable.

use crate::engine::moments::Moments;


/// Mean per history.
#[inline]
pub fn mean(first_moment: f64, histories: u64) -> f64 {
    if histories == 0 {
        return 0.0;
    }
    first_moment / histories as f64
}

/// Unbiased sample variance of the per-history samples.
pub fn sample_variance(first_moment: f64, second_moment: f64, histories: u64) -> f64 {
    if histories < 2 {
        return 0.0;
    }
    let n = histories as f64;
    let mean = first_moment / n;
    ((second_moment / n - mean * mean) * n / (n - 1.0)).max(0.0)
}

/// Relative standard error of the mean.
pub fn relative_error(first_moment: f64, second_moment: f64, histories: u64) -> f64 {
    if histories < 2 || first_moment == 0.0 {
        return 0.0;
    }
    let n = histories as f64;
    let arg = (n * second_moment / (first_moment * first_moment) - 1.0) / (n - 1.0);
    arg.max(0.0).sqrt()
}

/// Relative variance of the variance.
pub fn relative_vov(moments: &Moments, histories: u64) -> f64 {
    if histories == 0 {
        return 0.0;
    }
    let n = histories as f64;
    let Moments { m1, m2, m3, m4 } = *moments;
    let m1_sq = m1 * m1;

    let denominator = m2 - m1_sq / n;
    if denominator == 0.0 {
        return 0.0;
    }

    let numerator = m4 - 4.0 * m1 * m3 / n + 8.0 * m2 * m1_sq / (n * n)
        - 4.0 * m1_sq * m1_sq / (n * n * n)
        - m2 * m2 / n;

    numerator / (denominator * denominator)
}

/// Figure of merit for a relative error reached after `elapsed_time`.
#[inline]
pub fn figure_of_merit(relative_error: f64, elapsed_time: f64) -> f64 {
    if relative_error == 0.0 || elapsed_time <= 0.0 {
        return 0.0;
    }
    1.0 / (relative_error * relative_error * elapsed_time)
}

/// Reported statistics of one slot.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProcessedMoments {
    /// Mean per history, scaled by `multiplier / normalization`.
    pub mean: f64,

    /// Relative standard error of the mean.
    pub relative_error: f64,

    /// Relative variance of the variance.
    pub variance_of_variance: f64,

    /// Figure of merit.
    pub figure_of_merit: f64,
}

impl ProcessedMoments {
    /// Processes one slot.
    ///
    /// ## Parameters
    /// * `histories`: number of completed histories.
    /// * `normalization`: entity (or total) normalization constant, `> 0`.
    /// * `multiplier`: estimator multiplier, `> 0`.
    /// * `elapsed_time`: wall time used for the FOM; `<= 0` disables it.

    pub fn process(
        moments: &Moments,
        histories: u64,
        normalization: f64,
        multiplier: f64,
        elapsed_time: f64,
    ) -> Self {
        let relative_error = relative_error(moments.m1, moments.m2, histories);
        Self {
            mean: mean(moments.m1, histories) * multiplier / normalization,
            relative_error,
            variance_of_variance: relative_vov(moments, histories),
            figure_of_merit: figure_of_merit(relative_error, elapsed_time),
        }
    }
}
