// Standardized scales: z-scores, the "Plus" scale, and the 20-80 scale.

// ---------------------------------------------------------------------------
// Pool statistics
// ---------------------------------------------------------------------------

/// Mean and standard deviation for a single metric across a batter population.
#[derive(Debug, Clone, Copy)]
pub struct PoolStats {
    pub mean: f64,
    pub stdev: f64,
}

/// Threshold below which standard deviation is treated as zero.
const STDEV_EPSILON: f64 = 1e-9;

/// Compute mean and standard deviation for a slice of values.
///
/// Returns `PoolStats { mean: 0.0, stdev: 0.0 }` for an empty slice.
/// Uses the population standard deviation (N denominator), since the
/// population is the full set of qualifying batters rather than a sample.
pub fn compute_pool_stats(values: &[f64]) -> PoolStats {
    if values.is_empty() {
        return PoolStats {
            mean: 0.0,
            stdev: 0.0,
        };
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    PoolStats {
        mean,
        stdev: variance.sqrt(),
    }
}

/// Compute a z-score given a value and pool stats.
///
/// Returns 0.0 if the standard deviation is approximately zero (guarding
/// against division by zero).
pub fn compute_zscore(value: f64, stats: &PoolStats) -> f64 {
    if stats.stdev < STDEV_EPSILON {
        return 0.0;
    }
    (value - stats.mean) / stats.stdev
}

// ---------------------------------------------------------------------------
// Output scales
// ---------------------------------------------------------------------------

/// Rescale a value onto the "Plus" scale: 100 is the population average and
/// 15 points is one standard deviation.
///
/// A degenerate (zero-variance) population yields exactly 100.0, the scale's
/// neutral midpoint, never NaN.
pub fn plus_score(value: f64, stats: &PoolStats) -> f64 {
    compute_zscore(value, stats) * 15.0 + 100.0
}

/// `plus_score` rounded to the nearest integer, as displayed in tables.
pub fn plus_score_rounded(value: f64, stats: &PoolStats) -> i32 {
    plus_score(value, stats).round() as i32
}

/// Rescale a value onto the 20-80 scouting scale: 50 is average and each
/// 10-point step is roughly one standard deviation.
///
/// The output is always an integer multiple of 5, clipped to [20, 80].
/// A degenerate population yields 50.
pub fn scale_20_80(value: f64, stats: &PoolStats) -> i32 {
    let grade = (compute_zscore(value, stats) * 2.0 + 10.0).round() * 5.0;
    grade.clamp(20.0, 80.0) as i32
}

// ---------------------------------------------------------------------------
// Quantiles
// ---------------------------------------------------------------------------

/// Linear-interpolation quantile of an unsorted sample.
///
/// `q` is a fraction in [0, 1]. Returns `None` for an empty sample.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        return Some(sorted[lo]);
    }
    let frac = pos - lo as f64;
    Some(sorted[lo] * (1.0 - frac) + sorted[hi] * frac)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
