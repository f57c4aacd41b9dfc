// Rolling window engine: trailing means over a single batter's filtered
// pitch sequence, rescaled onto the Plus scale against a reference
// population, with fixed percentile bands for context.

use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::debug;

use crate::data::event::PitchEvent;
use crate::data::loader::SeasonData;
use crate::metrics::metric::{CountFilter, HandFilter, Metric, PitchTypeFilter};
use crate::metrics::scale::{compute_pool_stats, plus_score, quantile};

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Parameters for one rolling-series computation.
#[derive(Debug, Clone)]
pub struct RollingRequest {
    pub player: String,
    pub metric: Metric,
    /// Window size in the metric's denomination units.
    pub window: usize,
    pub pitch_types: PitchTypeFilter,
    pub counts: CountFilter,
    pub opponent_hand: HandFilter,
}

impl RollingRequest {
    /// A request with the metric's default window and no filters.
    pub fn new(player: impl Into<String>, metric: Metric) -> Self {
        RollingRequest {
            player: player.into(),
            metric,
            window: metric.default_window(),
            pitch_types: PitchTypeFilter::All,
            counts: CountFilter::All,
            opponent_hand: HandFilter::All,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RollingError {
    #[error("unknown player: {0}")]
    UnknownPlayer(String),

    #[error("not enough {denomination} for {player}: {available} available, {required} required")]
    InsufficientSample {
        player: String,
        denomination: &'static str,
        available: usize,
        required: usize,
    },

    #[error("window must be at least 1")]
    ZeroWindow,
}

/// One entry of a rolling series.
#[derive(Debug, Clone)]
pub struct RollingPoint {
    /// 1-based ordinal within the filtered sequence.
    pub position: usize,
    pub game_date: Option<NaiveDate>,
    /// Raw metric value of this event.
    pub value: f64,
    /// Trailing mean, `None` before the minimum period accumulates.
    pub rolling: Option<f64>,
    /// Plus-rescaled trailing mean (raw for non-standardized metrics).
    pub rolling_plus: Option<f64>,
}

/// Fixed reference lines drawn beneath a rolling series. Computed once per
/// request over the reference population, never per point.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceBands {
    /// Population average: 100.0 on the Plus scale, the raw population mean
    /// for non-standardized metrics.
    pub league_average: f64,
    /// The player's own filtered season mean on the output scale.
    pub season_average: f64,
    pub p10: f64,
    pub p25: f64,
    pub p75: f64,
    pub p90: f64,
}

/// A computed rolling series with its reference context.
#[derive(Debug, Clone)]
pub struct RollingSeries {
    pub player: String,
    pub metric: Metric,
    pub window: usize,
    /// Observations required before a rolling value is emitted. Equals
    /// `window` unless the bracket-season-average fallback fired.
    pub min_periods: usize,
    /// Filtered pitch count a batter needs to join the reference population.
    pub qualification_threshold: usize,
    pub points: Vec<RollingPoint>,
    pub bands: ReferenceBands,
}

impl RollingSeries {
    /// Whether the reduced-minimum-period fallback fired.
    pub fn fallback_applied(&self) -> bool {
        self.min_periods < self.window
    }

    /// One point per game: the last entry of each mapped game date, in
    /// chronological order. Points without a date mapping are dropped.
    pub fn game_closes(&self) -> Vec<RollingPoint> {
        let mut last_index: HashMap<NaiveDate, usize> = HashMap::new();
        for (i, point) in self.points.iter().enumerate() {
            if let Some(date) = point.game_date {
                last_index.insert(date, i);
            }
        }
        let mut indices: Vec<usize> = last_index.into_values().collect();
        indices.sort_unstable();
        indices.into_iter().map(|i| self.points[i].clone()).collect()
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

fn passes_filters(event: &PitchEvent, req: &RollingRequest) -> bool {
    req.pitch_types.matches(event.pitch_type)
        && req.counts.matches(event.count)
        && req.opponent_hand.matches(event.pitcher_hand)
}

/// Filtered pitch count a batter must reach to join the reference
/// population: the metric's default window scaled by how many of the twelve
/// counts the filter selects, snapped to a multiple of five.
pub fn qualification_threshold(metric: Metric, counts: &CountFilter) -> usize {
    let n = counts.selected().len();
    let scaled = metric.default_window() as f64 * n as f64 / 12.0;
    ((scaled / 5.0).round() * 5.0) as usize
}

/// Trailing means over `values` with the given window and minimum period.
///
/// Entry `i` is the mean of the last `min(i + 1, window)` values, emitted
/// once at least `min_periods` observations are in the window.
fn rolling_means(values: &[f64], window: usize, min_periods: usize) -> Vec<Option<f64>> {
    let mut prefix = Vec::with_capacity(values.len() + 1);
    prefix.push(0.0);
    for v in values {
        prefix.push(prefix.last().copied().unwrap_or(0.0) + v);
    }

    (0..values.len())
        .map(|i| {
            let in_window = (i + 1).min(window);
            if in_window < min_periods {
                return None;
            }
            let sum = prefix[i + 1] - prefix[i + 1 - in_window];
            Some(sum / in_window as f64)
        })
        .collect()
}

/// Per-batter filtered means over the whole season, restricted to batters
/// whose filtered pitch count reaches `threshold`.
fn reference_population(
    season: &SeasonData,
    req: &RollingRequest,
    threshold: usize,
) -> Vec<f64> {
    struct Accum {
        pitches: usize,
        sum: f64,
        defined: usize,
    }

    let mut by_batter: HashMap<&str, Accum> = HashMap::new();
    for event in &season.events {
        if !passes_filters(event, req) {
            continue;
        }
        let accum = by_batter.entry(event.batter.as_str()).or_insert(Accum {
            pitches: 0,
            sum: 0.0,
            defined: 0,
        });
        accum.pitches += 1;
        if let Some(v) = req.metric.value(event) {
            accum.sum += v;
            accum.defined += 1;
        }
    }

    by_batter
        .into_values()
        .filter(|a| a.pitches >= threshold && a.defined > 0)
        .map(|a| a.sum / a.defined as f64)
        .collect()
}

/// Compute a rolling series for one batter.
///
/// Fails with an explicit `InsufficientSample` when the filtered sequence is
/// shorter than the window — the consumer must not render a partial chart.
pub fn rolling_series(
    season: &SeasonData,
    req: &RollingRequest,
) -> Result<RollingSeries, RollingError> {
    if req.window == 0 {
        return Err(RollingError::ZeroWindow);
    }

    let mut seen_player = false;
    let mut values = Vec::new();
    let mut dates = Vec::new();
    for event in &season.events {
        if event.batter != req.player {
            continue;
        }
        seen_player = true;
        if !passes_filters(event, req) {
            continue;
        }
        if let Some(v) = req.metric.value(event) {
            values.push(v);
            dates.push(event.game_date);
        }
    }

    if !seen_player {
        return Err(RollingError::UnknownPlayer(req.player.clone()));
    }
    if values.len() < req.window {
        return Err(RollingError::InsufficientSample {
            player: req.player.clone(),
            denomination: req.metric.denomination().label(),
            available: values.len(),
            required: req.window,
        });
    }

    let season_mean = values.iter().sum::<f64>() / values.len() as f64;

    // Full-window pass first; the bracket-season-average policy then decides
    // whether early-season values are shown at reduced confidence: if the
    // rolling line never crosses the season mean, recompute with a minimum
    // period of 2W/3.
    let mut min_periods = req.window;
    let mut rolling = rolling_means(&values, req.window, min_periods);
    let defined: Vec<f64> = rolling.iter().flatten().copied().collect();
    let lo = defined.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = defined.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !(season_mean > lo && season_mean < hi) {
        min_periods = (req.window * 2 / 3).max(1);
        debug!(
            "rolling series for {} never brackets the season mean; reducing min periods to {}",
            req.player, min_periods
        );
        rolling = rolling_means(&values, req.window, min_periods);
    }

    let threshold = qualification_threshold(req.metric, &req.counts);
    let population = reference_population(season, req, threshold);
    let ref_stats = compute_pool_stats(&population);

    let standardized = req.metric.is_standardized();
    let rescale = |v: f64| {
        if standardized {
            plus_score(v, &ref_stats)
        } else {
            v
        }
    };

    let band = |q: f64| rescale(quantile(&population, q).unwrap_or(ref_stats.mean));
    let bands = ReferenceBands {
        league_average: if standardized { 100.0 } else { ref_stats.mean },
        season_average: rescale(season_mean),
        p10: band(0.10),
        p25: band(0.25),
        p75: band(0.75),
        p90: band(0.90),
    };

    let points = values
        .iter()
        .zip(dates.iter())
        .zip(rolling.iter())
        .enumerate()
        .map(|(i, ((value, date), roll))| RollingPoint {
            position: i + 1,
            game_date: *date,
            value: *value,
            rolling: *roll,
            rolling_plus: roll.map(rescale),
        })
        .collect();

    Ok(RollingSeries {
        player: req.player.clone(),
        metric: req.metric,
        window: req.window,
        min_periods,
        qualification_threshold: threshold,
        points,
        bands,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
