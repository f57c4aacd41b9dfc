// Season aggregation: per-batter metric means, minimum-sample filtering, and
// rescaling onto a standardized output scale.

use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

use crate::data::event::PitchEvent;
use crate::metrics::metric::Metric;
use crate::metrics::scale::{compute_pool_stats, plus_score_rounded, scale_20_80, PoolStats};

// ---------------------------------------------------------------------------
// Output scale selection
// ---------------------------------------------------------------------------

/// Which standardized scale the leaderboard reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Scale {
    #[serde(rename = "plus")]
    Plus,
    #[serde(rename = "20-80")]
    TwentyEighty,
}

impl Scale {
    /// The scale's neutral midpoint, used when a score is undefined
    /// (degenerate population or no qualifying observations).
    pub fn neutral(&self) -> i32 {
        match self {
            Scale::Plus => 100,
            Scale::TwentyEighty => 50,
        }
    }

    fn apply(&self, value: f64, stats: &PoolStats) -> i32 {
        match self {
            Scale::Plus => plus_score_rounded(value, stats),
            Scale::TwentyEighty => scale_20_80(value, stats),
        }
    }
}

/// The metric columns of the season leaderboard, in display order.
/// Pitch hittability is a rolling-chart metric only.
pub const LEADERBOARD_METRICS: [Metric; 8] = [
    Metric::SwingAggression,
    Metric::StrikeZoneJudgement,
    Metric::DecisionValue,
    Metric::ZoneDecisionValue,
    Metric::OutZoneDecisionValue,
    Metric::ContactAbility,
    Metric::AdjustedPower,
    Metric::HitterPerformance,
];

// ---------------------------------------------------------------------------
// Per-batter means
// ---------------------------------------------------------------------------

/// A batter's pitch count and raw metric means for one season.
#[derive(Debug, Clone)]
pub struct BatterMeans {
    pub name: String,
    pub pitches: usize,
    means: HashMap<Metric, f64>,
}

impl BatterMeans {
    /// Mean of a metric over this batter's events where it is defined, or
    /// `None` when the batter has no qualifying observations.
    pub fn mean(&self, metric: Metric) -> Option<f64> {
        self.means.get(&metric).copied()
    }
}

/// Group events by batter and compute each leaderboard metric's mean over the
/// events where it is defined.
pub fn aggregate_batters(events: &[PitchEvent]) -> Vec<BatterMeans> {
    struct Accum {
        pitches: usize,
        sums: HashMap<Metric, (f64, usize)>,
    }

    let mut by_batter: HashMap<&str, Accum> = HashMap::new();
    for event in events {
        let accum = by_batter.entry(event.batter.as_str()).or_insert(Accum {
            pitches: 0,
            sums: HashMap::new(),
        });
        accum.pitches += 1;
        for metric in LEADERBOARD_METRICS {
            if let Some(v) = metric.value(event) {
                let entry = accum.sums.entry(metric).or_insert((0.0, 0));
                entry.0 += v;
                entry.1 += 1;
            }
        }
    }

    let mut batters: Vec<BatterMeans> = by_batter
        .into_iter()
        .map(|(name, accum)| BatterMeans {
            name: name.to_string(),
            pitches: accum.pitches,
            means: accum
                .sums
                .into_iter()
                .map(|(metric, (sum, n))| (metric, sum / n as f64))
                .collect(),
        })
        .collect();
    batters.sort_by(|a, b| a.name.cmp(&b.name));
    batters
}

/// Keep batters who faced at least `min_pitches` pitches.
pub fn filter_qualified(batters: Vec<BatterMeans>, min_pitches: usize) -> Vec<BatterMeans> {
    batters
        .into_iter()
        .filter(|b| b.pitches >= min_pitches)
        .collect()
}

// ---------------------------------------------------------------------------
// Leaderboard
// ---------------------------------------------------------------------------

/// One leaderboard row: standardized scores per metric, except swing
/// aggression which stays a raw percentage.
#[derive(Debug, Clone)]
pub struct BatterSeasonRow {
    pub name: String,
    pub pitches: usize,
    pub swing_agg_pct: Option<f64>,
    scores: HashMap<Metric, i32>,
}

impl BatterSeasonRow {
    pub fn score(&self, metric: Metric) -> Option<i32> {
        self.scores.get(&metric).copied()
    }
}

/// Build the season leaderboard.
///
/// The standardization population is the *currently filtered* batter set:
/// changing the threshold changes every displayed score, including for
/// batters far from the filter boundary. That relative standardization is
/// deliberate.
///
/// Rows are ordered descending by raw Hitter Performance mean, name as a
/// deterministic tiebreak.
pub fn season_leaderboard(
    events: &[PitchEvent],
    min_pitches: usize,
    scale: Scale,
) -> Vec<BatterSeasonRow> {
    let qualified = filter_qualified(aggregate_batters(events), min_pitches);
    debug!(
        "leaderboard: {} batters qualify at >= {} pitches",
        qualified.len(),
        min_pitches
    );

    // Population stats per metric over the filtered set.
    let mut pool: HashMap<Metric, PoolStats> = HashMap::new();
    for metric in LEADERBOARD_METRICS {
        if !metric.is_standardized() {
            continue;
        }
        let values: Vec<f64> = qualified.iter().filter_map(|b| b.mean(metric)).collect();
        pool.insert(metric, compute_pool_stats(&values));
    }

    let mut rows: Vec<BatterSeasonRow> = qualified
        .iter()
        .map(|batter| {
            let mut scores = HashMap::new();
            for metric in LEADERBOARD_METRICS {
                if !metric.is_standardized() {
                    continue;
                }
                let stats = &pool[&metric];
                let score = match batter.mean(metric) {
                    Some(mean) => scale.apply(mean, stats),
                    None => scale.neutral(),
                };
                scores.insert(metric, score);
            }
            BatterSeasonRow {
                name: batter.name.clone(),
                pitches: batter.pitches,
                swing_agg_pct: batter.mean(Metric::SwingAggression),
                scores,
            }
        })
        .collect();

    // Sort on the raw mean rather than the rounded score so ordering is
    // stable under both scales.
    let hp_mean: HashMap<&str, f64> = qualified
        .iter()
        .filter_map(|b| b.mean(Metric::HitterPerformance).map(|m| (b.name.as_str(), m)))
        .collect();
    rows.sort_by(|a, b| {
        let ha = hp_mean.get(a.name.as_str()).copied().unwrap_or(f64::NEG_INFINITY);
        let hb = hp_mean.get(b.name.as_str()).copied().unwrap_or(f64::NEG_INFINITY);
        hb.partial_cmp(&ha)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });
    rows
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
