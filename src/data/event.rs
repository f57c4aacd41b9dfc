// Pitch event model and CSV decoding.
//
// Reads the PLV app-data CSV exports: one row per pitch, with plate location,
// ball-strike count, and the per-pitch model outputs (decision value, adjusted
// power, etc.). Derived columns are attached later by the season loader.

use chrono::NaiveDate;
use serde::Deserialize;
use std::fmt;
use std::io::Read;
use tracing::warn;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Throwing/batting side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hand {
    Left,
    Right,
}

impl Hand {
    /// Parse the dataset's single-letter encoding. Unknown values are a
    /// decode-time row error.
    fn parse(s: &str) -> Option<Hand> {
        match s.trim() {
            "L" => Some(Hand::Left),
            "R" => Some(Hand::Right),
            _ => None,
        }
    }

    pub fn letter(&self) -> &'static str {
        match self {
            Hand::Left => "L",
            Hand::Right => "R",
        }
    }
}

/// Coarse pitch-type bucket used for baseline partitions and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PitchType {
    Fastball,
    BreakingBall,
    Offspeed,
    Other,
}

impl PitchType {
    fn parse(s: &str) -> Option<PitchType> {
        match s.trim() {
            "Fastball" => Some(PitchType::Fastball),
            "Breaking Ball" => Some(PitchType::BreakingBall),
            "Offspeed" => Some(PitchType::Offspeed),
            "Other" => Some(PitchType::Other),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PitchType::Fastball => "Fastball",
            PitchType::BreakingBall => "Breaking Ball",
            PitchType::Offspeed => "Offspeed",
            PitchType::Other => "Other",
        }
    }
}

/// Ball-strike count. Valid counts are (0-3) balls by (0-2) strikes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Count {
    pub balls: u8,
    pub strikes: u8,
}

impl Count {
    /// Construct a count, returning `None` outside the valid 4x3 grid.
    pub fn new(balls: u8, strikes: u8) -> Option<Count> {
        if balls <= 3 && strikes <= 2 {
            Some(Count { balls, strikes })
        } else {
            None
        }
    }

    /// All twelve valid counts, in the conventional order.
    pub fn all() -> [Count; 12] {
        [
            Count { balls: 0, strikes: 0 },
            Count { balls: 1, strikes: 0 },
            Count { balls: 2, strikes: 0 },
            Count { balls: 3, strikes: 0 },
            Count { balls: 0, strikes: 1 },
            Count { balls: 1, strikes: 1 },
            Count { balls: 2, strikes: 1 },
            Count { balls: 3, strikes: 1 },
            Count { balls: 0, strikes: 2 },
            Count { balls: 1, strikes: 2 },
            Count { balls: 2, strikes: 2 },
            Count { balls: 3, strikes: 2 },
        ]
    }
}

impl fmt::Display for Count {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.balls, self.strikes)
    }
}

/// One pitch thrown in a game, with raw model outputs and (after the loader
/// runs) derived columns. Immutable once derivation completes.
///
/// Locations are in feet: `plate_x` from the center of the plate (negative =
/// catcher's left), `plate_z` above the ground, `zone_z` relative to the
/// vertical center of the batter's strike zone.
#[derive(Debug, Clone)]
pub struct PitchEvent {
    pub batter: String,
    pub pitcher_hand: Hand,
    pub batter_hand: Hand,
    /// Monotone within a season; the chronological sort key.
    pub pitch_id: u64,
    pub count: Count,
    pub pitch_type: PitchType,

    pub plate_x: Option<f64>,
    pub plate_z: Option<f64>,
    pub zone_z: Option<f64>,
    pub strike_zone_top: Option<f64>,
    pub strike_zone_bottom: Option<f64>,

    // Raw model outputs. A metric is `None` when the pitch is outside its
    // denominator (e.g. adjusted power exists only on batted-ball events).
    pub swing_agg: Option<f64>,
    pub strike_zone_judgement: Option<f64>,
    pub decision_value: Option<f64>,
    pub contact_over_expected: Option<f64>,
    pub adj_power: Option<f64>,
    pub batter_woba: Option<f64>,
    pub in_play_input: Option<f64>,

    // Derived columns, attached by the season loader.
    pub decision_value_above_avg: Option<f64>,
    pub power_above_avg: Option<f64>,
    pub decision_value_in_zone: Option<f64>,
    pub decision_value_out_zone: Option<f64>,
    pub game_date: Option<NaiveDate>,
}

// ---------------------------------------------------------------------------
// Raw CSV serde struct (private)
// ---------------------------------------------------------------------------

/// PLV app-data CSV row. Counts arrive as floats in some exports, so they are
/// decoded as f64 and validated. Extra columns in the export are ignored.
#[derive(Debug, Deserialize)]
struct RawPitchRow {
    hittername: String,
    p_hand: String,
    b_hand: String,
    pitch_id: u64,
    balls: f64,
    strikes: f64,
    pitch_type_bucket: String,
    p_x: Option<f64>,
    p_z: Option<f64>,
    sz_z: Option<f64>,
    strike_zone_top: Option<f64>,
    strike_zone_bottom: Option<f64>,
    swing_agg: Option<f64>,
    strike_zone_judgement: Option<f64>,
    decision_value: Option<f64>,
    contact_over_expected: Option<f64>,
    adj_power: Option<f64>,
    #[serde(rename = "batter_wOBA")]
    batter_woba: Option<f64>,
    in_play_input: Option<f64>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Drop non-finite optional values (NaN/Infinity encode as missing).
fn finite(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite())
}

fn parse_count(balls: f64, strikes: f64) -> Option<Count> {
    if !balls.is_finite() || !strikes.is_finite() {
        return None;
    }
    let b = balls.round();
    let s = strikes.round();
    if b < 0.0 || s < 0.0 {
        return None;
    }
    Count::new(b as u8, s as u8)
}

// ---------------------------------------------------------------------------
// Reader-based loader
// ---------------------------------------------------------------------------

/// Decode pitch events from a CSV reader.
///
/// Rows with an unknown handedness, an unknown pitch-type bucket, or a count
/// outside the valid (0-3)x(0-2) grid are skipped with a warning rather than
/// failing the whole file. Non-finite metric values decode as missing.
pub fn load_events_from_reader<R: Read>(rdr: R) -> Result<Vec<PitchEvent>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut events = Vec::new();
    for result in reader.deserialize::<RawPitchRow>() {
        match result {
            Ok(raw) => {
                let batter = raw.hittername.trim().to_string();
                let Some(pitcher_hand) = Hand::parse(&raw.p_hand) else {
                    warn!(
                        "skipping pitch {}: unknown pitcher hand '{}'",
                        raw.pitch_id, raw.p_hand
                    );
                    continue;
                };
                let Some(batter_hand) = Hand::parse(&raw.b_hand) else {
                    warn!(
                        "skipping pitch {}: unknown batter hand '{}'",
                        raw.pitch_id, raw.b_hand
                    );
                    continue;
                };
                let Some(pitch_type) = PitchType::parse(&raw.pitch_type_bucket) else {
                    warn!(
                        "skipping pitch {}: unknown pitch type bucket '{}'",
                        raw.pitch_id, raw.pitch_type_bucket
                    );
                    continue;
                };
                let Some(count) = parse_count(raw.balls, raw.strikes) else {
                    warn!(
                        "skipping pitch {}: invalid count {}-{}",
                        raw.pitch_id, raw.balls, raw.strikes
                    );
                    continue;
                };
                events.push(PitchEvent {
                    batter,
                    pitcher_hand,
                    batter_hand,
                    pitch_id: raw.pitch_id,
                    count,
                    pitch_type,
                    plate_x: finite(raw.p_x),
                    plate_z: finite(raw.p_z),
                    zone_z: finite(raw.sz_z),
                    strike_zone_top: finite(raw.strike_zone_top),
                    strike_zone_bottom: finite(raw.strike_zone_bottom),
                    swing_agg: finite(raw.swing_agg),
                    strike_zone_judgement: finite(raw.strike_zone_judgement),
                    decision_value: finite(raw.decision_value),
                    contact_over_expected: finite(raw.contact_over_expected),
                    adj_power: finite(raw.adj_power),
                    batter_woba: finite(raw.batter_woba),
                    in_play_input: finite(raw.in_play_input),
                    decision_value_above_avg: None,
                    power_above_avg: None,
                    decision_value_in_zone: None,
                    decision_value_out_zone: None,
                    game_date: None,
                });
            }
            Err(e) => {
                warn!("skipping malformed pitch row: {}", e);
            }
        }
    }
    Ok(events)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
