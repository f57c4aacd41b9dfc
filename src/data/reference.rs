// Reference tables: per-season run-value constants and the pitch-id to
// game-date map.

use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use tracing::warn;

// ---------------------------------------------------------------------------
// Raw CSV serde structs (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct RawConstantRow {
    year: u16,
    run_constant: f64,
    /// Absorb the other seasonal constants the table carries.
    #[serde(flatten)]
    _extra: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawDateRow {
    pitch_id: u64,
    game_played: String,
}

// ---------------------------------------------------------------------------
// Loaders
// ---------------------------------------------------------------------------

/// Load the per-season run-constant table. Returns a map of year → constant.
pub fn load_run_constants_from_reader<R: Read>(
    rdr: R,
) -> Result<HashMap<u16, f64>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut map = HashMap::new();
    for result in reader.deserialize::<RawConstantRow>() {
        match result {
            Ok(raw) => {
                if !raw.run_constant.is_finite() || raw.run_constant == 0.0 {
                    warn!(
                        "skipping run constant for {}: unusable value {}",
                        raw.year, raw.run_constant
                    );
                    continue;
                }
                if map.insert(raw.year, raw.run_constant).is_some() {
                    warn!("duplicate run constant for {}, using latest value", raw.year);
                }
            }
            Err(e) => {
                warn!("skipping malformed run-constant row: {}", e);
            }
        }
    }
    Ok(map)
}

/// Load the pitch-id → game-date map. Rows with unparseable dates are skipped.
pub fn load_date_map_from_reader<R: Read>(
    rdr: R,
) -> Result<HashMap<u64, NaiveDate>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut map = HashMap::new();
    for result in reader.deserialize::<RawDateRow>() {
        match result {
            Ok(raw) => match NaiveDate::parse_from_str(raw.game_played.trim(), "%Y-%m-%d") {
                Ok(date) => {
                    map.insert(raw.pitch_id, date);
                }
                Err(e) => {
                    warn!(
                        "skipping date-map entry for pitch {}: bad date '{}' ({})",
                        raw.pitch_id, raw.game_played, e
                    );
                }
            },
            Err(e) => {
                warn!("skipping malformed date-map row: {}", e);
            }
        }
    }
    Ok(map)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
