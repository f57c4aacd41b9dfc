// Contextual baseline calculator.
//
// Removes context-driven variance from a raw per-pitch metric: for each pitch
// the mean outcome among all pitches sharing the same handedness matchup,
// pitch type, discretized location, and count is subtracted from the raw
// value, so cross-batter comparisons reflect skill rather than the mix of
// pitches faced.

use std::collections::HashMap;

use crate::data::event::{Hand, PitchEvent, PitchType};

// ---------------------------------------------------------------------------
// Location buckets
// ---------------------------------------------------------------------------

/// Horizontal bucket bounds: ±20/12 ft from the center of the plate.
const BUCKET_X_MAX: f64 = 20.0;
/// Vertical bucket bounds: −1.5 ft to +1.25 ft around the zone center.
const BUCKET_Z_MIN: f64 = -36.0;
const BUCKET_Z_MAX: f64 = 30.0;

/// Horizontal location rounded to the nearest 1/12 ft, clipped, as a grid
/// index (units of 1/12 ft). Integer indices keep the key `Eq + Hash`.
pub fn bucket_x_twelfths(plate_x: f64) -> i32 {
    (plate_x * 12.0).round().clamp(-BUCKET_X_MAX, BUCKET_X_MAX) as i32
}

/// Vertical location (relative to zone center) rounded to the nearest
/// 1/24 ft, clipped, as a grid index (units of 1/24 ft).
pub fn bucket_z_24ths(zone_z: f64) -> i32 {
    (zone_z * 24.0).round().clamp(BUCKET_Z_MIN, BUCKET_Z_MAX) as i32
}

// ---------------------------------------------------------------------------
// Context key
// ---------------------------------------------------------------------------

/// Composite partition key for baseline computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextKey {
    pub pitcher_hand: Hand,
    pub batter_hand: Hand,
    pub pitch_type: PitchType,
    pub bucket_x: i32,
    pub bucket_z: i32,
    pub balls: u8,
    pub strikes: u8,
}

impl ContextKey {
    /// The partition an event belongs to, or `None` when its location is
    /// untracked (such events take no part in baseline computation).
    pub fn for_event(event: &PitchEvent) -> Option<ContextKey> {
        let plate_x = event.plate_x?;
        let zone_z = event.zone_z?;
        Some(ContextKey {
            pitcher_hand: event.pitcher_hand,
            batter_hand: event.batter_hand,
            pitch_type: event.pitch_type,
            bucket_x: bucket_x_twelfths(plate_x),
            bucket_z: bucket_z_24ths(zone_z),
            balls: event.count.balls,
            strikes: event.count.strikes,
        })
    }
}

// ---------------------------------------------------------------------------
// Baseline computation
// ---------------------------------------------------------------------------

/// Compute the per-partition mean of `value` across all events.
///
/// Partitions with very few events yield a noisy baseline; no minimum
/// partition size is enforced. A single-event partition's baseline equals
/// the event's own value, so its adjusted value is exactly zero.
pub fn compute_baselines<F>(events: &[PitchEvent], value: F) -> HashMap<ContextKey, f64>
where
    F: Fn(&PitchEvent) -> Option<f64>,
{
    let mut sums: HashMap<ContextKey, (f64, usize)> = HashMap::new();
    for event in events {
        let Some(key) = ContextKey::for_event(event) else {
            continue;
        };
        let Some(v) = value(event) else {
            continue;
        };
        let entry = sums.entry(key).or_insert((0.0, 0));
        entry.0 += v;
        entry.1 += 1;
    }
    sums.into_iter()
        .map(|(key, (sum, n))| (key, sum / n as f64))
        .collect()
}

/// The context-adjusted value of an event: raw − partition baseline.
///
/// `None` when the event has no location bucket, no raw value, or (never in
/// practice, since the event itself contributes) no baseline partition.
pub fn adjusted_value<F>(
    event: &PitchEvent,
    baselines: &HashMap<ContextKey, f64>,
    value: F,
) -> Option<f64>
where
    F: Fn(&PitchEvent) -> Option<f64>,
{
    let key = ContextKey::for_event(event)?;
    let raw = value(event)?;
    let baseline = baselines.get(&key)?;
    Some(raw - baseline)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::event::Count;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    fn make_event(
        batter: &str,
        pitch_id: u64,
        plate_x: Option<f64>,
        zone_z: Option<f64>,
        decision_value: Option<f64>,
    ) -> PitchEvent {
        PitchEvent {
            batter: batter.into(),
            pitcher_hand: Hand::Right,
            batter_hand: Hand::Left,
            pitch_id,
            count: Count { balls: 0, strikes: 0 },
            pitch_type: PitchType::Fastball,
            plate_x,
            plate_z: zone_z.map(|z| z + 2.5),
            zone_z,
            strike_zone_top: Some(3.4),
            strike_zone_bottom: Some(1.6),
            swing_agg: None,
            strike_zone_judgement: None,
            decision_value,
            contact_over_expected: None,
            adj_power: None,
            batter_woba: None,
            in_play_input: None,
            decision_value_above_avg: None,
            power_above_avg: None,
            decision_value_in_zone: None,
            decision_value_out_zone: None,
            game_date: None,
        }
    }

    // ---- Bucketing ----

    #[test]
    fn bucket_x_rounds_to_twelfths() {
        // 0.70 ft * 12 = 8.4 => bucket 8
        assert_eq!(bucket_x_twelfths(0.70), 8);
        // -0.70 => -8
        assert_eq!(bucket_x_twelfths(-0.70), -8);
        // Exactly on a gridline
        assert_eq!(bucket_x_twelfths(0.5), 6);
    }

    #[test]
    fn bucket_x_clips_to_bounds() {
        assert_eq!(bucket_x_twelfths(5.0), 20);
        assert_eq!(bucket_x_twelfths(-5.0), -20);
    }

    #[test]
    fn bucket_z_rounds_to_24ths_and_clips() {
        // 0.1 ft * 24 = 2.4 => bucket 2
        assert_eq!(bucket_z_24ths(0.1), 2);
        // Clip at -1.5 ft and +1.25 ft
        assert_eq!(bucket_z_24ths(-3.0), -36);
        assert_eq!(bucket_z_24ths(2.0), 30);
    }

    #[test]
    fn nearby_locations_share_a_bucket() {
        let a = make_event("A", 1, Some(0.33), Some(0.02), Some(1.0));
        let b = make_event("B", 2, Some(0.34), Some(0.02), Some(2.0));
        assert_eq!(
            ContextKey::for_event(&a).unwrap(),
            ContextKey::for_event(&b).unwrap()
        );
    }

    // ---- Baselines ----

    #[test]
    fn baseline_is_partition_mean() {
        // Three events in the same partition with DV 1.0, 2.0, 3.0
        let events = vec![
            make_event("A", 1, Some(0.0), Some(0.0), Some(1.0)),
            make_event("B", 2, Some(0.0), Some(0.0), Some(2.0)),
            make_event("C", 3, Some(0.0), Some(0.0), Some(3.0)),
        ];
        let baselines = compute_baselines(&events, |e| e.decision_value);
        assert_eq!(baselines.len(), 1);

        let key = ContextKey::for_event(&events[0]).unwrap();
        assert!(approx_eq(baselines[&key], 2.0, 1e-10));

        // Adjusted values: 1-2=-1, 2-2=0, 3-2=1
        let adj: Vec<f64> = events
            .iter()
            .map(|e| adjusted_value(e, &baselines, |e| e.decision_value).unwrap())
            .collect();
        assert!(approx_eq(adj[0], -1.0, 1e-10));
        assert!(approx_eq(adj[1], 0.0, 1e-10));
        assert!(approx_eq(adj[2], 1.0, 1e-10));
    }

    #[test]
    fn singleton_partition_adjusts_to_zero() {
        let events = vec![make_event("A", 1, Some(0.5), Some(0.25), Some(0.042))];
        let baselines = compute_baselines(&events, |e| e.decision_value);
        let adj = adjusted_value(&events[0], &baselines, |e| e.decision_value).unwrap();
        assert!(approx_eq(adj, 0.0, 1e-10));
    }

    #[test]
    fn different_counts_are_different_partitions() {
        let mut a = make_event("A", 1, Some(0.0), Some(0.0), Some(1.0));
        let mut b = make_event("B", 2, Some(0.0), Some(0.0), Some(5.0));
        a.count = Count { balls: 0, strikes: 0 };
        b.count = Count { balls: 3, strikes: 2 };

        let events = vec![a, b];
        let baselines = compute_baselines(&events, |e| e.decision_value);
        assert_eq!(baselines.len(), 2);

        // Each is alone in its partition, so both adjust to zero
        for e in &events {
            let adj = adjusted_value(e, &baselines, |e| e.decision_value).unwrap();
            assert!(approx_eq(adj, 0.0, 1e-10));
        }
    }

    #[test]
    fn unlocated_events_excluded() {
        let events = vec![
            make_event("A", 1, None, Some(0.0), Some(1.0)),
            make_event("B", 2, Some(0.0), None, Some(2.0)),
        ];
        let baselines = compute_baselines(&events, |e| e.decision_value);
        assert!(baselines.is_empty());
        assert!(adjusted_value(&events[0], &baselines, |e| e.decision_value).is_none());
    }

    #[test]
    fn missing_values_excluded_from_partition_mean() {
        let events = vec![
            make_event("A", 1, Some(0.0), Some(0.0), Some(4.0)),
            make_event("B", 2, Some(0.0), Some(0.0), None),
        ];
        let baselines = compute_baselines(&events, |e| e.decision_value);
        let key = ContextKey::for_event(&events[0]).unwrap();
        // Mean over the single defined value, not over two events
        assert!(approx_eq(baselines[&key], 4.0, 1e-10));
        assert!(adjusted_value(&events[1], &baselines, |e| e.decision_value).is_none());
    }
}
