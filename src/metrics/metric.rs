// Typed metric identifiers and selection filters.
//
// Every place that needs a metric's table header, chart name, rolling
// denomination, or event-field lookup goes through `Metric` — there is no
// string-keyed column substitution anywhere else.

use serde::Deserialize;

use crate::data::event::{Count, Hand, PitchEvent, PitchType};

// ---------------------------------------------------------------------------
// Metric
// ---------------------------------------------------------------------------

/// What a rolling window counts for a given metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denomination {
    Pitches,
    Swings,
    BattedBallEvents,
}

impl Denomination {
    pub fn label(&self) -> &'static str {
        match self {
            Denomination::Pitches => "Pitches",
            Denomination::Swings => "Swings",
            Denomination::BattedBallEvents => "BBE",
        }
    }
}

/// A batter ability metric derived from the per-pitch model outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Metric {
    SwingAggression,
    StrikeZoneJudgement,
    DecisionValue,
    ZoneDecisionValue,
    OutZoneDecisionValue,
    ContactAbility,
    AdjustedPower,
    PitchHittability,
    HitterPerformance,
}

impl Metric {
    pub const ALL: [Metric; 9] = [
        Metric::SwingAggression,
        Metric::StrikeZoneJudgement,
        Metric::DecisionValue,
        Metric::ZoneDecisionValue,
        Metric::OutZoneDecisionValue,
        Metric::ContactAbility,
        Metric::AdjustedPower,
        Metric::PitchHittability,
        Metric::HitterPerformance,
    ];

    /// Short header used in the season leaderboard.
    pub fn column_label(&self) -> &'static str {
        match self {
            Metric::SwingAggression => "Swing Agg (%)",
            Metric::StrikeZoneJudgement => "SZ Judge",
            Metric::DecisionValue => "Dec Value",
            Metric::ZoneDecisionValue => "zDV",
            Metric::OutZoneDecisionValue => "oDV",
            Metric::ContactAbility => "Contact",
            Metric::AdjustedPower => "Power",
            Metric::PitchHittability => "Hittability",
            Metric::HitterPerformance => "HP",
        }
    }

    /// Full name used for rolling charts and logs.
    pub fn display_name(&self) -> &'static str {
        match self {
            Metric::SwingAggression => "Swing Aggression",
            Metric::StrikeZoneJudgement => "Strikezone Judgement",
            Metric::DecisionValue => "Decision Value",
            Metric::ZoneDecisionValue => "In-Zone Decision Value",
            Metric::OutZoneDecisionValue => "Out-of-Zone Decision Value",
            Metric::ContactAbility => "Contact Ability",
            Metric::AdjustedPower => "Power",
            Metric::PitchHittability => "Pitch Hittability",
            Metric::HitterPerformance => "Hitter Performance",
        }
    }

    /// The event subset a rolling window counts over.
    pub fn denomination(&self) -> Denomination {
        match self {
            Metric::ContactAbility => Denomination::Swings,
            Metric::AdjustedPower => Denomination::BattedBallEvents,
            _ => Denomination::Pitches,
        }
    }

    /// Default rolling window, in `denomination()` units.
    pub fn default_window(&self) -> usize {
        match self {
            Metric::ContactAbility => 200,
            Metric::AdjustedPower => 75,
            Metric::HitterPerformance => 800,
            _ => 400,
        }
    }

    /// Whether the metric is rescaled onto a standardized output scale.
    ///
    /// Swing aggression and pitch hittability are displayed raw: one is a
    /// signed frequency difference, the other a probability, and both are
    /// meaningful without relative standardization.
    pub fn is_standardized(&self) -> bool {
        !matches!(self, Metric::SwingAggression | Metric::PitchHittability)
    }

    /// Look up this metric's value on an event, `None` when the pitch is
    /// outside the metric's denominator.
    ///
    /// Decision value and power read the context-adjusted columns, so a
    /// batter is only credited for what the pitch context did not predict.
    pub fn value(&self, event: &PitchEvent) -> Option<f64> {
        match self {
            Metric::SwingAggression => event.swing_agg,
            Metric::StrikeZoneJudgement => event.strike_zone_judgement,
            Metric::DecisionValue => event.decision_value_above_avg,
            Metric::ZoneDecisionValue => event.decision_value_in_zone,
            Metric::OutZoneDecisionValue => event.decision_value_out_zone,
            Metric::ContactAbility => event.contact_over_expected,
            Metric::AdjustedPower => event.power_above_avg,
            Metric::PitchHittability => event.in_play_input,
            Metric::HitterPerformance => event.batter_woba,
        }
    }
}

// ---------------------------------------------------------------------------
// Selection filters
// ---------------------------------------------------------------------------

/// Pitch-type selection for rolling charts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PitchTypeFilter {
    All,
    Fastballs,
    BreakingBalls,
    Offspeed,
}

impl PitchTypeFilter {
    /// The pitch-type buckets this selection expands to.
    pub fn buckets(&self) -> &'static [PitchType] {
        match self {
            PitchTypeFilter::All => &[
                PitchType::Fastball,
                PitchType::BreakingBall,
                PitchType::Offspeed,
                PitchType::Other,
            ],
            PitchTypeFilter::Fastballs => &[PitchType::Fastball],
            PitchTypeFilter::BreakingBalls => &[PitchType::BreakingBall],
            PitchTypeFilter::Offspeed => &[PitchType::Offspeed],
        }
    }

    pub fn matches(&self, pitch_type: PitchType) -> bool {
        self.buckets().contains(&pitch_type)
    }
}

/// Count-situation selection for rolling charts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountFilter {
    All,
    HitterFriendly,
    PitcherFriendly,
    Even,
    TwoStrike,
    ThreeBall,
    Custom(Vec<Count>),
}

impl CountFilter {
    /// The explicit count set this selection expands to.
    pub fn selected(&self) -> Vec<Count> {
        let c = |balls, strikes| Count { balls, strikes };
        match self {
            CountFilter::All => Count::all().to_vec(),
            CountFilter::HitterFriendly => {
                vec![c(1, 0), c(2, 0), c(3, 0), c(2, 1), c(3, 1)]
            }
            CountFilter::PitcherFriendly => vec![c(0, 1), c(0, 2), c(1, 2)],
            CountFilter::Even => vec![c(0, 0), c(1, 1), c(2, 2)],
            CountFilter::TwoStrike => vec![c(0, 2), c(1, 2), c(2, 2), c(3, 2)],
            CountFilter::ThreeBall => vec![c(3, 0), c(3, 1), c(3, 2)],
            CountFilter::Custom(counts) => counts.clone(),
        }
    }

    pub fn matches(&self, count: Count) -> bool {
        self.selected().contains(&count)
    }
}

/// Opposing-pitcher handedness selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HandFilter {
    All,
    Left,
    Right,
}

impl HandFilter {
    pub fn matches(&self, hand: Hand) -> bool {
        match self {
            HandFilter::All => true,
            HandFilter::Left => hand == Hand::Left,
            HandFilter::Right => hand == Hand::Right,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denomination_per_metric() {
        assert_eq!(Metric::ContactAbility.denomination(), Denomination::Swings);
        assert_eq!(
            Metric::AdjustedPower.denomination(),
            Denomination::BattedBallEvents
        );
        assert_eq!(Metric::DecisionValue.denomination(), Denomination::Pitches);
        assert_eq!(
            Metric::HitterPerformance.denomination(),
            Denomination::Pitches
        );
    }

    #[test]
    fn default_windows() {
        assert_eq!(Metric::DecisionValue.default_window(), 400);
        assert_eq!(Metric::ContactAbility.default_window(), 200);
        assert_eq!(Metric::AdjustedPower.default_window(), 75);
        assert_eq!(Metric::HitterPerformance.default_window(), 800);
    }

    #[test]
    fn standardization_flags() {
        assert!(!Metric::SwingAggression.is_standardized());
        assert!(!Metric::PitchHittability.is_standardized());
        assert!(Metric::DecisionValue.is_standardized());
        assert!(Metric::HitterPerformance.is_standardized());
    }

    #[test]
    fn pitch_type_filter_expansion() {
        assert_eq!(PitchTypeFilter::All.buckets().len(), 4);
        assert_eq!(
            PitchTypeFilter::Fastballs.buckets(),
            &[PitchType::Fastball]
        );
        assert!(PitchTypeFilter::All.matches(PitchType::Other));
        assert!(!PitchTypeFilter::Offspeed.matches(PitchType::Fastball));
    }

    #[test]
    fn count_filter_expansion() {
        assert_eq!(CountFilter::All.selected().len(), 12);
        assert_eq!(CountFilter::HitterFriendly.selected().len(), 5);
        assert_eq!(CountFilter::PitcherFriendly.selected().len(), 3);
        assert_eq!(CountFilter::Even.selected().len(), 3);
        assert_eq!(CountFilter::TwoStrike.selected().len(), 4);
        assert_eq!(CountFilter::ThreeBall.selected().len(), 3);

        let full = Count { balls: 3, strikes: 2 };
        assert!(CountFilter::TwoStrike.matches(full));
        assert!(CountFilter::ThreeBall.matches(full));
        assert!(!CountFilter::Even.matches(full));

        let custom = CountFilter::Custom(vec![Count { balls: 0, strikes: 0 }]);
        assert!(custom.matches(Count { balls: 0, strikes: 0 }));
        assert!(!custom.matches(Count { balls: 1, strikes: 0 }));
    }

    #[test]
    fn hand_filter_matching() {
        assert!(HandFilter::All.matches(Hand::Left));
        assert!(HandFilter::Left.matches(Hand::Left));
        assert!(!HandFilter::Left.matches(Hand::Right));
        assert!(HandFilter::Right.matches(Hand::Right));
    }
}
