//! Closing-line-value validation
//!
//! Compares the first and last prices of a reference bookmaker's 1X2 series
//! for a match and classifies how far the market moved.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::domain::{OddsSnapshot, Side};

/// Lower bound of the GOOD band, also the minimum move that names a side
pub const GOOD_MIN_PCT: f64 = 2.0;
/// Lower bound of the SWEET_SPOT band
pub const SWEET_SPOT_MIN_PCT: f64 = 5.0;
/// Upper bound (inclusive) of the SWEET_SPOT band; anything above is DANGER
pub const SWEET_SPOT_MAX_PCT: f64 = 10.0;
/// Beyond this the move is treated as untradeable
pub const EXTREME_PCT: f64 = 20.0;

const RESULT_MARKETS: [&str; 4] = ["1x2", "h2h", "match_winner", "full_time_result"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClvSignal {
    SweetSpot,
    Good,
    Danger,
    NoSignal,
    /// Positive CLV on a side opposite the pick; only set by the scorer
    Contrarian,
}

impl ClvSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClvSignal::SweetSpot => "SWEET_SPOT",
            ClvSignal::Good => "GOOD",
            ClvSignal::Danger => "DANGER",
            ClvSignal::NoSignal => "NO_SIGNAL",
            ClvSignal::Contrarian => "CONTRARIAN",
        }
    }
}

impl fmt::Display for ClvSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SizingAdjustment {
    Boost,
    Normal,
    Reduce,
    Skip,
}

impl SizingAdjustment {
    pub fn as_str(&self) -> &'static str {
        match self {
            SizingAdjustment::Boost => "BOOST",
            SizingAdjustment::Normal => "NORMAL",
            SizingAdjustment::Reduce => "REDUCE",
            SizingAdjustment::Skip => "SKIP",
        }
    }
}

/// Per-match CLV summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClvData {
    pub home_clv: f64,
    pub draw_clv: f64,
    pub away_clv: f64,
    pub hours_tracked: f64,
    pub signal: ClvSignal,
    /// `None` stands for NONE
    pub recommended_side: Option<Side>,
    pub sizing_adjustment: SizingAdjustment,
}

impl ClvData {
    pub fn max_clv(&self) -> f64 {
        self.home_clv.max(self.draw_clv).max(self.away_clv)
    }

    /// Build from per-side CLV values and classify.
    pub fn from_clv(home_clv: f64, draw_clv: f64, away_clv: f64, hours_tracked: f64) -> Self {
        let values = [
            (Side::Home, home_clv),
            (Side::Draw, draw_clv),
            (Side::Away, away_clv),
        ];
        let (best_side, max_clv) = values
            .iter()
            .copied()
            .fold((Side::Home, f64::NEG_INFINITY), |best, cur| {
                if cur.1 > best.1 {
                    cur
                } else {
                    best
                }
            });
        let (signal, sizing_adjustment) = classify(max_clv);
        let recommended_side = (max_clv >= GOOD_MIN_PCT).then_some(best_side);

        Self {
            home_clv,
            draw_clv,
            away_clv,
            hours_tracked,
            signal,
            recommended_side,
            sizing_adjustment,
        }
    }
}

/// CLV of taking `taken` when the line closed at `closing`, in percent.
pub fn clv_pct(taken: f64, closing: f64) -> f64 {
    if taken <= 1.0 || closing <= 1.0 || !taken.is_finite() || !closing.is_finite() {
        return 0.0;
    }
    (taken / closing - 1.0) * 100.0
}

/// Signal band for the largest per-side CLV. Bands are closed on the lower end.
pub fn classify(max_clv: f64) -> (ClvSignal, SizingAdjustment) {
    if max_clv > EXTREME_PCT {
        (ClvSignal::Danger, SizingAdjustment::Skip)
    } else if max_clv > SWEET_SPOT_MAX_PCT {
        (ClvSignal::Danger, SizingAdjustment::Reduce)
    } else if max_clv >= SWEET_SPOT_MIN_PCT {
        (ClvSignal::SweetSpot, SizingAdjustment::Boost)
    } else if max_clv >= GOOD_MIN_PCT {
        (ClvSignal::Good, SizingAdjustment::Normal)
    } else {
        (ClvSignal::NoSignal, SizingAdjustment::Normal)
    }
}

/// Reads a gold-standard bookmaker's series and produces [`ClvData`].
#[derive(Debug, Clone)]
pub struct ClvValidator {
    bookmaker: String,
}

impl ClvValidator {
    pub fn new(bookmaker: impl Into<String>) -> Self {
        Self {
            bookmaker: bookmaker.into().to_lowercase(),
        }
    }

    /// `None` unless the bookmaker tracked all three outcomes for the match.
    pub fn evaluate(&self, snapshots: &[OddsSnapshot]) -> Option<ClvData> {
        // side -> (first snapshot, last snapshot)
        let mut series: HashMap<Side, (&OddsSnapshot, &OddsSnapshot)> = HashMap::new();

        for snap in snapshots.iter().filter(|s| {
            s.bookmaker.to_lowercase() == self.bookmaker
                && RESULT_MARKETS.contains(&s.market.to_lowercase().as_str())
                && s.odds.is_finite()
                && s.odds > 1.0
        }) {
            series
                .entry(snap.outcome)
                .and_modify(|(first, last)| {
                    if snap.captured_at < first.captured_at {
                        *first = snap;
                    }
                    if snap.captured_at >= last.captured_at {
                        *last = snap;
                    }
                })
                .or_insert((snap, snap));
        }

        if Side::ALL.iter().any(|side| !series.contains_key(side)) {
            return None;
        }

        let first_seen = series.values().map(|(f, _)| f.captured_at).min()?;
        let last_seen = series.values().map(|(_, l)| l.captured_at).max()?;
        let hours_tracked = (last_seen - first_seen).num_seconds() as f64 / 3600.0;

        let side_clv = |side: Side| {
            series
                .get(&side)
                .map(|(first, last)| clv_pct(first.odds, last.odds))
                .unwrap_or(0.0)
        };

        Some(ClvData::from_clv(
            side_clv(Side::Home),
            side_clv(Side::Draw),
            side_clv(Side::Away),
            hours_tracked,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(hour: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 4, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + chrono::Duration::hours(hour)
    }

    fn snap(bookmaker: &str, outcome: Side, odds: f64, hour: i64) -> OddsSnapshot {
        OddsSnapshot {
            match_id: "m1".into(),
            bookmaker: bookmaker.into(),
            market: "1x2".into(),
            outcome,
            odds,
            captured_at: at(hour),
        }
    }

    #[test]
    fn test_clv_pct() {
        let clv = clv_pct(2.10, 1.93);
        assert!((clv - 8.808).abs() < 0.01, "clv = {clv}");
        assert_eq!(clv_pct(1.0, 2.0), 0.0);
    }

    #[test]
    fn test_band_boundaries_closed_on_lower_end() {
        assert_eq!(classify(5.0).0, ClvSignal::SweetSpot);
        assert_eq!(classify(10.0).0, ClvSignal::SweetSpot);
        assert_eq!(classify(10.0001).0, ClvSignal::Danger);
        assert_eq!(classify(2.0).0, ClvSignal::Good);
        assert_eq!(classify(4.999).0, ClvSignal::Good);
        assert_eq!(classify(1.999).0, ClvSignal::NoSignal);
        assert_eq!(classify(-3.0).0, ClvSignal::NoSignal);
    }

    #[test]
    fn test_sizing_adjustments() {
        assert_eq!(classify(7.0).1, SizingAdjustment::Boost);
        assert_eq!(classify(3.0).1, SizingAdjustment::Normal);
        assert_eq!(classify(12.0).1, SizingAdjustment::Reduce);
        assert_eq!(classify(25.0).1, SizingAdjustment::Skip);
    }

    #[test]
    fn test_evaluate_sweet_spot_home() {
        let validator = ClvValidator::new("Pinnacle");
        let snaps = vec![
            snap("pinnacle", Side::Home, 2.10, 0),
            snap("pinnacle", Side::Draw, 3.40, 0),
            snap("pinnacle", Side::Away, 3.60, 0),
            snap("pinnacle", Side::Home, 2.00, 12),
            snap("pinnacle", Side::Home, 1.93, 24),
            snap("pinnacle", Side::Draw, 3.45, 24),
            snap("pinnacle", Side::Away, 4.10, 24),
            // other books are ignored
            snap("bet365", Side::Home, 9.00, 0),
        ];
        let clv = validator.evaluate(&snaps).expect("tracked");
        assert_eq!(clv.signal, ClvSignal::SweetSpot);
        assert_eq!(clv.recommended_side, Some(Side::Home));
        assert_eq!(clv.sizing_adjustment, SizingAdjustment::Boost);
        assert!((clv.hours_tracked - 24.0).abs() < 1e-9);
        assert!(clv.away_clv < 0.0);
    }

    #[test]
    fn test_evaluate_requires_all_outcomes() {
        let validator = ClvValidator::new("pinnacle");
        let snaps = vec![
            snap("pinnacle", Side::Home, 2.10, 0),
            snap("pinnacle", Side::Away, 3.60, 0),
        ];
        assert!(validator.evaluate(&snaps).is_none());
        assert!(validator.evaluate(&[]).is_none());
    }

    #[test]
    fn test_no_recommendation_below_good() {
        let data = ClvData::from_clv(1.0, -0.5, 0.3, 6.0);
        assert_eq!(data.signal, ClvSignal::NoSignal);
        assert_eq!(data.recommended_side, None);
    }
}
