//! Auto-learner analysis over resolved picks
//!
//! Measures calibration per score bucket, market, league and timing bucket,
//! flags systemic weaknesses, and turns the result into adjustment factors for
//! the next pick cycle. Pure computation; the coordinator owns persistence.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::domain::{
    clamp_factor, score_bucket, Adjustment, AdjustmentKind, ConfidenceTier, ResolvedPick,
};

/// Market win rate below which a market is flagged
pub const UNDERPERFORMING_WIN_RATE: f64 = 0.40;
/// Market win rate below which the flag becomes high severity
pub const FAILING_WIN_RATE: f64 = 0.30;
/// Scores at or above this are checked for overconfidence
pub const OVERCONFIDENCE_SCORE: i32 = 75;
/// Allowed shortfall of win rate under prediction, in points
pub const OVERCONFIDENCE_GAP_PCT: f64 = 15.0;
/// Average CLV below this (in percent) is flagged
pub const NEGATIVE_CLV_PCT: f64 = -2.0;
/// ECE tolerated before it costs health points
pub const ECE_TOLERANCE_PCT: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaknessKind {
    UnderperformingMarket,
    Overconfidence,
    NegativeClv,
}

impl WeaknessKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeaknessKind::UnderperformingMarket => "underperforming_market",
            WeaknessKind::Overconfidence => "overconfidence",
            WeaknessKind::NegativeClv => "negative_clv",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weakness {
    pub kind: WeaknessKind,
    /// Market name, or "global"
    pub target: String,
    pub severity: Severity,
    pub detail: String,
}

/// Aggregate over one segment (bucket, market, league or timing bucket).
///
/// Rates are fractions in [0, 1]; ROI and CLV are percentages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentStats {
    pub target: String,
    pub samples: usize,
    pub wins: usize,
    pub win_rate: f64,
    pub avg_predicted: f64,
    pub roi_pct: f64,
    pub avg_clv: Option<f64>,
    /// `None` below the minimum sample count
    pub factor: Option<f64>,
    pub confidence: ConfidenceTier,
}

impl SegmentStats {
    /// Calibration gap in points (positive when under-confident)
    pub fn gap_pct(&self) -> f64 {
        (self.win_rate - self.avg_predicted) * 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningReport {
    pub generated_at: NaiveDateTime,
    pub window_days: u32,
    pub samples: usize,
    pub win_rate: f64,
    pub roi_pct: f64,
    pub avg_clv: Option<f64>,
    /// Expected calibration error over score buckets, in points
    pub ece_pct: f64,
    pub buckets: Vec<SegmentStats>,
    pub markets: Vec<SegmentStats>,
    pub leagues: Vec<SegmentStats>,
    pub timing: Vec<SegmentStats>,
    pub weaknesses: Vec<Weakness>,
    pub health_score: f64,
}

impl LearningReport {
    pub fn is_empty(&self) -> bool {
        self.samples == 0
    }

    pub fn count_severity(&self, severity: Severity) -> usize {
        self.weaknesses
            .iter()
            .filter(|w| w.severity == severity)
            .count()
    }

    /// Adjustment rows for every segment that reached the sample minimum.
    pub fn adjustments(&self) -> Vec<Adjustment> {
        let groups = [
            (AdjustmentKind::CalibrationBucket, &self.buckets),
            (AdjustmentKind::Market, &self.markets),
            (AdjustmentKind::League, &self.leagues),
            (AdjustmentKind::Other, &self.timing),
        ];

        groups
            .into_iter()
            .flat_map(|(kind, rows)| {
                rows.iter().filter_map(move |row| {
                    let factor = row.factor?;
                    let target = match kind {
                        AdjustmentKind::Other => format!("timing:{}", row.target),
                        _ => row.target.clone(),
                    };
                    Some(Adjustment {
                        kind,
                        target,
                        factor,
                        sample_size: row.samples as i32,
                        win_rate: row.win_rate,
                        avg_clv: row.avg_clv,
                        confidence: row.confidence,
                        updated_at: self.generated_at,
                    })
                })
            })
            .collect()
    }
}

/// Timing bucket label for a pick made `hours` before kickoff.
pub fn timing_bucket(hours: f64) -> &'static str {
    if hours > 48.0 {
        ">48h"
    } else if hours >= 24.0 {
        "24-48h"
    } else if hours >= 12.0 {
        "12-24h"
    } else if hours >= 6.0 {
        "6-12h"
    } else if hours >= 2.0 {
        "2-6h"
    } else {
        "<2h"
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AutoLearner {
    min_samples: usize,
}

impl Default for AutoLearner {
    fn default() -> Self {
        Self { min_samples: 3 }
    }
}

impl AutoLearner {
    pub fn new(min_samples: usize) -> Self {
        Self {
            min_samples: min_samples.max(1),
        }
    }

    pub fn analyze(
        &self,
        picks: &[ResolvedPick],
        window_days: u32,
        now: NaiveDateTime,
    ) -> LearningReport {
        let overall = self.segment("all", picks.iter());

        let buckets = self.group(picks, |p| {
            Some(score_bucket(p.diamond_score as f64).to_string())
        });
        let markets = self.group(picks, |p| Some(p.market.as_str().to_string()));
        let leagues = self.group(picks, |p| {
            (!p.league.trim().is_empty()).then(|| p.league.clone())
        });
        let timing = self.group(picks, |p| {
            p.hours_before_kickoff
                .filter(|h| h.is_finite())
                .map(|h| timing_bucket(h).to_string())
        });

        let ece_pct = expected_calibration_error(&buckets, picks.len());
        let weaknesses = self.weaknesses(picks, &markets, overall.avg_clv);
        let health_score = health_score(&weaknesses, ece_pct);

        LearningReport {
            generated_at: now,
            window_days,
            samples: picks.len(),
            win_rate: overall.win_rate,
            roi_pct: overall.roi_pct,
            avg_clv: overall.avg_clv,
            ece_pct,
            buckets,
            markets,
            leagues,
            timing,
            weaknesses,
            health_score,
        }
    }

    fn group<F>(&self, picks: &[ResolvedPick], key: F) -> Vec<SegmentStats>
    where
        F: Fn(&ResolvedPick) -> Option<String>,
    {
        let mut groups: BTreeMap<String, Vec<&ResolvedPick>> = BTreeMap::new();
        for pick in picks {
            if let Some(k) = key(pick) {
                groups.entry(k).or_default().push(pick);
            }
        }
        groups
            .into_iter()
            .map(|(target, rows)| self.segment(&target, rows.into_iter()))
            .collect()
    }

    fn segment<'a, I>(&self, target: &str, picks: I) -> SegmentStats
    where
        I: Iterator<Item = &'a ResolvedPick>,
    {
        let mut samples = 0usize;
        let mut wins = 0usize;
        let mut predicted = 0.0;
        let mut profit = 0.0;
        let mut clv_sum = 0.0;
        let mut clv_n = 0usize;

        for pick in picks {
            samples += 1;
            if pick.won {
                wins += 1;
            }
            predicted += pick.predicted_probability;
            profit += pick.profit();
            if let Some(clv) = pick.clv_pct.filter(|c| c.is_finite()) {
                clv_sum += clv;
                clv_n += 1;
            }
        }

        let n = samples.max(1) as f64;
        let win_rate = wins as f64 / n;
        let avg_predicted = predicted / n;
        let factor = (samples >= self.min_samples && avg_predicted > 0.0)
            .then(|| clamp_factor(win_rate / avg_predicted));

        SegmentStats {
            target: target.to_string(),
            samples,
            wins,
            win_rate,
            avg_predicted,
            roi_pct: profit / n * 100.0,
            avg_clv: (clv_n > 0).then(|| clv_sum / clv_n as f64),
            factor,
            confidence: ConfidenceTier::from_samples(samples),
        }
    }

    fn weaknesses(
        &self,
        picks: &[ResolvedPick],
        markets: &[SegmentStats],
        avg_clv: Option<f64>,
    ) -> Vec<Weakness> {
        let mut out = Vec::new();

        for market in markets.iter().filter(|m| m.samples >= self.min_samples) {
            if market.win_rate < UNDERPERFORMING_WIN_RATE {
                out.push(Weakness {
                    kind: WeaknessKind::UnderperformingMarket,
                    target: market.target.clone(),
                    severity: if market.win_rate < FAILING_WIN_RATE {
                        Severity::High
                    } else {
                        Severity::Medium
                    },
                    detail: format!(
                        "win rate {:.1}% over {} picks",
                        market.win_rate * 100.0,
                        market.samples
                    ),
                });
            }
        }

        let confident = self.segment(
            "global",
            picks
                .iter()
                .filter(|p| p.diamond_score >= OVERCONFIDENCE_SCORE),
        );
        if confident.samples >= self.min_samples && -confident.gap_pct() > OVERCONFIDENCE_GAP_PCT
        {
            out.push(Weakness {
                kind: WeaknessKind::Overconfidence,
                target: "global".to_string(),
                severity: Severity::High,
                detail: format!(
                    "score >= {OVERCONFIDENCE_SCORE}: win rate {:.1}% vs expected {:.1}% over {} picks",
                    confident.win_rate * 100.0,
                    confident.avg_predicted * 100.0,
                    confident.samples
                ),
            });
        }

        if let Some(clv) = avg_clv.filter(|c| *c < NEGATIVE_CLV_PCT) {
            out.push(Weakness {
                kind: WeaknessKind::NegativeClv,
                target: "global".to_string(),
                severity: Severity::Medium,
                detail: format!("average CLV {clv:.2}%"),
            });
        }

        out
    }
}

/// Sample-weighted mean |predicted − actual| over buckets, in points.
pub fn expected_calibration_error(buckets: &[SegmentStats], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let weighted: f64 = buckets
        .iter()
        .map(|b| b.samples as f64 * (b.avg_predicted - b.win_rate).abs())
        .sum();
    weighted / total as f64 * 100.0
}

/// 100 minus weakness penalties and excess calibration error, within [0, 100].
pub fn health_score(weaknesses: &[Weakness], ece_pct: f64) -> f64 {
    let high = weaknesses
        .iter()
        .filter(|w| w.severity == Severity::High)
        .count() as f64;
    let medium = weaknesses
        .iter()
        .filter(|w| w.severity == Severity::Medium)
        .count() as f64;
    let ece_penalty = 2.0 * (ece_pct - ECE_TOLERANCE_PCT).max(0.0);
    let score = 100.0 - 15.0 * high - 5.0 * medium - ece_penalty;
    if score.is_finite() {
        score.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Market;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 5, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn pick(market: Market, score: i32, predicted: f64, won: bool) -> ResolvedPick {
        ResolvedPick {
            match_id: format!("m-{score}-{won}"),
            market,
            league: "EPL".into(),
            odds: 1.9,
            predicted_probability: predicted,
            diamond_score: score,
            won,
            clv_pct: None,
            hours_before_kickoff: Some(30.0),
            resolved_at: now(),
        }
    }

    /// 20 picks in bucket 70, avg predicted 0.74, 11 wins (55%)
    fn overconfident_bucket() -> Vec<ResolvedPick> {
        (0..20)
            .map(|i| pick(Market::Over25, 70 + (i % 10), 0.74, i < 11))
            .collect()
    }

    #[test]
    fn test_bucket_factor_and_confidence() {
        let report = AutoLearner::default().analyze(&overconfident_bucket(), 60, now());
        let bucket = report
            .buckets
            .iter()
            .find(|b| b.target == "70")
            .expect("bucket 70");
        assert_eq!(bucket.samples, 20);
        assert!((bucket.win_rate - 0.55).abs() < 1e-9);
        let factor = bucket.factor.unwrap();
        assert!((factor - 0.55 / 0.74).abs() < 1e-9);
        assert!((0.5..=1.5).contains(&factor));
        assert_eq!(bucket.confidence, ConfidenceTier::Medium);

        let adj = report.adjustments();
        let row = adj
            .iter()
            .find(|a| a.kind == AdjustmentKind::CalibrationBucket)
            .unwrap();
        assert_eq!(row.target, "70");
        assert_eq!(row.sample_size, 20);
    }

    #[test]
    fn test_factor_clamped_low() {
        let picks: Vec<_> = (0..5)
            .map(|i| pick(Market::BttsYes, 72, 0.8, i == 0))
            .collect();
        let report = AutoLearner::default().analyze(&picks, 60, now());
        assert_eq!(report.buckets[0].factor, Some(0.5));
    }

    #[test]
    fn test_small_segments_get_no_factor() {
        let picks = vec![
            pick(Market::Draw, 61, 0.3, true),
            pick(Market::Draw, 62, 0.3, false),
        ];
        let report = AutoLearner::default().analyze(&picks, 60, now());
        assert!(report.adjustments().is_empty());
        assert_eq!(report.samples, 2);
    }

    #[test]
    fn test_empty_window() {
        let report = AutoLearner::default().analyze(&[], 60, now());
        assert!(report.is_empty());
        assert!(report.adjustments().is_empty());
        assert_eq!(report.ece_pct, 0.0);
        assert_eq!(report.health_score, 100.0);
    }

    #[test]
    fn test_ece_weighted() {
        let mut picks = overconfident_bucket();
        // perfectly calibrated bucket 60: 4 picks at 0.5, 2 wins
        picks.extend((0..4).map(|i| pick(Market::Over15, 62, 0.5, i < 2)));
        let report = AutoLearner::default().analyze(&picks, 60, now());
        let expected = 20.0 * 0.19 / 24.0 * 100.0;
        assert!((report.ece_pct - expected).abs() < 1e-9);
        assert!(report.ece_pct >= 0.0);
    }

    #[test]
    fn test_underperforming_market_severity() {
        let picks: Vec<_> = (0..10)
            .map(|i| pick(Market::Home, 60, 0.5, i < 2))
            .collect();
        let report = AutoLearner::default().analyze(&picks, 60, now());
        let w = report
            .weaknesses
            .iter()
            .find(|w| w.kind == WeaknessKind::UnderperformingMarket)
            .unwrap();
        assert_eq!(w.target, "home");
        assert_eq!(w.severity, Severity::High);
    }

    #[test]
    fn test_overconfidence_flagged() {
        let picks: Vec<_> = (0..6)
            .map(|i| pick(Market::Over25, 78, 0.75, i < 2))
            .collect();
        let report = AutoLearner::default().analyze(&picks, 60, now());
        assert!(report
            .weaknesses
            .iter()
            .any(|w| w.kind == WeaknessKind::Overconfidence));
    }

    #[test]
    fn test_negative_clv_flagged() {
        let picks: Vec<_> = (0..4)
            .map(|i| ResolvedPick {
                clv_pct: Some(-3.0),
                ..pick(Market::Over25, 66, 0.55, i % 2 == 0)
            })
            .collect();
        let report = AutoLearner::default().analyze(&picks, 60, now());
        assert_eq!(report.avg_clv, Some(-3.0));
        let w = report
            .weaknesses
            .iter()
            .find(|w| w.kind == WeaknessKind::NegativeClv)
            .unwrap();
        assert_eq!(w.severity, Severity::Medium);
    }

    #[test]
    fn test_health_bounds() {
        let many: Vec<Weakness> = (0..10)
            .map(|i| Weakness {
                kind: WeaknessKind::UnderperformingMarket,
                target: i.to_string(),
                severity: Severity::High,
                detail: String::new(),
            })
            .collect();
        assert_eq!(health_score(&many, 40.0), 0.0);
        assert_eq!(health_score(&[], 3.0), 100.0);
        assert_eq!(health_score(&[], 7.0), 96.0);
        assert_eq!(health_score(&many[..1], 0.0), 85.0);
    }

    #[test]
    fn test_timing_buckets() {
        assert_eq!(timing_bucket(72.0), ">48h");
        assert_eq!(timing_bucket(48.0), "24-48h");
        assert_eq!(timing_bucket(24.0), "24-48h");
        assert_eq!(timing_bucket(13.0), "12-24h");
        assert_eq!(timing_bucket(6.0), "6-12h");
        assert_eq!(timing_bucket(3.0), "2-6h");
        assert_eq!(timing_bucket(0.5), "<2h");

        let report = AutoLearner::default().analyze(&overconfident_bucket(), 60, now());
        assert_eq!(report.timing.len(), 1);
        assert!(report
            .adjustments()
            .iter()
            .any(|a| a.kind == AdjustmentKind::Other && a.target == "timing:24-48h"));
    }

    #[test]
    fn test_roi() {
        let picks = vec![
            pick(Market::BttsYes, 70, 0.6, true),
            pick(Market::BttsYes, 70, 0.6, false),
        ];
        let report = AutoLearner::default().analyze(&picks, 60, now());
        // +0.9 - 1.0 over two picks
        assert!((report.roi_pct + 5.0).abs() < 1e-9);
    }
}
