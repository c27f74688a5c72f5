//! Market scoring
//!
//! Turns a (probability, odds, market) triple into a diamond score, an edge,
//! a Kelly fraction, a rating and a sizing tier. Longshots are shrunk through
//! an odds-band factor and capped per odds tier; learned calibration factors
//! are applied on top.

use serde::{Deserialize, Serialize};

use super::clv::{ClvData, ClvSignal, SizingAdjustment};
use crate::domain::{AdjustmentSet, ConfidenceLevel, Market, Rating, SizingTier};

pub const MIN_SCORE: f64 = 20.0;
pub const MAX_SCORE: f64 = 85.0;
pub const MAX_KELLY_PCT: f64 = 8.0;

/// (lower odds bound, shrinkage factor); each band runs up to the next bound.
pub const ODDS_BANDS: [(f64, f64); 9] = [
    (1.0, 1.00),
    (1.5, 0.95),
    (1.8, 0.85),
    (2.2, 0.75),
    (2.6, 0.65),
    (3.0, 0.55),
    (4.0, 0.45),
    (5.0, 0.30),
    (7.0, 0.20),
];

/// Why a candidate could not be scored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Odds at or below 1.0, or not finite
    InvalidOdds,
    /// Probability at or below zero, or not finite
    InvalidProbability,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::InvalidOdds => "invalid_odds",
            RejectReason::InvalidProbability => "invalid_probability",
        }
    }
}

/// Sizing decision after the CLV overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sizing {
    pub tier: SizingTier,
    /// Signal as seen from the pick's side; `None` when no CLV was tracked
    pub signal: Option<ClvSignal>,
    pub contrarian: bool,
}

/// A successfully scored market with every intermediate term kept for factors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredMarket {
    pub market: Market,
    pub probability: f64,
    pub odds: f64,
    pub implied_probability: f64,
    pub edge_pct: f64,
    pub kelly_pct: f64,
    pub base_score: f64,
    pub edge_bonus: f64,
    pub market_prior: f64,
    pub odds_factor: f64,
    /// Score before calibration (already capped and clamped)
    pub uncalibrated_score: f64,
    /// Geometric mean of the applied calibration factors
    pub calibration_factor: Option<f64>,
    pub final_score: f64,
    pub diamond_score: i32,
    pub rating: Rating,
    pub confidence: ConfidenceLevel,
    pub sizing: Sizing,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScoreOutcome {
    Valid(Box<ScoredMarket>),
    Rejected(RejectReason),
}

/// Inputs for one scoring call
#[derive(Debug, Clone, Copy)]
pub struct ScoreRequest<'a> {
    pub market: Market,
    pub probability: f64,
    pub odds: f64,
    pub league: Option<&'a str>,
    pub clv: Option<&'a ClvData>,
    /// Overrides the confidence level derived from the final score
    pub confidence: Option<ConfidenceLevel>,
}

impl<'a> ScoreRequest<'a> {
    pub fn new(market: Market, probability: f64, odds: f64) -> Self {
        Self {
            market,
            probability,
            odds,
            league: None,
            clv: None,
            confidence: None,
        }
    }

    pub fn league(mut self, league: &'a str) -> Self {
        self.league = Some(league);
        self
    }

    pub fn clv(mut self, clv: Option<&'a ClvData>) -> Self {
        self.clv = clv;
        self
    }

    pub fn confidence(mut self, confidence: ConfidenceLevel) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// Base score from the model probability (inclusive lower bounds)
pub fn base_score(probability: f64) -> f64 {
    if probability >= 0.70 {
        75.0
    } else if probability >= 0.55 {
        70.0
    } else if probability >= 0.45 {
        65.0
    } else if probability >= 0.35 {
        60.0
    } else if probability >= 0.25 {
        55.0
    } else {
        45.0
    }
}

/// Bonus (or penalty) from edge in percentage points
pub fn edge_bonus(edge_pct: f64) -> f64 {
    if edge_pct >= 10.0 {
        10.0
    } else if edge_pct >= 5.0 {
        5.0
    } else if edge_pct >= 2.0 {
        2.0
    } else if edge_pct > 0.0 {
        0.0
    } else {
        -15.0
    }
}

/// Shrinkage factor for the band containing `odds`
pub fn odds_factor(odds: f64) -> f64 {
    ODDS_BANDS
        .iter()
        .rev()
        .find(|(lower, _)| odds >= *lower)
        .map(|(_, factor)| *factor)
        .unwrap_or(1.0)
}

/// Score ceiling for the odds tier
pub fn odds_cap(odds: f64) -> f64 {
    if odds >= 4.0 {
        65.0
    } else if odds >= 3.0 {
        75.0
    } else {
        MAX_SCORE
    }
}

/// Kelly stake in percent of bankroll, clamped to [0, 8]
pub fn kelly_pct(probability: f64, odds: f64) -> f64 {
    let edge = probability - 1.0 / odds;
    if edge <= 0.0 || odds <= 1.0 {
        return 0.0;
    }
    (edge / (odds - 1.0) * 100.0).clamp(0.0, MAX_KELLY_PCT)
}

/// Tier from edge magnitude before any CLV overlay
pub fn base_tier(edge_pct: f64) -> SizingTier {
    let magnitude = edge_pct.abs();
    if magnitude < 1.0 {
        SizingTier::Small
    } else if magnitude < 3.0 {
        SizingTier::Normal
    } else {
        SizingTier::Max
    }
}

/// Apply the CLV overlay to the edge-derived tier.
pub fn size_pick(edge_pct: f64, odds: f64, market: Market, clv: Option<&ClvData>) -> Sizing {
    let mut tier = base_tier(edge_pct);

    let Some(clv) = clv else {
        return Sizing {
            tier: cap_longshot_tier(tier, odds),
            signal: None,
            contrarian: false,
        };
    };

    let sides = market.sides();
    let confirms = clv
        .recommended_side
        .map(|side| sides.contains(&side))
        .unwrap_or(false);

    match clv.signal {
        ClvSignal::SweetSpot if confirms => tier = tier.promote(),
        ClvSignal::Good if confirms && tier == SizingTier::Small => tier = SizingTier::Normal,
        ClvSignal::Danger => tier = tier.demote(),
        _ => {}
    }

    let contrarian = !sides.is_empty() && clv.recommended_side.is_some() && !confirms;
    if contrarian && tier == SizingTier::Max {
        tier = SizingTier::Normal;
    }
    if clv.sizing_adjustment == SizingAdjustment::Skip {
        tier = SizingTier::Skip;
    }

    Sizing {
        tier: cap_longshot_tier(tier, odds),
        signal: Some(if contrarian {
            ClvSignal::Contrarian
        } else {
            clv.signal
        }),
        contrarian,
    }
}

// The odds >= 4 score cap also bounds the stake: longshots never size MAX.
fn cap_longshot_tier(tier: SizingTier, odds: f64) -> SizingTier {
    if odds >= 4.0 && tier == SizingTier::Max {
        SizingTier::Normal
    } else {
        tier
    }
}

fn finish(score: f64, odds: f64) -> f64 {
    score.min(odds_cap(odds)).clamp(MIN_SCORE, MAX_SCORE)
}

/// Scores markets against a snapshot of learned adjustments.
#[derive(Debug, Clone, Default)]
pub struct MarketScorer {
    adjustments: AdjustmentSet,
}

impl MarketScorer {
    pub fn new(adjustments: AdjustmentSet) -> Self {
        Self { adjustments }
    }

    pub fn score(&self, req: &ScoreRequest<'_>) -> ScoreOutcome {
        if !req.odds.is_finite() || req.odds <= 1.0 {
            return ScoreOutcome::Rejected(RejectReason::InvalidOdds);
        }
        if !req.probability.is_finite() || req.probability <= 0.0 {
            return ScoreOutcome::Rejected(RejectReason::InvalidProbability);
        }

        let probability = req.probability.min(1.0);
        let odds = req.odds;
        let implied = 1.0 / odds;
        let edge_pct = (probability - implied) * 100.0;
        let kelly = kelly_pct(probability, odds);

        let base = base_score(probability);
        let bonus = edge_bonus(edge_pct);
        let prior = req.market.prior();
        let factor = odds_factor(odds);

        let uncalibrated = finish((base + bonus + prior) * factor, odds);

        let factors: Vec<f64> = [
            self.adjustments.bucket_factor(uncalibrated.round()),
            self.adjustments.market_factor(req.market),
            req.league.and_then(|l| self.adjustments.league_factor(l)),
        ]
        .into_iter()
        .flatten()
        .collect();

        let calibration_factor = if factors.is_empty() {
            None
        } else {
            let log_mean = factors.iter().map(|f| f.ln()).sum::<f64>() / factors.len() as f64;
            Some(log_mean.exp())
        };

        let final_score = match calibration_factor {
            Some(f) => finish(uncalibrated * f, odds),
            None => uncalibrated,
        };
        let diamond_score = final_score.round() as i32;
        let rating = Rating::from_score(diamond_score as f64);
        let confidence = req
            .confidence
            .unwrap_or_else(|| ConfidenceLevel::from_score(diamond_score as f64));
        let sizing = size_pick(edge_pct, odds, req.market, req.clv);

        ScoreOutcome::Valid(Box::new(ScoredMarket {
            market: req.market,
            probability,
            odds,
            implied_probability: implied,
            edge_pct,
            kelly_pct: kelly,
            base_score: base,
            edge_bonus: bonus,
            market_prior: prior,
            odds_factor: factor,
            uncalibrated_score: uncalibrated,
            calibration_factor,
            final_score,
            diamond_score,
            rating,
            confidence,
            sizing,
        }))
    }
}

/// Score without calibration or CLV input.
pub fn score_market(probability: f64, odds: f64, market: Market) -> ScoreOutcome {
    MarketScorer::default().score(&ScoreRequest::new(market, probability, odds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{score_bucket, AdjustmentKind, Side};

    fn valid(outcome: ScoreOutcome) -> ScoredMarket {
        match outcome {
            ScoreOutcome::Valid(scored) => *scored,
            ScoreOutcome::Rejected(reason) => panic!("rejected: {}", reason.as_str()),
        }
    }

    #[test]
    fn test_rejects_bad_inputs() {
        assert_eq!(
            score_market(0.6, 1.0, Market::Over25),
            ScoreOutcome::Rejected(RejectReason::InvalidOdds)
        );
        assert_eq!(
            score_market(0.6, 0.9, Market::Over25),
            ScoreOutcome::Rejected(RejectReason::InvalidOdds)
        );
        assert_eq!(
            score_market(0.0, 2.0, Market::Over25),
            ScoreOutcome::Rejected(RejectReason::InvalidProbability)
        );
        assert_eq!(
            score_market(f64::NAN, 2.0, Market::Over25),
            ScoreOutcome::Rejected(RejectReason::InvalidProbability)
        );
    }

    #[test]
    fn test_base_score_inclusive_lower_bounds() {
        assert_eq!(base_score(0.25), 55.0);
        assert_eq!(base_score(0.2500001), 55.0);
        assert_eq!(base_score(0.2499), 45.0);
        assert_eq!(base_score(0.70), 75.0);
        assert_eq!(base_score(0.5499), 65.0);
    }

    #[test]
    fn test_edge_bonus_bands() {
        assert_eq!(edge_bonus(12.0), 10.0);
        assert_eq!(edge_bonus(5.0), 5.0);
        assert_eq!(edge_bonus(2.0), 2.0);
        assert_eq!(edge_bonus(0.5), 0.0);
        assert_eq!(edge_bonus(0.0), -15.0);
        assert_eq!(edge_bonus(-4.0), -15.0);
    }

    #[test]
    fn test_odds_bands_non_increasing() {
        for pair in ODDS_BANDS.windows(2) {
            assert!(pair[0].0 < pair[1].0);
            assert!(pair[0].1 >= pair[1].1);
        }
        assert_eq!(odds_factor(1.49), 1.00);
        assert_eq!(odds_factor(1.5), 0.95);
        assert_eq!(odds_factor(7.0), 0.20);
        assert_eq!(odds_factor(25.0), 0.20);
    }

    #[test]
    fn test_score_never_rises_across_bands() {
        // p = 0.95 saturates the edge bonus at every band lower bound
        let mut previous = f64::INFINITY;
        for (lower, _) in ODDS_BANDS.iter().skip(1) {
            let scored = valid(score_market(0.95, *lower, Market::Over25));
            assert!(scored.final_score <= previous, "odds {lower}");
            previous = scored.final_score;
        }
    }

    #[test]
    fn test_clamps_hold() {
        for market in Market::ALL {
            for odds in [1.01, 1.3, 1.9, 2.5, 3.3, 4.5, 6.0, 12.0, 50.0] {
                for p in [0.01, 0.2, 0.45, 0.7, 0.99, 1.0] {
                    let s = valid(score_market(p, odds, market));
                    assert!((20..=85).contains(&s.diamond_score));
                    assert!((0.0..=8.0).contains(&s.kelly_pct));
                }
            }
        }
    }

    #[test]
    fn test_over25_at_185() {
        let s = valid(score_market(0.5787, 1.85, Market::Over25));
        assert!((65..=75).contains(&s.diamond_score), "{}", s.diamond_score);
        assert!(matches!(s.rating, Rating::Good | Rating::VeryGood));
        assert!(s.kelly_pct >= 3.0 && s.kelly_pct <= 4.5, "{}", s.kelly_pct);
        assert!(s.edge_pct > 0.0);
    }

    #[test]
    fn test_longshot_capped() {
        let s = valid(score_market(0.5787, 4.20, Market::Over25));
        assert!(s.diamond_score <= 65);
        assert!(s.rating <= Rating::Good);
        assert!(s.kelly_pct <= 8.0);
        assert_eq!(s.kelly_pct, 8.0);
    }

    #[test]
    fn test_negative_edge_home_favourite() {
        let s = valid(score_market(0.72, 1.30, Market::Home));
        assert!(s.edge_pct < 0.0);
        assert!((s.edge_pct + 4.92).abs() < 0.01);
        assert_eq!(s.kelly_pct, 0.0);
        assert_eq!(s.edge_bonus, -15.0);
    }

    #[test]
    fn test_calibration_multiplies_bucket() {
        let mut adjustments = AdjustmentSet::new();
        adjustments.insert(AdjustmentKind::CalibrationBucket, "70", 0.5);
        let scorer = MarketScorer::new(adjustments);
        let plain = valid(score_market(0.5787, 1.85, Market::Over25));
        let calibrated = valid(scorer.score(&ScoreRequest::new(Market::Over25, 0.5787, 1.85)));
        assert_eq!(score_bucket(plain.final_score), 70);
        assert_eq!(calibrated.calibration_factor, Some(0.5));
        assert!((calibrated.final_score - plain.final_score * 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_calibration_geometric_mean() {
        let mut adjustments = AdjustmentSet::new();
        adjustments.insert(AdjustmentKind::Market, "btts_yes", 1.44);
        adjustments.insert(AdjustmentKind::League, "EPL", 1.0);
        let scorer = MarketScorer::new(adjustments);
        let s = valid(
            scorer.score(&ScoreRequest::new(Market::BttsYes, 0.40, 2.40).league("EPL")),
        );
        assert!((s.calibration_factor.unwrap() - 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_override() {
        let s = valid(
            MarketScorer::default().score(
                &ScoreRequest::new(Market::Over25, 0.5787, 1.85)
                    .confidence(ConfidenceLevel::Low),
            ),
        );
        assert_eq!(s.confidence, ConfidenceLevel::Low);
    }

    #[test]
    fn test_sweet_spot_promotes_confirmed_side() {
        let clv = ClvData::from_clv(8.8, -1.0, -3.0, 24.0);
        assert_eq!(clv.signal, ClvSignal::SweetSpot);
        // edge 2% -> NORMAL base tier
        let sizing = size_pick(2.0, 2.10, Market::Home, Some(&clv));
        assert_eq!(sizing.tier, SizingTier::Max);
        assert!(!sizing.contrarian);
        assert_eq!(sizing.signal, Some(ClvSignal::SweetSpot));
    }

    #[test]
    fn test_danger_on_other_side_demotes_and_flags() {
        let clv = ClvData::from_clv(-4.0, 0.5, 12.0, 24.0);
        assert_eq!(clv.signal, ClvSignal::Danger);
        assert_eq!(clv.recommended_side, Some(Side::Away));
        let sizing = size_pick(4.0, 2.10, Market::Home, Some(&clv));
        assert_eq!(sizing.tier, SizingTier::Normal);
        assert!(sizing.contrarian);
        assert_eq!(sizing.signal, Some(ClvSignal::Contrarian));
    }

    #[test]
    fn test_good_only_lifts_small() {
        let clv = ClvData::from_clv(3.0, -1.0, -1.0, 10.0);
        assert_eq!(
            size_pick(0.5, 2.0, Market::HomeOrDraw, Some(&clv)).tier,
            SizingTier::Normal
        );
        assert_eq!(
            size_pick(2.0, 2.0, Market::HomeOrDraw, Some(&clv)).tier,
            SizingTier::Normal
        );
    }

    #[test]
    fn test_danger_small_becomes_skip() {
        let clv = ClvData::from_clv(11.0, -1.0, -1.0, 10.0);
        assert_eq!(
            size_pick(0.5, 1.8, Market::Over25, Some(&clv)).tier,
            SizingTier::Skip
        );
    }

    #[test]
    fn test_longshot_never_sizes_max() {
        let clv = ClvData::from_clv(8.0, -1.0, -1.0, 10.0);
        assert_eq!(
            size_pick(6.0, 4.5, Market::Home, Some(&clv)).tier,
            SizingTier::Normal
        );
        assert_eq!(size_pick(6.0, 4.5, Market::Home, None).tier, SizingTier::Normal);
    }
}
