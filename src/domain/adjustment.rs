use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use super::Market;
use crate::error::ScorelineError;

pub const MIN_FACTOR: f64 = 0.5;
pub const MAX_FACTOR: f64 = 1.5;

/// Hard clamp applied to every learned factor
pub fn clamp_factor(factor: f64) -> f64 {
    if factor.is_finite() {
        factor.clamp(MIN_FACTOR, MAX_FACTOR)
    } else {
        1.0
    }
}

/// Lower edge of the ten-point score bucket containing `score`
pub fn score_bucket(score: f64) -> i32 {
    ((score / 10.0).floor() * 10.0) as i32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentKind {
    CalibrationBucket,
    Market,
    League,
    Other,
}

impl AdjustmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustmentKind::CalibrationBucket => "calibration_bucket",
            AdjustmentKind::Market => "market",
            AdjustmentKind::League => "league",
            AdjustmentKind::Other => "other",
        }
    }
}

impl fmt::Display for AdjustmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AdjustmentKind {
    type Err = ScorelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "calibration_bucket" => Ok(AdjustmentKind::CalibrationBucket),
            "market" => Ok(AdjustmentKind::Market),
            "league" => Ok(AdjustmentKind::League),
            "other" => Ok(AdjustmentKind::Other),
            other => Err(ScorelineError::Validation(format!(
                "unknown adjustment kind: {other}"
            ))),
        }
    }
}

/// Sample-size tier of a learned factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    Low,
    Medium,
    High,
}

impl ConfidenceTier {
    pub fn from_samples(n: usize) -> Self {
        if n >= 30 {
            ConfidenceTier::High
        } else if n >= 15 {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceTier::Low => "low",
            ConfidenceTier::Medium => "medium",
            ConfidenceTier::High => "high",
        }
    }
}

impl FromStr for ConfidenceTier {
    type Err = ScorelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(ConfidenceTier::Low),
            "medium" => Ok(ConfidenceTier::Medium),
            "high" => Ok(ConfidenceTier::High),
            other => Err(ScorelineError::Validation(format!(
                "unknown confidence tier: {other}"
            ))),
        }
    }
}

/// One learned multiplicative factor, unique per (kind, target)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adjustment {
    pub kind: AdjustmentKind,
    pub target: String,
    pub factor: f64,
    pub sample_size: i32,
    pub win_rate: f64,
    pub avg_clv: Option<f64>,
    pub confidence: ConfidenceTier,
    pub updated_at: NaiveDateTime,
}

/// Read-only snapshot of the adjustment store taken at the start of a pick cycle.
#[derive(Debug, Clone, Default)]
pub struct AdjustmentSet {
    factors: HashMap<(AdjustmentKind, String), f64>,
}

impl AdjustmentSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_adjustments(adjustments: &[Adjustment]) -> Self {
        let factors = adjustments
            .iter()
            .map(|a| ((a.kind, a.target.clone()), clamp_factor(a.factor)))
            .collect();
        Self { factors }
    }

    pub fn insert(&mut self, kind: AdjustmentKind, target: impl Into<String>, factor: f64) {
        self.factors
            .insert((kind, target.into()), clamp_factor(factor));
    }

    pub fn get(&self, kind: AdjustmentKind, target: &str) -> Option<f64> {
        self.factors.get(&(kind, target.to_string())).copied()
    }

    pub fn bucket_factor(&self, score: f64) -> Option<f64> {
        self.get(
            AdjustmentKind::CalibrationBucket,
            &score_bucket(score).to_string(),
        )
    }

    pub fn market_factor(&self, market: Market) -> Option<f64> {
        self.get(AdjustmentKind::Market, market.as_str())
    }

    pub fn league_factor(&self, league: &str) -> Option<f64> {
        self.get(AdjustmentKind::League, league)
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_factor() {
        assert_eq!(clamp_factor(0.2), 0.5);
        assert_eq!(clamp_factor(3.0), 1.5);
        assert_eq!(clamp_factor(1.1), 1.1);
        assert_eq!(clamp_factor(f64::NAN), 1.0);
    }

    #[test]
    fn test_score_bucket() {
        assert_eq!(score_bucket(70.0), 70);
        assert_eq!(score_bucket(79.99), 70);
        assert_eq!(score_bucket(80.0), 80);
        assert_eq!(score_bucket(55.0), 50);
    }

    #[test]
    fn test_confidence_tier() {
        assert_eq!(ConfidenceTier::from_samples(20), ConfidenceTier::Medium);
        assert_eq!(ConfidenceTier::from_samples(30), ConfidenceTier::High);
        assert_eq!(ConfidenceTier::from_samples(14), ConfidenceTier::Low);
    }

    #[test]
    fn test_set_lookups() {
        let mut set = AdjustmentSet::new();
        set.insert(AdjustmentKind::CalibrationBucket, "70", 0.4);
        set.insert(AdjustmentKind::Market, "over_25", 1.2);
        assert_eq!(set.bucket_factor(74.0), Some(0.5));
        assert_eq!(set.bucket_factor(64.0), None);
        assert_eq!(set.market_factor(Market::Over25), Some(1.2));
        assert_eq!(set.league_factor("EPL"), None);
    }
}
