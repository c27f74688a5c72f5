use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::Market;

/// Tag written on every pick produced by this engine
pub const PICK_SOURCE: &str = "scoreline";

/// Rating label derived from the final score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Rating {
    Marginal,
    Fair,
    Good,
    VeryGood,
    Excellent,
}

impl Rating {
    pub fn from_score(score: f64) -> Self {
        if score >= 75.0 {
            Rating::Excellent
        } else if score >= 68.0 {
            Rating::VeryGood
        } else if score >= 60.0 {
            Rating::Good
        } else if score >= 50.0 {
            Rating::Fair
        } else {
            Rating::Marginal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Marginal => "MARGINAL",
            Rating::Fair => "FAIR",
            Rating::Good => "GOOD",
            Rating::VeryGood => "VERY_GOOD",
            Rating::Excellent => "EXCELLENT",
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stake bucket recommended for a pick, ordered from smallest to largest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SizingTier {
    Skip,
    Small,
    Normal,
    Max,
}

impl SizingTier {
    pub fn promote(self) -> Self {
        match self {
            SizingTier::Skip => SizingTier::Small,
            SizingTier::Small => SizingTier::Normal,
            SizingTier::Normal | SizingTier::Max => SizingTier::Max,
        }
    }

    pub fn demote(self) -> Self {
        match self {
            SizingTier::Max => SizingTier::Normal,
            SizingTier::Normal => SizingTier::Small,
            SizingTier::Small | SizingTier::Skip => SizingTier::Skip,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SizingTier::Skip => "SKIP",
            SizingTier::Small => "SMALL",
            SizingTier::Normal => "NORMAL",
            SizingTier::Max => "MAX",
        }
    }
}

impl fmt::Display for SizingTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 75.0 {
            ConfidenceLevel::High
        } else if score >= 65.0 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::Low => "LOW",
            ConfidenceLevel::Medium => "MEDIUM",
            ConfidenceLevel::High => "HIGH",
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle of a stored pick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PickStatus {
    /// Written by the pick generator, match not settled yet
    Pending,
    /// Settled by the external settlement ingester (terminal)
    Resolved,
}

impl PickStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PickStatus::Pending => "pending",
            PickStatus::Resolved => "resolved",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PickStatus::Resolved)
    }
}

/// A proposed bet on one market of one match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pick {
    pub match_id: String,
    pub home_team: String,
    pub away_team: String,
    pub league: String,
    pub kickoff: NaiveDateTime,
    pub market: Market,
    pub selection: String,
    pub odds: f64,
    pub predicted_probability: f64,
    pub implied_probability: f64,
    pub edge_pct: f64,
    pub kelly_pct: f64,
    pub diamond_score: i32,
    pub rating: Rating,
    pub confidence: ConfidenceLevel,
    pub sizing: SizingTier,
    /// Explanatory inputs (xG, form, data quality, CLV signal, warnings)
    pub factors: BTreeMap<String, serde_json::Value>,
    pub is_top_k: bool,
    pub source: String,
    pub status: PickStatus,
    pub created_at: NaiveDateTime,
}

impl Pick {
    /// Natural upsert key
    pub fn key(&self) -> (String, Market) {
        (self.match_id.clone(), self.market)
    }
}

/// A settled pick as read back by the learner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedPick {
    pub match_id: String,
    pub market: Market,
    pub league: String,
    pub odds: f64,
    pub predicted_probability: f64,
    pub diamond_score: i32,
    pub won: bool,
    /// CLV in percent against the closing line, when it was tracked
    pub clv_pct: Option<f64>,
    pub hours_before_kickoff: Option<f64>,
    pub resolved_at: NaiveDateTime,
}

impl ResolvedPick {
    /// Profit in units for a one-unit stake
    pub fn profit(&self) -> f64 {
        if self.won {
            self.odds - 1.0
        } else {
            -1.0
        }
    }
}
