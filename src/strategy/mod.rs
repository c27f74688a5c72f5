//! Scoring pipeline
//!
//! - `probability` - Poisson/empirical market probabilities
//! - `clv` - closing-line-value signal from a reference bookmaker
//! - `scorer` - diamond score, edge, Kelly and sizing per market
//! - `picks` - per-match pick generation and ranking
//! - `learner` - calibration analysis over resolved picks

pub mod clv;
pub mod learner;
pub mod picks;
pub mod probability;
pub mod scorer;

pub use clv::{ClvData, ClvSignal, ClvValidator, SizingAdjustment};
pub use learner::{AutoLearner, LearningReport, SegmentStats, Severity, Weakness, WeaknessKind};
pub use picks::{MatchInput, MatchPicks, PickGenerator};
pub use probability::{probabilities, ExpectedGoals, ProbabilityVector};
pub use scorer::{
    score_market, MarketScorer, RejectReason, ScoreOutcome, ScoreRequest, ScoredMarket, Sizing,
};
