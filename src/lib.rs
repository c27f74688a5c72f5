pub mod adapters;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod error;
pub mod strategy;

pub use adapters::{BettingStore, LearningRun, MemoryStore, PostgresStore};
pub use config::AppConfig;
pub use coordinator::{run_learning_cycle, run_pick_cycle, run_scheduled, CycleReport, LearnOutcome};
pub use domain::{Adjustment, AdjustmentSet, Fixture, Market, Pick, ResolvedPick, Side, TeamStats};
pub use error::{Result, ScorelineError};
pub use strategy::{
    probabilities, score_market, AutoLearner, ClvValidator, LearningReport, MarketScorer,
    PickGenerator, ScoreOutcome,
};
