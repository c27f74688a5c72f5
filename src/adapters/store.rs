//! Store interface shared by the pick and learning cycles

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    Adjustment, Fixture, HeadToHead, Market, MatchOdds, OddsSnapshot, Pick, ResolvedPick,
    TeamStats,
};
use crate::error::Result;

/// One completed learning cycle, used by the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningRun {
    pub run_id: Uuid,
    pub started_at: NaiveDateTime,
    pub finished_at: NaiveDateTime,
    pub window_days: i32,
    pub samples: i64,
    pub adjustments_written: i64,
    pub health_score: f64,
    pub ece_pct: f64,
}

/// Everything the engine reads from or writes to persistent storage.
///
/// Timestamps are naive UTC.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BettingStore: Send + Sync {
    /// Matches kicking off in `[from, to)`, ordered by kickoff
    async fn upcoming_matches(&self, from: NaiveDateTime, to: NaiveDateTime)
        -> Result<Vec<Fixture>>;

    /// (alias, canonical) pairs
    async fn team_aliases(&self) -> Result<Vec<(String, String)>>;

    async fn team_stats(&self, team: &str) -> Result<Option<TeamStats>>;

    async fn head_to_head(&self, home: &str, away: &str) -> Result<Option<HeadToHead>>;

    async fn odds_snapshots(&self, match_id: &str) -> Result<Vec<OddsSnapshot>>;

    /// Best current price per known market across bookmakers
    async fn latest_odds(&self, match_id: &str) -> Result<MatchOdds>;

    async fn adjustments(&self) -> Result<Vec<Adjustment>>;

    /// Insert or refresh a pending pick keyed on (match_id, market).
    /// Resolved picks are never overwritten.
    async fn upsert_pick(&self, pick: &Pick) -> Result<()>;

    /// Delete the match's pending picks whose market is not in `keep`;
    /// returns how many were removed.
    async fn retire_stale_picks(&self, match_id: &str, keep: &[Market]) -> Result<usize>;

    /// Picks resolved at or after `since`
    async fn resolved_picks(&self, since: NaiveDateTime) -> Result<Vec<ResolvedPick>>;

    /// Resolved picks since `since`, or in total when `None`
    async fn count_resolved(&self, since: Option<NaiveDateTime>) -> Result<i64>;

    /// Upsert all rows atomically; returns the number written.
    async fn save_adjustments(&self, adjustments: &[Adjustment]) -> Result<usize>;

    async fn last_learning_run(&self) -> Result<Option<LearningRun>>;

    async fn record_learning_run(&self, run: &LearningRun) -> Result<()>;
}
