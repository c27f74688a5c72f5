//! Cycle orchestration
//!
//! The pick cycle and the learning cycle share nothing in memory; they meet
//! only through the adjustment store.

pub mod collect;
pub mod learn;
pub mod schedule;

pub use collect::{run_pick_cycle, CycleReport, MatchFailure};
pub use learn::{analyze_window, run_learning_cycle, LearnOutcome};
pub use schedule::{LearningSchedule, ScheduleDecision};

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use std::time::Instant;
use tracing::info;

use crate::adapters::BettingStore;
use crate::config::AppConfig;
use crate::error::Result;

/// Result of a scheduled run: a pick cycle, then learning when due.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduledRun {
    pub picks: CycleReport,
    pub learning_decision: ScheduleDecision,
    pub learning: Option<LearnOutcome>,
}

pub async fn run_scheduled(
    store: &dyn BettingStore,
    config: &AppConfig,
    now: NaiveDateTime,
) -> Result<ScheduledRun> {
    let picks = run_pick_cycle(store, &config.pipeline, now).await?;

    let decision = LearningSchedule::new(&config.learner)
        .check(store, now)
        .await?;
    let learning = if decision.is_due() {
        Some(run_learning_cycle(store, &config.learner, config.learner.window_days, now).await?)
    } else {
        info!(decision = decision.as_str(), "Learning not due");
        None
    };

    Ok(ScheduledRun {
        picks,
        learning_decision: decision,
        learning,
    })
}

/// Wall time spent since `clock`, for stamping run end times off the cycle's `now`.
fn elapsed(clock: Instant) -> Duration {
    Duration::from_std(clock.elapsed()).unwrap_or_else(|_| Duration::zero())
}
