//! Learning cadence
//!
//! Learning runs when it never ran, when the maximum interval passed, or when
//! the minimum interval passed and enough new picks were resolved since.

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;

use crate::adapters::{BettingStore, LearningRun};
use crate::config::LearnerConfig;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleDecision {
    NeverRan,
    MaxIntervalElapsed,
    EnoughNewSamples,
    TooSoon,
    WaitingForSamples,
}

impl ScheduleDecision {
    pub fn is_due(&self) -> bool {
        matches!(
            self,
            ScheduleDecision::NeverRan
                | ScheduleDecision::MaxIntervalElapsed
                | ScheduleDecision::EnoughNewSamples
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleDecision::NeverRan => "never_ran",
            ScheduleDecision::MaxIntervalElapsed => "max_interval_elapsed",
            ScheduleDecision::EnoughNewSamples => "enough_new_samples",
            ScheduleDecision::TooSoon => "too_soon",
            ScheduleDecision::WaitingForSamples => "waiting_for_samples",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LearningSchedule {
    min_interval: Duration,
    max_interval: Duration,
    min_new_samples: i64,
}

impl LearningSchedule {
    pub fn new(config: &LearnerConfig) -> Self {
        Self {
            min_interval: Duration::hours(config.min_interval_hours),
            max_interval: Duration::hours(config.max_interval_hours),
            min_new_samples: config.min_new_samples,
        }
    }

    pub fn decide(
        &self,
        last: Option<&LearningRun>,
        new_samples: i64,
        now: NaiveDateTime,
    ) -> ScheduleDecision {
        let Some(last) = last else {
            return ScheduleDecision::NeverRan;
        };
        let elapsed = now - last.finished_at;
        if elapsed >= self.max_interval {
            ScheduleDecision::MaxIntervalElapsed
        } else if elapsed < self.min_interval {
            ScheduleDecision::TooSoon
        } else if new_samples >= self.min_new_samples {
            ScheduleDecision::EnoughNewSamples
        } else {
            ScheduleDecision::WaitingForSamples
        }
    }

    /// Read the last run and the resolved-pick growth since, then decide.
    pub async fn check(
        &self,
        store: &dyn BettingStore,
        now: NaiveDateTime,
    ) -> Result<ScheduleDecision> {
        let last = store.last_learning_run().await?;
        let new_samples = store
            .count_resolved(last.as_ref().map(|r| r.finished_at))
            .await?;
        Ok(self.decide(last.as_ref(), new_samples, now))
    }
}
