//! Learning cycle
//!
//! Reads resolved picks in the trailing window, derives adjustments and writes
//! them in one transaction. An empty window writes nothing and leaves the
//! existing adjustments in place.

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use std::time::Instant;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::adapters::{BettingStore, LearningRun};
use super::elapsed;
use crate::config::LearnerConfig;
use crate::error::Result;
use crate::strategy::{AutoLearner, LearningReport, Severity};

#[derive(Debug, Clone, Serialize)]
pub struct LearnOutcome {
    pub run_id: Uuid,
    pub adjustments_written: usize,
    pub report: LearningReport,
}

/// Analyse the last `window_days` of resolved picks without writing anything.
pub async fn analyze_window(
    store: &dyn BettingStore,
    config: &LearnerConfig,
    window_days: u32,
    now: NaiveDateTime,
) -> Result<LearningReport> {
    let since = now - Duration::days(window_days as i64);
    let picks = store.resolved_picks(since).await?;
    Ok(AutoLearner::new(config.min_samples).analyze(&picks, window_days, now))
}

#[instrument(skip(store, config))]
pub async fn run_learning_cycle(
    store: &dyn BettingStore,
    config: &LearnerConfig,
    window_days: u32,
    now: NaiveDateTime,
) -> Result<LearnOutcome> {
    let run_id = Uuid::new_v4();
    let clock = Instant::now();
    let report = analyze_window(store, config, window_days, now).await?;

    let adjustments = report.adjustments();
    let adjustments_written = if adjustments.is_empty() {
        info!(%run_id, samples = report.samples, "No adjustments derived, keeping existing ones");
        0
    } else {
        store.save_adjustments(&adjustments).await?
    };

    store
        .record_learning_run(&LearningRun {
            run_id,
            started_at: now,
            finished_at: now + elapsed(clock),
            window_days: window_days as i32,
            samples: report.samples as i64,
            adjustments_written: adjustments_written as i64,
            health_score: report.health_score,
            ece_pct: report.ece_pct,
        })
        .await?;

    for weakness in &report.weaknesses {
        warn!(
            %run_id,
            kind = weakness.kind.as_str(),
            target = %weakness.target,
            severity = %weakness.severity,
            detail = %weakness.detail,
            "Weakness detected"
        );
    }

    let weakness_list: Vec<String> = report
        .weaknesses
        .iter()
        .map(|w| format!("{}:{}", w.kind.as_str(), w.target))
        .collect();
    info!(
        %run_id,
        samples = report.samples,
        adjustments = adjustments_written,
        ece_pct = report.ece_pct,
        health = report.health_score,
        high = report.count_severity(Severity::High),
        medium = report.count_severity(Severity::Medium),
        weaknesses = ?weakness_list,
        "Learning cycle finished"
    );

    Ok(LearnOutcome {
        run_id,
        adjustments_written,
        report,
    })
}
