//! Output formatting for CLI commands.
//!
//! Supports two modes: human-readable tables (default) and JSON (--json).

use serde::Serialize;
use tabled::{Table, Tabled};

use crate::coordinator::{CycleReport, LearnOutcome, ScheduledRun};
use crate::error::Result;
use crate::strategy::{LearningReport, SegmentStats, Weakness};

/// Output mode for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Table,
    Json,
}

impl OutputMode {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            OutputMode::Json
        } else {
            OutputMode::Table
        }
    }
}

/// Print a vec of Tabled + Serialize items in the chosen mode.
pub fn print_items<T: Tabled + Serialize>(items: &[T], mode: OutputMode) -> Result<()> {
    match mode {
        OutputMode::Table => {
            if items.is_empty() {
                println!("(no results)");
            } else {
                println!("{}", Table::new(items));
            }
        }
        OutputMode::Json => println!("{}", serde_json::to_string_pretty(items)?),
    }
    Ok(())
}

#[derive(Debug, Clone, Tabled, Serialize)]
pub struct KeyValueRow {
    #[tabled(rename = "Field")]
    pub key: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

fn kv(key: &str, value: impl ToString) -> KeyValueRow {
    KeyValueRow {
        key: key.to_string(),
        value: value.to_string(),
    }
}

#[derive(Debug, Clone, Tabled, Serialize)]
pub struct SegmentRow {
    #[tabled(rename = "Segment")]
    pub target: String,
    #[tabled(rename = "N")]
    pub samples: usize,
    #[tabled(rename = "Win %")]
    pub win_rate: String,
    #[tabled(rename = "Pred %")]
    pub predicted: String,
    #[tabled(rename = "ROI %")]
    pub roi: String,
    #[tabled(rename = "CLV %")]
    pub clv: String,
    #[tabled(rename = "Factor")]
    pub factor: String,
    #[tabled(rename = "Conf")]
    pub confidence: String,
}

impl From<&SegmentStats> for SegmentRow {
    fn from(s: &SegmentStats) -> Self {
        Self {
            target: s.target.clone(),
            samples: s.samples,
            win_rate: format!("{:.1}", s.win_rate * 100.0),
            predicted: format!("{:.1}", s.avg_predicted * 100.0),
            roi: format!("{:+.1}", s.roi_pct),
            clv: s
                .avg_clv
                .map(|c| format!("{c:+.2}"))
                .unwrap_or_else(|| "-".into()),
            factor: s
                .factor
                .map(|f| format!("{f:.3}"))
                .unwrap_or_else(|| "-".into()),
            confidence: s.confidence.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Tabled, Serialize)]
pub struct WeaknessRow {
    #[tabled(rename = "Kind")]
    pub kind: String,
    #[tabled(rename = "Target")]
    pub target: String,
    #[tabled(rename = "Severity")]
    pub severity: String,
    #[tabled(rename = "Detail")]
    pub detail: String,
}

impl From<&Weakness> for WeaknessRow {
    fn from(w: &Weakness) -> Self {
        Self {
            kind: w.kind.as_str().to_string(),
            target: w.target.clone(),
            severity: w.severity.as_str().to_string(),
            detail: w.detail.clone(),
        }
    }
}

fn segment_rows(rows: &[SegmentStats]) -> Vec<SegmentRow> {
    rows.iter().map(SegmentRow::from).collect()
}

pub fn print_cycle_report(report: &CycleReport, mode: OutputMode) -> Result<()> {
    if mode == OutputMode::Json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    let rows = vec![
        kv("run_id", report.run_id),
        kv("window_hours", report.window_hours),
        kv("adjustments_loaded", report.adjustments_loaded),
        kv("matches_seen", report.matches_seen),
        kv("matches_processed", report.matches_processed),
        kv("matches_skipped", report.matches_skipped),
        kv("matches_failed", report.matches_failed),
        kv("picks_written", report.picks_written),
        kv("picks_retired", report.picks_retired),
        kv("top_k_picks", report.top_k_picks),
        kv("candidates_dropped", report.candidates_dropped),
    ];
    print_items(&rows, mode)?;
    for failure in &report.failures {
        println!("failed {}: {}", failure.match_id, failure.error);
    }
    Ok(())
}

pub fn print_learning_report(report: &LearningReport, mode: OutputMode) -> Result<()> {
    if mode == OutputMode::Json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    let summary = vec![
        kv("window_days", report.window_days),
        kv("samples", report.samples),
        kv("win_rate_pct", format!("{:.1}", report.win_rate * 100.0)),
        kv("roi_pct", format!("{:+.1}", report.roi_pct)),
        kv(
            "avg_clv_pct",
            report
                .avg_clv
                .map(|c| format!("{c:+.2}"))
                .unwrap_or_else(|| "-".into()),
        ),
        kv("ece_pct", format!("{:.2}", report.ece_pct)),
        kv("health_score", format!("{:.1}", report.health_score)),
    ];
    print_items(&summary, mode)?;

    for (title, rows) in [
        ("Calibration buckets", &report.buckets),
        ("Markets", &report.markets),
        ("Leagues", &report.leagues),
        ("Timing", &report.timing),
    ] {
        println!("\n{title}");
        print_items(&segment_rows(rows), mode)?;
    }

    println!("\nWeaknesses");
    let weaknesses: Vec<WeaknessRow> = report.weaknesses.iter().map(WeaknessRow::from).collect();
    print_items(&weaknesses, mode)
}

pub fn print_learn_outcome(outcome: &LearnOutcome, mode: OutputMode) -> Result<()> {
    if mode == OutputMode::Json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }
    println!(
        "run {}: {} adjustments written",
        outcome.run_id, outcome.adjustments_written
    );
    print_learning_report(&outcome.report, mode)
}

pub fn print_scheduled_run(run: &ScheduledRun, mode: OutputMode) -> Result<()> {
    if mode == OutputMode::Json {
        println!("{}", serde_json::to_string_pretty(run)?);
        return Ok(());
    }
    print_cycle_report(&run.picks, mode)?;
    println!("\nlearning: {}", run.learning_decision.as_str());
    match &run.learning {
        Some(outcome) => print_learn_outcome(outcome, mode),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ConfidenceTier;

    #[test]
    fn test_segment_row_formatting() {
        let stats = SegmentStats {
            target: "70".into(),
            samples: 20,
            wins: 11,
            win_rate: 0.55,
            avg_predicted: 0.74,
            roi_pct: -4.5,
            avg_clv: None,
            factor: Some(0.7432),
            confidence: ConfidenceTier::Medium,
        };
        let row = SegmentRow::from(&stats);
        assert_eq!(row.win_rate, "55.0");
        assert_eq!(row.roi, "-4.5");
        assert_eq!(row.clv, "-");
        assert_eq!(row.factor, "0.743");
        assert_eq!(row.confidence, "medium");
    }
}
