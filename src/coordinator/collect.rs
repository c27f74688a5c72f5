//! Pick cycle
//!
//! Snapshots adjustments and aliases once, then scores every match in the
//! upcoming window. A failing match is counted and skipped; only store-fatal
//! errors abort the cycle.

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::elapsed;
use crate::adapters::BettingStore;
use crate::config::PipelineConfig;
use crate::domain::{AdjustmentSet, Fixture, TeamResolver};
use crate::error::{Result, ScorelineError};
use crate::strategy::{ClvValidator, MarketScorer, MatchInput, PickGenerator};

#[derive(Debug, Clone, Serialize)]
pub struct MatchFailure {
    pub match_id: String,
    pub error: String,
}

/// Structured summary of one pick cycle
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub run_id: Uuid,
    pub started_at: NaiveDateTime,
    pub finished_at: NaiveDateTime,
    pub window_hours: u32,
    pub adjustments_loaded: usize,
    pub matches_seen: usize,
    pub matches_processed: usize,
    pub matches_skipped: usize,
    pub matches_failed: usize,
    pub picks_written: usize,
    /// Pending picks deleted because their market no longer passes policy
    pub picks_retired: usize,
    pub top_k_picks: usize,
    pub candidates_dropped: usize,
    pub failures: Vec<MatchFailure>,
}

struct MatchOutcome {
    picks_written: usize,
    retired: usize,
    top_k: usize,
    dropped: usize,
}

/// Run one pick cycle over matches kicking off within `hours_ahead` of `now`.
#[instrument(skip(store, config), fields(hours = config.hours_ahead))]
pub async fn run_pick_cycle(
    store: &dyn BettingStore,
    config: &PipelineConfig,
    now: NaiveDateTime,
) -> Result<CycleReport> {
    let run_id = Uuid::new_v4();
    let clock = Instant::now();

    let adjustments = store.adjustments().await?;
    let resolver = TeamResolver::from_pairs(store.team_aliases().await?);
    let fixtures = store
        .upcoming_matches(now, now + Duration::hours(config.hours_ahead as i64))
        .await?;

    info!(
        %run_id,
        matches = fixtures.len(),
        adjustments = adjustments.len(),
        aliases = resolver.len(),
        "Pick cycle started"
    );

    let generator = PickGenerator::new(
        MarketScorer::new(AdjustmentSet::from_adjustments(&adjustments)),
        ClvValidator::new(&config.gold_bookmaker),
        config.min_score,
        config.top_k,
    );

    let mut report = CycleReport {
        run_id,
        started_at: now,
        finished_at: now,
        window_hours: config.hours_ahead,
        adjustments_loaded: adjustments.len(),
        matches_seen: fixtures.len(),
        matches_processed: 0,
        matches_skipped: 0,
        matches_failed: 0,
        picks_written: 0,
        picks_retired: 0,
        top_k_picks: 0,
        candidates_dropped: 0,
        failures: Vec::new(),
    };

    for fixture in &fixtures {
        match process_match(store, &generator, &resolver, fixture, now).await {
            Ok(outcome) => {
                report.matches_processed += 1;
                report.picks_written += outcome.picks_written;
                report.picks_retired += outcome.retired;
                report.top_k_picks += outcome.top_k;
                report.candidates_dropped += outcome.dropped;
            }
            Err(ScorelineError::InputMissing(reason)) => {
                debug!(match_id = %fixture.match_id, %reason, "Skipping match");
                report.matches_skipped += 1;
            }
            Err(e) if e.is_fatal() => {
                error!(%run_id, match_id = %fixture.match_id, error = %e, "Store-fatal error, aborting cycle");
                return Err(e);
            }
            Err(e) => {
                warn!(match_id = %fixture.match_id, error = %e, "Match failed");
                report.matches_failed += 1;
                report.failures.push(MatchFailure {
                    match_id: fixture.match_id.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    report.finished_at = now + elapsed(clock);

    info!(
        %run_id,
        matches_seen = report.matches_seen,
        processed = report.matches_processed,
        skipped = report.matches_skipped,
        failed = report.matches_failed,
        picks = report.picks_written,
        retired = report.picks_retired,
        top_k = report.top_k_picks,
        dropped = report.candidates_dropped,
        "Pick cycle finished"
    );

    Ok(report)
}

async fn process_match(
    store: &dyn BettingStore,
    generator: &PickGenerator,
    resolver: &TeamResolver,
    fixture: &Fixture,
    now: NaiveDateTime,
) -> Result<MatchOutcome> {
    let fixture = Fixture {
        home_team: resolver.resolve(&fixture.home_team),
        away_team: resolver.resolve(&fixture.away_team),
        ..fixture.clone()
    };

    let home_stats = store.team_stats(&fixture.home_team).await?;
    let away_stats = store.team_stats(&fixture.away_team).await?;
    let h2h = store
        .head_to_head(&fixture.home_team, &fixture.away_team)
        .await?;
    let odds = store.latest_odds(&fixture.match_id).await?;
    let snapshots = store.odds_snapshots(&fixture.match_id).await?;

    let input = MatchInput {
        fixture: &fixture,
        home_stats: home_stats.as_ref(),
        away_stats: away_stats.as_ref(),
        h2h: h2h.as_ref(),
        odds: &odds,
        snapshots: &snapshots,
    };
    let generated = generator.generate(&input, now)?;

    let mut outcome = MatchOutcome {
        picks_written: 0,
        retired: 0,
        top_k: 0,
        dropped: generated.dropped,
    };
    for pick in &generated.picks {
        store.upsert_pick(pick).await?;
        outcome.picks_written += 1;
        if pick.is_top_k {
            outcome.top_k += 1;
        }
    }
    let keep: Vec<_> = generated.picks.iter().map(|p| p.market).collect();
    outcome.retired = store
        .retire_stale_picks(&fixture.match_id, &keep)
        .await?;

    debug!(
        match_id = %fixture.match_id,
        fixture = %fixture.label(),
        picks = outcome.picks_written,
        clv = generated.clv.as_ref().map(|c| c.signal.as_str()).unwrap_or("NONE"),
        "Match scored"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockBettingStore;
    use crate::domain::{Market, MatchOdds, TeamStats};
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 4, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn fixture(id: &str, home: &str, away: &str) -> Fixture {
        Fixture {
            match_id: id.into(),
            home_team: home.into(),
            away_team: away.into(),
            kickoff: now() + Duration::hours(20),
            league: "EPL".into(),
        }
    }

    fn base_mock() -> MockBettingStore {
        let mut store = MockBettingStore::new();
        store.expect_adjustments().returning(|| Ok(vec![]));
        store.expect_team_aliases().returning(|| Ok(vec![]));
        store.expect_upcoming_matches().returning(|_, _| {
            Ok(vec![
                fixture("ok", "Arsenal", "Chelsea"),
                fixture("broken", "Leeds", "Fulham"),
                fixture("empty", "Ghost", "Phantom"),
            ])
        });
        store.expect_head_to_head().returning(|_, _| Ok(None));
        store.expect_odds_snapshots().returning(|_| Ok(vec![]));
        store.expect_latest_odds().returning(|_| {
            Ok([(Market::Over25, 2.0), (Market::BttsYes, 2.1)]
                .into_iter()
                .collect::<MatchOdds>())
        });
        store
    }

    #[tokio::test]
    async fn test_failures_are_counted_and_cycle_continues() {
        let mut store = base_mock();
        store.expect_team_stats().returning(|team| match team {
            "Leeds" => Err(ScorelineError::StoreTimeout {
                op: "team_stats".into(),
            }),
            "Ghost" | "Phantom" => Ok(None),
            other => Ok(Some(TeamStats {
                over25_pct: 65.0,
                btts_pct: 62.0,
                ..TeamStats::league_default(other)
            })),
        });
        store.expect_upsert_pick().returning(|_| Ok(()));
        store
            .expect_retire_stale_picks()
            .withf(|match_id, _| match_id == "ok")
            .times(1)
            .returning(|_, _| Ok(0));

        let report = run_pick_cycle(&store, &PipelineConfig::default(), now())
            .await
            .unwrap();
        assert_eq!(report.matches_seen, 3);
        assert_eq!(report.matches_processed, 1);
        assert_eq!(report.matches_failed, 1);
        assert_eq!(report.matches_skipped, 1);
        assert_eq!(report.failures[0].match_id, "broken");
        assert!(report.picks_written > 0);
    }

    #[tokio::test]
    async fn test_fatal_error_aborts() {
        let mut store = base_mock();
        store.expect_team_stats().returning(|_| {
            Err(ScorelineError::InvalidConfig("credentials rejected".into()))
        });
        let err = run_pick_cycle(&store, &PipelineConfig::default(), now())
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_snapshot_load_failure_fails_cycle() {
        let mut store = MockBettingStore::new();
        store.expect_adjustments().returning(|| {
            Err(ScorelineError::StoreTimeout {
                op: "adjustments".into(),
            })
        });
        assert!(run_pick_cycle(&store, &PipelineConfig::default(), now())
            .await
            .is_err());
    }
}
