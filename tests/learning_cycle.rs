use chrono::{Duration, NaiveDate, NaiveDateTime};
use scoreline::adapters::{BettingStore, MemoryStore};
use scoreline::config::{AppConfig, DatabaseConfig, LearnerConfig, LoggingConfig, PipelineConfig};
use scoreline::coordinator::{run_learning_cycle, run_pick_cycle, run_scheduled, ScheduleDecision};
use scoreline::domain::{
    Adjustment, AdjustmentKind, ConfidenceTier, Fixture, HeadToHead, Market, ResolvedPick,
    TeamStats,
};

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 5, 1)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap()
}

fn resolved(market: Market, score: i32, won: bool, days_ago: i64) -> ResolvedPick {
    ResolvedPick {
        match_id: format!("r{score}{days_ago}{won}"),
        market,
        league: "EPL".into(),
        odds: 1.9,
        predicted_probability: 0.6,
        diamond_score: score,
        won,
        clv_pct: Some(1.5),
        hours_before_kickoff: Some(20.0),
        resolved_at: now() - Duration::days(days_ago),
    }
}

fn app_config() -> AppConfig {
    AppConfig {
        database: DatabaseConfig {
            host: "localhost".into(),
            port: 5432,
            name: "scoreline".into(),
            user: "scoreline".into(),
            password: String::new(),
            max_connections: 1,
            statement_timeout_ms: 1_000,
            connect_timeout_ms: 1_000,
        },
        pipeline: PipelineConfig::default(),
        learner: LearnerConfig::default(),
        logging: LoggingConfig::default(),
    }
}

#[tokio::test]
async fn test_learning_writes_segment_adjustments() {
    let store = MemoryStore::new();
    for (i, won) in [true, false, true, false, true, false].into_iter().enumerate() {
        store
            .add_resolved_pick(resolved(Market::Over25, 72, won, i as i64 + 1))
            .await;
    }
    // outside the window
    store
        .add_resolved_pick(resolved(Market::BttsYes, 62, true, 90))
        .await;

    let outcome = run_learning_cycle(&store, &LearnerConfig::default(), 60, now())
        .await
        .unwrap();
    assert_eq!(outcome.report.samples, 6);
    assert_eq!(outcome.adjustments_written, 4);

    let adjustments = store.adjustments().await.unwrap();
    let find = |kind: AdjustmentKind, target: &str| {
        adjustments
            .iter()
            .find(|a| a.kind == kind && a.target == target)
            .map(|a| a.factor)
    };
    let expected = 0.5 / 0.6;
    for (kind, target) in [
        (AdjustmentKind::CalibrationBucket, "70"),
        (AdjustmentKind::Market, "over_25"),
        (AdjustmentKind::League, "EPL"),
        (AdjustmentKind::Other, "timing:12-24h"),
    ] {
        let factor = find(kind, target).unwrap();
        assert!((factor - expected).abs() < 1e-6, "{target}: {factor}");
    }
    assert!(find(AdjustmentKind::Market, "btts_yes").is_none());

    let runs = store.learning_runs().await;
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].samples, 6);
    assert_eq!(runs[0].adjustments_written, 4);
}

#[tokio::test]
async fn test_empty_window_keeps_existing_adjustments() {
    let store = MemoryStore::new();
    store
        .save_adjustments(&[Adjustment {
            kind: AdjustmentKind::Market,
            target: "over_25".into(),
            factor: 1.2,
            sample_size: 40,
            win_rate: 0.62,
            avg_clv: Some(2.0),
            confidence: ConfidenceTier::High,
            updated_at: now() - Duration::days(3),
        }])
        .await
        .unwrap();

    let outcome = run_learning_cycle(&store, &LearnerConfig::default(), 60, now())
        .await
        .unwrap();
    assert!(outcome.report.is_empty());
    assert_eq!(outcome.adjustments_written, 0);

    let adjustments = store.adjustments().await.unwrap();
    assert_eq!(adjustments.len(), 1);
    assert_eq!(adjustments[0].factor, 1.2);
    assert_eq!(store.learning_runs().await.len(), 1);
}

#[tokio::test]
async fn test_settled_losses_feed_the_next_cycle() {
    let store = MemoryStore::new();
    let kickoff = now() + Duration::hours(20);
    for (id, offset) in [("m1", 0), ("m2", 30)] {
        store
            .add_fixture(Fixture {
                match_id: id.into(),
                home_team: "Arsenal".into(),
                away_team: "Chelsea".into(),
                kickoff: kickoff + Duration::hours(offset),
                league: "EPL".into(),
            })
            .await;
        store.set_odds(id, Market::Over25, 1.85).await;
    }
    store
        .set_team_stats(TeamStats {
            home_scored_avg: 1.5,
            home_conceded_avg: 1.1,
            over25_pct: 60.0,
            btts_pct: 55.0,
            data_quality: 85.0,
            ..TeamStats::league_default("Arsenal")
        })
        .await;
    store
        .set_team_stats(TeamStats {
            away_scored_avg: 1.1,
            away_conceded_avg: 1.4,
            over25_pct: 58.0,
            btts_pct: 60.0,
            data_quality: 75.0,
            ..TeamStats::league_default("Chelsea")
        })
        .await;
    store
        .set_head_to_head(HeadToHead {
            home_team: "Arsenal".into(),
            away_team: "Chelsea".into(),
            matches: 6,
            btts_pct: 67.0,
            over25_pct: 67.0,
            avg_total_goals: 2.9,
            home_wins: 3,
            away_wins: 1,
            draws: 2,
        })
        .await;

    let first = run_pick_cycle(&store, &PipelineConfig::default(), now())
        .await
        .unwrap();
    assert_eq!(first.adjustments_loaded, 0);
    let before = store
        .picks()
        .await
        .into_iter()
        .find(|p| p.match_id == "m1" && p.market == Market::Over25)
        .unwrap();

    let settled_at = kickoff + Duration::hours(2);
    assert_eq!(store.settle("m1", 0, 0, Some(-3.0), settled_at).await, 1);

    let learner = LearnerConfig {
        min_samples: 1,
        ..LearnerConfig::default()
    };
    let later = settled_at + Duration::hours(1);
    let outcome = run_learning_cycle(&store, &learner, 60, later)
        .await
        .unwrap();
    assert_eq!(outcome.report.samples, 1);
    assert!(outcome.adjustments_written > 0);

    let second = run_pick_cycle(&store, &PipelineConfig::default(), later)
        .await
        .unwrap();
    assert!(second.adjustments_loaded > 0);

    let picks = store.picks().await;
    let resolved = picks.iter().find(|p| p.match_id == "m1").unwrap();
    assert_eq!(resolved.diamond_score, before.diamond_score);
    // the only sample lost, so every factor sits at its floor and m2 drops out
    assert_eq!(second.matches_processed, 1);
    assert_eq!(second.candidates_dropped, 1);
    assert!(picks.iter().all(|p| p.match_id != "m2"));
}

#[tokio::test]
async fn test_scheduled_runs_follow_the_learning_schedule() {
    let store = MemoryStore::new();
    let config = app_config();

    let first = run_scheduled(&store, &config, now()).await.unwrap();
    assert_eq!(first.learning_decision, ScheduleDecision::NeverRan);
    assert!(first.learning.is_some());

    let soon = now() + Duration::hours(2);
    let second = run_scheduled(&store, &config, soon).await.unwrap();
    assert!(!second.learning_decision.is_due());
    assert!(second.learning.is_none());

    let week_later = now() + Duration::hours(config.learner.max_interval_hours + 1);
    let third = run_scheduled(&store, &config, week_later).await.unwrap();
    assert_eq!(third.learning_decision, ScheduleDecision::MaxIntervalElapsed);
    assert!(third.learning.is_some());
    assert_eq!(store.learning_runs().await.len(), 2);
}
