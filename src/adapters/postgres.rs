use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use super::store::{BettingStore, LearningRun};
use crate::config::DatabaseConfig;
use crate::domain::{
    Adjustment, AdjustmentKind, ConfidenceTier, Fixture, HeadToHead, Market, MatchOdds,
    OddsSnapshot, Pick, ResolvedPick, Side, TeamStats,
};
use crate::error::{Result, ScorelineError};

/// PostgreSQL storage adapter
///
/// Every call runs under a per-call timeout. A transient failure (closed
/// connection, pool timeout, statement timeout) rebuilds the pool and retries
/// the call once.
pub struct PostgresStore {
    pool: RwLock<PgPool>,
    options: PgConnectOptions,
    max_connections: u32,
    connect_timeout: Duration,
    call_timeout: Duration,
}

impl PostgresStore {
    /// Connect using the store section of the configuration
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.name)
            .username(&config.user)
            .password(&config.password)
            .options([("statement_timeout", config.statement_timeout_ms.to_string())]);

        let pool = Self::open_pool(&options, config.max_connections, config.connect_timeout())
            .await?;
        info!(host = %config.host, db = %config.name, "Connected to PostgreSQL");

        Ok(Self {
            pool: RwLock::new(pool),
            options,
            max_connections: config.max_connections,
            connect_timeout: config.connect_timeout(),
            call_timeout: config.statement_timeout(),
        })
    }

    async fn open_pool(
        options: &PgConnectOptions,
        max_connections: u32,
        connect_timeout: Duration,
    ) -> Result<PgPool> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(connect_timeout)
            .connect_with(options.clone())
            .await?;
        Ok(pool)
    }

    /// Run migrations
    pub async fn migrate(&self) -> Result<()> {
        let pool = self.pool().await;
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Database migrations completed");
        Ok(())
    }

    async fn pool(&self) -> PgPool {
        self.pool.read().await.clone()
    }

    async fn reconnect(&self) -> Result<()> {
        let fresh =
            Self::open_pool(&self.options, self.max_connections, self.connect_timeout).await?;
        let stale = std::mem::replace(&mut *self.pool.write().await, fresh);
        stale.close().await;
        info!("Reconnected to PostgreSQL");
        Ok(())
    }

    async fn timed<T, Fut>(&self, op: &'static str, fut: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(ScorelineError::StoreTimeout { op: op.to_string() }),
        }
    }

    /// Run `call` against the current pool, reconnecting and retrying once on a
    /// transient failure.
    async fn with_retry<T, F, Fut>(&self, op: &'static str, call: F) -> Result<T>
    where
        F: Fn(PgPool) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let call = &call;
        let this = self;
        retry_transient(
            op,
            move || async move { this.timed(op, call(this.pool().await)).await },
            move || self.reconnect(),
        )
        .await
    }
}

/// Run `attempt`; on a transient failure run `recover` and attempt exactly
/// once more. Non-transient failures and a failed recovery are returned as is.
async fn retry_transient<T, A, AFut, R, RFut>(op: &'static str, attempt: A, recover: R) -> Result<T>
where
    A: Fn() -> AFut,
    AFut: Future<Output = Result<T>>,
    R: FnOnce() -> RFut,
    RFut: Future<Output = Result<()>>,
{
    match attempt().await {
        Err(err) if err.is_transient() => {
            warn!(op, error = %err, "Transient store failure, reconnecting");
            recover().await?;
            attempt().await
        }
        other => other,
    }
}

fn fixture_from_row(r: &PgRow) -> Fixture {
    Fixture {
        match_id: r.get("match_id"),
        home_team: r.get("home_team"),
        away_team: r.get("away_team"),
        kickoff: r.get("kickoff"),
        league: r.get("league"),
    }
}

fn team_stats_from_row(r: &PgRow) -> TeamStats {
    TeamStats {
        team: r.get("team"),
        matches_played: r.get("matches_played"),
        goals_for_avg: r.get("goals_for_avg"),
        goals_against_avg: r.get("goals_against_avg"),
        home_scored_avg: r.get("home_scored_avg"),
        home_conceded_avg: r.get("home_conceded_avg"),
        away_scored_avg: r.get("away_scored_avg"),
        away_conceded_avg: r.get("away_conceded_avg"),
        btts_pct: r.get("btts_pct"),
        over15_pct: r.get("over15_pct"),
        over25_pct: r.get("over25_pct"),
        over35_pct: r.get("over35_pct"),
        clean_sheet_pct: r.get("clean_sheet_pct"),
        failed_to_score_pct: r.get("failed_to_score_pct"),
        form_last5: r.get("form_last5"),
        form_points: r.get("form_points"),
        last5_btts_pct: r.get("last5_btts_pct"),
        last5_over25_pct: r.get("last5_over25_pct"),
        data_quality: r.get("data_quality"),
    }
}

fn adjustment_from_row(r: &PgRow) -> Option<Adjustment> {
    let kind: String = r.get("kind");
    let confidence: String = r.get("confidence");
    Some(Adjustment {
        kind: AdjustmentKind::from_str(&kind).ok()?,
        target: r.get("target"),
        factor: r.get("factor"),
        sample_size: r.get("sample_size"),
        win_rate: r.get("win_rate"),
        avg_clv: r.get("avg_clv"),
        confidence: ConfidenceTier::from_str(&confidence).unwrap_or(ConfidenceTier::Low),
        updated_at: r.get("updated_at"),
    })
}

#[async_trait]
impl BettingStore for PostgresStore {
    #[instrument(skip(self))]
    async fn upcoming_matches(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Fixture>> {
        self.with_retry("upcoming_matches", |pool| async move {
            let rows = sqlx::query(
                r#"
                SELECT match_id, home_team, away_team, kickoff, league
                FROM matches
                WHERE kickoff >= $1 AND kickoff < $2
                ORDER BY kickoff, match_id
                "#,
            )
            .bind(from)
            .bind(to)
            .fetch_all(&pool)
            .await?;

            Ok::<_, ScorelineError>(rows.iter().map(fixture_from_row).collect())
        })
        .await
    }

    #[instrument(skip(self))]
    async fn team_aliases(&self) -> Result<Vec<(String, String)>> {
        self.with_retry("team_aliases", |pool| async move {
            let rows = sqlx::query("SELECT alias, canonical FROM team_aliases ORDER BY alias")
                .fetch_all(&pool)
                .await?;
            Ok::<_, ScorelineError>(rows
                .iter()
                .map(|r| (r.get("alias"), r.get("canonical")))
                .collect())
        })
        .await
    }

    #[instrument(skip(self))]
    async fn team_stats(&self, team: &str) -> Result<Option<TeamStats>> {
        self.with_retry("team_stats", |pool| async move {
            let row = sqlx::query(
                r#"
                SELECT team, matches_played, goals_for_avg, goals_against_avg,
                       home_scored_avg, home_conceded_avg, away_scored_avg, away_conceded_avg,
                       btts_pct, over15_pct, over25_pct, over35_pct,
                       clean_sheet_pct, failed_to_score_pct,
                       form_last5, form_points, last5_btts_pct, last5_over25_pct, data_quality
                FROM team_stats_live
                WHERE team = $1
                "#,
            )
            .bind(team)
            .fetch_optional(&pool)
            .await?;

            Ok::<_, ScorelineError>(row.as_ref().map(team_stats_from_row))
        })
        .await
    }

    #[instrument(skip(self))]
    async fn head_to_head(&self, home: &str, away: &str) -> Result<Option<HeadToHead>> {
        self.with_retry("head_to_head", |pool| async move {
            let row = sqlx::query(
                r#"
                SELECT home_team, away_team, matches, btts_pct, over25_pct, avg_total_goals,
                       home_wins, away_wins, draws
                FROM team_head_to_head
                WHERE home_team = $1 AND away_team = $2
                "#,
            )
            .bind(home)
            .bind(away)
            .fetch_optional(&pool)
            .await?;

            Ok::<_, ScorelineError>(row.map(|r| HeadToHead {
                home_team: r.get("home_team"),
                away_team: r.get("away_team"),
                matches: r.get("matches"),
                btts_pct: r.get("btts_pct"),
                over25_pct: r.get("over25_pct"),
                avg_total_goals: r.get("avg_total_goals"),
                home_wins: r.get("home_wins"),
                away_wins: r.get("away_wins"),
                draws: r.get("draws"),
            }))
        })
        .await
    }

    #[instrument(skip(self))]
    async fn odds_snapshots(&self, match_id: &str) -> Result<Vec<OddsSnapshot>> {
        self.with_retry("odds_snapshots", |pool| async move {
            let rows = sqlx::query(
                r#"
                SELECT match_id, bookmaker, market, outcome, odds, captured_at
                FROM odds_snapshots
                WHERE match_id = $1
                ORDER BY captured_at
                "#,
            )
            .bind(match_id)
            .fetch_all(&pool)
            .await?;

            Ok::<_, ScorelineError>(rows
                .iter()
                .filter_map(|r| {
                    let outcome: String = r.get("outcome");
                    let outcome = Side::from_str(&outcome).ok()?;
                    Some(OddsSnapshot {
                        match_id: r.get("match_id"),
                        bookmaker: r.get("bookmaker"),
                        market: r.get("market"),
                        outcome,
                        odds: r.get("odds"),
                        captured_at: r.get("captured_at"),
                    })
                })
                .collect())
        })
        .await
    }

    #[instrument(skip(self))]
    async fn latest_odds(&self, match_id: &str) -> Result<MatchOdds> {
        self.with_retry("latest_odds", |pool| async move {
            let rows = sqlx::query("SELECT market, odds FROM odds_latest WHERE match_id = $1")
                .bind(match_id)
                .fetch_all(&pool)
                .await?;

            let mut odds = MatchOdds::new();
            for r in &rows {
                let raw: String = r.get("market");
                match Market::from_str(&raw) {
                    Ok(market) => odds.offer(market, r.get("odds")),
                    Err(_) => debug!(match_id, market = %raw, "Skipping unknown market"),
                }
            }
            Ok::<_, ScorelineError>(odds)
        })
        .await
    }

    #[instrument(skip(self))]
    async fn adjustments(&self) -> Result<Vec<Adjustment>> {
        self.with_retry("adjustments", |pool| async move {
            let rows = sqlx::query(
                r#"
                SELECT kind, target, factor, sample_size, win_rate, avg_clv, confidence, updated_at
                FROM adjustments
                ORDER BY kind, target
                "#,
            )
            .fetch_all(&pool)
            .await?;

            Ok::<_, ScorelineError>(rows.iter().filter_map(adjustment_from_row).collect())
        })
        .await
    }

    #[instrument(skip(self, pick), fields(match_id = %pick.match_id, market = %pick.market))]
    async fn upsert_pick(&self, pick: &Pick) -> Result<()> {
        let factors = serde_json::to_value(&pick.factors)?;
        self.with_retry("upsert_pick", |pool| {
            let factors = factors.clone();
            async move {
                sqlx::query(
                    r#"
                    INSERT INTO picks (
                        match_id, home_team, away_team, league, kickoff, market, selection,
                        odds, predicted_probability, implied_probability, edge_pct, kelly_pct,
                        diamond_score, rating, confidence, sizing, factors, is_top_k, source,
                        status, created_at, updated_at
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                            $16, $17, $18, $19, $20, $21, $21)
                    ON CONFLICT (match_id, market) DO UPDATE SET
                        odds = EXCLUDED.odds,
                        predicted_probability = EXCLUDED.predicted_probability,
                        implied_probability = EXCLUDED.implied_probability,
                        edge_pct = EXCLUDED.edge_pct,
                        kelly_pct = EXCLUDED.kelly_pct,
                        diamond_score = EXCLUDED.diamond_score,
                        rating = EXCLUDED.rating,
                        confidence = EXCLUDED.confidence,
                        sizing = EXCLUDED.sizing,
                        factors = EXCLUDED.factors,
                        is_top_k = EXCLUDED.is_top_k,
                        updated_at = EXCLUDED.updated_at
                    WHERE picks.status = 'pending'
                    "#,
                )
                .bind(&pick.match_id)
                .bind(&pick.home_team)
                .bind(&pick.away_team)
                .bind(&pick.league)
                .bind(pick.kickoff)
                .bind(pick.market.as_str())
                .bind(&pick.selection)
                .bind(pick.odds)
                .bind(pick.predicted_probability)
                .bind(pick.implied_probability)
                .bind(pick.edge_pct)
                .bind(pick.kelly_pct)
                .bind(pick.diamond_score)
                .bind(pick.rating.as_str())
                .bind(pick.confidence.as_str())
                .bind(pick.sizing.as_str())
                .bind(factors)
                .bind(pick.is_top_k)
                .bind(&pick.source)
                .bind(pick.status.as_str())
                .bind(pick.created_at)
                .execute(&pool)
                .await?;
                Ok::<_, ScorelineError>(())
            }
        })
        .await
    }

    #[instrument(skip(self))]
    async fn retire_stale_picks(&self, match_id: &str, keep: &[Market]) -> Result<usize> {
        let keep: Vec<String> = keep.iter().map(|m| m.as_str().to_string()).collect();
        self.with_retry("retire_stale_picks", |pool| {
            let keep = keep.clone();
            async move {
                let result = sqlx::query(
                    r#"
                    DELETE FROM picks
                    WHERE match_id = $1 AND status = 'pending' AND NOT (market = ANY($2))
                    "#,
                )
                .bind(match_id)
                .bind(keep)
                .execute(&pool)
                .await?;
                Ok::<_, ScorelineError>(result.rows_affected() as usize)
            }
        })
        .await
    }

    #[instrument(skip(self))]
    async fn resolved_picks(&self, since: NaiveDateTime) -> Result<Vec<ResolvedPick>> {
        self.with_retry("resolved_picks", |pool| async move {
            let rows = sqlx::query(
                r#"
                SELECT match_id, market, league, odds, predicted_probability, diamond_score,
                       won, clv_pct, resolved_at,
                       EXTRACT(EPOCH FROM (kickoff - created_at))::DOUBLE PRECISION / 3600.0
                           AS hours_before_kickoff
                FROM picks
                WHERE status = 'resolved' AND won IS NOT NULL AND resolved_at >= $1
                ORDER BY resolved_at
                "#,
            )
            .bind(since)
            .fetch_all(&pool)
            .await?;

            Ok::<_, ScorelineError>(rows
                .iter()
                .filter_map(|r| {
                    let raw: String = r.get("market");
                    let market = Market::from_str(&raw).ok()?;
                    Some(ResolvedPick {
                        match_id: r.get("match_id"),
                        market,
                        league: r.get("league"),
                        odds: r.get("odds"),
                        predicted_probability: r.get("predicted_probability"),
                        diamond_score: r.get("diamond_score"),
                        won: r.get("won"),
                        clv_pct: r.get("clv_pct"),
                        hours_before_kickoff: r.get("hours_before_kickoff"),
                        resolved_at: r.get("resolved_at"),
                    })
                })
                .collect())
        })
        .await
    }

    #[instrument(skip(self))]
    async fn count_resolved(&self, since: Option<NaiveDateTime>) -> Result<i64> {
        self.with_retry("count_resolved", |pool| async move {
            let row = sqlx::query(
                r#"
                SELECT COUNT(*) AS n FROM picks
                WHERE status = 'resolved' AND ($1::TIMESTAMP IS NULL OR resolved_at > $1)
                "#,
            )
            .bind(since)
            .fetch_one(&pool)
            .await?;
            Ok::<_, ScorelineError>(row.get("n"))
        })
        .await
    }

    #[instrument(skip(self, adjustments), fields(rows = adjustments.len()))]
    async fn save_adjustments(&self, adjustments: &[Adjustment]) -> Result<usize> {
        if adjustments.is_empty() {
            return Ok(0);
        }
        self.with_retry("save_adjustments", |pool| async move {
            let mut tx = pool.begin().await?;
            for adj in adjustments {
                sqlx::query(
                    r#"
                    INSERT INTO adjustments (
                        kind, target, factor, sample_size, win_rate, avg_clv, confidence, updated_at
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    ON CONFLICT (kind, target) DO UPDATE SET
                        factor = EXCLUDED.factor,
                        sample_size = EXCLUDED.sample_size,
                        win_rate = EXCLUDED.win_rate,
                        avg_clv = EXCLUDED.avg_clv,
                        confidence = EXCLUDED.confidence,
                        updated_at = EXCLUDED.updated_at
                    "#,
                )
                .bind(adj.kind.as_str())
                .bind(&adj.target)
                .bind(adj.factor)
                .bind(adj.sample_size)
                .bind(adj.win_rate)
                .bind(adj.avg_clv)
                .bind(adj.confidence.as_str())
                .bind(adj.updated_at)
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await?;
            Ok::<_, ScorelineError>(adjustments.len())
        })
        .await
    }

    #[instrument(skip(self))]
    async fn last_learning_run(&self) -> Result<Option<LearningRun>> {
        self.with_retry("last_learning_run", |pool| async move {
            let row = sqlx::query(
                r#"
                SELECT run_id, started_at, finished_at, window_days, samples,
                       adjustments_written, health_score, ece_pct
                FROM learning_runs
                ORDER BY finished_at DESC
                LIMIT 1
                "#,
            )
            .fetch_optional(&pool)
            .await?;

            Ok::<_, ScorelineError>(row.map(|r| LearningRun {
                run_id: r.get("run_id"),
                started_at: r.get("started_at"),
                finished_at: r.get("finished_at"),
                window_days: r.get("window_days"),
                samples: r.get("samples"),
                adjustments_written: r.get("adjustments_written"),
                health_score: r.get("health_score"),
                ece_pct: r.get("ece_pct"),
            }))
        })
        .await
    }

    #[instrument(skip(self, run), fields(run_id = %run.run_id))]
    async fn record_learning_run(&self, run: &LearningRun) -> Result<()> {
        self.with_retry("record_learning_run", |pool| async move {
            sqlx::query(
                r#"
                INSERT INTO learning_runs (
                    run_id, started_at, finished_at, window_days, samples,
                    adjustments_written, health_score, ece_pct
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (run_id) DO NOTHING
                "#,
            )
            .bind(run.run_id)
            .bind(run.started_at)
            .bind(run.finished_at)
            .bind(run.window_days)
            .bind(run.samples)
            .bind(run.adjustments_written)
            .bind(run.health_score)
            .bind(run.ece_pct)
            .execute(&pool)
            .await?;
            Ok::<_, ScorelineError>(())
        })
        .await
    }
}
