//! In-process store
//!
//! Backs the integration tests and local dry runs. Seeding helpers mirror
//! what the external ingesters and the settlement job write.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;

use super::store::{BettingStore, LearningRun};
use crate::domain::{
    Adjustment, AdjustmentKind, Fixture, HeadToHead, Market, MatchOdds, OddsSnapshot, Pick,
    PickStatus, ResolvedPick, TeamStats,
};
use crate::error::{Result, ScorelineError};

#[derive(Debug, Default)]
struct MemoryState {
    fixtures: Vec<Fixture>,
    aliases: Vec<(String, String)>,
    stats: HashMap<String, TeamStats>,
    h2h: HashMap<(String, String), HeadToHead>,
    snapshots: Vec<OddsSnapshot>,
    odds: HashMap<String, MatchOdds>,
    picks: BTreeMap<(String, Market), Pick>,
    resolved: Vec<ResolvedPick>,
    adjustments: HashMap<(AdjustmentKind, String), Adjustment>,
    runs: Vec<LearningRun>,
    /// Teams whose stats lookup fails, for exercising error paths
    failing_teams: HashSet<String>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_fixture(&self, fixture: Fixture) {
        let mut state = self.state.write().await;
        state.fixtures.retain(|f| f.match_id != fixture.match_id);
        state.fixtures.push(fixture);
    }

    pub async fn add_alias(&self, alias: &str, canonical: &str) {
        self.state
            .write()
            .await
            .aliases
            .push((alias.to_string(), canonical.to_string()));
    }

    pub async fn set_team_stats(&self, stats: TeamStats) {
        self.state
            .write()
            .await
            .stats
            .insert(stats.team.clone(), stats);
    }

    pub async fn set_head_to_head(&self, h2h: HeadToHead) {
        self.state
            .write()
            .await
            .h2h
            .insert((h2h.home_team.clone(), h2h.away_team.clone()), h2h);
    }

    pub async fn add_snapshot(&self, snapshot: OddsSnapshot) {
        self.state.write().await.snapshots.push(snapshot);
    }

    pub async fn set_odds(&self, match_id: &str, market: Market, odds: f64) {
        self.state
            .write()
            .await
            .odds
            .entry(match_id.to_string())
            .or_default()
            .offer(market, odds);
    }

    pub async fn fail_stats_for(&self, team: &str) {
        self.state
            .write()
            .await
            .failing_teams
            .insert(team.to_string());
    }

    pub async fn add_resolved_pick(&self, pick: ResolvedPick) {
        self.state.write().await.resolved.push(pick);
    }

    /// Settle pending picks of a match against its final score.
    pub async fn settle(
        &self,
        match_id: &str,
        home_goals: u32,
        away_goals: u32,
        clv_pct: Option<f64>,
        at: NaiveDateTime,
    ) -> usize {
        let mut state = self.state.write().await;
        let mut settled = Vec::new();
        for pick in state
            .picks
            .values_mut()
            .filter(|p| p.match_id == match_id && p.status == PickStatus::Pending)
        {
            pick.status = PickStatus::Resolved;
            settled.push(ResolvedPick {
                match_id: pick.match_id.clone(),
                market: pick.market,
                league: pick.league.clone(),
                odds: pick.odds,
                predicted_probability: pick.predicted_probability,
                diamond_score: pick.diamond_score,
                won: pick.market.settle(home_goals, away_goals),
                clv_pct,
                hours_before_kickoff: Some(
                    (pick.kickoff - pick.created_at).num_seconds() as f64 / 3600.0,
                ),
                resolved_at: at,
            });
        }
        let n = settled.len();
        state.resolved.extend(settled);
        n
    }

    pub async fn picks(&self) -> Vec<Pick> {
        self.state.read().await.picks.values().cloned().collect()
    }

    pub async fn learning_runs(&self) -> Vec<LearningRun> {
        self.state.read().await.runs.clone()
    }
}

#[async_trait]
impl BettingStore for MemoryStore {
    async fn upcoming_matches(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Fixture>> {
        let state = self.state.read().await;
        let mut out: Vec<Fixture> = state
            .fixtures
            .iter()
            .filter(|f| f.kickoff >= from && f.kickoff < to)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.kickoff.cmp(&b.kickoff).then(a.match_id.cmp(&b.match_id)));
        Ok(out)
    }

    async fn team_aliases(&self) -> Result<Vec<(String, String)>> {
        Ok(self.state.read().await.aliases.clone())
    }

    async fn team_stats(&self, team: &str) -> Result<Option<TeamStats>> {
        let state = self.state.read().await;
        if state.failing_teams.contains(team) {
            return Err(ScorelineError::StoreTimeout {
                op: format!("team_stats({team})"),
            });
        }
        Ok(state.stats.get(team).cloned())
    }

    async fn head_to_head(&self, home: &str, away: &str) -> Result<Option<HeadToHead>> {
        Ok(self
            .state
            .read()
            .await
            .h2h
            .get(&(home.to_string(), away.to_string()))
            .cloned())
    }

    async fn odds_snapshots(&self, match_id: &str) -> Result<Vec<OddsSnapshot>> {
        let state = self.state.read().await;
        let mut out: Vec<OddsSnapshot> = state
            .snapshots
            .iter()
            .filter(|s| s.match_id == match_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.captured_at.cmp(&b.captured_at));
        Ok(out)
    }

    async fn latest_odds(&self, match_id: &str) -> Result<MatchOdds> {
        Ok(self
            .state
            .read()
            .await
            .odds
            .get(match_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn adjustments(&self) -> Result<Vec<Adjustment>> {
        let state = self.state.read().await;
        let mut out: Vec<Adjustment> = state.adjustments.values().cloned().collect();
        out.sort_by(|a, b| {
            a.kind
                .as_str()
                .cmp(b.kind.as_str())
                .then(a.target.cmp(&b.target))
        });
        Ok(out)
    }

    async fn upsert_pick(&self, pick: &Pick) -> Result<()> {
        let mut state = self.state.write().await;
        match state.picks.entry(pick.key()) {
            Entry::Occupied(mut slot) => {
                let existing = slot.get_mut();
                if !existing.status.is_terminal() {
                    *existing = Pick {
                        created_at: existing.created_at,
                        ..pick.clone()
                    };
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(pick.clone());
            }
        }
        Ok(())
    }

    async fn retire_stale_picks(&self, match_id: &str, keep: &[Market]) -> Result<usize> {
        let mut state = self.state.write().await;
        let before = state.picks.len();
        state.picks.retain(|(id, market), pick| {
            id != match_id || pick.status.is_terminal() || keep.contains(market)
        });
        Ok(before - state.picks.len())
    }

    async fn resolved_picks(&self, since: NaiveDateTime) -> Result<Vec<ResolvedPick>> {
        Ok(self
            .state
            .read()
            .await
            .resolved
            .iter()
            .filter(|p| p.resolved_at >= since)
            .cloned()
            .collect())
    }

    async fn count_resolved(&self, since: Option<NaiveDateTime>) -> Result<i64> {
        let state = self.state.read().await;
        let n = state
            .resolved
            .iter()
            .filter(|p| since.map_or(true, |s| p.resolved_at > s))
            .count();
        Ok(n as i64)
    }

    async fn save_adjustments(&self, adjustments: &[Adjustment]) -> Result<usize> {
        let mut state = self.state.write().await;
        for adj in adjustments {
            state
                .adjustments
                .insert((adj.kind, adj.target.clone()), adj.clone());
        }
        Ok(adjustments.len())
    }

    async fn last_learning_run(&self) -> Result<Option<LearningRun>> {
        Ok(self
            .state
            .read()
            .await
            .runs
            .iter()
            .max_by_key(|r| r.finished_at)
            .cloned())
    }

    async fn record_learning_run(&self, run: &LearningRun) -> Result<()> {
        self.state.write().await.runs.push(run.clone());
        Ok(())
    }
}
