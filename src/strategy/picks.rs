//! Pick generation for one match
//!
//! Chains the probability engine, the CLV validator and the market scorer,
//! then filters, ranks and annotates the surviving candidates.

use chrono::NaiveDateTime;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::debug;

use super::clv::{ClvData, ClvValidator};
use super::probability::{probabilities, ProbabilityVector};
use super::scorer::{MarketScorer, ScoreOutcome, ScoreRequest, ScoredMarket};
use crate::domain::{
    Fixture, HeadToHead, MatchOdds, OddsSnapshot, Pick, PickStatus, SizingTier, TeamStats,
    PICK_SOURCE,
};
use crate::error::{Result, ScorelineError};

/// Everything the generator needs about one match, already read from the store.
#[derive(Debug, Clone, Copy)]
pub struct MatchInput<'a> {
    pub fixture: &'a Fixture,
    pub home_stats: Option<&'a TeamStats>,
    pub away_stats: Option<&'a TeamStats>,
    pub h2h: Option<&'a HeadToHead>,
    pub odds: &'a MatchOdds,
    pub snapshots: &'a [OddsSnapshot],
}

/// Outcome of generating picks for one match
#[derive(Debug, Clone, Default)]
pub struct MatchPicks {
    /// Ranked best first
    pub picks: Vec<Pick>,
    /// Candidates dropped by score/edge policy or rejected by the scorer
    pub dropped: usize,
    pub clv: Option<ClvData>,
}

#[derive(Debug, Clone)]
pub struct PickGenerator {
    scorer: MarketScorer,
    clv: ClvValidator,
    min_score: f64,
    top_k: usize,
}

impl PickGenerator {
    pub fn new(scorer: MarketScorer, clv: ClvValidator, min_score: f64, top_k: usize) -> Self {
        Self {
            scorer,
            clv,
            min_score,
            top_k,
        }
    }

    /// Score every quoted market of a match.
    ///
    /// Fails with `InputMissing` when neither team has stats or the match has
    /// no usable odds; policy rejections only show up in `dropped`.
    pub fn generate(&self, input: &MatchInput<'_>, now: NaiveDateTime) -> Result<MatchPicks> {
        let fixture = input.fixture;
        if input.home_stats.is_none() && input.away_stats.is_none() {
            return Err(ScorelineError::InputMissing(format!(
                "no team stats for {}",
                fixture.label()
            )));
        }
        if input.odds.is_empty() {
            return Err(ScorelineError::InputMissing(format!(
                "no odds for {}",
                fixture.label()
            )));
        }

        let probs = probabilities(input.home_stats, input.away_stats, input.h2h);
        let clv = self.clv.evaluate(input.snapshots);

        let mut scored: Vec<ScoredMarket> = Vec::new();
        let mut dropped = 0usize;

        for (market, odds) in input.odds.iter() {
            let Some(probability) = probs.get(market) else {
                dropped += 1;
                continue;
            };
            let request = ScoreRequest::new(market, probability, odds)
                .league(&fixture.league)
                .clv(clv.as_ref());
            match self.scorer.score(&request) {
                ScoreOutcome::Valid(s)
                    if s.diamond_score as f64 >= self.min_score && s.edge_pct > 0.0 =>
                {
                    scored.push(*s)
                }
                ScoreOutcome::Valid(s) => {
                    debug!(
                        match_id = %fixture.match_id,
                        market = %market,
                        score = s.diamond_score,
                        edge_pct = s.edge_pct,
                        "candidate below policy"
                    );
                    dropped += 1;
                }
                ScoreOutcome::Rejected(reason) => {
                    debug!(
                        match_id = %fixture.match_id,
                        market = %market,
                        reason = reason.as_str(),
                        "candidate rejected"
                    );
                    dropped += 1;
                }
            }
        }

        scored.sort_by(|a, b| {
            b.final_score
                .total_cmp(&a.final_score)
                .then(b.edge_pct.total_cmp(&a.edge_pct))
                .then(a.market.cmp(&b.market))
        });

        let picks = scored
            .into_iter()
            .enumerate()
            .map(|(rank, s)| {
                let factors = self.factors(input, &probs, clv.as_ref(), &s, now);
                Pick {
                    match_id: fixture.match_id.clone(),
                    home_team: fixture.home_team.clone(),
                    away_team: fixture.away_team.clone(),
                    league: fixture.league.clone(),
                    kickoff: fixture.kickoff,
                    market: s.market,
                    selection: s.market.selection().to_string(),
                    odds: s.odds,
                    predicted_probability: s.probability,
                    implied_probability: s.implied_probability,
                    edge_pct: s.edge_pct,
                    kelly_pct: if s.sizing.tier == SizingTier::Skip {
                        0.0
                    } else {
                        s.kelly_pct
                    },
                    diamond_score: s.diamond_score,
                    rating: s.rating,
                    confidence: s.confidence,
                    sizing: s.sizing.tier,
                    factors,
                    is_top_k: rank < self.top_k,
                    source: PICK_SOURCE.to_string(),
                    status: PickStatus::Pending,
                    created_at: now,
                }
            })
            .collect();

        Ok(MatchPicks {
            picks,
            dropped,
            clv,
        })
    }

    fn factors(
        &self,
        input: &MatchInput<'_>,
        probs: &ProbabilityVector,
        clv: Option<&ClvData>,
        scored: &ScoredMarket,
        now: NaiveDateTime,
    ) -> BTreeMap<String, Value> {
        let mut factors = BTreeMap::new();

        factors.insert("xg_home".into(), json!(round2(probs.xg.home)));
        factors.insert("xg_away".into(), json!(round2(probs.xg.away)));
        factors.insert("h2h_used".into(), json!(probs.h2h_used));
        factors.insert(
            "data_quality".into(),
            json!(data_quality(input.home_stats, input.away_stats)),
        );
        if let Some(form) = input.home_stats.map(|s| s.form_last5.as_str()).filter(|f| !f.is_empty()) {
            factors.insert("home_form".into(), json!(form));
        }
        if let Some(form) = input.away_stats.map(|s| s.form_last5.as_str()).filter(|f| !f.is_empty()) {
            factors.insert("away_form".into(), json!(form));
        }
        if let Some(ppg) = input.home_stats.and_then(TeamStats::form_ppg) {
            factors.insert("home_form_ppg".into(), json!(round2(ppg)));
        }
        if let Some(ppg) = input.away_stats.and_then(TeamStats::form_ppg) {
            factors.insert("away_form_ppg".into(), json!(round2(ppg)));
        }

        factors.insert("base_score".into(), json!(scored.base_score));
        factors.insert("edge_bonus".into(), json!(scored.edge_bonus));
        factors.insert("market_prior".into(), json!(scored.market_prior));
        factors.insert("odds_factor".into(), json!(scored.odds_factor));
        if let Some(f) = scored.calibration_factor {
            factors.insert("calibration_factor".into(), json!(round2(f)));
        }
        factors.insert(
            "hours_to_kickoff".into(),
            json!(round2(input.fixture.hours_to_kickoff(now))),
        );

        if let Some(signal) = scored.sizing.signal {
            factors.insert("clv_signal".into(), json!(signal.as_str()));
        }
        if let Some(clv) = clv {
            factors.insert("clv_max_pct".into(), json!(round2(clv.max_clv())));
            factors.insert(
                "clv_recommended_side".into(),
                json!(clv.recommended_side.map(|s| s.as_str()).unwrap_or("NONE")),
            );
        }
        if scored.sizing.contrarian {
            factors.insert("contrarian".into(), json!(true));
        }
        if !probs.warnings.is_empty() {
            factors.insert("warnings".into(), json!(probs.warnings));
        }

        factors
    }
}

/// Mean data quality of the teams that have stats; missing sides count as 0.
fn data_quality(home: Option<&TeamStats>, away: Option<&TeamStats>) -> f64 {
    let q = |s: Option<&TeamStats>| {
        s.map(|s| s.data_quality)
            .filter(|q| q.is_finite())
            .unwrap_or(0.0)
            .clamp(0.0, 100.0)
    };
    round2((q(home) + q(away)) / 2.0)
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
