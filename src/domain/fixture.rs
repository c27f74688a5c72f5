use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Market, Side};

/// An upcoming match as written by the ingesters.
///
/// Timestamps are naive UTC throughout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    pub match_id: String,
    pub home_team: String,
    pub away_team: String,
    pub kickoff: NaiveDateTime,
    pub league: String,
}

impl Fixture {
    pub fn label(&self) -> String {
        format!("{} vs {}", self.home_team, self.away_team)
    }

    /// Hours between `at` and kickoff (negative once the match started)
    pub fn hours_to_kickoff(&self, at: NaiveDateTime) -> f64 {
        (self.kickoff - at).num_seconds() as f64 / 3600.0
    }
}

/// One captured bookmaker price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OddsSnapshot {
    pub match_id: String,
    pub bookmaker: String,
    pub market: String,
    pub outcome: Side,
    pub odds: f64,
    pub captured_at: NaiveDateTime,
}

/// Best current decimal odds per market for one match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchOdds {
    quotes: BTreeMap<Market, f64>,
}

impl MatchOdds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep the best (highest) price seen for each market.
    pub fn offer(&mut self, market: Market, odds: f64) {
        if !odds.is_finite() {
            return;
        }
        let slot = self.quotes.entry(market).or_insert(odds);
        if odds > *slot {
            *slot = odds;
        }
    }

    pub fn get(&self, market: Market) -> Option<f64> {
        self.quotes.get(&market).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Market, f64)> + '_ {
        self.quotes.iter().map(|(m, o)| (*m, *o))
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}

impl FromIterator<(Market, f64)> for MatchOdds {
    fn from_iter<T: IntoIterator<Item = (Market, f64)>>(iter: T) -> Self {
        let mut odds = MatchOdds::new();
        for (market, price) in iter {
            odds.offer(market, price);
        }
        odds
    }
}
