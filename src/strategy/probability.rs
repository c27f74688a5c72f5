//! Market probability estimation for football fixtures
//!
//! Builds an independent-Poisson score matrix from expected goals, derives
//! every market in [`Market`] from it, then blends BTTS and Over 2.5 with
//! empirical team rates (and H2H rates when enough meetings exist).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::{HeadToHead, Market, TeamStats};

/// Home-advantage multiplier on home expected goals
pub const HOME_BOOST: f64 = 1.08;
/// Away-disadvantage multiplier on away expected goals
pub const AWAY_BOOST: f64 = 0.92;
/// Goals per side enumerated in the score matrix (0..=MAX_GOALS)
pub const MAX_GOALS: usize = 7;
/// Weight of the Poisson estimate when blending with empirical rates
pub const POISSON_WEIGHT: f64 = 0.3;
/// Weight of H2H rates in the final blend
pub const H2H_WEIGHT: f64 = 0.2;

const DEFAULT_XG: f64 = 1.3;
const DEFAULT_PCT: f64 = 50.0;

const HOME_XG_RANGE: (f64, f64) = (0.5, 3.5);
const AWAY_XG_RANGE: (f64, f64) = (0.3, 3.0);

/// Expected goals for both sides
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExpectedGoals {
    pub home: f64,
    pub away: f64,
}

/// Probability per market for one fixture, plus the inputs that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbabilityVector {
    probs: BTreeMap<Market, f64>,
    pub xg: ExpectedGoals,
    pub h2h_used: bool,
    /// Numeric degeneracies replaced by defaults along the way
    pub warnings: Vec<String>,
}

impl ProbabilityVector {
    pub fn get(&self, market: Market) -> Option<f64> {
        self.probs.get(&market).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Market, f64)> + '_ {
        self.probs.iter().map(|(m, p)| (*m, *p))
    }

    pub fn len(&self) -> usize {
        self.probs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probs.is_empty()
    }
}

/// Joint distribution of final scores, `cells[h][a]` = P(home h, away a).
#[derive(Debug, Clone)]
pub struct ScoreMatrix {
    cells: [[f64; MAX_GOALS + 1]; MAX_GOALS + 1],
}

impl ScoreMatrix {
    /// Independent Poisson matrix, renormalised to the truncated support.
    pub fn poisson(home_xg: f64, away_xg: f64) -> Self {
        let home = poisson_pmf(home_xg);
        let away = poisson_pmf(away_xg);

        let mut cells = [[0.0; MAX_GOALS + 1]; MAX_GOALS + 1];
        let mut total = 0.0;
        for (h, ph) in home.iter().enumerate() {
            for (a, pa) in away.iter().enumerate() {
                cells[h][a] = ph * pa;
                total += cells[h][a];
            }
        }
        if total > 0.0 && total.is_finite() {
            for row in cells.iter_mut() {
                for cell in row.iter_mut() {
                    *cell /= total;
                }
            }
        }
        Self { cells }
    }

    fn sum_where(&self, pred: impl Fn(usize, usize) -> bool) -> f64 {
        let mut acc = 0.0;
        for (h, row) in self.cells.iter().enumerate() {
            for (a, cell) in row.iter().enumerate() {
                if pred(h, a) {
                    acc += cell;
                }
            }
        }
        acc
    }

    /// (home, draw, away), summing to one
    pub fn result_probs(&self) -> (f64, f64, f64) {
        let home = self.sum_where(|h, a| h > a);
        let draw = self.sum_where(|h, a| h == a);
        let away = self.sum_where(|h, a| h < a);
        let total = home + draw + away;
        if total <= 0.0 || !total.is_finite() {
            return (1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0);
        }
        let home = home / total;
        let draw = draw / total;
        (home, draw, 1.0 - home - draw)
    }

    /// P(total goals > line) for a half-goal line such as 2.5
    pub fn over(&self, line: f64) -> f64 {
        let under = self.sum_where(|h, a| ((h + a) as f64) < line);
        sanitize_prob(1.0 - under, 0.5)
    }

    pub fn btts(&self) -> f64 {
        sanitize_prob(self.sum_where(|h, a| h > 0 && a > 0), 0.5)
    }
}

fn poisson_pmf(lambda: f64) -> [f64; MAX_GOALS + 1] {
    let mut out = [0.0; MAX_GOALS + 1];
    out[0] = (-lambda).exp();
    for k in 1..=MAX_GOALS {
        out[k] = out[k - 1] * lambda / k as f64;
    }
    out
}

fn sanitize_prob(p: f64, fallback: f64) -> f64 {
    if p.is_finite() {
        p.clamp(0.0, 1.0)
    } else {
        fallback
    }
}

fn sanitize_rate(value: f64, fallback: f64, label: &str, warnings: &mut Vec<String>) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        warnings.push(format!("{label} degenerate ({value}); using {fallback}"));
        fallback
    }
}

fn sanitize_pct(value: f64, label: &str, warnings: &mut Vec<String>) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        warnings.push(format!("{label} not finite; using {DEFAULT_PCT}"));
        DEFAULT_PCT
    }
}

/// Expected goals from venue-specific scoring and conceding averages.
pub fn expected_goals(
    home: &TeamStats,
    away: &TeamStats,
    warnings: &mut Vec<String>,
) -> ExpectedGoals {
    let home_scored = sanitize_rate(home.home_scored_avg, DEFAULT_XG, "home_scored_avg", warnings);
    let home_conceded =
        sanitize_rate(home.home_conceded_avg, DEFAULT_XG, "home_conceded_avg", warnings);
    let away_scored = sanitize_rate(away.away_scored_avg, DEFAULT_XG, "away_scored_avg", warnings);
    let away_conceded =
        sanitize_rate(away.away_conceded_avg, DEFAULT_XG, "away_conceded_avg", warnings);

    let home_xg = ((home_scored + away_conceded) / 2.0 * HOME_BOOST)
        .clamp(HOME_XG_RANGE.0, HOME_XG_RANGE.1);
    let away_xg = ((away_scored + home_conceded) / 2.0 * AWAY_BOOST)
        .clamp(AWAY_XG_RANGE.0, AWAY_XG_RANGE.1);

    ExpectedGoals {
        home: home_xg,
        away: away_xg,
    }
}

fn blend(poisson: f64, empirical: f64, h2h: Option<f64>) -> f64 {
    let mut p = POISSON_WEIGHT * poisson + (1.0 - POISSON_WEIGHT) * empirical;
    if let Some(h2h) = h2h {
        p = (1.0 - H2H_WEIGHT) * p + H2H_WEIGHT * h2h;
    }
    sanitize_prob(p, 0.5)
}

/// Market probabilities for a fixture.
///
/// Missing stats fall back to [`TeamStats::league_default`]; an H2H record
/// with fewer than three meetings is ignored. Never fails: degenerate inputs
/// are replaced and reported in [`ProbabilityVector::warnings`].
pub fn probabilities(
    home: Option<&TeamStats>,
    away: Option<&TeamStats>,
    h2h: Option<&HeadToHead>,
) -> ProbabilityVector {
    let mut warnings = Vec::new();

    let home_default;
    let home = match home {
        Some(stats) => stats,
        None => {
            warnings.push("home stats missing; using league defaults".to_string());
            home_default = TeamStats::league_default("home");
            &home_default
        }
    };
    let away_default;
    let away = match away {
        Some(stats) => stats,
        None => {
            warnings.push("away stats missing; using league defaults".to_string());
            away_default = TeamStats::league_default("away");
            &away_default
        }
    };

    let xg = expected_goals(home, away, &mut warnings);
    let matrix = ScoreMatrix::poisson(xg.home, xg.away);

    let h2h = h2h.filter(|h| h.is_usable());
    let h2h_btts = h2h.map(|h| sanitize_pct(h.btts_pct, "h2h.btts_pct", &mut warnings) / 100.0);
    let h2h_over25 =
        h2h.map(|h| sanitize_pct(h.over25_pct, "h2h.over25_pct", &mut warnings) / 100.0);

    let emp_btts = (sanitize_pct(home.btts_pct, "home.btts_pct", &mut warnings)
        + sanitize_pct(away.btts_pct, "away.btts_pct", &mut warnings))
        / 200.0;
    let emp_over25 = (sanitize_pct(home.over25_pct, "home.over25_pct", &mut warnings)
        + sanitize_pct(away.over25_pct, "away.over25_pct", &mut warnings))
        / 200.0;

    let btts_yes = blend(matrix.btts(), emp_btts, h2h_btts);
    let over25 = blend(matrix.over(2.5), emp_over25, h2h_over25);
    // Keep the goal lines ordered after blending the middle one.
    let over15 = matrix.over(1.5).max(over25);
    let over35 = matrix.over(3.5).min(over25);

    let (p_home, p_draw, p_away) = matrix.result_probs();

    let mut probs = BTreeMap::new();
    probs.insert(Market::Home, p_home);
    probs.insert(Market::Draw, p_draw);
    probs.insert(Market::Away, p_away);
    probs.insert(Market::Over15, over15);
    probs.insert(Market::Under15, 1.0 - over15);
    probs.insert(Market::Over25, over25);
    probs.insert(Market::Under25, 1.0 - over25);
    probs.insert(Market::Over35, over35);
    probs.insert(Market::Under35, 1.0 - over35);
    probs.insert(Market::BttsYes, btts_yes);
    probs.insert(Market::BttsNo, 1.0 - btts_yes);
    probs.insert(Market::HomeOrDraw, (p_home + p_draw).min(1.0));
    probs.insert(Market::HomeOrAway, (p_home + p_away).min(1.0));
    probs.insert(Market::DrawOrAway, (p_draw + p_away).min(1.0));

    ProbabilityVector {
        probs,
        xg,
        h2h_used: h2h.is_some(),
        warnings,
    }
}
