use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// H2H aggregates are only trusted from this many meetings on.
pub const MIN_H2H_MATCHES: i32 = 3;

/// Rolling per-team aggregates, maintained by external ingesters.
///
/// Percentages are on a 0–100 scale, goal figures are per-match averages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamStats {
    pub team: String,
    pub matches_played: i32,
    pub goals_for_avg: f64,
    pub goals_against_avg: f64,
    pub home_scored_avg: f64,
    pub home_conceded_avg: f64,
    pub away_scored_avg: f64,
    pub away_conceded_avg: f64,
    pub btts_pct: f64,
    pub over15_pct: f64,
    pub over25_pct: f64,
    pub over35_pct: f64,
    pub clean_sheet_pct: f64,
    pub failed_to_score_pct: f64,
    /// Last five results, most recent first (e.g. "WWDLW")
    pub form_last5: String,
    pub form_points: i32,
    pub last5_btts_pct: f64,
    pub last5_over25_pct: f64,
    /// 0–100
    pub data_quality: f64,
}

impl TeamStats {
    /// League-neutral stand-in used when a team has no stats row.
    pub fn league_default(team: &str) -> Self {
        Self {
            team: team.to_string(),
            matches_played: 0,
            goals_for_avg: 1.3,
            goals_against_avg: 1.3,
            home_scored_avg: 1.3,
            home_conceded_avg: 1.3,
            away_scored_avg: 1.3,
            away_conceded_avg: 1.3,
            btts_pct: 50.0,
            over15_pct: 75.0,
            over25_pct: 50.0,
            over35_pct: 25.0,
            clean_sheet_pct: 25.0,
            failed_to_score_pct: 25.0,
            form_last5: String::new(),
            form_points: 0,
            last5_btts_pct: 50.0,
            last5_over25_pct: 50.0,
            data_quality: 0.0,
        }
    }

    /// Points per match over the recorded form string (W=3, D=1, L=0).
    pub fn form_ppg(&self) -> Option<f64> {
        let results: Vec<u32> = self
            .form_last5
            .chars()
            .filter_map(|c| match c.to_ascii_uppercase() {
                'W' => Some(3),
                'D' => Some(1),
                'L' => Some(0),
                _ => None,
            })
            .collect();
        if results.is_empty() {
            return None;
        }
        Some(results.iter().sum::<u32>() as f64 / results.len() as f64)
    }
}

/// Head-to-head aggregates for an ordered (home, away) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadToHead {
    pub home_team: String,
    pub away_team: String,
    pub matches: i32,
    pub btts_pct: f64,
    pub over25_pct: f64,
    pub avg_total_goals: f64,
    pub home_wins: i32,
    pub away_wins: i32,
    pub draws: i32,
}

impl HeadToHead {
    pub fn is_usable(&self) -> bool {
        self.matches >= MIN_H2H_MATCHES
    }
}

/// Maps source-specific team names onto one canonical name.
#[derive(Debug, Clone, Default)]
pub struct TeamResolver {
    aliases: BTreeMap<String, String>,
}

impl TeamResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from (alias, canonical) pairs. Later pairs override earlier ones.
    pub fn from_pairs<I, A, C>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (A, C)>,
        A: AsRef<str>,
        C: Into<String>,
    {
        let mut resolver = Self::new();
        for (alias, canonical) in pairs {
            resolver.add_alias(alias.as_ref(), canonical);
        }
        resolver
    }

    pub fn add_alias(&mut self, alias: &str, canonical: impl Into<String>) {
        let canonical = canonical.into();
        self.aliases
            .insert(normalize_team_name(&canonical), canonical.clone());
        self.aliases.insert(normalize_team_name(alias), canonical);
    }

    /// Canonical name for `name`; unknown names pass through trimmed.
    pub fn resolve(&self, name: &str) -> String {
        self.aliases
            .get(&normalize_team_name(name))
            .cloned()
            .unwrap_or_else(|| name.trim().to_string())
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

/// Lower-case, strip punctuation and club suffixes, collapse whitespace.
///
/// Dots and apostrophes are dropped rather than split on, so "F.C." reads as
/// the "fc" suffix.
pub fn normalize_team_name(name: &str) -> String {
    const SUFFIXES: [&str; 5] = ["fc", "afc", "cf", "sc", "ac"];

    let cleaned: String = name
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '.' | '\'' | '\u{2019}'))
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    let words: Vec<&str> = cleaned
        .split_whitespace()
        .filter(|w| !SUFFIXES.contains(w))
        .collect();
    words.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_suffixes_and_punctuation() {
        assert_eq!(normalize_team_name("  Arsenal F.C. "), "arsenal");
        assert_eq!(normalize_team_name("A.F.C. Bournemouth"), "bournemouth");
        assert_eq!(normalize_team_name("Nott'm Forest"), "nottm forest");
        assert_eq!(normalize_team_name("Arsenal FC"), "arsenal");
        assert_eq!(normalize_team_name("AFC Bournemouth"), "bournemouth");
        assert_eq!(normalize_team_name("Brighton & Hove Albion"), "brighton hove albion");
    }

    #[test]
    fn test_resolver_maps_aliases() {
        let resolver = TeamResolver::from_pairs([
            ("Man Utd", "Manchester United"),
            ("Man United", "Manchester United"),
        ]);
        assert_eq!(resolver.resolve("man utd"), "Manchester United");
        assert_eq!(resolver.resolve("Manchester United FC"), "Manchester United");
        assert_eq!(resolver.resolve(" Everton "), "Everton");
    }

    #[test]
    fn test_resolver_handles_dotted_suffix() {
        let resolver = TeamResolver::from_pairs([("Arsenal FC", "Arsenal")]);
        assert_eq!(resolver.resolve("Arsenal F.C."), "Arsenal");
        assert_eq!(resolver.resolve("arsenal"), "Arsenal");
    }

    #[test]
    fn test_h2h_usable_threshold() {
        let mut h2h = HeadToHead {
            home_team: "A".into(),
            away_team: "B".into(),
            matches: 2,
            btts_pct: 50.0,
            over25_pct: 50.0,
            avg_total_goals: 2.5,
            home_wins: 1,
            away_wins: 1,
            draws: 0,
        };
        assert!(!h2h.is_usable());
        h2h.matches = 3;
        assert!(h2h.is_usable());
    }

    #[test]
    fn test_form_ppg() {
        let mut stats = TeamStats::league_default("A");
        assert_eq!(stats.form_ppg(), None);
        stats.form_last5 = "WWDLW".into();
        assert!((stats.form_ppg().unwrap() - 2.0).abs() < 1e-9);
    }
}
