use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ScorelineError;

/// Full-time result outcome (the 1X2 sides)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Home,
    Draw,
    Away,
}

impl Side {
    pub const ALL: [Side; 3] = [Side::Home, Side::Draw, Side::Away];

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Home => "HOME",
            Side::Draw => "DRAW",
            Side::Away => "AWAY",
        }
    }

    /// Outcome of a finished match
    pub fn from_score(home_goals: u32, away_goals: u32) -> Self {
        if home_goals > away_goals {
            Side::Home
        } else if home_goals < away_goals {
            Side::Away
        } else {
            Side::Draw
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Side {
    type Err = ScorelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "HOME" | "1" | "H" => Ok(Side::Home),
            "DRAW" | "X" | "D" => Ok(Side::Draw),
            "AWAY" | "2" | "A" => Ok(Side::Away),
            other => Err(ScorelineError::Validation(format!("unknown side: {other}"))),
        }
    }
}

/// Closed set of markets the scorer understands.
///
/// Anything not listed here is rejected at ingestion with
/// [`ScorelineError::UnknownMarket`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Market {
    Home,
    Draw,
    Away,
    Over15,
    Under15,
    Over25,
    Under25,
    Over35,
    Under35,
    BttsYes,
    BttsNo,
    /// Double chance 1X
    HomeOrDraw,
    /// Double chance 12
    HomeOrAway,
    /// Double chance X2
    DrawOrAway,
}

impl Market {
    pub const ALL: [Market; 14] = [
        Market::Home,
        Market::Draw,
        Market::Away,
        Market::Over15,
        Market::Under15,
        Market::Over25,
        Market::Under25,
        Market::Over35,
        Market::Under35,
        Market::BttsYes,
        Market::BttsNo,
        Market::HomeOrDraw,
        Market::HomeOrAway,
        Market::DrawOrAway,
    ];

    /// Storage key
    pub fn as_str(&self) -> &'static str {
        match self {
            Market::Home => "home",
            Market::Draw => "draw",
            Market::Away => "away",
            Market::Over15 => "over_15",
            Market::Under15 => "under_15",
            Market::Over25 => "over_25",
            Market::Under25 => "under_25",
            Market::Over35 => "over_35",
            Market::Under35 => "under_35",
            Market::BttsYes => "btts_yes",
            Market::BttsNo => "btts_no",
            Market::HomeOrDraw => "dc_1x",
            Market::HomeOrAway => "dc_12",
            Market::DrawOrAway => "dc_x2",
        }
    }

    /// Human-readable selection label stored on the pick
    pub fn selection(&self) -> &'static str {
        match self {
            Market::Home => "Home Win",
            Market::Draw => "Draw",
            Market::Away => "Away Win",
            Market::Over15 => "Over 1.5",
            Market::Under15 => "Under 1.5",
            Market::Over25 => "Over 2.5",
            Market::Under25 => "Under 2.5",
            Market::Over35 => "Over 3.5",
            Market::Under35 => "Under 3.5",
            Market::BttsYes => "BTTS Yes",
            Market::BttsNo => "BTTS No",
            Market::HomeOrDraw => "1X",
            Market::HomeOrAway => "12",
            Market::DrawOrAway => "X2",
        }
    }

    /// Signed score prior. Positive for historically profitable markets.
    pub fn prior(&self) -> f64 {
        match self {
            Market::BttsYes => 20.0,
            Market::Over25 => 15.0,
            Market::Over15 => 5.0,
            Market::Over35 => 5.0,
            Market::Under35 => 0.0,
            Market::BttsNo => -5.0,
            Market::Under25 => -5.0,
            Market::HomeOrDraw => -5.0,
            Market::DrawOrAway => -5.0,
            Market::Draw => -8.0,
            Market::HomeOrAway => -10.0,
            Market::Away => -12.0,
            Market::Under15 => -15.0,
            Market::Home => -20.0,
        }
    }

    /// 1X2 sides this market wins on. Empty for goal-line and BTTS markets.
    pub fn sides(&self) -> &'static [Side] {
        match self {
            Market::Home => &[Side::Home],
            Market::Draw => &[Side::Draw],
            Market::Away => &[Side::Away],
            Market::HomeOrDraw => &[Side::Home, Side::Draw],
            Market::HomeOrAway => &[Side::Home, Side::Away],
            Market::DrawOrAway => &[Side::Draw, Side::Away],
            _ => &[],
        }
    }

    /// Settle this market against a final score.
    pub fn settle(&self, home_goals: u32, away_goals: u32) -> bool {
        let total = home_goals + away_goals;
        let result = Side::from_score(home_goals, away_goals);
        match self {
            Market::Over15 => total >= 2,
            Market::Under15 => total <= 1,
            Market::Over25 => total >= 3,
            Market::Under25 => total <= 2,
            Market::Over35 => total >= 4,
            Market::Under35 => total <= 3,
            Market::BttsYes => home_goals > 0 && away_goals > 0,
            Market::BttsNo => home_goals == 0 || away_goals == 0,
            _ => self.sides().contains(&result),
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Market {
    type Err = ScorelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        let market = match key.as_str() {
            "home" | "1" | "homewin" => Market::Home,
            "draw" | "x" => Market::Draw,
            "away" | "2" | "awaywin" => Market::Away,
            "over15" => Market::Over15,
            "under15" => Market::Under15,
            "over25" => Market::Over25,
            "under25" => Market::Under25,
            "over35" => Market::Over35,
            "under35" => Market::Under35,
            "bttsyes" | "btts" | "gg" => Market::BttsYes,
            "bttsno" | "ng" => Market::BttsNo,
            "dc1x" | "1x" | "homeordraw" => Market::HomeOrDraw,
            "dc12" | "12" | "homeoraway" => Market::HomeOrAway,
            "dcx2" | "x2" | "draworaway" => Market::DrawOrAway,
            _ => return Err(ScorelineError::UnknownMarket(s.to_string())),
        };
        Ok(market)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_storage_keys() {
        for market in Market::ALL {
            assert_eq!(market.as_str().parse::<Market>().unwrap(), market);
        }
    }

    #[test]
    fn test_aliases() {
        assert_eq!("Over 2.5".parse::<Market>().unwrap(), Market::Over25);
        assert_eq!("BTTS-Yes".parse::<Market>().unwrap(), Market::BttsYes);
        assert_eq!("X2".parse::<Market>().unwrap(), Market::DrawOrAway);
    }

    #[test]
    fn test_unknown_market_rejected() {
        let err = "asian_handicap_-0.5".parse::<Market>().unwrap_err();
        assert!(matches!(err, ScorelineError::UnknownMarket(_)));
    }

    #[test]
    fn test_settlement() {
        assert!(Market::Over25.settle(2, 1));
        assert!(!Market::Over25.settle(1, 1));
        assert!(Market::Under15.settle(1, 0));
        assert!(Market::BttsYes.settle(1, 1));
        assert!(Market::BttsNo.settle(3, 0));
        assert!(Market::HomeOrDraw.settle(0, 0));
        assert!(!Market::HomeOrDraw.settle(0, 1));
        assert!(Market::Away.settle(0, 1));
    }

    #[test]
    fn test_declared_priors() {
        assert_eq!(Market::BttsYes.prior(), 20.0);
        assert_eq!(Market::Over25.prior(), 15.0);
        assert_eq!(Market::Draw.prior(), -8.0);
        assert_eq!(Market::Home.prior(), -20.0);
        assert_eq!(Market::Under15.prior(), -15.0);
    }
}
