use std::collections::HashMap;

use crate::error::PipelineError;
use crate::schema::{FeatureSchema, RAW_REQUIRED};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameType {
    Regular,
    Post,
    Preseason,
}

impl GameType {
    pub fn from_code(code: &str) -> Option<GameType> {
        match code.trim().to_ascii_uppercase().as_str() {
            "REG" => Some(GameType::Regular),
            // nflverse uses WC/DIV/CON/SB for playoff rounds, POST as a catch-all.
            "POST" | "WC" | "DIV" | "CON" | "SB" => Some(GameType::Post),
            "PRE" => Some(GameType::Preseason),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            GameType::Regular => "REG",
            GameType::Post => "POST",
            GameType::Preseason => "PRE",
        }
    }
}

/// One completed or scheduled game. A played game has both scores, an
/// unplayed one has neither.
#[derive(Debug, Clone)]
pub struct GameRecord {
    pub season: u16,
    pub week: u8,
    pub game_id: String,
    pub game_type: GameType,
    pub home_team: String,
    pub away_team: String,
    pub home_score: Option<u16>,
    pub away_score: Option<u16>,
}

impl GameRecord {
    pub fn is_played(&self) -> bool {
        self.home_score.is_some() && self.away_score.is_some()
    }

    pub fn home_win(&self) -> Option<bool> {
        let (Some(h), Some(a)) = (self.home_score, self.away_score) else {
            return None;
        };
        Some(h > a)
    }
}

/// One team's raw statistical line for one game, as delivered by the data
/// source: named numeric cells, with `None` for an empty cell.
#[derive(Debug, Clone)]
pub struct RawTeamRow {
    pub season: u16,
    pub week: u8,
    pub team: String,
    pub opponent: String,
    pub values: HashMap<String, Option<f64>>,
}

impl RawTeamRow {
    fn get(&self, column: &str) -> Option<f64> {
        self.values.get(column).copied().flatten()
    }
}

/// One team's statistical line with derived fields resolved, holding exactly
/// the tracked statistics in schema order. Undefined cells stay `None`.
#[derive(Debug, Clone)]
pub struct TeamGameStat {
    pub season: u16,
    pub week: u8,
    pub team: String,
    pub opponent: String,
    pub values: Vec<Option<f64>>,
}

/// Pure transform from raw box-score rows to tracked stat lines. Derived
/// fields:
///   turnovers_offense = interceptions thrown + all fumbles lost
///   turnovers_defense = defensive interceptions + defensive fumbles
///   turnover_margin   = turnovers_defense - turnovers_offense
///   completion_pct    = completions / attempts, undefined at 0 attempts
pub fn aggregate(
    rows: &[RawTeamRow],
    schema: &FeatureSchema,
) -> Result<Vec<TeamGameStat>, PipelineError> {
    if let Some(first) = rows.first() {
        check_required_columns(first)?;
    }

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let turnovers_offense = sum_defined(&[
            row.get("passing_interceptions"),
            row.get("sack_fumbles_lost"),
            row.get("rushing_fumbles_lost"),
            row.get("receiving_fumbles_lost"),
        ]);
        let turnovers_defense =
            sum_defined(&[row.get("def_interceptions"), row.get("def_fumbles")]);
        let turnover_margin = match (turnovers_defense, turnovers_offense) {
            (Some(d), Some(o)) => Some(d - o),
            _ => None,
        };
        let completion_pct = match (row.get("completions"), row.get("attempts")) {
            (Some(c), Some(a)) if a > 0.0 => Some(c / a),
            _ => None,
        };

        let mut values = Vec::with_capacity(schema.len());
        for stat in schema.stats() {
            let v = match *stat {
                "turnovers_offense" => turnovers_offense,
                "turnovers_defense" => turnovers_defense,
                "turnover_margin" => turnover_margin,
                "completion_pct" => completion_pct,
                raw => row.get(raw),
            };
            values.push(v);
        }

        out.push(TeamGameStat {
            season: row.season,
            week: row.week,
            team: row.team.clone(),
            opponent: row.opponent.clone(),
            values,
        });
    }
    Ok(out)
}

fn check_required_columns(row: &RawTeamRow) -> Result<(), PipelineError> {
    for column in RAW_REQUIRED {
        if !row.values.contains_key(column) {
            return Err(PipelineError::Schema {
                column: column.to_string(),
                input: "team stats".to_string(),
            });
        }
    }
    Ok(())
}

fn sum_defined(parts: &[Option<f64>]) -> Option<f64> {
    let mut sum = 0.0;
    for p in parts {
        sum += (*p)?;
    }
    Some(sum)
}
