use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

use crate::error::PipelineError;
use crate::stats::{GameRecord, GameType, RawTeamRow};

/// The stat-retrieval collaborator: a read-only, season-filterable tabular
/// source keyed by (season, week, team). Implementations must not mutate
/// anything; a pipeline run treats the source as immutable input.
pub trait StatsSource {
    fn current_season(&self) -> Result<u16>;
    fn current_week(&self) -> Result<u8>;
    fn load_schedules(&self, seasons: &[u16]) -> Result<Vec<GameRecord>>;
    fn load_team_stats(&self, seasons: &[u16]) -> Result<Vec<RawTeamRow>>;
}

const SCHEDULE_COLUMNS: [&str; 8] = [
    "season",
    "week",
    "game_id",
    "game_type",
    "home_team",
    "away_team",
    "home_score",
    "away_score",
];

const STAT_KEY_COLUMNS: [&str; 4] = ["season", "week", "team", "opponent_team"];

/// CSV-file backed source: one schedules file, one team-stats file, both in
/// the nflverse export layout.
pub struct CsvSource {
    schedules_path: PathBuf,
    team_stats_path: PathBuf,
}

impl CsvSource {
    pub fn new(schedules_path: impl Into<PathBuf>, team_stats_path: impl Into<PathBuf>) -> Self {
        Self {
            schedules_path: schedules_path.into(),
            team_stats_path: team_stats_path.into(),
        }
    }

    fn read_schedules(&self) -> Result<Vec<GameRecord>> {
        read_schedule_csv(&self.schedules_path)
    }
}

impl StatsSource for CsvSource {
    fn current_season(&self) -> Result<u16> {
        let games = self.read_schedules()?;
        games
            .iter()
            .map(|g| g.season)
            .max()
            .ok_or_else(|| anyhow!("schedules file {} is empty", self.schedules_path.display()))
    }

    fn current_week(&self) -> Result<u8> {
        let games = self.read_schedules()?;
        let season = games
            .iter()
            .map(|g| g.season)
            .max()
            .ok_or_else(|| anyhow!("schedules file {} is empty", self.schedules_path.display()))?;
        Ok(resolve_current_week(&games, season))
    }

    fn load_schedules(&self, seasons: &[u16]) -> Result<Vec<GameRecord>> {
        let mut games = self.read_schedules()?;
        games.retain(|g| seasons.contains(&g.season));
        Ok(games)
    }

    fn load_team_stats(&self, seasons: &[u16]) -> Result<Vec<RawTeamRow>> {
        let mut rows = read_team_stats_csv(&self.team_stats_path)?;
        rows.retain(|r| seasons.contains(&r.season));
        Ok(rows)
    }
}

/// The current week of a season is the earliest week that still has an
/// unplayed game; once everything is played it is the final week.
pub fn resolve_current_week(games: &[GameRecord], season: u16) -> u8 {
    let mut pending: Option<u8> = None;
    let mut latest: u8 = 0;
    for g in games.iter().filter(|g| g.season == season) {
        latest = latest.max(g.week);
        if !g.is_played() {
            pending = Some(pending.map_or(g.week, |w| w.min(g.week)));
        }
    }
    pending.unwrap_or(latest)
}

pub fn read_schedule_csv(path: &Path) -> Result<Vec<GameRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("open schedules csv {}", path.display()))?;
    let headers = reader.headers().context("read schedules header")?.clone();
    let index = header_index(&headers, &SCHEDULE_COLUMNS, "schedules")?;

    let mut out = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("schedules row {}", line + 2))?;
        let cell = |name: &str| record.get(index[name]).unwrap_or("").trim().to_string();

        let Some(game_type) = GameType::from_code(&cell("game_type")) else {
            continue;
        };
        out.push(GameRecord {
            season: parse_cell(&cell("season"), "season", line)?,
            week: parse_cell(&cell("week"), "week", line)?,
            game_id: cell("game_id"),
            game_type,
            home_team: cell("home_team"),
            away_team: cell("away_team"),
            home_score: parse_optional(&cell("home_score")),
            away_score: parse_optional(&cell("away_score")),
        });
    }
    Ok(out)
}

pub fn read_team_stats_csv(path: &Path) -> Result<Vec<RawTeamRow>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("open team stats csv {}", path.display()))?;
    let headers = reader.headers().context("read team stats header")?.clone();
    let index = header_index(&headers, &STAT_KEY_COLUMNS, "team stats")?;

    // Every non-key column rides along as a named numeric cell; the
    // aggregator decides which ones it requires.
    let stat_columns: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(_, name)| !STAT_KEY_COLUMNS.contains(name))
        .map(|(i, name)| (i, name.to_string()))
        .collect();

    let mut out = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("team stats row {}", line + 2))?;
        let cell = |name: &str| record.get(index[name]).unwrap_or("").trim().to_string();

        let mut values = HashMap::with_capacity(stat_columns.len());
        for (i, name) in &stat_columns {
            let raw = record.get(*i).unwrap_or("").trim();
            values.insert(name.clone(), parse_optional::<f64>(raw));
        }

        out.push(RawTeamRow {
            season: parse_cell(&cell("season"), "season", line)?,
            week: parse_cell(&cell("week"), "week", line)?,
            team: cell("team"),
            opponent: cell("opponent_team"),
            values,
        });
    }
    Ok(out)
}

fn header_index(
    headers: &csv::StringRecord,
    required: &[&str],
    input: &str,
) -> Result<HashMap<String, usize>> {
    let mut index = HashMap::new();
    for (i, name) in headers.iter().enumerate() {
        index.insert(name.to_string(), i);
    }
    for column in required {
        if !index.contains_key(*column) {
            return Err(PipelineError::Schema {
                column: column.to_string(),
                input: input.to_string(),
            }
            .into());
        }
    }
    Ok(index)
}

fn parse_cell<T: std::str::FromStr>(raw: &str, column: &str, line: usize) -> Result<T> {
    raw.parse::<T>()
        .map_err(|_| anyhow!("row {}: cannot parse `{raw}` as {column}", line + 2))
}

fn parse_optional<T: std::str::FromStr>(raw: &str) -> Option<T> {
    let s = raw.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("na") || s.eq_ignore_ascii_case("nan") {
        return None;
    }
    s.parse::<T>().ok()
}
