use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use rusqlite::{Connection, params};

use crate::error::PipelineError;
use crate::schema::RAW_REQUIRED;
use crate::source::{StatsSource, resolve_current_week};
use crate::stats::{GameRecord, GameType, RawTeamRow};

/// SQLite store of game records and per-team stat lines across seasons.
/// Ingest is upsert-based so re-running over a partially played season
/// refreshes scores in place.
pub struct HistoryDb {
    conn: Connection,
}

#[derive(Debug, Clone)]
pub struct IngestSummary {
    pub games_upserted: usize,
    pub stat_rows_upserted: usize,
    pub seasons: Vec<u16>,
}

pub fn default_db_path() -> PathBuf {
    if let Ok(base) = std::env::var("XDG_DATA_HOME")
        && !base.trim().is_empty()
    {
        return PathBuf::from(base).join("gridcast").join("history.sqlite");
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home)
        .join(".local")
        .join("share")
        .join("gridcast")
        .join("history.sqlite")
}

impl HistoryDb {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)
            .with_context(|| format!("open sqlite db {}", path.display()))?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn ingest(
        &mut self,
        games: &[GameRecord],
        stats: &[RawTeamRow],
        source: &str,
    ) -> Result<IngestSummary> {
        let started_at = Utc::now().to_rfc3339();

        let tx = self.conn.transaction().context("begin ingest transaction")?;
        let mut games_upserted = 0usize;
        for game in games {
            upsert_game(&tx, game)?;
            games_upserted += 1;
        }
        let mut stat_rows_upserted = 0usize;
        for row in stats {
            upsert_stat_row(&tx, row)?;
            stat_rows_upserted += 1;
        }
        tx.commit().context("commit ingest transaction")?;

        let mut seasons: Vec<u16> = games
            .iter()
            .map(|g| g.season)
            .chain(stats.iter().map(|s| s.season))
            .collect();
        seasons.sort_unstable();
        seasons.dedup();

        self.conn
            .execute(
                "INSERT INTO ingest_runs(started_at, finished_at, source, games_upserted, stat_rows_upserted)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    started_at,
                    Utc::now().to_rfc3339(),
                    source,
                    games_upserted as i64,
                    stat_rows_upserted as i64
                ],
            )
            .context("insert ingest run")?;

        Ok(IngestSummary {
            games_upserted,
            stat_rows_upserted,
            seasons,
        })
    }

    pub fn seasons(&self) -> Result<Vec<u16>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT season FROM games ORDER BY season ASC")
            .context("prepare seasons query")?;
        let rows = stmt
            .query_map([], |row| row.get::<_, u16>(0))
            .context("query seasons")?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("decode season")?);
        }
        Ok(out)
    }

    fn games_for_season(&self, season: u16) -> Result<Vec<GameRecord>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT season, week, game_id, game_type, home_team, away_team,
                        home_score, away_score
                 FROM games WHERE season = ?1
                 ORDER BY week ASC, game_id ASC",
            )
            .context("prepare games query")?;
        let rows = stmt
            .query_map(params![season], |row| {
                Ok((
                    row.get::<_, u16>(0)?,
                    row.get::<_, u8>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, Option<u16>>(6)?,
                    row.get::<_, Option<u16>>(7)?,
                ))
            })
            .context("query games")?;

        let mut out = Vec::new();
        for row in rows {
            let (season, week, game_id, type_code, home_team, away_team, home_score, away_score) =
                row.context("decode game row")?;
            let game_type = GameType::from_code(&type_code)
                .ok_or_else(|| anyhow!("unknown game_type `{type_code}` for {game_id}"))?;
            out.push(GameRecord {
                season,
                week,
                game_id,
                game_type,
                home_team,
                away_team,
                home_score,
                away_score,
            });
        }
        Ok(out)
    }

    fn stats_for_season(&self, season: u16) -> Result<Vec<RawTeamRow>> {
        let sql = format!(
            "SELECT season, week, team, opponent, {} FROM team_stats
             WHERE season = ?1 ORDER BY week ASC, team ASC",
            RAW_REQUIRED.join(", ")
        );
        let mut stmt = self.conn.prepare(&sql).context("prepare stats query")?;
        let rows = stmt
            .query_map(params![season], |row| {
                let mut values = HashMap::with_capacity(RAW_REQUIRED.len());
                for (i, column) in RAW_REQUIRED.iter().enumerate() {
                    values.insert(column.to_string(), row.get::<_, Option<f64>>(4 + i)?);
                }
                Ok(RawTeamRow {
                    season: row.get::<_, u16>(0)?,
                    week: row.get::<_, u8>(1)?,
                    team: row.get::<_, String>(2)?,
                    opponent: row.get::<_, String>(3)?,
                    values,
                })
            })
            .context("query team stats")?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("decode stat row")?);
        }
        Ok(out)
    }
}

impl StatsSource for HistoryDb {
    fn current_season(&self) -> Result<u16> {
        self.seasons()?
            .last()
            .copied()
            .ok_or_else(|| anyhow!("history db holds no seasons; run the ingest binary first"))
    }

    fn current_week(&self) -> Result<u8> {
        let season = self.current_season()?;
        let games = self.games_for_season(season)?;
        Ok(resolve_current_week(&games, season))
    }

    fn load_schedules(&self, seasons: &[u16]) -> Result<Vec<GameRecord>> {
        let mut out = Vec::new();
        for season in seasons {
            out.extend(self.games_for_season(*season)?);
        }
        Ok(out)
    }

    fn load_team_stats(&self, seasons: &[u16]) -> Result<Vec<RawTeamRow>> {
        let mut out = Vec::new();
        for season in seasons {
            out.extend(self.stats_for_season(*season)?);
        }
        Ok(out)
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    let stat_columns = RAW_REQUIRED
        .iter()
        .map(|c| format!("{c} REAL NULL"))
        .collect::<Vec<_>>()
        .join(",\n            ");
    conn.execute_batch(&format!(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS games (
            game_id TEXT PRIMARY KEY,
            season INTEGER NOT NULL,
            week INTEGER NOT NULL,
            game_type TEXT NOT NULL,
            home_team TEXT NOT NULL,
            away_team TEXT NOT NULL,
            home_score INTEGER NULL,
            away_score INTEGER NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_games_season_week ON games(season, week);

        CREATE TABLE IF NOT EXISTS team_stats (
            season INTEGER NOT NULL,
            week INTEGER NOT NULL,
            team TEXT NOT NULL,
            opponent TEXT NOT NULL,
            {stat_columns},
            updated_at TEXT NOT NULL,
            PRIMARY KEY (season, week, team)
        );

        CREATE TABLE IF NOT EXISTS ingest_runs (
            run_id INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at TEXT NOT NULL,
            finished_at TEXT NOT NULL,
            source TEXT NOT NULL,
            games_upserted INTEGER NOT NULL,
            stat_rows_upserted INTEGER NOT NULL
        );
        "#
    ))
    .context("create sqlite schema")?;
    Ok(())
}

fn upsert_game(tx: &rusqlite::Transaction<'_>, game: &GameRecord) -> Result<()> {
    tx.execute(
        r#"
        INSERT INTO games (
            game_id, season, week, game_type, home_team, away_team,
            home_score, away_score, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(game_id) DO UPDATE SET
            season = excluded.season,
            week = excluded.week,
            game_type = excluded.game_type,
            home_team = excluded.home_team,
            away_team = excluded.away_team,
            home_score = excluded.home_score,
            away_score = excluded.away_score,
            updated_at = excluded.updated_at
        "#,
        params![
            game.game_id,
            game.season,
            game.week,
            game.game_type.code(),
            game.home_team,
            game.away_team,
            game.home_score,
            game.away_score,
            Utc::now().to_rfc3339(),
        ],
    )
    .context("upsert game")?;
    Ok(())
}

fn upsert_stat_row(tx: &rusqlite::Transaction<'_>, row: &RawTeamRow) -> Result<()> {
    // Required raw columns must be present in the row's cell map (a None
    // cell is fine, an absent column is a schema defect in the source).
    for column in RAW_REQUIRED {
        if !row.values.contains_key(column) {
            return Err(PipelineError::Schema {
                column: column.to_string(),
                input: "team stats ingest".to_string(),
            }
            .into());
        }
    }

    let columns = RAW_REQUIRED.join(", ");
    let placeholders = (0..RAW_REQUIRED.len())
        .map(|i| format!("?{}", i + 5))
        .collect::<Vec<_>>()
        .join(", ");
    let updates = RAW_REQUIRED
        .iter()
        .map(|c| format!("{c} = excluded.{c}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT INTO team_stats (season, week, team, opponent, {columns}, updated_at)
         VALUES (?1, ?2, ?3, ?4, {placeholders}, ?{})
         ON CONFLICT(season, week, team) DO UPDATE SET
             opponent = excluded.opponent, {updates}, updated_at = excluded.updated_at",
        RAW_REQUIRED.len() + 5
    );

    let mut values: Vec<Box<dyn rusqlite::ToSql>> = vec![
        Box::new(row.season),
        Box::new(row.week),
        Box::new(row.team.clone()),
        Box::new(row.opponent.clone()),
    ];
    for column in RAW_REQUIRED {
        values.push(Box::new(row.values.get(column).copied().flatten()));
    }
    values.push(Box::new(Utc::now().to_rfc3339()));

    let params: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
    tx.execute(&sql, params.as_slice()).context("upsert stat row")?;
    Ok(())
}
