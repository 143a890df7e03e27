use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use gridcast::history::{self, HistoryDb};
use gridcast::source::{read_schedule_csv, read_team_stats_csv};

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut positional = Vec::new();
    let mut db_path: Option<PathBuf> = None;

    let mut idx = 0;
    while idx < args.len() {
        match args[idx].as_str() {
            "--db" => {
                let next = args
                    .get(idx + 1)
                    .ok_or_else(|| anyhow!("--db requires a value"))?;
                db_path = Some(PathBuf::from(next));
                idx += 2;
            }
            other => {
                positional.push(PathBuf::from(other));
                idx += 1;
            }
        }
    }

    if positional.len() != 2 {
        return Err(anyhow!(
            "usage: ingest <schedules.csv> <team_stats.csv> [--db PATH]"
        ));
    }
    let db_path = db_path.unwrap_or_else(history::default_db_path);

    let games = read_schedule_csv(&positional[0])
        .with_context(|| format!("read schedules {}", positional[0].display()))?;
    let stats = read_team_stats_csv(&positional[1])
        .with_context(|| format!("read team stats {}", positional[1].display()))?;

    let mut db = HistoryDb::open(&db_path)?;
    let source = format!("{} + {}", positional[0].display(), positional[1].display());
    let summary = db.ingest(&games, &stats, &source)?;

    println!("Ingest complete");
    println!("DB: {}", db_path.display());
    println!("Seasons: {:?}", summary.seasons);
    println!("Games upserted: {}", summary.games_upserted);
    println!("Stat rows upserted: {}", summary.stat_rows_upserted);
    Ok(())
}
