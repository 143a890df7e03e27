use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use tracing_subscriber::EnvFilter;

use gridcast::history::{self, HistoryDb};
use gridcast::model::ModelArtifacts;
use gridcast::pipeline::{Pipeline, PipelineConfig};
use gridcast::schema::FeatureSchema;
use gridcast::snapshot;
use gridcast::source::StatsSource;

struct Args {
    season: Option<u16>,
    week: Option<u8>,
    db_path: PathBuf,
    model_dir: PathBuf,
    out_dir: PathBuf,
    cached: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        season: None,
        week: None,
        db_path: history::default_db_path(),
        model_dir: PathBuf::from("models"),
        out_dir: PathBuf::from("data"),
        cached: false,
    };

    let mut iter = std::env::args().skip(1);
    while let Some(flag) = iter.next() {
        match flag.as_str() {
            "--season" => args.season = Some(next_value(&mut iter, "--season")?.parse()?),
            "--week" => args.week = Some(next_value(&mut iter, "--week")?.parse()?),
            "--db" => args.db_path = PathBuf::from(next_value(&mut iter, "--db")?),
            "--models" => args.model_dir = PathBuf::from(next_value(&mut iter, "--models")?),
            "--out" => args.out_dir = PathBuf::from(next_value(&mut iter, "--out")?),
            "--cached" => args.cached = true,
            "--help" | "-h" => {
                println!(
                    "usage: gridcast [--season N] [--week N] [--db PATH] \
                     [--models DIR] [--out DIR] [--cached]"
                );
                std::process::exit(0);
            }
            other => return Err(anyhow!("unknown flag `{other}`")),
        }
    }
    Ok(args)
}

fn next_value(iter: &mut impl Iterator<Item = String>, name: &str) -> Result<String> {
    iter.next().ok_or_else(|| anyhow!("{name} requires a value"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = parse_args()?;
    let schema = FeatureSchema::current();

    if args.cached {
        // Cold-start display: show the last computed table without a run.
        let path = args.out_dir.join(snapshot::PREDICTIONS_FILE);
        let rows = snapshot::load_predictions(&path, schema)
            .with_context(|| format!("no cached predictions at {}", path.display()))?;
        print_table(&rows);
        return Ok(());
    }

    let db = HistoryDb::open(&args.db_path)
        .with_context(|| format!("open history db {}", args.db_path.display()))?;
    let artifacts = ModelArtifacts::load(&args.model_dir)?;

    let season = match args.season {
        Some(s) => s,
        None => db.current_season()?,
    };
    let week = match args.week {
        Some(w) => w,
        None => db.current_week()?,
    };
    let history_seasons = db.seasons()?;

    let cfg = PipelineConfig::new(season, week, history_seasons);
    let output = Pipeline::new(&db, &artifacts).run(&cfg)?;

    if output.slate_size == 0 {
        println!("No regular-season games scheduled for season {season} week {week}.");
        return Ok(());
    }

    println!("Season {season}, week {week}: home win probabilities\n");
    print_table(&output.predictions);

    snapshot::write_latest_team_stats(
        &args.out_dir.join(snapshot::TEAM_STATS_FILE),
        &output.latest_stats,
        schema,
    )?;
    snapshot::write_predictions(
        &args.out_dir.join(snapshot::PREDICTIONS_FILE),
        &output.predictions,
        schema,
    )?;
    println!("\nSnapshots written to {}", args.out_dir.display());
    Ok(())
}

fn print_table(rows: &[gridcast::predict::PredictionRow]) {
    println!("{:<24} {:<6} {:<6} {:>9}", "game", "home", "away", "P(home)");
    for row in rows {
        println!(
            "{:<24} {:<6} {:<6} {:>8.1}%",
            row.game_id,
            row.home_team,
            row.away_team,
            row.win_prob * 100.0
        );
    }
}
