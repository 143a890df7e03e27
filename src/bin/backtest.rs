use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use gridcast::history::{self, HistoryDb};
use gridcast::metrics;
use gridcast::model::ModelArtifacts;
use gridcast::pipeline::{Pipeline, PipelineConfig};
use gridcast::source::StatsSource;

struct Args {
    season: Option<u16>,
    from_week: u8,
    to_week: u8,
    db_path: PathBuf,
    model_dir: PathBuf,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        season: None,
        // Week 1 has no smoothed history; replays start at week 2.
        from_week: 2,
        to_week: 18,
        db_path: history::default_db_path(),
        model_dir: PathBuf::from("models"),
    };
    let mut iter = std::env::args().skip(1);
    while let Some(flag) = iter.next() {
        let value = iter
            .next()
            .ok_or_else(|| anyhow!("{flag} requires a value"))?;
        match flag.as_str() {
            "--season" => args.season = Some(value.parse()?),
            "--from-week" => args.from_week = value.parse()?,
            "--to-week" => args.to_week = value.parse()?,
            "--db" => args.db_path = PathBuf::from(value),
            "--models" => args.model_dir = PathBuf::from(value),
            other => return Err(anyhow!("unknown flag `{other}`")),
        }
    }
    Ok(args)
}

fn main() -> Result<()> {
    let args = parse_args()?;

    let db = HistoryDb::open(&args.db_path)
        .with_context(|| format!("open history db {}", args.db_path.display()))?;
    let artifacts = ModelArtifacts::load(&args.model_dir)?;

    let season = match args.season {
        Some(s) => s,
        None => db.current_season()?,
    };
    let history_seasons: Vec<u16> = db.seasons()?.into_iter().filter(|s| *s <= season).collect();

    // Outcomes for completed games of the backtest season.
    let outcomes: HashMap<String, bool> = db
        .load_schedules(&[season])?
        .into_iter()
        .filter_map(|g| g.home_win().map(|won| (g.game_id, won)))
        .collect();

    let pipeline = Pipeline::new(&db, &artifacts);
    let mut probs = Vec::new();
    let mut results = Vec::new();
    let mut skipped = 0usize;

    for week in args.from_week..=args.to_week {
        let cfg = PipelineConfig::new(season, week, history_seasons.clone());
        let output = match pipeline.run(&cfg) {
            Ok(out) => out,
            Err(err) => {
                eprintln!("week {week}: {err}");
                continue;
            }
        };
        for row in &output.predictions {
            match outcomes.get(&row.game_id) {
                Some(won) => {
                    probs.push(row.win_prob);
                    results.push(*won);
                }
                None => skipped += 1,
            }
        }
    }

    if probs.is_empty() {
        return Err(anyhow!(
            "no completed games to score for season {season} weeks {}-{}",
            args.from_week,
            args.to_week
        ));
    }

    let m = metrics::evaluate(&probs, &results);
    println!(
        "Backtest: season {season}, weeks {}-{}",
        args.from_week, args.to_week
    );
    println!("Games scored: {} (skipped unplayed: {skipped})", m.samples);
    println!("Accuracy: {:.3}", m.accuracy);
    println!("Brier:    {:.4}", m.brier);
    println!("Log loss: {:.4}", m.log_loss);

    println!("\nReliability (predicted vs realized home-win rate):");
    for bin in metrics::reliability_bins(&probs, &results, 10) {
        if bin.count == 0 {
            continue;
        }
        println!(
            "  {:.1}-{:.1}  n={:<4} pred={:.3} actual={:.3}",
            bin.bucket_start, bin.bucket_end, bin.count, bin.avg_pred, bin.actual_rate
        );
    }
    Ok(())
}
