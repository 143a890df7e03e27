use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use gridcast::ewma;
use gridcast::matchup;
use gridcast::schema::FeatureSchema;
use gridcast::stats::{GameRecord, GameType, TeamGameStat};

const TEAMS: usize = 32;
const SEASONS: u16 = 4;
const WEEKS: u8 = 18;

fn synthetic_stats() -> Vec<TeamGameStat> {
    let schema = FeatureSchema::current();
    let mut rows = Vec::new();
    for season in 0..SEASONS {
        for week in 1..=WEEKS {
            for team in 0..TEAMS {
                let base = (team as f64 + 1.0) * (week as f64);
                rows.push(TeamGameStat {
                    season: 2021 + season,
                    week,
                    team: format!("T{team:02}"),
                    opponent: format!("T{:02}", (team + 1) % TEAMS),
                    values: (0..schema.len())
                        .map(|i| Some(base + i as f64))
                        .collect(),
                });
            }
        }
    }
    rows
}

fn bench_smooth(c: &mut Criterion) {
    let rows = synthetic_stats();
    let schema = FeatureSchema::current();
    c.bench_function("ewma_smooth_full_history", |b| {
        b.iter(|| {
            let out = ewma::smooth(black_box(&rows), ewma::DEFAULT_ALPHA, schema);
            black_box(out.len());
        })
    });
}

fn bench_diff_slate(c: &mut Criterion) {
    let schema = FeatureSchema::current();
    let rows = synthetic_stats();
    let smoothed = ewma::smooth(&rows, ewma::DEFAULT_ALPHA, schema);
    let snapshot = matchup::latest_snapshot(&smoothed, 2021 + SEASONS - 1, WEEKS);

    let slate: Vec<GameRecord> = (0..TEAMS / 2)
        .map(|i| GameRecord {
            season: 2021 + SEASONS - 1,
            week: WEEKS,
            game_id: format!("g{i}"),
            game_type: GameType::Regular,
            home_team: format!("T{:02}", i * 2),
            away_team: format!("T{:02}", i * 2 + 1),
            home_score: None,
            away_score: None,
        })
        .collect();

    c.bench_function("diff_full_slate", |b| {
        b.iter(|| {
            let out = matchup::diff_games(black_box(&slate), &snapshot, schema).unwrap();
            black_box(out.len());
        })
    });
}

criterion_group!(benches, bench_smooth, bench_diff_slate);
criterion_main!(benches);
