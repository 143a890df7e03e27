use std::collections::HashMap;

use crate::error::PipelineError;
use crate::ewma::SmoothedTeamStat;
use crate::schema::FeatureSchema;
use crate::stats::GameRecord;

/// One differential feature row per scheduled game: home's latest smoothed
/// value minus away's, for every tracked statistic, in schema order. All
/// cells are defined; an undefined input fails the build instead.
#[derive(Debug, Clone)]
pub struct MatchupDiffRow {
    pub game_id: String,
    pub home_team: String,
    pub away_team: String,
    pub diffs: Vec<f64>,
}

/// Most recent smoothed row per team up to and including the target week of
/// the target season. A bye-week team carries its last played week forward;
/// a team with no rows in the season is simply absent from the map.
pub fn latest_snapshot<'a>(
    smoothed: &'a [SmoothedTeamStat],
    season: u16,
    week: u8,
) -> HashMap<&'a str, &'a SmoothedTeamStat> {
    let mut latest: HashMap<&str, &SmoothedTeamStat> = HashMap::new();
    for row in smoothed {
        if row.season != season || row.week > week {
            continue;
        }
        match latest.get(row.team.as_str()) {
            Some(existing) if existing.week >= row.week => {}
            _ => {
                latest.insert(row.team.as_str(), row);
            }
        }
    }
    latest
}

/// Build one diff row per scheduled game. Fails with `TeamNotFound` when a
/// game references a team absent from the snapshot, and with
/// `UndefinedFeature` when a needed smoothed cell is undefined. Both abort
/// the run; a partially-diffed slate is never returned.
pub fn diff_games(
    games: &[GameRecord],
    snapshot: &HashMap<&str, &SmoothedTeamStat>,
    schema: &FeatureSchema,
) -> Result<Vec<MatchupDiffRow>, PipelineError> {
    let mut out = Vec::with_capacity(games.len());
    for game in games {
        let home = lookup(snapshot, &game.home_team, game)?;
        let away = lookup(snapshot, &game.away_team, game)?;

        let mut diffs = Vec::with_capacity(schema.len());
        for (idx, stat) in schema.stats().iter().enumerate() {
            let h = defined(home.values[idx], stat, &game.home_team, game)?;
            let a = defined(away.values[idx], stat, &game.away_team, game)?;
            diffs.push(h - a);
        }

        out.push(MatchupDiffRow {
            game_id: game.game_id.clone(),
            home_team: game.home_team.clone(),
            away_team: game.away_team.clone(),
            diffs,
        });
    }
    Ok(out)
}

fn lookup<'a>(
    snapshot: &HashMap<&str, &'a SmoothedTeamStat>,
    team: &str,
    game: &GameRecord,
) -> Result<&'a SmoothedTeamStat, PipelineError> {
    snapshot
        .get(team)
        .copied()
        .ok_or_else(|| PipelineError::TeamNotFound {
            team: team.to_string(),
            game_id: game.game_id.clone(),
            season: game.season,
            week: game.week,
        })
}

fn defined(
    value: Option<f64>,
    stat: &str,
    team: &str,
    game: &GameRecord,
) -> Result<f64, PipelineError> {
    value.ok_or_else(|| PipelineError::UndefinedFeature {
        stat: stat.to_string(),
        team: team.to_string(),
        game_id: game.game_id.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::GameType;

    fn smoothed(season: u16, week: u8, team: &str, fill: f64) -> SmoothedTeamStat {
        SmoothedTeamStat {
            season,
            week,
            team: team.to_string(),
            values: vec![Some(fill); FeatureSchema::current().len()],
        }
    }

    fn game(id: &str, home: &str, away: &str) -> GameRecord {
        GameRecord {
            season: 2024,
            week: 5,
            game_id: id.to_string(),
            game_type: GameType::Regular,
            home_team: home.to_string(),
            away_team: away.to_string(),
            home_score: None,
            away_score: None,
        }
    }

    #[test]
    fn snapshot_carries_bye_week_forward() {
        let rows = vec![
            smoothed(2024, 3, "KC", 1.0),
            smoothed(2024, 4, "BUF", 2.0),
            // KC on bye in week 4; week 3 row should win.
            smoothed(2023, 18, "KC", 9.0),
        ];
        let snap = latest_snapshot(&rows, 2024, 5);
        assert_eq!(snap["KC"].week, 3);
        assert_eq!(snap["BUF"].week, 4);
    }

    #[test]
    fn snapshot_ignores_future_weeks_and_other_seasons() {
        let rows = vec![smoothed(2024, 9, "KC", 1.0), smoothed(2023, 4, "BUF", 2.0)];
        let snap = latest_snapshot(&rows, 2024, 5);
        assert!(snap.is_empty());
    }

    #[test]
    fn diffs_are_antisymmetric() {
        let rows = vec![smoothed(2024, 4, "KC", 3.0), smoothed(2024, 4, "BUF", 1.0)];
        let snap = latest_snapshot(&rows, 2024, 5);
        let schema = FeatureSchema::current();

        let fwd = diff_games(&[game("g1", "KC", "BUF")], &snap, schema).unwrap();
        let rev = diff_games(&[game("g1", "BUF", "KC")], &snap, schema).unwrap();
        for (d, r) in fwd[0].diffs.iter().zip(&rev[0].diffs) {
            assert_eq!(*d, -*r);
        }
    }

    #[test]
    fn missing_team_is_an_error_not_a_null_row() {
        let rows = vec![smoothed(2024, 4, "KC", 3.0)];
        let snap = latest_snapshot(&rows, 2024, 5);
        let err = diff_games(&[game("g1", "KC", "HOU")], &snap, FeatureSchema::current())
            .unwrap_err();
        match err {
            PipelineError::TeamNotFound { team, .. } => assert_eq!(team, "HOU"),
            other => panic!("expected TeamNotFound, got {other:?}"),
        }
    }

    #[test]
    fn undefined_cell_is_flagged_with_context() {
        let mut kc = smoothed(2024, 4, "KC", 3.0);
        let idx = FeatureSchema::current()
            .index_of("completion_pct")
            .unwrap();
        kc.values[idx] = None;
        let rows = vec![kc, smoothed(2024, 4, "BUF", 1.0)];
        let snap = latest_snapshot(&rows, 2024, 5);

        let err = diff_games(&[game("g1", "KC", "BUF")], &snap, FeatureSchema::current())
            .unwrap_err();
        match err {
            PipelineError::UndefinedFeature { stat, team, .. } => {
                assert_eq!(stat, "completion_pct");
                assert_eq!(team, "KC");
            }
            other => panic!("expected UndefinedFeature, got {other:?}"),
        }
    }
}
