use std::collections::BTreeMap;

use crate::schema::FeatureSchema;
use crate::stats::TeamGameStat;

/// Smoothing factor the production model was trained against.
pub const DEFAULT_ALPHA: f64 = 0.4;

/// One team's exponentially-smoothed statistic vector as of a given week.
/// Exactly one row per raw game row, values in schema order.
#[derive(Debug, Clone)]
pub struct SmoothedTeamStat {
    pub season: u16,
    pub week: u8,
    pub team: String,
    pub values: Vec<Option<f64>>,
}

/// EWMA per (team, season, statistic) over week-ascending raw values:
///
///   s1 = x1
///   sk = alpha * xk + (1 - alpha) * s(k-1)
///
/// Smoothing state resets at every season boundary; a week-1 value never
/// depends on the prior season's trailing average. An undefined raw value
/// leaves that week's smoothed cell undefined and does not advance the
/// state, since folding in a stand-in zero would bias the average.
pub fn smooth(rows: &[TeamGameStat], alpha: f64, schema: &FeatureSchema) -> Vec<SmoothedTeamStat> {
    // BTreeMap keeps output ordering independent of input order.
    let mut grouped: BTreeMap<(u16, String), Vec<&TeamGameStat>> = BTreeMap::new();
    for row in rows {
        grouped
            .entry((row.season, row.team.clone()))
            .or_default()
            .push(row);
    }

    let mut out = Vec::with_capacity(rows.len());
    for ((season, team), mut games) in grouped {
        games.sort_by_key(|g| g.week);

        let mut state: Vec<Option<f64>> = vec![None; schema.len()];
        for game in games {
            let mut values = Vec::with_capacity(schema.len());
            for (idx, raw) in game.values.iter().enumerate() {
                match raw {
                    Some(x) => {
                        let next = match state[idx] {
                            Some(prev) => alpha * x + (1.0 - alpha) * prev,
                            None => *x,
                        };
                        state[idx] = Some(next);
                        values.push(Some(next));
                    }
                    None => values.push(None),
                }
            }
            out.push(SmoothedTeamStat {
                season,
                week: game.week,
                team: team.clone(),
                values,
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn stat_row(season: u16, week: u8, team: &str, value: Option<f64>) -> TeamGameStat {
        let schema = FeatureSchema::current();
        let mut values = vec![Some(0.0); schema.len()];
        values[0] = value;
        TeamGameStat {
            season,
            week,
            team: team.to_string(),
            opponent: "OPP".to_string(),
            values,
        }
    }

    #[test]
    fn single_observation_is_identity() {
        let schema = FeatureSchema::current();
        let rows = vec![stat_row(2024, 1, "KC", Some(312.0))];
        let smoothed = smooth(&rows, DEFAULT_ALPHA, schema);
        assert_eq!(smoothed.len(), 1);
        assert_eq!(smoothed[0].values[0], Some(312.0));
    }

    #[test]
    fn recurrence_matches_hand_computation() {
        let schema = FeatureSchema::current();
        let rows = vec![
            stat_row(2024, 1, "KC", Some(10.0)),
            stat_row(2024, 2, "KC", Some(20.0)),
            stat_row(2024, 3, "KC", Some(30.0)),
        ];
        let smoothed = smooth(&rows, 0.4, schema);
        assert_relative_eq!(smoothed[0].values[0].unwrap(), 10.0);
        assert_relative_eq!(smoothed[1].values[0].unwrap(), 14.0);
        assert_relative_eq!(smoothed[2].values[0].unwrap(), 19.6);
    }

    #[test]
    fn seasons_are_isolated() {
        let schema = FeatureSchema::current();
        let rows = vec![
            stat_row(2023, 17, "KC", Some(400.0)),
            stat_row(2023, 18, "KC", Some(400.0)),
            stat_row(2024, 1, "KC", Some(100.0)),
        ];
        let smoothed = smooth(&rows, 0.4, schema);
        let week1 = smoothed
            .iter()
            .find(|s| s.season == 2024 && s.week == 1)
            .unwrap();
        // Fresh seed: week 1 equals the raw value regardless of last season.
        assert_eq!(week1.values[0], Some(100.0));
    }

    #[test]
    fn undefined_raw_stays_undefined_and_skips_state() {
        let schema = FeatureSchema::current();
        let rows = vec![
            stat_row(2024, 1, "NYJ", Some(10.0)),
            stat_row(2024, 2, "NYJ", None),
            stat_row(2024, 3, "NYJ", Some(20.0)),
        ];
        let smoothed = smooth(&rows, 0.4, schema);
        assert_eq!(smoothed[1].values[0], None);
        // Week 3 resumes from week 1's state, not from an imputed zero.
        assert_relative_eq!(smoothed[2].values[0].unwrap(), 0.4 * 20.0 + 0.6 * 10.0);
    }

    #[test]
    fn no_rows_means_no_output() {
        let schema = FeatureSchema::current();
        assert!(smooth(&[], DEFAULT_ALPHA, schema).is_empty());
    }

    #[test]
    fn output_order_is_input_order_independent() {
        let schema = FeatureSchema::current();
        let a = vec![
            stat_row(2024, 2, "KC", Some(2.0)),
            stat_row(2024, 1, "BUF", Some(1.0)),
            stat_row(2024, 1, "KC", Some(1.0)),
        ];
        let mut b = a.clone();
        b.reverse();
        let keys_a: Vec<_> = smooth(&a, 0.4, schema)
            .iter()
            .map(|s| (s.season, s.team.clone(), s.week))
            .collect();
        let keys_b: Vec<_> = smooth(&b, 0.4, schema)
            .iter()
            .map(|s| (s.season, s.team.clone(), s.week))
            .collect();
        assert_eq!(keys_a, keys_b);
    }
}
