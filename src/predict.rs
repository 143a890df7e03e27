use crate::error::PipelineError;
use crate::matchup::MatchupDiffRow;
use crate::model::ModelArtifacts;
use crate::schema::FeatureSchema;

/// A diff row with the classifier's estimated home-win probability attached.
/// Created once per run, never mutated.
#[derive(Debug, Clone)]
pub struct PredictionRow {
    pub game_id: String,
    pub home_team: String,
    pub away_team: String,
    pub diffs: Vec<f64>,
    pub win_prob: f64,
}

/// Standardize the fixed-order diff matrix and run the classifier. The
/// fitted feature list is validated against the schema before any math; a
/// mismatch aborts the run. Output is sorted by win probability descending
/// (display order only, ties broken by game id for stable output).
pub fn predict(
    rows: &[MatchupDiffRow],
    artifacts: &ModelArtifacts,
    schema: &FeatureSchema,
) -> Result<Vec<PredictionRow>, PipelineError> {
    artifacts.validate_schema(schema)?;

    let matrix: Vec<Vec<f64>> = rows.iter().map(|r| r.diffs.clone()).collect();
    let scaled = artifacts.scaler.transform(&matrix);
    let probs = artifacts.model.predict_proba(&scaled);

    let mut out: Vec<PredictionRow> = rows
        .iter()
        .zip(&probs)
        .map(|(row, p)| PredictionRow {
            game_id: row.game_id.clone(),
            home_team: row.home_team.clone(),
            away_team: row.away_team.clone(),
            diffs: row.diffs.clone(),
            win_prob: p[1],
        })
        .collect();

    out.sort_by(|a, b| {
        b.win_prob
            .partial_cmp(&a.win_prob)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.game_id.cmp(&b.game_id))
    });

    tracing::debug!(games = out.len(), "scored matchup slate");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LogisticModel, StandardScaler};

    fn identity_artifacts(schema: &FeatureSchema, weights: Vec<f64>) -> ModelArtifacts {
        let names = schema.diff_names();
        ModelArtifacts {
            scaler: StandardScaler {
                feature_names: names.clone(),
                mean: vec![0.0; schema.len()],
                scale: vec![1.0; schema.len()],
            },
            model: LogisticModel {
                feature_names: names,
                coefficients: weights,
                intercept: 0.0,
            },
        }
    }

    fn diff_row(id: &str, schema: &FeatureSchema, stat: &str, diff: f64) -> MatchupDiffRow {
        let mut diffs = vec![0.0; schema.len()];
        diffs[schema.index_of(stat).unwrap()] = diff;
        MatchupDiffRow {
            game_id: id.to_string(),
            home_team: "HOME".to_string(),
            away_team: "AWAY".to_string(),
            diffs,
        }
    }

    #[test]
    fn positive_completion_pct_edge_favors_home() {
        let schema = FeatureSchema::current();
        let mut weights = vec![0.0; schema.len()];
        weights[schema.index_of("completion_pct").unwrap()] = 4.0;
        let artifacts = identity_artifacts(schema, weights);

        // Home smoothed 0.65 vs away 0.58, all other diffs zero.
        let rows = vec![diff_row("g1", schema, "completion_pct", 0.65 - 0.58)];
        let out = predict(&rows, &artifacts, schema).unwrap();
        assert!(out[0].win_prob > 0.5);
    }

    #[test]
    fn output_sorted_by_probability_descending() {
        let schema = FeatureSchema::current();
        let mut weights = vec![0.0; schema.len()];
        weights[schema.index_of("turnover_margin").unwrap()] = 1.0;
        let artifacts = identity_artifacts(schema, weights);

        let rows = vec![
            diff_row("low", schema, "turnover_margin", -2.0),
            diff_row("high", schema, "turnover_margin", 2.0),
            diff_row("mid", schema, "turnover_margin", 0.0),
        ];
        let out = predict(&rows, &artifacts, schema).unwrap();
        let ids: Vec<&str> = out.iter().map(|r| r.game_id.as_str()).collect();
        assert_eq!(ids, ["high", "mid", "low"]);
    }

    #[test]
    fn wrong_feature_order_is_fatal() {
        let schema = FeatureSchema::current();
        let mut artifacts = identity_artifacts(schema, vec![0.0; schema.len()]);
        artifacts.scaler.feature_names.swap(0, 1);
        artifacts.model.feature_names.swap(0, 1);

        let rows = vec![diff_row("g1", schema, "completions", 1.0)];
        let err = predict(&rows, &artifacts, schema).unwrap_err();
        assert!(matches!(err, PipelineError::FeatureMismatch { .. }));
    }

    #[test]
    fn empty_slate_is_empty_output() {
        let schema = FeatureSchema::current();
        let artifacts = identity_artifacts(schema, vec![0.0; schema.len()]);
        assert!(predict(&[], &artifacts, schema).unwrap().is_empty());
    }
}
