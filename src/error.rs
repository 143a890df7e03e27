use thiserror::Error;

/// Failures the pipeline surfaces to the run invoker. Each carries enough
/// context (team, season, week, column) to diagnose without re-running.
/// None of these are retried automatically; a failed run must be re-invoked.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required input column is absent from a raw data source.
    #[error("required column `{column}` missing from {input}")]
    Schema { column: String, input: String },

    /// A scheduled game references a team with no smoothed-stat history.
    /// The run aborts rather than emitting a null-diff row.
    #[error(
        "no smoothed stats for team `{team}` (game {game_id}, season {season} week {week})"
    )]
    TeamNotFound {
        team: String,
        game_id: String,
        season: u16,
        week: u8,
    },

    /// Fitted feature names/order diverge from the schema. A result computed
    /// against the wrong features is worse than no result.
    #[error("feature set mismatch: model expects [{actual}], schema is [{expected}]")]
    FeatureMismatch { expected: String, actual: String },

    /// Model or scaler artifact missing or corrupt. Fatal at startup.
    #[error("cannot load model artifact {path}: {reason}")]
    ModelLoad { path: String, reason: String },

    /// A diff the model needs rests on an undefined smoothed value (e.g. a
    /// 0-attempt completion percentage). Flagged, never coerced to zero.
    #[error("undefined `{stat}` for {team} in game {game_id}")]
    UndefinedFeature {
        stat: String,
        team: String,
        game_id: String,
    },
}
