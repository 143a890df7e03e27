use anyhow::{Context, Result};

use crate::ewma::{self, SmoothedTeamStat};
use crate::matchup;
use crate::model::ModelArtifacts;
use crate::predict::{self, PredictionRow};
use crate::schema::FeatureSchema;
use crate::source::StatsSource;
use crate::stats::{self, GameType};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Season and week being predicted.
    pub season: u16,
    pub week: u8,
    /// Seasons of history to smooth over (must include `season`).
    pub history_seasons: Vec<u16>,
    pub alpha: f64,
}

impl PipelineConfig {
    pub fn new(season: u16, week: u8, history_seasons: Vec<u16>) -> Self {
        Self {
            season,
            week,
            history_seasons,
            alpha: ewma::DEFAULT_ALPHA,
        }
    }
}

#[derive(Debug)]
pub struct RunOutput {
    pub predictions: Vec<PredictionRow>,
    /// Latest smoothed row per team at the target week, for the stats
    /// snapshot and the dashboard's trend explorer.
    pub latest_stats: Vec<SmoothedTeamStat>,
    pub slate_size: usize,
}

/// One pipeline invocation, constructed from explicit inputs. Holds no
/// mutable state; concurrent runs over the same source cannot interfere.
pub struct Pipeline<'a> {
    source: &'a dyn StatsSource,
    artifacts: &'a ModelArtifacts,
    schema: &'static FeatureSchema,
}

impl<'a> Pipeline<'a> {
    pub fn new(source: &'a dyn StatsSource, artifacts: &'a ModelArtifacts) -> Self {
        Self {
            source,
            artifacts,
            schema: FeatureSchema::current(),
        }
    }

    /// Full run: either a complete prediction set or an error, never a
    /// partial table. Stages run strictly in sequence over immutable data.
    pub fn run(&self, cfg: &PipelineConfig) -> Result<RunOutput> {
        self.artifacts.validate_schema(self.schema)?;

        let schedules = self
            .source
            .load_schedules(&cfg.history_seasons)
            .context("load schedules")?;
        let raw_stats = self
            .source
            .load_team_stats(&cfg.history_seasons)
            .context("load team stats")?;
        tracing::info!(
            games = schedules.len(),
            stat_rows = raw_stats.len(),
            seasons = ?cfg.history_seasons,
            "loaded history"
        );

        // Only stat lines strictly before the target week feed the smoother;
        // the slate being predicted must never see its own box scores.
        let mut history = raw_stats;
        history.retain(|r| {
            r.season < cfg.season || (r.season == cfg.season && r.week < cfg.week)
        });

        let aggregated = stats::aggregate(&history, self.schema)?;
        let smoothed = ewma::smooth(&aggregated, cfg.alpha, self.schema);
        let snapshot = matchup::latest_snapshot(&smoothed, cfg.season, cfg.week);
        tracing::debug!(teams = snapshot.len(), "built latest-week snapshot");

        let slate: Vec<_> = schedules
            .iter()
            .filter(|g| {
                g.season == cfg.season
                    && g.week == cfg.week
                    && g.game_type == GameType::Regular
            })
            .cloned()
            .collect();

        let diff_rows = matchup::diff_games(&slate, &snapshot, self.schema)?;
        let predictions = predict::predict(&diff_rows, self.artifacts, self.schema)?;
        tracing::info!(
            season = cfg.season,
            week = cfg.week,
            slate = slate.len(),
            "pipeline run complete"
        );

        let mut latest_stats: Vec<SmoothedTeamStat> =
            snapshot.values().map(|s| (*s).clone()).collect();
        latest_stats.sort_by(|a, b| a.team.cmp(&b.team));

        Ok(RunOutput {
            predictions,
            latest_stats,
            slate_size: slate.len(),
        })
    }
}
