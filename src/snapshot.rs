use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::error::PipelineError;
use crate::ewma::SmoothedTeamStat;
use crate::predict::PredictionRow;
use crate::schema::FeatureSchema;

pub const TEAM_STATS_FILE: &str = "latest_team_stats.csv";
pub const PREDICTIONS_FILE: &str = "latest_predictions.csv";

/// Latest smoothed row per team, one line each, `_ewma` columns in schema
/// order. Undefined cells are written empty, never as zero.
pub fn write_latest_team_stats(
    path: &Path,
    rows: &[SmoothedTeamStat],
    schema: &FeatureSchema,
) -> Result<()> {
    let tmp = tmp_writer(path)?;
    let mut writer = tmp.writer;

    let mut header = vec![
        "team".to_string(),
        "season".to_string(),
        "week".to_string(),
    ];
    header.extend((0..schema.len()).map(|i| schema.ewma_name(i)));
    writer.write_record(&header).context("write stats header")?;

    let mut sorted: Vec<&SmoothedTeamStat> = rows.iter().collect();
    sorted.sort_by(|a, b| a.team.cmp(&b.team));
    for row in sorted {
        let mut record = vec![
            row.team.clone(),
            row.season.to_string(),
            row.week.to_string(),
        ];
        record.extend(row.values.iter().map(format_cell));
        writer.write_record(&record).context("write stats row")?;
    }
    writer.flush().context("flush stats csv")?;
    drop(writer);

    swap_into_place(&tmp.path, path)
}

/// Prediction table: identifying columns, `diff_` columns in schema order,
/// win_prob last. This is the file the dashboard reads for cold-start.
pub fn write_predictions(
    path: &Path,
    rows: &[PredictionRow],
    schema: &FeatureSchema,
) -> Result<()> {
    let tmp = tmp_writer(path)?;
    let mut writer = tmp.writer;
    writer
        .write_record(prediction_header(schema))
        .context("write predictions header")?;

    for row in rows {
        let mut record = vec![
            row.game_id.clone(),
            row.home_team.clone(),
            row.away_team.clone(),
        ];
        record.extend(row.diffs.iter().map(|v| format!("{v:.6}")));
        record.push(format!("{:.6}", row.win_prob));
        writer.write_record(&record).context("write prediction row")?;
    }
    writer.flush().context("flush predictions csv")?;
    drop(writer);

    swap_into_place(&tmp.path, path)
}

/// Read back a previously written prediction table. The header must match
/// the schema byte for byte; a stale file from another schema version is
/// refused rather than reinterpreted.
pub fn load_predictions(path: &Path, schema: &FeatureSchema) -> Result<Vec<PredictionRow>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("open predictions csv {}", path.display()))?;

    let expected = prediction_header(schema);
    let headers = reader.headers().context("read predictions header")?;
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        return Err(PipelineError::FeatureMismatch {
            expected: expected.join(","),
            actual: actual.join(","),
        }
        .into());
    }

    let mut out = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("predictions row {}", line + 2))?;
        let mut diffs = Vec::with_capacity(schema.len());
        for i in 0..schema.len() {
            let raw = record.get(3 + i).unwrap_or("");
            diffs.push(
                raw.parse::<f64>()
                    .with_context(|| format!("row {}: bad diff `{raw}`", line + 2))?,
            );
        }
        let prob_cell = record.get(3 + schema.len()).unwrap_or("");
        out.push(PredictionRow {
            game_id: record.get(0).unwrap_or("").to_string(),
            home_team: record.get(1).unwrap_or("").to_string(),
            away_team: record.get(2).unwrap_or("").to_string(),
            diffs,
            win_prob: prob_cell
                .parse::<f64>()
                .with_context(|| format!("row {}: bad win_prob `{prob_cell}`", line + 2))?,
        });
    }
    Ok(out)
}

fn prediction_header(schema: &FeatureSchema) -> Vec<String> {
    let mut header = vec![
        "game_id".to_string(),
        "home_team".to_string(),
        "away_team".to_string(),
    ];
    header.extend(schema.diff_names());
    header.push("win_prob".to_string());
    header
}

fn format_cell(value: &Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.6}"),
        None => String::new(),
    }
}

struct TmpWriter {
    path: std::path::PathBuf,
    writer: csv::Writer<fs::File>,
}

/// Snapshots are written to a sibling tmp file and renamed into place so a
/// concurrent dashboard read never sees a half-written table.
fn tmp_writer(path: &Path) -> Result<TmpWriter> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).ok();
    }
    let tmp = path.with_extension("csv.tmp");
    let writer = csv::Writer::from_path(&tmp)
        .with_context(|| format!("open {}", tmp.display()))?;
    Ok(TmpWriter { path: tmp, writer })
}

fn swap_into_place(tmp: &Path, path: &Path) -> Result<()> {
    fs::rename(tmp, path).with_context(|| format!("swap {}", path.display()))?;
    Ok(())
}
