use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::schema::FeatureSchema;

pub const SCALER_FILE: &str = "scaler.json";
pub const MODEL_FILE: &str = "model.json";

/// Fitted standardization transform: per-feature mean and scale, with the
/// feature-name list it was fitted on stored alongside.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    pub feature_names: Vec<String>,
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn transform(&self, matrix: &[Vec<f64>]) -> Vec<Vec<f64>> {
        matrix
            .iter()
            .map(|row| {
                row.iter()
                    .zip(self.mean.iter().zip(&self.scale))
                    .map(|(x, (m, s))| (x - m) / s.max(1e-12))
                    .collect()
            })
            .collect()
    }
}

/// Fitted binary logistic classifier. `predict_proba` returns
/// [P(home loss), P(home win)] per row, matching the training contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticModel {
    pub feature_names: Vec<String>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LogisticModel {
    pub fn predict_proba(&self, matrix: &[Vec<f64>]) -> Vec<[f64; 2]> {
        matrix
            .iter()
            .map(|row| {
                let z: f64 = self.intercept
                    + row
                        .iter()
                        .zip(&self.coefficients)
                        .map(|(x, w)| x * w)
                        .sum::<f64>();
                let p = sigmoid(z);
                [1.0 - p, p]
            })
            .collect()
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        // Numerically stable branch for large negative z.
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Scaler + classifier loaded once per run and treated as immutable.
#[derive(Debug, Clone)]
pub struct ModelArtifacts {
    pub scaler: StandardScaler,
    pub model: LogisticModel,
}

impl ModelArtifacts {
    /// Load both artifacts from a directory. Missing or corrupt files are
    /// fatal at startup; inconsistent shapes or feature lists are refused.
    pub fn load(dir: &Path) -> Result<Self, PipelineError> {
        let scaler: StandardScaler = load_json(&dir.join(SCALER_FILE))?;
        let model: LogisticModel = load_json(&dir.join(MODEL_FILE))?;

        if scaler.mean.len() != scaler.feature_names.len()
            || scaler.scale.len() != scaler.feature_names.len()
        {
            return Err(PipelineError::ModelLoad {
                path: dir.join(SCALER_FILE).display().to_string(),
                reason: "mean/scale length disagrees with feature_names".to_string(),
            });
        }
        if model.coefficients.len() != model.feature_names.len() {
            return Err(PipelineError::ModelLoad {
                path: dir.join(MODEL_FILE).display().to_string(),
                reason: "coefficient length disagrees with feature_names".to_string(),
            });
        }
        if scaler.feature_names != model.feature_names {
            return Err(PipelineError::FeatureMismatch {
                expected: scaler.feature_names.join(","),
                actual: model.feature_names.join(","),
            });
        }
        Ok(Self { scaler, model })
    }

    /// Check the fitted feature list against the canonical schema.
    pub fn validate_schema(&self, schema: &FeatureSchema) -> Result<(), PipelineError> {
        schema.validate_feature_names(&self.scaler.feature_names)
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)
            .with_context(|| format!("create model dir {}", dir.display()))?;
        write_json(&dir.join(SCALER_FILE), &self.scaler)?;
        write_json(&dir.join(MODEL_FILE), &self.model)?;
        Ok(())
    }
}

fn load_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, PipelineError> {
    let raw = fs::read_to_string(path).map_err(|err| PipelineError::ModelLoad {
        path: path.display().to_string(),
        reason: err.to_string(),
    })?;
    serde_json::from_str(&raw).map_err(|err| PipelineError::ModelLoad {
        path: path.display().to_string(),
        reason: err.to_string(),
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("serialize model artifact")?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("swap {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("diff_s{i}")).collect()
    }

    #[test]
    fn transform_standardizes() {
        let scaler = StandardScaler {
            feature_names: names(2),
            mean: vec![10.0, 0.0],
            scale: vec![2.0, 1.0],
        };
        let out = scaler.transform(&[vec![14.0, 3.0]]);
        assert_relative_eq!(out[0][0], 2.0);
        assert_relative_eq!(out[0][1], 3.0);
    }

    #[test]
    fn zero_scale_does_not_divide_by_zero() {
        let scaler = StandardScaler {
            feature_names: names(1),
            mean: vec![1.0],
            scale: vec![0.0],
        };
        let out = scaler.transform(&[vec![2.0]]);
        assert!(out[0][0].is_finite());
    }

    #[test]
    fn predict_proba_rows_sum_to_one() {
        let model = LogisticModel {
            feature_names: names(2),
            coefficients: vec![1.5, -0.5],
            intercept: 0.1,
        };
        for probs in model.predict_proba(&[vec![0.3, -1.0], vec![-4.0, 2.0]]) {
            assert_relative_eq!(probs[0] + probs[1], 1.0, epsilon = 1e-12);
            assert!(probs[1] >= 0.0 && probs[1] <= 1.0);
        }
    }

    #[test]
    fn zero_logit_is_even_odds() {
        let model = LogisticModel {
            feature_names: names(1),
            coefficients: vec![2.0],
            intercept: 0.0,
        };
        let probs = model.predict_proba(&[vec![0.0]]);
        assert_relative_eq!(probs[0][1], 0.5);
    }

    #[test]
    fn load_rejects_disagreeing_artifacts() {
        let dir = std::env::temp_dir().join(format!("gridcast_model_{}", std::process::id()));
        let artifacts = ModelArtifacts {
            scaler: StandardScaler {
                feature_names: names(2),
                mean: vec![0.0, 0.0],
                scale: vec![1.0, 1.0],
            },
            model: LogisticModel {
                feature_names: vec!["diff_other".to_string(), "diff_s1".to_string()],
                coefficients: vec![1.0, 1.0],
                intercept: 0.0,
            },
        };
        artifacts.save(&dir).unwrap();
        let err = ModelArtifacts::load(&dir).unwrap_err();
        assert!(matches!(err, PipelineError::FeatureMismatch { .. }));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_missing_artifact_is_model_load_error() {
        let err = ModelArtifacts::load(Path::new("/nonexistent/gridcast")).unwrap_err();
        assert!(matches!(err, PipelineError::ModelLoad { .. }));
    }
}
