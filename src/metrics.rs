//! Backtest scoring for binary home-win predictions.

#[derive(Debug, Clone, Copy)]
pub struct Metrics {
    pub samples: usize,
    pub brier: f64,
    pub log_loss: f64,
    pub accuracy: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct ReliabilityBin {
    pub bucket_start: f64,
    pub bucket_end: f64,
    pub count: usize,
    pub avg_pred: f64,
    pub actual_rate: f64,
}

pub fn evaluate(predictions: &[f64], outcomes: &[bool]) -> Metrics {
    if predictions.is_empty() || predictions.len() != outcomes.len() {
        return Metrics {
            samples: 0,
            brier: 0.0,
            log_loss: 0.0,
            accuracy: 0.0,
        };
    }

    let mut brier_sum = 0.0_f64;
    let mut log_loss_sum = 0.0_f64;
    let mut correct = 0usize;

    for (p, won) in predictions.iter().zip(outcomes) {
        let y = if *won { 1.0 } else { 0.0 };
        brier_sum += (p - y).powi(2);

        let actual_prob = if *won { *p } else { 1.0 - *p }.clamp(1e-12, 1.0);
        log_loss_sum += -actual_prob.ln();

        if (*p >= 0.5) == *won {
            correct += 1;
        }
    }

    let n = predictions.len() as f64;
    Metrics {
        samples: predictions.len(),
        brier: brier_sum / n,
        log_loss: log_loss_sum / n,
        accuracy: correct as f64 / n,
    }
}

/// Bucket predictions by predicted probability and compare against the
/// realized home-win rate per bucket.
pub fn reliability_bins(predictions: &[f64], outcomes: &[bool], bins: usize) -> Vec<ReliabilityBin> {
    let bins = bins.max(2);
    let mut counts = vec![0usize; bins];
    let mut pred_sum = vec![0.0_f64; bins];
    let mut actual_sum = vec![0.0_f64; bins];

    for (p, won) in predictions.iter().zip(outcomes) {
        let p = p.clamp(0.0, 1.0);
        let idx = ((p * bins as f64).floor() as usize).min(bins - 1);
        counts[idx] += 1;
        pred_sum[idx] += p;
        if *won {
            actual_sum[idx] += 1.0;
        }
    }

    let mut out = Vec::with_capacity(bins);
    for i in 0..bins {
        let count = counts[i];
        let (avg_pred, actual_rate) = if count > 0 {
            (pred_sum[i] / count as f64, actual_sum[i] / count as f64)
        } else {
            (0.0, 0.0)
        };
        out.push(ReliabilityBin {
            bucket_start: i as f64 / bins as f64,
            bucket_end: (i + 1) as f64 / bins as f64,
            count,
            avg_pred,
            actual_rate,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_predictions_have_zero_brier() {
        let m = evaluate(&[1.0, 0.0, 1.0], &[true, false, true]);
        assert_eq!(m.samples, 3);
        assert!(m.brier < 1e-12);
        assert_eq!(m.accuracy, 1.0);
    }

    #[test]
    fn coin_flip_brier_is_quarter() {
        let m = evaluate(&[0.5, 0.5, 0.5, 0.5], &[true, false, true, false]);
        assert!((m.brier - 0.25).abs() < 1e-12);
    }

    #[test]
    fn certain_wrong_prediction_does_not_blow_up_log_loss() {
        let m = evaluate(&[1.0], &[false]);
        assert!(m.log_loss.is_finite());
    }

    #[test]
    fn bins_track_counts_and_rates() {
        let preds = [0.05, 0.95, 0.92];
        let outcomes = [false, true, false];
        let bins = reliability_bins(&preds, &outcomes, 10);
        assert_eq!(bins[0].count, 1);
        assert_eq!(bins[9].count, 2);
        assert!((bins[9].actual_rate - 0.5).abs() < 1e-12);
    }
}
