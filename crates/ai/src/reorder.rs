use serde::{Deserialize, Serialize};

use stockroom_core::MaterialId;

use crate::job::AiJob;
use crate::result::AiError;

/// Coefficient-of-variation bound below which a full window is `high` confidence.
pub const DEFAULT_CV_BOUND: f64 = 0.5;

/// Minimum number of months for `high` confidence.
const HIGH_CONFIDENCE_MONTHS: usize = 3;
/// Minimum number of months for `medium` confidence.
const MEDIUM_CONFIDENCE_MONTHS: usize = 2;

/// How much the usage history backs the prediction.
///
/// Declared weakest first so `Ord` compares confidence.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// Snapshot handed to [`ReorderJob`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderInput {
    pub material_id: MaterialId,
    /// Monthly usage totals, oldest month first. Months without withdrawals are 0.
    pub monthly_usage: Vec<u64>,
    pub current_quantity: u64,
    pub alert_threshold: u64,
}

/// Reorder signal for one material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReorderPrediction {
    pub material_id: MaterialId,
    pub predicted_usage_next_30_days: f64,
    pub should_reorder: bool,
    pub confidence: Confidence,
    pub months_of_data: usize,
    pub coefficient_of_variation: f64,
}

/// Moving-average reorder heuristic.
///
/// - Each monthly total counts as one 30-day period, so the 30-day forecast is
///   the mean of the window.
/// - `should_reorder` when `current_quantity - forecast <= alert_threshold`.
/// - Confidence: `high` with at least 3 months and a coefficient of variation
///   (population std / mean) below the bound, `medium` with at least 2 months,
///   otherwise `low`.
///
/// This is a heuristic, not a validated forecast. The only guarantees are
/// determinism and that more months never lower the confidence label for an
/// equally stable history.
#[derive(Debug, Clone)]
pub struct ReorderJob {
    input: ReorderInput,
    cv_bound: f64,
}

impl ReorderJob {
    pub fn new(input: ReorderInput) -> Self {
        Self {
            input,
            cv_bound: DEFAULT_CV_BOUND,
        }
    }

    pub fn with_cv_bound(mut self, cv_bound: f64) -> Self {
        self.cv_bound = cv_bound;
        self
    }
}

impl AiJob for ReorderJob {
    type Input = ReorderInput;
    type Output = ReorderPrediction;

    fn input(&self) -> &Self::Input {
        &self.input
    }

    fn run(&self) -> Result<ReorderPrediction, AiError> {
        if !(self.cv_bound.is_finite() && self.cv_bound > 0.0) {
            return Err(AiError::InvalidInput(
                "cv_bound must be a finite positive number".to_string(),
            ));
        }

        let usage: Vec<f64> = self.input.monthly_usage.iter().map(|&u| u as f64).collect();
        let months = usage.len();
        let mean = mean(&usage);
        let cv = coefficient_of_variation(&usage, mean);
        if !(mean.is_finite() && cv.is_finite()) {
            return Err(AiError::InferenceFailed(format!(
                "non-finite statistics for {}",
                self.input.material_id
            )));
        }

        let predicted = round2(mean);
        let projected_remaining = self.input.current_quantity as f64 - predicted;
        let should_reorder = projected_remaining <= self.input.alert_threshold as f64;

        let confidence = if months >= HIGH_CONFIDENCE_MONTHS && cv < self.cv_bound {
            Confidence::High
        } else if months >= MEDIUM_CONFIDENCE_MONTHS {
            Confidence::Medium
        } else {
            Confidence::Low
        };

        Ok(ReorderPrediction {
            material_id: self.input.material_id.clone(),
            predicted_usage_next_30_days: predicted,
            should_reorder,
            confidence,
            months_of_data: months,
            coefficient_of_variation: round4(cv),
        })
    }
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / (xs.len() as f64)
}

/// Population coefficient of variation; 0 for an empty or all-zero window.
fn coefficient_of_variation(xs: &[f64], mean: f64) -> f64 {
    if xs.is_empty() || mean <= f64::EPSILON {
        return 0.0;
    }
    let var = xs
        .iter()
        .map(|x| {
            let d = x - mean;
            d * d
        })
        .sum::<f64>()
        / (xs.len() as f64);
    var.sqrt() / mean
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(usage: &[u64], current: u64, alert: u64) -> ReorderInput {
        ReorderInput {
            material_id: "gloves".parse().unwrap(),
            monthly_usage: usage.to_vec(),
            current_quantity: current,
            alert_threshold: alert,
        }
    }

    #[test]
    fn steady_three_months_predicts_mean_with_high_confidence() {
        let p = ReorderJob::new(input(&[10, 12, 11], 8, 5)).run().unwrap();
        assert_eq!(p.predicted_usage_next_30_days, 11.0);
        assert!(p.should_reorder);
        assert_eq!(p.confidence, Confidence::High);
        assert_eq!(p.months_of_data, 3);
    }

    #[test]
    fn plenty_of_stock_does_not_reorder() {
        let p = ReorderJob::new(input(&[10, 12, 11], 100, 5)).run().unwrap();
        assert!(!p.should_reorder);
    }

    #[test]
    fn volatile_history_caps_at_medium() {
        let p = ReorderJob::new(input(&[0, 40, 2], 100, 5)).run().unwrap();
        assert_eq!(p.confidence, Confidence::Medium);
    }

    #[test]
    fn short_histories_are_low_or_medium() {
        assert_eq!(ReorderJob::new(input(&[], 3, 5)).run().unwrap().confidence, Confidence::Low);
        assert_eq!(ReorderJob::new(input(&[4], 3, 5)).run().unwrap().confidence, Confidence::Low);
        assert_eq!(ReorderJob::new(input(&[4, 4], 3, 5)).run().unwrap().confidence, Confidence::Medium);
    }

    #[test]
    fn no_usage_reorders_only_at_threshold() {
        let p = ReorderJob::new(input(&[], 5, 5)).run().unwrap();
        assert_eq!(p.predicted_usage_next_30_days, 0.0);
        assert!(p.should_reorder);
        let p = ReorderJob::new(input(&[], 6, 5)).run().unwrap();
        assert!(!p.should_reorder);
    }

    #[test]
    fn invalid_cv_bound_is_rejected() {
        let err = ReorderJob::new(input(&[1, 2, 3], 1, 1)).with_cv_bound(f64::NAN).run();
        assert!(matches!(err, Err(AiError::InvalidInput(_))));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: same input, same prediction.
            #[test]
            fn prediction_is_deterministic(
                usage in proptest::collection::vec(0u64..500, 0..12),
                current in 0u64..1000,
                alert in 0u64..100,
            ) {
                let a = ReorderJob::new(input(&usage, current, alert)).run().unwrap();
                let b = ReorderJob::new(input(&usage, current, alert)).run().unwrap();
                prop_assert_eq!(a, b);
            }

            /// Property: extending a constant history never lowers confidence.
            #[test]
            fn more_stable_months_never_lower_confidence(
                level in 1u64..500,
                months in 0usize..8,
            ) {
                let shorter = vec![level; months];
                let longer = vec![level; months + 1];
                let a = ReorderJob::new(input(&shorter, 10, 5)).run().unwrap();
                let b = ReorderJob::new(input(&longer, 10, 5)).run().unwrap();
                prop_assert!(b.confidence >= a.confidence);
            }
        }
    }
}
