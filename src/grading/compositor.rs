//! Final grade compositor

use super::scale::round2;
use super::weights::WeightConfig;

/// Weighted sum of the evaluation grade and the attention score (both 0..100).
///
/// Missing inputs count as 0. The result is rounded to 2 decimals.
pub fn compose(evaluation: Option<f64>, monitoring: Option<f64>, weights: WeightConfig) -> f64 {
    let evaluation = evaluation.filter(|v| v.is_finite()).unwrap_or(0.0);
    let monitoring = monitoring.filter(|v| v.is_finite()).unwrap_or(0.0);

    round2(evaluation * weights.evaluation_factor() + monitoring * weights.attention_factor())
}
