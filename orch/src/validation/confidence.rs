//! Stage 3: confidence score 0-100, a weighted combination of the
//! validator verdict, quality score, prior task history, and (when
//! available) the validator model's own self-estimate.

use crate::validation::quality::QualityScore;
use crate::validation::response::ResponseValidation;

#[derive(Clone, Debug)]
pub struct ConfidenceInputs {
    pub response: ResponseValidation,
    pub quality: QualityScore,
    /// Fraction of this task's prior iterations that ended PROCEED (0.0 if none yet).
    pub prior_success_rate: f32,
    /// The validator model's own self-reported confidence, when available.
    pub model_self_estimate: Option<u8>,
}

const W_VERDICT: f32 = 0.3;
const W_QUALITY: f32 = 0.4;
const W_HISTORY: f32 = 0.15;
const W_MODEL: f32 = 0.15;

pub fn score_confidence(inputs: &ConfidenceInputs) -> u8 {
    let verdict_component = if inputs.response.valid { 100.0 } else { 0.0 };
    let quality_component = inputs.quality.overall as f32;
    let history_component = inputs.prior_success_rate * 100.0;

    let (weighted, total_weight) = match inputs.model_self_estimate {
        Some(model_score) => (
            verdict_component * W_VERDICT
                + quality_component * W_QUALITY
                + history_component * W_HISTORY
                + model_score as f32 * W_MODEL,
            W_VERDICT + W_QUALITY + W_HISTORY + W_MODEL,
        ),
        None => (
            verdict_component * W_VERDICT + quality_component * W_QUALITY + history_component * W_HISTORY,
            W_VERDICT + W_QUALITY + W_HISTORY,
        ),
    };

    (weighted / total_weight).round().clamp(0.0, 100.0) as u8
}
