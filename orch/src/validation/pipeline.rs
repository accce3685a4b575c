//! Wires stages 1-5 together in strict order and decides whether a
//! breakpoint supersedes the decision.

use statestore::BreakpointReason;

use crate::ports::ModelPort;
use crate::validation::confidence::{ConfidenceInputs, score_confidence};
use crate::validation::decision::{Decision, DecisionThresholds, decide};
use crate::validation::quality::{QualityScore, score_quality, score_quality_with_model};
use crate::validation::response::{ResponseValidation, validate_response};

#[derive(Clone, Debug)]
pub struct ValidationConfig {
    pub thresholds: DecisionThresholds,
    pub breakpoint_confidence_threshold: u8,
    pub breakpoint_quality_floor: u8,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            thresholds: DecisionThresholds::default(),
            breakpoint_confidence_threshold: 20,
            breakpoint_quality_floor: 20,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ValidationOutcome {
    pub response: ResponseValidation,
    pub quality: QualityScore,
    pub confidence: u8,
    pub decision: Decision,
    pub breakpoint: Option<BreakpointReason>,
}

pub struct ValidationPipeline {
    config: ValidationConfig,
}

impl ValidationPipeline {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    pub async fn evaluate(
        &self,
        model: Option<&dyn ModelPort>,
        task_description: &str,
        response_text: &str,
        prior_success_rate: f32,
        iterations_left: u32,
        destructive_operation: bool,
    ) -> ValidationOutcome {
        let response = validate_response(response_text);

        let quality = match model {
            Some(model) => score_quality_with_model(model, &response, task_description, response_text).await,
            None => score_quality(&response, task_description, response_text),
        };

        let confidence = score_confidence(&ConfidenceInputs {
            response: response.clone(),
            quality,
            prior_success_rate,
            model_self_estimate: None,
        });

        let decision = decide(&response, quality, confidence, iterations_left, &self.config.thresholds);

        let breakpoint = self.breakpoint_reason(&response, quality, confidence, destructive_operation);

        ValidationOutcome {
            response,
            quality,
            confidence,
            decision,
            breakpoint,
        }
    }

    fn breakpoint_reason(
        &self,
        response: &ResponseValidation,
        quality: QualityScore,
        confidence: u8,
        destructive_operation: bool,
    ) -> Option<BreakpointReason> {
        if destructive_operation {
            return Some(BreakpointReason::DestructiveOp);
        }
        if !response.valid {
            return Some(BreakpointReason::ValidationFailed);
        }
        if confidence < self.config.breakpoint_confidence_threshold {
            return Some(BreakpointReason::LowConfidence);
        }
        if quality.overall < self.config.breakpoint_quality_floor {
            return Some(BreakpointReason::QualityBelowFloor);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn happy_path_proceeds_with_no_breakpoint() {
        let pipeline = ValidationPipeline::new(ValidationConfig::default());
        let outcome = pipeline
            .evaluate(
                None,
                "implement login endpoint",
                "Implemented the login endpoint.\n```rust\nfn login() {}\n```",
                0.9,
                3,
                false,
            )
            .await;
        assert_eq!(outcome.decision, Decision::Proceed);
        assert!(outcome.breakpoint.is_none());
    }

    #[tokio::test]
    async fn destructive_operation_always_breakpoints() {
        let pipeline = ValidationPipeline::new(ValidationConfig::default());
        let outcome = pipeline
            .evaluate(None, "delete all tasks", "Deleted everything.", 0.9, 3, true)
            .await;
        assert_eq!(outcome.breakpoint, Some(BreakpointReason::DestructiveOp));
    }

    #[tokio::test]
    async fn invalid_response_breakpoints_validation_failed() {
        let pipeline = ValidationPipeline::new(ValidationConfig::default());
        let outcome = pipeline.evaluate(None, "anything", "", 0.9, 3, false).await;
        assert_eq!(outcome.breakpoint, Some(BreakpointReason::ValidationFailed));
        assert_eq!(outcome.decision, Decision::Retry);
    }
}
