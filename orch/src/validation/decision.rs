//! Stage 4: decision engine. Ties are broken in the
//! order the table lists them.

use crate::validation::quality::QualityScore;
use crate::validation::response::ResponseValidation;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Proceed,
    Retry,
    Clarify,
    Escalate,
    Abort,
}

#[derive(Clone, Copy, Debug)]
pub struct DecisionThresholds {
    pub quality_floor: u8,
    pub quality_target: u8,
    pub confidence_floor: u8,
    pub confidence_target: u8,
}

impl Default for DecisionThresholds {
    fn default() -> Self {
        Self {
            quality_floor: 50,
            quality_target: 70,
            confidence_floor: 30,
            confidence_target: 50,
        }
    }
}

pub fn decide(
    response: &ResponseValidation,
    quality: QualityScore,
    confidence: u8,
    iterations_left: u32,
    thresholds: &DecisionThresholds,
) -> Decision {
    if !response.valid {
        return if iterations_left > 0 { Decision::Retry } else { Decision::Escalate };
    }
    if quality.overall < thresholds.quality_floor {
        return if iterations_left > 0 { Decision::Retry } else { Decision::Escalate };
    }
    if confidence < thresholds.confidence_floor {
        return Decision::Clarify;
    }
    if quality.overall >= thresholds.quality_target && confidence >= thresholds.confidence_target {
        return Decision::Proceed;
    }
    if iterations_left > 0 { Decision::Retry } else { Decision::Escalate }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> ResponseValidation {
        ResponseValidation {
            valid: true,
            complete: true,
            notes: vec![],
        }
    }

    fn invalid() -> ResponseValidation {
        ResponseValidation {
            valid: false,
            complete: false,
            notes: vec!["x".into()],
        }
    }

    fn q(overall: u8) -> QualityScore {
        QualityScore {
            overall,
            requirements_satisfaction: overall,
            error_freeness: overall,
        }
    }

    #[test]
    fn invalid_retries_while_iterations_left() {
        let d = decide(&invalid(), q(90), 90, 2, &DecisionThresholds::default());
        assert_eq!(d, Decision::Retry);
    }

    #[test]
    fn invalid_escalates_at_zero_iterations() {
        let d = decide(&invalid(), q(90), 90, 0, &DecisionThresholds::default());
        assert_eq!(d, Decision::Escalate);
    }

    #[test]
    fn quality_below_floor_retries() {
        let d = decide(&valid(), q(10), 90, 2, &DecisionThresholds::default());
        assert_eq!(d, Decision::Retry);
    }

    #[test]
    fn low_confidence_clarifies() {
        let d = decide(&valid(), q(90), 10, 2, &DecisionThresholds::default());
        assert_eq!(d, Decision::Clarify);
    }

    #[test]
    fn high_quality_and_confidence_proceeds() {
        let d = decide(&valid(), q(80), 80, 2, &DecisionThresholds::default());
        assert_eq!(d, Decision::Proceed);
    }

    #[test]
    fn middling_retries_then_escalates() {
        let thresholds = DecisionThresholds::default();
        let d1 = decide(&valid(), q(60), 40, 2, &thresholds);
        assert_eq!(d1, Decision::Retry);
        let d2 = decide(&valid(), q(60), 40, 0, &thresholds);
        assert_eq!(d2, Decision::Escalate);
    }
}
