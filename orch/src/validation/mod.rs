//! Response validator → quality controller → confidence scorer → decision
//! engine → breakpoint manager. Stages run in strict order and each
//! may short-circuit the ones after it.

mod confidence;
mod decision;
mod pipeline;
mod quality;
mod response;

pub use confidence::{ConfidenceInputs, score_confidence};
pub use decision::{Decision, DecisionThresholds, decide};
pub use pipeline::{ValidationConfig, ValidationOutcome, ValidationPipeline};
pub use quality::{QualityScore, score_quality};
pub use response::{ResponseValidation, validate_response};
