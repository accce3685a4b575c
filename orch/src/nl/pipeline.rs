//! Stage pipeline glue: runs intent → operation → entity → identifier
//! → parameters → validator and folds them into one tagged result, or routes
//! through the confirmation state machine when one is pending.

use crate::error::OrchError;
use crate::nl::confirmation::{ConfirmationOutcome, ConfirmationState, PendingConfirmation};
use crate::nl::entity::{EntityType, classify_entities};
use crate::nl::identifier::{Identifier, extract_identifier};
use crate::nl::intent::{Intent, classify_intent};
use crate::nl::operation::{Operation, classify_operation};
use crate::nl::parameters::{Parameters, extract_parameters};
use crate::nl::validator::validate_operation;

#[derive(Clone, Debug, PartialEq)]
pub struct OperationContext {
    pub operation: Operation,
    pub entities: Vec<EntityType>,
    pub identifier: Option<Identifier>,
    pub parameters: Parameters,
    pub project_id: String,
}

#[derive(Clone, Debug)]
pub struct NlOutcome {
    pub intent: Intent,
    pub operation_context: Option<OperationContext>,
    pub response_text: String,
    pub confidence: f32,
    pub pending: Option<PendingConfirmation>,
    pub error_kind: Option<String>,
}

pub struct NlPipelineConfig {
    pub confidence_threshold: f32,
    pub confirmation_timeout_secs: i64,
    pub bulk_require_confirmation: bool,
}

impl Default for NlPipelineConfig {
    fn default() -> Self {
        Self { confidence_threshold: 0.7, confirmation_timeout_secs: 60, bulk_require_confirmation: true }
    }
}

pub struct NlPipeline {
    config: NlPipelineConfig,
    confirmation: ConfirmationState,
}

impl NlPipeline {
    pub fn new(config: NlPipelineConfig) -> Self {
        Self { config, confirmation: ConfirmationState::new() }
    }

    pub fn process(&mut self, text: &str, project_id: &str, now_epoch_secs: i64) -> NlOutcome {
        if self.confirmation.peek().is_some() {
            match self.confirmation.resolve(text, now_epoch_secs, self.config.confirmation_timeout_secs) {
                ConfirmationOutcome::Confirmed => {
                    let pending = self.confirmation.clear().expect("just matched Confirmed");
                    return NlOutcome {
                        intent: Intent::Confirmation,
                        operation_context: Some(pending.operation),
                        response_text: "confirmed".to_string(),
                        confidence: 1.0,
                        pending: None,
                        error_kind: None,
                    };
                }
                ConfirmationOutcome::Cancelled => {
                    return NlOutcome {
                        intent: Intent::Cancellation,
                        operation_context: None,
                        response_text: "cancelled".to_string(),
                        confidence: 1.0,
                        pending: None,
                        error_kind: None,
                    };
                }
                ConfirmationOutcome::Expired => {
                    return NlOutcome {
                        intent: Intent::Conversation,
                        operation_context: None,
                        response_text: "the pending confirmation expired; please resend the command".to_string(),
                        confidence: 1.0,
                        pending: None,
                        error_kind: None,
                    };
                }
                ConfirmationOutcome::NotPending => {
                    // Fresh input; the pending confirmation was implicitly cleared.
                }
            }
        }

        let (intent, intent_conf) = classify_intent(text);

        match intent {
            Intent::Help => {
                return NlOutcome {
                    intent,
                    operation_context: None,
                    response_text: "available commands: create/list/show/update/delete for project, epic, story, task, subtask, milestone".to_string(),
                    confidence: intent_conf,
                    pending: None,
                    error_kind: None,
                };
            }
            Intent::Confirmation | Intent::Cancellation => {
                return NlOutcome {
                    intent,
                    operation_context: None,
                    response_text: "nothing is pending confirmation".to_string(),
                    confidence: intent_conf,
                    pending: None,
                    error_kind: None,
                };
            }
            // Conversation falls through to the stage computation below so
            // the clarification can name the lowest-confidence stage instead
            // of replying with a generic rephrase request.
            Intent::Conversation | Intent::Command | Intent::Query => {}
        }

        let (operation, operation_conf) = classify_operation(text);
        let (entities, entity_conf) = classify_entities(text);
        let (identifier, identifier_conf) = extract_identifier(text);

        let params_result = extract_parameters(text);
        let (parameters, parameter_conf) = match params_result {
            Ok(v) => v,
            Err(err) => {
                return NlOutcome {
                    intent,
                    operation_context: None,
                    response_text: format!("{err}"),
                    confidence: 0.0,
                    pending: None,
                    error_kind: Some("parameters".to_string()),
                };
            }
        };

        let identifier_required = matches!(operation, Operation::Update | Operation::Delete);
        let parameters_considered = matches!(operation, Operation::Create | Operation::Update);

        let mut stages = vec![("intent", intent_conf), ("operation", operation_conf), ("entity", entity_conf)];
        if identifier_required {
            stages.push(("identifier", identifier_conf));
        }
        if parameters_considered && !parameters.is_empty() {
            stages.push(("parameters", parameter_conf));
        }

        // Ties resolve to the latest stage: later stages are more specific,
        // so the clarification asks about the most actionable gap.
        let (lowest_stage, confidence) = stages
            .iter()
            .copied()
            .reduce(|lowest, stage| if stage.1 <= lowest.1 { stage } else { lowest })
            .expect("stages is never empty");

        if confidence < self.config.confidence_threshold {
            return NlOutcome {
                intent,
                operation_context: None,
                response_text: format!("not confident enough (lowest-confidence stage: {lowest_stage}); could you clarify?"),
                confidence,
                pending: None,
                error_kind: Some(lowest_stage.to_string()),
            };
        }

        let warnings = match validate_operation(operation, &entities, &identifier, &parameters) {
            Ok(w) => w,
            Err(OrchError::ValidationError { field, message, .. }) => {
                return NlOutcome {
                    intent,
                    operation_context: None,
                    response_text: format!("{field}: {message}"),
                    confidence,
                    pending: None,
                    error_kind: Some(field),
                };
            }
            Err(other) => {
                return NlOutcome {
                    intent,
                    operation_context: None,
                    response_text: format!("{other}"),
                    confidence,
                    pending: None,
                    error_kind: Some("validator".to_string()),
                };
            }
        };

        let context = OperationContext { operation, entities, identifier, parameters, project_id: project_id.to_string() };

        let needs_confirmation = operation == Operation::Delete
            || (operation == Operation::Update && self.config.bulk_require_confirmation && matches!(context.identifier, Some(Identifier::All)));

        if needs_confirmation {
            let summary = format!("{operation:?} on {:?} (identifier: {:?})", context.entities, context.identifier);
            let pending = PendingConfirmation { operation: context, summary: summary.clone(), created_at_epoch_secs: now_epoch_secs };
            self.confirmation.set(pending.clone());
            return NlOutcome {
                intent,
                operation_context: None,
                response_text: format!("confirm: {summary}?"),
                confidence,
                pending: Some(pending),
                error_kind: None,
            };
        }

        let mut response_text = "ok".to_string();
        if !warnings.is_empty() {
            response_text = warnings.into_iter().map(|w| w.0).collect::<Vec<_>>().join("; ");
        }

        NlOutcome { intent, operation_context: Some(context), response_text, confidence, pending: None, error_kind: None }
    }
}
