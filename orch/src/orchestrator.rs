//! The Orchestrator: drives one task through the iteration loop,
//! coordinating the turn budgeter, session manager, context window manager,
//! agent port, and validation pipeline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use statestore::{BreakpointReason, Interaction, InteractionMetadata, StateManager, WorkItemStatus};
use tracing::{info, warn};

use crate::error::{OrchError, Result};
use crate::events::EventEmitter;
use crate::ports::{AgentCallContext, AgentPort, ModelPort};
use crate::session_manager::SessionManager;
use crate::turn_budget::{TaskSignals, TurnBudgeter};
use crate::validation::{Decision, ValidationConfig, ValidationPipeline};
use memorycore::context_window::{ContextWindowManager, Zone};
use memorycore::MemoryError;

/// Final disposition of an `execute_task` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskStatus {
    Completed,
    Blocked,
    Paused,
    WaitingUser,
    Escalated,
    Failed,
    Cancelled,
}

#[derive(Clone, Debug)]
pub struct TaskResult {
    pub status: TaskStatus,
    pub iterations: u32,
    pub quality: Option<u8>,
    pub confidence: Option<u8>,
    pub response: Option<String>,
    pub breakpoint_id: Option<String>,
}

impl TaskResult {
    fn terminal(status: TaskStatus, iterations: u32) -> Self {
        Self { status, iterations, quality: None, confidence: None, response: None, breakpoint_id: None }
    }
}

/// Set by an operator or a shutdown handler; checked between iterations and
/// before every outgoing call.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct OrchestratorConfig {
    pub max_iterations: u32,
    pub max_retries: u32,
    pub retry_multiplier: f64,
    pub working_directory: std::path::PathBuf,
    /// Declared context window of the implementer session, in tokens; feeds
    /// the zone checks that drive mid-task refresh.
    pub context_window: u32,
}

pub struct Orchestrator<'a> {
    store: &'a StateManager,
    agent: &'a dyn AgentPort,
    model: &'a dyn ModelPort,
    turn_budgeter: TurnBudgeter,
    validation: ValidationPipeline,
    events: EventEmitter,
    config: OrchestratorConfig,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        store: &'a StateManager,
        agent: &'a dyn AgentPort,
        model: &'a dyn ModelPort,
        turn_budgeter: TurnBudgeter,
        validation_config: ValidationConfig,
        events: EventEmitter,
        config: OrchestratorConfig,
    ) -> Self {
        Self { store, agent, model, turn_budgeter, validation: ValidationPipeline::new(validation_config), events, config }
    }

    pub async fn execute_task(&self, task_id: &str, cancel: &CancellationToken) -> Result<TaskResult> {
        let task = self.store.get_work_item(task_id).await?;

        // A task with an unresolved breakpoint may not advance.
        if let Some(breakpoint) = self.store.unresolved_breakpoint_for_task(task_id).await? {
            info!(task_id, breakpoint_id = %breakpoint.id, "execute_task: unresolved breakpoint, task stays paused");
            return Ok(TaskResult {
                status: TaskStatus::Paused,
                iterations: 0,
                quality: None,
                confidence: None,
                response: None,
                breakpoint_id: Some(breakpoint.id),
            });
        }

        // Dependency gate.
        for dep_id in &task.dependencies {
            let dep = self.store.get_work_item(dep_id).await?;
            if dep.status != WorkItemStatus::Completed {
                info!(task_id, dep_id, "execute_task: dependency not completed, marking BLOCKED");
                self.store
                    .update_work_item(task_id, [("status".to_string(), serde_json::json!("BLOCKED"))].into_iter().collect())
                    .await?;
                return Ok(TaskResult::terminal(TaskStatus::Blocked, 0));
            }
        }

        // Compute the turn budget. No per-type override flows in from
        // here; the free-text heuristics decide.
        let signals = TaskSignals {
            task_type: None,
            text: &task.description,
            estimated_files: 1,
            estimated_loc: task.description.len() as u32 / 20,
        };
        let mut budget = self.turn_budgeter.calculate(&signals);
        info!(task_id, turns = budget.turns, rationale = %budget.rationale, "execute_task: turn budget computed");

        // Ensure an active session, build the milestone context.
        let session_manager = SessionManager::new(self.store, self.model);
        let milestone_id = task.parent_id.as_deref();
        let mut session_id = session_manager.start_milestone_session(&task.project_id, milestone_id).await?;
        let milestone_context = session_manager.build_milestone_context(&task.project_id, milestone_id).await?;

        // Destructiveness is decided by the NL layer when a task originates from
        // a DELETE operation; the orchestrator itself never deletes, so a task
        // reached via `execute_task` is destructive only if it says so in its
        // description tag. Conservative default: not destructive.
        let destructive = task.description.starts_with("[destructive]");
        let context_window = ContextWindowManager::new(self.config.context_window);
        let mut windowed_tokens: u32 = 0;
        let mut prior_summary: Option<String> = None;
        let mut retries_used = 0u32;
        let mut last_response: Option<String> = None;

        let mut iteration = 0u32;
        while iteration < self.config.max_iterations {
            if cancel.is_cancelled() {
                info!(task_id, "execute_task: cancellation observed, persisting and returning CANCELLED");
                return Ok(TaskResult::terminal(TaskStatus::Cancelled, iteration));
            }
            iteration += 1;

            // Context window zone check; refresh on orange or worse.
            match context_window.guard_outgoing_call(windowed_tokens) {
                Ok(Zone::Orange) => {
                    let (new_session_id, summary) = session_manager
                        .refresh_session_with_summary(&session_id, last_response.as_deref().unwrap_or(""))
                        .await?;
                    self.events.session_refreshed(&session_id, &new_session_id);
                    session_id = new_session_id;
                    prior_summary = Some(summary);
                    windowed_tokens = 0;
                }
                Ok(_) => {}
                Err(MemoryError::ContextCritical { used_pct }) => {
                    let (new_session_id, summary) = session_manager
                        .refresh_session_with_summary(&session_id, last_response.as_deref().unwrap_or(""))
                        .await?;
                    self.events.session_refreshed(&session_id, &new_session_id);
                    session_id = new_session_id;
                    prior_summary = Some(summary);
                    windowed_tokens = 0;
                    warn!(task_id, used_pct, "execute_task: forced refresh out of the red zone");
                }
                Err(e) => return Err(OrchError::from(e)),
            }

            // Build the prompt.
            let mut prompt = milestone_context.clone();
            if let Some(summary) = prior_summary.take() {
                prompt.push_str("\n\n## Session summary before refresh\n");
                prompt.push_str(&summary);
            }
            prompt.push_str(&format!("\n\n## Task\n{}\n{}", task.title, task.description));
            if let Some(response) = &last_response {
                prompt.push_str(&format!("\n\n## Previous response\n{response}"));
            }
            self.events.prompt_prepared(&session_id, iteration, prompt.chars().count());

            if cancel.is_cancelled() {
                return Ok(TaskResult::terminal(TaskStatus::Cancelled, iteration));
            }

            // Call the agent.
            self.events.prompt_sent(&session_id, iteration, budget.turns);
            let ctx = AgentCallContext {
                session_id: session_id.clone(),
                max_turns: budget.turns,
                working_directory: self.config.working_directory.clone(),
            };
            let result = self.agent.send(&prompt, &ctx).await;

            // MAX_TURNS retry-doubling, counted as a retry not an iteration.
            if result.exit_reason == crate::error::ExitReason::MaxTurns && retries_used < self.config.max_retries {
                retries_used += 1;
                budget.turns = self.turn_budgeter.retry_budget(budget.turns, self.config.retry_multiplier);
                iteration -= 1;
                warn!(task_id, retries_used, new_turns = budget.turns, "execute_task: MAX_TURNS retry, doubling budget");
                continue;
            }

            // Append tokens to the ledger, then the interaction row.
            let total_tokens = session_manager.record_tokens(&session_id, task_id, &result).await?;
            windowed_tokens = windowed_tokens.saturating_add(result.windowed_tokens() as u32);
            self.events.response_received(&session_id, iteration, result.turns_used, total_tokens as u64);
            last_response = Some(result.text.clone());

            let iterations_left = self.config.max_iterations.saturating_sub(iteration);
            let prior_success_rate = self.prior_success_rate(task_id).await?;

            // Validate.
            let outcome = self
                .validation
                .evaluate(Some(self.model), &task.description, &result.text, prior_success_rate, iterations_left, destructive)
                .await;
            self.events.validation_done(iteration, outcome.quality.overall as f32 / 100.0, outcome.confidence as f32 / 100.0);

            let interaction = Interaction {
                id: statestore::generate_id(),
                project_id: task.project_id.clone(),
                task_id: task_id.to_string(),
                session_id: session_id.clone(),
                iteration: iteration as i64,
                prompt,
                response: result.text.clone(),
                timestamp: 0,
                metadata: InteractionMetadata {
                    turns_used: Some(result.turns_used as i64),
                    duration_ms: Some(result.duration_ms as i64),
                    quality_score: Some(outcome.quality.overall as f64),
                    confidence: Some(outcome.confidence as f64),
                    decision: Some(decision_name(outcome.decision).to_string()),
                    retries: Some(retries_used as i64),
                },
            };
            self.store.append_interaction(interaction).await?;

            // Breakpoint check.
            if let Some(reason) = outcome.breakpoint {
                let breakpoint = self.store.create_breakpoint(task_id, reason).await?;
                self.events.breakpoint_triggered(reason.as_str());
                self.events.paused(reason.as_str());
                return Ok(TaskResult {
                    status: TaskStatus::Paused,
                    iterations: iteration,
                    quality: Some(outcome.quality.overall),
                    confidence: Some(outcome.confidence),
                    response: last_response,
                    breakpoint_id: Some(breakpoint.id),
                });
            }

            // Decision.
            self.events.decision_made(iteration, decision_name(outcome.decision));
            match outcome.decision {
                Decision::Proceed => {
                    self.store
                        .update_work_item(task_id, [("status".to_string(), serde_json::json!("COMPLETED"))].into_iter().collect())
                        .await?;
                    session_manager.end_milestone_session(&session_id, last_response.as_deref().unwrap_or("")).await?;
                    return Ok(TaskResult {
                        status: TaskStatus::Completed,
                        iterations: iteration,
                        quality: Some(outcome.quality.overall),
                        confidence: Some(outcome.confidence),
                        response: last_response,
                        breakpoint_id: None,
                    });
                }
                Decision::Retry => continue,
                Decision::Clarify => {
                    return Ok(TaskResult {
                        status: TaskStatus::WaitingUser,
                        iterations: iteration,
                        quality: Some(outcome.quality.overall),
                        confidence: Some(outcome.confidence),
                        response: last_response,
                        breakpoint_id: None,
                    });
                }
                Decision::Escalate => {
                    let breakpoint = self.store.create_breakpoint(task_id, BreakpointReason::Escalate).await?;
                    return Ok(TaskResult {
                        status: TaskStatus::Escalated,
                        iterations: iteration,
                        quality: Some(outcome.quality.overall),
                        confidence: Some(outcome.confidence),
                        response: last_response,
                        breakpoint_id: Some(breakpoint.id),
                    });
                }
                Decision::Abort => {
                    return Ok(TaskResult {
                        status: TaskStatus::Failed,
                        iterations: iteration,
                        quality: Some(outcome.quality.overall),
                        confidence: Some(outcome.confidence),
                        response: last_response,
                        breakpoint_id: None,
                    });
                }
            }
        }

        // Budget exhausted without a terminal decision.
        let breakpoint = self.store.create_breakpoint(task_id, BreakpointReason::BudgetExhausted).await?;
        Ok(TaskResult {
            status: TaskStatus::Escalated,
            iterations: iteration,
            quality: None,
            confidence: None,
            response: last_response,
            breakpoint_id: Some(breakpoint.id),
        })
    }
    /// Fraction of this task's prior iterations whose decision was PROCEED;
    /// optimistic default when there is no history yet.
    async fn prior_success_rate(&self, task_id: &str) -> Result<f32> {
        let interactions = self.store.list_interactions_for_task(task_id).await?;
        if interactions.is_empty() {
            return Ok(0.8);
        }
        let proceeded = interactions.iter().filter(|i| i.metadata.decision.as_deref() == Some("PROCEED")).count();
        Ok(proceeded as f32 / interactions.len() as f32)
    }
}

fn decision_name(decision: Decision) -> &'static str {
    match decision {
        Decision::Proceed => "PROCEED",
        Decision::Retry => "RETRY",
        Decision::Clarify => "CLARIFY",
        Decision::Escalate => "ESCALATE",
        Decision::Abort => "ABORT",
    }
}
