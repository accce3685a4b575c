//! Stage 2: quality score 0-100. Requirements-satisfaction and
//! error-freeness are required sub-scores; a ModelPort rubric prompt refines
//! the heuristic score when a validator is available.

use crate::ports::ModelPort;
use crate::validation::response::ResponseValidation;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QualityScore {
    pub overall: u8,
    pub requirements_satisfaction: u8,
    pub error_freeness: u8,
}

/// Heuristic rubric, used standalone or as the prior for a model-backed
/// refinement (`score_quality_with_model`).
pub fn score_quality(response: &ResponseValidation, task_description: &str, response_text: &str) -> QualityScore {
    let error_freeness = if response.notes.is_empty() { 100 } else { 100u8.saturating_sub(25 * response.notes.len() as u8) };

    let requirements_satisfaction = requirements_overlap_score(task_description, response_text);

    let overall = if !response.valid {
        requirements_satisfaction.min(error_freeness).min(40)
    } else {
        ((requirements_satisfaction as u16 + error_freeness as u16) / 2) as u8
    };

    QualityScore {
        overall,
        requirements_satisfaction,
        error_freeness,
    }
}

pub async fn score_quality_with_model(
    model: &dyn ModelPort,
    response: &ResponseValidation,
    task_description: &str,
    response_text: &str,
) -> QualityScore {
    let heuristic = score_quality(response, task_description, response_text);
    let prompt = format!(
        "Rate this implementer response 0-100 for requirements satisfaction given the task.\n\
         Task: {task_description}\nResponse: {response_text}\nReply with a single integer."
    );
    let reply = model.generate(&prompt, 16, 0.0).await;
    match reply.trim().parse::<u8>() {
        Ok(model_score) => QualityScore {
            overall: ((heuristic.overall as u16 + model_score as u16) / 2) as u8,
            ..heuristic
        },
        Err(_) => heuristic,
    }
}

/// Cheap word-overlap heuristic: fraction of task-description content words
/// that also appear in the response, scaled to 0-100.
fn requirements_overlap_score(task_description: &str, response_text: &str) -> u8 {
    let task_words: Vec<&str> = task_description
        .split_whitespace()
        .filter(|w| w.len() > 3)
        .collect();
    if task_words.is_empty() {
        return 100;
    }
    let response_lower = response_text.to_lowercase();
    let hits = task_words
        .iter()
        .filter(|w| response_lower.contains(&w.to_lowercase()))
        .count();
    ((hits as f64 / task_words.len() as f64) * 100.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_response_capped_low() {
        let response = ResponseValidation {
            valid: false,
            complete: false,
            notes: vec!["unbalanced code fence".into()],
        };
        let score = score_quality(&response, "add login", "broken");
        assert!(score.overall <= 40);
    }

    #[test]
    fn high_overlap_scores_well() {
        let response = ResponseValidation {
            valid: true,
            complete: true,
            notes: vec![],
        };
        let score = score_quality(&response, "implement login endpoint", "Implemented the login endpoint.");
        assert!(score.overall >= 80);
    }
}
