//! Stage 5: parameter extractor. Optional fields that are absent are
//! omitted entirely; a literal "null" for one is rejected as a validation
//! error rather than silently treated as absent.

use regex::Regex;
use statestore::{Priority, WorkItemStatus};

use crate::error::OrchError;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Parameters {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<WorkItemStatus>,
    pub dependencies: Vec<String>,
    pub epic_id: Option<String>,
    pub story_id: Option<String>,
    pub parent_task_id: Option<String>,
    pub scope: Option<String>,
}

impl Parameters {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.priority.is_none()
            && self.status.is_none()
            && self.dependencies.is_empty()
            && self.epic_id.is_none()
            && self.story_id.is_none()
            && self.parent_task_id.is_none()
            && self.scope.is_none()
    }
}

/// Returns the extracted parameters and a confidence in `[0.0, 1.0]`.
/// `0.9` when at least one field was found, `0.0` when none were present —
/// the caller treats zero fields as "nothing extra to say", not a failure.
pub fn extract_parameters(text: &str) -> crate::error::Result<(Parameters, f32)> {
    static PATTERN: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)\b(title|description|desc|priority|status|depends[_ ]?on|dependencies|epic|epic_id|story|story_id|parent_task|parent_task_id|scope)\s*[:=]\s*([^,\n]+)",
        )
        .expect("static pattern compiles")
    });

    let mut params = Parameters::default();
    let mut hits = 0usize;

    for caps in pattern.captures_iter(text) {
        let key = caps[1].to_lowercase();
        let raw = caps[2].trim();
        if raw.eq_ignore_ascii_case("null") {
            return Err(OrchError::ValidationError {
                stage: "parameters",
                field: key,
                message: "explicit null is not a valid value for an optional field".to_string(),
            });
        }
        let value = raw.trim_matches(|c: char| c == '"' || c == '\'').to_string();
        if value.is_empty() {
            continue;
        }

        match key.as_str() {
            "title" => params.title = Some(value),
            "description" | "desc" => params.description = Some(value),
            "priority" => {
                params.priority = Priority::from_word(&value).or_else(|| value.parse::<u8>().ok().map(Priority::clamped));
            }
            "status" => params.status = WorkItemStatus::parse(&value.to_uppercase()),
            "depends_on" | "depends on" | "dependencies" => {
                params.dependencies = value.split(|c: char| c == ';' || c == ' ').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect();
            }
            "epic" | "epic_id" => params.epic_id = Some(value),
            "story" | "story_id" => params.story_id = Some(value),
            "parent_task" | "parent_task_id" => params.parent_task_id = Some(value),
            "scope" => params.scope = Some(value),
            _ => continue,
        }
        hits += 1;
    }

    let confidence = if hits > 0 { 0.9 } else { 0.0 };
    Ok((params, confidence))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_known_fields() {
        let (params, confidence) = extract_parameters("title: Login flow, priority: high, epic_id: E1").unwrap();
        assert_eq!(params.title.as_deref(), Some("Login flow"));
        assert_eq!(params.priority, Some(Priority::HIGH));
        assert_eq!(params.epic_id.as_deref(), Some("E1"));
        assert!(confidence > 0.0);
    }

    #[test]
    fn explicit_null_is_rejected() {
        let err = extract_parameters("description: null").unwrap_err();
        assert!(matches!(err, OrchError::ValidationError { stage: "parameters", .. }));
    }

    #[test]
    fn no_fields_found_is_zero_confidence() {
        let (params, confidence) = extract_parameters("create a project").unwrap();
        assert!(params.is_empty());
        assert_eq!(confidence, 0.0);
    }

    #[test]
    fn dependencies_are_split_on_separators() {
        let (params, _) = extract_parameters("depends_on: T1 T2; T3").unwrap();
        assert_eq!(params.dependencies, vec!["T1", "T2", "T3"]);
    }
}
