//! Stage 1: structural completeness check. Never collapsed to a
//! bare boolean downstream; the full record travels with every decision.

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseValidation {
    pub valid: bool,
    pub complete: bool,
    pub notes: Vec<String>,
}

/// Checks the agent's raw response text for structural completeness:
/// non-empty, code fences balanced, no obviously truncated section.
pub fn validate_response(text: &str) -> ResponseValidation {
    let mut notes = Vec::new();

    if text.trim().is_empty() {
        notes.push("response is empty".to_string());
        return ResponseValidation {
            valid: false,
            complete: false,
            notes,
        };
    }

    let fence_count = text.matches("```").count();
    let fences_balanced = fence_count % 2 == 0;
    if !fences_balanced {
        notes.push("unbalanced code fence".to_string());
    }

    let looks_truncated = text.trim_end().ends_with(['…', ':', ',']) || text.trim_end().ends_with("TODO");
    if looks_truncated {
        notes.push("response appears truncated".to_string());
    }

    let complete = fences_balanced && !looks_truncated;
    ResponseValidation {
        valid: fences_balanced,
        complete,
        notes,
    }
}
