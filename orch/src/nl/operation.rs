//! Stage 2: operation classifier, with the full synonym
//! sets for CREATE/UPDATE/DELETE/QUERY.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    Query,
}

const CREATE_WORDS: &[&str] = &[
    "create", "add", "make", "new", "build", "construct", "assemble", "craft", "generate", "produce", "develop",
    "establish", "initialize", "set up", "prepare", "design", "form", "start", "begin", "launch", "spin up",
    "put together",
];

const UPDATE_WORDS: &[&str] = &[
    "update", "modify", "change", "edit", "alter", "revise", "adjust", "refine", "amend", "correct", "fix", "set",
    "configure", "tweak",
];

const DELETE_WORDS: &[&str] = &[
    "delete", "remove", "drop", "erase", "clear", "purge", "eliminate", "destroy", "discard", "cancel", "archive",
];

const QUERY_WORDS: &[&str] = &[
    "show", "list", "get", "find", "search", "query", "lookup", "locate", "display", "view", "see", "check", "what",
    "which", "where", "who", "count", "how many", "status", "state", "info", "details", "describe",
];

/// Returns the classified operation and a confidence in `[0.0, 1.0]`. No
/// match at all yields `Operation::Read` at zero confidence as the least
/// committal default — callers must check the confidence, not just the tag.
pub fn classify_operation(text: &str) -> (Operation, f32) {
    let lower = text.to_lowercase();

    let matches = |words: &[&str]| words.iter().filter(|w| lower.contains(*w)).count();

    let create_hits = matches(CREATE_WORDS);
    let update_hits = matches(UPDATE_WORDS);
    let delete_hits = matches(DELETE_WORDS);
    let query_hits = matches(QUERY_WORDS);

    let candidates = [
        (Operation::Create, create_hits),
        (Operation::Delete, delete_hits),
        (Operation::Update, update_hits),
        (Operation::Query, query_hits),
    ];

    match candidates.iter().max_by_key(|(_, hits)| *hits) {
        Some((op, hits)) if *hits > 0 => {
            let confidence = (0.7 + 0.1 * (*hits as f32 - 1.0).max(0.0)).min(0.99);
            (*op, confidence)
        }
        _ => (Operation::Read, 0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_create_synonyms() {
        for word in ["create", "spin up", "put together", "assemble"] {
            let (op, confidence) = classify_operation(&format!("{word} a project"));
            assert_eq!(op, Operation::Create, "word={word}");
            assert!(confidence >= 0.7);
        }
    }

    #[test]
    fn recognizes_delete_synonyms() {
        let (op, _) = classify_operation("purge the old epics");
        assert_eq!(op, Operation::Delete);
    }

    #[test]
    fn recognizes_query_synonyms() {
        let (op, _) = classify_operation("how many tasks are pending");
        assert_eq!(op, Operation::Query);
    }

    #[test]
    fn no_recognized_verb_is_zero_confidence() {
        let (_, confidence) = classify_operation("banana smoothie recipe");
        assert_eq!(confidence, 0.0);
    }
}
