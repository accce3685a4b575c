//! Stage 1: intent classifier.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intent {
    Command,
    Query,
    Confirmation,
    Cancellation,
    Help,
    Conversation,
}

const CONFIRM_WORDS: &[&str] = &["yes", "y", "confirm", "ok", "proceed", "go ahead"];
const CANCEL_WORDS: &[&str] = &["no", "n", "cancel", "abort", "stop", "nevermind"];
const HELP_PHRASES: &[&str] = &["help", "what can you do", "list commands"];
const QUERY_WORDS: &[&str] = &[
    "show", "list", "get", "find", "search", "query", "lookup", "locate", "display", "view", "see", "check", "what",
    "which", "where", "who", "count", "how many", "status", "state", "info", "details", "describe",
];

/// Returns the intent and a confidence in `[0.0, 1.0]`.
pub fn classify_intent(text: &str) -> (Intent, f32) {
    let lower = text.trim().to_lowercase();

    if CONFIRM_WORDS.iter().any(|w| lower == *w) {
        return (Intent::Confirmation, 1.0);
    }
    if CANCEL_WORDS.iter().any(|w| lower == *w) {
        return (Intent::Cancellation, 1.0);
    }
    if HELP_PHRASES.iter().any(|w| lower == *w) {
        return (Intent::Help, 0.95);
    }
    if QUERY_WORDS.iter().any(|w| lower.starts_with(w) || lower.contains(&format!(" {w} "))) {
        return (Intent::Query, 0.85);
    }
    if lower.split_whitespace().count() <= 2 {
        // Too short to carry an identifiable operation/entity pair.
        return (Intent::Conversation, 0.4);
    }
    (Intent::Command, 0.75)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_confirmation() {
        assert_eq!(classify_intent("yes").0, Intent::Confirmation);
        assert_eq!(classify_intent("Y").0, Intent::Confirmation);
        assert_eq!(classify_intent("go ahead").0, Intent::Confirmation);
    }

    #[test]
    fn recognizes_cancellation() {
        assert_eq!(classify_intent("nevermind").0, Intent::Cancellation);
        assert_eq!(classify_intent("cancel").0, Intent::Cancellation);
    }

    #[test]
    fn recognizes_query() {
        assert_eq!(classify_intent("show all projects").0, Intent::Query);
    }

    #[test]
    fn short_vague_input_is_conversation_at_low_confidence() {
        let (intent, confidence) = classify_intent("help me");
        assert_eq!(intent, Intent::Conversation);
        assert_eq!(confidence, 0.4);
    }

    #[test]
    fn exact_help_phrase_recognized() {
        assert_eq!(classify_intent("help").0, Intent::Help);
        assert_eq!(classify_intent("what can you do").0, Intent::Help);
    }

    #[test]
    fn command_for_concrete_sentence() {
        let (intent, confidence) = classify_intent("create project TestProj");
        assert_eq!(intent, Intent::Command);
        assert!(confidence >= 0.7);
    }
}
