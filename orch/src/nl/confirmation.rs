//! Confirmation state machine: a
//! `PendingConfirmation` is kept in memory per conversation, never
//! persisted, and expires after `confirmation_timeout` seconds.

use crate::nl::pipeline::OperationContext;

const CONFIRM_WORDS: &[&str] = &["yes", "y", "confirm", "ok", "proceed", "go ahead"];
const CANCEL_WORDS: &[&str] = &["no", "n", "cancel", "abort", "stop", "nevermind"];

#[derive(Clone, Debug)]
pub struct PendingConfirmation {
    pub operation: OperationContext,
    pub summary: String,
    pub created_at_epoch_secs: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    Confirmed,
    Cancelled,
    Expired,
    NotPending,
}

/// Tracks at most one pending confirmation; any input other than a
/// confirmation or cancellation word implicitly discards whatever was
/// pending before it.
#[derive(Default)]
pub struct ConfirmationState {
    pending: Option<PendingConfirmation>,
}

impl ConfirmationState {
    pub fn new() -> Self {
        Self { pending: None }
    }

    pub fn set(&mut self, pending: PendingConfirmation) {
        self.pending = Some(pending);
    }

    pub fn peek(&self) -> Option<&PendingConfirmation> {
        self.pending.as_ref()
    }

    pub fn clear(&mut self) -> Option<PendingConfirmation> {
        self.pending.take()
    }

    /// Resolves `text` against whatever is pending. `now_epoch_secs` and
    /// `timeout_secs` are caller-supplied so this stays free of wall-clock
    /// access for testability.
    pub fn resolve(&mut self, text: &str, now_epoch_secs: i64, timeout_secs: i64) -> ConfirmationOutcome {
        let Some(pending) = &self.pending else {
            return ConfirmationOutcome::NotPending;
        };

        if now_epoch_secs - pending.created_at_epoch_secs > timeout_secs {
            self.pending = None;
            return ConfirmationOutcome::Expired;
        }

        let lower = text.trim().to_lowercase();
        if CONFIRM_WORDS.iter().any(|w| lower == *w) {
            return ConfirmationOutcome::Confirmed;
        }
        if CANCEL_WORDS.iter().any(|w| lower == *w) {
            self.pending = None;
            return ConfirmationOutcome::Cancelled;
        }

        self.pending = None;
        ConfirmationOutcome::NotPending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nl::entity::EntityType;
    use crate::nl::identifier::Identifier;
    use crate::nl::operation::Operation;
    use crate::nl::parameters::Parameters;

    fn sample_pending(created_at: i64) -> PendingConfirmation {
        PendingConfirmation {
            operation: OperationContext {
                operation: Operation::Delete,
                entities: vec![EntityType::Project],
                identifier: Some(Identifier::All),
                parameters: Parameters::default(),
                project_id: "p1".to_string(),
            },
            summary: "delete all projects".to_string(),
            created_at_epoch_secs: created_at,
        }
    }

    #[test]
    fn confirm_word_resolves_confirmed() {
        let mut state = ConfirmationState::new();
        state.set(sample_pending(1_000));
        assert_eq!(state.resolve("yes", 1_010, 60), ConfirmationOutcome::Confirmed);
    }

    #[test]
    fn cancel_word_clears_pending() {
        let mut state = ConfirmationState::new();
        state.set(sample_pending(1_000));
        assert_eq!(state.resolve("nevermind", 1_010, 60), ConfirmationOutcome::Cancelled);
        assert!(state.peek().is_none());
    }

    #[test]
    fn expiry_is_checked_before_word_match() {
        let mut state = ConfirmationState::new();
        state.set(sample_pending(1_000));
        assert_eq!(state.resolve("yes", 1_100, 60), ConfirmationOutcome::Expired);
    }

    #[test]
    fn unrelated_input_clears_pending_implicitly() {
        let mut state = ConfirmationState::new();
        state.set(sample_pending(1_000));
        assert_eq!(state.resolve("show all tasks", 1_010, 60), ConfirmationOutcome::NotPending);
        assert!(state.peek().is_none());
    }

    #[test]
    fn nothing_pending_reports_not_pending() {
        let mut state = ConfirmationState::new();
        assert_eq!(state.resolve("yes", 1_000, 60), ConfirmationOutcome::NotPending);
    }
}
