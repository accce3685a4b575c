//! Event bus: central pub/sub for orchestrator events, backed by a
//! `tokio::sync::broadcast` channel. Components emit, consumers (TUI, file
//! logger, test harness) subscribe.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use super::types::OrchEvent;

/// Default channel capacity (events).
pub const DEFAULT_CHANNEL_CAPACITY: usize = 10_000;

pub struct EventBus {
    tx: broadcast::Sender<OrchEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "EventBus::new");
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Fire-and-forget: dropped silently if there are no subscribers.
    pub fn emit(&self, event: OrchEvent) {
        debug!(event_type = event.event_type(), task_id = event.task_id(), "EventBus::emit");
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrchEvent> {
        self.tx.subscribe()
    }

    pub fn emitter_for(&self, task_id: impl Into<String>) -> EventEmitter {
        EventEmitter { tx: self.tx.clone(), task_id: task_id.into() }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Cheap-to-clone handle bound to one task id.
#[derive(Clone)]
pub struct EventEmitter {
    tx: broadcast::Sender<OrchEvent>,
    task_id: String,
}

impl EventEmitter {
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn emit(&self, event: OrchEvent) {
        let _ = self.tx.send(event);
    }

    pub fn prompt_prepared(&self, session_id: &str, iteration: u32, prompt_chars: usize) {
        self.emit(OrchEvent::PromptPrepared {
            task_id: self.task_id.clone(),
            session_id: session_id.to_string(),
            iteration,
            prompt_chars,
        });
    }

    pub fn prompt_sent(&self, session_id: &str, iteration: u32, max_turns: u32) {
        self.emit(OrchEvent::PromptSent { task_id: self.task_id.clone(), session_id: session_id.to_string(), iteration, max_turns });
    }

    pub fn response_received(&self, session_id: &str, iteration: u32, turns_used: u32, windowed_tokens: u64) {
        self.emit(OrchEvent::ResponseReceived {
            task_id: self.task_id.clone(),
            session_id: session_id.to_string(),
            iteration,
            turns_used,
            windowed_tokens,
        });
    }

    pub fn validation_done(&self, iteration: u32, quality: f32, confidence: f32) {
        self.emit(OrchEvent::ValidationDone { task_id: self.task_id.clone(), iteration, quality, confidence });
    }

    pub fn decision_made(&self, iteration: u32, decision: &str) {
        self.emit(OrchEvent::DecisionMade { task_id: self.task_id.clone(), iteration, decision: decision.to_string() });
    }

    pub fn breakpoint_triggered(&self, reason: &str) {
        self.emit(OrchEvent::BreakpointTriggered { task_id: self.task_id.clone(), reason: reason.to_string() });
    }

    pub fn session_refreshed(&self, old_session_id: &str, new_session_id: &str) {
        self.emit(OrchEvent::SessionRefreshed {
            task_id: self.task_id.clone(),
            old_session_id: old_session_id.to_string(),
            new_session_id: new_session_id.to_string(),
        });
    }

    pub fn checkpoint_created(&self, session_id: &str, trigger: &str) {
        self.emit(OrchEvent::CheckpointCreated { task_id: self.task_id.clone(), session_id: session_id.to_string(), trigger: trigger.to_string() });
    }

    pub fn paused(&self, reason: &str) {
        self.emit(OrchEvent::Paused { task_id: self.task_id.clone(), reason: reason.to_string() });
    }

    pub fn resumed(&self) {
        self.emit(OrchEvent::Resumed { task_id: self.task_id.clone() });
    }

    pub fn error(&self, context: &str, message: &str) {
        self.emit(OrchEvent::Error { task_id: self.task_id.clone(), context: context.to_string(), message: message.to_string() });
    }

    pub fn warning(&self, context: &str, message: &str) {
        self.emit(OrchEvent::Warning { task_id: self.task_id.clone(), context: context.to_string(), message: message.to_string() });
    }
}

pub fn create_event_bus() -> Arc<EventBus> {
    Arc::new(EventBus::with_default_capacity())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscriber_count_tracks_subscribe_calls() {
        let bus = EventBus::new(100);
        assert_eq!(bus.subscriber_count(), 0);
        let _rx1 = bus.subscribe();
        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn emitter_convenience_methods_reach_subscribers() {
        let bus = EventBus::new(100);
        let mut rx = bus.subscribe();
        let emitter = bus.emitter_for("task-1");

        emitter.prompt_prepared("sess-1", 1, 500);
        emitter.decision_made(1, "PROCEED");
        emitter.breakpoint_triggered("LOW_CONFIDENCE");

        for expected in ["PromptPrepared", "DecisionMade", "BreakpointTriggered"] {
            let event = rx.recv().await.unwrap();
            assert_eq!(event.event_type(), expected);
            assert_eq!(event.task_id(), "task-1");
        }
    }

    #[tokio::test]
    async fn no_subscribers_does_not_panic() {
        let bus = EventBus::new(100);
        bus.emit(OrchEvent::Resumed { task_id: "t1".to_string() });
    }

    #[tokio::test]
    async fn multiple_subscribers_all_receive() {
        let bus = EventBus::new(100);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        bus.emit(OrchEvent::Resumed { task_id: "t1".to_string() });
        assert_eq!(rx1.recv().await.unwrap().task_id(), "t1");
        assert_eq!(rx2.recv().await.unwrap().task_id(), "t1");
    }

    #[tokio::test]
    async fn lagged_subscriber_can_continue() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();
        for i in 0..10 {
            bus.emit(OrchEvent::Resumed { task_id: format!("t{i}") });
        }
        match rx.recv().await {
            Ok(_) => {}
            Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => assert!(n > 0),
            Err(e) => panic!("unexpected error: {e:?}"),
        }
    }
}
