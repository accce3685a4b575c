//! Event bus architecture for live observability.
//!
//! Every stage of the Orchestrator's iteration loop emits an [`OrchEvent`]
//! over a `tokio::sync::broadcast` channel. Consumers (a TUI, the file
//! logger, test harnesses) subscribe independently; none of them can block
//! the orchestrator.

mod bus;
mod logger;
mod production;
mod types;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus, EventEmitter, create_event_bus};
pub use logger::{EventLogger, read_task_events, spawn_event_logger};
pub use production::{ProductionLog, ProductionRecordType, redact};
pub use types::{EventLogEntry, OrchEvent};
