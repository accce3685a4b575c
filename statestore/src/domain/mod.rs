//! Persistent entity types owned exclusively by the state store.

mod breakpoint;
mod checkpoint;
mod interaction;
mod project;
mod session;
mod token_ledger;
mod work_item;

pub use breakpoint::{Breakpoint, BreakpointReason, BreakpointResolution};
pub use checkpoint::{CheckpointRecord, CheckpointTrigger};
pub use interaction::{Interaction, InteractionMetadata};
pub use project::{Project, ProjectStatus};
pub use session::{Session, SessionStatus};
pub use token_ledger::TokenLedgerEntry;
pub use work_item::{Priority, WorkItem, WorkItemKind, WorkItemStatus};

/// Reserved identifier sentinel for bulk operations. It must never
/// appear as a stored identifier — `Store::create_work_item` rejects it.
pub const ALL_SENTINEL: &str = "__ALL__";
