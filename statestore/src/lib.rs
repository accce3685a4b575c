//! statestore — the StatePort contract and its default SQLite-backed
//! implementation: transactional, single-source-of-truth persistence for
//! projects, work items, sessions, interactions, breakpoints, and
//! checkpoints.
//!
//! # Architecture
//!
//! ```text
//! StateManager (actor, single writer)
//!   └── mpsc::Receiver<Command> ── drained by one owning task
//!         └── Store (rusqlite::Connection)
//! ```
//!
//! Callers never touch [`Store`] directly outside this crate's own tests;
//! production code goes through [`StateManager`], which serializes every
//! write through a single owning task.

pub mod domain;
pub mod error;
mod id;
pub mod manager;
mod migrations;
pub mod recovery;
mod schema;
pub mod store;

pub use domain::*;
pub use error::{Result, StoreError};
pub use id::{generate_id, generate_slugged_id};
pub use manager::StateManager;
pub use recovery::RecoveryReport;
pub use schema::SCHEMA_VERSION;
pub use store::Store;
