//! External collaborator contracts. Only the capability interfaces
//! are specified here; concrete transports (subprocess, SSH, HTTP) are out
//! of scope and live outside this crate.

pub mod agent;
pub mod model;
mod registry;

pub use agent::{AgentCallContext, AgentPort, AgentResult};
pub use model::ModelPort;
pub use registry::PortRegistry;

#[cfg(test)]
pub use agent::mock;
