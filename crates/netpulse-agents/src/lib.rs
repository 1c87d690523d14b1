//! NetPulse agents
//!
//! The intent-routed agent interface: free-text queries are dispatched to
//! one of seven domain handlers (discovery, knowledge, diagnosis,
//! compliance, forecast, remediation, verification), each exposing
//! `process(task)` and `chat(message)`. The [`coordinator::Coordinator`]
//! owns routing and the named multi-step workflows.

pub mod compliance;
pub mod coordinator;
pub mod diagnosis;
pub mod discovery;
pub mod forecast;
pub mod handler;
pub mod knowledge;
pub mod remediation;
pub mod verification;

pub use coordinator::{Coordinator, HandlerStatus, WorkflowStep};
pub use handler::{AgentHandler, HandlerLog};
