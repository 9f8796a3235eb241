//! Core refill workflow state machine
//!
//! States are a closed enum; legal moves live in a static transition table
//! with named pure guards. Context is changed only by the engine.

mod context;
mod definition;
mod guard;
pub mod refill;
mod registry;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use context::{Fields, HistoryEntry, WorkflowContext};
pub use definition::WorkflowDefinition;
pub use guard::Guard;
pub use refill::refill_workflow;
pub use registry::StateRegistry;
pub use state::{RefillTool, StateDefinition, WorkflowState};
pub use transition::{Transition, TransitionTable};
