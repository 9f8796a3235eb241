//! Refill workflow engine
//!
//! A session-scoped state machine that walks a medication-refill
//! conversation through validated stages. The engine tracks per-session
//! context, enforces legal transitions and declares which external tools
//! each stage needs; callers run those tools and feed results back.

pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod runtime;
pub mod session;
pub mod state_machine;

pub use config::EngineConfig;
pub use diagnostics::{export_graph, validate, SessionSummary, ValidationIssue, WorkflowGraph};
pub use engine::{TransitionOutcome, TransitionWarning, WorkflowEngine};
pub use error::{WorkflowError, WorkflowResult};
pub use session::SessionManager;
pub use state_machine::{
    refill_workflow, Fields, RefillTool, WorkflowContext, WorkflowDefinition, WorkflowState,
};
