//! Workflow error taxonomy

use crate::diagnostics::ValidationIssue;
use crate::state_machine::WorkflowState;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),
    #[error("Session already exists: {0}")]
    SessionAlreadyExists(String),
    #[error("Unknown state: {0}")]
    UnknownState(WorkflowState),
    #[error("No transition for trigger '{trigger}' from {state}")]
    NoMatchingTransition {
        state: WorkflowState,
        trigger: String,
    },
    #[error("Ambiguous transition for trigger '{trigger}' from {state}: {targets:?}")]
    AmbiguousTransition {
        state: WorkflowState,
        trigger: String,
        targets: Vec<WorkflowState>,
    },
    #[error("Invalid workflow definition ({} issue(s))", .0.len())]
    InvalidDefinition(Vec<ValidationIssue>),
}

impl WorkflowError {
    /// Table or registry defects that should stop start-up rather than be retried
    pub fn is_configuration_defect(&self) -> bool {
        matches!(
            self,
            Self::UnknownState(_) | Self::AmbiguousTransition { .. } | Self::InvalidDefinition(_)
        )
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;
