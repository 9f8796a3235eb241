//! A complete workflow: initial state, registry and table

use super::registry::StateRegistry;
use super::state::WorkflowState;
use super::transition::TransitionTable;
use crate::diagnostics::{self, Severity, ValidationIssue};
use crate::error::WorkflowError;

#[derive(Debug, Clone)]
pub struct WorkflowDefinition {
    initial: WorkflowState,
    states: StateRegistry,
    transitions: TransitionTable,
}

impl WorkflowDefinition {
    pub fn new(initial: WorkflowState, states: StateRegistry, transitions: TransitionTable) -> Self {
        Self {
            initial,
            states,
            transitions,
        }
    }

    pub fn initial(&self) -> WorkflowState {
        self.initial
    }

    pub fn states(&self) -> &StateRegistry {
        &self.states
    }

    pub fn transitions(&self) -> &TransitionTable {
        &self.transitions
    }

    /// Run the validator and refuse definitions with error-level issues.
    ///
    /// Returns warnings so the caller can log them.
    pub fn validated(self) -> Result<(Self, Vec<ValidationIssue>), WorkflowError> {
        let issues = diagnostics::validate(&self);
        let (errors, warnings): (Vec<_>, Vec<_>) = issues
            .into_iter()
            .partition(|issue| issue.severity == Severity::Error);

        if errors.is_empty() {
            Ok((self, warnings))
        } else {
            Err(WorkflowError::InvalidDefinition(errors))
        }
    }
}
