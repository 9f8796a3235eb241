//! State registry

use super::state::{StateDefinition, WorkflowState};
use crate::error::WorkflowError;

/// Catalogue of declared states, immutable after construction
#[derive(Debug, Clone, Default)]
pub struct StateRegistry {
    states: Vec<StateDefinition>,
}

impl StateRegistry {
    pub fn new(states: Vec<StateDefinition>) -> Self {
        Self { states }
    }

    /// First definition declared for `state`
    pub fn get(&self, state: WorkflowState) -> Result<&StateDefinition, WorkflowError> {
        self.states
            .iter()
            .find(|def| def.id == state)
            .ok_or(WorkflowError::UnknownState(state))
    }

    /// Declaration order
    pub fn all(&self) -> &[StateDefinition] {
        &self.states
    }

    pub fn contains(&self, state: WorkflowState) -> bool {
        self.states.iter().any(|def| def.id == state)
    }

    /// Undeclared states are not terminal
    pub fn is_terminal(&self, state: WorkflowState) -> bool {
        self.get(state).is_ok_and(|def| def.terminal)
    }
}
