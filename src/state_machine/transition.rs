//! Transition table and edge resolution

use super::context::WorkflowContext;
use super::guard::Guard;
use super::state::WorkflowState;
use crate::error::WorkflowError;

/// A legal `(from, trigger) -> to` edge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: WorkflowState,
    pub trigger: &'static str,
    pub to: WorkflowState,
    pub guard: Option<Guard>,
    pub description: &'static str,
}

impl Transition {
    pub fn new(from: WorkflowState, trigger: &'static str, to: WorkflowState) -> Self {
        Self {
            from,
            trigger,
            to,
            guard: None,
            description: "",
        }
    }

    #[must_use]
    pub fn when(mut self, guard: Guard) -> Self {
        self.guard = Some(guard);
        self
    }

    #[must_use]
    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Unguarded edges are always allowed
    pub fn allows(&self, context: &WorkflowContext) -> bool {
        self.guard.as_ref().map_or(true, |guard| guard.check(context))
    }
}

/// Static catalogue of legal edges, in declaration order
#[derive(Debug, Clone, Default)]
pub struct TransitionTable {
    edges: Vec<Transition>,
}

impl TransitionTable {
    pub fn new(edges: Vec<Transition>) -> Self {
        Self { edges }
    }

    pub fn all(&self) -> &[Transition] {
        &self.edges
    }

    /// Edges leaving `state`, in table order
    pub fn edges_from(&self, state: WorkflowState) -> impl Iterator<Item = &Transition> {
        self.edges.iter().filter(move |edge| edge.from == state)
    }

    /// Pick the single edge for `trigger` that the context currently allows.
    ///
    /// Guards are evaluated in table order. More than one satisfied candidate
    /// is a table defect and is reported, never resolved by position.
    pub fn resolve(
        &self,
        state: WorkflowState,
        trigger: &str,
        context: &WorkflowContext,
    ) -> Result<&Transition, WorkflowError> {
        let mut matched = self
            .edges_from(state)
            .filter(|edge| edge.trigger == trigger)
            .filter(|edge| edge.allows(context));

        let Some(first) = matched.next() else {
            return Err(WorkflowError::NoMatchingTransition {
                state,
                trigger: trigger.to_string(),
            });
        };

        let others: Vec<WorkflowState> = matched.map(|edge| edge.to).collect();
        if others.is_empty() {
            Ok(first)
        } else {
            let mut targets = vec![first.to];
            targets.extend(others);
            Err(WorkflowError::AmbiguousTransition {
                state,
                trigger: trigger.to_string(),
                targets,
            })
        }
    }

    /// Distinct triggers from `state` whose guard holds, in table order
    pub fn valid_triggers(&self, state: WorkflowState, context: &WorkflowContext) -> Vec<&'static str> {
        let mut triggers: Vec<&'static str> = Vec::new();
        for edge in self.edges_from(state).filter(|edge| edge.allows(context)) {
            if !triggers.contains(&edge.trigger) {
                triggers.push(edge.trigger);
            }
        }
        triggers
    }
}
