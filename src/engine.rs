//! Workflow engine
//!
//! Validates and applies transitions against the static tables and exposes
//! the per-session query API. The engine does no I/O: it only tells the
//! caller which tools a state needs.

use crate::diagnostics::SessionSummary;
use crate::error::{WorkflowError, WorkflowResult};
use crate::session::{self, SessionManager};
use crate::state_machine::{Fields, RefillTool, WorkflowContext, WorkflowDefinition, WorkflowState};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Non-fatal findings attached to a successful transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransitionWarning {
    /// The target state was entered but still lacks data; its tools should
    /// not run yet.
    MissingRequiredContext {
        state: WorkflowState,
        fields: Vec<String>,
    },
}

/// Result of a successful transition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionOutcome {
    pub context: WorkflowContext,
    pub warnings: Vec<TransitionWarning>,
}

impl TransitionOutcome {
    pub fn state(&self) -> WorkflowState {
        self.context.current_state()
    }

    /// No missing-context warnings, so the state's tools may be dispatched
    pub fn is_tool_ready(&self) -> bool {
        !self
            .warnings
            .iter()
            .any(|w| matches!(w, TransitionWarning::MissingRequiredContext { .. }))
    }
}

pub struct WorkflowEngine {
    definition: Arc<WorkflowDefinition>,
    sessions: Arc<SessionManager>,
}

impl WorkflowEngine {
    pub fn new(definition: Arc<WorkflowDefinition>, sessions: Arc<SessionManager>) -> Self {
        Self {
            definition,
            sessions,
        }
    }

    pub fn definition(&self) -> &WorkflowDefinition {
        &self.definition
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Move a session along the edge selected by `trigger`.
    ///
    /// Guards see the context as it was before `updates`. On any error the
    /// session is left exactly as it was.
    pub fn transition(
        &self,
        session_id: &str,
        trigger: &str,
        updates: Fields,
    ) -> WorkflowResult<TransitionOutcome> {
        let handle = self.sessions.handle(session_id)?;
        let mut session = session::lock(&handle);
        let now = Utc::now();

        if !session.is_live(now) {
            return Err(WorkflowError::SessionNotFound(session_id.to_string()));
        }

        let from = session.context.current_state();
        let edge = match self
            .definition
            .transitions()
            .resolve(from, trigger, &session.context)
        {
            Ok(edge) => edge,
            Err(e) => {
                if e.is_configuration_defect() {
                    tracing::error!(session_id = %session_id, state = %from, trigger = %trigger, error = %e, "Transition table defect");
                } else {
                    tracing::debug!(session_id = %session_id, state = %from, trigger = %trigger, "Transition rejected");
                }
                return Err(e);
            }
        };

        let target = self.definition.states().get(edge.to)?;
        let ttl = self.sessions.ttl_for(edge.to)?;

        session.context.apply(edge, updates, now);
        session.touch(now, ttl);

        let missing = session.context.missing_fields(&target.required_context);
        let warnings = if missing.is_empty() {
            Vec::new()
        } else {
            tracing::warn!(
                session_id = %session_id,
                state = %edge.to,
                missing = ?missing,
                "Entered state without required context"
            );
            vec![TransitionWarning::MissingRequiredContext {
                state: edge.to,
                fields: missing.into_iter().map(String::from).collect(),
            }]
        };

        tracing::info!(
            session_id = %session_id,
            from = %from,
            to = %edge.to,
            trigger = %trigger,
            history_len = session.context.history().len(),
            "Transition applied"
        );

        Ok(TransitionOutcome {
            context: session.context.clone(),
            warnings,
        })
    }

    /// Triggers whose guards currently hold
    pub fn valid_triggers(&self, session_id: &str) -> WorkflowResult<Vec<String>> {
        let context = self.sessions.get(session_id)?;
        Ok(self.triggers_for(&context))
    }

    fn triggers_for(&self, context: &WorkflowContext) -> Vec<String> {
        self.definition
            .transitions()
            .valid_triggers(context.current_state(), context)
            .into_iter()
            .map(String::from)
            .collect()
    }

    /// Tools declared by the session's current state
    pub fn required_tools(&self, session_id: &str) -> WorkflowResult<Vec<RefillTool>> {
        let context = self.sessions.get(session_id)?;
        Ok(self
            .definition
            .states()
            .get(context.current_state())?
            .required_tools
            .clone())
    }

    /// How long the caller may wait on the user in the current state
    pub fn state_timeout(&self, session_id: &str) -> WorkflowResult<Duration> {
        let context = self.sessions.get(session_id)?;
        Ok(self.definition.states().get(context.current_state())?.timeout)
    }

    /// Composite read-only view for debugging
    pub fn summarize(&self, session_id: &str) -> WorkflowResult<SessionSummary> {
        let handle = self.sessions.handle(session_id)?;
        let (context, last_touched, expires_at) = {
            let session = session::lock(&handle);
            if !session.is_live(Utc::now()) {
                return Err(WorkflowError::SessionNotFound(session_id.to_string()));
            }
            (session.context.clone(), session.last_touched, session.expires_at)
        };

        let state = self.definition.states().get(context.current_state())?;
        let missing_fields: Vec<String> = context
            .missing_fields(&state.required_context)
            .into_iter()
            .map(String::from)
            .collect();

        Ok(SessionSummary {
            session_id: context.session_id().to_string(),
            patient_id: context.patient_id().map(String::from),
            current_state: state.id,
            state_label: state.label.to_string(),
            terminal: state.terminal,
            valid_triggers: self.triggers_for(&context),
            required_tools: state.required_tools.clone(),
            tool_ready: missing_fields.is_empty(),
            missing_fields,
            history: context.history().to_vec(),
            fields: context.fields().clone(),
            created_at: context.created_at(),
            updated_at: context.updated_at(),
            last_touched,
            expires_at,
        })
    }
}
