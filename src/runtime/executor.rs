//! Conversation loop driving the workflow engine
//!
//! One call per user message: interpret, transition, run the new state's
//! tools outside the engine, record their results and follow any trigger
//! they imply, then render a reply.

use super::traits::{
    ReplyRequest, ResponseGenerator, ToolExecutor, ToolOutcome, TriggerInterpreter,
};
use crate::engine::{TransitionOutcome, TransitionWarning, WorkflowEngine};
use crate::error::WorkflowError;
use crate::state_machine::refill::triggers;
use crate::state_machine::{Fields, WorkflowContext, WorkflowState};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Tool-driven follow-up transitions allowed per message
const MAX_AUTO_STEPS: usize = 4;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error("Interpreter failed: {0}")]
    Interpreter(String),
    #[error("Response generation failed: {0}")]
    Responder(String),
}

/// What happened while handling one message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Turn {
    pub state: WorkflowState,
    pub reply: String,
    pub tool_outcomes: Vec<ToolOutcome>,
    pub warnings: Vec<TransitionWarning>,
    /// Trigger that was not valid in the session's state, if any
    pub rejected_trigger: Option<String>,
}

pub struct ConversationRuntime<I, T, R>
where
    I: TriggerInterpreter,
    T: ToolExecutor,
    R: ResponseGenerator,
{
    engine: Arc<WorkflowEngine>,
    interpreter: I,
    tools: T,
    responder: R,
}

impl<I, T, R> ConversationRuntime<I, T, R>
where
    I: TriggerInterpreter,
    T: ToolExecutor,
    R: ResponseGenerator,
{
    pub fn new(engine: Arc<WorkflowEngine>, interpreter: I, tools: T, responder: R) -> Self {
        Self {
            engine,
            interpreter,
            tools,
            responder,
        }
    }

    pub fn engine(&self) -> &Arc<WorkflowEngine> {
        &self.engine
    }

    /// Handle one user message for `session_id`
    pub async fn handle_message(&self, session_id: &str, text: &str) -> Result<Turn, RuntimeError> {
        let context = self.engine.sessions().get(session_id)?;
        let interpretation = self
            .interpreter
            .interpret(text, &context)
            .await
            .map_err(RuntimeError::Interpreter)?;

        tracing::debug!(
            session_id = %session_id,
            trigger = %interpretation.trigger,
            "Interpreted user message"
        );

        let outcome = match self.engine.transition(
            session_id,
            &interpretation.trigger,
            interpretation.updates,
        ) {
            Ok(outcome) => outcome,
            Err(WorkflowError::NoMatchingTransition { .. }) => {
                return self.reject(session_id, context, interpretation.trigger).await;
            }
            Err(e) => return Err(e.into()),
        };

        let (outcome, tool_outcomes) = self.run_tools(session_id, outcome).await?;
        let valid_triggers = self.engine.valid_triggers(session_id)?;

        let request = ReplyRequest {
            context: outcome.context.clone(),
            tool_outcomes,
            warnings: outcome.warnings.clone(),
            rejected_trigger: None,
            valid_triggers,
        };
        let reply = self
            .responder
            .respond(&request)
            .await
            .map_err(RuntimeError::Responder)?;

        Ok(Turn {
            state: outcome.state(),
            reply,
            tool_outcomes: request.tool_outcomes,
            warnings: outcome.warnings,
            rejected_trigger: None,
        })
    }

    async fn reject(
        &self,
        session_id: &str,
        context: WorkflowContext,
        trigger: String,
    ) -> Result<Turn, RuntimeError> {
        let valid_triggers = self.engine.valid_triggers(session_id)?;
        tracing::info!(
            session_id = %session_id,
            state = %context.current_state(),
            trigger = %trigger,
            valid = ?valid_triggers,
            "Trigger not actionable, re-prompting"
        );

        let request = ReplyRequest {
            context,
            tool_outcomes: Vec::new(),
            warnings: Vec::new(),
            rejected_trigger: Some(trigger),
            valid_triggers,
        };
        let reply = self
            .responder
            .respond(&request)
            .await
            .map_err(RuntimeError::Responder)?;

        Ok(Turn {
            state: request.context.current_state(),
            reply,
            tool_outcomes: Vec::new(),
            warnings: Vec::new(),
            rejected_trigger: request.rejected_trigger,
        })
    }

    /// Dispatch tools for tool-ready states and follow implied triggers
    async fn run_tools(
        &self,
        session_id: &str,
        mut outcome: TransitionOutcome,
    ) -> Result<(TransitionOutcome, Vec<ToolOutcome>), RuntimeError> {
        let mut all_outcomes = Vec::new();

        for _ in 0..MAX_AUTO_STEPS {
            if !outcome.is_tool_ready() {
                break;
            }
            let tools = self.engine.required_tools(session_id)?;
            if tools.is_empty() {
                break;
            }

            let mut recorded = Fields::new();
            let mut follow_up = None;
            for tool in tools {
                let result = self.tools.execute(tool, &outcome.context).await;
                tracing::info!(
                    session_id = %session_id,
                    tool = %tool,
                    success = result.success,
                    "Tool finished"
                );
                recorded.extend(result.updates.clone());
                if follow_up.is_none() {
                    follow_up.clone_from(&result.follow_up);
                }
                all_outcomes.push(result);
            }

            let records_results = self
                .engine
                .valid_triggers(session_id)?
                .iter()
                .any(|t| t == triggers::TOOL_RESULTS);
            if records_results && !recorded.is_empty() {
                outcome = self
                    .engine
                    .transition(session_id, triggers::TOOL_RESULTS, std::mem::take(&mut recorded))?;
            }

            let Some(trigger) = follow_up else {
                if !recorded.is_empty() {
                    tracing::warn!(session_id = %session_id, "State cannot record tool results, dropping them");
                }
                break;
            };
            match self.engine.transition(session_id, &trigger, recorded) {
                Ok(next) => outcome = next,
                Err(WorkflowError::NoMatchingTransition { state, trigger }) => {
                    tracing::warn!(
                        session_id = %session_id,
                        state = %state,
                        trigger = %trigger,
                        "Tool follow-up not valid here, leaving it to the user"
                    );
                    break;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok((outcome, all_outcomes))
    }
}
