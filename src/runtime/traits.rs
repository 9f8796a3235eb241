//! Trait abstractions for the engine's collaborators
//!
//! These traits enable testing the conversation loop with mock implementations.

use crate::engine::TransitionWarning;
use crate::state_machine::{Fields, RefillTool, WorkflowContext};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What the NLU layer made of one user message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interpretation {
    pub trigger: String,
    #[serde(default)]
    pub updates: Fields,
}

impl Interpretation {
    pub fn new(trigger: impl Into<String>) -> Self {
        Self {
            trigger: trigger.into(),
            updates: Fields::new(),
        }
    }

    #[must_use]
    pub fn with_updates(mut self, updates: Fields) -> Self {
        self.updates = updates;
        self
    }
}

/// Structured result of one tool run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub tool: RefillTool,
    pub success: bool,
    /// Fields to record in the session context
    #[serde(default)]
    pub updates: Fields,
    /// Trigger the result implies, e.g. `medication_not_found`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up: Option<String>,
    #[serde(default)]
    pub message: String,
}

impl ToolOutcome {
    pub fn success(tool: RefillTool, updates: Fields) -> Self {
        Self {
            tool,
            success: true,
            updates,
            follow_up: None,
            message: String::new(),
        }
    }

    pub fn failure(tool: RefillTool, message: impl Into<String>) -> Self {
        Self {
            tool,
            success: false,
            updates: Fields::new(),
            follow_up: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn then(mut self, trigger: impl Into<String>) -> Self {
        self.follow_up = Some(trigger.into());
        self
    }
}

/// Everything the response layer needs to phrase a reply
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplyRequest {
    pub context: WorkflowContext,
    pub tool_outcomes: Vec<ToolOutcome>,
    pub warnings: Vec<TransitionWarning>,
    /// Set when the user's request was not actionable in this state
    pub rejected_trigger: Option<String>,
    pub valid_triggers: Vec<String>,
}

/// Turns free text into a trigger plus field updates
#[async_trait]
pub trait TriggerInterpreter: Send + Sync {
    async fn interpret(&self, text: &str, context: &WorkflowContext) -> Result<Interpretation, String>;
}

/// Runs the lookups and actions a state declares
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, tool: RefillTool, context: &WorkflowContext) -> ToolOutcome;
}

/// Renders the assistant's reply for a turn
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    async fn respond(&self, request: &ReplyRequest) -> Result<String, String>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: TriggerInterpreter + ?Sized> TriggerInterpreter for Arc<T> {
    async fn interpret(&self, text: &str, context: &WorkflowContext) -> Result<Interpretation, String> {
        (**self).interpret(text, context).await
    }
}

#[async_trait]
impl<T: ToolExecutor + ?Sized> ToolExecutor for Arc<T> {
    async fn execute(&self, tool: RefillTool, context: &WorkflowContext) -> ToolOutcome {
        (**self).execute(tool, context).await
    }
}

#[async_trait]
impl<T: ResponseGenerator + ?Sized> ResponseGenerator for Arc<T> {
    async fn respond(&self, request: &ReplyRequest) -> Result<String, String> {
        (**self).respond(request).await
    }
}
