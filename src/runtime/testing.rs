//! Mock implementations for testing
//!
//! These mocks enable driving whole conversations without real lookups.

use super::traits::*;
use crate::state_machine::{RefillTool, WorkflowContext};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

// ============================================================================
// Mock Interpreter
// ============================================================================

/// Returns queued interpretations in order
#[derive(Default)]
pub struct MockInterpreter {
    queue: Mutex<VecDeque<Result<Interpretation, String>>>,
    /// Texts seen, in order
    pub seen: Mutex<Vec<String>>,
}

impl MockInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&self, interpretation: Interpretation) {
        self.queue.lock().unwrap().push_back(Ok(interpretation));
    }

    pub fn queue_error(&self, message: &str) {
        self.queue.lock().unwrap().push_back(Err(message.to_string()));
    }
}

#[async_trait]
impl TriggerInterpreter for MockInterpreter {
    async fn interpret(&self, text: &str, _context: &WorkflowContext) -> Result<Interpretation, String> {
        self.seen.lock().unwrap().push(text.to_string());
        self.queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err("No mock interpretation queued".to_string()))
    }
}

// ============================================================================
// Mock Tool Executor
// ============================================================================

/// Tool executor with predefined outcomes per tool
#[derive(Default)]
pub struct MockToolExecutor {
    outcomes: HashMap<RefillTool, ToolOutcome>,
    /// Record of every call with the state it ran in
    pub calls: Mutex<Vec<(RefillTool, String)>>,
}

impl MockToolExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_outcome(mut self, outcome: ToolOutcome) -> Self {
        self.outcomes.insert(outcome.tool, outcome);
        self
    }

    pub fn called(&self) -> Vec<RefillTool> {
        self.calls.lock().unwrap().iter().map(|(tool, _)| *tool).collect()
    }
}

#[async_trait]
impl ToolExecutor for MockToolExecutor {
    async fn execute(&self, tool: RefillTool, context: &WorkflowContext) -> ToolOutcome {
        self.calls
            .lock()
            .unwrap()
            .push((tool, context.current_state().to_string()));
        self.outcomes
            .get(&tool)
            .cloned()
            .unwrap_or_else(|| ToolOutcome::failure(tool, "No mock outcome configured"))
    }
}

// ============================================================================
// Template Responder
// ============================================================================

/// Deterministic one-line replies
#[derive(Default)]
pub struct TemplateResponder {
    pub fail: bool,
}

#[async_trait]
impl ResponseGenerator for TemplateResponder {
    async fn respond(&self, request: &ReplyRequest) -> Result<String, String> {
        if self.fail {
            return Err("responder offline".to_string());
        }
        Ok(match &request.rejected_trigger {
            Some(trigger) => format!(
                "Cannot {trigger} now; try one of: {}",
                request.valid_triggers.join(", ")
            ),
            None => format!("Now at {}", request.context.current_state()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::WorkflowEngine;
    use crate::fields;
    use crate::runtime::{ConversationRuntime, RuntimeError};
    use crate::session::SessionManager;
    use crate::state_machine::refill::{fields as f, triggers as t};
    use crate::state_machine::{refill_workflow, Fields, WorkflowState};
    use std::sync::Arc;

    type TestRuntime =
        ConversationRuntime<Arc<MockInterpreter>, Arc<MockToolExecutor>, TemplateResponder>;

    fn engine() -> Arc<WorkflowEngine> {
        let definition = Arc::new(refill_workflow());
        let sessions = Arc::new(SessionManager::new(Arc::clone(&definition)));
        Arc::new(WorkflowEngine::new(definition, sessions))
    }

    fn happy_tools() -> MockToolExecutor {
        MockToolExecutor::new()
            .with_outcome(ToolOutcome::success(
                RefillTool::PatientHistory,
                fields! { "history_checked" => true },
            ))
            .with_outcome(
                ToolOutcome::success(
                    RefillTool::MedicationSearch,
                    fields! { f::MEDICATION_NAME => "lisinopril" },
                )
                .then(t::MEDICATION_IDENTIFIED),
            )
            .with_outcome(ToolOutcome::success(
                RefillTool::PrescriptionStatus,
                fields! { f::PRESCRIPTION_ACTIVE => true },
            ))
            .with_outcome(ToolOutcome::success(
                RefillTool::DrugInteractionCheck,
                fields! { f::INTERACTION_FOUND => false },
            ))
            .with_outcome(
                ToolOutcome::success(
                    RefillTool::AllergyCheck,
                    fields! { f::ALLERGY_CONFLICT => false },
                )
                .then(t::SAFETY_CHECKED),
            )
            .with_outcome(ToolOutcome::success(
                RefillTool::PharmacySearch,
                fields! { "pharmacy_options" => ["ph-1", "ph-2"] },
            ))
            .with_outcome(ToolOutcome::success(
                RefillTool::InsuranceCoverage,
                fields! { "covered" => true },
            ))
            .with_outcome(
                ToolOutcome::success(
                    RefillTool::OrderSubmission,
                    fields! { f::ORDER_CONFIRMATION => "RX-1001" },
                )
                .then(t::ORDER_SUBMITTED),
            )
    }

    fn runtime(tools: MockToolExecutor) -> (TestRuntime, Arc<MockInterpreter>, Arc<MockToolExecutor>) {
        let interpreter = Arc::new(MockInterpreter::new());
        let tools = Arc::new(tools);
        let rt = ConversationRuntime::new(
            engine(),
            Arc::clone(&interpreter),
            Arc::clone(&tools),
            TemplateResponder::default(),
        );
        rt.engine().sessions().create("s1", Some("patient-1".into()), Fields::new()).unwrap();
        (rt, interpreter, tools)
    }

    #[tokio::test]
    async fn full_refill_conversation() {
        let (rt, nlu, tools) = runtime(happy_tools());

        nlu.queue(Interpretation::new(t::MEDICATION_REQUEST));
        let turn = rt.handle_message("s1", "I need my blood pressure pills").await.unwrap();
        // Identification tools resolved the medication and moved on to dosage
        assert_eq!(turn.state, WorkflowState::ConfirmDosage);
        assert_eq!(turn.reply, "Now at CONFIRM_DOSAGE");
        assert_eq!(
            tools.called(),
            vec![
                RefillTool::PatientHistory,
                RefillTool::MedicationSearch,
                RefillTool::PrescriptionStatus
            ]
        );

        nlu.queue(Interpretation::new(t::DOSAGE_CONFIRMED).with_updates(fields! { f::DOSAGE => "10mg daily" }));
        let turn = rt.handle_message("s1", "yes, same dose").await.unwrap();
        assert_eq!(turn.state, WorkflowState::SelectPharmacy);
        assert_eq!(turn.tool_outcomes.len(), 4);

        nlu.queue(Interpretation::new(t::PHARMACY_SELECTED).with_updates(fields! { f::PHARMACY_ID => "ph-1" }));
        let turn = rt.handle_message("s1", "the first one").await.unwrap();
        assert_eq!(turn.state, WorkflowState::ConfirmOrder);
        assert!(turn.tool_outcomes.is_empty());

        nlu.queue(Interpretation::new(t::ORDER_CONFIRMED));
        let turn = rt.handle_message("s1", "go ahead").await.unwrap();
        assert_eq!(turn.state, WorkflowState::Completed);

        let ctx = rt.engine().sessions().get("s1").unwrap();
        assert_eq!(ctx.field_str(f::ORDER_CONFIRMATION), Some("RX-1001"));
        assert_eq!(ctx.field_str(f::MEDICATION_NAME), Some("lisinopril"));
        assert!(ctx
            .history()
            .windows(2)
            .all(|pair| pair[0].to == pair[1].from));
    }

    #[tokio::test]
    async fn invalid_trigger_reprompts_without_moving() {
        let (rt, nlu, tools) = runtime(happy_tools());
        nlu.queue(Interpretation::new(t::ORDER_CONFIRMED));

        let turn = rt.handle_message("s1", "confirm my order").await.unwrap();
        assert_eq!(turn.state, WorkflowState::Start);
        assert_eq!(turn.rejected_trigger.as_deref(), Some(t::ORDER_CONFIRMED));
        assert_eq!(
            turn.reply,
            "Cannot order_confirmed now; try one of: medication_request, cancel_refill"
        );
        assert!(tools.called().is_empty());
        assert!(rt.engine().sessions().get("s1").unwrap().history().is_empty());
    }

    #[tokio::test]
    async fn failed_lookup_routes_to_error_state() {
        let tools = MockToolExecutor::new()
            .with_outcome(ToolOutcome::success(RefillTool::PatientHistory, Fields::new()))
            .with_outcome(
                ToolOutcome::failure(RefillTool::MedicationSearch, "no match").then(t::MEDICATION_NOT_FOUND),
            );
        let (rt, nlu, _) = runtime(tools);

        nlu.queue(Interpretation::new(t::MEDICATION_REQUEST));
        let turn = rt.handle_message("s1", "refill the blue one").await.unwrap();
        assert_eq!(turn.state, WorkflowState::Error);
        assert!(turn.tool_outcomes.iter().any(|o| !o.success));

        nlu.queue(Interpretation::new(t::ESCALATE));
        let turn = rt.handle_message("s1", "let me talk to someone").await.unwrap();
        assert_eq!(turn.state, WorkflowState::Escalated);
    }

    #[tokio::test]
    async fn missing_context_holds_back_tools() {
        let tools = MockToolExecutor::new()
            .with_outcome(ToolOutcome::success(RefillTool::PatientHistory, Fields::new()))
            .with_outcome(ToolOutcome::success(RefillTool::MedicationSearch, Fields::new()));
        let (rt, nlu, tools) = runtime(tools);

        nlu.queue(Interpretation::new(t::MEDICATION_REQUEST));
        rt.handle_message("s1", "refill please").await.unwrap();

        nlu.queue(Interpretation::new(t::MEDICATION_IDENTIFIED));
        let turn = rt.handle_message("s1", "that one").await.unwrap();
        assert_eq!(turn.state, WorkflowState::ConfirmDosage);
        assert_eq!(turn.warnings.len(), 1);
        assert!(!tools.called().contains(&RefillTool::PrescriptionStatus));
    }

    #[tokio::test]
    async fn collaborator_failures_surface_as_errors() {
        let (rt, nlu, _) = runtime(happy_tools());
        nlu.queue_error("model timeout");
        assert!(matches!(
            rt.handle_message("s1", "hello").await,
            Err(RuntimeError::Interpreter(msg)) if msg == "model timeout"
        ));

        assert!(matches!(
            rt.handle_message("nobody", "hello").await,
            Err(RuntimeError::Workflow(crate::error::WorkflowError::SessionNotFound(_)))
        ));

        let interpreter = Arc::new(MockInterpreter::new());
        interpreter.queue(Interpretation::new(t::CANCEL_REFILL));
        let rt = ConversationRuntime::new(
            engine(),
            Arc::clone(&interpreter),
            Arc::new(MockToolExecutor::new()),
            TemplateResponder { fail: true },
        );
        rt.engine().sessions().create("s2", None, Fields::new()).unwrap();
        assert!(matches!(
            rt.handle_message("s2", "never mind").await,
            Err(RuntimeError::Responder(_))
        ));
    }
}
