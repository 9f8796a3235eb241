//! Workflow state types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

// ============================================================================
// Tool Identifiers - External capabilities a state may require
// ============================================================================

/// Tools the caller must run while a state is active.
///
/// The engine never invokes these itself; it only declares them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefillTool {
    PatientHistory,
    MedicationSearch,
    PrescriptionStatus,
    DrugInteractionCheck,
    AllergyCheck,
    PharmacySearch,
    InsuranceCoverage,
    OrderSubmission,
}

impl RefillTool {
    pub fn as_str(self) -> &'static str {
        match self {
            RefillTool::PatientHistory => "patient_history",
            RefillTool::MedicationSearch => "medication_search",
            RefillTool::PrescriptionStatus => "prescription_status",
            RefillTool::DrugInteractionCheck => "drug_interaction_check",
            RefillTool::AllergyCheck => "allergy_check",
            RefillTool::PharmacySearch => "pharmacy_search",
            RefillTool::InsuranceCoverage => "insurance_coverage",
            RefillTool::OrderSubmission => "order_submission",
        }
    }
}

impl fmt::Display for RefillTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Workflow State
// ============================================================================

/// Stage of the refill conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowState {
    /// Conversation opened, nothing requested yet
    Start,
    /// Working out which medication the patient means
    IdentifyMedication,
    /// Confirming strength and dosing instructions
    ConfirmDosage,
    /// Interaction, allergy and prescription checks
    CheckSafety,
    /// Choosing where the refill is dispensed
    SelectPharmacy,
    /// Patient reviews the assembled order
    ConfirmOrder,
    /// Order handed to the pharmacy
    SubmitOrder,
    /// Refill placed
    Completed,
    /// Handed to a pharmacist or prescriber
    Escalated,
    /// Patient abandoned the refill
    Cancelled,
    /// Recoverable failure; only recovery triggers leave it
    Error,
}

impl WorkflowState {
    /// Every variant, in workflow order
    pub const ALL: [WorkflowState; 11] = [
        WorkflowState::Start,
        WorkflowState::IdentifyMedication,
        WorkflowState::ConfirmDosage,
        WorkflowState::CheckSafety,
        WorkflowState::SelectPharmacy,
        WorkflowState::ConfirmOrder,
        WorkflowState::SubmitOrder,
        WorkflowState::Completed,
        WorkflowState::Escalated,
        WorkflowState::Cancelled,
        WorkflowState::Error,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowState::Start => "START",
            WorkflowState::IdentifyMedication => "IDENTIFY_MEDICATION",
            WorkflowState::ConfirmDosage => "CONFIRM_DOSAGE",
            WorkflowState::CheckSafety => "CHECK_SAFETY",
            WorkflowState::SelectPharmacy => "SELECT_PHARMACY",
            WorkflowState::ConfirmOrder => "CONFIRM_ORDER",
            WorkflowState::SubmitOrder => "SUBMIT_ORDER",
            WorkflowState::Completed => "COMPLETED",
            WorkflowState::Escalated => "ESCALATED",
            WorkflowState::Cancelled => "CANCELLED",
            WorkflowState::Error => "ERROR",
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// State Definition
// ============================================================================

/// Declared properties of a state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateDefinition {
    pub id: WorkflowState,
    pub label: &'static str,
    /// Tools the caller should run while this state is active
    pub required_tools: Vec<RefillTool>,
    /// Context fields that must be non-empty for the state to count as entered
    pub required_context: Vec<&'static str>,
    /// How long the caller may wait for the user before giving up
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    pub terminal: bool,
}

/// Default time a state waits on the user
pub const DEFAULT_STATE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

impl StateDefinition {
    pub fn new(id: WorkflowState, label: &'static str) -> Self {
        Self {
            id,
            label,
            required_tools: Vec::new(),
            required_context: Vec::new(),
            timeout: DEFAULT_STATE_TIMEOUT,
            terminal: false,
        }
    }

    #[must_use]
    pub fn tools(mut self, tools: impl IntoIterator<Item = RefillTool>) -> Self {
        self.required_tools.extend(tools);
        self
    }

    #[must_use]
    pub fn requires(mut self, fields: impl IntoIterator<Item = &'static str>) -> Self {
        self.required_context.extend(fields);
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn terminal(mut self) -> Self {
        self.terminal = true;
        self
    }
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_secs())
    }
}
