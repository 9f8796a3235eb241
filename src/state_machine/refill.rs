//! The medication-refill workflow
//!
//! START -> IDENTIFY_MEDICATION -> CONFIRM_DOSAGE -> CHECK_SAFETY
//!       -> SELECT_PHARMACY -> CONFIRM_ORDER -> SUBMIT_ORDER -> COMPLETED
//!
//! Safety concerns and dose changes escalate to a pharmacist. Lookup and
//! submission failures land in ERROR, whose edges lead back into the flow.

use super::context::WorkflowContext;
use super::definition::WorkflowDefinition;
use super::guard::Guard;
use super::registry::StateRegistry;
use super::state::{RefillTool, StateDefinition, WorkflowState};
use super::transition::{Transition, TransitionTable};
use std::time::Duration;

/// Trigger names understood by the refill workflow
pub mod triggers {
    pub const MEDICATION_REQUEST: &str = "medication_request";
    pub const MEDICATION_IDENTIFIED: &str = "medication_identified";
    pub const MEDICATION_NOT_FOUND: &str = "medication_not_found";
    pub const DOSAGE_CONFIRMED: &str = "dosage_confirmed";
    pub const DOSAGE_CHANGE_REQUESTED: &str = "dosage_change_requested";
    pub const WRONG_MEDICATION: &str = "wrong_medication";
    pub const SAFETY_CHECKED: &str = "safety_checked";
    pub const PHARMACY_SELECTED: &str = "pharmacy_selected";
    pub const PHARMACY_NOT_FOUND: &str = "pharmacy_not_found";
    pub const ORDER_CONFIRMED: &str = "order_confirmed";
    pub const CHANGE_PHARMACY: &str = "change_pharmacy";
    pub const ORDER_SUBMITTED: &str = "order_submitted";
    pub const RESTART_CONVERSATION: &str = "restart_conversation";
    pub const RETRY_IDENTIFICATION: &str = "retry_identification";
    pub const RETRY_PHARMACY_SEARCH: &str = "retry_pharmacy_search";
    pub const ESCALATE: &str = "escalate";
    pub const CANCEL_REFILL: &str = "cancel_refill";
    /// Self-loop that records tool output without changing state
    pub const TOOL_RESULTS: &str = "tool_results";
}

/// Context field names the workflow reads
pub mod fields {
    pub const MEDICATION_NAME: &str = "medication_name";
    pub const DOSAGE: &str = "dosage";
    pub const PHARMACY_ID: &str = "pharmacy_id";
    pub const INTERACTION_FOUND: &str = "interaction_found";
    pub const ALLERGY_CONFLICT: &str = "allergy_conflict";
    pub const PRESCRIPTION_ACTIVE: &str = "prescription_active";
    pub const ORDER_CONFIRMATION: &str = "order_confirmation";
}

// ============================================================================
// Guards
// ============================================================================

fn has_safety_concern(ctx: &WorkflowContext) -> bool {
    ctx.field_bool(fields::INTERACTION_FOUND).unwrap_or(false)
        || ctx.field_bool(fields::ALLERGY_CONFLICT).unwrap_or(false)
        || ctx.field_bool(fields::PRESCRIPTION_ACTIVE) == Some(false)
}

fn order_accepted(ctx: &WorkflowContext) -> bool {
    ctx.has_field(fields::ORDER_CONFIRMATION)
}

fn medication_settled(ctx: &WorkflowContext) -> bool {
    ctx.has_field(fields::MEDICATION_NAME) && ctx.has_field(fields::DOSAGE)
}

pub const SAFETY_CONCERN: Guard = Guard::new("safety_concern", has_safety_concern);
pub const ORDER_ACCEPTED: Guard = Guard::new("order_accepted", order_accepted);
pub const MEDICATION_SETTLED: Guard = Guard::new("medication_settled", medication_settled);

// ============================================================================
// Definition
// ============================================================================

const MINUTE: u64 = 60;

fn minutes(n: u64) -> Duration {
    Duration::from_secs(n * MINUTE)
}

fn refill_states() -> StateRegistry {
    use fields::{DOSAGE, MEDICATION_NAME, PHARMACY_ID};
    use RefillTool as T;
    use WorkflowState as S;

    StateRegistry::new(vec![
        StateDefinition::new(S::Start, "Conversation started").timeout(minutes(30)),
        StateDefinition::new(S::IdentifyMedication, "Identify medication")
            .tools([T::PatientHistory, T::MedicationSearch])
            .timeout(minutes(15)),
        StateDefinition::new(S::ConfirmDosage, "Confirm dosage")
            .tools([T::PrescriptionStatus])
            .requires([MEDICATION_NAME])
            .timeout(minutes(15)),
        StateDefinition::new(S::CheckSafety, "Safety checks")
            .tools([T::DrugInteractionCheck, T::AllergyCheck])
            .requires([MEDICATION_NAME, DOSAGE])
            .timeout(minutes(10)),
        StateDefinition::new(S::SelectPharmacy, "Select pharmacy")
            .tools([T::PharmacySearch, T::InsuranceCoverage])
            .requires([MEDICATION_NAME, DOSAGE])
            .timeout(minutes(15)),
        StateDefinition::new(S::ConfirmOrder, "Confirm order")
            .requires([MEDICATION_NAME, DOSAGE, PHARMACY_ID])
            .timeout(minutes(15)),
        StateDefinition::new(S::SubmitOrder, "Submit order")
            .tools([T::OrderSubmission])
            .requires([MEDICATION_NAME, DOSAGE, PHARMACY_ID])
            .timeout(minutes(5)),
        StateDefinition::new(S::Completed, "Refill placed")
            .timeout(minutes(5))
            .terminal(),
        StateDefinition::new(S::Escalated, "Escalated to pharmacist")
            .timeout(minutes(5))
            .terminal(),
        StateDefinition::new(S::Cancelled, "Refill cancelled")
            .timeout(minutes(5))
            .terminal(),
        StateDefinition::new(S::Error, "Recoverable error").timeout(minutes(10)),
    ])
}

fn refill_transitions() -> TransitionTable {
    use triggers as t;
    use WorkflowState as S;

    let mut edges = vec![
        Transition::new(S::Start, t::MEDICATION_REQUEST, S::IdentifyMedication)
            .describe("Patient asked for a refill"),
        // Identification
        Transition::new(S::IdentifyMedication, t::TOOL_RESULTS, S::IdentifyMedication)
            .describe("Recorded patient history and medication lookups"),
        Transition::new(S::IdentifyMedication, t::MEDICATION_IDENTIFIED, S::ConfirmDosage)
            .describe("Medication matched to the patient's record"),
        Transition::new(S::IdentifyMedication, t::MEDICATION_NOT_FOUND, S::Error)
            .describe("No matching medication on record"),
        // Dosage
        Transition::new(S::ConfirmDosage, t::TOOL_RESULTS, S::ConfirmDosage)
            .describe("Recorded prescription status"),
        Transition::new(S::ConfirmDosage, t::DOSAGE_CONFIRMED, S::CheckSafety)
            .describe("Patient confirmed the current dosage"),
        Transition::new(S::ConfirmDosage, t::DOSAGE_CHANGE_REQUESTED, S::Escalated)
            .describe("Dose changes need the prescriber"),
        Transition::new(S::ConfirmDosage, t::WRONG_MEDICATION, S::IdentifyMedication)
            .describe("Patient meant a different medication"),
        // Safety
        Transition::new(S::CheckSafety, t::TOOL_RESULTS, S::CheckSafety)
            .describe("Recorded interaction and allergy checks"),
        Transition::new(S::CheckSafety, t::SAFETY_CHECKED, S::SelectPharmacy)
            .when(SAFETY_CONCERN.negate())
            .describe("No safety concerns found"),
        Transition::new(S::CheckSafety, t::SAFETY_CHECKED, S::Escalated)
            .when(SAFETY_CONCERN)
            .describe("Safety concern needs pharmacist review"),
        // Pharmacy
        Transition::new(S::SelectPharmacy, t::TOOL_RESULTS, S::SelectPharmacy)
            .describe("Recorded pharmacy search and coverage"),
        Transition::new(S::SelectPharmacy, t::PHARMACY_SELECTED, S::ConfirmOrder)
            .describe("Patient picked a pharmacy"),
        Transition::new(S::SelectPharmacy, t::PHARMACY_NOT_FOUND, S::Error)
            .describe("No suitable pharmacy found"),
        // Order
        Transition::new(S::ConfirmOrder, t::ORDER_CONFIRMED, S::SubmitOrder)
            .describe("Patient approved the order"),
        Transition::new(S::ConfirmOrder, t::CHANGE_PHARMACY, S::SelectPharmacy)
            .describe("Patient wants another pharmacy"),
        Transition::new(S::SubmitOrder, t::TOOL_RESULTS, S::SubmitOrder)
            .describe("Recorded order submission result"),
        Transition::new(S::SubmitOrder, t::ORDER_SUBMITTED, S::Completed)
            .when(ORDER_ACCEPTED)
            .describe("Pharmacy accepted the order"),
        Transition::new(S::SubmitOrder, t::ORDER_SUBMITTED, S::Error)
            .when(ORDER_ACCEPTED.negate())
            .describe("Order submission failed"),
        // Recovery
        Transition::new(S::Error, t::RESTART_CONVERSATION, S::Start)
            .describe("Start the refill over, keeping collected data"),
        Transition::new(S::Error, t::RETRY_IDENTIFICATION, S::IdentifyMedication)
            .describe("Try identifying the medication again"),
        Transition::new(S::Error, t::RETRY_PHARMACY_SEARCH, S::SelectPharmacy)
            .when(MEDICATION_SETTLED)
            .describe("Search pharmacies again for the settled medication"),
        Transition::new(S::Error, t::ESCALATE, S::Escalated)
            .describe("Hand the conversation to a pharmacist"),
    ];

    let cancellable = [
        S::Start,
        S::IdentifyMedication,
        S::ConfirmDosage,
        S::CheckSafety,
        S::SelectPharmacy,
        S::ConfirmOrder,
        S::Error,
    ];
    edges.extend(cancellable.into_iter().map(|state| {
        Transition::new(state, t::CANCEL_REFILL, S::Cancelled).describe("Patient cancelled the refill")
    }));

    TransitionTable::new(edges)
}

/// Build the refill workflow. Validate with [`WorkflowDefinition::validated`].
pub fn refill_workflow() -> WorkflowDefinition {
    WorkflowDefinition::new(WorkflowState::Start, refill_states(), refill_transitions())
}
