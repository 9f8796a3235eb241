//! Property-based tests for the state machine
//!
//! These tests drive the engine with arbitrary trigger sequences and check
//! that history and state invariants hold across all of them.

use super::refill::{fields as f, triggers as t};
use super::*;
use crate::engine::WorkflowEngine;
use crate::error::WorkflowError;
use crate::session::SessionManager;
use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;

// ============================================================================
// Test Helpers
// ============================================================================

const ALL_TRIGGERS: &[&str] = &[
    t::MEDICATION_REQUEST,
    t::MEDICATION_IDENTIFIED,
    t::MEDICATION_NOT_FOUND,
    t::DOSAGE_CONFIRMED,
    t::DOSAGE_CHANGE_REQUESTED,
    t::WRONG_MEDICATION,
    t::SAFETY_CHECKED,
    t::PHARMACY_SELECTED,
    t::PHARMACY_NOT_FOUND,
    t::ORDER_CONFIRMED,
    t::CHANGE_PHARMACY,
    t::ORDER_SUBMITTED,
    t::RESTART_CONVERSATION,
    t::RETRY_IDENTIFICATION,
    t::RETRY_PHARMACY_SEARCH,
    t::ESCALATE,
    t::CANCEL_REFILL,
    t::TOOL_RESULTS,
    "not_a_trigger",
];

fn engine() -> WorkflowEngine {
    let definition = Arc::new(refill_workflow());
    let sessions = Arc::new(SessionManager::new(Arc::clone(&definition)));
    WorkflowEngine::new(definition, sessions)
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_trigger() -> impl Strategy<Value = &'static str> {
    proptest::sample::select(ALL_TRIGGERS)
}

fn arb_updates() -> impl Strategy<Value = Fields> {
    (
        proptest::option::of(any::<bool>()),
        proptest::option::of(any::<bool>()),
        proptest::option::of("[a-z]{0,8}"),
        proptest::option::of("[a-z0-9]{0,4}"),
    )
        .prop_map(|(interaction, allergy, medication, order)| {
            let mut updates = Fields::new();
            if let Some(v) = interaction {
                updates.insert(f::INTERACTION_FOUND.to_string(), json!(v));
            }
            if let Some(v) = allergy {
                updates.insert(f::ALLERGY_CONFLICT.to_string(), json!(v));
            }
            if let Some(v) = medication {
                updates.insert(f::MEDICATION_NAME.to_string(), json!(v));
                updates.insert(f::DOSAGE.to_string(), json!("5mg"));
            }
            if let Some(v) = order {
                updates.insert(f::ORDER_CONFIRMATION.to_string(), json!(v));
            }
            updates
        })
}

fn arb_step() -> impl Strategy<Value = (&'static str, Fields)> {
    (arb_trigger(), arb_updates())
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // History grows by exactly one per successful call and chains states
    #[test]
    fn prop_history_tracks_successful_transitions(steps in proptest::collection::vec(arb_step(), 0..30)) {
        let e = engine();
        e.sessions().create("p", None, Fields::new()).unwrap();
        let mut successes = 0usize;

        for (trigger, updates) in steps {
            let before = e.sessions().get("p").unwrap();
            match e.transition("p", trigger, updates) {
                Ok(outcome) => {
                    successes += 1;
                    let history = outcome.context.history();
                    prop_assert_eq!(history.len(), successes);
                    let last = &history[history.len() - 1];
                    prop_assert_eq!(last.from, before.current_state());
                    prop_assert_eq!(last.to, outcome.context.current_state());
                    prop_assert_eq!(last.trigger.as_str(), trigger);
                }
                Err(err) => {
                    prop_assert!(
                        matches!(err, WorkflowError::NoMatchingTransition { .. }),
                        "unexpected error {:?}", err
                    );
                    // No partial mutation on rejection
                    prop_assert_eq!(&e.sessions().get("p").unwrap(), &before);
                }
            }
        }
    }

    // Current state is always declared and terminal states are sticky
    #[test]
    fn prop_state_declared_and_terminal_sticky(steps in proptest::collection::vec(arb_step(), 0..30)) {
        let e = engine();
        e.sessions().create("p", None, Fields::new()).unwrap();
        let mut reached_terminal: Option<WorkflowState> = None;

        for (trigger, updates) in steps {
            let _ = e.transition("p", trigger, updates);
            let state = e.sessions().get("p").unwrap().current_state();
            prop_assert!(e.definition().states().contains(state));
            if let Some(terminal) = reached_terminal {
                prop_assert_eq!(state, terminal);
            } else if e.definition().states().is_terminal(state) {
                reached_terminal = Some(state);
            }
        }
    }

    // Every history entry is an edge that exists in the table
    #[test]
    fn prop_history_entries_are_table_edges(steps in proptest::collection::vec(arb_step(), 0..30)) {
        let e = engine();
        e.sessions().create("p", None, Fields::new()).unwrap();
        for (trigger, updates) in steps {
            let _ = e.transition("p", trigger, updates);
        }
        let ctx = e.sessions().get("p").unwrap();
        for entry in ctx.history() {
            let declared = e.definition().transitions().all().iter().any(|edge| {
                edge.from == entry.from && edge.to == entry.to && edge.trigger == entry.trigger
            });
            prop_assert!(declared, "undeclared edge {:?}", entry);
        }
    }

    // Safety branch is chosen by recorded results, never by position
    #[test]
    fn prop_safety_branch_is_deterministic(
        interaction in any::<bool>(),
        allergy in any::<bool>(),
        active in any::<bool>(),
    ) {
        let e = engine();
        e.sessions().create("p", None, Fields::new()).unwrap();
        e.transition("p", t::MEDICATION_REQUEST, Fields::new()).unwrap();
        e.transition("p", t::MEDICATION_IDENTIFIED, Fields::new()).unwrap();
        e.transition("p", t::DOSAGE_CONFIRMED, Fields::new()).unwrap();

        let mut results = Fields::new();
        results.insert(f::INTERACTION_FOUND.to_string(), json!(interaction));
        results.insert(f::ALLERGY_CONFLICT.to_string(), json!(allergy));
        results.insert(f::PRESCRIPTION_ACTIVE.to_string(), json!(active));
        e.transition("p", t::TOOL_RESULTS, results).unwrap();

        let outcome = e.transition("p", t::SAFETY_CHECKED, Fields::new()).unwrap();
        let expected = if interaction || allergy || !active {
            WorkflowState::Escalated
        } else {
            WorkflowState::SelectPharmacy
        };
        prop_assert_eq!(outcome.state(), expected);
    }

    // Valid triggers are exactly the ones that succeed
    #[test]
    fn prop_valid_triggers_agree_with_transition(steps in proptest::collection::vec(arb_step(), 0..15)) {
        let e = engine();
        e.sessions().create("p", None, Fields::new()).unwrap();
        for (trigger, updates) in steps {
            let _ = e.transition("p", trigger, updates);
        }

        let valid = e.valid_triggers("p").unwrap();
        let ctx = e.sessions().get("p").unwrap();
        for trigger in ALL_TRIGGERS {
            let resolves = e
                .definition()
                .transitions()
                .resolve(ctx.current_state(), trigger, &ctx)
                .is_ok();
            prop_assert_eq!(resolves, valid.iter().any(|v| v == trigger));
        }
    }
}
