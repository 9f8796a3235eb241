//! Workflow validation and introspection
//!
//! `validate` is a start-up check over the static tables; it never looks at
//! sessions. The graph export and session summary are read-only views for
//! debugging and visualisation.

use crate::state_machine::{
    Fields, HistoryEntry, RefillTool, Transition, WorkflowDefinition, WorkflowState,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::fmt::{self, Write as _};

// ============================================================================
// Validation
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IssueKind {
    /// No path from the initial state
    UnreachableState { state: WorkflowState },
    /// Non-terminal state with no way out
    DeadEnd { state: WorkflowState },
    /// Duplicate `(from, trigger)` that can certainly match twice
    AmbiguousDuplicate {
        state: WorkflowState,
        trigger: String,
    },
    /// Duplicate `(from, trigger)` whose guards are not provably disjoint
    OverlappingGuards {
        state: WorkflowState,
        trigger: String,
        guards: (String, String),
    },
    /// Terminal state that declares outgoing edges
    TerminalHasOutgoing {
        state: WorkflowState,
        trigger: String,
    },
    /// Edge or initial state referencing an undeclared state
    UnknownState { state: WorkflowState },
    /// State declared more than once
    DuplicateState { state: WorkflowState },
    /// Initial state is terminal
    TerminalInitial { state: WorkflowState },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    #[serde(flatten)]
    pub kind: IssueKind,
}

impl ValidationIssue {
    fn error(kind: IssueKind) -> Self {
        Self {
            severity: Severity::Error,
            kind,
        }
    }

    fn warning(kind: IssueKind) -> Self {
        Self {
            severity: Severity::Warning,
            kind,
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        match &self.kind {
            IssueKind::UnreachableState { state } => {
                write!(f, "{level}: {state} is unreachable from the initial state")
            }
            IssueKind::DeadEnd { state } => {
                write!(f, "{level}: non-terminal {state} has no outgoing transition")
            }
            IssueKind::AmbiguousDuplicate { state, trigger } => {
                write!(f, "{level}: {state} --{trigger}--> can match more than one edge")
            }
            IssueKind::OverlappingGuards {
                state,
                trigger,
                guards,
            } => write!(
                f,
                "{level}: {state} --{trigger}--> guards {} and {} may both hold",
                guards.0, guards.1
            ),
            IssueKind::TerminalHasOutgoing { state, trigger } => {
                write!(f, "{level}: terminal {state} declares trigger {trigger}")
            }
            IssueKind::UnknownState { state } => {
                write!(f, "{level}: {state} is referenced but not declared")
            }
            IssueKind::DuplicateState { state } => {
                write!(f, "{level}: {state} is declared more than once")
            }
            IssueKind::TerminalInitial { state } => {
                write!(f, "{level}: initial state {state} is terminal")
            }
        }
    }
}

/// Structural checks over a workflow definition.
///
/// Guards are treated as possibly true, so reachability is a property of the
/// table alone.
pub fn validate(definition: &WorkflowDefinition) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let states = definition.states();
    let edges = definition.transitions().all();

    // Declarations
    let mut seen = HashSet::new();
    for def in states.all() {
        if !seen.insert(def.id) {
            issues.push(ValidationIssue::error(IssueKind::DuplicateState { state: def.id }));
        }
    }

    let mut unknown = Vec::new();
    let mut note_unknown = |state: WorkflowState| {
        if !states.contains(state) && !unknown.contains(&state) {
            unknown.push(state);
        }
    };
    note_unknown(definition.initial());
    for edge in edges {
        note_unknown(edge.from);
        note_unknown(edge.to);
    }
    issues.extend(
        unknown
            .into_iter()
            .map(|state| ValidationIssue::error(IssueKind::UnknownState { state })),
    );

    if states.is_terminal(definition.initial()) {
        issues.push(ValidationIssue::error(IssueKind::TerminalInitial {
            state: definition.initial(),
        }));
    }

    // Reachability
    let reachable = reachable_from(definition.initial(), edges);
    for def in states.all() {
        if def.id != definition.initial() && !reachable.contains(&def.id) {
            issues.push(ValidationIssue::error(IssueKind::UnreachableState { state: def.id }));
        }
    }

    // Exits
    for def in states.all() {
        let mut outgoing = definition.transitions().edges_from(def.id).peekable();
        if def.terminal {
            for edge in outgoing {
                issues.push(ValidationIssue::error(IssueKind::TerminalHasOutgoing {
                    state: def.id,
                    trigger: edge.trigger.to_string(),
                }));
            }
        } else if outgoing.peek().is_none()
            || definition
                .transitions()
                .edges_from(def.id)
                .all(|edge| edge.to == def.id)
        {
            issues.push(ValidationIssue::error(IssueKind::DeadEnd { state: def.id }));
        }
    }

    // Duplicate (from, trigger) pairs
    for (i, a) in edges.iter().enumerate() {
        for b in edges.iter().skip(i + 1) {
            if a.from != b.from || a.trigger != b.trigger {
                continue;
            }
            if let Some(issue) = duplicate_issue(a, b) {
                issues.push(issue);
            }
        }
    }

    issues
}

fn duplicate_issue(a: &Transition, b: &Transition) -> Option<ValidationIssue> {
    match (&a.guard, &b.guard) {
        (Some(ga), Some(gb)) if ga.is_disjoint_with(gb) => None,
        (Some(ga), Some(gb)) if !ga.is_same_as(gb) => {
            Some(ValidationIssue::warning(IssueKind::OverlappingGuards {
                state: a.from,
                trigger: a.trigger.to_string(),
                guards: (ga.to_string(), gb.to_string()),
            }))
        }
        _ => Some(ValidationIssue::error(IssueKind::AmbiguousDuplicate {
            state: a.from,
            trigger: a.trigger.to_string(),
        })),
    }
}

/// Breadth-first closure over the table, ignoring guards
pub fn reachable_from(initial: WorkflowState, edges: &[Transition]) -> HashSet<WorkflowState> {
    let mut visited = HashSet::from([initial]);
    let mut queue = VecDeque::from([initial]);

    while let Some(state) = queue.pop_front() {
        for edge in edges.iter().filter(|edge| edge.from == state) {
            if visited.insert(edge.to) {
                queue.push_back(edge.to);
            }
        }
    }

    visited
}

// ============================================================================
// Graph Export
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    pub id: WorkflowState,
    pub label: String,
    pub initial: bool,
    pub terminal: bool,
    pub required_tools: Vec<RefillTool>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    pub from: WorkflowState,
    pub to: WorkflowState,
    pub trigger: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guard: Option<String>,
    pub description: String,
}

/// States and transitions as plain data
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

pub fn export_graph(definition: &WorkflowDefinition) -> WorkflowGraph {
    let nodes = definition
        .states()
        .all()
        .iter()
        .map(|def| GraphNode {
            id: def.id,
            label: def.label.to_string(),
            initial: def.id == definition.initial(),
            terminal: def.terminal,
            required_tools: def.required_tools.clone(),
            timeout_secs: def.timeout.as_secs(),
        })
        .collect();

    let edges = definition
        .transitions()
        .all()
        .iter()
        .map(|edge| GraphEdge {
            from: edge.from,
            to: edge.to,
            trigger: edge.trigger.to_string(),
            guard: edge.guard.map(|guard| guard.to_string()),
            description: edge.description.to_string(),
        })
        .collect();

    WorkflowGraph { nodes, edges }
}

impl WorkflowGraph {
    /// Graphviz rendering
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph workflow {\n    rankdir=LR;\n");

        for node in &self.nodes {
            let shape = if node.terminal { "doublecircle" } else { "box" };
            let style = if node.initial { ", style=bold" } else { "" };
            let _ = writeln!(
                out,
                "    \"{}\" [label=\"{}\", shape={shape}{style}];",
                node.id,
                escape(&node.label)
            );
        }

        for edge in &self.edges {
            let label = match &edge.guard {
                Some(guard) => format!("{} [{}]", edge.trigger, guard),
                None => edge.trigger.clone(),
            };
            let _ = writeln!(
                out,
                "    \"{}\" -> \"{}\" [label=\"{}\"];",
                edge.from,
                edge.to,
                escape(&label)
            );
        }

        out.push_str("}\n");
        out
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

// ============================================================================
// Session Summary
// ============================================================================

/// Read-only composite view of one session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub patient_id: Option<String>,
    pub current_state: WorkflowState,
    pub state_label: String,
    pub terminal: bool,
    pub valid_triggers: Vec<String>,
    pub required_tools: Vec<RefillTool>,
    /// Required fields for the current state that are still empty
    pub missing_fields: Vec<String>,
    /// All required fields present, so the state's tools may run
    pub tool_ready: bool,
    pub history: Vec<HistoryEntry>,
    pub fields: Fields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_touched: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
