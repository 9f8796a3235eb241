//! Named guard predicates

use super::context::WorkflowContext;
use std::fmt;

/// Pure predicate over the context deciding whether an edge may be taken.
///
/// Guards are plain function pointers so they cannot capture state, which
/// keeps reachability analysis and history replay valid. Two guards built
/// from the same predicate with opposite polarity are provably disjoint.
#[derive(Clone, Copy)]
pub struct Guard {
    name: &'static str,
    predicate: fn(&WorkflowContext) -> bool,
    negated: bool,
}

impl Guard {
    pub const fn new(name: &'static str, predicate: fn(&WorkflowContext) -> bool) -> Self {
        Self {
            name,
            predicate,
            negated: false,
        }
    }

    /// The same predicate with inverted result
    #[must_use]
    pub const fn negate(self) -> Self {
        Self {
            negated: !self.negated,
            ..self
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    pub fn check(&self, context: &WorkflowContext) -> bool {
        (self.predicate)(context) != self.negated
    }

    /// Whether both guards can never hold at once.
    ///
    /// Only complementary polarity of one predicate is recognised. A shared
    /// name over different functions does not count.
    pub fn is_disjoint_with(&self, other: &Guard) -> bool {
        self.name == other.name && self.same_predicate(other) && self.negated != other.negated
    }

    fn same_predicate(&self, other: &Guard) -> bool {
        self.predicate as usize == other.predicate as usize
    }

    /// Whether both guards are the same named predicate and polarity
    pub fn is_same_as(&self, other: &Guard) -> bool {
        self.name == other.name && self.negated == other.negated
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guard({self})")
    }
}

impl fmt::Display for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            write!(f, "!{}", self.name)
        } else {
            f.write_str(self.name)
        }
    }
}

impl PartialEq for Guard {
    fn eq(&self, other: &Self) -> bool {
        self.is_same_as(other)
    }
}

impl Eq for Guard {}
