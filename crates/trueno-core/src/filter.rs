//! Fluent builder for query filters.
//!
//! A filter is an ordered list of clauses. Each clause except `size` carries
//! a combinator saying how it joins the clause before it. The combinator is
//! `AND` unless the call right before the clause was [`Filter::or`] or
//! [`Filter::not`]; that choice applies to exactly one clause.
//!
//! ```
//! use trueno_core::filter::{Combinator, Filter};
//!
//! let ftr = Filter::new().term("prop.name", "alice").or().term("prop.name", "aura").limit(10);
//! let combinators: Vec<_> = ftr.clauses().iter().map(|c| c.combinator()).collect();
//! assert_eq!(combinators, vec![Some(Combinator::And), Some(Combinator::Or), None]);
//! ```
//!
//! Clause evaluation happens entirely on the server.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// How a clause combines with the one before it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Combinator {
    #[default]
    And,
    Or,
    Not,
}

/// Inequality operator of a range clause.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RangeOp {
    Gt,
    Gte,
    Lt,
    Lte,
}

/// One filter clause, serialized as `{"type": ..., "prop": ..., "val": ..., "ftr": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Clause {
    /// Exact match on a string or number.
    Term {
        prop: String,
        val: Value,
        ftr: Combinator,
    },
    /// Inequality on a number or date.
    Range {
        prop: String,
        op: RangeOp,
        val: Value,
        ftr: Combinator,
    },
    /// Field presence.
    Exist { prop: String, ftr: Combinator },
    Wildcard {
        prop: String,
        val: String,
        ftr: Combinator,
    },
    Regexp {
        prop: String,
        val: String,
        ftr: Combinator,
    },
    Prefix {
        prop: String,
        val: Value,
        ftr: Combinator,
    },
    /// Result limit. Never carries a combinator.
    Size { val: u64 },
}

impl Clause {
    pub fn combinator(&self) -> Option<Combinator> {
        match self {
            Self::Term { ftr, .. }
            | Self::Range { ftr, .. }
            | Self::Exist { ftr, .. }
            | Self::Wildcard { ftr, .. }
            | Self::Regexp { ftr, .. }
            | Self::Prefix { ftr, .. } => Some(*ftr),
            Self::Size { .. } => None,
        }
    }

    /// The property path targeted by this clause (`None` for `size`).
    pub fn prop(&self) -> Option<&str> {
        match self {
            Self::Term { prop, .. }
            | Self::Range { prop, .. }
            | Self::Exist { prop, .. }
            | Self::Wildcard { prop, .. }
            | Self::Regexp { prop, .. }
            | Self::Prefix { prop, .. } => Some(prop),
            Self::Size { .. } => None,
        }
    }
}

/// An ordered list of filter clauses, built fluently.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<Clause>,
    pending: Option<Combinator>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    /// Remove all clauses and any pending combinator.
    pub fn clear(&mut self) {
        self.clauses.clear();
        self.pending = None;
    }

    /// The clause list as a JSON array, the form sent in `ftr` payload fields.
    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    pub fn term(mut self, prop: impl Into<String>, val: impl Into<Value>) -> Self {
        let ftr = self.take_combinator();
        self.clauses.push(Clause::Term {
            prop: prop.into(),
            val: val.into(),
            ftr,
        });
        self
    }

    pub fn range(mut self, prop: impl Into<String>, op: RangeOp, val: impl Into<Value>) -> Self {
        let ftr = self.take_combinator();
        self.clauses.push(Clause::Range {
            prop: prop.into(),
            op,
            val: val.into(),
            ftr,
        });
        self
    }

    pub fn exist(mut self, prop: impl Into<String>) -> Self {
        let ftr = self.take_combinator();
        self.clauses.push(Clause::Exist {
            prop: prop.into(),
            ftr,
        });
        self
    }

    pub fn wildcard(mut self, prop: impl Into<String>, val: impl Into<String>) -> Self {
        let ftr = self.take_combinator();
        self.clauses.push(Clause::Wildcard {
            prop: prop.into(),
            val: val.into(),
            ftr,
        });
        self
    }

    pub fn regexp(mut self, prop: impl Into<String>, val: impl Into<String>) -> Self {
        let ftr = self.take_combinator();
        self.clauses.push(Clause::Regexp {
            prop: prop.into(),
            val: val.into(),
            ftr,
        });
        self
    }

    pub fn prefix(mut self, prop: impl Into<String>, val: impl Into<Value>) -> Self {
        let ftr = self.take_combinator();
        self.clauses.push(Clause::Prefix {
            prop: prop.into(),
            val: val.into(),
            ftr,
        });
        self
    }

    /// Cap the number of results. Does not consume a pending `or`/`not`.
    pub fn limit(mut self, val: u64) -> Self {
        self.clauses.push(Clause::Size { val });
        self
    }

    /// Join the next clause with OR.
    pub fn or(mut self) -> Self {
        self.pending = Some(Combinator::Or);
        self
    }

    /// Negate the next clause.
    #[allow(clippy::should_implement_trait)]
    pub fn not(mut self) -> Self {
        self.pending = Some(Combinator::Not);
        self
    }

    fn take_combinator(&mut self) -> Combinator {
        self.pending.take().unwrap_or_default()
    }
}

impl Serialize for Filter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.clauses.serialize(serializer)
    }
}
