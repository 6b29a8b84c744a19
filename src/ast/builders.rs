//! Builder Patterns for AST Construction
//!
//! Provides fluent APIs for constructing AST nodes, particularly useful for tests
//! and for the compiler's generated rules.
//!
//! ## Example
//!
//! ```rust
//! use pgview::ast::builders::{AtomBuilder, ClauseBuilder};
//!
//! // Build an atom: N_g(x, "Person")
//! let atom = AtomBuilder::new("N_g").var("x").string("Person").build();
//! assert_eq!(atom.to_string(), "N_g(x, \"Person\")");
//!
//! // Build a rule: REC_1_S0(x, z) :- REC_1_S0(x, y), E_g(_, y, z, "Knows").
//! let step = ClauseBuilder::new("REC_1_S0")
//!     .head_vars(["x", "z"])
//!     .body_atom("REC_1_S0", ["x", "y"])
//!     .body(AtomBuilder::new("E_g").any().var("y").var("z").string("Knows").build())
//!     .build();
//! assert!(step.is_recursive());
//! ```

use super::{Atom, BodyPredicate, Clause, ComparisonOp, Term};
use crate::value::Value;

/// Builder for constructing Atom instances
#[derive(Debug, Clone)]
pub struct AtomBuilder {
    relation: String,
    args: Vec<Term>,
}

impl AtomBuilder {
    pub fn new(relation: impl Into<String>) -> Self {
        AtomBuilder {
            relation: relation.into(),
            args: Vec::new(),
        }
    }

    /// Add a variable argument
    pub fn var(mut self, name: &str) -> Self {
        self.args.push(Term::var(name));
        self
    }

    /// Add several variable arguments
    pub fn vars<'a>(mut self, names: impl IntoIterator<Item = &'a str>) -> Self {
        self.args.extend(names.into_iter().map(Term::var));
        self
    }

    /// Add a string constant argument
    pub fn string(mut self, s: &str) -> Self {
        self.args.push(Term::string(s));
        self
    }

    pub fn long(mut self, v: i64) -> Self {
        self.args.push(Term::Constant(Value::Long(v)));
        self
    }

    /// Add a placeholder argument
    pub fn any(mut self) -> Self {
        self.args.push(Term::Placeholder);
        self
    }

    pub fn term(mut self, term: Term) -> Self {
        self.args.push(term);
        self
    }

    pub fn build(self) -> Atom {
        Atom::new(self.relation, self.args)
    }
}

/// Builder for constructing single-head Clause instances
#[derive(Debug, Clone)]
pub struct ClauseBuilder {
    head: AtomBuilder,
    body: Vec<BodyPredicate>,
}

impl ClauseBuilder {
    pub fn new(head_relation: impl Into<String>) -> Self {
        ClauseBuilder {
            head: AtomBuilder::new(head_relation),
            body: Vec::new(),
        }
    }

    pub fn head_vars<'a>(mut self, names: impl IntoIterator<Item = &'a str>) -> Self {
        self.head = self.head.vars(names);
        self
    }

    pub fn head_term(mut self, term: Term) -> Self {
        self.head = self.head.term(term);
        self
    }

    /// Add a positive body atom whose arguments are all variables
    pub fn body_atom<'a>(mut self, relation: &str, vars: impl IntoIterator<Item = &'a str>) -> Self {
        let atom = AtomBuilder::new(relation).vars(vars).build();
        self.body.push(BodyPredicate::Positive(atom));
        self
    }

    pub fn body(mut self, atom: Atom) -> Self {
        self.body.push(BodyPredicate::Positive(atom));
        self
    }

    pub fn negated(mut self, atom: Atom) -> Self {
        self.body.push(BodyPredicate::Negated(atom));
        self
    }

    pub fn compare(mut self, left: Term, op: ComparisonOp, right: Term) -> Self {
        self.body.push(BodyPredicate::Comparison(left, op, right));
        self
    }

    pub fn build(self) -> Clause {
        Clause::rule(self.head.build(), self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clause_builder() {
        let clause = ClauseBuilder::new("N_v")
            .head_vars(["x", "l"])
            .body_atom("N_g", ["x", "l"])
            .negated(AtomBuilder::new("N_DEL_v").var("x").build())
            .build();
        assert_eq!(clause.to_string(), "N_v(x, l) :- N_g(x, l), !N_DEL_v(x).");
        assert!(clause.is_safe());
    }
}
