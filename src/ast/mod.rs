//! # Datalog AST - Abstract Syntax Tree Types
//!
//! Terms, atoms, body predicates and clauses shared by the view compiler,
//! the SSR index builder, the rewriter and the execution engine.
//!
//! ## Builders
//!
//! For programmatic construction of AST nodes, see the [`builders`] module
//! which provides fluent APIs like `AtomBuilder` and `ClauseBuilder`.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

pub mod builders;

// ============================================================================
// Core AST Types
// ============================================================================

/// Represents a variable or constant in Datalog
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Term {
    Variable(String), // e.g., "x", "y", "z"
    Constant(Value),  // e.g., 42, "Person"
    Placeholder,      // "_": fresh per occurrence
}

impl Term {
    pub fn var(name: &str) -> Self {
        Term::Variable(name.to_string())
    }

    pub fn string(s: &str) -> Self {
        Term::Constant(Value::string(s))
    }

    /// Check if this term is a variable
    pub fn is_variable(&self) -> bool {
        matches!(self, Term::Variable(_))
    }

    /// Check if this term is a constant
    pub fn is_constant(&self) -> bool {
        matches!(self, Term::Constant(_))
    }

    /// Get variable name if this is a variable
    pub fn as_variable(&self) -> Option<&str> {
        if let Term::Variable(name) = self {
            Some(name)
        } else {
            None
        }
    }

    pub fn as_constant(&self) -> Option<&Value> {
        if let Term::Constant(v) = self {
            Some(v)
        } else {
            None
        }
    }

    /// Apply a variable renaming; unmapped variables are kept
    pub fn substitute(&self, map: &HashMap<String, Term>) -> Term {
        match self {
            Term::Variable(name) => map.get(name).cloned().unwrap_or_else(|| self.clone()),
            _ => self.clone(),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Variable(name) => write!(f, "{name}"),
            Term::Constant(v) => write!(f, "{v}"),
            Term::Placeholder => write!(f, "_"),
        }
    }
}

/// Represents an atom like E_g(e, x, y, "Knows")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Atom {
    pub relation: String,
    pub args: Vec<Term>,
}

impl Atom {
    /// Create a new atom
    pub fn new(relation: impl Into<String>, args: Vec<Term>) -> Self {
        Atom {
            relation: relation.into(),
            args,
        }
    }

    /// Get all variables in this atom
    pub fn variables(&self) -> HashSet<String> {
        self.args
            .iter()
            .filter_map(|t| t.as_variable().map(str::to_string))
            .collect()
    }

    /// Variables in argument order, first occurrence only
    pub fn ordered_variables(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.args
            .iter()
            .filter_map(Term::as_variable)
            .filter(|v| seen.insert(*v))
            .map(str::to_string)
            .collect()
    }

    /// Get the arity (number of arguments) of this atom
    pub fn arity(&self) -> usize {
        self.args.len()
    }

    pub fn substitute(&self, map: &HashMap<String, Term>) -> Atom {
        Atom {
            relation: self.relation.clone(),
            args: self.args.iter().map(|t| t.substitute(map)).collect(),
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.relation)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{arg}")?;
        }
        write!(f, ")")
    }
}

/// Comparison operators for interpreted body atoms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOp {
    Equal,          // =
    NotEqual,       // !=
    LessThan,       // <
    LessOrEqual,    // <=
    GreaterThan,    // >
    GreaterOrEqual, // >=
}

impl ComparisonOp {
    pub fn parse(symbol: &str) -> Option<Self> {
        match symbol {
            "=" | "==" => Some(ComparisonOp::Equal),
            "!=" | "<>" => Some(ComparisonOp::NotEqual),
            "<" => Some(ComparisonOp::LessThan),
            "<=" => Some(ComparisonOp::LessOrEqual),
            ">" => Some(ComparisonOp::GreaterThan),
            ">=" => Some(ComparisonOp::GreaterOrEqual),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            ComparisonOp::Equal => "=",
            ComparisonOp::NotEqual => "!=",
            ComparisonOp::LessThan => "<",
            ComparisonOp::LessOrEqual => "<=",
            ComparisonOp::GreaterThan => ">",
            ComparisonOp::GreaterOrEqual => ">=",
        }
    }

    /// Evaluate the operator over two constants.
    ///
    /// Values that cannot be ordered against each other satisfy only `!=`.
    pub fn holds(self, left: &Value, right: &Value) -> bool {
        use std::cmp::Ordering;
        match left.compare(right) {
            None => self == ComparisonOp::NotEqual,
            Some(ord) => match self {
                ComparisonOp::Equal => ord == Ordering::Equal,
                ComparisonOp::NotEqual => ord != Ordering::Equal,
                ComparisonOp::LessThan => ord == Ordering::Less,
                ComparisonOp::LessOrEqual => ord != Ordering::Greater,
                ComparisonOp::GreaterThan => ord == Ordering::Greater,
                ComparisonOp::GreaterOrEqual => ord != Ordering::Less,
            },
        }
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Represents a body predicate (positive atom, negated atom, or comparison)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BodyPredicate {
    Positive(Atom),
    Negated(Atom),
    /// Comparison predicate: left op right (e.g., X = Y, X < 5)
    Comparison(Term, ComparisonOp, Term),
}

impl BodyPredicate {
    /// Get the underlying atom (returns None for Comparison predicates)
    pub fn atom(&self) -> Option<&Atom> {
        match self {
            BodyPredicate::Positive(atom) | BodyPredicate::Negated(atom) => Some(atom),
            BodyPredicate::Comparison(_, _, _) => None,
        }
    }

    /// Check if this is a positive atom
    pub fn is_positive(&self) -> bool {
        matches!(self, BodyPredicate::Positive(_))
    }

    /// Check if this is a negated atom
    pub fn is_negated(&self) -> bool {
        matches!(self, BodyPredicate::Negated(_))
    }

    /// Check if this is a comparison predicate
    pub fn is_comparison(&self) -> bool {
        matches!(self, BodyPredicate::Comparison(_, _, _))
    }

    /// Get all variables in this predicate
    pub fn variables(&self) -> HashSet<String> {
        match self {
            BodyPredicate::Positive(atom) | BodyPredicate::Negated(atom) => atom.variables(),
            BodyPredicate::Comparison(left, _, right) => {
                let mut vars = HashSet::new();
                if let Term::Variable(v) = left {
                    vars.insert(v.clone());
                }
                if let Term::Variable(v) = right {
                    vars.insert(v.clone());
                }
                vars
            }
        }
    }

    pub fn substitute(&self, map: &HashMap<String, Term>) -> BodyPredicate {
        match self {
            BodyPredicate::Positive(atom) => BodyPredicate::Positive(atom.substitute(map)),
            BodyPredicate::Negated(atom) => BodyPredicate::Negated(atom.substitute(map)),
            BodyPredicate::Comparison(l, op, r) => {
                BodyPredicate::Comparison(l.substitute(map), *op, r.substitute(map))
            }
        }
    }
}

impl fmt::Display for BodyPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BodyPredicate::Positive(atom) => write!(f, "{atom}"),
            BodyPredicate::Negated(atom) => write!(f, "!{atom}"),
            BodyPredicate::Comparison(l, op, r) => write!(f, "{l} {op} {r}"),
        }
    }
}

/// A rule or query: one or more head atoms derived from one body
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Clause {
    pub heads: Vec<Atom>,
    pub body: Vec<BodyPredicate>,
}

impl Clause {
    pub fn new(heads: Vec<Atom>, body: Vec<BodyPredicate>) -> Self {
        Clause { heads, body }
    }

    /// Clause with a single head atom
    pub fn rule(head: Atom, body: Vec<BodyPredicate>) -> Self {
        Clause {
            heads: vec![head],
            body,
        }
    }

    /// Create a clause with only positive body atoms
    pub fn simple(head: Atom, body: Vec<Atom>) -> Self {
        Clause::rule(head, body.into_iter().map(BodyPredicate::Positive).collect())
    }

    /// The first head; query clauses have exactly one
    pub fn head(&self) -> &Atom {
        &self.heads[0]
    }

    pub fn head_relations(&self) -> impl Iterator<Item = &str> {
        self.heads.iter().map(|h| h.relation.as_str())
    }

    pub fn defines(&self, relation: &str) -> bool {
        self.heads.iter().any(|h| h.relation == relation)
    }

    /// Get all variables in positive body atoms
    pub fn positive_body_variables(&self) -> HashSet<String> {
        self.body
            .iter()
            .filter(|pred| pred.is_positive())
            .flat_map(BodyPredicate::variables)
            .collect()
    }

    /// Variables bound by positive atoms, closed under `x = c` and `x = y`
    /// where one side is already bound.
    pub fn bound_variables(&self) -> HashSet<String> {
        let mut bound = self.positive_body_variables();
        loop {
            let mut changed = false;
            for pred in &self.body {
                if let BodyPredicate::Comparison(left, ComparisonOp::Equal, right) = pred {
                    for (a, b) in [(left, right), (right, left)] {
                        if let Term::Variable(v) = a {
                            let source_bound = match b {
                                Term::Constant(_) => true,
                                Term::Variable(w) => bound.contains(w),
                                Term::Placeholder => false,
                            };
                            if source_bound && bound.insert(v.clone()) {
                                changed = true;
                            }
                        }
                    }
                }
            }
            if !changed {
                return bound;
            }
        }
    }

    /// Variables violating range restriction, sorted.
    ///
    /// Every head variable, every variable of a negated atom and every variable
    /// of a comparison must be bound by a positive atom or an equality chain.
    pub fn unbound_variables(&self) -> Vec<String> {
        let bound = self.bound_variables();
        let mut unbound: Vec<String> = self
            .heads
            .iter()
            .flat_map(Atom::variables)
            .chain(
                self.body
                    .iter()
                    .filter(|p| !p.is_positive())
                    .flat_map(BodyPredicate::variables),
            )
            .filter(|v| !bound.contains(v))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        unbound.sort();
        unbound
    }

    /// Check if this clause is safe (range-restricted)
    pub fn is_safe(&self) -> bool {
        self.unbound_variables().is_empty() && !self.heads.iter().any(|h| h.args.contains(&Term::Placeholder))
    }

    /// Get all variables in this clause
    pub fn variables(&self) -> HashSet<String> {
        let mut vars: HashSet<String> = self.heads.iter().flat_map(Atom::variables).collect();
        for pred in &self.body {
            vars.extend(pred.variables());
        }
        vars
    }

    /// Variables in order of first appearance, heads first
    pub fn ordered_variables(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut visit = |t: &Term| {
            if let Term::Variable(v) = t {
                if seen.insert(v.clone()) {
                    out.push(v.clone());
                }
            }
        };
        for head in &self.heads {
            head.args.iter().for_each(&mut visit);
        }
        for pred in &self.body {
            match pred {
                BodyPredicate::Positive(a) | BodyPredicate::Negated(a) => {
                    a.args.iter().for_each(&mut visit);
                }
                BodyPredicate::Comparison(l, _, r) => {
                    visit(l);
                    visit(r);
                }
            }
        }
        out
    }

    /// Check if this clause is recursive (a head relation appears in the body)
    pub fn is_recursive(&self) -> bool {
        self.body
            .iter()
            .filter_map(BodyPredicate::atom)
            .any(|a| self.defines(&a.relation))
    }

    /// Get all positive body atoms
    pub fn positive_body_atoms(&self) -> Vec<&Atom> {
        self.body
            .iter()
            .filter_map(|pred| match pred {
                BodyPredicate::Positive(atom) => Some(atom),
                BodyPredicate::Negated(_) | BodyPredicate::Comparison(_, _, _) => None,
            })
            .collect()
    }

    /// Get all negated body atoms
    pub fn negated_body_atoms(&self) -> Vec<&Atom> {
        self.body
            .iter()
            .filter_map(|pred| match pred {
                BodyPredicate::Negated(atom) => Some(atom),
                BodyPredicate::Positive(_) | BodyPredicate::Comparison(_, _, _) => None,
            })
            .collect()
    }

    pub fn substitute(&self, map: &HashMap<String, Term>) -> Clause {
        Clause {
            heads: self.heads.iter().map(|h| h.substitute(map)).collect(),
            body: self.body.iter().map(|p| p.substitute(map)).collect(),
        }
    }

    /// Rename variables to `V0, V1, …` in order of first appearance.
    ///
    /// Two clauses that differ only in variable names normalize to the same value.
    pub fn normalized(&self) -> Clause {
        let map: HashMap<String, Term> = self
            .ordered_variables()
            .into_iter()
            .enumerate()
            .map(|(i, v)| (v, Term::Variable(format!("V{i}"))))
            .collect();
        self.substitute(&map)
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, head) in self.heads.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{head}")?;
        }
        if self.body.is_empty() {
            return write!(f, ".");
        }
        write!(f, " :- ")?;
        for (i, pred) in self.body.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{pred}")?;
        }
        write!(f, ".")
    }
}
