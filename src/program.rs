//! # Datalog Program Model
//!
//! A [`Program`] owns the predicates and clauses of one workspace. Clauses are
//! kept in creation order because generated auxiliary predicates (match
//! relations, path automata, Skolem tables) are declared before the rules that
//! consume them. Clauses that differ only in variable names are stored once.
//!
//! Predicate kinds are derived from use: a predicate that heads a clause is an
//! IDB, a predicate declared as a function is a UDF, everything else is EDB.

use crate::ast::{Atom, BodyPredicate, Clause, Term};
use crate::error::CompileError;
use crate::value::DataType;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// How a predicate's extension is obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PredicateKind {
    /// Stored base facts
    Edb,
    /// Derived by clauses
    Idb,
    /// Deterministic function table (Skolem constructors)
    Udf,
}

/// Predicate signature plus executor hints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Predicate {
    pub name: String,
    pub arity: usize,
    /// Declared column types; empty when the predicate was never declared with types
    pub column_types: Vec<DataType>,
    pub kind: PredicateKind,
    /// Column position lists the executor may index
    pub index_hints: BTreeSet<Vec<usize>>,
}

impl Predicate {
    pub fn new(name: impl Into<String>, arity: usize, kind: PredicateKind) -> Self {
        Predicate {
            name: name.into(),
            arity,
            column_types: Vec::new(),
            kind,
            index_hints: BTreeSet::new(),
        }
    }

    /// A typed EDB predicate
    pub fn edb(name: impl Into<String>, column_types: Vec<DataType>) -> Self {
        Predicate {
            name: name.into(),
            arity: column_types.len(),
            column_types,
            kind: PredicateKind::Edb,
            index_hints: BTreeSet::new(),
        }
    }

    pub fn udf(name: impl Into<String>, arity: usize) -> Self {
        Predicate::new(name, arity, PredicateKind::Udf)
    }
}

/// Predicates and clauses of one workspace
#[derive(Debug, Clone, Default)]
pub struct Program {
    predicates: BTreeMap<String, Predicate>,
    clauses: Vec<Clause>,
    normalized: HashSet<Clause>,
}

impl Program {
    /// Create a new empty program
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a predicate, or check a redeclaration against the existing arity.
    ///
    /// Redeclaring fills in column types and upgrades the kind to UDF if asked;
    /// IDB status is never downgraded since it comes from clause heads.
    pub fn declare(&mut self, predicate: Predicate) -> Result<(), CompileError> {
        match self.predicates.get_mut(&predicate.name) {
            Some(existing) => {
                if existing.arity != predicate.arity {
                    return Err(CompileError::ArityMismatch {
                        predicate: predicate.name,
                        expected: existing.arity,
                        found: predicate.arity,
                    });
                }
                if existing.column_types.is_empty() {
                    existing.column_types = predicate.column_types;
                }
                if predicate.kind == PredicateKind::Udf {
                    existing.kind = PredicateKind::Udf;
                }
                existing.index_hints.extend(predicate.index_hints);
            }
            None => {
                self.predicates.insert(predicate.name.clone(), predicate);
            }
        }
        Ok(())
    }

    pub fn predicate(&self, name: &str) -> Option<&Predicate> {
        self.predicates.get(name)
    }

    pub fn predicates(&self) -> impl Iterator<Item = &Predicate> {
        self.predicates.values()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.predicates.contains_key(name)
    }

    /// Add an index hint for a declared predicate
    pub fn add_index_hint(&mut self, name: &str, columns: Vec<usize>) -> Result<(), CompileError> {
        let predicate = self
            .predicates
            .get_mut(name)
            .ok_or_else(|| CompileError::UnknownPredicate(name.to_string()))?;
        if let Some(&bad) = columns.iter().find(|&&c| c >= predicate.arity) {
            return Err(CompileError::ArityMismatch {
                predicate: name.to_string(),
                expected: predicate.arity,
                found: bad + 1,
            });
        }
        predicate.index_hints.insert(columns);
        Ok(())
    }

    /// Validate and append a clause.
    ///
    /// Returns `Ok(false)` when an equivalent clause is already present.
    pub fn add_clause(&mut self, clause: Clause) -> Result<bool, CompileError> {
        validate_clause(&clause)?;
        self.check_arities(&clause)?;

        let normalized = clause.normalized();
        if self.normalized.contains(&normalized) {
            return Ok(false);
        }

        for head in &clause.heads {
            match self.predicates.get_mut(&head.relation) {
                Some(p) => {
                    if p.kind == PredicateKind::Edb {
                        p.kind = PredicateKind::Idb;
                    }
                }
                None => {
                    self.predicates.insert(
                        head.relation.clone(),
                        Predicate::new(&head.relation, head.arity(), PredicateKind::Idb),
                    );
                }
            }
        }
        for atom in clause.body.iter().filter_map(BodyPredicate::atom) {
            self.predicates
                .entry(atom.relation.clone())
                .or_insert_with(|| Predicate::new(&atom.relation, atom.arity(), PredicateKind::Edb));
        }

        self.normalized.insert(normalized);
        self.clauses.push(clause);
        Ok(true)
    }

    /// Add several clauses, stopping at the first invalid one
    pub fn add_clauses(&mut self, clauses: impl IntoIterator<Item = Clause>) -> Result<usize, CompileError> {
        let mut added = 0;
        for clause in clauses {
            if self.add_clause(clause)? {
                added += 1;
            }
        }
        Ok(added)
    }

    fn check_arities(&self, clause: &Clause) -> Result<(), CompileError> {
        let atoms = clause
            .heads
            .iter()
            .chain(clause.body.iter().filter_map(BodyPredicate::atom));
        for atom in atoms {
            if let Some(p) = self.predicates.get(&atom.relation) {
                if p.arity != atom.arity() {
                    return Err(CompileError::ArityMismatch {
                        predicate: atom.relation.clone(),
                        expected: p.arity,
                        found: atom.arity(),
                    });
                }
            }
        }
        Ok(())
    }

    /// All clauses in creation order
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Clauses with a head on `relation`, in creation order
    pub fn clauses_for(&self, relation: &str) -> Vec<&Clause> {
        self.clauses.iter().filter(|c| c.defines(relation)).collect()
    }

    /// Returns all IDB relations (those that appear as heads of clauses)
    pub fn idbs(&self) -> BTreeSet<String> {
        self.clauses
            .iter()
            .flat_map(|c| c.head_relations().map(str::to_string))
            .filter(|name| !self.is_udf(name))
            .collect()
    }

    /// Returns all EDB relations (declared or used, never derived)
    pub fn edbs(&self) -> BTreeSet<String> {
        self.predicates
            .values()
            .filter(|p| p.kind == PredicateKind::Edb)
            .map(|p| p.name.clone())
            .collect()
    }

    pub fn udfs(&self) -> BTreeSet<String> {
        self.predicates
            .values()
            .filter(|p| p.kind == PredicateKind::Udf)
            .map(|p| p.name.clone())
            .collect()
    }

    pub fn is_idb(&self, name: &str) -> bool {
        self.predicates.get(name).is_some_and(|p| p.kind == PredicateKind::Idb)
    }

    pub fn is_udf(&self, name: &str) -> bool {
        self.predicates.get(name).is_some_and(|p| p.kind == PredicateKind::Udf)
    }

    /// Remove the given predicates and every clause that derives one of them
    pub fn remove_relations(&mut self, names: &HashSet<String>) -> usize {
        let before = self.clauses.len();
        self.clauses.retain(|c| !c.head_relations().any(|h| names.contains(h)));
        self.normalized = self.clauses.iter().map(Clause::normalized).collect();
        for name in names {
            self.predicates.remove(name);
        }
        // Body-only predicates that nothing references any more are dropped too.
        let referenced: HashSet<&str> = self
            .clauses
            .iter()
            .flat_map(|c| {
                c.head_relations()
                    .chain(c.body.iter().filter_map(BodyPredicate::atom).map(|a| a.relation.as_str()))
            })
            .collect();
        self.predicates.retain(|name, p| {
            p.kind != PredicateKind::Edb || !p.column_types.is_empty() || referenced.contains(name.as_str())
        });
        before - self.clauses.len()
    }

    /// Relations referenced in the bodies of clauses that derive something outside `owned`
    pub fn external_references(&self, owned: &HashSet<String>) -> BTreeSet<String> {
        self.clauses
            .iter()
            .filter(|c| !c.head_relations().any(|h| owned.contains(h)))
            .flat_map(|c| c.body.iter().filter_map(BodyPredicate::atom))
            .map(|a| a.relation.clone())
            .filter(|r| owned.contains(r))
            .collect()
    }
}

/// Reject clauses that are not range-restricted or have malformed heads
pub fn validate_clause(clause: &Clause) -> Result<(), CompileError> {
    if clause.heads.is_empty() {
        return Err(CompileError::UnknownPredicate("<empty head>".to_string()));
    }
    if clause
        .heads
        .iter()
        .any(|h: &Atom| h.args.contains(&Term::Placeholder))
    {
        return Err(CompileError::PlaceholderInHead(clause.to_string()));
    }
    let unbound = clause.unbound_variables();
    if !unbound.is_empty() {
        return Err(CompileError::UnboundVariable {
            clause: clause.to_string(),
            variables: unbound,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders::{AtomBuilder, ClauseBuilder};

    #[test]
    fn test_kinds_are_derived_from_heads() {
        let mut program = Program::new();
        program
            .declare(Predicate::edb("N_g", vec![DataType::Long, DataType::String]))
            .unwrap();
        program
            .add_clause(ClauseBuilder::new("N_v").head_vars(["x", "l"]).body_atom("N_g", ["x", "l"]).build())
            .unwrap();

        assert!(program.is_idb("N_v"));
        assert!(program.edbs().contains("N_g"));
        assert!(!program.idbs().contains("N_g"));
    }

    #[test]
    fn test_duplicate_clause_ignored() {
        let mut program = Program::new();
        let a = ClauseBuilder::new("p").head_vars(["x"]).body_atom("q", ["x"]).build();
        let b = ClauseBuilder::new("p").head_vars(["y"]).body_atom("q", ["y"]).build();
        assert!(program.add_clause(a).unwrap());
        assert!(!program.add_clause(b).unwrap());
        assert_eq!(program.clauses().len(), 1);
    }

    #[test]
    fn test_range_restriction_rejected() {
        let mut program = Program::new();
        let clause = ClauseBuilder::new("p").head_vars(["x", "z"]).body_atom("q", ["x"]).build();
        let err = program.add_clause(clause).unwrap_err();
        assert!(matches!(err, CompileError::UnboundVariable { .. }));
        assert!(program.clauses().is_empty());
    }

    #[test]
    fn test_arity_mismatch_rejected() {
        let mut program = Program::new();
        program
            .add_clause(ClauseBuilder::new("p").head_vars(["x"]).body_atom("q", ["x"]).build())
            .unwrap();
        let bad = ClauseBuilder::new("r").head_vars(["x"]).body_atom("q", ["x", "y"]).build();
        assert!(matches!(program.add_clause(bad), Err(CompileError::ArityMismatch { .. })));
    }

    #[test]
    fn test_udf_stays_udf() {
        let mut program = Program::new();
        program.declare(Predicate::udf("GENNEWID_MAP_v_f", 2)).unwrap();
        program
            .add_clause(
                ClauseBuilder::new("GENNEWID_v")
                    .head_vars(["id"])
                    .body(AtomBuilder::new("GENNEWID_MAP_v_f").any().var("id").build())
                    .build(),
            )
            .unwrap();
        assert!(program.udfs().contains("GENNEWID_MAP_v_f"));
        assert!(program.idbs().contains("GENNEWID_v"));
    }

    #[test]
    fn test_remove_relations_cascades_clauses() {
        let mut program = Program::new();
        program
            .add_clause(ClauseBuilder::new("p").head_vars(["x"]).body_atom("q", ["x"]).build())
            .unwrap();
        program
            .add_clause(ClauseBuilder::new("r").head_vars(["x"]).body_atom("p", ["x"]).build())
            .unwrap();

        let owned: HashSet<String> = ["p".to_string()].into();
        assert_eq!(
            program.external_references(&owned).into_iter().collect::<Vec<_>>(),
            vec!["p".to_string()]
        );
        assert_eq!(program.remove_relations(&owned), 1);
        assert!(program.clauses_for("p").is_empty());
        assert_eq!(program.clauses_for("r").len(), 1);
    }

    #[test]
    fn test_index_hint_checks_columns() {
        let mut program = Program::new();
        program
            .declare(Predicate::edb("E_g", vec![DataType::Long; 3]))
            .unwrap();
        assert!(program.add_index_hint("E_g", vec![1]).is_ok());
        assert!(program.add_index_hint("E_g", vec![3]).is_err());
        assert!(program.add_index_hint("missing", vec![0]).is_err());
    }
}
