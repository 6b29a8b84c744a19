//! Structural unfolding.
//!
//! Positive atoms over non-recursive IDB relations are replaced by the bodies
//! of their defining clauses, one branch per clause. Negated atoms, recursive
//! relations and Skolem tables stay as references; their definitions are
//! unfolded the same way and copied next to the query. Materialized views are
//! read from the store like base relations.

use super::Substitution;
use crate::ast::{Atom, BodyPredicate, Clause, Term};
use crate::compiler::naming;
use crate::error::CompileError;
use crate::program::Program;
use crate::recursion::build_dependency_graph;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Unfold `query` against `program`.
///
/// `auxiliary` holds clauses compiled with the query (path automata).
/// Relations in `materialized` are treated as stored. The result is a fresh
/// program holding the flattened query clauses plus every definition they
/// still reference.
pub fn unfold(
    query: &Clause,
    auxiliary: &[Clause],
    program: &Program,
    materialized: &HashSet<String>,
) -> Result<Program, CompileError> {
    let mut unfolder = Unfolder::new(program, auxiliary, materialized);
    let answers = unfolder.expand(query.clone());

    let mut out = Program::new();
    for udf in program.udfs() {
        if let Some(predicate) = program.predicate(&udf) {
            out.declare(predicate.clone())?;
        }
    }

    // Definitions still referenced, transitively
    let mut pending: Vec<String> = unfolder.references(&answers);
    let mut copied: HashSet<String> = HashSet::new();
    let mut definitions = Vec::new();
    while let Some(relation) = pending.pop() {
        if !copied.insert(relation.clone()) {
            continue;
        }
        for clause in unfolder.definitions_of(&relation) {
            let expanded = unfolder.expand(clause);
            pending.extend(unfolder.references(&expanded));
            definitions.extend(expanded);
        }
    }

    let branches = answers.len();
    out.add_clauses(answers)?;
    out.add_clauses(definitions)?;
    tracing::debug!(
        query = %query.head(),
        branches,
        clauses = out.clauses().len(),
        "query_unfolded"
    );
    Ok(out)
}

/// Unfolding state over one program
pub struct Unfolder<'a> {
    /// Single-head defining clauses by relation
    definitions: HashMap<String, Vec<Clause>>,
    recursive: HashSet<String>,
    materialized: &'a HashSet<String>,
    counter: usize,
}

impl<'a> Unfolder<'a> {
    pub fn new(program: &Program, auxiliary: &[Clause], materialized: &'a HashSet<String>) -> Self {
        let mut definitions: HashMap<String, Vec<Clause>> = HashMap::new();
        for clause in program.clauses().iter().chain(auxiliary) {
            for head in &clause.heads {
                definitions
                    .entry(head.relation.clone())
                    .or_default()
                    .push(Clause::rule(head.clone(), clause.body.clone()));
            }
        }
        let recursive = build_dependency_graph(program.clauses().iter().chain(auxiliary)).recursive_relations();
        Unfolder {
            definitions,
            recursive,
            materialized,
            counter: 0,
        }
    }

    fn is_stored(&self, relation: &str) -> bool {
        self.materialized.contains(relation) || !self.definitions.contains_key(relation)
    }

    fn inlinable(&self, relation: &str) -> bool {
        !self.is_stored(relation) && !self.recursive.contains(relation)
    }

    fn definitions_of(&self, relation: &str) -> Vec<Clause> {
        if self.materialized.contains(relation) {
            return Vec::new();
        }
        self.definitions.get(relation).cloned().unwrap_or_default()
    }

    /// Relations referenced by `clauses` whose definitions must travel along
    fn references(&self, clauses: &[Clause]) -> Vec<String> {
        let mut out = BTreeSet::new();
        for clause in clauses {
            for atom in clause.body.iter().filter_map(BodyPredicate::atom) {
                let relation = atom.relation.as_str();
                if let Some(source) = naming::skolem_source(relation) {
                    out.insert(source);
                } else if !self.is_stored(relation) {
                    out.insert(relation.to_string());
                }
            }
        }
        out.into_iter().collect()
    }

    /// Inline positive IDB atoms until none is left
    pub fn expand(&mut self, clause: Clause) -> Vec<Clause> {
        let position = clause.body.iter().position(|p| {
            p.is_positive() && p.atom().is_some_and(|a| self.inlinable(&a.relation))
        });
        let Some(position) = position else {
            return vec![clause];
        };
        let atom = match &clause.body[position] {
            BodyPredicate::Positive(atom) => atom.clone(),
            _ => return vec![clause],
        };

        let mut out = Vec::new();
        for definition in self.definitions_of(&atom.relation) {
            match self.inline(&clause, position, &atom, &definition) {
                Some(branch) => out.extend(self.expand(branch)),
                None => tracing::trace!(atom = %atom, definition = %definition, "branch_pruned"),
            }
        }
        out
    }

    /// Replace the atom at `position` by one definition's body; `None` if the head does not unify
    fn inline(&mut self, clause: &Clause, position: usize, atom: &Atom, definition: &Clause) -> Option<Clause> {
        self.counter += 1;
        let suffix = self.counter;
        let renaming: HashMap<String, Term> = definition
            .variables()
            .into_iter()
            .map(|v| {
                let renamed = format!("{v}__u{suffix}");
                (v, Term::Variable(renamed))
            })
            .collect();
        let definition = definition.substitute(&renaming);

        let mut substitution = Substitution::new();
        let mut equalities = Vec::new();
        let mut fresh_count = 0;
        let mut fresh = || {
            fresh_count += 1;
            format!("__w{suffix}_{fresh_count}")
        };
        for (head_term, arg) in definition.head().args.iter().zip(&atom.args) {
            substitution
                .unify(head_term, arg, &mut fresh, &mut equalities)
                .ok()?;
        }

        let inlined: Vec<BodyPredicate> = definition
            .body
            .iter()
            .map(|p| p.substitute(substitution.as_map()))
            .collect();

        let mut body = Vec::with_capacity(clause.body.len() + inlined.len() + equalities.len());
        body.extend(clause.body[..position].iter().cloned());
        body.extend(inlined);
        body.extend(clause.body[position + 1..].iter().cloned());
        body.extend(equalities);
        Some(Clause::new(clause.heads.clone(), body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders::{AtomBuilder, ClauseBuilder};

    fn program() -> Program {
        let mut program = Program::new();
        program
            .add_clauses([
                Clause::simple(
                    AtomBuilder::new("N_v").var("x").string("Person").build(),
                    vec![AtomBuilder::new("N_g").var("x").string("Person").build()],
                ),
                Clause::simple(
                    AtomBuilder::new("N_v").var("x").string("Company").build(),
                    vec![AtomBuilder::new("N_g").var("x").string("Org").build()],
                ),
            ])
            .unwrap();
        program
    }

    #[test]
    fn test_unfold_selects_matching_branch() {
        let query = Clause::simple(
            AtomBuilder::new("ANSWER").var("a").build(),
            vec![AtomBuilder::new("N_v").var("a").string("Person").build()],
        );
        let out = unfold(&query, &[], &program(), &HashSet::new()).unwrap();
        let answers: Vec<String> = out.clauses_for("ANSWER").iter().map(|c| c.to_string()).collect();
        assert_eq!(answers, vec!["ANSWER(a) :- N_g(a, \"Person\")."]);
    }

    #[test]
    fn test_unfold_variable_label_keeps_both_branches() {
        let query = Clause::simple(
            AtomBuilder::new("ANSWER").vars(["a", "l"]).build(),
            vec![AtomBuilder::new("N_v").vars(["a", "l"]).build()],
        );
        let out = unfold(&query, &[], &program(), &HashSet::new()).unwrap();
        assert_eq!(out.clauses_for("ANSWER").len(), 2);
        assert!(out.clauses().iter().all(|c| c.is_safe()));
    }

    #[test]
    fn test_materialized_view_is_not_inlined() {
        let query = Clause::simple(
            AtomBuilder::new("ANSWER").var("a").build(),
            vec![AtomBuilder::new("N_v").var("a").string("Person").build()],
        );
        let materialized: HashSet<String> = ["N_v".to_string()].into_iter().collect();
        let out = unfold(&query, &[], &program(), &materialized).unwrap();
        assert_eq!(out.clauses().len(), 1);
        assert_eq!(out.clauses()[0].to_string(), "ANSWER(a) :- N_v(a, \"Person\").");
    }

    #[test]
    fn test_recursive_and_negated_definitions_are_copied() {
        let mut program = Program::new();
        program
            .add_clauses([
                ClauseBuilder::new("tc").head_vars(["x", "y"]).body_atom("edge", ["x", "y"]).build(),
                ClauseBuilder::new("tc")
                    .head_vars(["x", "z"])
                    .body_atom("tc", ["x", "y"])
                    .body_atom("edge", ["y", "z"])
                    .build(),
                ClauseBuilder::new("blocked").head_vars(["x"]).body_atom("bad", ["x"]).build(),
            ])
            .unwrap();
        let query = ClauseBuilder::new("ANSWER")
            .head_vars(["a", "b"])
            .body_atom("tc", ["a", "b"])
            .negated(AtomBuilder::new("blocked").var("a").build())
            .build();
        let out = unfold(&query, &[], &program, &HashSet::new()).unwrap();
        assert_eq!(out.clauses_for("ANSWER").len(), 1);
        assert_eq!(out.clauses_for("tc").len(), 2);
        assert_eq!(out.clauses_for("blocked").len(), 1);
    }

    #[test]
    fn test_shared_head_variable_becomes_equality() {
        let mut program = Program::new();
        program
            .add_clause(ClauseBuilder::new("same").head_vars(["x", "x"]).body_atom("n", ["x"]).build())
            .unwrap();
        let query = ClauseBuilder::new("ANSWER").head_vars(["a", "b"]).body_atom("same", ["a", "b"]).build();
        let out = unfold(&query, &[], &program, &HashSet::new()).unwrap();
        let answer = out.clauses_for("ANSWER")[0].to_string();
        assert!(answer.contains("b = a"), "{answer}");
        assert!(out.clauses()[0].is_safe());
    }
}
