//! # In-Memory Execution Engine
//!
//! Reference evaluator for clauses and programs over in-memory relations.
//!
//! ## Clause evaluation
//!
//! Body predicates run in this order:
//! 1. positive atoms over stored or derived relations (hash join, equality
//!    pushdown on shared variables and constants)
//! 2. equality assignments `x = c` / `x = y` binding an unbound side
//! 3. Skolem function tables
//! 4. remaining comparisons as filters
//! 5. negated atoms as anti-semi-joins (`_` is a wildcard)
//!
//! then bindings are projected onto each head, deduplicated.
//!
//! ## Program evaluation
//!
//! Clauses are stratified (negation and Skolem tables force strictly lower
//! strata) and each stratum runs semi-naive to a fixpoint, bounded by
//! `max_fixpoint_iterations`. Before a stratum runs, every Skolem table it
//! reads is filled from its argument relation through the [`SkolemTable`].
//!
//! A relation nobody stored or derived is empty.

pub mod skolem;

use crate::ast::{Atom, BodyPredicate, Clause, ComparisonOp, Term};
use crate::compiler::naming;
use crate::config::EngineConfig;
use crate::error::ExecutionError;
use crate::program::validate_clause;
use crate::recursion::{build_dependency_graph, stratify};
use crate::value::{Relation, Tuple, Value};
use std::collections::{HashMap, HashSet};

pub use skolem::{SkolemEntry, SkolemTable};

static EMPTY: Relation = Relation::new();

/// Stored relations by name
#[derive(Debug, Clone, Default)]
pub struct Database {
    relations: HashMap<String, Relation>,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one tuple; returns false if it was already present
    pub fn insert(&mut self, relation: &str, tuple: Tuple) -> bool {
        self.relations.entry(relation.to_string()).or_default().insert(tuple)
    }

    pub fn insert_all(&mut self, relation: &str, tuples: impl IntoIterator<Item = Tuple>) {
        self.relations.entry(relation.to_string()).or_default().extend(tuples);
    }

    /// Replace a relation's contents
    pub fn set(&mut self, relation: &str, tuples: Relation) {
        self.relations.insert(relation.to_string(), tuples);
    }

    /// A relation's tuples; missing relations are empty
    pub fn get(&self, relation: &str) -> &Relation {
        self.relations.get(relation).unwrap_or(&EMPTY)
    }

    pub fn contains(&self, relation: &str) -> bool {
        self.relations.contains_key(relation)
    }

    pub fn remove(&mut self, relation: &str) -> Option<Relation> {
        self.relations.remove(relation)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.relations.keys().map(String::as_str)
    }
}

fn resolve<'r>(vars: &[String], row: &'r [Value], term: &'r Term) -> Option<&'r Value> {
    match term {
        Term::Constant(c) => Some(c),
        Term::Variable(v) => vars.iter().position(|n| n == v).map(|i| &row[i]),
        Term::Placeholder => None,
    }
}

/// Variable bindings: one column per variable, one row per solution
#[derive(Debug, Clone)]
struct Bindings {
    vars: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Bindings {
    /// The single empty solution
    fn unit() -> Self {
        Bindings {
            vars: Vec::new(),
            rows: vec![Vec::new()],
        }
    }

    fn position(&self, var: &str) -> Option<usize> {
        self.vars.iter().position(|v| v == var)
    }


    /// Hash join with one atom's relation
    fn join(self, atom: &Atom, relation: &Relation) -> Bindings {
        let mut key_cols: Vec<(usize, usize)> = Vec::new();
        let mut consts: Vec<(usize, &Value)> = Vec::new();
        let mut new_vars: Vec<(String, usize)> = Vec::new();
        let mut repeats: Vec<(usize, usize)> = Vec::new();

        for (pos, term) in atom.args.iter().enumerate() {
            match term {
                Term::Constant(c) => consts.push((pos, c)),
                Term::Placeholder => {}
                Term::Variable(v) => {
                    if let Some(col) = self.position(v) {
                        key_cols.push((pos, col));
                    } else if let Some((_, first)) = new_vars.iter().find(|(n, _)| n == v) {
                        repeats.push((pos, *first));
                    } else {
                        new_vars.push((v.clone(), pos));
                    }
                }
            }
        }

        let mut index: HashMap<Vec<Value>, Vec<&Tuple>> = HashMap::new();
        for tuple in relation {
            let values = tuple.values();
            if values.len() != atom.arity() {
                continue;
            }
            if !consts.iter().all(|(p, c)| ComparisonOp::Equal.holds(&values[*p], c)) {
                continue;
            }
            if !repeats.iter().all(|(p, first)| values[*p] == values[*first]) {
                continue;
            }
            let key = key_cols.iter().map(|(p, _)| values[*p].clone()).collect();
            index.entry(key).or_default().push(tuple);
        }

        let mut rows = Vec::new();
        for row in self.rows {
            let key: Vec<Value> = key_cols.iter().map(|(_, c)| row[*c].clone()).collect();
            if let Some(matches) = index.get(&key) {
                for tuple in matches {
                    let mut extended = row.clone();
                    extended.extend(new_vars.iter().map(|(_, p)| tuple.values()[*p].clone()));
                    rows.push(extended);
                }
            }
        }

        let mut vars = self.vars;
        vars.extend(new_vars.into_iter().map(|(v, _)| v));
        Bindings { vars, rows }
    }

    /// Keep rows with no matching tuple in `relation`
    fn anti_join(mut self, atom: &Atom, relation: &Relation) -> Bindings {
        let positions: Vec<usize> = atom
            .args
            .iter()
            .enumerate()
            .filter(|(_, t)| !matches!(t, Term::Placeholder))
            .map(|(i, _)| i)
            .collect();
        let present: HashSet<Tuple> = relation
            .iter()
            .filter(|t| t.arity() == atom.arity())
            .map(|t| t.project(&positions))
            .collect();

        let vars = &self.vars;
        self.rows.retain(|row| {
            let key: Vec<Value> = positions
                .iter()
                .filter_map(|&p| resolve(vars, row, &atom.args[p]).cloned())
                .collect();
            !present.contains(&Tuple::new(key))
        });
        self
    }

    /// `x = c` or `x = y` with exactly one side bound: extend rows with the value
    fn assign(mut self, var: &str, source: &Term) -> Bindings {
        let source_col = match source {
            Term::Variable(s) => self.position(s),
            _ => None,
        };
        for row in &mut self.rows {
            let value = match (source, source_col) {
                (Term::Constant(c), _) => c.clone(),
                (_, Some(col)) => row[col].clone(),
                _ => continue,
            };
            row.push(value);
        }
        self.vars.push(var.to_string());
        self
    }

    fn filter(mut self, left: &Term, op: ComparisonOp, right: &Term) -> Bindings {
        let vars = &self.vars;
        self.rows
            .retain(|row| match (resolve(vars, row, left), resolve(vars, row, right)) {
                (Some(l), Some(r)) => op.holds(l, r),
                _ => false,
            });
        self
    }

    fn project(&self, head: &Atom) -> Relation {
        self.rows
            .iter()
            .filter_map(|row| {
                head.args
                    .iter()
                    .map(|t| resolve(&self.vars, row, t).cloned())
                    .collect::<Option<Vec<Value>>>()
                    .map(Tuple::new)
            })
            .collect()
    }
}

/// Relation lookup for one evaluation: derived relations shadow stored ones
struct Scope<'a> {
    edb: &'a Database,
    derived: HashMap<String, Relation>,
    /// Relations clauses of this evaluation define; they never read `edb`
    defined: HashSet<String>,
}

impl Scope<'_> {
    fn get(&self, relation: &str) -> &Relation {
        match self.derived.get(relation) {
            Some(r) => r,
            None if self.defined.contains(relation) => &EMPTY,
            None => self.edb.get(relation),
        }
    }
}

/// Reference evaluator
#[derive(Debug, Clone)]
pub struct Engine {
    max_iterations: usize,
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new(&EngineConfig::default())
    }
}

impl Engine {
    pub fn new(config: &EngineConfig) -> Self {
        Engine {
            max_iterations: config.max_fixpoint_iterations,
        }
    }

    pub fn with_max_iterations(max_iterations: usize) -> Self {
        Engine { max_iterations }
    }

    /// Evaluate one clause against stored relations; returns the first head's relation
    pub fn evaluate_clause(&self, clause: &Clause, db: &Database) -> Result<Relation, ExecutionError> {
        check_clause(clause)?;
        let scope = Scope {
            edb: db,
            derived: HashMap::new(),
            defined: HashSet::new(),
        };
        let bindings = evaluate_body(&clause.body, &scope, None);
        Ok(bindings.project(clause.head()))
    }

    /// Evaluate a set of clauses to a fixpoint over `db`.
    ///
    /// Returns every relation the clauses define, plus the Skolem tables they read.
    pub fn evaluate_program(
        &self,
        clauses: &[Clause],
        db: &Database,
        skolems: &mut SkolemTable,
    ) -> Result<HashMap<String, Relation>, ExecutionError> {
        // One head per clause from here on
        let split: Vec<Clause> = clauses
            .iter()
            .flat_map(|c| {
                c.heads
                    .iter()
                    .map(move |h| Clause::rule(h.clone(), c.body.clone()))
            })
            .collect();
        for clause in &split {
            check_clause(clause)?;
        }

        let strata = stratify(&split)
            .try_into_strata()
            .map_err(|(relation, reason)| ExecutionError::NotStratifiable(format!("{relation}: {reason}")))?;

        let mut scope = Scope {
            edb: db,
            derived: HashMap::new(),
            defined: split.iter().map(|c| c.head().relation.clone()).collect(),
        };

        for stratum in strata {
            let rules: Vec<&Clause> = stratum.iter().map(|&i| &split[i]).collect();
            self.fill_skolem_tables(&rules, &mut scope, skolems);
            self.evaluate_stratum(&rules, &mut scope)?;
        }

        Ok(scope.derived)
    }

    /// Evaluate only the clauses `answer` depends on and return its relation
    pub fn query(
        &self,
        clauses: &[Clause],
        answer: &str,
        db: &Database,
        skolems: &mut SkolemTable,
    ) -> Result<Relation, ExecutionError> {
        let relevant = relevant_clauses(clauses, [answer]);
        let mut derived = self.evaluate_program(&relevant, db, skolems)?;
        Ok(derived
            .remove(answer)
            .unwrap_or_else(|| db.get(answer).clone()))
    }

    fn fill_skolem_tables(&self, rules: &[&Clause], scope: &mut Scope<'_>, skolems: &mut SkolemTable) {
        let tables: HashSet<&str> = rules
            .iter()
            .flat_map(|c| c.body.iter().filter_map(BodyPredicate::atom))
            .map(|a| a.relation.as_str())
            .filter(|r| naming::is_skolem_table(r))
            .collect();
        for table in tables {
            if let Some(source) = naming::skolem_source(table) {
                let filled = skolems.fill(table, scope.get(&source));
                tracing::trace!(table, tuples = filled.len(), "skolem_table_filled");
                scope.derived.insert(table.to_string(), filled);
            }
        }
    }

    /// Semi-naive evaluation of one stratum
    fn evaluate_stratum(&self, rules: &[&Clause], scope: &mut Scope<'_>) -> Result<(), ExecutionError> {
        let heads: HashSet<&str> = rules.iter().map(|c| c.head().relation.as_str()).collect();
        for head in &heads {
            scope.derived.entry((*head).to_string()).or_default();
        }

        // Initial round over full relations
        let mut delta: HashMap<String, Relation> = HashMap::new();
        for clause in rules {
            let produced = evaluate_body(&clause.body, scope, None).project(clause.head());
            collect_new(&mut delta, scope, &clause.head().relation, produced);
        }
        merge_delta(scope, &delta);

        let recursive = rules.iter().any(|c| {
            c.body
                .iter()
                .any(|p| p.is_positive() && p.atom().is_some_and(|a| heads.contains(a.relation.as_str())))
        });
        if !recursive {
            return Ok(());
        }

        let mut iteration = 0;
        while delta.values().any(|d| !d.is_empty()) {
            iteration += 1;
            if iteration > self.max_iterations {
                let mut relations: Vec<String> = heads.iter().map(|h| (*h).to_string()).collect();
                relations.sort();
                return Err(ExecutionError::IterationLimit {
                    limit: self.max_iterations,
                    relations,
                });
            }

            let mut next: HashMap<String, Relation> = HashMap::new();
            for clause in rules {
                for (pos, pred) in clause.body.iter().enumerate() {
                    let Some(atom) = pred.atom().filter(|_| pred.is_positive()) else {
                        continue;
                    };
                    let Some(d) = delta.get(&atom.relation).filter(|d| !d.is_empty()) else {
                        continue;
                    };
                    let produced = evaluate_body(&clause.body, scope, Some((pos, d))).project(clause.head());
                    collect_new(&mut next, scope, &clause.head().relation, produced);
                }
            }
            merge_delta(scope, &next);
            tracing::trace!(
                iteration,
                new_tuples = next.values().map(Relation::len).sum::<usize>(),
                "fixpoint_iteration"
            );
            delta = next;
        }
        Ok(())
    }
}

fn collect_new(delta: &mut HashMap<String, Relation>, scope: &Scope<'_>, relation: &str, produced: Relation) {
    let existing = scope.get(relation);
    let fresh: Vec<Tuple> = produced.into_iter().filter(|t| !existing.contains(t)).collect();
    delta.entry(relation.to_string()).or_default().extend(fresh);
}

fn merge_delta(scope: &mut Scope<'_>, delta: &HashMap<String, Relation>) {
    for (relation, tuples) in delta {
        scope
            .derived
            .entry(relation.clone())
            .or_default()
            .extend(tuples.iter().cloned());
    }
}

fn check_clause(clause: &Clause) -> Result<(), ExecutionError> {
    validate_clause(clause).map_err(|e| ExecutionError::InvalidClause {
        clause: clause.to_string(),
        message: e.to_string(),
    })
}

/// Execution order of body predicates
fn order_body(body: &[BodyPredicate]) -> Vec<(usize, &BodyPredicate)> {
    let rank = |p: &BodyPredicate| match p {
        BodyPredicate::Positive(a) if naming::is_skolem_table(&a.relation) => 2,
        BodyPredicate::Positive(_) => 0,
        BodyPredicate::Comparison(_, ComparisonOp::Equal, _) => 1,
        BodyPredicate::Comparison(_, _, _) => 3,
        BodyPredicate::Negated(_) => 4,
    };
    let mut ordered: Vec<(usize, &BodyPredicate)> = body.iter().enumerate().collect();
    ordered.sort_by_key(|(i, p)| (rank(p), *i));
    ordered
}

/// Evaluate a body; `delta` replaces the relation read by the atom at that position
fn evaluate_body(body: &[BodyPredicate], scope: &Scope<'_>, delta: Option<(usize, &Relation)>) -> Bindings {
    let mut bindings = Bindings::unit();
    let ordered = order_body(body);

    // Equalities are retried until no more variables get bound
    let mut pending_eq: Vec<(&Term, &Term)> = Vec::new();

    for (pos, pred) in ordered {
        if bindings.rows.is_empty() {
            break;
        }
        match pred {
            BodyPredicate::Positive(atom) => {
                bindings = bind_equalities(bindings, &mut pending_eq);
                let relation = match delta {
                    Some((p, d)) if p == pos => d,
                    _ => scope.get(&atom.relation),
                };
                bindings = bindings.join(atom, relation);
            }
            BodyPredicate::Comparison(l, ComparisonOp::Equal, r) => {
                pending_eq.push((l, r));
                bindings = bind_equalities(bindings, &mut pending_eq);
            }
            BodyPredicate::Comparison(l, op, r) => {
                bindings = bind_equalities(bindings, &mut pending_eq);
                bindings = bindings.filter(l, *op, r);
            }
            BodyPredicate::Negated(atom) => {
                bindings = bind_equalities(bindings, &mut pending_eq);
                bindings = bindings.anti_join(atom, scope.get(&atom.relation));
            }
        }
    }
    bind_equalities(bindings, &mut pending_eq)
}

/// Apply pending equalities: assign when one side is unbound, filter when both are bound
fn bind_equalities<'t>(mut bindings: Bindings, pending: &mut Vec<(&'t Term, &'t Term)>) -> Bindings {
    loop {
        let mut progressed = false;
        let mut remaining = Vec::new();
        for (l, r) in pending.drain(..) {
            let bound = |t: &Term| match t {
                Term::Constant(_) => true,
                Term::Variable(v) => bindings.position(v).is_some(),
                Term::Placeholder => false,
            };
            match (bound(l), bound(r)) {
                (true, true) => {
                    bindings = bindings.filter(l, ComparisonOp::Equal, r);
                    progressed = true;
                }
                (false, true) => {
                    if let Term::Variable(v) = l {
                        bindings = bindings.assign(v, r);
                        progressed = true;
                    }
                }
                (true, false) => {
                    if let Term::Variable(v) = r {
                        bindings = bindings.assign(v, l);
                        progressed = true;
                    }
                }
                (false, false) => remaining.push((l, r)),
            }
        }
        *pending = remaining;
        if !progressed || pending.is_empty() {
            return bindings;
        }
    }
}

/// Clauses that `roots` transitively depend on, in their original order
pub fn relevant_clauses<'a>(clauses: &[Clause], roots: impl IntoIterator<Item = &'a str>) -> Vec<Clause> {
    let graph = build_dependency_graph(clauses);
    let mut needed: HashSet<String> = HashSet::new();
    let mut stack: Vec<String> = roots.into_iter().map(str::to_string).collect();
    while let Some(rel) = stack.pop() {
        if needed.insert(rel.clone()) {
            if let Some(deps) = graph.edges.get(&rel) {
                stack.extend(deps.iter().map(|(d, _)| d.clone()));
            }
        }
    }
    clauses
        .iter()
        .filter(|c| c.head_relations().any(|h| needed.contains(h)))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders::{AtomBuilder, ClauseBuilder};

    fn long(v: i64) -> Value {
        Value::Long(v)
    }

    fn t(values: Vec<Value>) -> Tuple {
        Tuple::new(values)
    }

    fn graph() -> Database {
        let mut db = Database::new();
        db.insert("N_g", t(vec![long(1), Value::string("Person")]));
        db.insert("N_g", t(vec![long(2), Value::string("Person")]));
        db.insert("E_g", t(vec![long(10), long(1), long(2), Value::string("Knows")]));
        db
    }

    fn knows_query() -> Clause {
        Clause::simple(
            AtomBuilder::new("ANSWER").vars(["a", "b"]).build(),
            vec![
                AtomBuilder::new("N_g").var("a").string("Person").build(),
                AtomBuilder::new("E_g").var("k").var("a").var("b").string("Knows").build(),
                AtomBuilder::new("N_g").var("b").string("Person").build(),
            ],
        )
    }

    #[test]
    fn test_join_correctness() {
        let result = Engine::default().evaluate_clause(&knows_query(), &graph()).unwrap();
        let expected: Relation = [t(vec![long(1), long(2)])].into_iter().collect();
        assert_eq!(result, expected);
    }

    #[test]
    fn test_negation_removes_deleted_edge() {
        let mut db = graph();
        db.insert("E_DEL_v", t(vec![long(10)]));
        let mut clause = knows_query();
        clause
            .body
            .push(BodyPredicate::Negated(AtomBuilder::new("E_DEL_v").var("k").build()));
        let result = Engine::default().evaluate_clause(&clause, &db).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_missing_relation_is_empty() {
        let clause = ClauseBuilder::new("ANSWER").head_vars(["x"]).body_atom("nothing", ["x"]).build();
        let result = Engine::default().evaluate_clause(&clause, &Database::new()).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_repeated_variable_in_atom() {
        let mut db = Database::new();
        db.insert("r", t(vec![long(1), long(1)]));
        db.insert("r", t(vec![long(1), long(2)]));
        let clause = ClauseBuilder::new("ANSWER").head_vars(["x"]).body_atom("r", ["x", "x"]).build();
        let result = Engine::default().evaluate_clause(&clause, &db).unwrap();
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_assignment_and_filter() {
        let mut db = Database::new();
        db.insert("r", t(vec![long(1)]));
        db.insert("r", t(vec![long(5)]));
        let clause = ClauseBuilder::new("ANSWER")
            .head_vars(["x", "c"])
            .body_atom("r", ["x"])
            .compare(Term::var("c"), ComparisonOp::Equal, Term::string("k"))
            .compare(Term::var("x"), ComparisonOp::GreaterThan, Term::Constant(Value::Int(2)))
            .build();
        let result = Engine::default().evaluate_clause(&clause, &db).unwrap();
        let expected: Relation = [t(vec![long(5), Value::string("k")])].into_iter().collect();
        assert_eq!(result, expected);
    }

    #[test]
    fn test_unsafe_clause_rejected() {
        let clause = ClauseBuilder::new("ANSWER").head_vars(["x", "y"]).body_atom("r", ["x"]).build();
        assert!(matches!(
            Engine::default().evaluate_clause(&clause, &Database::new()),
            Err(ExecutionError::InvalidClause { .. })
        ));
    }

    #[test]
    fn test_transitive_closure() {
        let mut db = Database::new();
        for (a, b) in [(1, 2), (2, 3), (3, 4)] {
            db.insert("edge", t(vec![long(a), long(b)]));
        }
        let clauses = vec![
            ClauseBuilder::new("tc").head_vars(["x", "y"]).body_atom("edge", ["x", "y"]).build(),
            ClauseBuilder::new("tc")
                .head_vars(["x", "z"])
                .body_atom("tc", ["x", "y"])
                .body_atom("edge", ["y", "z"])
                .build(),
        ];
        let mut skolems = SkolemTable::new(0);
        let tc = Engine::default().query(&clauses, "tc", &db, &mut skolems).unwrap();
        assert_eq!(tc.len(), 6);
        assert!(tc.contains(&t(vec![long(1), long(4)])));
    }

    #[test]
    fn test_iteration_cap() {
        let mut db = Database::new();
        for (a, b) in [(1, 2), (2, 3), (3, 4), (4, 5)] {
            db.insert("edge", t(vec![long(a), long(b)]));
        }
        let clauses = vec![
            ClauseBuilder::new("tc").head_vars(["x", "y"]).body_atom("edge", ["x", "y"]).build(),
            ClauseBuilder::new("tc")
                .head_vars(["x", "z"])
                .body_atom("tc", ["x", "y"])
                .body_atom("edge", ["y", "z"])
                .build(),
        ];
        let err = Engine::with_max_iterations(1)
            .query(&clauses, "tc", &db, &mut SkolemTable::new(0))
            .unwrap_err();
        assert!(matches!(err, ExecutionError::IterationLimit { limit: 1, .. }));
    }

    #[test]
    fn test_skolem_ids_are_stable() {
        let db = graph();
        let clauses = vec![
            ClauseBuilder::new("GENNEWID_CONST_v_f")
                .head_vars(["a", "b"])
                .body(AtomBuilder::new("E_g").any().var("a").var("b").any().build())
                .build(),
            ClauseBuilder::new("N_v")
                .head_term(Term::var("x"))
                .head_term(Term::string("Friendship"))
                .body_atom("GENNEWID_MAP_v_f", ["a", "b", "x"])
                .build(),
        ];
        let engine = Engine::default();
        let mut skolems = SkolemTable::new(1000);
        let first = engine.query(&clauses, "N_v", &db, &mut skolems).unwrap();
        let second = engine.query(&clauses, "N_v", &db, &mut skolems).unwrap();
        assert_eq!(first, second);
        assert!(first.contains(&t(vec![long(1000), Value::string("Friendship")])));
        assert_eq!(skolems.len(), 1);
    }

    #[test]
    fn test_stratified_negation() {
        let mut db = Database::new();
        for n in 1..=3 {
            db.insert("node", t(vec![long(n)]));
        }
        db.insert("edge", t(vec![long(1), long(2)]));
        db.insert("start", t(vec![long(1)]));
        let clauses = vec![
            ClauseBuilder::new("reach").head_vars(["x"]).body_atom("start", ["x"]).build(),
            ClauseBuilder::new("reach")
                .head_vars(["y"])
                .body_atom("reach", ["x"])
                .body_atom("edge", ["x", "y"])
                .build(),
            ClauseBuilder::new("unreached")
                .head_vars(["x"])
                .body_atom("node", ["x"])
                .negated(AtomBuilder::new("reach").var("x").build())
                .build(),
        ];
        let result = Engine::default()
            .query(&clauses, "unreached", &db, &mut SkolemTable::new(0))
            .unwrap();
        let expected: Relation = [t(vec![long(3)])].into_iter().collect();
        assert_eq!(result, expected);
    }
}
