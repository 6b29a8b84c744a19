//! # Query Rewriter
//!
//! Two strategies for answering a query over a view:
//!
//! 1. [`ssr_rewrite`]: replace view atoms covered by an SSR index with the
//!    index atom. Matches are found by evaluating each rewriting rule over
//!    the query's canonical database (every variable frozen to a distinct
//!    constant) with the in-memory engine.
//! 2. [`unfold`]: inline view definitions until the query only reads base
//!    relations, recursive relations, Skolem tables and materialized views.
//!
//! Both keep the query head unchanged.

pub mod unfold;

pub use unfold::unfold;

use crate::ast::{Atom, BodyPredicate, Clause, ComparisonOp, Term};
use crate::engine::{Database, Engine};
use crate::error::RewriteError;
use crate::value::{Tuple, Value};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Prefix of frozen constants in canonical databases
const FROZEN: char = '\u{1}';

/// Variable bindings produced by head unification
#[derive(Debug, Clone, Default)]
pub struct Substitution {
    map: HashMap<String, Term>,
}

impl Substitution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, var: &str) -> Option<&Term> {
        self.map.get(var)
    }

    pub fn insert(&mut self, var: &str, term: Term) {
        self.map.insert(var.to_string(), term);
    }

    pub fn as_map(&self) -> &HashMap<String, Term> {
        &self.map
    }

    /// Unify a head term of a definition with an argument of the call site.
    ///
    /// Variable-variable clashes become equalities pushed onto `equalities`;
    /// two different constants fail.
    pub fn unify(
        &mut self,
        head: &Term,
        arg: &Term,
        fresh: &mut impl FnMut() -> String,
        equalities: &mut Vec<BodyPredicate>,
    ) -> Result<(), RewriteError> {
        match head {
            Term::Variable(hv) => match self.map.get(hv).cloned() {
                Some(bound) => unify_terms(hv, &bound, arg, equalities),
                None => {
                    let term = match arg {
                        Term::Placeholder => Term::Variable(fresh()),
                        other => other.clone(),
                    };
                    self.map.insert(hv.clone(), term);
                    Ok(())
                }
            },
            Term::Constant(_) => unify_terms("_", head, arg, equalities),
            Term::Placeholder => Ok(()),
        }
    }
}

fn unify_terms(var: &str, left: &Term, right: &Term, equalities: &mut Vec<BodyPredicate>) -> Result<(), RewriteError> {
    match (left, right) {
        (_, Term::Placeholder) | (Term::Placeholder, _) => Ok(()),
        (Term::Constant(a), Term::Constant(b)) => {
            if ComparisonOp::Equal.holds(a, b) {
                Ok(())
            } else {
                Err(RewriteError::InconsistentSubstitution {
                    variable: var.to_string(),
                    first: a.to_string(),
                    second: b.to_string(),
                })
            }
        }
        (l, r) if l == r => Ok(()),
        (l, r) => {
            equalities.push(BodyPredicate::Comparison(r.clone(), ComparisonOp::Equal, l.clone()));
            Ok(())
        }
    }
}

/// Canonical database of a query body plus the map back to query terms
struct Canonical {
    db: Database,
    /// `(body position, relation, frozen tuple)` of each positive body atom
    tuples: Vec<(usize, String, Tuple)>,
    back: HashMap<Value, Term>,
}

impl Canonical {
    fn freeze(query: &Clause) -> Canonical {
        let mut db = Database::new();
        let mut tuples = Vec::new();
        let mut back = HashMap::new();
        let mut frozen: HashMap<String, Value> = HashMap::new();
        let mut placeholders = 0;

        for (pos, pred) in query.body.iter().enumerate() {
            let BodyPredicate::Positive(atom) = pred else {
                continue;
            };
            let values: Vec<Value> = atom
                .args
                .iter()
                .map(|t| match t {
                    Term::Constant(c) => c.clone(),
                    Term::Variable(v) => {
                        let n = frozen.len();
                        frozen
                            .entry(v.clone())
                            .or_insert_with(|| {
                                let value = Value::String(format!("{FROZEN}{n}"));
                                back.insert(value.clone(), Term::Variable(v.clone()));
                                value
                            })
                            .clone()
                    }
                    Term::Placeholder => {
                        placeholders += 1;
                        let value = Value::String(format!("{FROZEN}_{placeholders}"));
                        back.insert(value.clone(), Term::Placeholder);
                        value
                    }
                })
                .collect();
            let tuple = Tuple::new(values);
            db.insert(&atom.relation, tuple.clone());
            tuples.push((pos, atom.relation.clone(), tuple));
        }
        Canonical { db, tuples, back }
    }

    fn thaw(&self, value: &Value) -> Result<Term, RewriteError> {
        if let Some(term) = self.back.get(value) {
            return Ok(term.clone());
        }
        match value.as_str() {
            Some(s) if s.starts_with(FROZEN) => Err(RewriteError::UnresolvedConstant(s.to_string())),
            _ => Ok(Term::Constant(value.clone())),
        }
    }
}

/// Replace view atoms of `query` covered by the given SSR rewriting rules.
///
/// Rules are tried in order and matches are applied greedily; a match is
/// skipped if it overlaps atoms already replaced or would drop a variable
/// still used by the head or the rest of the body. Returns `None` when no
/// rule applies.
pub fn ssr_rewrite(
    query: &Clause,
    rules: &[&Clause],
    engine: &Engine,
) -> Result<Option<Clause>, RewriteError> {
    if query.heads.len() != 1 {
        return Err(RewriteError::MultiHeadQuery(query.heads.len()));
    }
    let canonical = Canonical::freeze(query);
    let mut covered: BTreeSet<usize> = BTreeSet::new();
    let mut index_atoms: Vec<Atom> = Vec::new();

    for rule in rules {
        let rule_vars = rule.ordered_variables();
        let probe = Clause::rule(
            Atom::new("__SUBST", rule_vars.iter().map(|v| Term::var(v)).collect()),
            rule.body.clone(),
        );
        let matches = match engine.evaluate_clause(&probe, &canonical.db) {
            Ok(matches) => matches,
            Err(e) => {
                tracing::debug!(rule = %rule, error = %e, "ssr_rule_skipped");
                continue;
            }
        };

        for tuple in &matches {
            let binding: HashMap<&str, &Value> = rule_vars
                .iter()
                .map(String::as_str)
                .zip(tuple.values())
                .collect();

            let Some(atoms) = covered_atoms(rule, &binding, &canonical, &covered) else {
                continue;
            };

            let head = rule.head();
            let args = head
                .args
                .iter()
                .map(|t| match t {
                    Term::Variable(v) => binding
                        .get(v.as_str())
                        .map_or(Ok(Term::Placeholder), |value| canonical.thaw(value)),
                    other => Ok(other.clone()),
                })
                .collect::<Result<Vec<Term>, RewriteError>>()?;
            let index_atom = Atom::new(&head.relation, args);

            if drops_needed_variable(query, &atoms, &covered, &index_atom, &index_atoms) {
                tracing::trace!(index = %index_atom, "ssr_match_drops_variable");
                continue;
            }
            covered.extend(atoms);
            index_atoms.push(index_atom);
        }
    }

    if index_atoms.is_empty() {
        return Ok(None);
    }

    let mut body: Vec<BodyPredicate> = index_atoms.into_iter().map(BodyPredicate::Positive).collect();
    body.extend(
        query
            .body
            .iter()
            .enumerate()
            .filter(|(i, _)| !covered.contains(i))
            .map(|(_, p)| p.clone()),
    );
    let rewritten = Clause::rule(query.head().clone(), body);
    tracing::debug!(query = %query, rewritten = %rewritten, "ssr_rewrite_applied");
    Ok(Some(rewritten))
}

/// Query body positions matched by the instantiated rule body, if all match
/// and none is already covered
fn covered_atoms(
    rule: &Clause,
    binding: &HashMap<&str, &Value>,
    canonical: &Canonical,
    covered: &BTreeSet<usize>,
) -> Option<Vec<usize>> {
    let mut used: Vec<usize> = Vec::new();
    for atom in rule.positive_body_atoms() {
        let pattern: Vec<Option<&Value>> = atom
            .args
            .iter()
            .map(|t| match t {
                Term::Variable(v) => binding.get(v.as_str()).copied(),
                Term::Constant(c) => Some(c),
                Term::Placeholder => None,
            })
            .collect();
        let (pos, _, _) = canonical.tuples.iter().find(|(pos, relation, tuple)| {
            !used.contains(pos)
                && *relation == atom.relation
                && tuple.arity() == pattern.len()
                && pattern.iter().zip(tuple.values()).all(|(p, v)| match p {
                    Some(p) => ComparisonOp::Equal.holds(p, v),
                    None => true,
                })
        })?;
        used.push(*pos);
    }
    if used.iter().any(|p| covered.contains(p)) {
        return None;
    }
    Some(used)
}

/// Would replacing `atoms` by `index_atom` lose a variable used elsewhere?
fn drops_needed_variable(
    query: &Clause,
    atoms: &[usize],
    covered: &BTreeSet<usize>,
    index_atom: &Atom,
    index_atoms: &[Atom],
) -> bool {
    let kept: HashSet<String> = index_atom.variables();
    let removed: HashSet<String> = atoms
        .iter()
        .flat_map(|&i| query.body[i].variables())
        .filter(|v| !kept.contains(v))
        .collect();
    if removed.is_empty() {
        return false;
    }
    let mut still_used: HashSet<String> = query.head().variables();
    for (i, pred) in query.body.iter().enumerate() {
        if !atoms.contains(&i) && !covered.contains(&i) {
            still_used.extend(pred.variables());
        }
    }
    for atom in index_atoms {
        still_used.extend(atom.variables());
    }
    removed.iter().any(|v| still_used.contains(v))
}
