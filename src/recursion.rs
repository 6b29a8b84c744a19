//! # Recursion Support
//!
//! Dependency graphs, SCC detection (Tarjan's), and stratification for the
//! clauses of a program. Handles positive recursion (path automata),
//! stratified negation and Skolem function tables.
//!
//! A clause is recursive if one of its head relations appears in its body:
//! ```datalog
//! REC_1_S0(x, z) :- REC_1_S0(x, y), E_g(_, y, z, "Knows").
//! ```
//!
//! Stratification groups clauses into evaluation layers so that negated
//! relations, and the argument relations of Skolem tables, are fully computed
//! before any clause that consumes them runs.

use crate::ast::{BodyPredicate, Clause};
use crate::compiler::naming;
use std::collections::{HashMap, HashSet};

/// Type of dependency between relations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyType {
    /// Head depends on relation via positive atom; same stratum or higher
    Positive,
    /// Head depends on relation via negated atom; dependency in a strictly lower stratum
    Negative,
    /// A function table depends on its argument relation; strictly lower stratum
    Function,
}

impl DependencyType {
    fn is_strict(self) -> bool {
        !matches!(self, DependencyType::Positive)
    }
}

/// Dependency graph with typed edges
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Map from relation to its dependencies with types
    pub edges: HashMap<String, Vec<(String, DependencyType)>>,
    /// All relations in the graph
    pub relations: HashSet<String>,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dependency edge
    pub fn add_edge(&mut self, from: &str, to: &str, dep_type: DependencyType) {
        self.relations.insert(from.to_string());
        self.relations.insert(to.to_string());
        self.edges
            .entry(from.to_string())
            .or_default()
            .push((to.to_string(), dep_type));
    }

    /// Convert to simple graph format for SCC detection (all edges, ignoring type)
    pub fn to_simple_graph(&self) -> HashMap<String, HashSet<String>> {
        let mut simple = HashMap::new();
        for (from, edges) in &self.edges {
            let deps: HashSet<String> = edges.iter().map(|(to, _)| to.clone()).collect();
            simple.insert(from.clone(), deps);
        }
        for rel in &self.relations {
            simple.entry(rel.clone()).or_insert_with(HashSet::new);
        }
        simple
    }

    /// First strict (negative or function) edge inside an SCC, if any.
    /// Sorted for deterministic error messages.
    pub fn strict_edge_in_scc(&self, scc: &[String]) -> Option<(String, String, DependencyType)> {
        let scc_set: HashSet<&String> = scc.iter().collect();
        let mut sorted_scc: Vec<&String> = scc.iter().collect();
        sorted_scc.sort();
        for from in sorted_scc {
            if let Some(edges) = self.edges.get(from) {
                let mut sorted_edges: Vec<_> = edges.iter().collect();
                sorted_edges.sort_by(|a, b| a.0.cmp(&b.0));
                for (to, dep_type) in sorted_edges {
                    if dep_type.is_strict() && scc_set.contains(to) {
                        return Some((from.clone(), to.clone(), *dep_type));
                    }
                }
            }
        }
        None
    }

    /// Relations that sit on a cycle (an SCC of size > 1, or a self-loop)
    pub fn recursive_relations(&self) -> HashSet<String> {
        let simple = self.to_simple_graph();
        let mut recursive = HashSet::new();
        for scc in find_sccs(&simple) {
            let cyclic = scc.len() > 1
                || simple
                    .get(&scc[0])
                    .is_some_and(|deps| deps.contains(&scc[0]));
            if cyclic {
                recursive.extend(scc);
            }
        }
        recursive
    }
}

/// Build the typed relation dependency graph of a set of clauses.
///
/// Each Skolem function table gets a [`DependencyType::Function`] edge to the
/// relation holding its argument tuples.
pub fn build_dependency_graph<'a>(clauses: impl IntoIterator<Item = &'a Clause>) -> DependencyGraph {
    let mut graph = DependencyGraph::new();

    for clause in clauses {
        for head in &clause.heads {
            let head_relation = &head.relation;
            graph.relations.insert(head_relation.clone());

            for pred in &clause.body {
                match pred {
                    BodyPredicate::Positive(atom) => {
                        graph.add_edge(head_relation, &atom.relation, DependencyType::Positive);
                    }
                    BodyPredicate::Negated(atom) => {
                        graph.add_edge(head_relation, &atom.relation, DependencyType::Negative);
                    }
                    BodyPredicate::Comparison(_, _, _) => {}
                }
            }
        }
    }

    let tables: Vec<String> = graph
        .relations
        .iter()
        .filter(|r| naming::skolem_source(r).is_some())
        .cloned()
        .collect();
    for table in tables {
        if let Some(source) = naming::skolem_source(&table) {
            graph.add_edge(&table, &source, DependencyType::Function);
        }
    }

    graph
}

/// Find strongly connected components (SCCs) in a dependency graph.
///
/// Uses Tarjan's algorithm: DFS with discovery times, low-link tracking,
/// and stack-based cycle detection. Nodes are visited in sorted order so
/// the output is deterministic.
pub fn find_sccs(graph: &HashMap<String, HashSet<String>>) -> Vec<Vec<String>> {
    let mut state = Tarjan::default();

    let mut nodes: Vec<&String> = graph
        .iter()
        .flat_map(|(node, neighbors)| std::iter::once(node).chain(neighbors.iter()))
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    nodes.sort();

    for node in nodes {
        if !state.indices.contains_key(node) {
            state.strongconnect(node, graph);
        }
    }

    state.sccs
}

#[derive(Default)]
struct Tarjan {
    index: usize,
    stack: Vec<String>,
    indices: HashMap<String, usize>,
    lowlinks: HashMap<String, usize>,
    on_stack: HashSet<String>,
    sccs: Vec<Vec<String>>,
}

impl Tarjan {
    fn strongconnect(&mut self, v: &str, graph: &HashMap<String, HashSet<String>>) {
        self.indices.insert(v.to_string(), self.index);
        self.lowlinks.insert(v.to_string(), self.index);
        self.index += 1;
        self.stack.push(v.to_string());
        self.on_stack.insert(v.to_string());

        if let Some(neighbors) = graph.get(v) {
            let mut sorted: Vec<&String> = neighbors.iter().collect();
            sorted.sort();
            for w in sorted {
                if !self.indices.contains_key(w) {
                    self.strongconnect(w, graph);
                    let low = self.lowlinks[v].min(self.lowlinks[w]);
                    self.lowlinks.insert(v.to_string(), low);
                } else if self.on_stack.contains(w) {
                    let low = self.lowlinks[v].min(self.indices[w]);
                    self.lowlinks.insert(v.to_string(), low);
                }
            }
        }

        // Root node: pop the stack to form an SCC
        if self.lowlinks[v] == self.indices[v] {
            let mut scc = Vec::new();
            while let Some(w) = self.stack.pop() {
                self.on_stack.remove(&w);
                let done = w == v;
                scc.push(w);
                if done {
                    break;
                }
            }
            self.sccs.push(scc);
        }
    }
}

/// Stratification result with potential error
#[derive(Debug, Clone)]
pub enum StratificationResult {
    /// Clause indices grouped by stratum, lowest first
    Success(Vec<Vec<usize>>),
    /// Negation or a Skolem table inside a recursive cycle
    NotStratifiable { relation: String, reason: String },
}

impl StratificationResult {
    /// Check if stratification succeeded
    pub fn is_success(&self) -> bool {
        matches!(self, StratificationResult::Success(_))
    }

    /// Convert into strata, returning the offending relation and reason if not stratifiable
    pub fn try_into_strata(self) -> Result<Vec<Vec<usize>>, (String, String)> {
        match self {
            StratificationResult::Success(strata) => Ok(strata),
            StratificationResult::NotStratifiable { relation, reason } => Err((relation, reason)),
        }
    }
}

/// Stratify clauses into layers.
///
/// - Positive dependency: stratum(A) >= stratum(B)
/// - Negative or function dependency: stratum(A) > stratum(B)
/// - A strict edge inside an SCC makes the program unstratifiable
///
/// A clause lands in the highest stratum among its head relations.
pub fn stratify(clauses: &[Clause]) -> StratificationResult {
    if clauses.is_empty() {
        return StratificationResult::Success(vec![]);
    }

    let graph = build_dependency_graph(clauses);
    let sccs = find_sccs(&graph.to_simple_graph());

    let mut relation_to_scc: HashMap<&str, usize> = HashMap::new();
    for (scc_idx, scc) in sccs.iter().enumerate() {
        for relation in scc {
            relation_to_scc.insert(relation.as_str(), scc_idx);
        }
    }

    for scc in &sccs {
        if let Some((from, to, dep_type)) = graph.strict_edge_in_scc(scc) {
            let reason = match (dep_type, from == to) {
                (DependencyType::Function, _) => format!(
                    "Skolem table '{from}' feeds its own arguments through [{}]",
                    scc.join(", ")
                ),
                (_, true) => format!("Self-negation: '{from}' negates itself (!{from} in body)"),
                (_, false) => format!(
                    "Unstratified negation: '{from}' negates '{to}' within same recursive cycle. \
                     Cycle members: [{}]",
                    scc.join(", ")
                ),
            };
            return StratificationResult::NotStratifiable {
                relation: from,
                reason,
            };
        }
    }

    // Fixpoint over edges; bounded by the number of SCCs since the condensation is acyclic
    let mut scc_stratum = vec![0usize; sccs.len()];
    let mut changed = true;
    let mut iterations = 0;
    while changed && iterations <= sccs.len() {
        changed = false;
        iterations += 1;
        for (from, deps) in &graph.edges {
            let head_scc = relation_to_scc[from.as_str()];
            for (to, dep_type) in deps {
                let dep_scc = relation_to_scc[to.as_str()];
                let required = scc_stratum[dep_scc] + usize::from(dep_type.is_strict());
                if scc_stratum[head_scc] < required {
                    scc_stratum[head_scc] = required;
                    changed = true;
                }
            }
        }
    }

    let rule_to_stratum: Vec<usize> = clauses
        .iter()
        .map(|clause| {
            clause
                .head_relations()
                .filter_map(|h| relation_to_scc.get(h).map(|&scc| scc_stratum[scc]))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let max_stratum = rule_to_stratum.iter().max().copied().unwrap_or(0);
    let mut strata: Vec<Vec<usize>> = vec![Vec::new(); max_stratum + 1];
    for (rule_idx, &stratum) in rule_to_stratum.iter().enumerate() {
        strata[stratum].push(rule_idx);
    }
    strata.retain(|s| !s.is_empty());

    StratificationResult::Success(strata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders::{AtomBuilder, ClauseBuilder};

    fn tc_clauses() -> Vec<Clause> {
        vec![
            ClauseBuilder::new("tc").head_vars(["x", "y"]).body_atom("edge", ["x", "y"]).build(),
            ClauseBuilder::new("tc")
                .head_vars(["x", "z"])
                .body_atom("tc", ["x", "y"])
                .body_atom("edge", ["y", "z"])
                .build(),
        ]
    }

    #[test]
    fn test_recursive_relations() {
        let graph = build_dependency_graph(&tc_clauses());
        let recursive = graph.recursive_relations();
        assert!(recursive.contains("tc"));
        assert!(!recursive.contains("edge"));
    }

    #[test]
    fn test_negation_goes_to_higher_stratum() {
        let mut clauses = tc_clauses();
        clauses.push(
            ClauseBuilder::new("unreached")
                .head_vars(["x"])
                .body_atom("node", ["x"])
                .negated(AtomBuilder::new("tc").string("a").var("x").build())
                .build(),
        );
        let strata = stratify(&clauses).try_into_strata().unwrap();
        assert_eq!(strata, vec![vec![0, 1], vec![2]]);
    }

    #[test]
    fn test_self_negation_not_stratifiable() {
        let clauses = vec![ClauseBuilder::new("p")
            .head_vars(["x"])
            .body_atom("q", ["x"])
            .negated(AtomBuilder::new("p").var("x").build())
            .build()];
        let (relation, reason) = stratify(&clauses).try_into_strata().unwrap_err();
        assert_eq!(relation, "p");
        assert!(reason.contains("Self-negation"));
    }

    #[test]
    fn test_skolem_table_after_its_arguments() {
        let clauses = vec![
            ClauseBuilder::new("GENNEWID_CONST_v_f")
                .head_vars(["a"])
                .body_atom("MATCH_v_0", ["a"])
                .build(),
            ClauseBuilder::new("N_v")
                .head_vars(["x"])
                .body_atom("GENNEWID_MAP_v_f", ["a", "x"])
                .build(),
        ];
        let strata = stratify(&clauses).try_into_strata().unwrap();
        assert_eq!(strata, vec![vec![0], vec![1]]);
    }

    #[test]
    fn test_tarjan_finds_cycle() {
        let mut graph: HashMap<String, HashSet<String>> = HashMap::new();
        graph.insert("a".into(), ["b".to_string()].into());
        graph.insert("b".into(), ["a".to_string()].into());
        graph.insert("c".into(), ["a".to_string()].into());
        let sccs = find_sccs(&graph);
        assert_eq!(sccs.len(), 2);
        assert!(sccs.iter().any(|s| s.len() == 2));
    }
}
