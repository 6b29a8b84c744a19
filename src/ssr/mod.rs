//! # SSR Indexes
//!
//! A substitution subgraph relation (SSR) index stores, per match of a view
//! rule, the bindings of the rule's post-image pattern. Each index has:
//!
//! - creation rules over the base graph (`INDEX_v(vars) :- MATCH_v_i(..)`),
//!   evaluated into the store
//! - a rewriting rule over the view (`INDEX_v(vars) :- N_v(..), E_v(..)`),
//!   used by the query rewriter to replace the covered view atoms
//!
//! Rules that mint new ids get one index per new variable, joined with the
//! view's own Skolem table so ids agree with the view. Property variants
//! `INDEX_.._NP` / `INDEX_.._EP` carry the properties of matched nodes and
//! edges.

use crate::ast::builders::AtomBuilder;
use crate::ast::{Atom, BodyPredicate, Clause, Term};
use crate::compiler::{naming, CompiledRule, CompiledView};
use crate::error::CompileError;
use crate::program::validate_clause;
use crate::schema::SchemaGraph;
use crate::view::{EdgeLabel, PatternAtom, TransRule, TransRuleList};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Label standing for "any label" in pattern type graphs
pub const ANY_LABEL: &str = "*";

/// One index relation with its rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SsrIndex {
    /// `INDEX_<v>` or `INDEX_<v>_<i>`
    pub name: String,
    pub view: String,
    /// Variable names of the index columns
    pub columns: Vec<String>,
    /// Rules filling the index and its property variants from the base graph
    pub creation: Vec<Clause>,
    /// `name(columns) :- view atoms`
    pub rewriting: Clause,
    /// Property variants over the view's `NP_v` / `EP_v`
    pub property_rewritings: Vec<Clause>,
    /// Node labels and edge types of the rewriting rule's view atoms
    pub type_graph: SchemaGraph,
}

impl SsrIndex {
    /// Relations this index stores
    pub fn relations(&self) -> BTreeSet<String> {
        self.creation
            .iter()
            .flat_map(|c| c.head_relations().map(str::to_string))
            .collect()
    }

    /// Rewriting rules, the main one first
    pub fn rewriting_rules(&self) -> impl Iterator<Item = &Clause> {
        std::iter::once(&self.rewriting).chain(&self.property_rewritings)
    }

    /// Can this index answer (part of) a query with the given type graph?
    ///
    /// The index pattern must be a structural subset of the query pattern,
    /// and every query type must exist in the view schema.
    pub fn covers(&self, query: &SchemaGraph, view_schema: &SchemaGraph) -> bool {
        self.type_graph.is_subgraph_of(query) && types_exist(query, view_schema)
    }
}

/// All indexes of one view
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SsrIndexSet {
    pub view: String,
    pub indexes: Vec<SsrIndex>,
}

impl SsrIndexSet {
    pub fn creation_clauses(&self) -> Vec<Clause> {
        self.indexes.iter().flat_map(|i| i.creation.iter().cloned()).collect()
    }

    pub fn relations(&self) -> BTreeSet<String> {
        self.indexes.iter().flat_map(SsrIndex::relations).collect()
    }

    /// Rewriting rules of the indexes that cover a query
    pub fn candidates<'s>(
        &'s self,
        query: &'s SchemaGraph,
        view_schema: &'s SchemaGraph,
    ) -> impl Iterator<Item = &'s SsrIndex> + 's {
        self.indexes.iter().filter(move |i| i.covers(query, view_schema))
    }
}

/// Index rules before naming
struct IndexSpec {
    creation_body: Vec<BodyPredicate>,
    view_atoms: Vec<Atom>,
    /// Matched node and edge variables whose properties are propagated
    node_owners: Vec<String>,
    edge_owners: Vec<String>,
}

/// Build the SSR indexes of a compiled view
pub fn build_ssr(view: &TransRuleList, compiled: &CompiledView) -> Result<SsrIndexSet, CompileError> {
    let produced = ProducedLabels::of(view);
    let mut specs = Vec::new();
    for (i, (rule, compiled_rule)) in view.rules.iter().zip(&compiled.rules).enumerate() {
        if compiled_rule.skolem_atoms.is_empty() && !selection_restates_match(view, rule) {
            tracing::debug!(view = %view.name, rule = i, "ssr_rule_not_indexable");
            continue;
        }
        specs.extend(rule_specs(view, rule, compiled_rule, &produced));
    }

    let numbered = specs.len() > 1;
    let mut indexes = Vec::with_capacity(specs.len());
    for (i, spec) in specs.into_iter().enumerate() {
        let name = naming::index(&view.name, numbered.then_some(i));
        indexes.push(finish_index(&name, view, spec)?);
    }

    tracing::debug!(view = %view.name, indexes = indexes.len(), "ssr_indexes_built");
    Ok(SsrIndexSet {
        view: view.name.clone(),
        indexes,
    })
}

/// A rule without new ids is indexable only when its pattern, read back over
/// the view, yields exactly its matches.
///
/// That holds for selection views (every view relation is a subset of the
/// base one and every matched element survives) whose rule is a plain
/// conjunction of labelled nodes and edges.
fn selection_restates_match(view: &TransRuleList, rule: &TransRule) -> bool {
    view.is_selection()
        && rule.conditions.is_empty()
        && rule.pattern.iter().all(|m| {
            !m.negated
                && match &m.atom {
                    PatternAtom::Node(_) => true,
                    PatternAtom::Edge(e) => !e.is_path(),
                    PatternAtom::NodeProperty(_) | PatternAtom::EdgeProperty(_) => false,
                }
        })
}

/// How often each node label and edge label is produced across a view's
/// CONSTRUCT and ADD atoms; `*` counts productions with no fixed label.
#[derive(Default)]
struct ProducedLabels {
    nodes: HashMap<String, usize>,
    edges: HashMap<String, usize>,
}

impl ProducedLabels {
    fn of(view: &TransRuleList) -> Self {
        let mut node_atoms: HashSet<(usize, String, String)> = HashSet::new();
        let mut edge_atoms: HashSet<(usize, String, String)> = HashSet::new();
        for (i, rule) in view.rules.iter().enumerate() {
            let produced: Vec<&PatternAtom> = rule.construct.iter().chain(&rule.add).collect();
            let mut labels: HashMap<&str, &str> = HashMap::new();
            for atom in rule.positive_atoms().chain(produced.iter().copied()) {
                if let PatternAtom::Node(n) = atom {
                    if let Some(l) = &n.label {
                        labels.insert(n.var.as_str(), l.as_str());
                    }
                }
            }
            let matched: HashSet<String> = rule.match_variables().into_iter().collect();
            for atom in &produced {
                match atom {
                    PatternAtom::Node(n) => {
                        let label = match &n.label {
                            Some(l) => l.as_str(),
                            None if matched.contains(&n.var) => labels.get(n.var.as_str()).copied().unwrap_or(ANY_LABEL),
                            // Bare mention of a node placed elsewhere
                            None => continue,
                        };
                        node_atoms.insert((i, n.var.clone(), label.to_string()));
                    }
                    PatternAtom::Edge(e) => {
                        let label = match &e.label {
                            EdgeLabel::Label(l) => l.as_str(),
                            _ => ANY_LABEL,
                        };
                        let id = e.var.clone().unwrap_or_else(|| format!("{}->{}", e.from, e.to));
                        edge_atoms.insert((i, id, label.to_string()));
                    }
                    PatternAtom::NodeProperty(_) | PatternAtom::EdgeProperty(_) => {}
                }
            }
        }
        let mut counts = ProducedLabels::default();
        for (_, _, label) in node_atoms {
            *counts.nodes.entry(label).or_default() += 1;
        }
        for (_, _, label) in edge_atoms {
            *counts.edges.entry(label).or_default() += 1;
        }
        counts
    }

    /// The view relation holds this label only through one produced atom
    fn unique(&self, atom: &Atom, v: &str) -> bool {
        let (counts, label_at) = if atom.relation == naming::nodes(v) {
            (&self.nodes, 1)
        } else {
            (&self.edges, 3)
        };
        let Some(label) = atom.args.get(label_at).and_then(Term::as_constant).and_then(|c| c.as_str()) else {
            return false;
        };
        counts.get(ANY_LABEL).is_none() && counts.get(label) == Some(&1)
    }
}

fn rule_specs(view: &TransRuleList, rule: &TransRule, compiled: &CompiledRule, produced: &ProducedLabels) -> Vec<IndexSpec> {
    let v = view.name.as_str();
    let matched: HashSet<String> = rule.match_variables().into_iter().collect();
    let mut base_body = vec![BodyPredicate::Positive(compiled.match_head.clone())];

    if compiled.skolem_atoms.is_empty() {
        let after = rule.pattern_after();
        let view_atoms = view_atoms(v, &after);
        if view_atoms.is_empty() {
            return Vec::new();
        }
        let (node_owners, edge_owners) = property_owners(&after, &matched);
        return vec![IndexSpec {
            creation_body: base_body,
            view_atoms,
            node_owners,
            edge_owners,
        }];
    }

    // Pass-through elements of a default-map view can carry any label
    if view.is_default_map {
        tracing::debug!(view = %v, "ssr_default_map_not_indexable");
        return Vec::new();
    }

    // Every new id is bound by its Skolem table
    base_body.extend(
        compiled
            .skolem_atoms
            .iter()
            .map(|(_, atom)| BodyPredicate::Positive(atom.clone())),
    );
    let produced_atoms: Vec<PatternAtom> = rule.construct.iter().chain(&rule.add).cloned().collect();
    let (view_nodes, view_edges) = produced_elements(&produced_atoms, &matched);
    compiled
        .skolem_atoms
        .iter()
        .filter_map(|(var, _)| {
            let mentioning: Vec<PatternAtom> = produced_atoms
                .iter()
                .filter(|a| a.variables().contains(var))
                .cloned()
                .collect();
            let view_atoms = view_atoms(v, &mentioning);
            // No pass-through here, so a label minted by a single atom pins
            // the view tuples to this rule's matches
            if view_atoms.is_empty() || !view_atoms.iter().all(|a| produced.unique(a, v)) {
                tracing::debug!(view = %v, variable = %var, "ssr_variable_not_indexable");
                return None;
            }
            let (mut node_owners, mut edge_owners) = property_owners(&mentioning, &matched);
            // Properties reach the view only for elements it contains
            node_owners.retain(|o| view_nodes.contains(o));
            edge_owners.retain(|o| view_edges.contains(o));
            Some(IndexSpec {
                creation_body: base_body.clone(),
                view_atoms,
                node_owners,
                edge_owners,
            })
        })
        .collect()
}

/// Node and edge variables a rule puts into its view
fn produced_elements(produced: &[PatternAtom], matched: &HashSet<String>) -> (HashSet<String>, HashSet<String>) {
    let labelled: HashSet<&str> = produced
        .iter()
        .filter_map(|a| match a {
            PatternAtom::Node(n) if n.label.is_some() => Some(n.var.as_str()),
            _ => None,
        })
        .collect();
    let mut nodes = HashSet::new();
    let mut edges = HashSet::new();
    for atom in produced {
        match atom {
            PatternAtom::Node(n) if n.label.is_some() || matched.contains(&n.var) || labelled.contains(n.var.as_str()) => {
                nodes.insert(n.var.clone());
            }
            PatternAtom::Edge(e) => {
                if let Some(var) = &e.var {
                    edges.insert(var.clone());
                }
            }
            _ => {}
        }
    }
    (nodes, edges)
}

/// View-side atoms of a post-image pattern; property atoms are left to the variants
fn view_atoms(v: &str, pattern: &[PatternAtom]) -> Vec<Atom> {
    // A bare node already pinned by a label or an edge adds nothing
    let placed: HashSet<&str> = pattern
        .iter()
        .flat_map(|a| match a {
            PatternAtom::Node(n) if n.label.is_some() => vec![n.var.as_str()],
            PatternAtom::Edge(e) => vec![e.from.as_str(), e.to.as_str()],
            _ => Vec::new(),
        })
        .collect();
    let mut atoms: Vec<Atom> = Vec::new();
    for atom in pattern {
        let built = match atom {
            PatternAtom::Node(n) if n.label.is_none() && placed.contains(n.var.as_str()) => continue,
            PatternAtom::Node(n) => {
                let label = n.label.as_deref().map_or(Term::Placeholder, Term::string);
                AtomBuilder::new(naming::nodes(v)).var(&n.var).term(label).build()
            }
            PatternAtom::Edge(e) => {
                let label = match &e.label {
                    EdgeLabel::Label(l) => Term::string(l),
                    _ => Term::Placeholder,
                };
                let id = e.var.as_deref().map_or(Term::Placeholder, Term::var);
                AtomBuilder::new(naming::edges(v))
                    .term(id)
                    .var(&e.from)
                    .var(&e.to)
                    .term(label)
                    .build()
            }
            PatternAtom::NodeProperty(_) | PatternAtom::EdgeProperty(_) => continue,
        };
        if !atoms.contains(&built) {
            atoms.push(built);
        }
    }
    atoms
}

/// Matched nodes and edges of the pattern that carry no constructed properties
fn property_owners(pattern: &[PatternAtom], matched: &HashSet<String>) -> (Vec<String>, Vec<String>) {
    let constructed: HashSet<&str> = pattern
        .iter()
        .filter_map(|a| match a {
            PatternAtom::NodeProperty(p) | PatternAtom::EdgeProperty(p) => Some(p.owner.as_str()),
            _ => None,
        })
        .collect();
    let keep = |v: &str| matched.contains(v) && !constructed.contains(v);
    let mut nodes = BTreeSet::new();
    let mut edges = BTreeSet::new();
    for atom in pattern {
        match atom {
            PatternAtom::Node(n) if keep(&n.var) => {
                nodes.insert(n.var.clone());
            }
            PatternAtom::Edge(e) => {
                for end in [&e.from, &e.to] {
                    if keep(end) {
                        nodes.insert(end.clone());
                    }
                }
                if let Some(var) = e.var.as_deref().filter(|v| keep(v)) {
                    edges.insert(var.to_string());
                }
            }
            _ => {}
        }
    }
    (nodes.into_iter().collect(), edges.into_iter().collect())
}

fn finish_index(name: &str, view: &TransRuleList, spec: IndexSpec) -> Result<SsrIndex, CompileError> {
    let v = view.name.as_str();
    let b = view.base.as_str();

    let mut columns: Vec<String> = Vec::new();
    for atom in &spec.view_atoms {
        for var in atom.ordered_variables() {
            if !columns.contains(&var) {
                columns.push(var);
            }
        }
    }
    let head = Atom::new(name, columns.iter().map(|c| Term::var(c)).collect());

    let mut creation = vec![Clause::rule(head.clone(), spec.creation_body.clone())];
    let rewriting = Clause::simple(head, spec.view_atoms.clone());
    let mut property_rewritings = Vec::new();

    let variants = [
        (naming::index_node_props(name), &spec.node_owners, naming::node_props(b), naming::node_props(v)),
        (naming::index_edge_props(name), &spec.edge_owners, naming::edge_props(b), naming::edge_props(v)),
    ];
    for (relation, owners, base_props, view_props) in variants {
        for owner in owners {
            let mut args: Vec<Term> = columns.iter().map(|c| Term::var(c)).collect();
            args.extend([Term::var(owner), Term::var("__key"), Term::var("__value")]);
            let variant_head = Atom::new(&relation, args);
            let props = |rel: &str| AtomBuilder::new(rel).var(owner).vars(["__key", "__value"]).build();

            let mut body = spec.creation_body.clone();
            body.push(BodyPredicate::Positive(props(&base_props)));
            creation.push(Clause::rule(variant_head.clone(), body));

            let mut view_body = spec.view_atoms.clone();
            view_body.push(props(&view_props));
            property_rewritings.push(Clause::simple(variant_head, view_body));
        }
    }

    for clause in creation.iter().chain(std::iter::once(&rewriting)).chain(&property_rewritings) {
        validate_clause(clause)?;
    }

    Ok(SsrIndex {
        name: name.to_string(),
        view: v.to_string(),
        columns,
        creation,
        type_graph: pattern_type_graph(&spec.view_atoms, v),
        rewriting,
        property_rewritings,
    })
}

/// Node labels and edge types of the `N_<graph>` / `E_<graph>` atoms of a body.
///
/// Endpoints whose label is not fixed by a node atom get [`ANY_LABEL`].
pub fn pattern_type_graph<'a>(atoms: impl IntoIterator<Item = &'a Atom>, graph: &str) -> SchemaGraph {
    let nodes = naming::nodes(graph);
    let edges = naming::edges(graph);
    let atoms: Vec<&Atom> = atoms.into_iter().collect();

    let mut labels: HashMap<&str, &str> = HashMap::new();
    let mut schema = SchemaGraph::new();
    for atom in atoms.iter().filter(|a| a.relation == nodes && a.arity() == 2) {
        if let (Some(var), Some(label)) = (atom.args[0].as_variable(), atom.args[1].as_constant()) {
            if let Some(label) = label.as_str() {
                labels.insert(var, label);
                schema.add_node(label);
            }
        }
    }
    let label_of = |t: &Term| {
        t.as_variable()
            .and_then(|v| labels.get(v).copied())
            .unwrap_or(ANY_LABEL)
    };
    for atom in atoms.iter().filter(|a| a.relation == edges && a.arity() == 4) {
        let label = atom.args[3]
            .as_constant()
            .and_then(|c| c.as_str())
            .unwrap_or(ANY_LABEL);
        schema.add_edge(label_of(&atom.args[1]), label, label_of(&atom.args[2]));
    }
    schema
}

/// Every concrete type of `query` appears in `schema` (empty schemas accept all)
fn types_exist(query: &SchemaGraph, schema: &SchemaGraph) -> bool {
    if schema.is_empty() {
        return true;
    }
    let label_ok = |l: &str| l == ANY_LABEL || schema.has_node_label(l);
    let nodes_ok = query.node_labels.iter().all(|l| label_ok(l));
    let edges_ok = query.edge_types.iter().all(|q| {
        schema.edge_types.iter().any(|s| {
            (q.label == ANY_LABEL || q.label == s.label)
                && (q.from == ANY_LABEL || q.from == s.from)
                && (q.to == ANY_LABEL || q.to == s.to)
        })
    });
    nodes_ok && edges_ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile_view;
    use crate::program::Program;
    use crate::schema::SchemaCatalog;
    use crate::ast::{ComparisonOp, Term};
    use crate::value::Value;
    use crate::view::{MatchAtom, Operand, SkolemBinding, ViewKind, WhereCond};

    fn schemas() -> SchemaCatalog {
        let mut catalog = SchemaCatalog::new();
        let g = catalog.register("g");
        g.add_edge("Person", "Knows", "Person");
        g.add_edge("Person", "WorksAt", "Company");
        catalog
    }

    fn knows_rule() -> TransRule {
        TransRule {
            pattern: vec![
                MatchAtom {
                    atom: PatternAtom::node("a", Some("Person")),
                    negated: false,
                },
                MatchAtom {
                    atom: PatternAtom::edge(Some("k"), "a", "b", EdgeLabel::Label("Knows".to_string())),
                    negated: false,
                },
                MatchAtom {
                    atom: PatternAtom::node("b", Some("Person")),
                    negated: false,
                },
            ],
            ..Default::default()
        }
    }

    fn build(view: &TransRuleList) -> SsrIndexSet {
        let compiled = compile_view(view, &Program::new(), &schemas()).unwrap();
        build_ssr(view, &compiled).unwrap()
    }

    #[test]
    fn test_selection_view_single_index() {
        let view = TransRuleList::new("v", "g", ViewKind::Virtual, vec![knows_rule()]);
        let set = build(&view);
        assert_eq!(set.indexes.len(), 1);
        let index = &set.indexes[0];
        assert_eq!(index.name, "INDEX_v");
        assert_eq!(index.columns, vec!["a", "k", "b"]);
        assert_eq!(
            index.rewriting.to_string(),
            "INDEX_v(a, k, b) :- N_v(a, \"Person\"), E_v(k, a, b, \"Knows\"), N_v(b, \"Person\")."
        );
        assert_eq!(
            index.creation[0].to_string(),
            "INDEX_v(a, k, b) :- MATCH_v_0(a, k, b)."
        );
        // a and b get node property variants, k an edge variant
        assert_eq!(index.property_rewritings.len(), 3);
        assert!(set.relations().contains("INDEX_v_NP"));
        assert!(set.relations().contains("INDEX_v_EP"));
    }

    #[test]
    fn test_new_variable_index_joins_skolem_table() {
        let mut rule = knows_rule();
        rule.skolems.push(SkolemBinding {
            var: "f".to_string(),
            function: "friendship".to_string(),
            args: vec!["a".to_string(), "b".to_string()],
        });
        rule.construct = vec![
            PatternAtom::node("f", Some("Friendship")),
            PatternAtom::edge(Some("m"), "a", "f", EdgeLabel::Label("Member".to_string())),
        ];
        rule.skolems.push(SkolemBinding {
            var: "m".to_string(),
            function: "member".to_string(),
            args: vec!["a".to_string(), "b".to_string()],
        });
        let view = TransRuleList::new("v", "g", ViewKind::Virtual, vec![rule]);
        let set = build(&view);
        assert_eq!(set.indexes.len(), 2);
        assert_eq!(set.indexes[0].name, "INDEX_v_0");
        let creation = set.indexes[0].creation[0].to_string();
        assert!(creation.contains("GENNEWID_MAP_v_friendship(a, b, f)"), "{creation}");
    }

    fn skolem(var: &str, function: &str, args: &[&str]) -> SkolemBinding {
        SkolemBinding {
            var: var.to_string(),
            function: function.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[test]
    fn test_filtered_selection_has_no_index() {
        let mut rule = knows_rule();
        rule.conditions.push(WhereCond {
            left: Operand::Term(Term::var("k")),
            op: ComparisonOp::Equal,
            right: Operand::Term(Term::Constant(Value::Long(10))),
        });
        let view = TransRuleList::new("v", "g", ViewKind::Virtual, vec![rule]);
        assert!(build(&view).indexes.is_empty());
    }

    #[test]
    fn test_delete_view_has_no_index() {
        let mut rule = knows_rule();
        rule.delete.push("k".to_string());
        let view = TransRuleList::new("v", "g", ViewKind::Virtual, vec![rule]);
        assert!(build(&view).indexes.is_empty());
    }

    #[test]
    fn test_added_elements_over_default_map_have_no_index() {
        let mut rule = knows_rule();
        rule.skolems.push(skolem("f", "friendship", &["a", "b"]));
        rule.skolems.push(skolem("m", "member", &["a", "b"]));
        rule.add = vec![
            PatternAtom::node("f", Some("Friendship")),
            PatternAtom::edge(Some("m"), "a", "f", EdgeLabel::Label("Member".to_string())),
        ];
        let view = TransRuleList::new("v", "g", ViewKind::Virtual, vec![rule]);
        assert!(view.is_default_map);
        assert!(build(&view).indexes.is_empty());
    }

    #[test]
    fn test_label_built_by_two_rules_has_no_index() {
        let mut pairs = knows_rule();
        pairs.skolems.push(skolem("f", "friendship", &["a", "b"]));
        pairs.construct = vec![PatternAtom::node("f", Some("Friendship"))];
        let mut singles = knows_rule();
        singles.skolems.push(skolem("f", "circle", &["a"]));
        singles.construct = vec![PatternAtom::node("f", Some("Friendship"))];

        let view = TransRuleList::new("v", "g", ViewKind::Virtual, vec![pairs.clone(), singles]);
        assert!(build(&view).indexes.is_empty());

        let alone = TransRuleList::new("v", "g", ViewKind::Virtual, vec![pairs]);
        assert_eq!(build(&alone).indexes.len(), 1);
    }

    #[test]
    fn test_type_graph_and_covering() {
        let view = TransRuleList::new("v", "g", ViewKind::Virtual, vec![knows_rule()]);
        let set = build(&view);
        let index = &set.indexes[0];
        let mut expected = SchemaGraph::new();
        expected.add_edge("Person", "Knows", "Person");
        assert_eq!(index.type_graph, expected);

        let mut view_schema = SchemaGraph::new();
        view_schema.add_edge("Person", "Knows", "Person");

        // Same pattern: covered
        assert!(index.covers(&expected, &view_schema));

        // Query about WorksAt edges does not contain the index pattern
        let mut works = SchemaGraph::new();
        works.add_edge("Person", "WorksAt", "Company");
        assert!(!index.covers(&works, &view_schema));

        // Query using a type missing from the view schema
        let mut larger = expected.clone();
        larger.add_edge("Person", "WorksAt", "Company");
        assert!(!index.covers(&larger, &view_schema));
    }

    #[test]
    fn test_pattern_type_graph_wildcards() {
        let atoms = vec![AtomBuilder::new("E_v").any().var("x").var("y").string("Knows").build()];
        let graph = pattern_type_graph(&atoms, "v");
        assert!(graph.edge_types.contains(&crate::schema::EdgeType::new(ANY_LABEL, "Knows", ANY_LABEL)));
    }
}
