//! # View Definitions
//!
//! A view is an ordered list of transformation rules ([`TransRule`]) over a
//! base graph or another view. Each rule has a MATCH pattern, WHERE
//! conditions, SET Skolem bindings and the transformation clauses CONSTRUCT,
//! MAP, ADD and DELETE.
//!
//! ```text
//! CREATE VIRTUAL VIEW friends ON g (
//!   MATCH (a:Person)-[k:Knows]->(b:Person)
//!   WHERE a.age > 30
//! )
//! ```

pub mod path;

use crate::ast::{ComparisonOp, Term};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

pub use path::{Nfa, PathRegex};

/// How a view is kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewKind {
    /// Computed on demand by unfolding
    #[default]
    Virtual,
    /// Precomputed into the store
    Materialized,
    /// Answered through SSR indexes, unfolded otherwise
    Hybrid,
}

impl ViewKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "virtual" => Some(ViewKind::Virtual),
            "materialized" => Some(ViewKind::Materialized),
            "hybrid" => Some(ViewKind::Hybrid),
            _ => None,
        }
    }
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewKind::Virtual => write!(f, "virtual"),
            ViewKind::Materialized => write!(f, "materialized"),
            ViewKind::Hybrid => write!(f, "hybrid"),
        }
    }
}

/// Label of a pattern edge
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeLabel {
    /// Unlabeled edge: matches any label
    Any,
    Label(String),
    /// Regular path over edge labels
    Path(PathRegex),
}

/// `(var:Label)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeAtom {
    pub var: String,
    pub label: Option<String>,
}

/// `(from)-[var:label]->(to)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeAtom {
    pub var: Option<String>,
    pub from: String,
    pub to: String,
    pub label: EdgeLabel,
}

impl EdgeAtom {
    pub fn is_path(&self) -> bool {
        matches!(self.label, EdgeLabel::Path(_))
    }
}

/// `owner.key = value`, written `{key: value}` inside a node or edge
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyAtom {
    pub owner: String,
    pub key: String,
    pub value: Term,
}

/// One atom of a MATCH, CONSTRUCT or ADD pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatternAtom {
    Node(NodeAtom),
    Edge(EdgeAtom),
    NodeProperty(PropertyAtom),
    EdgeProperty(PropertyAtom),
}

impl PatternAtom {
    pub fn node(var: &str, label: Option<&str>) -> Self {
        PatternAtom::Node(NodeAtom {
            var: var.to_string(),
            label: label.map(str::to_string),
        })
    }

    pub fn edge(var: Option<&str>, from: &str, to: &str, label: EdgeLabel) -> Self {
        PatternAtom::Edge(EdgeAtom {
            var: var.map(str::to_string),
            from: from.to_string(),
            to: to.to_string(),
            label,
        })
    }

    /// Variables mentioned by the atom, in position order
    pub fn variables(&self) -> Vec<String> {
        match self {
            PatternAtom::Node(n) => vec![n.var.clone()],
            PatternAtom::Edge(e) => e
                .var
                .iter()
                .cloned()
                .chain([e.from.clone(), e.to.clone()])
                .collect(),
            PatternAtom::NodeProperty(p) | PatternAtom::EdgeProperty(p) => {
                let mut vars = vec![p.owner.clone()];
                if let Term::Variable(v) = &p.value {
                    vars.push(v.clone());
                }
                vars
            }
        }
    }

    fn rename(&self, map: &HashMap<String, String>) -> PatternAtom {
        let r = |v: &String| map.get(v).cloned().unwrap_or_else(|| v.clone());
        match self {
            PatternAtom::Node(n) => PatternAtom::Node(NodeAtom {
                var: r(&n.var),
                label: n.label.clone(),
            }),
            PatternAtom::Edge(e) => PatternAtom::Edge(EdgeAtom {
                var: e.var.as_ref().map(r),
                from: r(&e.from),
                to: r(&e.to),
                label: e.label.clone(),
            }),
            PatternAtom::NodeProperty(p) => PatternAtom::NodeProperty(PropertyAtom {
                owner: r(&p.owner),
                key: p.key.clone(),
                value: p.value.clone(),
            }),
            PatternAtom::EdgeProperty(p) => PatternAtom::EdgeProperty(PropertyAtom {
                owner: r(&p.owner),
                key: p.key.clone(),
                value: p.value.clone(),
            }),
        }
    }
}

/// A MATCH atom with its polarity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchAtom {
    pub atom: PatternAtom,
    pub negated: bool,
}

/// Operand of a WHERE condition
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operand {
    Term(Term),
    /// `var.key`
    Property { var: String, key: String },
}

/// `left op right` in WHERE
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WhereCond {
    pub left: Operand,
    pub op: ComparisonOp,
    pub right: Operand,
}

/// `SET var = SK(function, args...)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SkolemBinding {
    pub var: String,
    pub function: String,
    pub args: Vec<String>,
}

/// `MAP FROM src TO dst`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MapPair {
    pub from: String,
    pub to: String,
}

/// One transformation rule of a view
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransRule {
    pub pattern: Vec<MatchAtom>,
    pub conditions: Vec<WhereCond>,
    pub skolems: Vec<SkolemBinding>,
    pub construct: Vec<PatternAtom>,
    pub maps: Vec<MapPair>,
    pub add: Vec<PatternAtom>,
    pub delete: Vec<String>,
}

impl TransRule {
    pub fn positive_atoms(&self) -> impl Iterator<Item = &PatternAtom> {
        self.pattern.iter().filter(|m| !m.negated).map(|m| &m.atom)
    }

    /// Whether any of CONSTRUCT, MAP, ADD or DELETE is present
    pub fn has_transformation(&self) -> bool {
        !self.construct.is_empty() || !self.maps.is_empty() || !self.add.is_empty() || !self.delete.is_empty()
    }

    /// Variables referenced outside the MATCH pattern
    fn referenced_variables(&self) -> HashSet<String> {
        let mut vars = HashSet::new();
        for cond in &self.conditions {
            for operand in [&cond.left, &cond.right] {
                match operand {
                    Operand::Term(Term::Variable(v)) => {
                        vars.insert(v.clone());
                    }
                    Operand::Property { var, .. } => {
                        vars.insert(var.clone());
                    }
                    Operand::Term(_) => {}
                }
            }
        }
        for sk in &self.skolems {
            vars.extend(sk.args.iter().cloned());
        }
        for atom in self.construct.iter().chain(&self.add) {
            vars.extend(atom.variables());
        }
        for pair in &self.maps {
            vars.insert(pair.from.clone());
            vars.insert(pair.to.clone());
        }
        vars.extend(self.delete.iter().cloned());
        vars
    }

    /// Head variables of the rule's match relation, in pattern order.
    ///
    /// Node variables and edge variables of non-path edges always appear;
    /// property value variables only when referenced elsewhere in the rule.
    pub fn match_variables(&self) -> Vec<String> {
        let referenced = self.referenced_variables();
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut push = |v: &str| {
            if seen.insert(v.to_string()) {
                out.push(v.to_string());
            }
        };
        for atom in self.positive_atoms() {
            match atom {
                PatternAtom::Node(n) => push(&n.var),
                PatternAtom::Edge(e) => {
                    push(&e.from);
                    if let (Some(v), false) = (&e.var, e.is_path()) {
                        push(v);
                    }
                    push(&e.to);
                }
                PatternAtom::NodeProperty(p) | PatternAtom::EdgeProperty(p) => {
                    push(&p.owner);
                    if let Term::Variable(v) = &p.value {
                        if referenced.contains(v) {
                            push(v);
                        }
                    }
                }
            }
        }
        out
    }

    /// Node variables of positive MATCH atoms, including edge endpoints
    pub fn node_variables(&self) -> BTreeSet<String> {
        let mut vars = BTreeSet::new();
        for atom in self.positive_atoms() {
            match atom {
                PatternAtom::Node(n) => {
                    vars.insert(n.var.clone());
                }
                PatternAtom::Edge(e) => {
                    vars.insert(e.from.clone());
                    vars.insert(e.to.clone());
                }
                PatternAtom::NodeProperty(p) => {
                    vars.insert(p.owner.clone());
                }
                PatternAtom::EdgeProperty(_) => {}
            }
        }
        vars
    }

    /// Edge variables of positive, non-path MATCH edges
    pub fn edge_variables(&self) -> BTreeSet<String> {
        self.positive_atoms()
            .filter_map(|a| match a {
                PatternAtom::Edge(e) if !e.is_path() => e.var.clone(),
                PatternAtom::EdgeProperty(p) => Some(p.owner.clone()),
                _ => None,
            })
            .collect()
    }

    /// Variables introduced by SET bindings
    pub fn new_variables(&self) -> Vec<String> {
        self.skolems.iter().map(|s| s.var.clone()).collect()
    }

    /// The rule's post-image pattern.
    ///
    /// With CONSTRUCT the view holds only what is constructed (plus ADD);
    /// otherwise the positive MATCH atoms with MAP substitutions applied,
    /// DELETE removals dropped and ADD atoms appended. Path edges never
    /// appear in the post-image.
    pub fn pattern_after(&self) -> Vec<PatternAtom> {
        if !self.construct.is_empty() {
            return self.construct.iter().chain(&self.add).cloned().collect();
        }
        let renames: HashMap<String, String> = self
            .maps
            .iter()
            .map(|m| (m.from.clone(), m.to.clone()))
            .collect();
        let deleted: HashSet<&String> = self.delete.iter().collect();
        let mut after: Vec<PatternAtom> = Vec::new();
        for atom in self.positive_atoms() {
            let removed = match atom {
                PatternAtom::Node(n) => deleted.contains(&n.var),
                PatternAtom::Edge(e) => {
                    e.is_path()
                        || e.var.as_ref().is_some_and(|v| deleted.contains(v))
                        || deleted.contains(&e.from)
                        || deleted.contains(&e.to)
                }
                PatternAtom::NodeProperty(p) | PatternAtom::EdgeProperty(p) => deleted.contains(&p.owner),
            };
            if !removed {
                let renamed = atom.rename(&renames);
                if !after.contains(&renamed) {
                    after.push(renamed);
                }
            }
        }
        after.extend(self.add.iter().cloned());
        after
    }

    /// Variables whose identity or presence the rule changes
    pub fn affected_variables(&self) -> BTreeSet<String> {
        let mut vars: BTreeSet<String> = self.delete.iter().cloned().collect();
        for pair in &self.maps {
            vars.insert(pair.from.clone());
            vars.insert(pair.to.clone());
        }
        vars.extend(self.new_variables());
        for atom in self.construct.iter().chain(&self.add) {
            vars.extend(atom.variables());
        }
        vars
    }
}

/// A view: ordered transformation rules plus catalog metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransRuleList {
    pub name: String,
    pub base: String,
    pub kind: ViewKind,
    /// 0 for views over base graphs, parent level + 1 otherwise
    pub level: usize,
    /// Unmapped nodes and edges pass through unchanged
    pub is_default_map: bool,
    pub rules: Vec<TransRule>,
    /// Source text the view was created from, for catalog reload
    pub query_text: String,
}

impl TransRuleList {
    pub fn new(name: &str, base: &str, kind: ViewKind, rules: Vec<TransRule>) -> Self {
        let is_default_map = rules.iter().all(|r| r.construct.is_empty());
        TransRuleList {
            name: name.to_string(),
            base: base.to_string(),
            kind,
            level: 0,
            is_default_map,
            rules,
            query_text: String::new(),
        }
    }

    pub fn with_query_text(mut self, text: &str) -> Self {
        self.query_text = text.to_string();
        self
    }

    /// No rule transforms anything: a pure selection
    pub fn is_selection(&self) -> bool {
        self.rules.iter().all(|r| !r.has_transformation())
    }

    pub fn has_new_variables(&self) -> bool {
        self.rules.iter().any(|r| !r.skolems.is_empty())
    }
}
