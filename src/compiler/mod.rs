//! # View Rule Compiler
//!
//! Turns a [`TransRuleList`] into the Datalog clauses that realize the view
//! over its base graph, and graph queries into `ANSWER` clauses.
//!
//! For a view `v` over base `b`, rule `i` produces:
//!
//! ```datalog
//! MATCH_v_i(vars) :- N_b(..), E_b(..), NP_b(..), comparisons.
//! GENNEWID_CONST_v_f(args) :- MATCH_v_i(vars).
//! GENNEWID_v(x) :- GENNEWID_MAP_v_f(args, x).
//! N_v(x, "L"), E_v(e, x, y, "R") :- MATCH_v_i(vars), GENNEWID_MAP_v_f(args, x).
//! MAP_v(src, dst), MAPPED_v(src) :- MATCH_v_i(vars).
//! N_DEL_v(x) :- MATCH_v_i(vars).
//! ```
//!
//! followed by the default mapping rules (`DMAP_v`) for selection and
//! default-map views and the property propagation rules (`NP_v`, `EP_v`).
//! Path edges compile to a family of `REC_<id>_S<k>` automaton relations.
//!
//! The compiler only reads the [`Program`]; callers install the returned
//! clauses and predicates.

pub mod naming;

use crate::ast::builders::AtomBuilder;
use crate::ast::{Atom, BodyPredicate, Clause, Term};
use crate::error::CompileError;
use crate::program::{validate_clause, Predicate, Program};
use crate::schema::{SchemaCatalog, SchemaGraph};
use crate::view::{
    EdgeAtom, EdgeLabel, MatchAtom, Operand, PathRegex, PatternAtom, SkolemBinding, TransRule,
    TransRuleList, WhereCond,
};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Match relation and Skolem tables of one compiled rule
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub index: usize,
    /// `MATCH_<v>_<i>(vars)`
    pub match_head: Atom,
    /// Base atoms and comparisons defining the match relation
    pub match_body: Vec<BodyPredicate>,
    /// `(new variable, GENNEWID_MAP_<v>_<f>(args.., var))` in dependency order
    pub skolem_atoms: Vec<(String, Atom)>,
}

/// Everything a view contributes to a workspace
#[derive(Debug, Clone)]
pub struct CompiledView {
    pub view: TransRuleList,
    pub clauses: Vec<Clause>,
    /// UDF declarations for Skolem tables
    pub predicates: Vec<Predicate>,
    pub rules: Vec<CompiledRule>,
    /// Label-level shape of the view's post-image
    pub schema: SchemaGraph,
    /// Relations created for this view, dropped with it
    pub owned_relations: BTreeSet<String>,
}

impl CompiledView {
    /// Install the view's predicates and clauses into a program
    pub fn install(&self, program: &mut Program) -> Result<usize, CompileError> {
        for predicate in &self.predicates {
            program.declare(predicate.clone())?;
        }
        program.add_clauses(self.clauses.iter().cloned())
    }
}

/// `MATCH ... FROM g [WHERE ...] RETURN (a), (b)`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphQuery {
    pub graph: String,
    pub pattern: Vec<MatchAtom>,
    pub conditions: Vec<WhereCond>,
    pub returns: Vec<String>,
}

/// An `ANSWER` clause plus the auxiliary path clauses it needs
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    pub clause: Clause,
    pub auxiliary: Vec<Clause>,
}

/// Compile a view against the current program and schemas
pub fn compile_view(
    view: &TransRuleList,
    program: &Program,
    schemas: &SchemaCatalog,
) -> Result<CompiledView, CompileError> {
    let mut compiler = ViewCompiler::new(program, schemas);
    let compiled = compiler.view(view)?;
    tracing::debug!(
        view = %view.name,
        base = %view.base,
        rules = compiled.clauses.len(),
        "view_compiled"
    );
    Ok(compiled)
}

/// Compile a graph query into an `ANSWER` clause
pub fn compile_query(
    query: &GraphQuery,
    program: &Program,
    schemas: &SchemaCatalog,
) -> Result<CompiledQuery, CompileError> {
    let mut compiler = ViewCompiler::new(program, schemas);
    compiler.query(query)
}

/// Per-call compiler state: fresh path ids and fresh variable counter
struct ViewCompiler<'a> {
    schemas: &'a SchemaCatalog,
    next_path: usize,
    fresh: usize,
}

impl<'a> ViewCompiler<'a> {
    fn new(program: &Program, schemas: &'a SchemaCatalog) -> Self {
        // Path ids continue after the highest REC_<id> already in the program
        let next_path = program
            .predicates()
            .filter_map(|p| p.name.strip_prefix("REC_"))
            .filter_map(|rest| rest.split('_').next()?.parse::<usize>().ok())
            .max()
            .map_or(0, |m| m + 1);
        ViewCompiler {
            schemas,
            next_path,
            fresh: 0,
        }
    }

    fn fresh_var(&mut self, hint: &str) -> String {
        self.fresh += 1;
        format!("__{hint}{}", self.fresh)
    }

    fn base_schema(&self, base: &str) -> Result<&'a SchemaGraph, CompileError> {
        self.schemas
            .get(base)
            .ok_or_else(|| CompileError::UnknownGraph(base.to_string()))
    }

    fn check_node_label(&self, schema: &SchemaGraph, base: &str, label: &str) -> Result<(), CompileError> {
        if schema.is_empty() || schema.has_node_label(label) {
            Ok(())
        } else {
            Err(CompileError::UnknownLabel {
                label: label.to_string(),
                graph: base.to_string(),
            })
        }
    }

    fn check_edge_label(&self, schema: &SchemaGraph, base: &str, label: &str) -> Result<(), CompileError> {
        if schema.is_empty() || schema.has_edge_label(label) {
            Ok(())
        } else {
            Err(CompileError::UnknownLabel {
                label: label.to_string(),
                graph: base.to_string(),
            })
        }
    }

    // ------------------------------------------------------------------
    // Pattern bodies
    // ------------------------------------------------------------------

    /// Body atoms for a MATCH pattern plus WHERE conditions over `base`
    fn pattern_body(
        &mut self,
        base: &str,
        pattern: &[MatchAtom],
        conditions: &[WhereCond],
        auxiliary: &mut Vec<Clause>,
    ) -> Result<Vec<BodyPredicate>, CompileError> {
        let schema = self.base_schema(base)?;

        let edge_endpoints: HashSet<&str> = pattern
            .iter()
            .filter_map(|m| match &m.atom {
                PatternAtom::Edge(e) => Some([e.from.as_str(), e.to.as_str()]),
                _ => None,
            })
            .flatten()
            .collect();

        let positive_vars: HashSet<String> = pattern
            .iter()
            .filter(|m| !m.negated)
            .flat_map(|m| m.atom.variables())
            .collect();
        let edge_vars: HashSet<String> = pattern
            .iter()
            .filter_map(|m| match &m.atom {
                PatternAtom::Edge(e) => e.var.clone(),
                PatternAtom::EdgeProperty(p) => Some(p.owner.clone()),
                _ => None,
            })
            .collect();

        let mut body = Vec::new();
        for m in pattern {
            let atom = match &m.atom {
                PatternAtom::Node(n) => match &n.label {
                    Some(label) => {
                        self.check_node_label(schema, base, label)?;
                        AtomBuilder::new(naming::nodes(base)).var(&n.var).string(label).build()
                    }
                    None if edge_endpoints.contains(n.var.as_str()) => continue,
                    None => return Err(CompileError::UnlabeledPattern(n.var.clone())),
                },
                PatternAtom::Edge(e) => match &e.label {
                    EdgeLabel::Path(regex) => {
                        for label in regex.alphabet() {
                            self.check_edge_label(schema, base, &label)?;
                        }
                        let relation = self.path_rules(base, regex, auxiliary);
                        AtomBuilder::new(relation).var(&e.from).var(&e.to).build()
                    }
                    label => {
                        let label_term = match label {
                            EdgeLabel::Label(l) => {
                                self.check_edge_label(schema, base, l)?;
                                Term::string(l)
                            }
                            _ => Term::Placeholder,
                        };
                        let id = e.var.as_deref().map_or(Term::Placeholder, Term::var);
                        AtomBuilder::new(naming::edges(base))
                            .term(id)
                            .var(&e.from)
                            .var(&e.to)
                            .term(label_term)
                            .build()
                    }
                },
                PatternAtom::NodeProperty(p) => AtomBuilder::new(naming::node_props(base))
                    .var(&p.owner)
                    .string(&p.key)
                    .term(p.value.clone())
                    .build(),
                PatternAtom::EdgeProperty(p) => AtomBuilder::new(naming::edge_props(base))
                    .var(&p.owner)
                    .string(&p.key)
                    .term(p.value.clone())
                    .build(),
            };
            if m.negated {
                // Variables nobody binds positively become wildcards
                let args = atom
                    .args
                    .into_iter()
                    .map(|t| match t {
                        Term::Variable(ref v) if !positive_vars.contains(v) => Term::Placeholder,
                        other => other,
                    })
                    .collect();
                body.push(BodyPredicate::Negated(Atom::new(atom.relation, args)));
            } else {
                body.push(BodyPredicate::Positive(atom));
            }
        }

        for cond in conditions {
            let left = self.operand(base, &cond.left, &edge_vars, &mut body);
            let right = self.operand(base, &cond.right, &edge_vars, &mut body);
            body.push(BodyPredicate::Comparison(left, cond.op, right));
        }

        Ok(body)
    }

    /// Resolve a WHERE operand; `var.key` adds a property lookup to the body
    fn operand(
        &mut self,
        base: &str,
        operand: &Operand,
        edge_vars: &HashSet<String>,
        body: &mut Vec<BodyPredicate>,
    ) -> Term {
        match operand {
            Operand::Term(t) => t.clone(),
            Operand::Property { var, key } => {
                let value = self.fresh_var("p");
                let relation = if edge_vars.contains(var) {
                    naming::edge_props(base)
                } else {
                    naming::node_props(base)
                };
                body.push(BodyPredicate::Positive(
                    AtomBuilder::new(relation).var(var).string(key).var(&value).build(),
                ));
                Term::Variable(value)
            }
        }
    }

    /// Emit the automaton relations for a path regex; returns `REC_<id>`
    fn path_rules(&mut self, base: &str, regex: &PathRegex, auxiliary: &mut Vec<Clause>) -> String {
        let id = self.next_path;
        self.next_path += 1;
        let nfa = regex.to_nfa();

        auxiliary.push(Clause::rule(
            AtomBuilder::new(naming::path_state(id, nfa.start)).var("x").var("x").build(),
            vec![BodyPredicate::Positive(
                AtomBuilder::new(naming::nodes(base)).var("x").any().build(),
            )],
        ));
        for t in &nfa.transitions {
            let clause = match &t.label {
                Some(label) => Clause::simple(
                    AtomBuilder::new(naming::path_state(id, t.to)).var("x").var("z").build(),
                    vec![
                        AtomBuilder::new(naming::path_state(id, t.from)).var("x").var("y").build(),
                        AtomBuilder::new(naming::edges(base))
                            .any()
                            .var("y")
                            .var("z")
                            .string(label)
                            .build(),
                    ],
                ),
                None => Clause::simple(
                    AtomBuilder::new(naming::path_state(id, t.to)).var("x").var("y").build(),
                    vec![AtomBuilder::new(naming::path_state(id, t.from)).var("x").var("y").build()],
                ),
            };
            auxiliary.push(clause);
        }
        let relation = naming::path(id);
        auxiliary.push(Clause::simple(
            AtomBuilder::new(&relation).var("x").var("y").build(),
            vec![AtomBuilder::new(naming::path_state(id, nfa.accept)).var("x").var("y").build()],
        ));
        relation
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    fn query(&mut self, query: &GraphQuery) -> Result<CompiledQuery, CompileError> {
        if query.returns.is_empty() {
            return Err(CompileError::EmptyReturn);
        }
        let mut auxiliary = Vec::new();
        let body = self.pattern_body(&query.graph, &query.pattern, &query.conditions, &mut auxiliary)?;
        let head = Atom::new(
            naming::ANSWER,
            query.returns.iter().map(|v| Term::var(v)).collect(),
        );
        let clause = Clause::rule(head, body);
        validate_clause(&clause)?;
        Ok(CompiledQuery { clause, auxiliary })
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    fn view(&mut self, view: &TransRuleList) -> Result<CompiledView, CompileError> {
        let base_schema = self.base_schema(&view.base)?.clone();
        let v = view.name.as_str();
        let b = view.base.as_str();

        let mut clauses = Vec::new();
        let mut auxiliary = Vec::new();
        let mut predicates: BTreeMap<String, Predicate> = BTreeMap::new();
        let mut rules = Vec::new();

        for (i, rule) in view.rules.iter().enumerate() {
            let compiled = self.match_rule(view, i, rule, &mut auxiliary, &mut clauses, &mut predicates)?;
            self.transform_rules(view, rule, &compiled, &mut clauses)?;
            rules.push(compiled);
        }

        if view.is_selection() {
            for (rule, compiled) in view.rules.iter().zip(&rules) {
                for x in rule.node_variables() {
                    clauses.push(Clause::simple(
                        AtomBuilder::new(naming::default_map(v)).var(&x).var(&x).build(),
                        vec![compiled.match_head.clone()],
                    ));
                }
            }
            clauses.push(
                Clause::rule(
                    AtomBuilder::new(naming::nodes(v)).vars(["x", "l"]).build(),
                    vec![
                        BodyPredicate::Positive(AtomBuilder::new(naming::nodes(b)).vars(["x", "l"]).build()),
                        BodyPredicate::Positive(AtomBuilder::new(naming::default_map(v)).var("x").any().build()),
                        BodyPredicate::Negated(AtomBuilder::new(naming::deleted_nodes(v)).var("x").build()),
                    ],
                ),
            );
            clauses.push(default_edge_rule(v, b));
        } else if view.is_default_map {
            clauses.push(Clause::rule(
                AtomBuilder::new(naming::default_map(v)).vars(["x", "x"]).build(),
                vec![
                    BodyPredicate::Positive(AtomBuilder::new(naming::nodes(b)).var("x").any().build()),
                    BodyPredicate::Negated(AtomBuilder::new(naming::mapped(v)).var("x").build()),
                    BodyPredicate::Negated(AtomBuilder::new(naming::deleted_nodes(v)).var("x").build()),
                ],
            ));
            clauses.push(Clause::simple(
                AtomBuilder::new(naming::default_map(v)).vars(["x", "y"]).build(),
                vec![AtomBuilder::new(naming::map(v)).vars(["x", "y"]).build()],
            ));
            clauses.push(Clause::simple(
                AtomBuilder::new(naming::nodes(v)).vars(["x", "l"]).build(),
                vec![
                    AtomBuilder::new(naming::nodes(b)).vars(["x", "l"]).build(),
                    AtomBuilder::new(naming::default_map(v)).vars(["x", "x"]).build(),
                ],
            ));
            clauses.push(default_edge_rule(v, b));
        }

        clauses.push(Clause::simple(
            AtomBuilder::new(naming::node_props(v)).vars(["x", "k", "val"]).build(),
            vec![
                AtomBuilder::new(naming::nodes(v)).var("x").any().build(),
                AtomBuilder::new(naming::node_props(b)).vars(["x", "k", "val"]).build(),
            ],
        ));
        clauses.push(Clause::simple(
            AtomBuilder::new(naming::edge_props(v)).vars(["e", "k", "val"]).build(),
            vec![
                AtomBuilder::new(naming::edges(v)).var("e").any().any().any().build(),
                AtomBuilder::new(naming::edge_props(b)).vars(["e", "k", "val"]).build(),
            ],
        ));

        // Path automata first: later clauses consume them
        let mut all = auxiliary;
        all.extend(clauses);
        for clause in &all {
            validate_clause(clause)?;
        }

        let mut owned: BTreeSet<String> = all
            .iter()
            .flat_map(|c| c.head_relations().map(str::to_string))
            .collect();
        owned.extend(predicates.keys().cloned());
        owned.extend([
            naming::deleted_nodes(v),
            naming::deleted_edges(v),
            naming::mapped(v),
            naming::map(v),
            naming::default_map(v),
            naming::nodes(v),
            naming::edges(v),
            naming::node_props(v),
            naming::edge_props(v),
        ]);

        let schema = derive_schema(view, &base_schema);

        Ok(CompiledView {
            view: view.clone(),
            clauses: all,
            predicates: predicates.into_values().collect(),
            rules,
            schema,
            owned_relations: owned,
        })
    }

    /// Emit the match relation and Skolem argument rules of rule `i`
    fn match_rule(
        &mut self,
        view: &TransRuleList,
        i: usize,
        rule: &TransRule,
        auxiliary: &mut Vec<Clause>,
        clauses: &mut Vec<Clause>,
        predicates: &mut BTreeMap<String, Predicate>,
    ) -> Result<CompiledRule, CompileError> {
        let v = view.name.as_str();
        let body = self.pattern_body(&view.base, &rule.pattern, &rule.conditions, auxiliary)?;
        let vars = rule.match_variables();
        let match_head = Atom::new(
            naming::match_relation(v, i),
            vars.iter().map(|x| Term::var(x)).collect(),
        );
        clauses.push(Clause::rule(match_head.clone(), body.clone()));

        let matched: HashSet<&str> = vars.iter().map(String::as_str).collect();
        let ordered = order_skolems(&rule.skolems, &matched)?;

        let mut skolem_atoms: Vec<(String, Atom)> = Vec::new();
        for binding in ordered {
            if matched.contains(binding.var.as_str()) {
                return Err(CompileError::CyclicSkolem(binding.function.clone()));
            }
            let table = naming::skolem_table(v, &binding.function);
            let args: Vec<Term> = binding.args.iter().map(|a| Term::var(a)).collect();

            // Arguments that are themselves new ids need their tables in the body
            let mut arg_body = vec![BodyPredicate::Positive(match_head.clone())];
            for (var, atom) in &skolem_atoms {
                if binding.args.contains(var) {
                    arg_body.push(BodyPredicate::Positive(atom.clone()));
                }
            }
            clauses.push(Clause::rule(
                Atom::new(naming::skolem_args(v, &binding.function), args.clone()),
                arg_body,
            ));

            let mut table_args = args;
            table_args.push(Term::var(&binding.var));
            let table_atom = Atom::new(&table, table_args);
            clauses.push(Clause::simple(
                AtomBuilder::new(naming::new_ids(v)).var(&binding.var).build(),
                vec![table_atom.clone()],
            ));
            predicates
                .entry(table.clone())
                .or_insert_with(|| Predicate::udf(&table, binding.args.len() + 1));
            skolem_atoms.push((binding.var.clone(), table_atom));
        }

        Ok(CompiledRule {
            index: i,
            match_head,
            match_body: body,
            skolem_atoms,
        })
    }

    /// CONSTRUCT, ADD, MAP and DELETE rules for one compiled rule
    fn transform_rules(
        &mut self,
        view: &TransRuleList,
        rule: &TransRule,
        compiled: &CompiledRule,
        clauses: &mut Vec<Clause>,
    ) -> Result<(), CompileError> {
        let v = view.name.as_str();
        let b = view.base.as_str();
        let matched: HashSet<String> = rule.match_variables().into_iter().collect();
        let new_vars: HashSet<String> = rule.new_variables().into_iter().collect();
        let node_vars = rule.node_variables();
        let edge_vars = rule.edge_variables();

        let require = |var: &str| -> Result<(), CompileError> {
            if matched.contains(var) || new_vars.contains(var) {
                Ok(())
            } else {
                Err(CompileError::UnboundTransformVariable {
                    view: v.to_string(),
                    variable: var.to_string(),
                })
            }
        };

        let mut body = vec![BodyPredicate::Positive(compiled.match_head.clone())];
        body.extend(
            compiled
                .skolem_atoms
                .iter()
                .map(|(_, atom)| BodyPredicate::Positive(atom.clone())),
        );

        let produced: Vec<&PatternAtom> = rule.construct.iter().chain(&rule.add).collect();
        // Nodes whose bare mention adds nothing: labelled elsewhere, or an edge endpoint
        let mut placed: HashSet<&str> = HashSet::new();
        for atom in &produced {
            match atom {
                PatternAtom::Node(n) if n.label.is_some() => {
                    placed.insert(n.var.as_str());
                }
                PatternAtom::Edge(e) => {
                    placed.insert(e.from.as_str());
                    placed.insert(e.to.as_str());
                }
                _ => {}
            }
        }
        if !produced.is_empty() {
            let mut heads = Vec::new();
            let mut extra = Vec::new();
            for atom in produced {
                match atom {
                    PatternAtom::Node(n) => {
                        require(&n.var)?;
                        let label = match &n.label {
                            Some(l) => Term::string(l),
                            None if placed.contains(n.var.as_str()) && !matched.contains(&n.var) => continue,
                            None if matched.contains(&n.var) => {
                                let l = self.fresh_var("l");
                                extra.push(BodyPredicate::Positive(
                                    AtomBuilder::new(naming::nodes(b)).var(&n.var).var(&l).build(),
                                ));
                                Term::Variable(l)
                            }
                            None => return Err(CompileError::UnlabeledPattern(n.var.clone())),
                        };
                        heads.push(AtomBuilder::new(naming::nodes(v)).var(&n.var).term(label).build());
                    }
                    PatternAtom::Edge(e) => {
                        heads.push(self.constructed_edge(v, b, e, &matched, &mut extra, &require)?);
                    }
                    PatternAtom::NodeProperty(p) | PatternAtom::EdgeProperty(p) => {
                        require(&p.owner)?;
                        if let Term::Variable(value) = &p.value {
                            require(value)?;
                        }
                        let relation = if matches!(atom, PatternAtom::NodeProperty(_)) {
                            naming::node_props(v)
                        } else {
                            naming::edge_props(v)
                        };
                        heads.push(
                            AtomBuilder::new(relation)
                                .var(&p.owner)
                                .string(&p.key)
                                .term(p.value.clone())
                                .build(),
                        );
                    }
                }
            }
            let mut clause_body = body.clone();
            clause_body.extend(extra);
            clauses.push(Clause::new(heads, clause_body));
        }

        for pair in &rule.maps {
            require(&pair.from)?;
            require(&pair.to)?;
            clauses.push(Clause::new(
                vec![
                    AtomBuilder::new(naming::map(v)).var(&pair.from).var(&pair.to).build(),
                    AtomBuilder::new(naming::mapped(v)).var(&pair.from).build(),
                ],
                body.clone(),
            ));
        }

        for var in &rule.delete {
            let relation = if edge_vars.contains(var) {
                naming::deleted_edges(v)
            } else if node_vars.contains(var) {
                naming::deleted_nodes(v)
            } else {
                return Err(CompileError::UnboundTransformVariable {
                    view: v.to_string(),
                    variable: var.clone(),
                });
            };
            clauses.push(Clause::simple(
                AtomBuilder::new(relation).var(var).build(),
                vec![compiled.match_head.clone()],
            ));
        }

        Ok(())
    }

    fn constructed_edge(
        &mut self,
        v: &str,
        b: &str,
        e: &EdgeAtom,
        matched: &HashSet<String>,
        extra: &mut Vec<BodyPredicate>,
        require: &dyn Fn(&str) -> Result<(), CompileError>,
    ) -> Result<Atom, CompileError> {
        let id = e.var.as_deref().ok_or_else(|| CompileError::UnboundTransformVariable {
            view: v.to_string(),
            variable: format!("{}->{}", e.from, e.to),
        })?;
        require(id)?;
        require(&e.from)?;
        require(&e.to)?;
        let label = match &e.label {
            EdgeLabel::Label(l) => Term::string(l),
            EdgeLabel::Any if matched.contains(id) => {
                let l = self.fresh_var("l");
                extra.push(BodyPredicate::Positive(
                    AtomBuilder::new(naming::edges(b)).var(id).any().any().var(&l).build(),
                ));
                Term::Variable(l)
            }
            EdgeLabel::Any => return Err(CompileError::UnlabeledPattern(id.to_string())),
            EdgeLabel::Path(regex) => {
                return Err(CompileError::InvalidPathRegex {
                    pattern: regex.to_string(),
                    reason: "path patterns cannot be constructed".to_string(),
                })
            }
        };
        Ok(AtomBuilder::new(naming::edges(v))
            .var(id)
            .var(&e.from)
            .var(&e.to)
            .term(label)
            .build())
    }
}

/// `E_v(e, f2, t2, l) :- E_b(e, f, t, l), DMAP_v(f, f2), DMAP_v(t, t2), !E_DEL_v(e).`
fn default_edge_rule(v: &str, b: &str) -> Clause {
    Clause::rule(
        AtomBuilder::new(naming::edges(v)).vars(["e", "f2", "t2", "l"]).build(),
        vec![
            BodyPredicate::Positive(AtomBuilder::new(naming::edges(b)).vars(["e", "f", "t", "l"]).build()),
            BodyPredicate::Positive(AtomBuilder::new(naming::default_map(v)).vars(["f", "f2"]).build()),
            BodyPredicate::Positive(AtomBuilder::new(naming::default_map(v)).vars(["t", "t2"]).build()),
            BodyPredicate::Negated(AtomBuilder::new(naming::deleted_edges(v)).var("e").build()),
        ],
    )
}

/// Order SET bindings so every argument is bound before use.
///
/// Arguments must be MATCH variables or variables of earlier bindings; a
/// binding reachable from its own output is a cycle.
fn order_skolems<'b>(
    bindings: &'b [SkolemBinding],
    matched: &HashSet<&str>,
) -> Result<Vec<&'b SkolemBinding>, CompileError> {
    let by_var: HashMap<&str, &SkolemBinding> = bindings.iter().map(|b| (b.var.as_str(), b)).collect();
    for binding in bindings {
        for arg in &binding.args {
            if !matched.contains(arg.as_str()) && !by_var.contains_key(arg.as_str()) {
                return Err(CompileError::UnboundSkolemArgument {
                    function: binding.function.clone(),
                    argument: arg.clone(),
                });
            }
        }
    }

    // 0 = unvisited, 1 = in progress, 2 = done
    fn visit<'b>(
        binding: &'b SkolemBinding,
        by_var: &HashMap<&str, &'b SkolemBinding>,
        state: &mut HashMap<&'b str, u8>,
        out: &mut Vec<&'b SkolemBinding>,
    ) -> Result<(), CompileError> {
        match state.get(binding.var.as_str()) {
            Some(2) => return Ok(()),
            Some(1) => return Err(CompileError::CyclicSkolem(binding.function.clone())),
            _ => {}
        }
        state.insert(binding.var.as_str(), 1);
        for arg in &binding.args {
            if let Some(dep) = by_var.get(arg.as_str()) {
                visit(dep, by_var, state, out)?;
            }
        }
        state.insert(binding.var.as_str(), 2);
        out.push(binding);
        Ok(())
    }

    let mut state = HashMap::new();
    let mut out = Vec::new();
    for binding in bindings {
        visit(binding, &by_var, &mut state, &mut out)?;
    }
    Ok(out)
}

/// Schema of a view's post-image.
///
/// Default-map and selection views start from the base schema; every view
/// adds the node labels and edge types its rules construct or add, with
/// endpoint labels resolved from the rule's own atoms.
fn derive_schema(view: &TransRuleList, base: &SchemaGraph) -> SchemaGraph {
    let mut schema = if view.is_default_map {
        base.clone()
    } else {
        SchemaGraph::new()
    };
    for rule in &view.rules {
        let mut labels: HashMap<&str, &str> = HashMap::new();
        let atoms: Vec<&PatternAtom> = rule
            .positive_atoms()
            .chain(rule.construct.iter())
            .chain(rule.add.iter())
            .collect();
        for atom in &atoms {
            if let PatternAtom::Node(n) = atom {
                if let Some(l) = &n.label {
                    labels.insert(n.var.as_str(), l.as_str());
                }
            }
        }
        for atom in rule.construct.iter().chain(&rule.add) {
            match atom {
                PatternAtom::Node(n) => {
                    if let Some(l) = n.label.as_deref().or_else(|| labels.get(n.var.as_str()).copied()) {
                        schema.add_node(l);
                    }
                }
                PatternAtom::Edge(EdgeAtom {
                    from,
                    to,
                    label: EdgeLabel::Label(l),
                    ..
                }) => {
                    if let (Some(f), Some(t)) = (labels.get(from.as_str()), labels.get(to.as_str())) {
                        schema.add_edge(f, l, t);
                    }
                }
                _ => {}
            }
        }
    }
    schema
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ComparisonOp;
    use crate::view::{MapPair, ViewKind};

    fn catalog() -> SchemaCatalog {
        let mut schemas = SchemaCatalog::new();
        let g = schemas.register("g");
        g.add_edge("Person", "Knows", "Person");
        g.add_edge("Person", "WorksFor", "Company");
        schemas
    }

    fn m(atom: PatternAtom) -> MatchAtom {
        MatchAtom { atom, negated: false }
    }

    fn knows_pattern() -> Vec<MatchAtom> {
        vec![
            m(PatternAtom::node("a", Some("Person"))),
            m(PatternAtom::edge(Some("k"), "a", "b", EdgeLabel::Label("Knows".into()))),
            m(PatternAtom::node("b", Some("Person"))),
        ]
    }

    #[test]
    fn test_selection_view_emits_default_rules() {
        let view = TransRuleList::new(
            "v",
            "g",
            ViewKind::Virtual,
            vec![TransRule {
                pattern: knows_pattern(),
                ..TransRule::default()
            }],
        );
        let compiled = compile_view(&view, &Program::new(), &catalog()).unwrap();
        assert!(compiled.clauses.iter().any(|c| c.defines("N_v")));
        assert!(compiled.clauses.iter().any(|c| c.defines("E_v")));
        assert!(compiled.clauses.iter().any(|c| c.defines("DMAP_v")));
        assert!(compiled.clauses.iter().all(Clause::is_safe));
        assert_eq!(compiled.rules[0].match_head.to_string(), "MATCH_v_0(a, k, b)");
    }

    #[test]
    fn test_unknown_label_rejected() {
        let view = TransRuleList::new(
            "v",
            "g",
            ViewKind::Virtual,
            vec![TransRule {
                pattern: vec![m(PatternAtom::node("a", Some("Robot")))],
                ..TransRule::default()
            }],
        );
        let err = compile_view(&view, &Program::new(), &catalog()).unwrap_err();
        assert!(matches!(err, CompileError::UnknownLabel { .. }));
    }

    #[test]
    fn test_unlabeled_single_node_rejected() {
        let view = TransRuleList::new(
            "v",
            "g",
            ViewKind::Virtual,
            vec![TransRule {
                pattern: vec![m(PatternAtom::node("a", None))],
                ..TransRule::default()
            }],
        );
        assert_eq!(
            compile_view(&view, &Program::new(), &catalog()).unwrap_err(),
            CompileError::UnlabeledPattern("a".into())
        );
    }

    #[test]
    fn test_unknown_base_rejected() {
        let view = TransRuleList::new("v", "nowhere", ViewKind::Virtual, vec![TransRule::default()]);
        assert_eq!(
            compile_view(&view, &Program::new(), &catalog()).unwrap_err(),
            CompileError::UnknownGraph("nowhere".into())
        );
    }

    #[test]
    fn test_skolem_rules() {
        let rule = TransRule {
            pattern: knows_pattern(),
            skolems: vec![SkolemBinding {
                var: "f".into(),
                function: "friend".into(),
                args: vec!["a".into(), "b".into()],
            }],
            construct: vec![
                PatternAtom::node("f", Some("Friendship")),
                PatternAtom::node("a", None),
            ],
            ..TransRule::default()
        };
        let view = TransRuleList::new("v", "g", ViewKind::Virtual, vec![rule]);
        let compiled = compile_view(&view, &Program::new(), &catalog()).unwrap();

        let text: Vec<String> = compiled.clauses.iter().map(ToString::to_string).collect();
        assert!(text.contains(&"GENNEWID_CONST_v_friend(a, b) :- MATCH_v_0(a, k, b).".to_string()));
        assert!(text.contains(&"GENNEWID_v(f) :- GENNEWID_MAP_v_friend(a, b, f).".to_string()));
        assert!(compiled.predicates.iter().any(|p| p.name == "GENNEWID_MAP_v_friend" && p.arity == 3));
        assert!(!compiled.clauses.iter().any(|c| c.defines("DMAP_v")));
        assert!(compiled.schema.has_node_label("Friendship"));
        assert!(compiled.schema.has_node_label("Person"));
    }

    #[test]
    fn test_constructed_edge_endpoint_takes_label_from_construct() {
        let rule = TransRule {
            pattern: knows_pattern(),
            skolems: vec![
                SkolemBinding {
                    var: "f".into(),
                    function: "friendship".into(),
                    args: vec!["a".into(), "b".into()],
                },
                SkolemBinding {
                    var: "m".into(),
                    function: "member".into(),
                    args: vec!["a".into(), "f".into()],
                },
            ],
            construct: vec![
                PatternAtom::node("f", Some("Friendship")),
                PatternAtom::node("a", None),
                PatternAtom::edge(Some("m"), "a", "f", EdgeLabel::Label("Member".into())),
                PatternAtom::node("f", None),
            ],
            ..TransRule::default()
        };
        let view = TransRuleList::new("v", "g", ViewKind::Virtual, vec![rule]);
        let compiled = compile_view(&view, &Program::new(), &catalog()).unwrap();

        let construct = compiled
            .clauses
            .iter()
            .find(|c| c.defines("E_v"))
            .expect("construct clause");
        let f_heads = construct
            .heads
            .iter()
            .filter(|h| h.relation == "N_v" && h.args[0] == Term::var("f"))
            .count();
        assert_eq!(f_heads, 1);
        assert!(compiled.schema.has_edge_label("Member"));
        assert!(compiled.schema.has_node_label("Friendship"));
    }

    #[test]
    fn test_cyclic_skolem_rejected() {
        let rule = TransRule {
            pattern: knows_pattern(),
            skolems: vec![
                SkolemBinding {
                    var: "x".into(),
                    function: "f".into(),
                    args: vec!["y".into()],
                },
                SkolemBinding {
                    var: "y".into(),
                    function: "g".into(),
                    args: vec!["x".into()],
                },
            ],
            construct: vec![PatternAtom::node("x", Some("Person"))],
            ..TransRule::default()
        };
        let view = TransRuleList::new("v", "g", ViewKind::Virtual, vec![rule]);
        assert!(matches!(
            compile_view(&view, &Program::new(), &catalog()),
            Err(CompileError::CyclicSkolem(_))
        ));
    }

    #[test]
    fn test_unbound_skolem_argument_rejected() {
        let rule = TransRule {
            pattern: knows_pattern(),
            skolems: vec![SkolemBinding {
                var: "x".into(),
                function: "f".into(),
                args: vec!["zzz".into()],
            }],
            construct: vec![PatternAtom::node("x", Some("Person"))],
            ..TransRule::default()
        };
        let view = TransRuleList::new("v", "g", ViewKind::Virtual, vec![rule]);
        assert!(matches!(
            compile_view(&view, &Program::new(), &catalog()),
            Err(CompileError::UnboundSkolemArgument { .. })
        ));
    }

    #[test]
    fn test_construct_unbound_variable_rejected() {
        let rule = TransRule {
            pattern: knows_pattern(),
            construct: vec![PatternAtom::node("ghost", Some("Person"))],
            ..TransRule::default()
        };
        let view = TransRuleList::new("v", "g", ViewKind::Virtual, vec![rule]);
        assert!(matches!(
            compile_view(&view, &Program::new(), &catalog()),
            Err(CompileError::UnboundTransformVariable { .. })
        ));
    }

    #[test]
    fn test_delete_and_map_rules() {
        let rule = TransRule {
            pattern: knows_pattern(),
            maps: vec![MapPair {
                from: "b".into(),
                to: "a".into(),
            }],
            delete: vec!["k".into()],
            ..TransRule::default()
        };
        let view = TransRuleList::new("v", "g", ViewKind::Virtual, vec![rule]);
        let compiled = compile_view(&view, &Program::new(), &catalog()).unwrap();
        let text: Vec<String> = compiled.clauses.iter().map(ToString::to_string).collect();
        assert!(text.contains(&"E_DEL_v(k) :- MATCH_v_0(a, k, b).".to_string()));
        assert!(text.contains(&"MAP_v(b, a), MAPPED_v(b) :- MATCH_v_0(a, k, b).".to_string()));
        assert!(compiled.clauses.iter().any(|c| c.defines("DMAP_v")));
    }

    #[test]
    fn test_path_edge_compiles_to_automaton() {
        let pattern = vec![
            m(PatternAtom::node("a", Some("Person"))),
            m(PatternAtom::edge(
                None,
                "a",
                "b",
                EdgeLabel::Path(PathRegex::parse("(Knows)*").unwrap()),
            )),
        ];
        let query = GraphQuery {
            graph: "g".into(),
            pattern,
            conditions: vec![],
            returns: vec!["a".into(), "b".into()],
        };
        let compiled = compile_query(&query, &Program::new(), &catalog()).unwrap();
        assert_eq!(
            compiled.clause.to_string(),
            "ANSWER(a, b) :- N_g(a, \"Person\"), REC_0(a, b)."
        );
        assert!(compiled
            .auxiliary
            .iter()
            .any(|c| c.to_string() == "REC_0_S0(x, x) :- N_g(x, _)."));
        assert!(compiled.auxiliary.iter().any(|c| c.defines("REC_0")));
    }

    #[test]
    fn test_where_property_lookup() {
        let query = GraphQuery {
            graph: "g".into(),
            pattern: vec![m(PatternAtom::node("a", Some("Person")))],
            conditions: vec![WhereCond {
                left: Operand::Property {
                    var: "a".into(),
                    key: "age".into(),
                },
                op: ComparisonOp::GreaterThan,
                right: Operand::Term(Term::Constant(crate::value::Value::Int(30))),
            }],
            returns: vec!["a".into()],
        };
        let compiled = compile_query(&query, &Program::new(), &catalog()).unwrap();
        assert_eq!(
            compiled.clause.to_string(),
            "ANSWER(a) :- N_g(a, \"Person\"), NP_g(a, \"age\", __p1), __p1 > 30."
        );
    }
}
