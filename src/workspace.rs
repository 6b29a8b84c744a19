//! # Workspaces
//!
//! A [`Workspace`] owns everything one set of graphs and views needs: the
//! Datalog program, graph schemas, compiled views, SSR indexes, the Skolem
//! id table, the relation store, and the persisted catalog. Statements run
//! against one workspace at a time.
//!
//! The [`WorkspaceManager`] hands out independent workspaces behind
//! `Arc<RwLock<_>>` handles so distinct workspaces can be used from
//! different threads.

use crate::ast::{BodyPredicate, Clause};
use crate::catalog::Catalog;
use crate::compiler::{compile_query, compile_view, naming, CompiledView, GraphQuery};
use crate::config::Config;
use crate::engine::{relevant_clauses, Engine, SkolemTable};
use crate::error::{CompileError, GraphViewError, ParseError, Result};
use crate::parser::{parse_statement, parse_statements, IndexTarget, ShowTarget, Statement};
use crate::program::{Predicate, PredicateKind, Program};
use crate::rewrite::{ssr_rewrite, unfold};
use crate::schema::{SchemaCatalog, SchemaGraph};
use crate::ssr::{build_ssr, pattern_type_graph, SsrIndexSet};
use crate::store::csv::load_csv;
use crate::store::{open_store, Store, StoreKind};
use crate::value::{DataType, Relation, Tuple, Value};
use crate::view::{TransRuleList, ViewKind};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Result of executing one statement
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// DDL or insert acknowledgement
    Done(String),
    /// Query answer with the returned variable names as columns
    Rows { columns: Vec<String>, rows: Relation },
    /// Listing produced by `SHOW`
    Lines(Vec<String>),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Done(message) => write!(f, "{message}"),
            Outcome::Rows { columns, rows } => {
                writeln!(f, "({})", columns.join(", "))?;
                for row in rows {
                    writeln!(f, "{row}")?;
                }
                write!(f, "{} row(s)", rows.len())
            }
            Outcome::Lines(lines) => write!(f, "{}", lines.join("\n")),
        }
    }
}

pub struct Workspace {
    name: String,
    config: Config,
    engine: Engine,
    program: Program,
    schemas: SchemaCatalog,
    /// Base graph names, as opposed to views
    graphs: HashSet<String>,
    views: BTreeMap<String, CompiledView>,
    ssr: HashMap<String, SsrIndexSet>,
    /// Views whose SSR indexes predate an insert they read
    stale_ssr: HashSet<String>,
    skolems: SkolemTable,
    store: Box<dyn Store>,
    /// Relations read from the store rather than unfolded
    materialized: HashSet<String>,
    current_graph: Option<String>,
    catalog: Option<Catalog>,
}

impl fmt::Debug for Workspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workspace")
            .field("name", &self.name)
            .field("store", &self.store.kind())
            .field("views", &self.views.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Workspace {
    /// A workspace with an in-memory store and no catalog on disk
    pub fn new(name: &str, config: Config) -> Result<Self> {
        let engine = Engine::new(&config.engine);
        let store = open_store(StoreKind::InMemory, engine.clone())?;
        Ok(Workspace {
            name: name.to_string(),
            skolems: SkolemTable::new(config.engine.skolem_id_base),
            config,
            engine,
            program: Program::new(),
            schemas: SchemaCatalog::new(),
            graphs: HashSet::new(),
            views: BTreeMap::new(),
            ssr: HashMap::new(),
            stale_ssr: HashSet::new(),
            store,
            materialized: HashSet::new(),
            current_graph: None,
            catalog: None,
        })
    }

    /// Open a workspace, restoring its catalog when persistence is enabled.
    ///
    /// Views are recompiled from their stored text in level order; a view or
    /// index that no longer compiles is skipped with a warning.
    pub fn open(name: &str, config: Config) -> Result<Self> {
        let persist = config.storage.persist_catalog;
        let dir = PathBuf::from(&config.storage.data_dir).join(name);
        let base = config.engine.skolem_id_base;
        let mut workspace = Workspace::new(name, config)?;
        if !persist {
            return Ok(workspace);
        }

        let catalog = Catalog::open(&dir, base)?;
        workspace.restore(&catalog)?;
        workspace.catalog = Some(catalog);
        tracing::info!(
            workspace = %name,
            views = workspace.views.len(),
            graphs = workspace.graphs.len(),
            "workspace_opened"
        );
        Ok(workspace)
    }

    fn restore(&mut self, catalog: &Catalog) -> Result<()> {
        for (graph, schema) in catalog.graphs() {
            self.create_graph(graph)?;
            self.schemas.insert(graph, schema.clone());
        }
        self.current_graph = catalog.current_graph().map(str::to_string);
        self.skolems = catalog.skolems().clone();

        for record in catalog.views() {
            let result = parse_statement(&record.query_text).and_then(|statement| match statement {
                Statement::CreateView(view) => self.create_view(view),
                _ => Err(ParseError::Invalid(format!("'{}' is not a view definition", record.name)).into()),
            });
            if let Err(e) = result {
                tracing::warn!(view = %record.name, error = %e, "view_reload_skipped");
            }
        }
        for index in catalog.label_indexes() {
            if let Err(e) = self.create_label_index(&index.view, index.target, &index.label) {
                tracing::warn!(view = %index.view, label = %index.label, error = %e, "index_reload_skipped");
            }
        }
        for index in catalog.ssr_indexes() {
            if self.ssr.contains_key(&index.view) {
                continue;
            }
            if let Err(e) = self.create_ssr_index(&index.view) {
                tracing::warn!(view = %index.view, error = %e, "ssr_index_reload_skipped");
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn schema(&self, graph: &str) -> Option<&SchemaGraph> {
        self.schemas.get(graph)
    }

    pub fn view(&self, name: &str) -> Option<&CompiledView> {
        self.views.get(name)
    }

    pub fn views(&self) -> impl Iterator<Item = &CompiledView> {
        self.views.values()
    }

    pub fn ssr_indexes(&self, view: &str) -> Option<&SsrIndexSet> {
        self.ssr.get(view)
    }

    pub fn skolems(&self) -> &SkolemTable {
        &self.skolems
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn current_graph(&self) -> Option<&str> {
        self.current_graph.as_deref()
    }

    // ------------------------------------------------------------------
    // Schema and data
    // ------------------------------------------------------------------

    /// Declare a base graph and its relations; it becomes the current graph
    pub fn create_graph(&mut self, name: &str) -> Result<()> {
        if self.views.contains_key(name) {
            return Err(CompileError::DuplicateView(name.to_string()).into());
        }
        if self.graphs.insert(name.to_string()) {
            let relations = [
                Predicate::edb(naming::nodes(name), vec![DataType::Long, DataType::String]),
                Predicate::edb(
                    naming::edges(name),
                    vec![DataType::Long, DataType::Long, DataType::Long, DataType::String],
                ),
                // Property values are untyped
                Predicate::new(naming::node_props(name), 3, PredicateKind::Edb),
                Predicate::new(naming::edge_props(name), 3, PredicateKind::Edb),
            ];
            let names: Vec<String> = relations.iter().map(|p| p.name.clone()).collect();
            for predicate in relations {
                self.program.declare(predicate)?;
            }
            self.store.create_schema(&names)?;
            self.schemas.register(name);
            tracing::info!(graph = %name, "graph_created");
        }
        self.current_graph = Some(name.to_string());
        self.sync_graph(name);
        self.persist()
    }

    /// Drop a base graph with its relations; views over it must be dropped first
    pub fn drop_graph(&mut self, name: &str) -> Result<()> {
        if !self.graphs.contains(name) {
            return Err(CompileError::UnknownGraph(name.to_string()).into());
        }
        if let Some(dependent) = self.views.values().find(|v| v.view.base == name) {
            return Err(GraphViewError::GraphInUse {
                graph: name.to_string(),
                dependent: dependent.view.name.clone(),
            });
        }

        let relations: HashSet<String> = [
            naming::nodes(name),
            naming::edges(name),
            naming::node_props(name),
            naming::edge_props(name),
        ]
        .into();
        self.program.remove_relations(&relations);
        for relation in &relations {
            self.store.drop_relation(relation);
        }
        self.schemas.remove(name);
        self.graphs.remove(name);
        if self.current_graph.as_deref() == Some(name) {
            self.current_graph = None;
        }
        if let Some(catalog) = self.catalog.as_mut() {
            catalog.remove_graph(name);
        }
        tracing::info!(graph = %name, "graph_dropped");
        self.persist()
    }

    /// Make an existing base graph the target of schema statements
    pub fn use_graph(&mut self, name: &str) -> Result<()> {
        if !self.graphs.contains(name) {
            return Err(CompileError::UnknownGraph(name.to_string()).into());
        }
        self.current_graph = Some(name.to_string());
        if let Some(catalog) = self.catalog.as_mut() {
            catalog.set_current_graph(name);
        }
        self.persist()
    }

    /// Base graph names, sorted
    pub fn graph_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.graphs.iter().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn graph_or_current(&self, graph: Option<&str>) -> Result<String> {
        let graph = graph
            .or(self.current_graph.as_deref())
            .ok_or_else(|| ParseError::Invalid("no graph given and no current graph".to_string()))?;
        if !self.graphs.contains(graph) {
            return Err(CompileError::UnknownGraph(graph.to_string()).into());
        }
        Ok(graph.to_string())
    }

    /// Declare a node label on a base graph
    pub fn add_schema_node(&mut self, graph: Option<&str>, label: &str) -> Result<()> {
        let graph = self.graph_or_current(graph)?;
        self.schemas.register(&graph).add_node(label);
        self.sync_graph(&graph);
        self.persist()
    }

    /// Declare an edge type `from -[label]-> to` on a base graph
    pub fn add_schema_edge(&mut self, graph: Option<&str>, label: &str, from: &str, to: &str) -> Result<()> {
        let graph = self.graph_or_current(graph)?;
        self.schemas.register(&graph).add_edge(from, label, to);
        self.sync_graph(&graph);
        self.persist()
    }

    fn sync_graph(&mut self, graph: &str) {
        if let (Some(catalog), Some(schema)) = (self.catalog.as_mut(), self.schemas.get(graph)) {
            catalog.set_graph(graph, schema);
            catalog.set_current_graph(graph);
        }
    }

    /// Insert one fact; returns false if it was already present.
    ///
    /// Facts go to stored relations only; relations derived by a view are
    /// rejected.
    pub fn insert(&mut self, relation: &str, values: Vec<Value>) -> Result<bool> {
        if self.program.is_idb(relation) || self.program.is_udf(relation) {
            return Err(ParseError::Invalid(format!("relation '{relation}' is derived and cannot be inserted into")).into());
        }
        let tuple = Tuple::new(values);
        if let Some(predicate) = self.program.predicate(relation) {
            if predicate.arity != tuple.arity() {
                return Err(CompileError::ArityMismatch {
                    predicate: relation.to_string(),
                    expected: predicate.arity,
                    found: tuple.arity(),
                }
                .into());
            }
            let mismatch = predicate
                .column_types
                .iter()
                .zip(tuple.values())
                .find(|(ty, value)| !ty.matches(value));
            if let Some((ty, value)) = mismatch {
                return Err(ParseError::Invalid(format!("{relation}: value {value} is not of type {ty}")).into());
            }
        }
        let added = self.store.add_tuple(relation, tuple)?;
        if added {
            self.mark_stale_ssr(relation);
        }
        Ok(added)
    }

    /// Insert every row of a CSV file into a stored relation; returns how many were new
    pub fn import_csv(&mut self, relation: &str, path: &Path) -> Result<usize> {
        let data = load_csv(path)?;
        let mut added = 0;
        for tuple in data.tuples {
            if self.insert(relation, tuple.into_values())? {
                added += 1;
            }
        }
        tracing::info!(relation = %relation, path = %path.display(), added, "csv_imported");
        Ok(added)
    }

    /// Flag every SSR index set whose creation rules read `relation`
    fn mark_stale_ssr(&mut self, relation: &str) {
        let stale: Vec<String> = self
            .ssr
            .iter()
            .filter(|(view, set)| !self.stale_ssr.contains(*view) && self.ssr_inputs(set).contains(relation))
            .map(|(view, _)| view.clone())
            .collect();
        for view in stale {
            tracing::debug!(view = %view, relation = %relation, "ssr_index_stale");
            self.stale_ssr.insert(view);
        }
    }

    /// Relations read while filling an SSR index set
    fn ssr_inputs(&self, set: &SsrIndexSet) -> HashSet<String> {
        let mut clauses = self.program.clauses().to_vec();
        clauses.extend(set.creation_clauses());
        let relations: Vec<String> = set.relations().into_iter().collect();
        relevant_clauses(&clauses, relations.iter().map(String::as_str))
            .iter()
            .flat_map(|c| c.body.iter().filter_map(BodyPredicate::atom))
            .map(|a| a.relation.clone())
            .collect()
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    /// Compile and install a view.
    ///
    /// Materialized views are evaluated into the store; hybrid views get an
    /// SSR index straight away.
    pub fn create_view(&mut self, mut view: TransRuleList) -> Result<()> {
        if self.views.contains_key(&view.name) || self.graphs.contains(&view.name) {
            return Err(CompileError::DuplicateView(view.name).into());
        }
        view.level = match self.views.get(&view.base) {
            Some(base) => base.view.level + 1,
            None if self.graphs.contains(&view.base) => 1,
            None => return Err(CompileError::UnknownGraph(view.base.clone()).into()),
        };

        let compiled = compile_view(&view, &self.program, &self.schemas)?;
        let mut program = self.program.clone();
        let installed = compiled.install(&mut program)?;
        let previous = std::mem::replace(&mut self.program, program);
        self.schemas.insert(&view.name, compiled.schema.clone());

        let name = view.name.clone();
        let kind = view.kind;
        self.views.insert(name.clone(), compiled);

        let filled = match kind {
            ViewKind::Materialized => self.materialize(&name),
            ViewKind::Hybrid => self.build_ssr_index(&name),
            ViewKind::Virtual => Ok(()),
        };
        if let Err(e) = filled {
            self.abandon_view(&name, previous);
            tracing::warn!(view = %name, error = %e, "view_creation_rolled_back");
            return Err(e);
        }

        if let Some(catalog) = self.catalog.as_mut() {
            catalog.register_view(&view);
            if kind == ViewKind::Hybrid {
                catalog.add_ssr_index(&name, &format!("CREATE SSR INDEX ON {name}"));
            }
        }
        tracing::info!(view = %name, base = %view.base, kind = ?kind, level = view.level, rules = installed, "view_created");
        self.persist()
    }

    /// Undo a view whose evaluation failed before it was registered
    fn abandon_view(&mut self, name: &str, previous: Program) {
        let mut owned: HashSet<String> = self
            .views
            .remove(name)
            .map(|c| c.owned_relations.into_iter().collect())
            .unwrap_or_default();
        if let Some(set) = self.ssr.remove(name) {
            owned.extend(set.relations());
        }
        for relation in &owned {
            self.store.drop_relation(relation);
            self.materialized.remove(relation);
        }
        self.stale_ssr.remove(name);
        self.schemas.remove(name);
        self.program = previous;
    }

    /// Evaluate a materialized view's relations into the store
    fn materialize(&mut self, view: &str) -> Result<()> {
        let relations = [
            naming::nodes(view),
            naming::edges(view),
            naming::node_props(view),
            naming::edge_props(view),
        ];
        let clauses = relevant_clauses(self.program.clauses(), relations.iter().map(String::as_str));
        self.store.create_view(&clauses, &relations, &mut self.skolems)?;
        self.materialized.extend(relations);
        Ok(())
    }

    /// Drop a view with its relations, indexes and Skolem constructors
    pub fn drop_view(&mut self, name: &str) -> Result<()> {
        let Some(compiled) = self.views.get(name) else {
            return Err(GraphViewError::UnknownView(name.to_string()));
        };
        if let Some(dependent) = self.views.values().find(|v| v.view.base == name) {
            return Err(GraphViewError::ViewInUse {
                view: name.to_string(),
                dependent: dependent.view.name.clone(),
            });
        }

        let mut owned: HashSet<String> = compiled.owned_relations.iter().cloned().collect();
        let external = self.program.external_references(&owned);
        if let Some(relation) = external.into_iter().next() {
            return Err(GraphViewError::ViewInUse {
                view: name.to_string(),
                dependent: relation,
            });
        }
        if let Some(set) = self.ssr.remove(name) {
            owned.extend(set.relations());
        }

        let removed = self.program.remove_relations(&owned);
        for relation in &owned {
            self.store.drop_relation(relation);
            self.materialized.remove(relation);
        }
        // Skolem ids survive the drop so a recreated view mints the same ids
        self.stale_ssr.remove(name);
        self.schemas.remove(name);
        self.views.remove(name);
        if let Some(catalog) = self.catalog.as_mut() {
            catalog.remove_view(name);
        }
        tracing::info!(view = %name, clauses = removed, relations = owned.len(), "view_dropped");
        self.persist()
    }

    /// Register a label index on a view's node or edge relation
    pub fn create_label_index(&mut self, view: &str, target: IndexTarget, label: &str) -> Result<()> {
        let schema = self
            .schemas
            .get(view)
            .ok_or_else(|| GraphViewError::UnknownView(view.to_string()))?;
        let (relation, column, known) = match target {
            IndexTarget::Node => (naming::nodes(view), 1, schema.has_node_label(label)),
            IndexTarget::Edge => (naming::edges(view), 3, schema.has_edge_label(label)),
        };
        if !schema.is_empty() && !known {
            return Err(CompileError::UnknownLabel {
                label: label.to_string(),
                graph: view.to_string(),
            }
            .into());
        }
        self.program.add_index_hint(&relation, vec![column])?;
        self.store.add_index(&relation, &[column])?;
        if let Some(catalog) = self.catalog.as_mut() {
            catalog.add_label_index(view, target, label);
        }
        tracing::info!(view = %view, relation = %relation, label = %label, "label_index_created");
        self.persist()
    }

    /// Build and fill the SSR indexes of a view
    pub fn create_ssr_index(&mut self, view: &str) -> Result<()> {
        self.build_ssr_index(view)?;
        if let Some(catalog) = self.catalog.as_mut() {
            catalog.add_ssr_index(view, &format!("CREATE SSR INDEX ON {view}"));
        }
        self.persist()
    }

    fn build_ssr_index(&mut self, view: &str) -> Result<()> {
        let compiled = self
            .views
            .get(view)
            .ok_or_else(|| GraphViewError::UnknownView(view.to_string()))?;
        let set = build_ssr(&compiled.view, compiled)?;
        self.fill_ssr(&set)?;
        tracing::info!(view = %view, indexes = set.indexes.len(), "ssr_index_created");
        self.ssr.insert(view.to_string(), set);
        self.stale_ssr.remove(view);
        Ok(())
    }

    fn fill_ssr(&mut self, set: &SsrIndexSet) -> Result<()> {
        let mut clauses = self.program.clauses().to_vec();
        clauses.extend(set.creation_clauses());
        let relations: Vec<String> = set.relations().into_iter().collect();
        let clauses = relevant_clauses(&clauses, relations.iter().map(String::as_str));
        self.store.create_view(&clauses, &relations, &mut self.skolems)?;
        Ok(())
    }

    /// Re-evaluate materialized views and SSR indexes after base data changed
    pub fn refresh(&mut self) -> Result<usize> {
        let mut order: Vec<(usize, String)> = self
            .views
            .values()
            .filter(|v| v.view.kind == ViewKind::Materialized)
            .map(|v| (v.view.level, v.view.name.clone()))
            .collect();
        order.sort();
        for (_, view) in &order {
            self.materialize(view)?;
        }
        let sets: Vec<SsrIndexSet> = self.ssr.values().cloned().collect();
        for set in &sets {
            self.fill_ssr(set)?;
        }
        self.stale_ssr.clear();
        tracing::info!(views = order.len(), ssr = sets.len(), "workspace_refreshed");
        self.persist()?;
        Ok(order.len() + sets.len())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Answer a graph query over a base graph or view.
    ///
    /// Queries over views with SSR indexes are first rewritten to use them;
    /// a failed rewrite falls back to plain unfolding.
    pub fn query(&mut self, query: &GraphQuery) -> Result<Relation> {
        let compiled = compile_query(query, &self.program, &self.schemas)?;
        let mut clause = compiled.clause;
        if self.config.engine.use_ssr_index {
            self.refill_stale_ssr(&query.graph)?;
            if let Some(rewritten) = self.try_ssr_rewrite(&query.graph, &clause) {
                clause = rewritten;
            }
        }

        let program = unfold(&clause, &compiled.auxiliary, &self.program, &self.materialized)?;
        let before = self.skolems.len();
        let rows = self
            .store
            .query_program(program.clauses(), naming::ANSWER, &mut self.skolems)?;
        tracing::debug!(graph = %query.graph, clauses = program.clauses().len(), tuples = rows.len(), "query_answered");
        if self.skolems.len() != before {
            self.persist()?;
        }
        Ok(rows)
    }

    /// Bring a view's SSR indexes up to date with inserts made since they were filled
    fn refill_stale_ssr(&mut self, view: &str) -> Result<()> {
        if !self.stale_ssr.contains(view) {
            return Ok(());
        }
        if let Some(set) = self.ssr.get(view).cloned() {
            self.fill_ssr(&set)?;
            tracing::debug!(view = %view, "ssr_index_refilled");
        }
        self.stale_ssr.remove(view);
        Ok(())
    }

    fn try_ssr_rewrite(&self, graph: &str, clause: &Clause) -> Option<Clause> {
        if self.stale_ssr.contains(graph) {
            return None;
        }
        let set = self.ssr.get(graph)?;
        let view_schema = self.schemas.get(graph)?;
        let query_types = pattern_type_graph(clause.positive_body_atoms(), graph);
        let rules: Vec<&Clause> = set
            .candidates(&query_types, view_schema)
            .flat_map(|index| index.rewriting_rules())
            .collect();
        if rules.is_empty() {
            return None;
        }
        match ssr_rewrite(clause, &rules, &self.engine) {
            Ok(rewritten) => rewritten,
            Err(e) => {
                tracing::warn!(view = %graph, error = %e, "ssr_rewrite_fallback");
                None
            }
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    /// Parse and run a script, stopping at the first failing statement
    pub fn execute(&mut self, text: &str) -> Result<Vec<Outcome>> {
        parse_statements(text)?
            .into_iter()
            .map(|statement| self.run(statement))
            .collect()
    }

    /// Run one parsed statement
    pub fn run(&mut self, statement: Statement) -> Result<Outcome> {
        let outcome = match statement {
            Statement::CreateGraph(name) => {
                self.create_graph(&name)?;
                Outcome::Done(format!("Graph '{name}' created"))
            }
            Statement::CreateNode { label, graph } => {
                self.add_schema_node(graph.as_deref(), &label)?;
                Outcome::Done(format!("Node label '{label}' declared"))
            }
            Statement::CreateEdge { label, from, to, graph } => {
                self.add_schema_edge(graph.as_deref(), &label, &from, &to)?;
                Outcome::Done(format!("Edge type '{label}({from} -> {to})' declared"))
            }
            Statement::CreateView(view) => {
                let name = view.name.clone();
                self.create_view(view)?;
                Outcome::Done(format!("View '{name}' created"))
            }
            Statement::DropView(name) => {
                self.drop_view(&name)?;
                Outcome::Done(format!("View '{name}' dropped"))
            }
            Statement::DropGraph(name) => {
                self.drop_graph(&name)?;
                Outcome::Done(format!("Graph '{name}' dropped"))
            }
            Statement::UseGraph(name) => {
                self.use_graph(&name)?;
                Outcome::Done(format!("Using graph '{name}'"))
            }
            Statement::Show(target) => Outcome::Lines(self.show(&target)?),
            Statement::ImportCsv { relation, path } => {
                let added = self.import_csv(&relation, &path)?;
                Outcome::Done(format!("Imported {added} fact(s) into {relation}"))
            }
            Statement::Insert { relation, values } => {
                let added = self.insert(&relation, values)?;
                Outcome::Done(if added {
                    format!("Inserted 1 fact into {relation}")
                } else {
                    format!("Fact already present in {relation}")
                })
            }
            Statement::CreateIndex { view, target, label } => {
                self.create_label_index(&view, target, &label)?;
                Outcome::Done(format!("Index on {view}.{label} created"))
            }
            Statement::CreateSsrIndex(view) => {
                self.create_ssr_index(&view)?;
                Outcome::Done(format!("SSR index on '{view}' created"))
            }
            Statement::Query(query) => {
                let rows = self.query(&query)?;
                Outcome::Rows {
                    columns: query.returns,
                    rows,
                }
            }
        };
        Ok(outcome)
    }

    fn show(&self, target: &ShowTarget) -> Result<Vec<String>> {
        let lines = match target {
            ShowTarget::Graphs => self.graph_names().into_iter().map(str::to_string).collect(),
            ShowTarget::Views => self
                .views
                .values()
                .map(|v| format!("{} ON {} ({}, level {})", v.view.name, v.view.base, v.view.kind, v.view.level))
                .collect(),
            ShowTarget::Schema(name) => {
                let name = match name {
                    Some(name) => name.clone(),
                    None => self.graph_or_current(None)?,
                };
                let schema = self
                    .schemas
                    .get(&name)
                    .ok_or_else(|| CompileError::UnknownGraph(name.clone()))?;
                schema
                    .node_labels
                    .iter()
                    .map(|label| format!("NODE {label}"))
                    .chain(
                        schema
                            .edge_types
                            .iter()
                            .map(|e| format!("EDGE {}({} -> {})", e.label, e.from, e.to)),
                    )
                    .collect()
            }
            ShowTarget::Program => self.program.clauses().iter().map(ToString::to_string).collect(),
        };
        Ok(lines)
    }

    fn persist(&mut self) -> Result<()> {
        if let Some(catalog) = self.catalog.as_mut() {
            catalog.set_skolems(&self.skolems);
            catalog.save()?;
        }
        Ok(())
    }
}

/// Shared handle to one workspace
pub type WorkspaceHandle = Arc<RwLock<Workspace>>;

/// Independent workspaces by name
#[derive(Debug)]
pub struct WorkspaceManager {
    config: Config,
    workspaces: RwLock<HashMap<String, WorkspaceHandle>>,
}

impl WorkspaceManager {
    pub fn new(config: Config) -> Self {
        WorkspaceManager {
            config,
            workspaces: RwLock::new(HashMap::new()),
        }
    }

    /// Workspace `name`, opening it on first use
    pub fn open(&self, name: &str) -> Result<WorkspaceHandle> {
        if let Some(handle) = self.workspaces.read().get(name) {
            return Ok(Arc::clone(handle));
        }
        let mut workspaces = self.workspaces.write();
        if let Some(handle) = workspaces.get(name) {
            return Ok(Arc::clone(handle));
        }
        let handle = Arc::new(RwLock::new(Workspace::open(name, self.config.clone())?));
        workspaces.insert(name.to_string(), Arc::clone(&handle));
        Ok(handle)
    }

    pub fn open_default(&self) -> Result<WorkspaceHandle> {
        let name = self.config.storage.default_workspace.clone();
        self.open(&name)
    }

    /// An already open workspace
    pub fn get(&self, name: &str) -> Result<WorkspaceHandle> {
        self.workspaces
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| GraphViewError::UnknownWorkspace(name.to_string()))
    }

    pub fn close(&self, name: &str) -> bool {
        self.workspaces.write().remove(name).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.workspaces.read().keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn long(v: i64) -> Value {
        Value::Long(v)
    }

    fn row(values: &[i64]) -> Tuple {
        Tuple::new(values.iter().map(|&v| Value::Long(v)).collect())
    }

    fn social() -> Workspace {
        let mut ws = Workspace::new("test", Config::default()).unwrap();
        ws.execute(
            r#"
            CREATE GRAPH g;
            CREATE NODE Person;
            CREATE EDGE Knows(Person -> Person);
            INSERT N_g(1, "Person");
            INSERT N_g(2, "Person");
            INSERT N_g(3, "Person");
            INSERT E_g(10, 1, 2, "Knows");
            INSERT E_g(11, 2, 3, "Knows");
            INSERT NP_g(1, "name", "Alice");
            "#,
        )
        .unwrap();
        ws
    }

    fn rows(ws: &mut Workspace, text: &str) -> Relation {
        match ws.execute(text).unwrap().pop() {
            Some(Outcome::Rows { rows, .. }) => rows,
            other => panic!("expected rows, got {other:?}"),
        }
    }

    #[test]
    fn test_query_base_graph() {
        let mut ws = social();
        let answer = rows(&mut ws, "MATCH (a:Person)-[:Knows]->(b:Person) FROM g RETURN (a), (b)");
        assert_eq!(answer, [row(&[1, 2]), row(&[2, 3])].into_iter().collect());
    }

    #[test]
    fn test_delete_view_removes_edge() {
        let mut ws = social();
        ws.execute(
            "CREATE VIEW v ON g (MATCH (a:Person)-[k:Knows]->(b:Person) WHERE k = 10 DELETE k)",
        )
        .unwrap();
        let answer = rows(&mut ws, "MATCH (a:Person)-[:Knows]->(b:Person) FROM v RETURN (a), (b)");
        assert_eq!(answer, [row(&[2, 3])].into_iter().collect());
    }

    #[test]
    fn test_materialized_view_matches_virtual() {
        let mut ws = social();
        ws.execute(
            r#"
            CREATE VIRTUAL VIEW v1 ON g (MATCH (a:Person)-[k:Knows]->(b:Person));
            CREATE MATERIALIZED VIEW v2 ON g (MATCH (a:Person)-[k:Knows]->(b:Person));
            "#,
        )
        .unwrap();
        let q = |v: &str| format!("MATCH (a:Person)-[k:Knows]->(b:Person) FROM {v} RETURN (a), (k), (b)");
        let virtual_rows = rows(&mut ws, &q("v1"));
        let stored_rows = rows(&mut ws, &q("v2"));
        assert_eq!(virtual_rows, stored_rows);
        assert_eq!(virtual_rows.len(), 2);
        assert!(ws.store().relation("E_v2").len() == 2);
    }

    #[test]
    fn test_refresh_picks_up_new_facts() {
        let mut ws = social();
        ws.execute("CREATE MATERIALIZED VIEW m ON g (MATCH (a:Person)-[k:Knows]->(b:Person))")
            .unwrap();
        ws.insert("E_g", vec![long(12), long(3), long(1), Value::string("Knows")])
            .unwrap();
        assert_eq!(ws.store().relation("E_m").len(), 2);
        assert_eq!(ws.refresh().unwrap(), 1);
        assert_eq!(ws.store().relation("E_m").len(), 3);
    }

    #[test]
    fn test_ssr_rewrite_agrees_with_unfolding() {
        let mut ws = social();
        ws.execute("CREATE VIEW v ON g (MATCH (a:Person)-[k:Knows]->(b:Person))")
            .unwrap();
        let query = "MATCH (a:Person)-[k:Knows]->(b:Person) FROM v RETURN (a), (b)";
        let unfolded = rows(&mut ws, query);
        ws.execute("CREATE SSR INDEX ON v").unwrap();
        assert!(ws.ssr_indexes("v").is_some());
        let rewritten = rows(&mut ws, query);
        assert_eq!(unfolded, rewritten);
    }

    #[test]
    fn test_drop_view_in_use_is_rejected() {
        let mut ws = social();
        ws.execute(
            r#"
            CREATE VIEW v ON g (MATCH (a:Person)-[k:Knows]->(b:Person));
            CREATE VIEW w ON v (MATCH (a:Person)-[k:Knows]->(b:Person));
            "#,
        )
        .unwrap();
        assert_eq!(ws.view("w").unwrap().view.level, 2);
        assert!(matches!(ws.drop_view("v"), Err(GraphViewError::ViewInUse { .. })));
        ws.drop_view("w").unwrap();
        ws.drop_view("v").unwrap();
        assert!(ws.view("v").is_none());
        assert!(!ws.program().contains("N_v"));
        assert!(matches!(ws.drop_view("v"), Err(GraphViewError::UnknownView(_))));
    }

    #[test]
    fn test_duplicate_view_and_unknown_base() {
        let mut ws = social();
        ws.execute("CREATE VIEW v ON g (MATCH (a:Person))").unwrap();
        assert!(matches!(
            ws.execute("CREATE VIEW v ON g (MATCH (a:Person))"),
            Err(GraphViewError::Compile(CompileError::DuplicateView(_)))
        ));
        assert!(matches!(
            ws.execute("CREATE VIEW x ON nowhere (MATCH (a:Person))"),
            Err(GraphViewError::Compile(CompileError::UnknownGraph(_)))
        ));
    }

    #[test]
    fn test_insert_into_view_relation_rejected() {
        let mut ws = social();
        ws.execute("CREATE VIEW v ON g (MATCH (a:Person))").unwrap();
        assert!(ws.insert("N_v", vec![long(9), Value::string("Person")]).is_err());
        assert!(matches!(
            ws.insert("N_g", vec![long(9)]),
            Err(GraphViewError::Compile(CompileError::ArityMismatch { .. }))
        ));
        assert!(matches!(
            ws.insert("N_g", vec![Value::string("x"), Value::string("Person")]),
            Err(GraphViewError::Parse(ParseError::Invalid(_)))
        ));
    }

    #[test]
    fn test_label_index_checks_schema() {
        let mut ws = social();
        ws.execute("CREATE VIEW v ON g (MATCH (a:Person)-[k:Knows]->(b:Person))")
            .unwrap();
        ws.execute("CREATE INDEX ON v NODE Person").unwrap();
        assert!(ws.program().predicate("N_v").unwrap().index_hints.contains(&vec![1]));
        assert!(matches!(
            ws.execute("CREATE INDEX ON v EDGE Likes"),
            Err(GraphViewError::Compile(CompileError::UnknownLabel { .. }))
        ));
    }

    #[test]
    fn test_catalog_round_trip() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.storage.data_dir = tmp.path().to_path_buf();

        {
            let mut ws = Workspace::open("w", config.clone()).unwrap();
            ws.execute(
                r#"
                CREATE GRAPH g;
                CREATE NODE Person;
                CREATE EDGE Knows(Person -> Person);
                CREATE VIEW v ON g (MATCH (a:Person)-[k:Knows]->(b:Person));
                CREATE VIEW w ON v (MATCH (a:Person));
                CREATE INDEX ON v NODE Person;
                CREATE SSR INDEX ON v;
                "#,
            )
            .unwrap();
        }

        let ws = Workspace::open("w", config).unwrap();
        assert_eq!(ws.current_graph(), Some("g"));
        assert!(ws.schema("g").unwrap().has_edge_label("Knows"));
        assert!(ws.view("v").is_some());
        assert_eq!(ws.view("w").unwrap().view.level, 2);
        assert!(ws.ssr_indexes("v").is_some());
    }

    #[test]
    fn test_drop_and_use_graph() {
        let mut ws = social();
        ws.execute("CREATE GRAPH h; CREATE NODE City;").unwrap();
        assert_eq!(ws.graph_names(), vec!["g", "h"]);
        assert!(ws.schema("h").unwrap().has_node_label("City"));

        ws.execute("USE GRAPH g; CREATE NODE Company;").unwrap();
        assert_eq!(ws.current_graph(), Some("g"));
        assert!(ws.schema("g").unwrap().has_node_label("Company"));
        assert!(ws.execute("USE GRAPH nowhere").is_err());

        ws.execute("CREATE VIEW v ON g (MATCH (a:Person))").unwrap();
        assert!(matches!(ws.drop_graph("g"), Err(GraphViewError::GraphInUse { .. })));
        ws.execute("DROP VIEW v; DROP GRAPH g;").unwrap();
        assert_eq!(ws.graph_names(), vec!["h"]);
        assert_eq!(ws.current_graph(), None);
        assert!(!ws.program().contains("N_g"));
        assert!(ws.store().relation("E_g").is_empty());
        assert!(ws.execute("DROP GRAPH g").is_err());
    }

    #[test]
    fn test_show_statements() {
        let mut ws = social();
        ws.execute("CREATE MATERIALIZED VIEW v ON g (MATCH (a:Person)-[k:Knows]->(b:Person))")
            .unwrap();
        let lines = |ws: &mut Workspace, text: &str| match ws.execute(text).unwrap().pop() {
            Some(Outcome::Lines(lines)) => lines,
            other => panic!("expected lines, got {other:?}"),
        };
        assert_eq!(lines(&mut ws, "SHOW GRAPHS"), vec!["g"]);
        assert_eq!(lines(&mut ws, "SHOW VIEWS"), vec!["v ON g (materialized, level 1)"]);
        assert_eq!(
            lines(&mut ws, "SHOW SCHEMA"),
            vec!["NODE Person", "EDGE Knows(Person -> Person)"]
        );
        assert_eq!(lines(&mut ws, "SHOW SCHEMA v"), lines(&mut ws, "SHOW SCHEMA g"));
        let program = lines(&mut ws, "SHOW PROGRAM");
        assert_eq!(program.len(), ws.program().clauses().len());
        assert!(program.iter().any(|c| c.contains("MATCH_v_0")));
        assert!(ws.execute("SHOW SCHEMA nowhere").is_err());
    }

    #[test]
    fn test_import_csv() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("edges.csv");
        std::fs::write(&path, "id,from,to,label\n12,3,1,Knows\n10,1,2,Knows\n").unwrap();
        let bad = tmp.path().join("bad.csv");
        std::fs::write(&bad, "id,from\n12,3\n").unwrap();

        let mut ws = social();
        let outcome = ws
            .execute(&format!("IMPORT E_g FROM \"{}\"", path.display()))
            .unwrap()
            .pop();
        assert_eq!(outcome, Some(Outcome::Done("Imported 1 fact(s) into E_g".to_string())));
        assert_eq!(ws.store().relation("E_g").len(), 3);

        assert!(matches!(
            ws.import_csv("E_g", &bad),
            Err(GraphViewError::Compile(CompileError::ArityMismatch { .. }))
        ));
        assert!(matches!(
            ws.import_csv("E_g", &tmp.path().join("absent.csv")),
            Err(GraphViewError::Import(_))
        ));
    }

    #[test]
    fn test_manager_hands_out_shared_handles() {
        let mut config = Config::default();
        config.storage.persist_catalog = false;
        let manager = WorkspaceManager::new(config);
        let a = manager.open("a").unwrap();
        let again = manager.open("a").unwrap();
        assert!(Arc::ptr_eq(&a, &again));
        manager.open_default().unwrap();
        assert_eq!(manager.names(), vec!["a".to_string(), "default".to_string()]);
        a.write().execute("CREATE GRAPH g").unwrap();
        assert_eq!(manager.get("a").unwrap().read().current_graph(), Some("g"));
        assert!(manager.close("a"));
        assert!(matches!(manager.get("a"), Err(GraphViewError::UnknownWorkspace(_))));
    }
}
