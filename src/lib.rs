//! # pgview
//!
//! Views over property graphs, compiled to Datalog.
//!
//! A property graph `g` is stored as four relations: `N_g(id, label)`,
//! `E_g(id, from, to, label)`, `NP_g(id, key, value)` and `EP_g(id, key, value)`.
//! A view is a list of transformation rules (MATCH, WHERE, SET, CONSTRUCT,
//! MAP, ADD, DELETE) over a base graph or another view; it compiles to
//! Datalog clauses defining the same four relations for the view.
//!
//! ## Pipeline
//!
//! ```text
//! Statement text
//!     ↓
//! [Parser]              → Statement (views, queries, DDL)
//!     ↓
//! [View Rule Compiler]  → Datalog clauses + view schema
//!     ↓
//! [SSR Index Builder]   → INDEX_v relations + rewriting rules (optional)
//!     ↓
//! [Query Rewriter]      → SSR rewrite, then unfolding to base relations
//!     ↓
//! [Store / Engine]      → stratified semi-naive evaluation
//!     ↓
//! Answer tuples
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pgview::{Config, Workspace};
//!
//! let mut ws = Workspace::new("demo", Config::default())?;
//! ws.execute(r#"
//!     CREATE GRAPH g;
//!     CREATE NODE Person;
//!     CREATE EDGE Knows(Person -> Person);
//!     INSERT N_g(1, "Person");
//!     INSERT N_g(2, "Person");
//!     INSERT E_g(10, 1, 2, "Knows");
//!     CREATE VIEW v ON g (MATCH (a:Person)-[k:Knows]->(b:Person));
//! "#)?;
//! let outcome = ws.execute("MATCH (a:Person)-[:Knows]->(b:Person) FROM v RETURN (a), (b)")?;
//! ```

pub mod ast;
pub mod catalog;
pub mod compiler;
pub mod config;
pub mod engine;
pub mod error;
pub mod parser;
pub mod program;
pub mod recursion;
pub mod repl;
pub mod rewrite;
pub mod schema;
pub mod ssr;
pub mod store;
pub mod value;
pub mod view;
pub mod workspace;

pub use ast::{Atom, BodyPredicate, Clause, ComparisonOp, Term};
pub use compiler::{compile_query, compile_view, CompiledQuery, CompiledView, GraphQuery};
pub use config::Config;
pub use engine::{Database, Engine, SkolemTable};
pub use error::{
    CatalogError, CompileError, ExecutionError, GraphViewError, ImportError, ParseError, Result,
    RewriteError,
};
pub use parser::{parse_statement, parse_statements, ShowTarget, Statement};
pub use program::{Predicate, PredicateKind, Program};
pub use schema::{SchemaCatalog, SchemaGraph};
pub use ssr::{build_ssr, SsrIndex, SsrIndexSet};
pub use store::{InMemoryStore, Store, StoreKind};
pub use value::{DataType, Relation, Tuple, Value};
pub use view::{TransRule, TransRuleList, ViewKind};
pub use workspace::{Outcome, Workspace, WorkspaceManager};
