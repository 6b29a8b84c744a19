//! Error Types
//!
//! One enum per stage. Compile errors are raised before anything runs, rewrite
//! errors are recoverable (the workspace falls back to unfolding), execution
//! errors carry the failing clause for diagnosis.

use std::io;
use thiserror::Error;

/// Errors raised while turning view definitions and queries into rules
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// A head, negated or compared variable is not bound by a positive atom
    #[error("Rule '{clause}' is not range-restricted: unbound variable(s) {}", .variables.join(", "))]
    UnboundVariable {
        clause: String,
        variables: Vec<String>,
    },

    /// Placeholder in a rule head
    #[error("Rule '{0}' has a placeholder in its head")]
    PlaceholderInHead(String),

    /// Single-node MATCH term with no label
    #[error("Pattern node '{0}' has no label and is not connected to any edge")]
    UnlabeledPattern(String),

    #[error("Label '{label}' is not declared in the schema of '{graph}'")]
    UnknownLabel { label: String, graph: String },

    #[error("Skolem function '{0}' depends on its own output")]
    CyclicSkolem(String),

    /// Skolem argument not produced by MATCH or an earlier binding
    #[error("Skolem function '{function}' argument '{argument}' is not bound by MATCH")]
    UnboundSkolemArgument { function: String, argument: String },

    /// CONSTRUCT, MAP, ADD or DELETE mentions a variable nobody binds
    #[error("View '{view}' uses variable '{variable}' which is not bound by MATCH or SET")]
    UnboundTransformVariable { view: String, variable: String },

    #[error("Unknown predicate: {0}")]
    UnknownPredicate(String),

    #[error("Unknown base graph or view: {0}")]
    UnknownGraph(String),

    #[error("Predicate '{predicate}' has arity {expected}, used with {found} argument(s)")]
    ArityMismatch {
        predicate: String,
        expected: usize,
        found: usize,
    },

    #[error("Invalid path pattern '{pattern}': {reason}")]
    InvalidPathRegex { pattern: String, reason: String },

    #[error("View already exists: {0}")]
    DuplicateView(String),

    #[error("Query must RETURN at least one variable")]
    EmptyReturn,
}

/// Errors raised by the SSR rewrite; callers fall back to unfolding
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RewriteError {
    #[error("Inconsistent substitution for '{variable}': '{first}' vs '{second}'")]
    InconsistentSubstitution {
        variable: String,
        first: String,
        second: String,
    },

    /// A canonical constant did not map back to any query term
    #[error("Canonical constant '{0}' does not correspond to a query term")]
    UnresolvedConstant(String),

    #[error("Rewriting requires a single-head query, got {0} heads")]
    MultiHeadQuery(usize),
}

/// Errors raised while evaluating rules or talking to a store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    /// Store round-trip failure, with the failing clause attached
    #[error("Store error while evaluating '{clause}': {message}")]
    Store { clause: String, message: String },

    #[error("Fixpoint did not converge within {limit} iterations for {}", .relations.join(", "))]
    IterationLimit {
        limit: usize,
        relations: Vec<String>,
    },

    /// Clause the engine refuses to run (unbound head, negation or comparison variable)
    #[error("Invalid clause '{clause}': {message}")]
    InvalidClause { clause: String, message: String },

    #[error("Program is not stratifiable: {0}")]
    NotStratifiable(String),

    #[error("Relation '{relation}' expects {expected} column(s), tuple has {found}")]
    ArityMismatch {
        relation: String,
        expected: usize,
        found: usize,
    },

    #[error("Store backend '{0}' is not available in this build")]
    UnsupportedStore(String),
}

/// Surface-syntax errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Parse error: {0}")]
    Syntax(String),

    #[error("Invalid statement: {0}")]
    Invalid(String),
}

/// Catalog persistence errors
#[derive(Error, Debug)]
pub enum CatalogError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported catalog version {0}")]
    UnsupportedVersion(u32),
}

/// CSV import errors
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Cannot read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Malformed row, with its 1-based line number
    #[error("{path}:{line}: {message}")]
    Row {
        path: String,
        line: usize,
        message: String,
    },
}

/// Top-level error for workspace operations
#[derive(Error, Debug)]
pub enum GraphViewError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Rewrite(#[from] RewriteError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Import(#[from] ImportError),

    #[error("View not found: {0}")]
    UnknownView(String),

    #[error("Cannot drop view '{view}': view '{dependent}' is defined over it")]
    ViewInUse { view: String, dependent: String },

    #[error("Cannot drop graph '{graph}': view '{dependent}' is defined over it")]
    GraphInUse { graph: String, dependent: String },

    #[error("Workspace not found: {0}")]
    UnknownWorkspace(String),
}

pub type Result<T> = std::result::Result<T, GraphViewError>;
