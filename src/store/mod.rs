//! Store backends.
//!
//! A [`Store`] holds base and materialized relations and answers queries.
//! Only the in-memory backend ships; SQL and graph-database backends are
//! named so catalogs and configs can refer to them.

pub mod csv;

use crate::ast::Clause;
use crate::engine::{Database, Engine, SkolemTable};
use crate::error::ExecutionError;
use crate::value::{Relation, Tuple};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Backend variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    #[default]
    InMemory,
    SqlBacked,
    GraphDbBacked,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKind::InMemory => write!(f, "in_memory"),
            StoreKind::SqlBacked => write!(f, "sql_backed"),
            StoreKind::GraphDbBacked => write!(f, "graph_db_backed"),
        }
    }
}

/// Common interface for relation stores
pub trait Store: Send + Sync {
    fn kind(&self) -> StoreKind;

    /// Create the base relations of a graph (`N_g`, `E_g`, `NP_g`, `EP_g`)
    fn create_schema(&mut self, relations: &[String]) -> Result<(), ExecutionError>;

    /// Evaluate `clauses` and keep the listed relations as stored tables.
    ///
    /// Used for materialized views and SSR index relations. Existing contents
    /// of the listed relations are replaced.
    fn create_view(
        &mut self,
        clauses: &[Clause],
        relations: &[String],
        skolems: &mut SkolemTable,
    ) -> Result<(), ExecutionError>;

    /// Answer a single flat clause against stored relations
    fn query_result(&self, clause: &Clause) -> Result<Relation, ExecutionError>;

    /// Evaluate a program and return the `answer` relation
    fn query_program(
        &self,
        clauses: &[Clause],
        answer: &str,
        skolems: &mut SkolemTable,
    ) -> Result<Relation, ExecutionError>;

    /// Insert one tuple; returns false if it was already present
    fn add_tuple(&mut self, relation: &str, tuple: Tuple) -> Result<bool, ExecutionError>;

    /// Record an access path over `columns` of `relation`
    fn add_index(&mut self, relation: &str, columns: &[usize]) -> Result<(), ExecutionError>;

    /// Current contents of a stored relation (empty if unknown)
    fn relation(&self, name: &str) -> Relation;

    /// Drop a stored relation; returns whether it existed
    fn drop_relation(&mut self, name: &str) -> bool;
}

/// Open a store of the given kind
pub fn open_store(kind: StoreKind, engine: Engine) -> Result<Box<dyn Store>, ExecutionError> {
    match kind {
        StoreKind::InMemory => Ok(Box::new(InMemoryStore::new(engine))),
        other => Err(ExecutionError::UnsupportedStore(other.to_string())),
    }
}

/// Store evaluating everything with the reference engine
#[derive(Debug, Default)]
pub struct InMemoryStore {
    engine: Engine,
    db: Database,
    arities: HashMap<String, usize>,
    indexes: HashMap<String, BTreeSet<Vec<usize>>>,
}

impl InMemoryStore {
    pub fn new(engine: Engine) -> Self {
        InMemoryStore {
            engine,
            ..Default::default()
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Column sets registered with [`Store::add_index`]
    pub fn indexes(&self, relation: &str) -> Option<&BTreeSet<Vec<usize>>> {
        self.indexes.get(relation)
    }
}

impl Store for InMemoryStore {
    fn kind(&self) -> StoreKind {
        StoreKind::InMemory
    }

    fn create_schema(&mut self, relations: &[String]) -> Result<(), ExecutionError> {
        for relation in relations {
            if !self.db.contains(relation) {
                self.db.set(relation, Relation::new());
            }
        }
        Ok(())
    }

    fn create_view(
        &mut self,
        clauses: &[Clause],
        relations: &[String],
        skolems: &mut SkolemTable,
    ) -> Result<(), ExecutionError> {
        let mut derived = self
            .engine
            .evaluate_program(clauses, &self.db, skolems)
            .map_err(|e| attach_clause(e, clauses))?;
        for relation in relations {
            let tuples = derived.remove(relation).unwrap_or_default();
            tracing::debug!(relation = %relation, tuples = tuples.len(), "relation_materialized");
            self.db.set(relation, tuples);
        }
        Ok(())
    }

    fn query_result(&self, clause: &Clause) -> Result<Relation, ExecutionError> {
        self.engine.evaluate_clause(clause, &self.db)
    }

    fn query_program(
        &self,
        clauses: &[Clause],
        answer: &str,
        skolems: &mut SkolemTable,
    ) -> Result<Relation, ExecutionError> {
        self.engine
            .query(clauses, answer, &self.db, skolems)
            .map_err(|e| attach_clause(e, clauses))
    }

    fn add_tuple(&mut self, relation: &str, tuple: Tuple) -> Result<bool, ExecutionError> {
        let expected = *self
            .arities
            .entry(relation.to_string())
            .or_insert_with(|| tuple.arity());
        if expected != tuple.arity() {
            return Err(ExecutionError::ArityMismatch {
                relation: relation.to_string(),
                expected,
                found: tuple.arity(),
            });
        }
        Ok(self.db.insert(relation, tuple))
    }

    fn add_index(&mut self, relation: &str, columns: &[usize]) -> Result<(), ExecutionError> {
        self.indexes
            .entry(relation.to_string())
            .or_default()
            .insert(columns.to_vec());
        Ok(())
    }

    fn relation(&self, name: &str) -> Relation {
        self.db.get(name).clone()
    }

    fn drop_relation(&mut self, name: &str) -> bool {
        self.arities.remove(name);
        self.indexes.remove(name);
        self.db.remove(name).is_some()
    }
}

/// Stratification failures are reported with the program's first clause
fn attach_clause(err: ExecutionError, clauses: &[Clause]) -> ExecutionError {
    match err {
        ExecutionError::NotStratifiable(message) => ExecutionError::Store {
            clause: clauses.first().map(Clause::to_string).unwrap_or_default(),
            message: format!("not stratifiable: {message}"),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders::ClauseBuilder;
    use crate::value::Value;

    fn tuple(values: &[i64]) -> Tuple {
        Tuple::new(values.iter().map(|&v| Value::Long(v)).collect())
    }

    #[test]
    fn test_add_tuple_checks_arity() {
        let mut store = InMemoryStore::default();
        assert!(store.add_tuple("r", tuple(&[1, 2])).unwrap());
        assert!(!store.add_tuple("r", tuple(&[1, 2])).unwrap());
        assert!(matches!(
            store.add_tuple("r", tuple(&[1])),
            Err(ExecutionError::ArityMismatch { expected: 2, found: 1, .. })
        ));
    }

    #[test]
    fn test_create_view_materializes_listed_relations() {
        let mut store = InMemoryStore::default();
        store.add_tuple("edge", tuple(&[1, 2])).unwrap();
        let clauses = vec![
            ClauseBuilder::new("a").head_vars(["x"]).body_atom("edge", ["x", "_y"]).build(),
            ClauseBuilder::new("b").head_vars(["x"]).body_atom("a", ["x"]).build(),
        ];
        store
            .create_view(&clauses, &["b".to_string()], &mut SkolemTable::new(0))
            .unwrap();
        assert_eq!(store.relation("b").len(), 1);
        assert!(!store.database().contains("a"));
    }

    #[test]
    fn test_drop_relation() {
        let mut store = InMemoryStore::default();
        store.add_tuple("r", tuple(&[1])).unwrap();
        store.add_index("r", &[0]).unwrap();
        assert!(store.drop_relation("r"));
        assert!(store.relation("r").is_empty());
        assert!(store.indexes("r").is_none());
        assert!(!store.drop_relation("r"));
    }

    #[test]
    fn test_unsupported_backends() {
        assert!(open_store(StoreKind::InMemory, Engine::default()).is_ok());
        assert!(matches!(
            open_store(StoreKind::SqlBacked, Engine::default()),
            Err(ExecutionError::UnsupportedStore(name)) if name == "sql_backed"
        ));
    }
}
