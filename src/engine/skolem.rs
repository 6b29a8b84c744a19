//! Skolem identity table.
//!
//! Maps `(constructor, argument tuple)` to a node or edge id. Ids are
//! allocated monotonically from a configurable base and never reused, so
//! re-evaluating a view against unchanged data yields the same ids.

use crate::value::{Relation, Tuple, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Persisted form of one table entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkolemEntry {
    pub constructor: String,
    pub args: Tuple,
    pub id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SkolemTableData {
    next_id: i64,
    entries: Vec<SkolemEntry>,
}

/// Memoized `(constructor, args) -> id` map owned by one workspace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SkolemTableData", into = "SkolemTableData")]
pub struct SkolemTable {
    next_id: i64,
    ids: HashMap<String, HashMap<Tuple, i64>>,
}

impl SkolemTable {
    pub fn new(base: i64) -> Self {
        SkolemTable {
            next_id: base,
            ids: HashMap::new(),
        }
    }

    /// Id for `args` under `constructor`, allocating one on first use
    pub fn id_for(&mut self, constructor: &str, args: &Tuple) -> i64 {
        if let Some(&id) = self.ids.get(constructor).and_then(|m| m.get(args)) {
            return id;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.ids
            .entry(constructor.to_string())
            .or_default()
            .insert(args.clone(), id);
        id
    }

    pub fn get(&self, constructor: &str, args: &Tuple) -> Option<i64> {
        self.ids.get(constructor).and_then(|m| m.get(args)).copied()
    }

    /// Function table for `constructor`: every argument tuple extended with its id
    pub fn fill(&mut self, constructor: &str, arguments: &Relation) -> Relation {
        arguments
            .iter()
            .map(|args| {
                let id = self.id_for(constructor, args);
                args.extended(Value::Long(id))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.ids.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn next_id(&self) -> i64 {
        self.next_id
    }
}

impl From<SkolemTableData> for SkolemTable {
    fn from(data: SkolemTableData) -> Self {
        let mut ids: HashMap<String, HashMap<Tuple, i64>> = HashMap::new();
        let mut next_id = data.next_id;
        for entry in data.entries {
            next_id = next_id.max(entry.id + 1);
            ids.entry(entry.constructor).or_default().insert(entry.args, entry.id);
        }
        SkolemTable { next_id, ids }
    }
}

impl From<SkolemTable> for SkolemTableData {
    fn from(table: SkolemTable) -> Self {
        let mut entries: Vec<SkolemEntry> = table
            .ids
            .into_iter()
            .flat_map(|(constructor, m)| {
                m.into_iter().map(move |(args, id)| SkolemEntry {
                    constructor: constructor.clone(),
                    args,
                    id,
                })
            })
            .collect();
        entries.sort_by_key(|e| e.id);
        SkolemTableData {
            next_id: table.next_id,
            entries,
        }
    }
}
