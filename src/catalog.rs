//! Workspace Catalog
//!
//! Persists what a workspace needs to come back after a restart: graph
//! schemas, view definitions (as their source text), label and SSR index
//! registrations, and the Skolem id table.
//!
//! ## Storage
//!
//! JSON at `{data_dir}/{workspace}/catalog.json`, replaced atomically on save.

use crate::engine::SkolemTable;
use crate::error::CatalogError;
use crate::parser::IndexTarget;
use crate::schema::SchemaGraph;
use crate::view::{TransRuleList, ViewKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const CATALOG_VERSION: u32 = 1;
pub const CATALOG_FILE: &str = "catalog.json";

/// One stored view definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewRecord {
    pub name: String,
    pub base: String,
    pub kind: ViewKind,
    /// `CREATE ... VIEW` text the view is recompiled from
    pub query_text: String,
    pub level: usize,
    pub created_at: String,
}

impl ViewRecord {
    pub fn new(view: &TransRuleList) -> Self {
        ViewRecord {
            name: view.name.clone(),
            base: view.base.clone(),
            kind: view.kind,
            query_text: view.query_text.clone(),
            level: view.level,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelIndexRecord {
    pub view: String,
    pub target: IndexTarget,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SsrIndexRecord {
    pub view: String,
    pub query_text: String,
}

/// Catalog file format
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CatalogFile {
    version: u32,
    #[serde(default)]
    graphs: BTreeMap<String, SchemaGraph>,
    #[serde(default)]
    current_graph: Option<String>,
    #[serde(default)]
    views: Vec<ViewRecord>,
    #[serde(default)]
    label_indexes: Vec<LabelIndexRecord>,
    #[serde(default)]
    ssr_indexes: Vec<SsrIndexRecord>,
    skolems: SkolemTable,
}

/// Persistent catalog of one workspace
#[derive(Debug)]
pub struct Catalog {
    path: PathBuf,
    file: CatalogFile,
}

impl Catalog {
    /// Open the catalog in `dir`, starting empty if there is no file yet
    pub fn open(dir: &Path, skolem_id_base: i64) -> Result<Self, CatalogError> {
        let path = dir.join(CATALOG_FILE);
        let file = if path.exists() {
            let content = fs::read_to_string(&path)?;
            let file: CatalogFile = serde_json::from_str(&content)?;
            if file.version != CATALOG_VERSION {
                return Err(CatalogError::UnsupportedVersion(file.version));
            }
            tracing::info!(
                path = %path.display(),
                views = file.views.len(),
                graphs = file.graphs.len(),
                "catalog_loaded"
            );
            file
        } else {
            CatalogFile {
                version: CATALOG_VERSION,
                graphs: BTreeMap::new(),
                current_graph: None,
                views: Vec::new(),
                label_indexes: Vec::new(),
                ssr_indexes: Vec::new(),
                skolems: SkolemTable::new(skolem_id_base),
            }
        };
        Ok(Catalog { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the catalog to disk
    pub fn save(&self) -> Result<(), CatalogError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.file)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &self.path)?;
        tracing::debug!(path = %self.path.display(), "catalog_saved");
        Ok(())
    }

    pub fn graphs(&self) -> &BTreeMap<String, SchemaGraph> {
        &self.file.graphs
    }

    pub fn set_graph(&mut self, name: &str, schema: &SchemaGraph) {
        self.file.graphs.insert(name.to_string(), schema.clone());
    }

    /// Forget a base graph; it stops being current if it was
    pub fn remove_graph(&mut self, name: &str) -> bool {
        if self.file.current_graph.as_deref() == Some(name) {
            self.file.current_graph = None;
        }
        self.file.graphs.remove(name).is_some()
    }

    pub fn current_graph(&self) -> Option<&str> {
        self.file.current_graph.as_deref()
    }

    pub fn set_current_graph(&mut self, name: &str) {
        self.file.current_graph = Some(name.to_string());
    }

    /// Views ordered by level, then creation order
    pub fn views(&self) -> Vec<&ViewRecord> {
        let mut views: Vec<&ViewRecord> = self.file.views.iter().collect();
        views.sort_by_key(|v| v.level);
        views
    }

    pub fn view(&self, name: &str) -> Option<&ViewRecord> {
        self.file.views.iter().find(|v| v.name == name)
    }

    /// Add or replace a view definition
    pub fn register_view(&mut self, view: &TransRuleList) {
        let record = ViewRecord::new(view);
        match self.file.views.iter_mut().find(|v| v.name == view.name) {
            Some(existing) => *existing = record,
            None => self.file.views.push(record),
        }
    }

    /// Remove a view and every index registered on it
    pub fn remove_view(&mut self, name: &str) -> bool {
        let before = self.file.views.len();
        self.file.views.retain(|v| v.name != name);
        self.file.label_indexes.retain(|i| i.view != name);
        self.file.ssr_indexes.retain(|i| i.view != name);
        self.file.views.len() != before
    }

    pub fn label_indexes(&self) -> &[LabelIndexRecord] {
        &self.file.label_indexes
    }

    /// Register a label index; returns false if it was already present
    pub fn add_label_index(&mut self, view: &str, target: IndexTarget, label: &str) -> bool {
        let record = LabelIndexRecord {
            view: view.to_string(),
            target,
            label: label.to_string(),
        };
        if self.file.label_indexes.contains(&record) {
            return false;
        }
        self.file.label_indexes.push(record);
        true
    }

    pub fn ssr_indexes(&self) -> &[SsrIndexRecord] {
        &self.file.ssr_indexes
    }

    pub fn add_ssr_index(&mut self, view: &str, query_text: &str) -> bool {
        if self.file.ssr_indexes.iter().any(|i| i.view == view) {
            return false;
        }
        self.file.ssr_indexes.push(SsrIndexRecord {
            view: view.to_string(),
            query_text: query_text.to_string(),
        });
        true
    }

    pub fn skolems(&self) -> &SkolemTable {
        &self.file.skolems
    }

    pub fn set_skolems(&mut self, skolems: &SkolemTable) {
        self.file.skolems = skolems.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Tuple, Value};
    use tempfile::TempDir;

    fn view(name: &str, level: usize) -> TransRuleList {
        let mut view = TransRuleList::new(name, "g", ViewKind::Virtual, Vec::new())
            .with_query_text(&format!("CREATE VIEW {name} ON g (MATCH (a:Person))"));
        view.level = level;
        view
    }

    #[test]
    fn test_new_catalog_is_empty() {
        let tmp = TempDir::new().unwrap();
        let catalog = Catalog::open(tmp.path(), 100).unwrap();
        assert!(catalog.views().is_empty());
        assert!(catalog.graphs().is_empty());
        assert_eq!(catalog.skolems().next_id(), 100);
        assert!(!catalog.path().exists());
    }

    #[test]
    fn test_save_and_reopen() {
        let tmp = TempDir::new().unwrap();
        let mut catalog = Catalog::open(tmp.path(), 100).unwrap();

        let mut schema = SchemaGraph::new();
        schema.add_edge("Person", "Knows", "Person");
        catalog.set_graph("g", &schema);
        catalog.set_current_graph("g");
        catalog.register_view(&view("v", 1));
        assert!(catalog.add_label_index("v", IndexTarget::Node, "Person"));
        assert!(catalog.add_ssr_index("v", "CREATE SSR INDEX ON v"));

        let mut skolems = SkolemTable::new(100);
        skolems.id_for("GENNEWID_CONST_v_f", &Tuple::new(vec![Value::Long(1)]));
        catalog.set_skolems(&skolems);
        catalog.save().unwrap();

        let reopened = Catalog::open(tmp.path(), 0).unwrap();
        assert_eq!(reopened.graphs().get("g"), Some(&schema));
        assert_eq!(reopened.current_graph(), Some("g"));
        assert_eq!(reopened.views()[0].name, "v");
        assert_eq!(reopened.views()[0].level, 1);
        assert_eq!(reopened.label_indexes().len(), 1);
        assert_eq!(reopened.ssr_indexes()[0].query_text, "CREATE SSR INDEX ON v");
        assert_eq!(
            reopened.skolems().get("GENNEWID_CONST_v_f", &Tuple::new(vec![Value::Long(1)])),
            Some(100)
        );
        assert_eq!(reopened.skolems().next_id(), 101);
    }

    #[test]
    fn test_views_sorted_by_level() {
        let tmp = TempDir::new().unwrap();
        let mut catalog = Catalog::open(tmp.path(), 0).unwrap();
        catalog.register_view(&view("upper", 2));
        catalog.register_view(&view("lower", 1));
        let names: Vec<&str> = catalog.views().iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["lower", "upper"]);
    }

    #[test]
    fn test_remove_view_drops_its_indexes() {
        let tmp = TempDir::new().unwrap();
        let mut catalog = Catalog::open(tmp.path(), 0).unwrap();
        catalog.register_view(&view("v", 1));
        catalog.add_label_index("v", IndexTarget::Edge, "Knows");
        catalog.add_ssr_index("v", "CREATE SSR INDEX ON v");
        assert!(!catalog.add_ssr_index("v", "CREATE SSR INDEX ON v"));

        assert!(catalog.remove_view("v"));
        assert!(!catalog.remove_view("v"));
        assert!(catalog.label_indexes().is_empty());
        assert!(catalog.ssr_indexes().is_empty());
    }

    #[test]
    fn test_remove_graph_clears_current() {
        let tmp = TempDir::new().unwrap();
        let mut catalog = Catalog::open(tmp.path(), 0).unwrap();
        catalog.set_graph("g", &SchemaGraph::new());
        catalog.set_graph("h", &SchemaGraph::new());
        catalog.set_current_graph("g");

        assert!(catalog.remove_graph("h"));
        assert_eq!(catalog.current_graph(), Some("g"));
        assert!(catalog.remove_graph("g"));
        assert_eq!(catalog.current_graph(), None);
        assert!(!catalog.remove_graph("g"));
    }

    #[test]
    fn test_unsupported_version() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CATALOG_FILE),
            r#"{"version": 99, "skolems": {"next_id": 0, "entries": []}}"#,
        )
        .unwrap();
        assert!(matches!(
            Catalog::open(tmp.path(), 0),
            Err(CatalogError::UnsupportedVersion(99))
        ));
    }
}
