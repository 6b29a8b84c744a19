//! Relation names derived from graph, view and rule identifiers.
//!
//! Every generated relation is named here so the compiler, the SSR builder,
//! the engine and the catalog agree on them.

/// Head relation of compiled queries
pub const ANSWER: &str = "ANSWER";

const SKOLEM_MAP_PREFIX: &str = "GENNEWID_MAP_";
const SKOLEM_CONST_PREFIX: &str = "GENNEWID_CONST_";

pub fn nodes(graph: &str) -> String {
    format!("N_{graph}")
}

pub fn edges(graph: &str) -> String {
    format!("E_{graph}")
}

pub fn node_props(graph: &str) -> String {
    format!("NP_{graph}")
}

pub fn edge_props(graph: &str) -> String {
    format!("EP_{graph}")
}

pub fn match_relation(view: &str, rule: usize) -> String {
    format!("MATCH_{view}_{rule}")
}

pub fn path(id: usize) -> String {
    format!("REC_{id}")
}

pub fn path_state(id: usize, state: usize) -> String {
    format!("REC_{id}_S{state}")
}

pub fn skolem_args(view: &str, function: &str) -> String {
    format!("{SKOLEM_CONST_PREFIX}{view}_{function}")
}

pub fn skolem_table(view: &str, function: &str) -> String {
    format!("{SKOLEM_MAP_PREFIX}{view}_{function}")
}

pub fn new_ids(view: &str) -> String {
    format!("GENNEWID_{view}")
}

pub fn map(view: &str) -> String {
    format!("MAP_{view}")
}

pub fn mapped(view: &str) -> String {
    format!("MAPPED_{view}")
}

pub fn default_map(view: &str) -> String {
    format!("DMAP_{view}")
}

pub fn deleted_nodes(view: &str) -> String {
    format!("N_DEL_{view}")
}

pub fn deleted_edges(view: &str) -> String {
    format!("E_DEL_{view}")
}

/// `INDEX_<view>` for a single-relation index, `INDEX_<view>_<i>` otherwise
pub fn index(view: &str, part: Option<usize>) -> String {
    match part {
        Some(i) => format!("INDEX_{view}_{i}"),
        None => format!("INDEX_{view}"),
    }
}

pub fn index_node_props(index: &str) -> String {
    format!("{index}_NP")
}

pub fn index_edge_props(index: &str) -> String {
    format!("{index}_EP")
}

/// Argument relation feeding a Skolem function table, if `table` is one
pub fn skolem_source(table: &str) -> Option<String> {
    table
        .strip_prefix(SKOLEM_MAP_PREFIX)
        .map(|rest| format!("{SKOLEM_CONST_PREFIX}{rest}"))
}

pub fn is_skolem_table(relation: &str) -> bool {
    relation.starts_with(SKOLEM_MAP_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skolem_names_pair_up() {
        let table = skolem_table("v", "f");
        assert_eq!(table, "GENNEWID_MAP_v_f");
        assert_eq!(skolem_source(&table).as_deref(), Some("GENNEWID_CONST_v_f"));
        assert_eq!(skolem_source("N_v"), None);
    }

    #[test]
    fn test_index_names() {
        assert_eq!(index("v", None), "INDEX_v");
        assert_eq!(index_node_props(&index("v", Some(2))), "INDEX_v_2_NP");
    }
}
