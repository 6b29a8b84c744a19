//! Property-based engine tests (proptest): evaluation agrees with
//! nested-loop and closure oracles on random relations.

use proptest::prelude::*;
use std::collections::BTreeSet;

use pgview::ast::builders::{AtomBuilder, ClauseBuilder};
use pgview::{Database, Engine, Relation, SkolemTable, Tuple, Value};

type Pairs = BTreeSet<(i64, i64)>;

fn pairs() -> impl Strategy<Value = Pairs> {
    prop::collection::btree_set((0i64..8, 0i64..8), 0..24)
}

fn relation(pairs: &Pairs) -> Relation {
    pairs
        .iter()
        .map(|&(a, b)| Tuple::new(vec![Value::Long(a), Value::Long(b)]))
        .collect()
}

fn database(named: &[(&str, &Pairs)]) -> Database {
    let mut db = Database::new();
    for (name, rows) in named {
        db.set(name, relation(rows));
    }
    db
}

fn closure(edges: &Pairs) -> Pairs {
    let mut reach = edges.clone();
    loop {
        let next: Pairs = reach
            .iter()
            .flat_map(|&(a, b)| edges.iter().filter(move |&&(c, _)| c == b).map(move |&(_, d)| (a, d)))
            .collect();
        let before = reach.len();
        reach.extend(next);
        if reach.len() == before {
            return reach;
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// t(x, z) :- r(x, y), s(y, z) matches a nested-loop join
    #[test]
    fn prop_join_matches_nested_loops(r in pairs(), s in pairs()) {
        let clause = ClauseBuilder::new("t")
            .head_vars(["x", "z"])
            .body_atom("r", ["x", "y"])
            .body_atom("s", ["y", "z"])
            .build();
        let db = database(&[("r", &r), ("s", &s)]);
        let result = Engine::default().evaluate_clause(&clause, &db).unwrap();

        let mut expected = Pairs::new();
        for &(x, y) in &r {
            for &(y2, z) in &s {
                if y == y2 {
                    expected.insert((x, z));
                }
            }
        }
        prop_assert_eq!(result, relation(&expected));
    }

    /// t(x, y) :- r(x, y), !s(x, y) is set difference
    #[test]
    fn prop_negation_is_difference(r in pairs(), s in pairs()) {
        let clause = ClauseBuilder::new("t")
            .head_vars(["x", "y"])
            .body_atom("r", ["x", "y"])
            .negated(AtomBuilder::new("s").vars(["x", "y"]).build())
            .build();
        let db = database(&[("r", &r), ("s", &s)]);
        let result = Engine::default().evaluate_clause(&clause, &db).unwrap();

        let expected: Pairs = r.difference(&s).copied().collect();
        prop_assert_eq!(result, relation(&expected));
    }

    /// Linear recursion reaches the transitive closure
    #[test]
    fn prop_recursion_reaches_closure(edges in pairs()) {
        let clauses = vec![
            ClauseBuilder::new("reach")
                .head_vars(["x", "y"])
                .body_atom("edge", ["x", "y"])
                .build(),
            ClauseBuilder::new("reach")
                .head_vars(["x", "z"])
                .body_atom("reach", ["x", "y"])
                .body_atom("edge", ["y", "z"])
                .build(),
        ];
        let db = database(&[("edge", &edges)]);
        let mut skolems = SkolemTable::new(1_000_000_000);
        let derived = Engine::default()
            .evaluate_program(&clauses, &db, &mut skolems)
            .unwrap();

        let reach = derived.get("reach").cloned().unwrap_or_default();
        prop_assert_eq!(reach, relation(&closure(&edges)));
    }
}
