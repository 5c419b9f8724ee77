//! Reachability of the flattener over random call graphs.

use ogo_ir::{flatten, DeclGraph};
use proptest::prelude::*;
use std::collections::BTreeSet;

/// A call graph over `f0..fn`; the last row holds the callees of `main`.
fn arb_calls() -> BoxedStrategy<Vec<Vec<bool>>> {
    (1usize..8)
        .prop_flat_map(|n| prop::collection::vec(prop::collection::vec(any::<bool>(), n), n + 1))
        .boxed()
}

fn source(calls: &[Vec<bool>]) -> String {
    let n = calls.len() - 1;
    let body = |row: &[bool]| {
        row.iter()
            .enumerate()
            .filter(|(_, c)| **c)
            .map(|(j, _)| format!("\tf{j}()\n"))
            .collect::<String>()
    };
    let mut src = "package main\n".to_string();
    for (i, row) in calls[..n].iter().enumerate() {
        src += &format!("func f{i}() {{\n{}}}\n", body(row));
    }
    src += &format!("func main() {{\n{}}}\n", body(&calls[n]));
    src
}

fn reachable(calls: &[Vec<bool>]) -> BTreeSet<String> {
    let n = calls.len() - 1;
    let mut seen = BTreeSet::new();
    let mut todo = vec![n];
    while let Some(i) = todo.pop() {
        for (j, c) in calls[i].iter().enumerate() {
            if *c && seen.insert(j) {
                todo.push(j);
            }
        }
    }
    seen.into_iter()
        .map(|j| format!("main_f{j}"))
        .chain(["main_init".to_string(), "main_main".to_string()])
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn exactly_the_reachable_functions(calls in arb_calls()) {
        let mut graph = DeclGraph::default();
        graph
            .packages
            .entry("main".to_string())
            .or_default()
            .files
            .insert("main.go".to_string(), parser::parse(&source(&calls)).unwrap());
        let program = flatten(&graph).unwrap();
        let names: Vec<String> = program.decls.iter().map(|d| d.key.mangled()).collect();
        let unique: BTreeSet<String> = names.iter().cloned().collect();
        prop_assert_eq!(names.len(), unique.len());
        prop_assert_eq!(unique, reachable(&calls));
    }
}
