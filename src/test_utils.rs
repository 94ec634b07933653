use std::collections::HashMap;
use std::fmt::Debug;

use super::graph_state::GraphState;
use super::network::{EdgeAttributes, EdgeTable};


/// Checks that the contents of two hashmaps are the same.
pub fn compare_hashmaps<KK, VV>(query_map: &HashMap<KK, VV>, true_map: &HashMap<KK, VV>)
    where KK: Debug + Eq + std::hash::Hash,
    VV: Debug + PartialEq,
{
    assert_eq!(query_map.len(), true_map.len());

    for (true_key, true_val) in true_map {
        match query_map.get(true_key) {
            Some(val) => assert_eq!(val, true_val),
            None => assert!(false, "Key {:?} missing!", true_key),
        }
    }
}

/// A -> B -> C with fft 10 and capacity 50 on both edges, plus an isolated node 3.
pub fn chain_network() -> (EdgeTable, GraphState) {
    let table = EdgeTable::new(vec![
        EdgeAttributes::new(100, 0, 1, 150., 50., 10.),
        EdgeAttributes::new(101, 1, 2, 150., 50., 10.),
    ]).unwrap();
    let graph = GraphState::from_edge_table(&table, 4).unwrap();
    (table, graph)
}
