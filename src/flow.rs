use std::collections::HashMap;

use itertools::Itertools;

use super::routing::RouteOutcome;


/// Total flow per edge assigned by one increment. Built fresh for every increment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeFlowTable {
    flows: HashMap<(usize, usize), f64>,
}

impl EdgeFlowTable {
    pub fn new() -> EdgeFlowTable {
        EdgeFlowTable::default()
    }

    pub fn add(&mut self, start: usize, end: usize, flow: f64) {
        *self.flows.entry((start, end)).or_insert(0.) += flow;
    }

    pub fn get(&self, start: usize, end: usize) -> Option<f64> {
        self.flows.get(&(start, end)).copied()
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    /// Rows ordered by (start, end), so updates are applied in a stable order.
    pub fn sorted_rows(&self) -> Vec<((usize, usize), f64)> {
        self.flows.iter().map(|(key, flow)| (*key, *flow)).sorted_by_key(|(key, _)| *key)
            .collect()
    }

    pub fn max_flow(&self) -> f64 {
        self.flows.values().copied().fold(0., f64::max)
    }

    pub fn as_map(&self) -> &HashMap<(usize, usize), f64> {
        &self.flows
    }
}

/// Flattens the edge contributions of every routed OD pair and sums the flow per edge.
pub fn reduce_edge_flow(outcomes: &[RouteOutcome]) -> EdgeFlowTable {
    let mut table = EdgeFlowTable::new();
    for contribution in outcomes.iter().flat_map(|outcome| outcome.contributions()) {
        table.add(contribution.start, contribution.end, contribution.flow);
    }
    table
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::EdgeContribution;
    use crate::test_utils::compare_hashmaps;

    fn reached(edges: &[(usize, usize)], flow: f64) -> RouteOutcome {
        RouteOutcome::Reached {
            edges: edges.iter().map(|(start, end)| EdgeContribution {
                start: *start,
                end: *end,
                flow,
            }).collect(),
            distance: edges.len() as f64,
        }
    }

    #[test]
    fn test_reduce_empty() {
        let table = reduce_edge_flow(&[]);
        assert!(table.is_empty());
        assert_eq!(table.max_flow(), 0.);

        let table = reduce_edge_flow(&[RouteOutcome::Unreachable, RouteOutcome::Unreachable]);
        assert!(table.is_empty());
    }

    #[test]
    fn test_reduce_single_path() {
        let table = reduce_edge_flow(&[reached(&[(0, 1), (1, 2)], 20.)]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0, 1), Some(20.));
        assert_eq!(table.get(1, 2), Some(20.));
        assert_eq!(table.get(2, 3), None);
    }

    #[test]
    fn test_reduce_sums_overlaps() {
        let outcomes = vec![
            reached(&[(0, 1), (1, 2)], 5.),
            RouteOutcome::Unreachable,
            reached(&[(1, 2), (2, 3)], 3.),
            reached(&[(1, 2)], 1.5),
        ];
        let table = reduce_edge_flow(&outcomes);
        let expected: HashMap<(usize, usize), f64> = [
            ((0, 1), 5.),
            ((1, 2), 9.5),
            ((2, 3), 3.),
        ].iter().cloned().collect();
        compare_hashmaps(table.as_map(), &expected);
        assert_eq!(table.max_flow(), 9.5);
        assert_eq!(table.sorted_rows(), vec![((0, 1), 5.), ((1, 2), 9.5), ((2, 3), 3.)]);
    }
}
