// Folds an increment's edge flows into the hourly totals and pushes the resulting congested
// travel times into the routing graph.
use super::error::{AssignmentError, Result};
use super::flow::EdgeFlowTable;
use super::graph_state::GraphState;
use super::network::EdgeTable;


/// Multiplier applied to free-flow time even at zero volume. Congested times are never below
/// 1.3 * fft; this floor is intentional.
pub const BPR_FLOOR: f64 = 1.3;
pub const BPR_ALPHA: f64 = 0.6;
pub const BPR_BETA: i32 = 4;

/// BPR-style volume-delay function:
/// `fft * (1.3 + 1.3 * 0.6 * (volume / capacity)^4)`.
pub fn bpr_travel_time(fft: f64, volume: f64, capacity: f64) -> f64 {
    let ratio = volume / capacity;
    fft * (BPR_FLOOR + BPR_FLOOR * BPR_ALPHA * ratio.powi(BPR_BETA))
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateSummary {
    pub updated_edges: usize,
    // largest flow assigned to one edge in this increment
    pub max_volume: f64,
    // largest t_new / fft among the updated edges
    pub max_delay_ratio: f64,
}

/// Adds the increment's flow to each edge's hourly flow, then recomputes the travel time of
/// every edge that received flow and writes it into the graph. Edges without flow this increment
/// keep their weight. A negative or non-finite flow is an error.
pub fn apply_increment(flows: &EdgeFlowTable, edges: &mut EdgeTable, graph: &mut GraphState)
                       -> Result<UpdateSummary> {
    let mut summary = UpdateSummary::default();
    for ((start, end), flow) in flows.sorted_rows() {
        let edge = edges.get_mut(start, end).ok_or_else(|| AssignmentError::Network(
            format!("flow assigned to unknown edge {} -> {}", start, end)))?;
        if !flow.is_finite() || flow < 0. {
            return Err(AssignmentError::Network(
                format!("edge {} received invalid flow {}", edge.edge_id, flow)));
        }
        edge.hour_flow += flow;
        if flow <= 0. {
            continue;
        }
        let t_new = bpr_travel_time(edge.fft, edge.hour_flow, edge.capacity);
        edge.travel_time = t_new;
        graph.update_weight(start, end, t_new)?;

        summary.updated_edges += 1;
        summary.max_volume = summary.max_volume.max(flow);
        summary.max_delay_ratio = summary.max_delay_ratio.max(edge.delay_ratio());
    }
    Ok(summary)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::chain_network;
    use approx::assert_relative_eq;
    use rand::{Rng, SeedableRng};
    use rand_isaac::Isaac64Rng;

    #[test]
    fn test_bpr_values() {
        assert_relative_eq!(bpr_travel_time(10., 0., 50.), 13.);
        assert_relative_eq!(bpr_travel_time(10., 50., 50.), 10. * (1.3 + 1.3 * 0.6));
        assert_relative_eq!(bpr_travel_time(10., 20., 50.), 13.19968, epsilon = 1e-9);
        assert_eq!(bpr_travel_time(0., 100., 50.), 0.);
    }

    #[test]
    fn test_bpr_never_below_fft() {
        let mut rng = Isaac64Rng::seed_from_u64(100);
        for _ in 0..10000 {
            let fft = rng.gen_range(0.0..600.0);
            let capacity = rng.gen_range(1.0..5000.0);
            // ratios from zero up to far beyond capacity
            let ratio: f64 = match rng.gen_range(0..3) {
                0 => 0.,
                1 => rng.gen_range(0.0..2.0),
                _ => rng.gen_range(2.0..1000.0),
            };
            let t_new = bpr_travel_time(fft, ratio * capacity, capacity);
            assert!(t_new >= fft, "t_new {} < fft {} at ratio {}", t_new, fft, ratio);
        }
    }

    #[test]
    fn test_bpr_increasing() {
        let mut prev = bpr_travel_time(10., 0., 50.);
        for volume in 1..200 {
            let cur = bpr_travel_time(10., volume as f64, 50.);
            assert!(cur > prev);
            prev = cur;
        }
    }

    #[test]
    fn test_apply_chain() {
        let (mut edges, mut graph) = chain_network();
        let mut flows = EdgeFlowTable::new();
        flows.add(0, 1, 20.);
        flows.add(1, 2, 20.);
        let summary = apply_increment(&flows, &mut edges, &mut graph).unwrap();
        assert_eq!(summary.updated_edges, 2);
        assert_eq!(summary.max_volume, 20.);

        let expected = 10. * (1.3 + 1.3 * 0.6 * (20f64 / 50.).powi(4));
        for (start, end) in &[(0, 1), (1, 2)] {
            let edge = edges.get(*start, *end).unwrap();
            assert_eq!(edge.hour_flow, 20.);
            assert_relative_eq!(edge.travel_time, expected);
            assert_relative_eq!(graph.weight(*start, *end).unwrap(), expected);
        }
        assert_relative_eq!(summary.max_delay_ratio, expected / 10.);
    }

    #[test]
    fn test_untouched_edges_keep_weight() {
        let (mut edges, mut graph) = chain_network();
        let mut flows = EdgeFlowTable::new();
        flows.add(0, 1, 5.);
        apply_increment(&flows, &mut edges, &mut graph).unwrap();
        assert_eq!(edges.get(1, 2).unwrap().hour_flow, 0.);
        assert_eq!(graph.weight(1, 2), Some(10.));
        assert_eq!(edges.get(1, 2).unwrap().travel_time, 10.);
    }

    #[test]
    fn test_zero_flow_rows_do_not_update() {
        let (mut edges, mut graph) = chain_network();
        let mut flows = EdgeFlowTable::new();
        flows.add(0, 1, 0.);
        let summary = apply_increment(&flows, &mut edges, &mut graph).unwrap();
        assert_eq!(summary.updated_edges, 0);
        assert_eq!(graph.weight(0, 1), Some(10.));
    }

    #[test]
    fn test_hour_flow_is_monotone() {
        let (mut edges, mut graph) = chain_network();
        let mut rng = Isaac64Rng::seed_from_u64(5);
        for _ in 0..50 {
            let before: Vec<f64> = edges.iter().map(|ee| ee.hour_flow).collect();
            let mut flows = EdgeFlowTable::new();
            for (start, end) in &[(0, 1), (1, 2)] {
                if rng.gen_bool(0.5) {
                    flows.add(*start, *end, rng.gen_range(0.0..30.0));
                }
            }
            apply_increment(&flows, &mut edges, &mut graph).unwrap();
            for (edge, prev) in edges.iter().zip(&before) {
                assert!(edge.hour_flow >= *prev);
                assert!(edge.travel_time >= edge.fft);
            }
        }
    }

    #[test]
    fn test_invalid_flow_is_rejected() {
        for bad_flow in &[-30., f64::NAN, f64::INFINITY] {
            let (mut edges, mut graph) = chain_network();
            let mut flows = EdgeFlowTable::new();
            flows.add(0, 1, *bad_flow);
            let result = apply_increment(&flows, &mut edges, &mut graph);
            assert!(matches!(result, Err(AssignmentError::Network(_))));
            assert_eq!(edges.get(0, 1).unwrap().hour_flow, 0.);
            assert_eq!(graph.weight(0, 1), Some(10.));
        }
    }

    #[test]
    fn test_unknown_edge() {
        let (mut edges, mut graph) = chain_network();
        let mut flows = EdgeFlowTable::new();
        flows.add(2, 0, 1.);
        let result = apply_increment(&flows, &mut edges, &mut graph);
        assert!(matches!(result, Err(AssignmentError::Network(_))));
    }
}
