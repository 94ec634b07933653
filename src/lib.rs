//! Incremental traffic assignment.
//!
//! Each simulated hour of OD demand is split into random increments. Every increment is routed
//! in parallel on the current congested weights, its flow is summed per edge, and the edge
//! travel times are updated with a BPR volume-delay function before the next increment runs.

// imports of other modules from this crate
mod error;
pub use error::{AssignmentError, OdEnd, Result};

mod io_utils;

mod network;
pub use network::{EdgeAttributes, EdgeTable, NodeTable};

mod graph_state;
pub use graph_state::{GraphSnapshot, GraphState, ShortestPath};
pub use graph_state::{read_matrix_market, NO_PATH_DISTANCE, UNREACHABLE_THRESHOLD};

mod demand;
pub use demand::{OdPair, RawOdRecord};
pub use demand::{load_hour_demand, partition_increments, read_od_csv, translate_od};
pub use demand::{uniform_increment_weights, validate_increment_weights};

mod routing;
pub use routing::{route_od_pair, EdgeContribution, RouteOutcome, RoutingPool};

mod flow;
pub use flow::{reduce_edge_flow, EdgeFlowTable};

mod update;
pub use update::{apply_increment, bpr_travel_time, UpdateSummary};

mod simulation;
pub use simulation::{AssignmentConfig, HourResults, HourSummary, IncrementResults, Simulator};
pub use simulation::{edge_flow_path, graph_result_path, travel_time_path};
pub use simulation::{read_edge_flows, write_edge_flows, write_travel_times, TravelTimeSample};

#[cfg(test)]
mod test_utils;
