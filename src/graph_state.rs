// The weighted routing graph. It's a thin wrapper around a petgraph DiGraph whose node indices
// coincide with the sequential routing indices and whose edge weights are current travel times.
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use itertools::Itertools;
use petgraph::algo::astar;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;

use super::error::{AssignmentError, Result};
use super::io_utils;
use super::network::EdgeTable;


/// The distance a shortest-path query reports when the destination can't be reached.
pub const NO_PATH_DISTANCE: f64 = f64::INFINITY;

/// Any path distance above this is treated as "destination not reached". It sits far above any
/// real travel time, and NO_PATH_DISTANCE always exceeds it.
pub const UNREACHABLE_THRESHOLD: f64 = 1e8;

static MATRIX_MARKET_HEADER: &str = "%%MatrixMarket matrix coordinate real general";

type RoutingGraph = DiGraph<(), f64>;

#[derive(Debug, Clone, PartialEq)]
pub struct ShortestPath {
    pub distance: f64,
    // routing indices of the traversed nodes, origin first
    pub nodes: Vec<usize>,
}

impl ShortestPath {
    pub fn is_reachable(&self) -> bool {
        self.distance <= UNREACHABLE_THRESHOLD
    }

    /// The traversed edges as (start, end) pairs, in path order.
    pub fn edges(&self) -> Vec<(usize, usize)> {
        self.nodes.windows(2).map(|ww| (ww[0], ww[1])).collect()
    }
}

fn check_node(graph: &RoutingGraph, node: usize) -> Result<()> {
    if node < graph.node_count() {
        Ok(())
    } else {
        Err(AssignmentError::Network(format!(
            "node {} is outside the graph ({} nodes)", node, graph.node_count())))
    }
}

fn shortest_path_on(graph: &RoutingGraph, origin: usize, destination: usize)
                    -> Result<ShortestPath> {
    check_node(graph, origin)?;
    check_node(graph, destination)?;
    let goal = NodeIndex::new(destination);
    let found = astar(graph, NodeIndex::new(origin), |nn| nn == goal, |ee| *ee.weight(),
                      |_| 0.);
    Ok(match found {
        Some((distance, path)) => ShortestPath {
            distance,
            nodes: path.into_iter().map(|nn| nn.index()).collect(),
        },
        None => ShortestPath { distance: NO_PATH_DISTANCE, nodes: vec![] },
    })
}

/// The routing graph, owned by the simulation driver. Only the driver mutates it, and only
/// between increments; workers route on a GraphSnapshot.
pub struct GraphState {
    graph: RoutingGraph,
    edge_idxs: HashMap<(usize, usize), EdgeIndex>,
}

impl GraphState {
    pub fn new(num_nodes: usize) -> GraphState {
        let mut graph = DiGraph::with_capacity(num_nodes, 0);
        for _ in 0..num_nodes {
            graph.add_node(());
        }
        GraphState { graph, edge_idxs: HashMap::new() }
    }

    /// Builds the graph from the edge table, weighting each edge by its current travel time.
    pub fn from_edge_table(table: &EdgeTable, num_nodes: usize) -> Result<GraphState> {
        let mut state = GraphState::new(num_nodes);
        for edge in table.iter() {
            state.add_edge(edge.start, edge.end, edge.travel_time)?;
        }
        Ok(state)
    }

    pub fn add_edge(&mut self, start: usize, end: usize, weight: f64) -> Result<()> {
        check_node(&self.graph, start)?;
        check_node(&self.graph, end)?;
        if self.edge_idxs.contains_key(&(start, end)) {
            return Err(AssignmentError::Network(
                format!("graph already has an edge {} -> {}", start, end)));
        }
        let idx = self.graph.add_edge(NodeIndex::new(start), NodeIndex::new(end), weight);
        self.edge_idxs.insert((start, end), idx);
        Ok(())
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn weight(&self, start: usize, end: usize) -> Option<f64> {
        self.edge_idxs.get(&(start, end)).and_then(|idx| self.graph.edge_weight(*idx)).copied()
    }

    pub fn update_weight(&mut self, start: usize, end: usize, weight: f64) -> Result<()> {
        let idx = self.edge_idxs.get(&(start, end)).ok_or_else(|| AssignmentError::Network(
            format!("no edge {} -> {} to update", start, end)))?;
        // the index came from this graph, so the weight slot exists
        if let Some(ww) = self.graph.edge_weight_mut(*idx) {
            *ww = weight;
        }
        Ok(())
    }

    pub fn shortest_path(&self, origin: usize, destination: usize) -> Result<ShortestPath> {
        shortest_path_on(&self.graph, origin, destination)
    }

    /// An owned copy of the current weights for the map phase of one increment.
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot { graph: self.graph.clone() }
    }

    /// Overwrites initial weights with the entries of a Matrix Market file. Each entry must be
    /// an edge of the table, and may not be faster than that edge's free-flow time.
    pub fn load_matrix_market_weights(&mut self, mtxpath: &Path, table: &mut EdgeTable)
                                      -> Result<usize> {
        let (_, entries) = read_matrix_market(mtxpath)?;
        for (start, end, weight) in &entries {
            let edge = table.get_mut(*start, *end).ok_or_else(|| AssignmentError::Network(
                format!("{}: entry {} -> {} has no edge table row",
                        mtxpath.display(), start, end)))?;
            if !(*weight >= edge.fft) {
                return Err(AssignmentError::Network(format!(
                    "{}: weight {} of edge {} is below its free-flow time {}",
                    mtxpath.display(), weight, edge.edge_id, edge.fft)));
            }
            edge.travel_time = *weight;
            self.update_weight(*start, *end, *weight)?;
        }
        log::info!("loaded {} initial weights from {}", entries.len(), mtxpath.display());
        Ok(entries.len())
    }

    /// Writes the weighted graph in Matrix Market coordinate format (1-based indices).
    pub fn write_matrix_market(&self, mtxpath: &Path) -> Result<()> {
        io_utils::create_parent_dirs(mtxpath)?;
        let to_io_err = |err: std::io::Error| AssignmentError::io(mtxpath, err);
        let file = File::create(mtxpath).map_err(to_io_err)?;
        let mut writer = BufWriter::new(file);
        let nn = self.graph.node_count();
        writeln!(writer, "{}", MATRIX_MARKET_HEADER).map_err(to_io_err)?;
        writeln!(writer, "{} {} {}", nn, nn, self.graph.edge_count()).map_err(to_io_err)?;
        let entries = self.graph.edge_references()
            .map(|ee| (ee.source().index(), ee.target().index(), *ee.weight()))
            .sorted_by(|aa, bb| (aa.0, aa.1).cmp(&(bb.0, bb.1)));
        for (start, end, weight) in entries {
            writeln!(writer, "{} {} {}", start + 1, end + 1, weight).map_err(to_io_err)?;
        }
        writer.flush().map_err(to_io_err)
    }
}

/// Immutable copy of the routing graph handed to the worker pool.
#[derive(Clone)]
pub struct GraphSnapshot {
    graph: RoutingGraph,
}

impl GraphSnapshot {
    pub fn shortest_path(&self, origin: usize, destination: usize) -> Result<ShortestPath> {
        shortest_path_on(&self.graph, origin, destination)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }
}

/// Reads a Matrix Market coordinate file into (dimension, [(start, end, weight)]) with
/// 0-based indices.
pub fn read_matrix_market(mtxpath: &Path) -> Result<(usize, Vec<(usize, usize, f64)>)> {
    let file = File::open(mtxpath).map_err(|err| AssignmentError::io(mtxpath, err))?;
    let malformed = |line_no: usize, msg: &str| AssignmentError::Network(
        format!("{}:{}: {}", mtxpath.display(), line_no + 1, msg));

    let mut dimension = None;
    let mut expected_nnz = 0;
    let mut entries = vec![];
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|err| AssignmentError::io(mtxpath, err))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('%') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 3 {
            return Err(malformed(line_no, "expected three fields"));
        }
        match dimension {
            None => {
                let rows: usize = fields[0].parse().map_err(|_| malformed(line_no, "bad size"))?;
                let cols: usize = fields[1].parse().map_err(|_| malformed(line_no, "bad size"))?;
                expected_nnz = fields[2].parse().map_err(|_| malformed(line_no, "bad size"))?;
                dimension = Some(rows.max(cols));
            }
            Some(dim) => {
                let row: usize = fields[0].parse().map_err(|_| malformed(line_no, "bad row"))?;
                let col: usize = fields[1].parse().map_err(|_| malformed(line_no, "bad column"))?;
                let weight: f64 = fields[2].parse()
                    .map_err(|_| malformed(line_no, "bad weight"))?;
                if !weight.is_finite() {
                    return Err(malformed(line_no, "weight is not finite"));
                }
                if row == 0 || col == 0 || row > dim || col > dim {
                    return Err(malformed(line_no, "index out of range"));
                }
                entries.push((row - 1, col - 1, weight));
            }
        }
    }

    let dimension = dimension.ok_or_else(|| malformed(0, "missing size line"))?;
    if entries.len() != expected_nnz {
        log::warn!("{}: size line announces {} entries, found {}",
                   mtxpath.display(), expected_nnz, entries.len());
    }
    Ok((dimension, entries))
}
