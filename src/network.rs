// The persistent attribute tables of the road network: one row per directed edge, plus the
// translation from external (e.g. OSM) node ids into the sequential routing index space.
use std::collections::HashMap;
use std::path::Path;

use super::error::{AssignmentError, Result};
use super::io_utils;


#[derive(PartialEq, Debug, Clone)]
pub struct EdgeAttributes {
    pub edge_id: i64,
    pub start: usize,
    pub end: usize,
    pub length: f64,
    pub capacity: f64,
    // free-flow travel time
    pub fft: f64,
    // flow assigned to this edge so far in the current hour
    pub hour_flow: f64,
    // current travel time, equal to the routing weight of the edge
    pub travel_time: f64,
}

impl EdgeAttributes {
    pub fn new(edge_id: i64, start: usize, end: usize, length: f64, capacity: f64, fft: f64)
               -> EdgeAttributes {
        EdgeAttributes {
            edge_id,
            start,
            end,
            length,
            capacity,
            fft,
            hour_flow: 0.,
            travel_time: fft,
        }
    }

    /// Ratio of current to free-flow travel time.
    pub fn delay_ratio(&self) -> f64 {
        if self.fft > 0. {
            self.travel_time / self.fft
        } else {
            1.
        }
    }
}

pub struct EdgeTable {
    edges: Vec<EdgeAttributes>,
    idxs_by_nodes: HashMap<(usize, usize), usize>,
}

impl EdgeTable {
    pub fn new(edges: Vec<EdgeAttributes>) -> Result<EdgeTable> {
        let mut idxs_by_nodes = HashMap::new();
        for (ii, edge) in edges.iter().enumerate() {
            if !(edge.capacity > 0.) {
                return Err(AssignmentError::Network(format!(
                    "edge {} has non-positive capacity {}", edge.edge_id, edge.capacity)));
            }
            if !(edge.fft >= 0.) {
                return Err(AssignmentError::Network(format!(
                    "edge {} has negative free-flow time {}", edge.edge_id, edge.fft)));
            }
            if let Some(other) = idxs_by_nodes.insert((edge.start, edge.end), ii) {
                return Err(AssignmentError::Network(format!(
                    "edges {} and {} both connect {} -> {}",
                    edges[other].edge_id, edge.edge_id, edge.start, edge.end)));
            }
        }
        Ok(EdgeTable { edges, idxs_by_nodes })
    }

    /// Reads an edge table with columns `edge_id,start,end,length,capacity,fft`.
    pub fn from_csv(csvpath: &Path) -> Result<EdgeTable> {
        let rows = io_utils::read_rows(csvpath)?;
        let mut edges = Vec::with_capacity(rows.len());
        for row in &rows {
            edges.push(EdgeAttributes::new(
                io_utils::parse_field(row, "edge_id", csvpath)?,
                io_utils::parse_field(row, "start", csvpath)?,
                io_utils::parse_field(row, "end", csvpath)?,
                io_utils::parse_field(row, "length", csvpath)?,
                io_utils::parse_field(row, "capacity", csvpath)?,
                io_utils::parse_field(row, "fft", csvpath)?,
            ));
        }
        log::info!("read {} edges from {}", edges.len(), csvpath.display());
        EdgeTable::new(edges)
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EdgeAttributes> {
        self.edges.iter()
    }

    pub fn get(&self, start: usize, end: usize) -> Option<&EdgeAttributes> {
        self.idxs_by_nodes.get(&(start, end)).map(|ii| &self.edges[*ii])
    }

    pub fn get_mut(&mut self, start: usize, end: usize) -> Option<&mut EdgeAttributes> {
        match self.idxs_by_nodes.get(&(start, end)) {
            Some(ii) => Some(&mut self.edges[*ii]),
            None => None,
        }
    }

    /// Zeroes the hourly cumulative flow. Travel times are left as they are.
    pub fn reset_hour_flow(&mut self) {
        for edge in &mut self.edges {
            edge.hour_flow = 0.;
        }
    }

    pub fn max_node_index(&self) -> Option<usize> {
        self.edges.iter().map(|ee| ee.start.max(ee.end)).max()
    }

    /// (edge id, hour flow) for every edge, in table order.
    pub fn hour_flows(&self) -> Vec<(i64, f64)> {
        self.edges.iter().map(|ee| (ee.edge_id, ee.hour_flow)).collect()
    }
}

/// Maps external node ids onto sequential routing indices.
#[derive(Debug, Clone)]
pub struct NodeTable {
    idxs_by_external_id: HashMap<i64, usize>,
}

impl NodeTable {
    pub fn new(pairs: Vec<(i64, usize)>) -> Result<NodeTable> {
        let mut idxs_by_external_id = HashMap::new();
        for (external_id, index) in pairs {
            if idxs_by_external_id.insert(external_id, index).is_some() {
                return Err(AssignmentError::Network(format!(
                    "node {} appears twice in the node table", external_id)));
            }
        }
        Ok(NodeTable { idxs_by_external_id })
    }

    /// Reads a node table with columns `external_id,index`.
    pub fn from_csv(csvpath: &Path) -> Result<NodeTable> {
        let rows = io_utils::read_rows(csvpath)?;
        let mut pairs = Vec::with_capacity(rows.len());
        for row in &rows {
            pairs.push((io_utils::parse_field(row, "external_id", csvpath)?,
                        io_utils::parse_field(row, "index", csvpath)?));
        }
        log::info!("read {} nodes from {}", pairs.len(), csvpath.display());
        NodeTable::new(pairs)
    }

    pub fn get_index(&self, external_id: i64) -> Option<usize> {
        self.idxs_by_external_id.get(&external_id).copied()
    }

    pub fn len(&self) -> usize {
        self.idxs_by_external_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.idxs_by_external_id.is_empty()
    }

    pub fn max_index(&self) -> Option<usize> {
        self.idxs_by_external_id.values().copied().max()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    #[test]
    fn test_edge_table_lookup() {
        let table = EdgeTable::new(vec![
            EdgeAttributes::new(7, 0, 1, 100., 50., 10.),
            EdgeAttributes::new(8, 1, 2, 100., 50., 12.),
        ]).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(1, 2).unwrap().edge_id, 8);
        assert!(table.get(2, 1).is_none());
        assert_eq!(table.get(0, 1).unwrap().travel_time, 10.);
        assert_eq!(table.max_node_index(), Some(2));
    }

    #[test]
    fn test_edge_table_rejects_bad_rows() {
        let dup = EdgeTable::new(vec![
            EdgeAttributes::new(1, 0, 1, 1., 10., 1.),
            EdgeAttributes::new(2, 0, 1, 1., 10., 1.),
        ]);
        assert!(matches!(dup, Err(AssignmentError::Network(_))));

        let nocap = EdgeTable::new(vec![EdgeAttributes::new(1, 0, 1, 1., 0., 1.)]);
        assert!(matches!(nocap, Err(AssignmentError::Network(_))));

        let negfft = EdgeTable::new(vec![EdgeAttributes::new(1, 0, 1, 1., 5., -1.)]);
        assert!(matches!(negfft, Err(AssignmentError::Network(_))));
    }

    #[test]
    fn test_reset_keeps_travel_time() {
        let mut table = EdgeTable::new(vec![EdgeAttributes::new(1, 0, 1, 1., 10., 2.)]).unwrap();
        {
            let edge = table.get_mut(0, 1).unwrap();
            edge.hour_flow = 30.;
            edge.travel_time = 5.;
        }
        table.reset_hour_flow();
        let edge = table.get(0, 1).unwrap();
        assert_eq!(edge.hour_flow, 0.);
        assert_eq!(edge.travel_time, 5.);
        assert_eq!(table.hour_flows(), vec![(1, 0.)]);
    }

    #[test]
    fn test_tables_from_csv() {
        let dir = tempfile::tempdir().unwrap();
        let edges_path = dir.path().join("edges.csv");
        let mut file = File::create(&edges_path).unwrap();
        writeln!(file, "edge_id,start,end,length,capacity,fft").unwrap();
        writeln!(file, "10,0,1,250.0,900,12.5").unwrap();
        writeln!(file, "11,1,0,250.0,900,12.5").unwrap();
        let table = EdgeTable::from_csv(&edges_path).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(1, 0).unwrap().edge_id, 11);
        assert_eq!(table.get(0, 1).unwrap().capacity, 900.);

        let nodes_path = dir.path().join("nodes.csv");
        let mut file = File::create(&nodes_path).unwrap();
        writeln!(file, "external_id,index").unwrap();
        writeln!(file, "65290756,0").unwrap();
        writeln!(file, "65290757,1").unwrap();
        let nodes = NodeTable::from_csv(&nodes_path).unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes.get_index(65290757), Some(1));
        assert_eq!(nodes.get_index(1), None);
        assert_eq!(nodes.max_index(), Some(1));
    }

    #[test]
    fn test_node_table_rejects_duplicates() {
        let result = NodeTable::new(vec![(5, 0), (5, 1)]);
        assert!(matches!(result, Err(AssignmentError::Network(_))));
    }
}
