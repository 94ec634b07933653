use std::path::Path;

use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::Rng;

use super::error::{AssignmentError, OdEnd, Result};
use super::io_utils;
use super::network::NodeTable;


/// Tolerance on the sum of the increment weights.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// One OD record as it appears in the demand files, in external node ids.
#[derive(PartialEq, Debug, Clone)]
pub struct RawOdRecord {
    pub origin: i64,
    pub destination: i64,
    pub flow: f64,
}

/// One OD pair in the routing index space.
#[derive(PartialEq, Debug, Clone)]
pub struct OdPair {
    pub start_sp: usize,
    pub end_sp: usize,
    // number of travellers
    pub flow: f64,
}

impl OdPair {
    pub fn new(start_sp: usize, end_sp: usize, flow: f64) -> OdPair {
        OdPair { start_sp, end_sp, flow }
    }
}

/// Reads an OD file with columns `O,D,flow`. Every flow must be a finite, non-negative
/// traveller count.
pub fn read_od_csv(csvpath: &Path) -> Result<Vec<RawOdRecord>> {
    let rows = io_utils::read_rows(csvpath)?;
    let mut records = Vec::with_capacity(rows.len());
    for (row_idx, row) in rows.iter().enumerate() {
        let flow: f64 = io_utils::parse_field(row, "flow", csvpath)?;
        if !flow.is_finite() || flow < 0. {
            // line numbers count the header
            return Err(AssignmentError::input_format(
                csvpath, format!("line {}: bad OD flow {}", row_idx + 2, flow)));
        }
        records.push(RawOdRecord {
            origin: io_utils::parse_field(row, "O", csvpath)?,
            destination: io_utils::parse_field(row, "D", csvpath)?,
            flow,
        });
    }
    Ok(records)
}

/// Translates external node ids into routing indices. Any id missing from the node table is
/// a mapping error.
pub fn translate_od(records: &[RawOdRecord], nodes: &NodeTable) -> Result<Vec<OdPair>> {
    records.iter().map(|rec| -> Result<OdPair> {
        let start_sp = nodes.get_index(rec.origin).ok_or(AssignmentError::Mapping {
            external_id: rec.origin,
            end: OdEnd::Origin,
        })?;
        let end_sp = nodes.get_index(rec.destination).ok_or(AssignmentError::Mapping {
            external_id: rec.destination,
            end: OdEnd::Destination,
        })?;
        Ok(OdPair::new(start_sp, end_sp, rec.flow))
    }).collect()
}

/// Loads one hour of demand: concatenates every given OD file, translates it into the routing
/// index space and shuffles the rows with `rng`.
pub fn load_hour_demand<R: Rng>(od_paths: &[&Path], nodes: &NodeTable, rng: &mut R)
                                -> Result<Vec<OdPair>> {
    let mut records = vec![];
    for path in od_paths {
        let file_records = read_od_csv(path)?;
        log::debug!("read {} OD records from {}", file_records.len(), path.display());
        records.extend(file_records);
    }
    let mut od = translate_od(&records, nodes)?;
    od.shuffle(rng);
    Ok(od)
}

/// Checks that the weights form a probability distribution over the increments.
pub fn validate_increment_weights(weights: &[f64]) -> Result<()> {
    if weights.is_empty() {
        return Err(AssignmentError::IncrementWeights(String::from("no increments")));
    }
    if let Some(bad) = weights.iter().find(|ww| !(**ww >= 0.) || !ww.is_finite()) {
        return Err(AssignmentError::IncrementWeights(format!("bad weight {}", bad)));
    }
    let total: f64 = weights.iter().sum();
    if (total - 1.).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(AssignmentError::IncrementWeights(format!("weights sum to {}", total)));
    }
    Ok(())
}

/// Equal weights for `num_increments` increments.
pub fn uniform_increment_weights(num_increments: usize) -> Vec<f64> {
    vec![1. / num_increments as f64; num_increments]
}

/// Splits the OD pairs into `weights.len()` disjoint increments, drawing each pair's increment
/// independently from the weight distribution. Increment sizes are therefore only roughly
/// proportional to the weights.
pub fn partition_increments<R: Rng>(od: &[OdPair], weights: &[f64], rng: &mut R)
                                    -> Result<Vec<Vec<OdPair>>> {
    validate_increment_weights(weights)?;
    let dist = WeightedIndex::new(weights)
        .map_err(|err| AssignmentError::IncrementWeights(err.to_string()))?;
    let mut increments = vec![vec![]; weights.len()];
    for pair in od {
        increments[dist.sample(rng)].push(pair.clone());
    }
    Ok(increments)
}
