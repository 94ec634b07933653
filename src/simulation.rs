use std::path::{Path, PathBuf};
use std::time::Instant;

use rand::SeedableRng;
use rand_isaac::Isaac64Rng;
use yaml_rust::Yaml;
use yaml_rust::YamlLoader;

use super::demand::{self, OdPair};
use super::error::{AssignmentError, Result};
use super::flow;
use super::graph_state::GraphState;
use super::io_utils;
use super::network::{EdgeTable, NodeTable};
use super::routing::RoutingPool;
use super::update::{self, UpdateSummary};


static DEFAULT_SEED: u64 = 100;
static DEFAULT_NUM_WORKERS: usize = 1;

fn missing(key: &str) -> AssignmentError {
    AssignmentError::Config(format!("missing or invalid '{}'", key))
}

fn yaml_path(yaml_cfg: &Yaml, key: &str, base_dir: &Path) -> Result<PathBuf> {
    let path = yaml_cfg[key].as_str().ok_or_else(|| missing(key))?;
    Ok(io_utils::str_to_absolute_path(path, base_dir))
}

fn yaml_u32_list(yaml_cfg: &Yaml, key: &str) -> Result<Vec<u32>> {
    let items = yaml_cfg[key].as_vec().ok_or_else(|| missing(key))?;
    items.iter().map(|item| match item.as_i64() {
        Some(val) if val >= 0 => Ok(val as u32),
        _ => Err(missing(key)),
    }).collect()
}

fn yaml_as_f64(item: &Yaml) -> Option<f64> {
    item.as_f64().or_else(|| item.as_i64().map(|val| val as f64))
}

/// Everything the driver needs to run: inputs, simulated range, increments and workers.
#[derive(Clone, Debug)]
pub struct AssignmentConfig {
    pub nodes_path: PathBuf,
    pub edges_path: PathBuf,
    // initial weights; when None the graph starts at free-flow times
    pub graph_path: Option<PathBuf>,
    // OD files for one hour, with {day} and {hour} placeholders
    pub od_paths: Vec<String>,
    pub output_dir: PathBuf,
    pub days: Vec<u32>,
    pub hours: Vec<u32>,
    pub increment_weights: Vec<f64>,
    pub num_workers: usize,
    pub seed: u64,
    pub write_travel_times: bool,
    pub write_graph: bool,
}

impl AssignmentConfig {
    /// Parses the yaml config. Relative paths are taken relative to `base_dir`.
    pub fn from_yaml(yaml_cfg: &Yaml, base_dir: &Path) -> Result<AssignmentConfig> {
        let graph_path = if yaml_cfg["graph_path"].is_badvalue() {
            None
        } else {
            Some(yaml_path(yaml_cfg, "graph_path", base_dir)?)
        };

        let od_paths = yaml_cfg["od_paths"].as_vec().ok_or_else(|| missing("od_paths"))?
            .iter()
            .map(|item| item.as_str().map(|template| {
                io_utils::str_to_absolute_path(template, base_dir).to_string_lossy().into_owned()
            }).ok_or_else(|| missing("od_paths")))
            .collect::<Result<Vec<String>>>()?;
        if od_paths.is_empty() {
            return Err(AssignmentError::Config(String::from("no od_paths given")));
        }

        let has_weights = !yaml_cfg["increment_weights"].is_badvalue();
        let has_count = !yaml_cfg["num_increments"].is_badvalue();
        let increment_weights = match (has_weights, has_count) {
            (true, false) => {
                yaml_cfg["increment_weights"].as_vec()
                    .ok_or_else(|| missing("increment_weights"))?
                    .iter()
                    .map(|item| yaml_as_f64(item).ok_or_else(|| missing("increment_weights")))
                    .collect::<Result<Vec<f64>>>()?
            }
            (false, true) => {
                match yaml_cfg["num_increments"].as_i64() {
                    Some(num) if num > 0 => demand::uniform_increment_weights(num as usize),
                    _ => return Err(missing("num_increments")),
                }
            }
            _ => return Err(AssignmentError::Config(String::from(
                "exactly one of increment_weights and num_increments is required"))),
        };
        demand::validate_increment_weights(&increment_weights)?;

        let num_workers = match &yaml_cfg["num_workers"] {
            Yaml::BadValue => DEFAULT_NUM_WORKERS,
            val => match val.as_i64() {
                Some(num) if num > 0 => num as usize,
                _ => return Err(missing("num_workers")),
            },
        };
        let seed = match &yaml_cfg["seed"] {
            Yaml::BadValue => DEFAULT_SEED,
            val => match val.as_i64() {
                Some(seed) if seed >= 0 => seed as u64,
                _ => return Err(missing("seed")),
            },
        };
        let flag = |key: &str| match &yaml_cfg[key] {
            Yaml::BadValue => Ok(false),
            val => val.as_bool().ok_or_else(|| missing(key)),
        };

        Ok(AssignmentConfig {
            nodes_path: yaml_path(yaml_cfg, "nodes_path", base_dir)?,
            edges_path: yaml_path(yaml_cfg, "edges_path", base_dir)?,
            graph_path,
            od_paths,
            output_dir: yaml_path(yaml_cfg, "output_dir", base_dir)?,
            days: yaml_u32_list(yaml_cfg, "days")?,
            hours: yaml_u32_list(yaml_cfg, "hours")?,
            increment_weights,
            num_workers,
            seed,
            write_travel_times: flag("write_travel_times")?,
            write_graph: flag("write_graph")?,
        })
    }

    pub fn from_file(config_path: &Path) -> Result<AssignmentConfig> {
        let file_contents = std::fs::read_to_string(config_path)
            .map_err(|err| AssignmentError::io(config_path, err))?;
        let docs = YamlLoader::load_from_str(&file_contents)
            .map_err(|err| {
                AssignmentError::Config(format!("{}: {}", config_path.display(), err))
            })?;
        let yaml_cfg = docs.get(0).ok_or_else(|| AssignmentError::Config(
            format!("{} is empty", config_path.display())))?;
        let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
        AssignmentConfig::from_yaml(yaml_cfg, base_dir)
    }

    pub fn od_paths_for(&self, day: u32, hour: u32) -> Vec<PathBuf> {
        self.od_paths.iter()
            .map(|template| PathBuf::from(io_utils::fill_day_hour(template, day, hour)))
            .collect()
    }
}

pub fn edge_flow_path(output_dir: &Path, day: u32, hour: u32) -> PathBuf {
    output_dir.join(format!("DY{}", day)).join(format!("edge_flow_DY{}_HR{}.csv", day, hour))
}

pub fn travel_time_path(output_dir: &Path, day: u32, hour: u32) -> PathBuf {
    output_dir.join(format!("DY{}", day)).join(format!("travel_time_DY{}_HR{}.csv", day, hour))
}

pub fn graph_result_path(output_dir: &Path, day: u32, hour: u32) -> PathBuf {
    output_dir.join(format!("DY{}", day))
        .join(format!("network_result_DY{}_HR{}.mtx", day, hour))
}

/// Writes (edge id, hour flow) rows with header `edge_id,hour_flow`.
pub fn write_edge_flows(csvpath: &Path, edge_flows: &[(i64, f64)]) -> Result<()> {
    io_utils::create_parent_dirs(csvpath)?;
    let to_csv_err = |err: csv::Error| AssignmentError::csv(csvpath, err);
    let mut writer = csv::Writer::from_path(csvpath).map_err(to_csv_err)?;
    writer.write_record(&["edge_id", "hour_flow"]).map_err(to_csv_err)?;
    for (edge_id, hour_flow) in edge_flows {
        writer.write_record(&[edge_id.to_string(), hour_flow.to_string()]).map_err(to_csv_err)?;
    }
    writer.flush().map_err(|err| AssignmentError::io(csvpath, err))
}

pub fn read_edge_flows(csvpath: &Path) -> Result<Vec<(i64, f64)>> {
    let rows = io_utils::read_rows(csvpath)?;
    rows.iter().map(|row| -> Result<(i64, f64)> {
        Ok((io_utils::parse_field(row, "edge_id", csvpath)?,
            io_utils::parse_field(row, "hour_flow", csvpath)?))
    }).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct TravelTimeSample {
    pub increment: usize,
    // shortest-path distance, None if the destination wasn't reached
    pub distance: Option<f64>,
}

pub fn write_travel_times(csvpath: &Path, samples: &[TravelTimeSample]) -> Result<()> {
    io_utils::create_parent_dirs(csvpath)?;
    let to_csv_err = |err: csv::Error| AssignmentError::csv(csvpath, err);
    let mut writer = csv::Writer::from_path(csvpath).map_err(to_csv_err)?;
    writer.write_record(&["increment", "distance"]).map_err(to_csv_err)?;
    for sample in samples {
        let distance = sample.distance.map(|dd| dd.to_string()).unwrap_or_default();
        writer.write_record(&[sample.increment.to_string(), distance]).map_err(to_csv_err)?;
    }
    writer.flush().map_err(|err| AssignmentError::io(csvpath, err))
}

pub struct IncrementResults {
    pub num_reached: usize,
    pub travel_times: Vec<Option<f64>>,
    pub update: UpdateSummary,
}

pub struct HourResults {
    pub day: u32,
    pub hour: u32,
    pub num_od_pairs: usize,
    pub num_reached: usize,
    pub edge_flows: Vec<(i64, f64)>,
    pub travel_times: Vec<TravelTimeSample>,
    // largest t_new / fft reached by any edge update during the hour
    pub max_delay_ratio: f64,
}

impl HourResults {
    pub fn num_unreached(&self) -> usize {
        self.num_od_pairs - self.num_reached
    }

    pub fn mean_travel_time(&self) -> Option<f64> {
        let reached: Vec<f64> = self.travel_times.iter().filter_map(|ss| ss.distance).collect();
        if reached.is_empty() {
            None
        } else {
            Some(reached.iter().sum::<f64>() / reached.len() as f64)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HourSummary {
    pub day: u32,
    pub hour: u32,
    pub num_od_pairs: usize,
    pub num_reached: usize,
    pub num_unreached: usize,
    pub mean_travel_time: Option<f64>,
    pub max_delay_ratio: f64,
    pub elapsed_s: f64,
}

pub struct Simulator {
    cfg: AssignmentConfig,
    nodes: NodeTable,
    edges: EdgeTable,
    graph: GraphState,
    pool: RoutingPool,
    rng: Isaac64Rng,
}

impl Simulator {
    pub fn from_cfg(config_path_str: &str) -> Result<Simulator> {
        let cfg = AssignmentConfig::from_file(Path::new(config_path_str))?;
        let nodes = NodeTable::from_csv(&cfg.nodes_path)?;
        let edges = EdgeTable::from_csv(&cfg.edges_path)?;
        Simulator::new(cfg, nodes, edges)
    }

    /// Builds the routing graph from the edge table (and the initial weights file, if one is
    /// configured) and starts the worker pool.
    pub fn new(cfg: AssignmentConfig, nodes: NodeTable, mut edges: EdgeTable)
               -> Result<Simulator> {
        demand::validate_increment_weights(&cfg.increment_weights)?;
        let num_nodes = match (edges.max_node_index(), nodes.max_index()) {
            (None, None) => 0,
            (ee, nn) => ee.unwrap_or(0).max(nn.unwrap_or(0)) + 1,
        };
        let mut graph = GraphState::from_edge_table(&edges, num_nodes)?;
        if let Some(graph_path) = &cfg.graph_path {
            graph.load_matrix_market_weights(graph_path, &mut edges)?;
        }
        let pool = RoutingPool::new(cfg.num_workers)?;
        let rng = Isaac64Rng::seed_from_u64(cfg.seed);
        log::info!("graph has {} nodes and {} edges; {} increments on {} workers",
                   graph.node_count(), graph.edge_count(), cfg.increment_weights.len(),
                   pool.num_workers());
        Ok(Simulator { cfg, nodes, edges, graph, pool, rng })
    }

    /// Simulates every configured day and hour in order, writing each hour's results.
    pub fn run(&mut self) -> Result<Vec<HourSummary>> {
        let t_run = Instant::now();
        let mut summaries = vec![];
        let days = self.cfg.days.clone();
        let hours = self.cfg.hours.clone();
        for day in &days {
            for hour in &hours {
                log::info!("*************** DY{} HR{} ***************", day, hour);
                let t_hour = Instant::now();
                let od = self.load_hour_demand(*day, *hour)?;
                let results = self.run_hour(*day, *hour, od)?;
                self.write_hour_results(&results)?;

                let summary = HourSummary {
                    day: *day,
                    hour: *hour,
                    num_od_pairs: results.num_od_pairs,
                    num_reached: results.num_reached,
                    num_unreached: results.num_unreached(),
                    mean_travel_time: results.mean_travel_time(),
                    max_delay_ratio: results.max_delay_ratio,
                    elapsed_s: t_hour.elapsed().as_secs_f64(),
                };
                log::info!("DY{}_HR{}: {} OD pairs, {} reached, {} not reached, \
                            mean travel time {:?}, max delay {:.3}, {:.3} sec",
                           day, hour, summary.num_od_pairs, summary.num_reached,
                           summary.num_unreached, summary.mean_travel_time,
                           summary.max_delay_ratio, summary.elapsed_s);
                summaries.push(summary);
            }
        }
        log::info!("total run time: {:.3} sec", t_run.elapsed().as_secs_f64());
        Ok(summaries)
    }

    /// Reads, translates and shuffles the OD demand of one hour.
    pub fn load_hour_demand(&mut self, day: u32, hour: u32) -> Result<Vec<OdPair>> {
        let t_od = Instant::now();
        let paths = self.cfg.od_paths_for(day, hour);
        let path_refs: Vec<&Path> = paths.iter().map(|pp| pp.as_path()).collect();
        let od = demand::load_hour_demand(&path_refs, &self.nodes, &mut self.rng)?;
        log::debug!("DY{}_HR{}: {:.3} sec to read {} OD pairs",
                    day, hour, t_od.elapsed().as_secs_f64(), od.len());
        Ok(od)
    }

    /// Runs the incremental assignment of one hour of demand. Hourly flows start from zero;
    /// travel times carry over from the previous hour.
    pub fn run_hour(&mut self, day: u32, hour: u32, od: Vec<OdPair>) -> Result<HourResults> {
        self.edges.reset_hour_flow();
        let increments = demand::partition_increments(&od, &self.cfg.increment_weights,
                                                      &mut self.rng)?;
        let mut travel_times = Vec::with_capacity(od.len());
        let mut num_reached = 0;
        let mut max_delay_ratio: f64 = 0.;
        for (incre_id, incre_od) in increments.iter().enumerate() {
            let results = self.run_increment(day, hour, incre_id, incre_od)?;
            num_reached += results.num_reached;
            max_delay_ratio = max_delay_ratio.max(results.update.max_delay_ratio);
            travel_times.extend(results.travel_times.into_iter()
                .map(|distance| TravelTimeSample { increment: incre_id, distance }));
        }
        Ok(HourResults {
            day,
            hour,
            num_od_pairs: od.len(),
            num_reached,
            edge_flows: self.edges.hour_flows(),
            travel_times,
            max_delay_ratio,
        })
    }

    /// One increment: route on a snapshot of the current weights, sum the flow per edge, then
    /// update the graph. The update finishes before this returns, so the next increment routes
    /// on the new weights.
    pub fn run_increment(&mut self, day: u32, hour: u32, incre_id: usize, od: &[OdPair])
                         -> Result<IncrementResults> {
        let t_incre = Instant::now();
        let snapshot = self.graph.snapshot();
        let outcomes = self.pool.route_increment(&snapshot, od)?;
        let num_reached = outcomes.iter().filter(|oo| oo.is_reached()).count();
        log::info!("DY{}_HR{} INC {}: {} O --> {} D found, routing {:.3} sec on {} workers",
                   day, hour, incre_id, od.len(), num_reached, t_incre.elapsed().as_secs_f64(),
                   self.pool.num_workers());

        let flows = flow::reduce_edge_flow(&outcomes);
        log::debug!("DY{}_HR{} INC {}: reduce found {} edges", day, hour, incre_id, flows.len());

        let t_update = Instant::now();
        let update = update::apply_increment(&flows, &mut self.edges, &mut self.graph)?;
        log::info!("DY{}_HR{} INC {}: {} edges updated, max volume {}, max delay {:.3}, \
                    updating time {:.3} sec",
                   day, hour, incre_id, update.updated_edges, update.max_volume,
                   update.max_delay_ratio, t_update.elapsed().as_secs_f64());

        Ok(IncrementResults {
            num_reached,
            travel_times: outcomes.iter().map(|oo| oo.travel_time()).collect(),
            update,
        })
    }

    pub fn write_hour_results(&self, results: &HourResults) -> Result<()> {
        let output_dir = &self.cfg.output_dir;
        let path = edge_flow_path(output_dir, results.day, results.hour);
        write_edge_flows(&path, &results.edge_flows)?;
        log::debug!("wrote hour flows to {}", path.display());
        if self.cfg.write_travel_times {
            write_travel_times(&travel_time_path(output_dir, results.day, results.hour),
                               &results.travel_times)?;
        }
        if self.cfg.write_graph {
            self.graph.write_matrix_market(
                &graph_result_path(output_dir, results.day, results.hour))?;
        }
        Ok(())
    }

    pub fn get_edges(&self) -> &EdgeTable {
        &self.edges
    }

    pub fn get_graph(&self) -> &GraphState {
        &self.graph
    }

    pub fn get_config(&self) -> &AssignmentConfig {
        &self.cfg
    }
}
