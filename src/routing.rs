// The map phase of an increment: every OD pair is routed independently on an immutable snapshot
// of the graph, in parallel on a pool that lives for the whole run.
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use super::demand::OdPair;
use super::error::{AssignmentError, Result};
use super::graph_state::GraphSnapshot;


/// The whole flow of one OD pair, attributed to one edge of its path.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeContribution {
    pub start: usize,
    pub end: usize,
    pub flow: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    Reached {
        edges: Vec<EdgeContribution>,
        distance: f64,
    },
    Unreachable,
}

impl RouteOutcome {
    pub fn is_reached(&self) -> bool {
        match self {
            RouteOutcome::Reached { .. } => true,
            RouteOutcome::Unreachable => false,
        }
    }

    /// The travel time sample of this OD pair: the path distance, or None if unreachable.
    pub fn travel_time(&self) -> Option<f64> {
        match self {
            RouteOutcome::Reached { distance, .. } => Some(*distance),
            RouteOutcome::Unreachable => None,
        }
    }

    pub fn contributions(&self) -> &[EdgeContribution] {
        match self {
            RouteOutcome::Reached { edges, .. } => edges.as_slice(),
            RouteOutcome::Unreachable => &[],
        }
    }
}

/// Routes a single OD pair on the snapshot.
pub fn route_od_pair(snapshot: &GraphSnapshot, pair: &OdPair) -> Result<RouteOutcome> {
    let sp = snapshot.shortest_path(pair.start_sp, pair.end_sp).map_err(|err| {
        AssignmentError::WorkerFailure(
            format!("OD {} -> {}: {}", pair.start_sp, pair.end_sp, err))
    })?;
    if !sp.is_reachable() {
        return Ok(RouteOutcome::Unreachable);
    }
    let edges = sp.edges().into_iter()
        .map(|(start, end)| EdgeContribution { start, end, flow: pair.flow })
        .collect();
    Ok(RouteOutcome::Reached { edges, distance: sp.distance })
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        String::from(*msg)
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        String::from("worker panicked")
    }
}

pub struct RoutingPool {
    pool: ThreadPool,
    num_workers: usize,
}

impl RoutingPool {
    pub fn new(num_workers: usize) -> Result<RoutingPool> {
        if num_workers == 0 {
            return Err(AssignmentError::Config(String::from("num_workers must be at least 1")));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(num_workers)
            .thread_name(|ii| format!("sp-worker-{}", ii))
            .build()
            .map_err(|err| AssignmentError::WorkerFailure(err.to_string()))?;
        Ok(RoutingPool { pool, num_workers })
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    /// Routes every OD pair of one increment. Returns only once all tasks are done, with one
    /// outcome per pair in input order; any failed or panicking task fails the whole batch.
    pub fn route_increment(&self, snapshot: &GraphSnapshot, od: &[OdPair])
                           -> Result<Vec<RouteOutcome>> {
        self.run_tasks(od, |pair| route_od_pair(snapshot, pair))
    }

    fn run_tasks<T, F>(&self, tasks: &[T], task_fn: F) -> Result<Vec<RouteOutcome>>
    where
        T: Sync,
        F: Fn(&T) -> Result<RouteOutcome> + Sync,
    {
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.pool.install(|| {
                tasks.par_iter().map(|task| task_fn(task)).collect::<Result<Vec<_>>>()
            })
        }));
        match result {
            Ok(outcomes) => outcomes,
            Err(payload) => Err(AssignmentError::WorkerFailure(panic_message(payload))),
        }
    }
}
