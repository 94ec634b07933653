use std::path::PathBuf;

use thiserror::Error;


/// Which end of an OD record failed to translate into a routing index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OdEnd {
    Origin,
    Destination,
}

impl std::fmt::Display for OdEnd {
    fn fmt(&self, ff: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OdEnd::Origin => write!(ff, "origin"),
            OdEnd::Destination => write!(ff, "destination"),
        }
    }
}

/// Every fault that can abort an assignment run.
///
/// Unreachable destinations are not in here: they are a normal routing outcome.
#[derive(Debug, Error)]
pub enum AssignmentError {
    #[error("{end} node {external_id} has no routing index")]
    Mapping { external_id: i64, end: OdEnd },

    #[error("shortest-path worker failed: {0}")]
    WorkerFailure(String),

    #[error("i/o failure on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv failure on {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("malformed input {}: {msg}", .path.display())]
    InputFormat { path: PathBuf, msg: String },

    #[error("malformed network: {0}")]
    Network(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid increment weights: {0}")]
    IncrementWeights(String),
}

impl AssignmentError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> AssignmentError {
        AssignmentError::Io { path: path.into(), source }
    }

    pub fn input_format(path: impl Into<PathBuf>, msg: impl Into<String>) -> AssignmentError {
        AssignmentError::InputFormat { path: path.into(), msg: msg.into() }
    }

    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> AssignmentError {
        AssignmentError::Csv { path: path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, AssignmentError>;
