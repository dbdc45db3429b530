//! Error taxonomy for the pipeline runtime.
//!
//! Setup errors are fatal to a `start` attempt and surfaced synchronously;
//! lifecycle misuse is rejected with no side effects; persistence failures
//! are contained inside the sink (logged, record dropped, never retried).

use std::path::PathBuf;

use thiserror::Error;

/// Fatal to a `start` attempt. No stages are launched when any of these
/// occur; the sensor stays `Stopped`.
#[derive(Debug, Error)]
pub enum StartError {
    #[error("sampling period must be greater than zero")]
    InvalidPeriod,

    #[error("lag and buffer capacity must be greater than zero")]
    InvalidWindow,

    #[error("sensor has no input signals")]
    NoInputSignals,

    #[error("failed to read model artifact {path}: {source}")]
    ArtifactIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed model artifact: {0}")]
    ArtifactFormat(#[from] serde_json::Error),

    #[error("{context}: expected {expected} features, found {found}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("failed to open destination: {0}")]
    Destination(#[from] std::io::Error),
}

/// Rejected control-surface calls. Lifecycle misuse never alters state.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("unknown sensor {0}")]
    UnknownSensor(u32),

    #[error("sensor {0} is not running")]
    NotRunning(u32),

    #[error("sensor {0} is not stopped")]
    NotStopped(u32),

    #[error(transparent)]
    Start(#[from] StartError),
}

/// A single failed persistence write. Logged by the sink and the record
/// dropped; the next cycle supersedes it.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("time-series endpoint returned status {status}")]
    Http { status: u16 },

    #[error("transport: {0}")]
    Transport(String),
}
