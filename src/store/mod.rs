//! Persistence destinations.
//!
//! The sink persists through the `Destination` trait; which implementation
//! backs a sensor is deployment configuration, never core logic. Two real
//! destinations exist — a tagged time-series append (InfluxDB line
//! protocol) and a capacity-bounded CSV table rewritten each cycle — plus
//! an in-memory ring for tests and demos.

mod csv_table;
mod influx;

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::{
    config::{SensorConfig, SignalHub},
    error::{PersistError, StartError},
    pipeline::Record,
};

pub use csv_table::CsvTableDestination;
pub use influx::InfluxLineDestination;

pub trait Destination: Send {
    /// Persists the latest record. `history` is the sink's current
    /// retention buffer, newest last, for destinations that rewrite the
    /// full table each cycle.
    fn persist(&mut self, latest: &Record, history: &VecDeque<Record>) -> Result<(), PersistError>;
}

/// Deployment-time destination selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DestinationConfig {
    Memory,
    CsvTable {
        path: std::path::PathBuf,
    },
    Influx {
        url: String,
        org: String,
        bucket: String,
        token: String,
        /// Owning-entity tag value written alongside every point.
        owner: String,
    },
}

impl DestinationConfig {
    /// Opens the destination for one run. Fallible work (file creation)
    /// happens here, before any stage thread is spawned.
    pub fn open(
        &self,
        config: &SensorConfig,
        signals: &SignalHub,
    ) -> Result<Box<dyn Destination>, StartError> {
        match self {
            DestinationConfig::Memory => Ok(Box::new(MemoryDestination::default())),
            DestinationConfig::CsvTable { path } => Ok(Box::new(CsvTableDestination::open(
                path.clone(),
                signals.input_names(),
                signals.output_names(),
            )?)),
            DestinationConfig::Influx {
                url,
                org,
                bucket,
                token,
                owner,
            } => Ok(Box::new(InfluxLineDestination::new(
                url.clone(),
                org.clone(),
                bucket.clone(),
                token.clone(),
                config,
                owner.clone(),
                signals.input_names(),
                signals.output_names(),
            ))),
        }
    }
}

/// In-process destination. Clones share storage, so a test can keep a
/// probe handle while the sink owns the boxed copy.
#[derive(Clone, Default)]
pub struct MemoryDestination {
    records: Arc<Mutex<Vec<Record>>>,
    last_history: Arc<Mutex<Vec<Record>>>,
}

impl MemoryDestination {
    /// Every record ever persisted, in persist order.
    pub fn records(&self) -> Vec<Record> {
        self.records.lock().clone()
    }

    /// The sink's retention buffer as of the most recent persist.
    pub fn last_history(&self) -> Vec<Record> {
        self.last_history.lock().clone()
    }
}

impl Destination for MemoryDestination {
    fn persist(&mut self, latest: &Record, history: &VecDeque<Record>) -> Result<(), PersistError> {
        self.records.lock().push(latest.clone());
        *self.last_history.lock() = history.iter().cloned().collect();
        Ok(())
    }
}
