//! The concurrent runtime pipeline: Clock → SampleSource → InferenceEngine
//! → Sink, with an optional Generator fabricating setpoints in synthetic
//! mode.
//!
//! Each stage runs on its own thread, gated by a per-run tick broadcast and
//! connected by bounded crossbeam channels. Cancellation is cooperative:
//! stages check the run's token at loop boundaries and exit after finishing
//! the tick during which it was first observed.

pub mod clock;
pub mod generator;
pub mod inference;
pub mod metrics;
pub mod sampler;
pub mod sink;

use chrono::{DateTime, Utc};

pub use clock::{CancelToken, Clock, Tick, TickBroadcaster};
pub use generator::{Generator, SyntheticPattern};
pub use inference::InferenceEngine;
pub use metrics::{MetricsSnapshot, PipelineMetrics};
pub use sampler::SampleSource;
pub use sink::Sink;

/// One timestamped snapshot of input setpoints, in fixed column order.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub values: Vec<f64>,
}

/// A frame merged with its forecast outputs: the unit the sink persists.
/// The timestamp is inherited from the originating frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub inputs: Vec<f64>,
    pub outputs: Vec<f64>,
}
