//! # softsensor
//!
//! Concurrent soft-sensor pipelines: each sensor samples its input
//! setpoints on a fixed period, forecasts output values through a trained
//! sequence model with online min-max scaling, and persists the merged
//! input/output record to a time-series destination.
//!
//! ## Architecture
//! - **Clock** → **SampleSource** → **InferenceEngine** → **Sink**, one
//!   thread per stage per run, joined by bounded crossbeam channels and a
//!   per-run tick broadcast.
//! - **PipelineController** owns the per-sensor state machine (Stopped /
//!   Running / Stopping) and the Live/Synthetic mode flag; its five
//!   operations are the entire external control surface.
//! - In synthetic mode a **Generator** stage fabricates input setpoints
//!   from step and pseudo-random binary test patterns.
//!
//! ## Concurrency
//! - Per-run cancellation token and tick broadcaster — stopping one sensor
//!   never disturbs another.
//! - Non-blocking queue pushes with an explicit drop-and-count policy;
//!   tick-gated polling pops with a bounded wait so no stage can wedge a
//!   run in `Stopping`.

pub mod config;
pub mod controller;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod store;

pub use config::{SensorConfig, SignalDescriptor, SignalGroup, SignalHub};
pub use controller::{Mode, PipelineController, RunState, SensorDefinition};
pub use error::{ControlError, PersistError, StartError};
pub use model::{ModelArtifact, ScalerParameters, SequenceModel};
pub use pipeline::{Frame, Record, SyntheticPattern};
pub use store::DestinationConfig;
