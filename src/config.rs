//! Sensor configuration and live signal setpoints.
//!
//! `SensorConfig` is immutable for the lifetime of a run. Setpoints live in
//! a `SignalHub`: one atomic cell per signal so the external configuration
//! layer (or the synthetic generator) can write concurrently while the
//! sampling stage reads without locking. Column order is fixed once at hub
//! construction (ascending signal id) and never changes during a run.

use std::{
    path::PathBuf,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::error::StartError;

fn default_queue_capacity() -> usize {
    1024
}

/// Static per-sensor pipeline parameters, supplied by the external
/// configuration store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Sampling period in milliseconds.
    pub sampling_period_ms: u64,
    pub input_size: usize,
    pub output_size: usize,
    /// Number of most recent frames retained for inference.
    pub lag: usize,
    /// Number of most recent records the sink retains.
    pub buffer: usize,
    pub model_path: PathBuf,
    /// Capacity of the inter-stage queues.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl SensorConfig {
    pub fn sampling_period(&self) -> Duration {
        Duration::from_millis(self.sampling_period_ms)
    }

    /// Checked once per `start` attempt, before anything is launched.
    pub fn validate(&self) -> Result<(), StartError> {
        if self.sampling_period_ms == 0 {
            return Err(StartError::InvalidPeriod);
        }
        if self.lag == 0 || self.buffer == 0 || self.queue_capacity == 0 {
            return Err(StartError::InvalidWindow);
        }
        if self.input_size == 0 {
            return Err(StartError::NoInputSignals);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalGroup {
    Input,
    Output,
}

/// One configured signal as supplied by the configuration store. The
/// `setpoint` here is only the initial value; live values go through the
/// `SignalHub`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalDescriptor {
    pub id: u32,
    pub name: String,
    pub group: SignalGroup,
    #[serde(default)]
    pub setpoint: f64,
}

struct SignalCell {
    id: u32,
    name: String,
    /// f64 bit pattern. NaN marks "no value available".
    bits: AtomicU64,
}

impl SignalCell {
    fn new(id: u32, name: String, value: f64) -> Self {
        Self {
            id,
            name,
            bits: AtomicU64::new(value.to_bits()),
        }
    }

    fn load(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }

    fn store(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Release);
    }
}

/// Lock-free setpoint table shared between the core and the excluded
/// configuration layer. Inputs are read by `SampleSource` every tick;
/// outputs only contribute their names as persistence columns.
pub struct SignalHub {
    inputs: Vec<SignalCell>,
    outputs: Vec<SignalCell>,
}

impl SignalHub {
    /// Builds the hub from descriptors, fixing column order to ascending
    /// signal id within each group.
    pub fn new(descriptors: &[SignalDescriptor]) -> Self {
        let mut sorted: Vec<&SignalDescriptor> = descriptors.iter().collect();
        sorted.sort_by_key(|d| d.id);

        let mut inputs = Vec::new();
        let mut outputs = Vec::new();
        for d in sorted {
            let cell = SignalCell::new(d.id, d.name.clone(), d.setpoint);
            match d.group {
                SignalGroup::Input => inputs.push(cell),
                SignalGroup::Output => outputs.push(cell),
            }
        }
        Self { inputs, outputs }
    }

    pub fn input_len(&self) -> usize {
        self.inputs.len()
    }

    pub fn output_len(&self) -> usize {
        self.outputs.len()
    }

    pub fn input_names(&self) -> Vec<String> {
        self.inputs.iter().map(|c| c.name.clone()).collect()
    }

    pub fn output_names(&self) -> Vec<String> {
        self.outputs.iter().map(|c| c.name.clone()).collect()
    }

    /// Current input setpoints in fixed column order. May contain NaN for
    /// signals with no value available; the sampler substitutes the last
    /// known value.
    pub fn snapshot_inputs(&self) -> Vec<f64> {
        self.inputs.iter().map(|c| c.load()).collect()
    }

    /// Writes one input cell by column index. Used by the synthetic
    /// generator; out-of-range indexes are ignored.
    pub fn write_input(&self, index: usize, value: f64) {
        if let Some(cell) = self.inputs.get(index) {
            cell.store(value);
        }
    }

    /// Bulk setter for the external configuration layer: pairs of
    /// (signal id, setpoint). Unknown ids are skipped.
    pub fn set_values(&self, values: &[(u32, f64)]) {
        for &(id, value) in values {
            if let Some(cell) = self
                .inputs
                .iter()
                .chain(self.outputs.iter())
                .find(|c| c.id == id)
            {
                cell.store(value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptors() -> Vec<SignalDescriptor> {
        vec![
            SignalDescriptor {
                id: 7,
                name: "flow".into(),
                group: SignalGroup::Input,
                setpoint: 2.5,
            },
            SignalDescriptor {
                id: 3,
                name: "valve".into(),
                group: SignalGroup::Input,
                setpoint: 1.0,
            },
            SignalDescriptor {
                id: 9,
                name: "temp_out".into(),
                group: SignalGroup::Output,
                setpoint: 0.0,
            },
        ]
    }

    #[test]
    fn columns_are_ordered_by_id() {
        let hub = SignalHub::new(&descriptors());
        assert_eq!(hub.input_names(), vec!["valve", "flow"]);
        assert_eq!(hub.snapshot_inputs(), vec![1.0, 2.5]);
        assert_eq!(hub.output_names(), vec!["temp_out"]);
    }

    #[test]
    fn set_values_targets_by_id() {
        let hub = SignalHub::new(&descriptors());
        hub.set_values(&[(7, 4.0), (42, 99.0)]);
        assert_eq!(hub.snapshot_inputs(), vec![1.0, 4.0]);
    }

    #[test]
    fn write_input_ignores_out_of_range() {
        let hub = SignalHub::new(&descriptors());
        hub.write_input(5, 1.0);
        assert_eq!(hub.snapshot_inputs(), vec![1.0, 2.5]);
    }

    #[test]
    fn config_validation_rejects_zero_period() {
        let cfg = SensorConfig {
            id: 1,
            name: "s".into(),
            description: String::new(),
            sampling_period_ms: 0,
            input_size: 1,
            output_size: 1,
            lag: 4,
            buffer: 10,
            model_path: "model.json".into(),
            queue_capacity: 16,
        };
        assert!(matches!(cfg.validate(), Err(StartError::InvalidPeriod)));
    }
}
