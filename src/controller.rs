//! Lifecycle control for per-sensor pipeline runs.
//!
//! State machine per sensor: Stopped → start → Running → stop → Stopping →
//! Stopped, with the Live/Synthetic mode flag orthogonal and togglable only
//! while Running. All fallible setup (validation, artifact load, dimension
//! checks, destination open) happens before any thread is spawned, so a
//! failed start is never observable as a partial run.
//!
//! Every run owns a fresh cancellation token and tick broadcaster; stopping
//! or restarting one sensor cannot interrupt another.

use std::{
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam::channel::bounded;
use dashmap::DashMap;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    config::{SensorConfig, SignalDescriptor, SignalHub},
    error::{ControlError, StartError},
    model::ModelArtifact,
    pipeline::{
        clock::tick_wait, CancelToken, Clock, Frame, Generator, InferenceEngine, MetricsSnapshot,
        PipelineMetrics, Record, SampleSource, Sink, SyntheticPattern, TickBroadcaster,
    },
    store::DestinationConfig,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Stopped,
    Running,
    Stopping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Live,
    Synthetic,
}

fn default_mode() -> Mode {
    Mode::Live
}

/// Everything the external configuration store supplies for one sensor.
#[derive(Clone, Serialize, Deserialize)]
pub struct SensorDefinition {
    pub config: SensorConfig,
    pub signals: Vec<SignalDescriptor>,
    pub destination: DestinationConfig,
    /// One pattern per input column, used in synthetic mode.
    #[serde(default)]
    pub patterns: Vec<SyntheticPattern>,
    #[serde(default = "default_mode")]
    pub mode: Mode,
}

struct GeneratorHandle {
    cancel: CancelToken,
    handle: JoinHandle<()>,
}

struct RunHandles {
    cancel: CancelToken,
    ticks: Arc<TickBroadcaster>,
    metrics: Arc<PipelineMetrics>,
    stages: Vec<JoinHandle<()>>,
    generator: Option<GeneratorHandle>,
}

struct SensorEntry {
    config: SensorConfig,
    hub: Arc<SignalHub>,
    destination: DestinationConfig,
    patterns: Vec<SyntheticPattern>,
    state: RunState,
    mode: Mode,
    run: Option<RunHandles>,
}

/// The only contract the excluded API layer may call: `start`, `stop`,
/// `get_state`, `set_mode`, `get_mode`.
#[derive(Default)]
pub struct PipelineController {
    sensors: DashMap<u32, SensorEntry>,
}

impl PipelineController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a sensor (configuration-store wiring, done at deployment
    /// time). Replaces any stopped entry with the same id.
    pub fn add_sensor(&self, definition: SensorDefinition) {
        let hub = Arc::new(SignalHub::new(&definition.signals));
        let id = definition.config.id;
        self.sensors.insert(
            id,
            SensorEntry {
                config: definition.config,
                hub,
                destination: definition.destination,
                patterns: definition.patterns,
                state: RunState::Stopped,
                mode: definition.mode,
                run: None,
            },
        );
        info!("[controller] sensor {} registered", id);
    }

    /// Setpoint hub for one sensor — the handle the external configuration
    /// layer writes live values through.
    pub fn signal_hub(&self, sensor_id: u32) -> Option<Arc<SignalHub>> {
        self.sensors.get(&sensor_id).map(|e| e.hub.clone())
    }

    /// Diagnostic counters of the current run, if one is active.
    pub fn metrics(&self, sensor_id: u32) -> Option<MetricsSnapshot> {
        self.sensors
            .get(&sensor_id)
            .and_then(|e| e.run.as_ref().map(|r| r.metrics.snapshot()))
    }

    pub fn get_state(&self, sensor_id: u32) -> Result<RunState, ControlError> {
        self.sensors
            .get(&sensor_id)
            .map(|e| e.state)
            .ok_or(ControlError::UnknownSensor(sensor_id))
    }

    pub fn get_mode(&self, sensor_id: u32) -> Result<Mode, ControlError> {
        self.sensors
            .get(&sensor_id)
            .map(|e| e.mode)
            .ok_or(ControlError::UnknownSensor(sensor_id))
    }

    pub fn start(&self, sensor_id: u32) -> Result<(), ControlError> {
        let mut entry = self
            .sensors
            .get_mut(&sensor_id)
            .ok_or(ControlError::UnknownSensor(sensor_id))?;
        if entry.state != RunState::Stopped {
            return Err(ControlError::NotStopped(sensor_id));
        }

        let run = launch(&entry)?;
        entry.run = Some(run);
        entry.state = RunState::Running;
        info!(
            "[controller] sensor {} running ({:?} mode, period {} ms)",
            sensor_id, entry.mode, entry.config.sampling_period_ms
        );
        Ok(())
    }

    pub fn stop(&self, sensor_id: u32) -> Result<(), ControlError> {
        let (run, grace) = {
            let mut entry = self
                .sensors
                .get_mut(&sensor_id)
                .ok_or(ControlError::UnknownSensor(sensor_id))?;
            if entry.state != RunState::Running {
                return Err(ControlError::NotRunning(sensor_id));
            }
            entry.state = RunState::Stopping;
            (entry.run.take(), entry.config.sampling_period())
            // Entry lock released here so state reads stay non-blocking
            // during the grace period.
        };

        if let Some(run) = run {
            run.cancel.cancel();
            // Grace window: roughly one sampling period for every stage to
            // observe the token and finish its cycle.
            thread::sleep(grace);

            if let Some(generator) = run.generator {
                generator.cancel.cancel();
                join_stage(generator.handle, "generator");
            }
            for handle in run.stages {
                join_stage(handle, "stage");
            }
        }

        let mut entry = self
            .sensors
            .get_mut(&sensor_id)
            .ok_or(ControlError::UnknownSensor(sensor_id))?;
        entry.state = RunState::Stopped;
        info!("[controller] sensor {} stopped", sensor_id);
        Ok(())
    }

    pub fn set_mode(&self, sensor_id: u32, mode: Mode) -> Result<(), ControlError> {
        let mut guard = self
            .sensors
            .get_mut(&sensor_id)
            .ok_or(ControlError::UnknownSensor(sensor_id))?;
        let entry = guard.value_mut();
        if entry.state != RunState::Running {
            return Err(ControlError::NotRunning(sensor_id));
        }
        if entry.mode == mode {
            return Ok(());
        }

        match mode {
            Mode::Synthetic => {
                if let Some(run) = entry.run.as_mut() {
                    let generator = spawn_generator(
                        entry.hub.clone(),
                        &entry.patterns,
                        &run.ticks,
                        entry.config.sampling_period(),
                        run.cancel.clone(),
                    );
                    run.generator = Some(generator);
                }
            }
            Mode::Live => {
                if let Some(generator) = entry.run.as_mut().and_then(|r| r.generator.take()) {
                    generator.cancel.cancel();
                    join_stage(generator.handle, "generator");
                }
            }
        }
        entry.mode = mode;
        info!("[controller] sensor {} mode -> {:?}", sensor_id, mode);
        Ok(())
    }
}

fn join_stage(handle: JoinHandle<()>, name: &str) {
    if handle.join().is_err() {
        warn!("[controller] {} thread panicked during shutdown", name);
    }
}

/// Fallible setup first, spawning last: by the time the first thread
/// exists, nothing can fail any more.
fn launch(entry: &SensorEntry) -> Result<RunHandles, StartError> {
    let config = &entry.config;
    config.validate()?;

    if entry.hub.input_len() != config.input_size {
        return Err(StartError::DimensionMismatch {
            context: "configured input signals",
            expected: config.input_size,
            found: entry.hub.input_len(),
        });
    }
    if entry.hub.output_len() != config.output_size {
        return Err(StartError::DimensionMismatch {
            context: "configured output signals",
            expected: config.output_size,
            found: entry.hub.output_len(),
        });
    }

    let artifact = ModelArtifact::load(&config.model_path)?;
    artifact.validate(config)?;

    let engine = InferenceEngine::new(
        Box::new(artifact.net),
        artifact.x_scaler,
        artifact.y_scaler,
        config.lag,
    )?;

    let destination = entry.destination.open(config, &entry.hub)?;

    // Nothing below this point fails.
    let period = config.sampling_period();
    let wait = tick_wait(period);
    let cancel = CancelToken::new();
    let ticks = Arc::new(TickBroadcaster::new());
    let metrics = Arc::new(PipelineMetrics::default());

    let (frame_tx, frame_rx) = bounded::<Frame>(config.queue_capacity);
    let (record_tx, record_rx) = bounded::<Record>(config.queue_capacity);

    let mut stages = Vec::with_capacity(4);

    let sampler = SampleSource::new(
        entry.hub.clone(),
        ticks.subscribe(),
        wait,
        frame_tx,
        cancel.clone(),
        metrics.clone(),
    );
    stages.push(thread::spawn(move || sampler.run()));

    {
        let tick_rx = ticks.subscribe();
        let cancel = cancel.clone();
        let metrics = metrics.clone();
        stages.push(thread::spawn(move || {
            engine.run(tick_rx, wait, frame_rx, record_tx, cancel, metrics)
        }));
    }

    let sink = Sink::new(
        record_rx,
        ticks.subscribe(),
        wait,
        cancel.clone(),
        destination,
        config.buffer,
        metrics.clone(),
    );
    stages.push(thread::spawn(move || sink.run()));

    let generator = match entry.mode {
        Mode::Synthetic => Some(spawn_generator(
            entry.hub.clone(),
            &entry.patterns,
            &ticks,
            period,
            cancel.clone(),
        )),
        Mode::Live => None,
    };

    // Clock last: every stage is subscribed before the first tick.
    let clock = Clock::new(period, ticks.clone(), cancel.clone());
    stages.push(thread::spawn(move || clock.run()));

    Ok(RunHandles {
        cancel,
        ticks,
        metrics,
        stages,
        generator,
    })
}

fn spawn_generator(
    hub: Arc<SignalHub>,
    patterns: &[SyntheticPattern],
    ticks: &TickBroadcaster,
    period: Duration,
    run_cancel: CancelToken,
) -> GeneratorHandle {
    let own_cancel = CancelToken::new();
    let generator = Generator::new(
        hub,
        patterns,
        ticks.subscribe(),
        tick_wait(period),
        run_cancel,
        own_cancel.clone(),
    );
    GeneratorHandle {
        cancel: own_cancel,
        handle: thread::spawn(move || generator.run()),
    }
}
