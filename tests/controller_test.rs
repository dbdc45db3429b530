//! Lifecycle control surface: start/stop/set_mode state machine, with real
//! clocks at short periods.

use std::{
    path::PathBuf,
    thread,
    time::{Duration, Instant},
};

use softsensor::{
    config::{SensorConfig, SignalDescriptor, SignalGroup},
    model::ModelArtifact,
    ControlError, DestinationConfig, Mode, PipelineController, RunState, SensorDefinition,
    SyntheticPattern,
};

const PERIOD_MS: u64 = 20;

fn definition(dir: &std::path::Path, id: u32) -> SensorDefinition {
    let model_path = dir.join(format!("model_{id}.json"));
    ModelArtifact::untrained(1, 1, 4, 5)
        .save(&model_path)
        .unwrap();

    SensorDefinition {
        config: SensorConfig {
            id,
            name: format!("sensor_{id}"),
            description: String::new(),
            sampling_period_ms: PERIOD_MS,
            input_size: 1,
            output_size: 1,
            lag: 4,
            buffer: 10,
            model_path,
            queue_capacity: 64,
        },
        signals: vec![
            SignalDescriptor {
                id: 1,
                name: "feed".into(),
                group: SignalGroup::Input,
                setpoint: 3.3,
            },
            SignalDescriptor {
                id: 2,
                name: "quality".into(),
                group: SignalGroup::Output,
                setpoint: 0.0,
            },
        ],
        destination: DestinationConfig::CsvTable {
            path: dir.join(format!("records_{id}.csv")),
        },
        patterns: vec![SyntheticPattern::Step {
            low: 0.0,
            high: 1.0,
            period_ticks: 1,
        }],
        mode: Mode::Live,
    }
}

fn wait_until(deadline: Duration, mut done: impl FnMut() -> bool) {
    let start = Instant::now();
    while !done() {
        assert!(start.elapsed() < deadline, "timed out");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn unknown_sensor_is_rejected() {
    let controller = PipelineController::new();
    assert!(matches!(
        controller.start(99),
        Err(ControlError::UnknownSensor(99))
    ));
    assert!(matches!(
        controller.get_state(99),
        Err(ControlError::UnknownSensor(99))
    ));
}

#[test]
fn lifecycle_misuse_is_rejected_without_side_effects() {
    let dir = tempfile::tempdir().unwrap();
    let controller = PipelineController::new();
    controller.add_sensor(definition(dir.path(), 1));

    // stop/set_mode before any start
    assert!(matches!(
        controller.stop(1),
        Err(ControlError::NotRunning(1))
    ));
    assert!(matches!(
        controller.set_mode(1, Mode::Synthetic),
        Err(ControlError::NotRunning(1))
    ));
    assert_eq!(controller.get_state(1).unwrap(), RunState::Stopped);

    controller.start(1).unwrap();
    assert_eq!(controller.get_state(1).unwrap(), RunState::Running);

    // double start leaves the existing run untouched
    assert!(matches!(
        controller.start(1),
        Err(ControlError::NotStopped(1))
    ));
    assert_eq!(controller.get_state(1).unwrap(), RunState::Running);

    controller.stop(1).unwrap();
    assert_eq!(controller.get_state(1).unwrap(), RunState::Stopped);
    assert!(matches!(
        controller.stop(1),
        Err(ControlError::NotRunning(1))
    ));
}

#[test]
fn run_produces_records_and_restart_reinitializes() {
    let dir = tempfile::tempdir().unwrap();
    let controller = PipelineController::new();
    controller.add_sensor(definition(dir.path(), 2));

    controller.start(2).unwrap();
    wait_until(Duration::from_secs(5), || {
        controller
            .metrics(2)
            .map(|m| m.records_persisted >= 3)
            .unwrap_or(false)
    });
    controller.stop(2).unwrap();
    assert_eq!(controller.get_state(2).unwrap(), RunState::Stopped);

    let csv = std::fs::read_to_string(dir.path().join("records_2.csv")).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "date_time,feed,quality");
    assert!(lines.len() >= 4);
    // Retention bound: header plus at most `buffer` rows.
    assert!(lines.len() <= 11);

    // A second run starts from a fresh zero-padded window and fresh
    // counters; no state leaks from the previous run.
    controller.start(2).unwrap();
    wait_until(Duration::from_secs(5), || {
        controller
            .metrics(2)
            .map(|m| m.frames_produced >= 1 && m.frames_produced < 100)
            .unwrap_or(false)
    });
    controller.stop(2).unwrap();
}

#[test]
fn start_failure_leaves_sensor_stopped() {
    let dir = tempfile::tempdir().unwrap();
    let mut def = definition(dir.path(), 3);
    def.config.model_path = PathBuf::from(dir.path().join("missing.json"));

    let controller = PipelineController::new();
    controller.add_sensor(def);

    assert!(controller.start(3).is_err());
    assert_eq!(controller.get_state(3).unwrap(), RunState::Stopped);
    // A clean start attempt still works afterwards.
    assert!(matches!(
        controller.stop(3),
        Err(ControlError::NotRunning(3))
    ));
}

#[test]
fn synthetic_mode_drives_setpoints_and_live_mode_releases_them() {
    let dir = tempfile::tempdir().unwrap();
    let controller = PipelineController::new();
    controller.add_sensor(definition(dir.path(), 4));
    let hub = controller.signal_hub(4).unwrap();

    controller.start(4).unwrap();
    assert_eq!(controller.get_mode(4).unwrap(), Mode::Live);

    let frames_before = || controller.metrics(4).map(|m| m.frames_produced).unwrap_or(0);
    wait_until(Duration::from_secs(5), || frames_before() >= 2);

    // Switch to synthetic: the step pattern overwrites the live setpoint.
    controller.set_mode(4, Mode::Synthetic).unwrap();
    assert_eq!(controller.get_mode(4).unwrap(), Mode::Synthetic);
    wait_until(Duration::from_secs(5), || {
        let v = hub.snapshot_inputs()[0];
        v == 0.0 || v == 1.0
    });

    // Repeated set_mode with the same mode is a no-op.
    controller.set_mode(4, Mode::Synthetic).unwrap();

    // Clock and sampling keep running across the switch.
    let mark = frames_before();
    wait_until(Duration::from_secs(5), || frames_before() > mark);

    // Back to live: the generator stops and external writes stick again.
    controller.set_mode(4, Mode::Live).unwrap();
    assert_eq!(controller.get_mode(4).unwrap(), Mode::Live);
    hub.set_values(&[(1, 7.7)]);
    thread::sleep(Duration::from_millis(PERIOD_MS * 4));
    hub.set_values(&[(1, 7.7)]);
    thread::sleep(Duration::from_millis(PERIOD_MS * 4));
    assert_eq!(hub.snapshot_inputs()[0], 7.7);

    controller.stop(4).unwrap();
}

#[test]
fn independent_sensors_do_not_share_cancellation() {
    let dir = tempfile::tempdir().unwrap();
    let controller = PipelineController::new();
    controller.add_sensor(definition(dir.path(), 5));
    controller.add_sensor(definition(dir.path(), 6));

    controller.start(5).unwrap();
    controller.start(6).unwrap();

    let frames = |id: u32| controller.metrics(id).map(|m| m.frames_produced).unwrap_or(0);
    wait_until(Duration::from_secs(5), || frames(5) >= 2 && frames(6) >= 2);

    // Stopping one sensor must not interrupt the other.
    controller.stop(5).unwrap();
    assert_eq!(controller.get_state(5).unwrap(), RunState::Stopped);
    assert_eq!(controller.get_state(6).unwrap(), RunState::Running);

    let mark = frames(6);
    wait_until(Duration::from_secs(5), || frames(6) > mark);
    controller.stop(6).unwrap();
}
