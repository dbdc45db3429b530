//! Demo entry point: one synthetic-mode pipeline against a CSV table
//! destination.
//!
//! Loads sensor definitions from a JSON deployment file when
//! `SOFTSENSOR_CONFIG` is set, otherwise builds a self-contained demo
//! sensor (untrained artifact, step + PRBS patterns) and runs it for a few
//! seconds.

use std::{env, fs, thread, time::Duration};

use log::{error, info};

use softsensor::{
    config::{SensorConfig, SignalDescriptor, SignalGroup},
    model::ModelArtifact,
    DestinationConfig, Mode, PipelineController, SensorDefinition, SyntheticPattern,
};

const DEMO_RUN_SECS: u64 = 10;

fn demo_definition() -> Result<SensorDefinition, Box<dyn std::error::Error>> {
    let data_dir = std::path::Path::new("data");
    fs::create_dir_all(data_dir)?;

    let model_path = data_dir.join("demo_model.json");
    ModelArtifact::untrained(2, 1, 4, 7).save(&model_path)?;

    Ok(SensorDefinition {
        config: SensorConfig {
            id: 1,
            name: "demo".into(),
            description: "demo reactor".into(),
            sampling_period_ms: 250,
            input_size: 2,
            output_size: 1,
            lag: 4,
            buffer: 20,
            model_path,
            queue_capacity: 256,
        },
        signals: vec![
            SignalDescriptor {
                id: 1,
                name: "feed_rate".into(),
                group: SignalGroup::Input,
                setpoint: 0.0,
            },
            SignalDescriptor {
                id: 2,
                name: "valve_position".into(),
                group: SignalGroup::Input,
                setpoint: 0.0,
            },
            SignalDescriptor {
                id: 3,
                name: "quality".into(),
                group: SignalGroup::Output,
                setpoint: 0.0,
            },
        ],
        destination: DestinationConfig::CsvTable {
            path: data_dir.join("demo_records.csv"),
        },
        patterns: vec![
            SyntheticPattern::Step {
                low: 0.0,
                high: 1.0,
                period_ticks: 8,
            },
            SyntheticPattern::Prbs {
                low: -1.0,
                high: 1.0,
                seed: 0xBEEF,
            },
        ],
        mode: Mode::Synthetic,
    })
}

fn load_definitions() -> Result<Vec<SensorDefinition>, Box<dyn std::error::Error>> {
    match env::var("SOFTSENSOR_CONFIG") {
        Ok(path) => {
            info!("loading sensor definitions from {}", path);
            let text = fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&text)?)
        }
        Err(_) => Ok(vec![demo_definition()?]),
    }
}

fn main() {
    env_logger::init();

    let definitions = match load_definitions() {
        Ok(defs) => defs,
        Err(e) => {
            error!("failed to load sensor definitions: {}", e);
            std::process::exit(1);
        }
    };

    let controller = PipelineController::new();
    let ids: Vec<u32> = definitions.iter().map(|d| d.config.id).collect();
    for definition in definitions {
        controller.add_sensor(definition);
    }

    for &id in &ids {
        if let Err(e) = controller.start(id) {
            error!("sensor {}: start failed: {}", id, e);
        }
    }

    info!("running for {} seconds...", DEMO_RUN_SECS);
    thread::sleep(Duration::from_secs(DEMO_RUN_SECS));

    for &id in &ids {
        if let Some(snapshot) = controller.metrics(id) {
            info!(
                "sensor {}: {} frames, {} records persisted, {} drops, {} persist failures",
                id,
                snapshot.frames_produced,
                snapshot.records_persisted,
                snapshot.queue_drops,
                snapshot.persist_failures
            );
        }
        if let Err(e) = controller.stop(id) {
            error!("sensor {}: stop failed: {}", id, e);
        }
    }
}
