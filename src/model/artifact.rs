//! Trained model artifact: recurrent weights plus fitted scaler parameters
//! for the input and output spaces.
//!
//! Produced by the external training collaborator as a JSON bundle; loaded
//! once per run and read-only afterwards. Dimension mismatches against the
//! sensor configuration are fatal to the start attempt, checked here and
//! never per tick.

use std::{fs::File, io::BufReader, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    config::SensorConfig,
    error::StartError,
    model::{net::RecurrentNet, scaler::ScalerParameters},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub input_size: usize,
    pub output_size: usize,
    pub lag: usize,
    pub x_scaler: ScalerParameters,
    pub y_scaler: ScalerParameters,
    pub net: RecurrentNet,
}

impl ModelArtifact {
    pub fn load(path: &Path) -> Result<Self, StartError> {
        let file = File::open(path).map_err(|source| StartError::ArtifactIo {
            path: path.to_path_buf(),
            source,
        })?;
        let artifact: ModelArtifact = serde_json::from_reader(BufReader::new(file))?;
        Ok(artifact)
    }

    pub fn save(&self, path: &Path) -> Result<(), StartError> {
        let file = File::create(path).map_err(|source| StartError::ArtifactIo {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::to_writer(file, self)?;
        Ok(())
    }

    /// Cross-checks artifact internals and the sensor configuration.
    pub fn validate(&self, cfg: &SensorConfig) -> Result<(), StartError> {
        self.x_scaler.validate("input scaler")?;
        self.y_scaler.validate("output scaler")?;
        self.net.validate()?;

        let checks = [
            ("artifact input size", cfg.input_size, self.input_size),
            ("artifact output size", cfg.output_size, self.output_size),
            ("artifact lag", cfg.lag, self.lag),
            ("input scaler width", cfg.input_size, self.x_scaler.n_features()),
            ("output scaler width", cfg.output_size, self.y_scaler.n_features()),
            ("net input size", cfg.input_size, self.net.input_size),
            ("net output size", cfg.output_size, self.net.output_size),
        ];
        for (context, expected, found) in checks {
            if expected != found {
                return Err(StartError::DimensionMismatch {
                    context,
                    expected,
                    found,
                });
            }
        }
        Ok(())
    }

    /// Untrained artifact with reproducible weights and identity scaling.
    /// Good enough to exercise a pipeline end to end without a training
    /// run.
    pub fn untrained(input_size: usize, output_size: usize, lag: usize, seed: u64) -> Self {
        Self {
            input_size,
            output_size,
            lag,
            x_scaler: ScalerParameters::identity(input_size),
            y_scaler: ScalerParameters::identity(output_size),
            net: RecurrentNet::seeded(input_size, output_size, 16, seed),
        }
    }
}
