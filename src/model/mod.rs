//! Model artifact loading, min-max scaling, and the deterministic
//! sequence-model forward pass consumed by the inference stage.

pub mod artifact;
pub mod net;
pub mod scaler;

pub use artifact::ModelArtifact;
pub use net::{RecurrentNet, SequenceModel};
pub use scaler::ScalerParameters;
