//! Min-max feature scaling with fixed, fitted parameters.
//!
//! The parameters are loaded once from the model artifact and are immutable
//! afterwards; `transform` and `inverse_transform` are pure. Round-trip
//! invariant: `inverse_transform(transform(v)) == v` within floating
//! tolerance for any v in the fitted range.

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::StartError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerParameters {
    pub feature_range: (f64, f64),
    pub min_: Vec<f64>,
    pub scale_: Vec<f64>,
    pub data_min_: Vec<f64>,
    pub data_max_: Vec<f64>,
    pub data_range_: Vec<f64>,
    pub n_features_in_: usize,
    pub n_samples_seen_: u64,
}

impl ScalerParameters {
    /// Fits min-max parameters on a data matrix (rows = samples, columns =
    /// features). Used by tests and artifact tooling; at run time the
    /// parameters come pre-fitted from the artifact.
    pub fn fit(data: ArrayView2<'_, f64>, feature_range: (f64, f64)) -> Self {
        let (lo, hi) = feature_range;
        let n = data.ncols();
        let mut data_min = vec![f64::INFINITY; n];
        let mut data_max = vec![f64::NEG_INFINITY; n];
        for row in data.axis_iter(Axis(0)) {
            for (j, &v) in row.iter().enumerate() {
                data_min[j] = data_min[j].min(v);
                data_max[j] = data_max[j].max(v);
            }
        }

        let mut scale = Vec::with_capacity(n);
        let mut min = Vec::with_capacity(n);
        let mut range = Vec::with_capacity(n);
        for j in 0..n {
            let r = data_max[j] - data_min[j];
            // Constant columns scale by 1.0 so the transform stays invertible.
            let denom = if r.abs() < f64::EPSILON { 1.0 } else { r };
            let s = (hi - lo) / denom;
            scale.push(s);
            min.push(lo - data_min[j] * s);
            range.push(r);
        }

        Self {
            feature_range,
            min_: min,
            scale_: scale,
            data_min_: data_min,
            data_max_: data_max,
            data_range_: range,
            n_features_in_: n,
            n_samples_seen_: data.nrows() as u64,
        }
    }

    /// Identity scaler: transform and inverse are both no-ops. Used by the
    /// demo artifact and tests.
    pub fn identity(n_features: usize) -> Self {
        Self {
            feature_range: (0.0, 1.0),
            min_: vec![0.0; n_features],
            scale_: vec![1.0; n_features],
            data_min_: vec![0.0; n_features],
            data_max_: vec![1.0; n_features],
            data_range_: vec![1.0; n_features],
            n_features_in_: n_features,
            n_samples_seen_: 0,
        }
    }

    pub fn n_features(&self) -> usize {
        self.n_features_in_
    }

    /// Internal-consistency check, run once at artifact load.
    pub fn validate(&self, context: &'static str) -> Result<(), StartError> {
        for len in [
            self.min_.len(),
            self.scale_.len(),
            self.data_min_.len(),
            self.data_max_.len(),
            self.data_range_.len(),
        ] {
            if len != self.n_features_in_ {
                return Err(StartError::DimensionMismatch {
                    context,
                    expected: self.n_features_in_,
                    found: len,
                });
            }
        }
        Ok(())
    }

    /// Scales a (rows, features) matrix column-wise into the feature range.
    pub fn transform(&self, m: &Array2<f64>) -> Array2<f64> {
        let mut out = m.clone();
        for (j, mut col) in out.axis_iter_mut(Axis(1)).enumerate() {
            let s = self.scale_[j];
            let mn = self.min_[j];
            col.mapv_inplace(|v| v * s + mn);
        }
        out
    }

    /// Inverse of `transform` for a full matrix.
    pub fn inverse_transform(&self, m: &Array2<f64>) -> Array2<f64> {
        let mut out = m.clone();
        for (j, mut col) in out.axis_iter_mut(Axis(1)).enumerate() {
            let s = self.scale_[j];
            let mn = self.min_[j];
            col.mapv_inplace(|v| (v - mn) / s);
        }
        out
    }

    /// Inverse transform of a single scaled row.
    pub fn inverse_transform_row(&self, row: ArrayView1<'_, f64>) -> Vec<f64> {
        row.iter()
            .enumerate()
            .map(|(j, &v)| (v - self.min_[j]) / self.scale_[j])
            .collect()
    }
}
