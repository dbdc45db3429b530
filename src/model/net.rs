//! Deterministic recurrent forward pass.
//!
//! The trained artifact bundles a single-layer gated recurrent network that
//! consumes, per step, the scaled input vector concatenated with the scaled
//! output history for that step, and emits one output vector per step
//! through a linear head. The inference stage only uses the last step.
//!
//! Determinism: the forward pass is pure floating-point arithmetic over
//! fixed weights; for a fixed input sequence the output is bit-for-bit
//! reproducible.

use ndarray::{Array1, Array2, ArrayView1};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::StartError;

/// Seam for the inference stage: anything that maps a scaled input window
/// plus a scaled output history to per-step outputs.
pub trait SequenceModel: Send {
    fn input_size(&self) -> usize;
    fn output_size(&self) -> usize;

    /// `window`: (lag, input_size) scaled inputs. `history`: (lag,
    /// output_size) scaled outputs from previous steps. Returns (lag,
    /// output_size).
    fn forward(&self, window: &Array2<f64>, history: &Array2<f64>) -> Array2<f64>;
}

/// GRU-style recurrent layer plus linear output head.
///
/// Weight shapes: gate matrices are (hidden, input+output+hidden); the head
/// is (output, hidden).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurrentNet {
    pub input_size: usize,
    pub output_size: usize,
    pub hidden_size: usize,
    pub w_update: Array2<f64>,
    pub b_update: Array1<f64>,
    pub w_reset: Array2<f64>,
    pub b_reset: Array1<f64>,
    pub w_cand: Array2<f64>,
    pub b_cand: Array1<f64>,
    pub w_head: Array2<f64>,
    pub b_head: Array1<f64>,
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

impl RecurrentNet {
    /// Small net with reproducible weights. Used by the demo binary and
    /// benches; real deployments load trained weights from the artifact.
    pub fn seeded(input_size: usize, output_size: usize, hidden_size: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let gate_cols = input_size + output_size + hidden_size;
        let mut mat = |rows: usize, cols: usize| {
            Array2::from_shape_fn((rows, cols), |_| rng.random_range(-0.5..0.5))
        };
        let w_update = mat(hidden_size, gate_cols);
        let w_reset = mat(hidden_size, gate_cols);
        let w_cand = mat(hidden_size, gate_cols);
        let w_head = mat(output_size, hidden_size);
        Self {
            input_size,
            output_size,
            hidden_size,
            w_update,
            b_update: Array1::zeros(hidden_size),
            w_reset,
            b_reset: Array1::zeros(hidden_size),
            w_cand,
            b_cand: Array1::zeros(hidden_size),
            w_head,
            b_head: Array1::zeros(output_size),
        }
    }

    /// Shape consistency, checked once at artifact load.
    pub fn validate(&self) -> Result<(), StartError> {
        let gate_cols = self.input_size + self.output_size + self.hidden_size;
        let gates = [
            (&self.w_update, &self.b_update),
            (&self.w_reset, &self.b_reset),
            (&self.w_cand, &self.b_cand),
        ];
        for (w, b) in gates {
            if w.nrows() != self.hidden_size || w.ncols() != gate_cols {
                return Err(StartError::DimensionMismatch {
                    context: "recurrent gate weights",
                    expected: gate_cols,
                    found: w.ncols(),
                });
            }
            if b.len() != self.hidden_size {
                return Err(StartError::DimensionMismatch {
                    context: "recurrent gate bias",
                    expected: self.hidden_size,
                    found: b.len(),
                });
            }
        }
        if self.w_head.nrows() != self.output_size || self.w_head.ncols() != self.hidden_size {
            return Err(StartError::DimensionMismatch {
                context: "output head weights",
                expected: self.hidden_size,
                found: self.w_head.ncols(),
            });
        }
        if self.b_head.len() != self.output_size {
            return Err(StartError::DimensionMismatch {
                context: "output head bias",
                expected: self.output_size,
                found: self.b_head.len(),
            });
        }
        Ok(())
    }

    fn gate(&self, w: &Array2<f64>, b: &Array1<f64>, u: ArrayView1<'_, f64>) -> Array1<f64> {
        w.dot(&u) + b
    }
}

impl SequenceModel for RecurrentNet {
    fn input_size(&self) -> usize {
        self.input_size
    }

    fn output_size(&self) -> usize {
        self.output_size
    }

    fn forward(&self, window: &Array2<f64>, history: &Array2<f64>) -> Array2<f64> {
        let lag = window.nrows();
        let mut h = Array1::<f64>::zeros(self.hidden_size);
        let mut out = Array2::<f64>::zeros((lag, self.output_size));

        for t in 0..lag {
            // u = [x_t ; y_t ; h]
            let mut u = Array1::<f64>::zeros(self.input_size + self.output_size + self.hidden_size);
            u.slice_mut(ndarray::s![..self.input_size])
                .assign(&window.row(t));
            u.slice_mut(ndarray::s![self.input_size..self.input_size + self.output_size])
                .assign(&history.row(t));
            u.slice_mut(ndarray::s![self.input_size + self.output_size..])
                .assign(&h);

            let z = self.gate(&self.w_update, &self.b_update, u.view()).mapv(sigmoid);
            let r = self.gate(&self.w_reset, &self.b_reset, u.view()).mapv(sigmoid);

            let mut u_cand = u.clone();
            {
                let mut h_part = u_cand.slice_mut(ndarray::s![self.input_size + self.output_size..]);
                h_part.assign(&(&r * &h));
            }
            let cand = self.gate(&self.w_cand, &self.b_cand, u_cand.view()).mapv(f64::tanh);

            let keep = z.mapv(|v| 1.0 - v);
            h = &keep * &h + &z * &cand;
            out.row_mut(t).assign(&(self.w_head.dot(&h) + &self.b_head));
        }

        out
    }
}
