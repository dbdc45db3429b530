//! Windowed inference stage.
//!
//! Keeps a sliding window of the `lag` most recent frames (zero-padded at
//! run start) and a rolling, equally capped history of the model's own
//! scaled outputs. Each activation drains the frame queue in arrival
//! order; each frame produces exactly one record, so FIFO order is
//! preserved end to end.
//!
//! Deterministic by construction: scaling, the forward pass, and the
//! inverse scaling are pure, and no random or time-dependent state lives in
//! this stage.

use std::{collections::VecDeque, sync::Arc, time::Duration};

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender};
use log::debug;
use ndarray::Array2;

use crate::{
    error::StartError,
    model::{ScalerParameters, SequenceModel},
    pipeline::{CancelToken, Frame, PipelineMetrics, Record, Tick},
};

pub struct InferenceEngine {
    model: Box<dyn SequenceModel>,
    x_scaler: ScalerParameters,
    y_scaler: ScalerParameters,
    lag: usize,
    /// Raw input rows, always exactly `lag` entries (zeros until warm).
    window: VecDeque<Vec<f64>>,
    /// Scaled output history, (lag, output_size), zero-initialized.
    history: Array2<f64>,
}

impl InferenceEngine {
    /// Fails on scaler/model width mismatch; checked once at setup, never
    /// per tick.
    pub fn new(
        model: Box<dyn SequenceModel>,
        x_scaler: ScalerParameters,
        y_scaler: ScalerParameters,
        lag: usize,
    ) -> Result<Self, StartError> {
        if x_scaler.n_features() != model.input_size() {
            return Err(StartError::DimensionMismatch {
                context: "input scaler vs model",
                expected: model.input_size(),
                found: x_scaler.n_features(),
            });
        }
        if y_scaler.n_features() != model.output_size() {
            return Err(StartError::DimensionMismatch {
                context: "output scaler vs model",
                expected: model.output_size(),
                found: y_scaler.n_features(),
            });
        }
        if lag == 0 {
            return Err(StartError::InvalidWindow);
        }

        let input_size = model.input_size();
        let output_size = model.output_size();
        Ok(Self {
            model,
            x_scaler,
            y_scaler,
            lag,
            window: VecDeque::from(vec![vec![0.0; input_size]; lag]),
            history: Array2::zeros((lag, output_size)),
        })
    }

    /// Processes one frame: window append + trim, scale, forward pass,
    /// history roll, inverse scale.
    pub fn step(&mut self, frame: Frame) -> Record {
        self.window.push_back(frame.values.clone());
        while self.window.len() > self.lag {
            self.window.pop_front();
        }

        let input_size = self.model.input_size();
        let mut x = Array2::<f64>::zeros((self.lag, input_size));
        for (i, row) in self.window.iter().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                x[[i, j]] = v;
            }
        }

        let x_scaled = self.x_scaler.transform(&x);
        let z = self.model.forward(&x_scaled, &self.history);
        let last = z.row(self.lag - 1).to_owned();

        // Roll the output history up by one step and append the new last
        // step, keeping exactly `lag` rows.
        for i in 1..self.lag {
            let row = self.history.row(i).to_owned();
            self.history.row_mut(i - 1).assign(&row);
        }
        self.history.row_mut(self.lag - 1).assign(&last);

        let outputs = self.y_scaler.inverse_transform_row(last.view());

        Record {
            seq: frame.seq,
            timestamp: frame.timestamp,
            inputs: frame.values,
            outputs,
        }
    }

    #[cfg(test)]
    fn window_rows(&self) -> Vec<Vec<f64>> {
        self.window.iter().cloned().collect()
    }

    /// Stage loop: tick-gated, drains the frame queue in arrival order,
    /// exits cooperatively.
    pub fn run(
        mut self,
        tick_rx: Receiver<Tick>,
        tick_wait: Duration,
        in_rx: Receiver<Frame>,
        out_tx: Sender<Record>,
        cancel: CancelToken,
        metrics: Arc<PipelineMetrics>,
    ) {
        loop {
            match tick_rx.recv_timeout(tick_wait) {
                Ok(_) => {
                    while let Ok(frame) = in_rx.try_recv() {
                        let started = std::time::Instant::now();
                        let record = self.step(frame);
                        metrics
                            .records_inferred
                            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                        metrics.last_cycle_us.store(
                            started.elapsed().as_micros() as u64,
                            std::sync::atomic::Ordering::Relaxed,
                        );

                        if let Err(e) = out_tx.try_send(record) {
                            metrics
                                .queue_drops
                                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                            debug!("[inference] record dropped: {:?}", e);
                            if e.is_disconnected() {
                                return;
                            }
                        }
                    }

                    if cancel.is_cancelled() {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    if cancel.is_cancelled() {
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        debug!("[inference] stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ndarray::Array2;

    /// Last-step output = sum over the window of input column 0. Makes the
    /// zero-padding and trim behaviour directly observable.
    struct WindowSum {
        input_size: usize,
    }

    impl SequenceModel for WindowSum {
        fn input_size(&self) -> usize {
            self.input_size
        }

        fn output_size(&self) -> usize {
            1
        }

        fn forward(&self, window: &Array2<f64>, _history: &Array2<f64>) -> Array2<f64> {
            let lag = window.nrows();
            let mut out = Array2::zeros((lag, 1));
            let mut acc = 0.0;
            for t in 0..lag {
                acc += window[[t, 0]];
                out[[t, 0]] = acc;
            }
            out
        }
    }

    fn frame(seq: u64, value: f64) -> Frame {
        Frame {
            seq,
            timestamp: Utc::now(),
            values: vec![value],
        }
    }

    fn engine(lag: usize) -> InferenceEngine {
        InferenceEngine::new(
            Box::new(WindowSum { input_size: 1 }),
            ScalerParameters::identity(1),
            ScalerParameters::identity(1),
            lag,
        )
        .unwrap()
    }

    #[test]
    fn window_is_zero_padded_then_holds_lag_most_recent() {
        let mut eng = engine(4);
        assert_eq!(eng.window_rows(), vec![vec![0.0]; 4]);

        for k in 1..=6 {
            eng.step(frame(k, k as f64));
        }
        // After 6 frames with lag 4, the window is frames 3..=6.
        assert_eq!(
            eng.window_rows(),
            vec![vec![3.0], vec![4.0], vec![5.0], vec![6.0]]
        );
    }

    #[test]
    fn early_predictions_reflect_zero_padding() {
        let mut eng = engine(4);
        // Constant 5.0 input: the window sum is 5*min(k, lag).
        let expect = [5.0, 10.0, 15.0, 20.0, 20.0, 20.0];
        for (k, want) in expect.iter().enumerate() {
            let record = eng.step(frame(k as u64 + 1, 5.0));
            assert!((record.outputs[0] - want).abs() < 1e-12, "k={k}");
        }
    }

    #[test]
    fn record_carries_frame_timestamp_and_raw_inputs() {
        let mut eng = engine(2);
        let f = frame(9, 7.5);
        let ts = f.timestamp;
        let record = eng.step(f);
        assert_eq!(record.seq, 9);
        assert_eq!(record.timestamp, ts);
        assert_eq!(record.inputs, vec![7.5]);
    }

    #[test]
    fn step_sequence_is_deterministic() {
        let run = || {
            let mut eng = engine(4);
            (1..=8)
                .map(|k| eng.step(frame(k, (k as f64) * 0.3)).outputs[0])
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn scaler_width_mismatch_is_fatal_at_setup() {
        let err = InferenceEngine::new(
            Box::new(WindowSum { input_size: 2 }),
            ScalerParameters::identity(1),
            ScalerParameters::identity(1),
            4,
        )
        .err();
        assert!(matches!(err, Some(StartError::DimensionMismatch { .. })));
    }
}
