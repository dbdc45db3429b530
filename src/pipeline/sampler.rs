//! Sampling stage: snapshots input setpoints into timestamped frames.
//!
//! On every tick the current setpoint of each input signal is read from the
//! hub in fixed column order and pushed downstream with a non-blocking
//! send. An unavailable setpoint (NaN cell) is substituted with the last
//! known value for that column; the run never aborts on data quality.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use crossbeam::channel::{Receiver, RecvTimeoutError, Sender};
use log::debug;

use crate::{
    config::SignalHub,
    pipeline::{CancelToken, Frame, PipelineMetrics, Tick},
};

pub struct SampleSource {
    signals: Arc<SignalHub>,
    tick_rx: Receiver<Tick>,
    tick_wait: Duration,
    out: Sender<Frame>,
    cancel: CancelToken,
    metrics: Arc<PipelineMetrics>,
}

impl SampleSource {
    pub fn new(
        signals: Arc<SignalHub>,
        tick_rx: Receiver<Tick>,
        tick_wait: Duration,
        out: Sender<Frame>,
        cancel: CancelToken,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            signals,
            tick_rx,
            tick_wait,
            out,
            cancel,
            metrics,
        }
    }

    pub fn run(self) {
        let mut last_known = vec![0.0f64; self.signals.input_len()];
        let mut last_ts: Option<DateTime<Utc>> = None;
        let mut seq: u64 = 0;

        loop {
            match self.tick_rx.recv_timeout(self.tick_wait) {
                Ok(_) => {
                    seq += 1;
                    let mut values = self.signals.snapshot_inputs();
                    for (value, last) in values.iter_mut().zip(last_known.iter_mut()) {
                        if value.is_finite() {
                            *last = *value;
                        } else {
                            *value = *last;
                        }
                    }

                    // Frame timestamps are strictly increasing within a run,
                    // even at coarse OS clock resolution.
                    let mut now = Utc::now();
                    if let Some(prev) = last_ts {
                        if now <= prev {
                            now = prev + chrono::Duration::microseconds(1);
                        }
                    }
                    last_ts = Some(now);

                    let frame = Frame {
                        seq,
                        timestamp: now,
                        values,
                    };
                    match self.out.try_send(frame) {
                        Ok(()) => {
                            self.metrics
                                .frames_produced
                                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                        }
                        Err(e) => {
                            self.metrics
                                .queue_drops
                                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                            debug!("[sampler] frame {} dropped: {:?}", seq, e);
                            if e.is_disconnected() {
                                break;
                            }
                        }
                    }

                    // Exit after completing the push for the tick during
                    // which cancellation was first observed.
                    if self.cancel.is_cancelled() {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    if self.cancel.is_cancelled() {
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        debug!("[sampler] stopped after {} frames", seq);
    }
}
