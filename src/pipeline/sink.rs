//! Persistence stage.
//!
//! Drains records each activation, appends them to a bounded retention
//! buffer (oldest evicted first), and hands them to the destination. A
//! failed write is logged and the record dropped — never retried, the next
//! cycle supersedes it.

use std::{collections::VecDeque, sync::Arc, time::Duration};

use crossbeam::channel::{Receiver, RecvTimeoutError};
use log::{debug, error};

use crate::{
    pipeline::{CancelToken, PipelineMetrics, Record, Tick},
    store::Destination,
};

pub struct Sink {
    in_rx: Receiver<Record>,
    tick_rx: Receiver<Tick>,
    tick_wait: Duration,
    cancel: CancelToken,
    destination: Box<dyn Destination>,
    capacity: usize,
    buffer: VecDeque<Record>,
    metrics: Arc<PipelineMetrics>,
}

impl Sink {
    pub fn new(
        in_rx: Receiver<Record>,
        tick_rx: Receiver<Tick>,
        tick_wait: Duration,
        cancel: CancelToken,
        destination: Box<dyn Destination>,
        capacity: usize,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            in_rx,
            tick_rx,
            tick_wait,
            cancel,
            destination,
            capacity,
            buffer: VecDeque::with_capacity(capacity),
            metrics,
        }
    }

    fn take_in(&mut self, record: Record) {
        self.buffer.push_back(record);
        while self.buffer.len() > self.capacity {
            self.buffer.pop_front();
        }

        // Latest record is always the back of the buffer here.
        let latest = match self.buffer.back() {
            Some(r) => r,
            None => return,
        };
        match self.destination.persist(latest, &self.buffer) {
            Ok(()) => {
                self.metrics
                    .records_persisted
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            }
            Err(e) => {
                // At-most-once: drop this cycle's write, no retry.
                self.metrics
                    .persist_failures
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                error!("[sink] persistence failed, record dropped: {}", e);
            }
        }
    }

    pub fn run(mut self) {
        loop {
            match self.tick_rx.recv_timeout(self.tick_wait) {
                Ok(_) => {
                    while let Ok(record) = self.in_rx.try_recv() {
                        self.take_in(record);
                    }
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
        debug!("[sink] stopped holding {} records", self.buffer.len());
    }
}
