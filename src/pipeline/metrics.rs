//! Per-run pipeline counters.
//!
//! Plain atomics, contention-free to update from any stage; read as a
//! consistent-enough snapshot for diagnostics. Scoped per run, never
//! process-wide.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct PipelineMetrics {
    pub frames_produced: AtomicU64,
    pub records_inferred: AtomicU64,
    pub records_persisted: AtomicU64,
    pub queue_drops: AtomicU64,
    pub persist_failures: AtomicU64,
    pub last_cycle_us: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub frames_produced: u64,
    pub records_inferred: u64,
    pub records_persisted: u64,
    pub queue_drops: u64,
    pub persist_failures: u64,
    pub last_cycle_us: u64,
}

impl PipelineMetrics {
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_produced: self.frames_produced.load(Ordering::Relaxed),
            records_inferred: self.records_inferred.load(Ordering::Relaxed),
            records_persisted: self.records_persisted.load(Ordering::Relaxed),
            queue_drops: self.queue_drops.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
            last_cycle_us: self.last_cycle_us.load(Ordering::Relaxed),
        }
    }
}
