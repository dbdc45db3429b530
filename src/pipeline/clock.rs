//! Per-run tick source and cooperative cancellation.
//!
//! Every run gets its own `TickBroadcaster` and `CancelToken`; stopping one
//! sensor can never interrupt another. Subscribers hold a bounded(1) tick
//! channel, so ticks coalesce: a stage that fell behind sees at most one
//! pending tick and drains its input backlog on the next activation.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use crossbeam::channel::{bounded, Receiver, Sender};
use log::debug;
use parking_lot::Mutex;
use spin_sleep::{SpinSleeper, SpinStrategy};

/// One periodic activation signal.
#[derive(Debug, Clone, Copy)]
pub struct Tick;

/// Cooperative cancellation flag, checked by every stage at loop
/// boundaries. Never preemptive.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Fan-out of tick events to all stages of one run. Tests drive this
/// directly instead of spawning a `Clock`, which is how virtual time works
/// here.
#[derive(Default)]
pub struct TickBroadcaster {
    subscribers: Mutex<Vec<Sender<Tick>>>,
}

impl TickBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new waiter. Must be called before the clock starts
    /// ticking for the subscriber to see every tick.
    pub fn subscribe(&self) -> Receiver<Tick> {
        let (tx, rx) = bounded(1);
        self.subscribers.lock().push(tx);
        rx
    }

    /// Non-blocking fan-out. A subscriber with a pending tick keeps exactly
    /// one (coalescing); disconnected subscribers are dropped.
    pub fn broadcast(&self) {
        let mut subs = self.subscribers.lock();
        subs.retain(|tx| match tx.try_send(Tick) {
            Ok(()) => true,
            Err(e) => !e.is_disconnected(),
        });
    }
}

/// How long a stage waits on its tick channel before re-checking the
/// cancellation token. Bounds the worst case where the clock is already
/// gone, so a run can never wedge in `Stopping`.
pub fn tick_wait(period: Duration) -> Duration {
    period.saturating_mul(4)
}

/// Periodic tick source. Sleeps `period`, broadcasts, repeats; after
/// observing cancellation it performs one final broadcast to permanently
/// unblock any waiter, then exits.
pub struct Clock {
    period: Duration,
    ticks: Arc<TickBroadcaster>,
    cancel: CancelToken,
}

impl Clock {
    pub fn new(period: Duration, ticks: Arc<TickBroadcaster>, cancel: CancelToken) -> Self {
        Self {
            period,
            ticks,
            cancel,
        }
    }

    pub fn run(self) {
        let sleeper = SpinSleeper::new(100_000).with_spin_strategy(SpinStrategy::YieldThread);
        loop {
            sleeper.sleep(self.period);
            self.ticks.broadcast();

            if self.cancel.is_cancelled() {
                // Final broadcast: no waiter may stay blocked forever.
                self.ticks.broadcast();
                break;
            }
        }
        debug!("[clock] stopped");
    }
}
