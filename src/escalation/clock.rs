//! Time ports for the escalation engine.
//!
//! The engine never reads the wall clock or owns a timer directly: it is
//! handed a [`Clock`] for "now" and a [`Ticker`] that paces evaluation
//! cycles. Production wires [`SystemClock`] and [`IntervalTicker`]; tests
//! use [`ManualClock`] and [`ManualTicker`] to step time deterministically.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{interval, Interval, MissedTickBehavior};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Paces evaluation cycles
#[async_trait]
pub trait Ticker: Send {
    /// Wait for the next tick. `false` means the ticker is finished and the
    /// monitor loop should stop.
    async fn tick(&mut self) -> bool;
}

/// Fixed-period ticker backed by a tokio interval
pub struct IntervalTicker {
    interval: Interval,
}

impl IntervalTicker {
    pub fn new(period: std::time::Duration) -> Self {
        let mut interval = interval(period);
        // a slow cycle should not trigger a burst of catch-up cycles
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) -> bool {
        self.interval.tick().await;
        true
    }
}

/// Ticker driven by explicit calls on its [`TickHandle`]
pub struct ManualTicker {
    rx: mpsc::UnboundedReceiver<()>,
}

#[derive(Debug, Clone)]
pub struct TickHandle {
    tx: mpsc::UnboundedSender<()>,
}

impl ManualTicker {
    pub fn channel() -> (TickHandle, ManualTicker) {
        let (tx, rx) = mpsc::unbounded_channel();
        (TickHandle { tx }, ManualTicker { rx })
    }
}

impl TickHandle {
    /// Request one tick. Returns `false` once the ticker has been dropped.
    pub fn tick(&self) -> bool {
        self.tx.send(()).is_ok()
    }
}

#[async_trait]
impl Ticker for ManualTicker {
    async fn tick(&mut self) -> bool {
        self.rx.recv().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        let other = clock.clone();

        clock.advance(Duration::hours(5));
        assert_eq!(other.now(), start + Duration::hours(5));

        other.set(start);
        assert_eq!(clock.now(), start);
    }

    #[tokio::test]
    async fn test_manual_ticker_stops_when_handle_dropped() {
        let (handle, mut ticker) = ManualTicker::channel();
        assert!(handle.tick());
        assert!(ticker.tick().await);

        drop(handle);
        assert!(!ticker.tick().await);
    }
}
