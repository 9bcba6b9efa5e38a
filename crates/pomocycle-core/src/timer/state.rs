//! Shared timer state.
//!
//! One [`StatePublisher`] (owned by the cycle driver) records what is
//! currently counting down; any number of [`StateReader`]s take snapshots of
//! it from other threads.
//!
//! ## Consistency
//!
//! The five fields live in independent atomics guarded by a single-writer
//! sequence counter. A write bumps the counter to an odd value, stores the
//! fields, and bumps it to the next even value. A read copies the fields
//! between two loads of the counter and retries if the counter was odd or
//! moved. Readers therefore always see a whole publish or none of it, the
//! writer never waits on a reader, and readers never wait on each other.
//! A reader only retries when its read overlaps the handful of stores of a
//! publish, which happens at most a few times per interval.
//!
//! Timestamps are nanoseconds since a monotonic origin captured when the
//! state is created, so a snapshot's `taken_at` is never before a start it
//! observed.

use std::hint;
use std::sync::atomic::{fence, AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug)]
struct TimerCell {
    origin: Instant,
    seq: AtomicU64,
    active_start_ns: AtomicU64,
    active_total_ns: AtomicU64,
    meso_start_ns: AtomicU64,
    meso_total_ns: AtomicU64,
    in_meso: AtomicBool,
}

impl TimerCell {
    fn new() -> Self {
        Self {
            origin: Instant::now(),
            seq: AtomicU64::new(0),
            active_start_ns: AtomicU64::new(0),
            active_total_ns: AtomicU64::new(0),
            meso_start_ns: AtomicU64::new(0),
            meso_total_ns: AtomicU64::new(0),
            in_meso: AtomicBool::new(false),
        }
    }

    fn now_ns(&self) -> u64 {
        to_ns(self.origin.elapsed())
    }

    /// Only called through `&mut StatePublisher`, so there is one writer.
    fn write(&self, store: impl FnOnce(&Self)) {
        let seq = self.seq.load(Ordering::Relaxed);
        self.seq.store(seq.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);
        store(self);
        self.seq.store(seq.wrapping_add(2), Ordering::Release);
    }

    fn read(&self) -> TimerSnapshot {
        loop {
            let before = self.seq.load(Ordering::Acquire);
            if before & 1 == 1 {
                hint::spin_loop();
                continue;
            }

            let active_start = self.active_start_ns.load(Ordering::Relaxed);
            let active_total = self.active_total_ns.load(Ordering::Relaxed);
            let meso_start = self.meso_start_ns.load(Ordering::Relaxed);
            let meso_total = self.meso_total_ns.load(Ordering::Relaxed);
            let in_meso = self.in_meso.load(Ordering::Relaxed);

            fence(Ordering::Acquire);
            if self.seq.load(Ordering::Relaxed) != before {
                hint::spin_loop();
                continue;
            }

            return TimerSnapshot {
                active: SpanReading::from_ns(active_start, active_total),
                meso: SpanReading::from_ns(meso_start, meso_total),
                in_meso,
                taken_at: Duration::from_nanos(self.now_ns()),
            };
        }
    }
}

fn to_ns(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

/// Create the shared state for one engine: the single write handle and a
/// first read handle. Further readers come from [`StateReader::clone`].
pub fn timer_state() -> (StatePublisher, StateReader) {
    let cell = Arc::new(TimerCell::new());
    (
        StatePublisher { cell: cell.clone() },
        StateReader { cell },
    )
}

/// Write capability for the shared timer state. Deliberately not `Clone`.
#[derive(Debug)]
pub struct StatePublisher {
    cell: Arc<TimerCell>,
}

impl StatePublisher {
    /// Record `(now, total)` as the interval currently counting down.
    pub fn publish_active_interval(&mut self, total: Duration) {
        let now = self.cell.now_ns();
        self.cell.write(|c| {
            c.active_total_ns.store(to_ns(total), Ordering::Relaxed);
            c.active_start_ns.store(now, Ordering::Relaxed);
        });
    }

    /// Mark a meso-group of aggregate length `total` as starting now.
    pub fn publish_meso_group(&mut self, total: Duration) {
        let now = self.cell.now_ns();
        self.cell.write(|c| {
            c.meso_total_ns.store(to_ns(total), Ordering::Relaxed);
            c.meso_start_ns.store(now, Ordering::Relaxed);
            c.in_meso.store(true, Ordering::Relaxed);
        });
    }

    pub fn clear_meso_group(&mut self) {
        self.cell.write(|c| {
            c.in_meso.store(false, Ordering::Relaxed);
            c.meso_total_ns.store(0, Ordering::Relaxed);
            c.meso_start_ns.store(0, Ordering::Relaxed);
        });
    }

    pub fn reader(&self) -> StateReader {
        StateReader {
            cell: self.cell.clone(),
        }
    }
}

/// Read-only handle to the shared timer state.
#[derive(Debug, Clone)]
pub struct StateReader {
    cell: Arc<TimerCell>,
}

impl StateReader {
    pub fn snapshot(&self) -> TimerSnapshot {
        self.cell.read()
    }

    /// Current offset from the state's origin, comparable with the
    /// `start` of a [`SpanReading`].
    pub fn now(&self) -> Duration {
        Duration::from_nanos(self.cell.now_ns())
    }

    /// Snapshot projected to seconds, as served to status consumers.
    pub fn status(&self) -> StatusReport {
        StatusReport::from(&self.snapshot())
    }
}

/// A `(start, total)` pair read from the shared state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanReading {
    /// Offset from the state's origin.
    pub start: Duration,
    pub total: Duration,
}

impl SpanReading {
    fn from_ns(start: u64, total: u64) -> Self {
        Self {
            start: Duration::from_nanos(start),
            total: Duration::from_nanos(total),
        }
    }

    /// Elapsed time at `now`, clamped to `[0, total]`.
    pub fn elapsed(&self, now: Duration) -> Duration {
        now.saturating_sub(self.start).min(self.total)
    }

    pub fn remaining(&self, now: Duration) -> Duration {
        self.total - self.elapsed(now)
    }
}

/// Consistent read of all shared fields at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerSnapshot {
    pub active: SpanReading,
    /// Meaningful only while `in_meso` is set.
    pub meso: SpanReading,
    pub in_meso: bool,
    pub taken_at: Duration,
}

impl TimerSnapshot {
    pub fn active_elapsed(&self) -> Duration {
        self.active.elapsed(self.taken_at)
    }

    pub fn active_remaining(&self) -> Duration {
        self.active.remaining(self.taken_at)
    }

    pub fn meso_elapsed(&self) -> Duration {
        self.meso.elapsed(self.taken_at)
    }

    pub fn meso_remaining(&self) -> Duration {
        self.meso.remaining(self.taken_at)
    }

    /// Nothing has been published yet.
    pub fn is_idle(&self) -> bool {
        self.active.total.is_zero() && !self.in_meso
    }
}

/// Status document served to consumers. Times are seconds; elapsed values
/// are clamped to their totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub current_total: f64,
    pub current_elapsed: f64,
    pub in_meso: bool,
    pub meso_total: f64,
    pub meso_elapsed: f64,
    pub at: DateTime<Utc>,
}

impl StatusReport {
    pub fn current_remaining(&self) -> f64 {
        (self.current_total - self.current_elapsed).max(0.0)
    }

    pub fn meso_remaining(&self) -> f64 {
        (self.meso_total - self.meso_elapsed).max(0.0)
    }
}

impl From<&TimerSnapshot> for StatusReport {
    fn from(snap: &TimerSnapshot) -> Self {
        Self {
            current_total: snap.active.total.as_secs_f64(),
            current_elapsed: snap.active_elapsed().as_secs_f64(),
            in_meso: snap.in_meso,
            meso_total: snap.meso.total.as_secs_f64(),
            meso_elapsed: snap.meso_elapsed().as_secs_f64(),
            at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn fresh_state_is_idle() {
        let (_publisher, reader) = timer_state();
        let snap = reader.snapshot();
        assert!(snap.is_idle());
        assert_eq!(snap.active_elapsed(), Duration::ZERO);

        let status = reader.status();
        assert_eq!(status.current_total, 0.0);
        assert!(!status.in_meso);
    }

    #[test]
    fn published_total_is_visible_and_elapsed_grows() {
        let (mut publisher, reader) = timer_state();
        publisher.publish_active_interval(Duration::from_secs(30));

        let mut last = Duration::ZERO;
        for _ in 0..50 {
            let snap = reader.snapshot();
            assert_eq!(snap.active.total, Duration::from_secs(30));
            assert!(snap.active_elapsed() >= last);
            last = snap.active_elapsed();
        }
    }

    #[test]
    fn elapsed_is_clamped_to_total() {
        let (mut publisher, reader) = timer_state();
        publisher.publish_active_interval(Duration::from_millis(1));
        thread::sleep(Duration::from_millis(10));

        let snap = reader.snapshot();
        assert_eq!(snap.active_elapsed(), snap.active.total);
        assert_eq!(snap.active_remaining(), Duration::ZERO);

        let status = StatusReport::from(&snap);
        assert_eq!(status.current_elapsed, status.current_total);
        assert_eq!(status.current_remaining(), 0.0);
    }

    #[test]
    fn span_reading_clamps_both_ends() {
        let span = SpanReading {
            start: Duration::from_secs(10),
            total: Duration::from_secs(5),
        };
        assert_eq!(span.elapsed(Duration::from_secs(3)), Duration::ZERO);
        assert_eq!(span.elapsed(Duration::from_secs(12)), Duration::from_secs(2));
        assert_eq!(span.elapsed(Duration::from_secs(60)), Duration::from_secs(5));
        assert_eq!(span.remaining(Duration::from_secs(60)), Duration::ZERO);
    }

    #[test]
    fn meso_group_publish_and_clear() {
        let (mut publisher, reader) = timer_state();
        publisher.publish_meso_group(Duration::from_secs(600));
        let snap = reader.snapshot();
        assert!(snap.in_meso);
        assert_eq!(snap.meso.total, Duration::from_secs(600));

        publisher.publish_active_interval(Duration::from_secs(25));
        assert!(reader.snapshot().in_meso);

        publisher.clear_meso_group();
        let snap = reader.snapshot();
        assert!(!snap.in_meso);
        assert_eq!(snap.active.total, Duration::from_secs(25));
        assert!(!snap.is_idle());
    }

    #[test]
    fn concurrent_readers_never_see_torn_meso_state() {
        let (mut publisher, reader) = timer_state();
        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let reader = reader.clone();
                let done = done.clone();
                thread::spawn(move || {
                    let mut last_start = Duration::ZERO;
                    while !done.load(Ordering::Relaxed) {
                        let snap = reader.snapshot();
                        if snap.in_meso {
                            assert!(!snap.meso.total.is_zero());
                        }
                        assert!(snap.active.start >= last_start);
                        assert!(snap.taken_at >= snap.active.start);
                        last_start = snap.active.start;
                    }
                })
            })
            .collect();

        for i in 1..=20_000u64 {
            publisher.publish_meso_group(Duration::from_nanos(i));
            publisher.publish_active_interval(Duration::from_nanos(i));
            publisher.clear_meso_group();
        }
        done.store(true, Ordering::Relaxed);

        for handle in readers {
            handle.join().unwrap();
        }
    }
}
