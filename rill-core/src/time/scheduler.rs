//! Scheduler seam.
//!
//! The engine asks its environment for exactly two primitives: run a
//! callback once after a delay, and run a callback repeatedly until
//! cancelled. Both return a [`CancelHandle`] whose `cancel` is
//! idempotent.
//!
//! [`TokioScheduler`] backs the primitives with Tokio tasks and timers.
//! [`ManualScheduler`] keeps a queue against a [`TestClock`] and runs
//! due callbacks synchronously from [`ManualScheduler::advance`], which
//! makes timed-combinator tests deterministic and instant.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::trace;

use super::clock::{Clock, TestClock};

/// A scheduled callback.
pub type Task = Arc<dyn Fn() + Send + Sync>;

struct CancelInner {
    cancelled: AtomicBool,
    on_cancel: Box<dyn Fn() + Send + Sync>,
}

/// Handle to a scheduled callback. Cloneable; all clones control the
/// same scheduling.
#[derive(Clone)]
pub struct CancelHandle {
    inner: Arc<CancelInner>,
}

impl CancelHandle {
    /// Wrap a cancellation action. The action runs at most once, on the
    /// first `cancel` call across all clones.
    pub fn new(on_cancel: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(CancelInner {
                cancelled: AtomicBool::new(false),
                on_cancel: Box::new(on_cancel),
            }),
        }
    }

    /// Cancel the scheduled callback. Idempotent.
    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::SeqCst) {
            (self.inner.on_cancel)();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }
}

/// The two timer primitives the engine requires from its environment.
pub trait Scheduler: Send + Sync {
    /// Invoke `task` once after `delay`.
    fn schedule_once(&self, delay: Duration, task: Task) -> CancelHandle;

    /// Invoke `task` every `interval` until cancelled. The first
    /// invocation happens one full interval after scheduling. A zero
    /// interval means "as fast as the scheduler allows".
    fn schedule_repeating(&self, interval: Duration, task: Task) -> CancelHandle;
}

// ----------------------------------------------------------------------------
// Tokio-backed scheduler
// ----------------------------------------------------------------------------

/// Scheduler backed by Tokio tasks and timers.
///
/// Must be used from within a Tokio runtime; callbacks run on the
/// runtime's worker threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn schedule_once(&self, delay: Duration, task: Task) -> CancelHandle {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        });
        CancelHandle::new(move || handle.abort())
    }

    fn schedule_repeating(&self, interval: Duration, task: Task) -> CancelHandle {
        let handle = tokio::spawn(async move {
            if interval.is_zero() {
                loop {
                    task();
                    tokio::task::yield_now().await;
                }
            } else {
                let mut timer = tokio::time::interval(interval);
                timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                // The first tick completes immediately; skip it so the
                // first invocation lands one interval from now.
                timer.tick().await;
                loop {
                    timer.tick().await;
                    task();
                }
            }
        });
        CancelHandle::new(move || handle.abort())
    }
}

// ----------------------------------------------------------------------------
// Manual scheduler (virtual time)
// ----------------------------------------------------------------------------

struct Entry {
    seq: u64,
    due: Instant,
    period: Option<Duration>,
    task: Task,
    cancelled: Arc<AtomicBool>,
}

struct Queue {
    entries: Vec<Entry>,
    next_seq: u64,
}

/// Virtual-time scheduler for tests.
///
/// Callbacks run synchronously inside [`ManualScheduler::advance`], in
/// due-time order (ties broken by scheduling order). Repeating entries
/// with a zero period run once per `advance` call rather than spinning.
#[derive(Clone)]
pub struct ManualScheduler {
    clock: TestClock,
    queue: Arc<Mutex<Queue>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::with_clock(TestClock::new())
    }

    /// Share a clock with combinators that read elapsed time directly.
    pub fn with_clock(clock: TestClock) -> Self {
        Self {
            clock,
            queue: Arc::new(Mutex::new(Queue {
                entries: Vec::new(),
                next_seq: 0,
            })),
        }
    }

    /// The clock this scheduler advances.
    pub fn clock(&self) -> TestClock {
        self.clock.clone()
    }

    /// Number of live (not yet cancelled or exhausted) entries.
    pub fn pending(&self) -> usize {
        self.queue
            .lock()
            .entries
            .iter()
            .filter(|e| !e.cancelled.load(Ordering::SeqCst))
            .count()
    }

    /// Run every callback due now without moving the clock.
    pub fn run_pending(&self) {
        self.advance(Duration::ZERO);
    }

    /// Move the clock forward by `by`, running every callback that
    /// comes due on the way, in order. Tasks scheduled by running tasks
    /// are themselves eligible within the same call.
    pub fn advance(&self, by: Duration) {
        let target = self.clock.now() + by;
        let mut zero_period_ran: HashSet<u64> = HashSet::new();

        loop {
            let next = {
                let mut queue = self.queue.lock();
                queue
                    .entries
                    .retain(|e| !e.cancelled.load(Ordering::SeqCst));
                queue
                    .entries
                    .iter()
                    .filter(|e| e.due <= target)
                    .filter(|e| {
                        !(e.period == Some(Duration::ZERO)
                            && zero_period_ran.contains(&e.seq))
                    })
                    .min_by_key(|e| (e.due, e.seq))
                    .map(|e| {
                        (
                            e.seq,
                            e.due,
                            e.period,
                            Arc::clone(&e.task),
                            Arc::clone(&e.cancelled),
                        )
                    })
            };

            let Some((seq, due, period, task, cancelled)) = next else {
                break;
            };

            // Step the clock to the entry's due time before running it.
            let now = self.clock.now();
            if due > now {
                self.clock.advance(due - now);
            }

            // Reschedule or retire before running, so a task can cancel
            // or re-schedule itself.
            {
                let mut queue = self.queue.lock();
                if let Some(pos) = queue.entries.iter().position(|e| e.seq == seq) {
                    match period {
                        Some(period) => {
                            let next_due = self.clock.now() + period;
                            queue.entries[pos].due = next_due;
                        }
                        None => {
                            queue.entries.remove(pos);
                        }
                    }
                }
            }
            if period == Some(Duration::ZERO) {
                zero_period_ran.insert(seq);
            }

            if !cancelled.load(Ordering::SeqCst) {
                task();
            }
        }

        // Settle at the target instant.
        let now = self.clock.now();
        if target > now {
            self.clock.advance(target - now);
        }
    }

    fn push(&self, delay: Duration, period: Option<Duration>, task: Task) -> CancelHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let seq = {
            let mut queue = self.queue.lock();
            let seq = queue.next_seq;
            queue.next_seq += 1;
            queue.entries.push(Entry {
                seq,
                due: self.clock.now() + delay,
                period,
                task,
                cancelled: Arc::clone(&cancelled),
            });
            seq
        };
        trace!(seq, ?period, "scheduled manual entry");

        let flag = cancelled;
        CancelHandle::new(move || {
            flag.store(true, Ordering::SeqCst);
        })
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_once(&self, delay: Duration, task: Task) -> CancelHandle {
        self.push(delay, None, task)
    }

    fn schedule_repeating(&self, interval: Duration, task: Task) -> CancelHandle {
        self.push(interval, Some(interval), task)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter_task() -> (Task, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let task: Task = Arc::new(move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        (task, count)
    }

    #[test]
    fn once_fires_at_its_due_time() {
        let scheduler = ManualScheduler::new();
        let (task, count) = counter_task();
        scheduler.schedule_once(Duration::from_millis(100), task);

        scheduler.advance(Duration::from_millis(99));
        assert_eq!(count.load(Ordering::SeqCst), 0);

        scheduler.advance(Duration::from_millis(1));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Exhausted, not repeating.
        scheduler.advance(Duration::from_secs(1));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn repeating_fires_once_per_interval() {
        let scheduler = ManualScheduler::new();
        let (task, count) = counter_task();
        scheduler.schedule_repeating(Duration::from_millis(10), task);

        scheduler.advance(Duration::from_millis(35));
        assert_eq!(count.load(Ordering::SeqCst), 3);

        scheduler.advance(Duration::from_millis(5));
        assert_eq!(count.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn cancel_is_idempotent_and_stops_firing() {
        let scheduler = ManualScheduler::new();
        let (task, count) = counter_task();
        let handle = scheduler.schedule_repeating(Duration::from_millis(10), task);

        scheduler.advance(Duration::from_millis(10));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        handle.cancel();
        handle.cancel();
        assert!(handle.is_cancelled());

        scheduler.advance(Duration::from_millis(100));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn tasks_run_in_due_order_with_ties_in_schedule_order() {
        let scheduler = ManualScheduler::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for (tag, delay) in [("late", 20u64), ("early", 10), ("early_too", 10)] {
            let order = Arc::clone(&order);
            scheduler.schedule_once(
                Duration::from_millis(delay),
                Arc::new(move || order.lock().push(tag)),
            );
        }

        scheduler.advance(Duration::from_millis(30));
        assert_eq!(*order.lock(), vec!["early", "early_too", "late"]);
    }

    #[test]
    fn a_task_can_cancel_its_own_repeating_schedule() {
        let scheduler = ManualScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        let handle_cell: Arc<Mutex<Option<CancelHandle>>> = Arc::new(Mutex::new(None));

        let count_clone = count.clone();
        let cell_clone = Arc::clone(&handle_cell);
        let handle = scheduler.schedule_repeating(
            Duration::from_millis(10),
            Arc::new(move || {
                if count_clone.fetch_add(1, Ordering::SeqCst) + 1 == 2 {
                    if let Some(handle) = cell_clone.lock().take() {
                        handle.cancel();
                    }
                }
            }),
        );
        *handle_cell.lock() = Some(handle);

        scheduler.advance(Duration::from_millis(100));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn zero_period_entries_run_once_per_advance() {
        let scheduler = ManualScheduler::new();
        let (task, count) = counter_task();
        scheduler.schedule_repeating(Duration::ZERO, task);

        scheduler.run_pending();
        scheduler.run_pending();
        scheduler.advance(Duration::from_secs(1));

        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_once_fires_after_the_delay() {
        let scheduler = TokioScheduler;
        let (task, count) = counter_task();
        scheduler.schedule_once(Duration::from_millis(50), task);

        tokio::time::sleep(Duration::from_millis(49)).await;
        tokio::task::yield_now().await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(2)).await;
        tokio::task::yield_now().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_repeating_fires_until_cancelled() {
        let scheduler = TokioScheduler;
        let (task, count) = counter_task();
        let handle = scheduler.schedule_repeating(Duration::from_millis(10), task);

        tokio::time::sleep(Duration::from_millis(35)).await;
        tokio::task::yield_now().await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        handle.cancel();
        tokio::time::sleep(Duration::from_millis(100)).await;
        tokio::task::yield_now().await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn advancing_steps_the_shared_clock_through_due_times() {
        let scheduler = ManualScheduler::new();
        let clock = scheduler.clock();
        let start = clock.now();

        let observed = Arc::new(Mutex::new(None));
        let observed_clone = Arc::clone(&observed);
        let probe = clock.clone();
        scheduler.schedule_once(
            Duration::from_millis(40),
            Arc::new(move || {
                *observed_clone.lock() = Some(probe.now());
            }),
        );

        scheduler.advance(Duration::from_millis(100));

        // The task saw the clock at its due time, not at the target.
        assert_eq!(observed.lock().unwrap() - start, Duration::from_millis(40));
        assert_eq!(clock.now() - start, Duration::from_millis(100));
    }
}
