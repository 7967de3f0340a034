//! Lazy Stream Wrapper
//!
//! A [`LazyStream`] wraps a core [`Stream`] with producer lifecycle
//! callbacks (`on_start`/`on_stop`) keyed to subscriber-count edges and
//! governed by a [`Lazy`] policy. This is how streams that own a
//! resource - a timer loop, an upstream subscription - avoid doing work
//! while nobody is listening.
//!
//! # Policy table
//!
//! | policy    | start timing              | stop timing            |
//! |-----------|---------------------------|------------------------|
//! | `None`    | immediately when wired    | never (auto-stop off)  |
//! | `Initial` | at the first subscriber   | never                  |
//! | `Very`    | at the first subscriber   | at zero subscribers    |
//! | `Never`   | immediately when wired    | never                  |
//!
//! Start and stop are idempotent: a `started` flag guards re-entrant
//! double-transitions, and disposal always stops the producer regardless
//! of policy (auto-stop only governs the subscriber-count path).
//!
//! # Last value
//!
//! [`LazyStream::with_initial`] seeds a last-value cell; [`last`]
//! returns the seed until the first `set`, and the most recent value
//! after. Reading it has no side effects.
//!
//! [`last`]: LazyStream::last

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::error::StreamError;
use crate::message::SignalKind;
use crate::stream::{DisposeHook, Hook, Phase, Reactive, Stream, Subscription};
use crate::subscriber::{Handler, SubscribeOptions};

/// Laziness policy: when a stream's producer starts and stops relative
/// to its subscriber count.
///
/// `None` and `Never` are observably identical (eager start, no
/// auto-stop); both names are kept so call sites read naturally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lazy {
    /// Start eagerly; never auto-stop.
    None,

    /// Start at the first subscriber; never auto-stop.
    #[default]
    Initial,

    /// Start at the first subscriber; stop every time the subscriber
    /// count returns to zero.
    Very,

    /// Start eagerly; never auto-stop. Alias of `None` in behaviour.
    Never,
}

impl Lazy {
    /// Whether the producer starts without waiting for a subscriber.
    pub fn starts_eagerly(&self) -> bool {
        matches!(self, Lazy::None | Lazy::Never)
    }

    /// Whether the producer stops on the 1 -> 0 subscriber edge.
    pub fn stops_when_idle(&self) -> bool {
        matches!(self, Lazy::Very)
    }
}

struct LazyInner<V> {
    policy: Lazy,
    /// Whether the producer is (or should be, once installed) running.
    started: Mutex<bool>,
    on_start: Mutex<Option<Hook>>,
    on_stop: Mutex<Option<Hook>>,
    on_dispose: Mutex<Option<DisposeHook>>,
    last: Mutex<Option<V>>,
}

impl<V> LazyInner<V> {
    /// Idempotent start: flips the flag and runs `on_start` if installed.
    fn maybe_start(&self) {
        let hook = {
            let mut started = self.started.lock();
            if *started {
                return;
            }
            *started = true;
            self.on_start.lock().clone()
        };
        if let Some(hook) = hook {
            hook();
        }
    }

    /// Idempotent stop: flips the flag and runs `on_stop` if installed.
    fn maybe_stop(&self) {
        let hook = {
            let mut started = self.started.lock();
            if !*started {
                return;
            }
            *started = false;
            self.on_stop.lock().clone()
        };
        if let Some(hook) = hook {
            hook();
        }
    }
}

/// A [`Stream`] with a policy-gated producer lifecycle and an optional
/// last-value cell.
///
/// Cloning shares state, like [`Stream`].
pub struct LazyStream<V> {
    stream: Stream<V>,
    inner: Arc<LazyInner<V>>,
}

impl<V> LazyStream<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a lazy stream with the given policy and no initial value.
    pub fn new(policy: Lazy) -> Self {
        Self::build(policy, None)
    }

    /// Create a lazy stream seeded with an initial value for [`last`].
    ///
    /// [`last`]: LazyStream::last
    pub fn with_initial(policy: Lazy, initial: V) -> Self {
        Self::build(policy, Some(initial))
    }

    fn build(policy: Lazy, initial: Option<V>) -> Self {
        let stream = Stream::new();
        let inner = Arc::new(LazyInner {
            policy,
            started: Mutex::new(false),
            on_start: Mutex::new(None),
            on_stop: Mutex::new(None),
            on_dispose: Mutex::new(None),
            last: Mutex::new(initial),
        });

        // Wire the core stream's subscriber-count edges to the policy.
        {
            let inner = Arc::downgrade(&inner);
            stream.set_on_first_subscribe(Arc::new(move || {
                if let Some(inner) = inner.upgrade() {
                    inner.maybe_start();
                }
            }));
        }
        {
            let inner = Arc::downgrade(&inner);
            stream.set_on_no_subscribers(Arc::new(move || {
                if let Some(inner) = inner.upgrade() {
                    if inner.policy.stops_when_idle() {
                        inner.maybe_stop();
                    }
                }
            }));
        }
        {
            // Disposal always stops the producer, then runs any
            // user-installed dispose callback.
            let inner = Arc::downgrade(&inner);
            stream.set_on_dispose(Arc::new(move |reason: &str| {
                if let Some(inner) = inner.upgrade() {
                    inner.maybe_stop();
                    let hook = inner.on_dispose.lock().clone();
                    if let Some(hook) = hook {
                        hook(reason);
                    }
                    // Producer hooks capture the stream itself; dropping
                    // them here breaks that cycle once the stream is done.
                    *inner.on_start.lock() = None;
                    *inner.on_stop.lock() = None;
                    *inner.on_dispose.lock() = None;
                }
            }));
        }

        let lazy = Self { stream, inner };
        if policy.starts_eagerly() {
            lazy.inner.maybe_start();
        }
        lazy
    }

    /// Install the producer lifecycle callbacks.
    ///
    /// If the stream has already started (eager policy, or a subscriber
    /// arrived first), `on_start` runs immediately.
    pub fn set_producer<Start, Stop>(&self, on_start: Start, on_stop: Stop)
    where
        Start: Fn() + Send + Sync + 'static,
        Stop: Fn() + Send + Sync + 'static,
    {
        let start_now = {
            *self.inner.on_start.lock() = Some(Arc::new(on_start));
            *self.inner.on_stop.lock() = Some(Arc::new(on_stop));
            *self.inner.started.lock()
        };
        if start_now {
            trace!(stream = self.stream.id(), "producer installed after start");
            let hook = self.inner.on_start.lock().clone();
            if let Some(hook) = hook {
                hook();
            }
        }
    }

    /// Install a callback invoked once, with the reason, when the stream
    /// is disposed (after the done signal has been dispatched and the
    /// producer stopped).
    pub fn set_on_dispose<F>(&self, hook: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        *self.inner.on_dispose.lock() = Some(Arc::new(hook));
    }

    /// The most recent value pushed through this stream, or the seeded
    /// initial value if nothing has been pushed yet.
    pub fn last(&self) -> Option<V> {
        self.inner.last.lock().clone()
    }

    /// Push a value message. Updates the last-value cell first, so
    /// handlers observing [`last`] mid-dispatch see the new value.
    ///
    /// [`last`]: LazyStream::last
    pub fn set(&self, value: V) -> Result<(), StreamError> {
        if self.stream.is_disposed() {
            return Err(StreamError::Disposed);
        }
        *self.inner.last.lock() = Some(value.clone());
        self.stream.set(value)
    }

    /// Push a signal message.
    pub fn signal(&self, kind: SignalKind, context: Option<String>) -> Result<(), StreamError> {
        self.stream.signal(kind, context)
    }

    /// Dispose the stream. Idempotent; stops the producer.
    pub fn dispose(&self, reason: &str) {
        self.stream.dispose(reason);
    }

    /// Whether the stream has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.stream.is_disposed()
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.stream.phase()
    }

    /// The wrapped stream's unique ID.
    pub fn id(&self) -> u64 {
        self.stream.id()
    }

    /// Number of currently registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.stream.subscriber_count()
    }

    /// Clear the subscriber list without disposing. Stops the producer
    /// if the policy auto-stops on idle.
    pub fn remove_all_subscribers(&self) {
        self.stream.remove_all_subscribers();
    }

    /// The laziness policy fixed at construction.
    pub fn policy(&self) -> Lazy {
        self.inner.policy
    }
}

impl<V> Reactive<V> for LazyStream<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn subscribe(
        &self,
        handler: Handler<V>,
        options: SubscribeOptions,
    ) -> Result<Subscription<V>, StreamError> {
        self.stream.subscribe(handler, options)
    }
}

impl<V> Clone for LazyStream<V> {
    fn clone(&self) -> Self {
        Self {
            stream: self.stream.clone(),
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> fmt::Debug for LazyStream<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyStream")
            .field("id", &self.stream.id())
            .field("policy", &self.inner.policy)
            .field("started", &*self.inner.started.lock())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_producer(stream: &LazyStream<i32>) -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let starts = Arc::new(AtomicUsize::new(0));
        let stops = Arc::new(AtomicUsize::new(0));
        let starts_clone = starts.clone();
        let stops_clone = stops.clone();
        stream.set_producer(
            move || {
                starts_clone.fetch_add(1, Ordering::SeqCst);
            },
            move || {
                stops_clone.fetch_add(1, Ordering::SeqCst);
            },
        );
        (starts, stops)
    }

    #[test]
    fn initial_policy_starts_at_first_subscriber_only() {
        let stream: LazyStream<i32> = LazyStream::new(Lazy::Initial);
        let (starts, stops) = counting_producer(&stream);

        assert_eq!(starts.load(Ordering::SeqCst), 0);

        let a = stream.on_value(|_| {}).unwrap();
        assert_eq!(starts.load(Ordering::SeqCst), 1);

        // Initial never auto-stops, and never restarts.
        a.unsubscribe();
        assert_eq!(stops.load(Ordering::SeqCst), 0);
        stream.on_value(|_| {}).unwrap();
        assert_eq!(starts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn very_policy_round_trips_per_edge() {
        let stream: LazyStream<i32> = LazyStream::new(Lazy::Very);
        let (starts, stops) = counting_producer(&stream);

        // subscribe -> unsubscribe -> subscribe yields start, stop, start.
        let a = stream.on_value(|_| {}).unwrap();
        a.unsubscribe();
        let b = stream.on_value(|_| {}).unwrap();

        assert_eq!(starts.load(Ordering::SeqCst), 2);
        assert_eq!(stops.load(Ordering::SeqCst), 1);

        b.unsubscribe();
        assert_eq!(stops.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn eager_policies_start_when_producer_is_installed() {
        for policy in [Lazy::None, Lazy::Never] {
            let stream: LazyStream<i32> = LazyStream::new(policy);
            let (starts, stops) = counting_producer(&stream);

            // No subscriber needed.
            assert_eq!(starts.load(Ordering::SeqCst), 1);

            let sub = stream.on_value(|_| {}).unwrap();
            sub.unsubscribe();
            assert_eq!(starts.load(Ordering::SeqCst), 1);
            assert_eq!(stops.load(Ordering::SeqCst), 0);
        }
    }

    #[test]
    fn dispose_stops_the_producer_regardless_of_policy() {
        let stream: LazyStream<i32> = LazyStream::new(Lazy::Initial);
        let (starts, stops) = counting_producer(&stream);

        stream.on_value(|_| {}).unwrap();
        assert_eq!(starts.load(Ordering::SeqCst), 1);

        stream.dispose("done with it");
        assert_eq!(stops.load(Ordering::SeqCst), 1);

        // Idempotent: a second dispose does not re-stop.
        stream.dispose("again");
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn last_returns_initial_then_latest() {
        let stream = LazyStream::with_initial(Lazy::Initial, 10);
        assert_eq!(stream.last(), Some(10));

        stream.set(42).unwrap();
        assert_eq!(stream.last(), Some(42));

        stream.set(43).unwrap();
        assert_eq!(stream.last(), Some(43));
    }

    #[test]
    fn last_is_visible_during_dispatch() {
        let stream = LazyStream::with_initial(Lazy::Initial, 0);
        let observed = Arc::new(AtomicUsize::new(0));
        let observed_clone = observed.clone();
        let stream_clone = stream.clone();

        stream
            .on_value(move |_| {
                observed_clone.store(
                    stream_clone.last().unwrap() as usize,
                    Ordering::SeqCst,
                );
            })
            .unwrap();

        stream.set(5).unwrap();
        assert_eq!(observed.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn set_on_disposed_lazy_stream_fails_and_keeps_last() {
        let stream = LazyStream::with_initial(Lazy::Initial, 1);
        stream.set(2).unwrap();
        stream.dispose("closed");

        assert_eq!(stream.set(3), Err(StreamError::Disposed));
        assert_eq!(stream.last(), Some(2));
    }

    #[test]
    fn on_dispose_callback_receives_reason() {
        let stream: LazyStream<i32> = LazyStream::new(Lazy::Initial);
        let reason = Arc::new(Mutex::new(String::new()));
        let reason_clone = Arc::clone(&reason);
        stream.set_on_dispose(move |r| {
            *reason_clone.lock() = r.to_string();
        });

        stream.dispose("teardown");
        assert_eq!(*reason.lock(), "teardown");
    }
}
