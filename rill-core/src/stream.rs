//! Core Stream
//!
//! A [`Stream`] is the fundamental push primitive: a mutable pub-sub
//! cell holding an ordered subscriber registry and a lifecycle phase.
//!
//! # How Streams Work
//!
//! 1. Subscribers register through [`Reactive::subscribe`] (or the `on*`
//!    sugar) and receive every subsequent [`Message`] in subscription
//!    order.
//!
//! 2. Producers push with [`Stream::set`] (value messages) or
//!    [`Stream::signal`] (signal messages). Dispatch iterates a snapshot
//!    of the registry, so mid-dispatch subscribe/unsubscribe calls take
//!    effect on the next dispatch only.
//!
//! 3. [`Stream::dispose`] is idempotent and terminal: the first call
//!    broadcasts a `done` signal with context `"Disposed: <reason>"`,
//!    after which `set`, `signal` and `subscribe` fail with
//!    [`StreamError::Disposed`].
//!
//! # Lifecycle hooks
//!
//! `on_first_subscribe` fires synchronously on every 0 -> 1 subscriber
//! transition and `on_no_subscribers` on every 1 -> 0 transition. The
//! lazy wrapper (see [`crate::lazy`]) builds producer start/stop policy
//! on top of these two edges.
//!
//! # Re-entrancy
//!
//! Locks are held only for registry bookkeeping, never across a handler
//! invocation. A handler may therefore subscribe, unsubscribe, push, or
//! dispose its own stream mid-dispatch without deadlocking; the disposed
//! check at the top of each operation guards double-entry.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::StreamError;
use crate::message::{Message, SignalKind};
use crate::subscriber::{Handler, SubscribeOptions, SubscriberId, SubscriberSet};

/// Counter for generating unique stream IDs.
static STREAM_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a new unique stream ID.
fn next_stream_id() -> u64 {
    STREAM_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Lifecycle phase of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No subscribers yet (or all gone).
    Idle,

    /// At least one subscriber.
    Active,

    /// Terminal. Reached by [`Stream::dispose`] from either other phase.
    Disposed,
}

/// Subscriber-count edge callback.
pub type Hook = Arc<dyn Fn() + Send + Sync>;

/// Disposal callback, invoked with the dispose reason.
pub type DisposeHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Construction-time hooks and metadata for a [`Stream`].
#[derive(Default)]
pub struct StreamOptions {
    /// Label included in trace output. Purely diagnostic.
    pub label: Option<String>,

    /// Fires exactly once per 0 -> 1 subscriber transition.
    pub on_first_subscribe: Option<Hook>,

    /// Fires exactly once per 1 -> 0 subscriber transition.
    pub on_no_subscribers: Option<Hook>,

    /// Fires once, after the done signal has been dispatched.
    pub on_dispose: Option<DisposeHook>,
}

struct StreamState<V> {
    subscribers: SubscriberSet<V>,
    phase: Phase,
    on_first_subscribe: Option<Hook>,
    on_no_subscribers: Option<Hook>,
    on_dispose: Option<DisposeHook>,
    label: Option<String>,
}

struct StreamInner<V> {
    id: u64,
    state: Mutex<StreamState<V>>,
}

/// The contract every push source satisfies. This is the sole interface
/// the rest of the toolkit consumes: anything wanting push updates
/// subscribes through it, and no other coupling is required.
pub trait Reactive<V>: Send + Sync
where
    V: Clone + Send + Sync + 'static,
{
    /// Register a handler for every message. Fails with
    /// [`StreamError::Disposed`] if the stream has completed.
    fn subscribe(
        &self,
        handler: Handler<V>,
        options: SubscribeOptions,
    ) -> Result<Subscription<V>, StreamError>;

    /// Register a closure for every message.
    fn on<F>(&self, handler: F) -> Result<Subscription<V>, StreamError>
    where
        Self: Sized,
        F: Fn(&Message<V>) + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(handler), SubscribeOptions::default())
    }

    /// Register a closure for value messages only.
    fn on_value<F>(&self, handler: F) -> Result<Subscription<V>, StreamError>
    where
        Self: Sized,
        F: Fn(&V) + Send + Sync + 'static,
    {
        self.subscribe(
            Arc::new(move |message: &Message<V>| {
                if let Message::Value(value) = message {
                    handler(value);
                }
            }),
            SubscribeOptions::default(),
        )
    }

    /// Register a closure for the next value message only. Signal
    /// messages pass through without consuming the registration.
    fn once_value<F>(&self, handler: F) -> Result<Subscription<V>, StreamError>
    where
        Self: Sized,
        F: Fn(&V) + Send + Sync + 'static,
    {
        let slot: Arc<Mutex<Option<Subscription<V>>>> = Arc::new(Mutex::new(None));
        let fired = Arc::new(AtomicBool::new(false));
        let subscription = {
            let slot = Arc::clone(&slot);
            let fired = Arc::clone(&fired);
            self.subscribe(
                Arc::new(move |message: &Message<V>| {
                    if let Message::Value(value) = message {
                        if !fired.swap(true, Ordering::SeqCst) {
                            handler(value);
                            if let Some(sub) = slot.lock().take() {
                                sub.unsubscribe();
                            }
                        }
                    }
                }),
                SubscribeOptions::default(),
            )?
        };
        *slot.lock() = Some(subscription.clone());
        Ok(subscription)
    }
}

/// A push-based pub-sub cell.
///
/// Cloning a `Stream` shares its state: clones see the same subscribers,
/// phase and hooks.
///
/// # Example
///
/// ```rust,ignore
/// let numbers: Stream<i32> = Stream::new();
/// let sub = numbers.on_value(|v| println!("got {v}"))?;
/// numbers.set(1)?;
/// sub.unsubscribe();
/// ```
pub struct Stream<V> {
    inner: Arc<StreamInner<V>>,
}

impl<V> Stream<V> {
    /// Get the stream's unique ID.
    pub fn id(&self) -> u64 {
        self.inner.id
    }
}

impl<V> Stream<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a new idle stream with no hooks.
    pub fn new() -> Self {
        Self::with_options(StreamOptions::default())
    }

    /// Create a new idle stream with the given hooks and label.
    pub fn with_options(options: StreamOptions) -> Self {
        Self {
            inner: Arc::new(StreamInner {
                id: next_stream_id(),
                state: Mutex::new(StreamState {
                    subscribers: SubscriberSet::new(),
                    phase: Phase::Idle,
                    on_first_subscribe: options.on_first_subscribe,
                    on_no_subscribers: options.on_no_subscribers,
                    on_dispose: options.on_dispose,
                    label: options.label,
                }),
            }),
        }
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.inner.state.lock().phase
    }

    /// Whether [`Stream::dispose`] has been called.
    pub fn is_disposed(&self) -> bool {
        self.phase() == Phase::Disposed
    }

    /// Number of currently registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.state.lock().subscribers.len()
    }

    pub(crate) fn set_on_first_subscribe(&self, hook: Hook) {
        self.inner.state.lock().on_first_subscribe = Some(hook);
    }

    pub(crate) fn set_on_no_subscribers(&self, hook: Hook) {
        self.inner.state.lock().on_no_subscribers = Some(hook);
    }

    pub(crate) fn set_on_dispose(&self, hook: DisposeHook) {
        self.inner.state.lock().on_dispose = Some(hook);
    }

    /// Push a value message to all current subscribers, in subscription
    /// order. Fails with [`StreamError::Disposed`] if disposed.
    pub fn set(&self, value: V) -> Result<(), StreamError> {
        self.dispatch(Message::Value(value))
    }

    /// Push a signal message to all current subscribers, in subscription
    /// order. Fails with [`StreamError::Disposed`] if disposed.
    pub fn signal(&self, kind: SignalKind, context: Option<String>) -> Result<(), StreamError> {
        self.dispatch(Message::Signal { kind, context })
    }

    fn dispatch(&self, message: Message<V>) -> Result<(), StreamError> {
        let snapshot = {
            let state = self.inner.state.lock();
            if state.phase == Phase::Disposed {
                return Err(StreamError::Disposed);
            }
            state.subscribers.snapshot()
        };

        for (_, handler, _) in &snapshot {
            handler(&message);
        }

        // Once-subscribers are consumed by any delivery. Their removal can
        // be this stream's 1 -> 0 edge.
        if snapshot.iter().any(|(_, _, once)| *once) {
            let hook = {
                let mut state = self.inner.state.lock();
                for (id, _, once) in &snapshot {
                    if *once {
                        state.subscribers.remove(*id);
                    }
                }
                if state.subscribers.is_empty() && state.phase == Phase::Active {
                    state.phase = Phase::Idle;
                    state.on_no_subscribers.clone()
                } else {
                    None
                }
            };
            if let Some(hook) = hook {
                hook();
            }
        }

        Ok(())
    }

    /// Dispose the stream. Idempotent.
    ///
    /// The first call broadcasts a `done` signal with context
    /// `"Disposed: <reason>"` to current subscribers, then invokes the
    /// `on_dispose` hook. Subsequent calls are no-ops.
    pub fn dispose(&self, reason: &str) {
        let (snapshot, on_dispose, label) = {
            let mut state = self.inner.state.lock();
            if state.phase == Phase::Disposed {
                return;
            }
            state.phase = Phase::Disposed;
            let snapshot = state.subscribers.snapshot();
            state.subscribers.clear();
            (snapshot, state.on_dispose.take(), state.label.clone())
        };

        debug!(stream = self.inner.id, label = label.as_deref(), reason, "stream disposed");

        let message: Message<V> = Message::done(format!("Disposed: {reason}"));
        for (_, handler, _) in &snapshot {
            handler(&message);
        }

        if let Some(hook) = on_dispose {
            hook(reason);
        }
    }

    /// Clear the subscriber list without disposing.
    ///
    /// Counts as a 1 -> 0 transition if subscribers were present.
    pub fn remove_all_subscribers(&self) {
        let hook = {
            let mut state = self.inner.state.lock();
            let had_subscribers = !state.subscribers.is_empty();
            state.subscribers.clear();
            if had_subscribers && state.phase == Phase::Active {
                state.phase = Phase::Idle;
                state.on_no_subscribers.clone()
            } else {
                None
            }
        };
        if let Some(hook) = hook {
            hook();
        }
    }
}

impl<V> Reactive<V> for Stream<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn subscribe(
        &self,
        handler: Handler<V>,
        options: SubscribeOptions,
    ) -> Result<Subscription<V>, StreamError> {
        let (id, hook) = {
            let mut state = self.inner.state.lock();
            if state.phase == Phase::Disposed {
                return Err(StreamError::Disposed);
            }
            let was_empty = state.subscribers.is_empty();
            let id = state.subscribers.add(handler, options.once);
            let hook = if was_empty {
                state.phase = Phase::Active;
                state.on_first_subscribe.clone()
            } else {
                None
            };
            (id, hook)
        };

        trace!(stream = self.inner.id, subscriber = id.raw(), "subscribed");
        if let Some(hook) = hook {
            hook();
        }

        Ok(Subscription {
            inner: Arc::downgrade(&self.inner),
            id,
        })
    }
}

impl<V> Default for Stream<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for Stream<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> fmt::Debug for Stream<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Stream")
            .field("id", &self.inner.id)
            .field("phase", &state.phase)
            .field("subscriber_count", &state.subscribers.len())
            .finish()
    }
}

/// Handle to an active subscription.
///
/// [`Subscription::unsubscribe`] is idempotent: calling it twice, or
/// after the stream is disposed, is a no-op. Dropping the handle does
/// NOT unsubscribe; teardown is always explicit.
pub struct Subscription<V> {
    inner: Weak<StreamInner<V>>,
    id: SubscriberId,
}

impl<V> Subscription<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Remove this subscriber from its stream. Idempotent; never fails.
    pub fn unsubscribe(&self) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        let hook = {
            let mut state = inner.state.lock();
            let removed = state.subscribers.remove(self.id);
            if removed && state.subscribers.is_empty() && state.phase == Phase::Active {
                state.phase = Phase::Idle;
                state.on_no_subscribers.clone()
            } else {
                None
            }
        };
        if let Some(hook) = hook {
            hook();
        }
    }

    /// The subscriber id this handle controls.
    pub fn id(&self) -> SubscriberId {
        self.id
    }
}

impl<V> Clone for Subscription<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
            id: self.id,
        }
    }
}

impl<V> fmt::Debug for Subscription<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
