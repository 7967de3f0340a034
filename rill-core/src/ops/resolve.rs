//! Resolve: turn a value or producer function into a stream.
//!
//! Not source-driven: the derived stream is itself a producer. A
//! repeating timer on the injected [`Scheduler`] invokes the producer
//! each tick and pushes the result, until a configured loop count runs
//! out or the loop is cancelled.
//!
//! Under [`Lazy::Very`] the loop runs only while the stream has
//! subscribers; a stop/start round trip begins a fresh loop with the
//! full count (loop position is not preserved).
//!
//! Loop exhaustion cancels the timer but does not dispose the stream -
//! a later restart would be impossible otherwise.
//!
//! [`resolve_with_fallback`] wraps a fallible producer: an `Err` is
//! logged as a warning and replaced by the configured fallback value,
//! and the loop keeps running. The infallible variant never swallows
//! anything; a panic inside the producer propagates to the scheduler
//! tick that invoked it.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::warn;

use crate::error::StreamError;
use crate::lazy::{Lazy, LazyStream};
use crate::time::{CancelHandle, Scheduler};

/// What a resolve stream produces each tick.
pub enum Resolvable<V> {
    /// Re-emit this fixed value.
    Value(V),

    /// Invoke this function and emit its result.
    Function(Arc<dyn Fn() -> V + Send + Sync>),
}

impl<V> Resolvable<V> {
    /// A producer that re-emits a fixed value.
    pub fn value(value: V) -> Self {
        Resolvable::Value(value)
    }

    /// A producer that invokes a function each tick.
    pub fn function<F>(f: F) -> Self
    where
        F: Fn() -> V + Send + Sync + 'static,
    {
        Resolvable::Function(Arc::new(f))
    }
}

/// How many ticks a resolve loop runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Loops {
    /// Run until cancelled.
    #[default]
    Infinite,

    /// Run exactly this many ticks (per loop start).
    Count(usize),
}

/// Options for [`resolve`].
pub struct ResolveOptions {
    /// Tick spacing. Zero means "as fast as the scheduler allows".
    pub interval: Duration,

    pub loops: Loops,

    /// Producer streams default to eager: the loop starts when the
    /// stream is built. Use [`Lazy::Very`] to tie the loop to the
    /// subscriber count.
    pub lazy: Lazy,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            interval: Duration::ZERO,
            loops: Loops::default(),
            lazy: Lazy::Never,
        }
    }
}

/// Build a producer stream from a value or function.
///
/// Fails with [`StreamError::Config`] for a zero loop count.
pub fn resolve<V>(
    producer: Resolvable<V>,
    scheduler: Arc<dyn Scheduler>,
    options: ResolveOptions,
) -> Result<LazyStream<V>, StreamError>
where
    V: Clone + Send + Sync + 'static,
{
    if options.loops == Loops::Count(0) {
        return Err(StreamError::config(
            "resolve loop count must be greater than zero",
        ));
    }

    let out = LazyStream::new(options.lazy);
    let loop_handle: Arc<Mutex<Option<CancelHandle>>> = Arc::new(Mutex::new(None));
    let producer = Arc::new(producer);
    let interval = options.interval;
    let loops = options.loops;

    let start = {
        let out = out.clone();
        let loop_handle = Arc::clone(&loop_handle);
        let producer = Arc::clone(&producer);
        move || {
            let mut slot = loop_handle.lock();
            if slot.is_some() {
                return;
            }

            // Fresh loop, fresh count.
            let remaining = Arc::new(Mutex::new(match loops {
                Loops::Infinite => None,
                Loops::Count(n) => Some(n),
            }));
            let self_handle: Arc<Mutex<Option<CancelHandle>>> = Arc::new(Mutex::new(None));

            let tick = {
                let out = out.clone();
                let producer = Arc::clone(&producer);
                let remaining = Arc::clone(&remaining);
                let self_handle = Arc::clone(&self_handle);
                Arc::new(move || {
                    {
                        let mut remaining = remaining.lock();
                        if let Some(count) = remaining.as_mut() {
                            if *count == 0 {
                                return;
                            }
                            *count -= 1;
                        }
                    }

                    let value = match producer.as_ref() {
                        Resolvable::Value(value) => value.clone(),
                        Resolvable::Function(f) => f(),
                    };
                    let _ = out.set(value);

                    let exhausted = remaining.lock().map_or(false, |count| count == 0);
                    if exhausted {
                        if let Some(handle) = self_handle.lock().take() {
                            handle.cancel();
                        }
                    }
                })
            };

            let handle = scheduler.schedule_repeating(interval, tick);
            *self_handle.lock() = Some(handle.clone());
            *slot = Some(handle);
        }
    };

    let stop = {
        let loop_handle = Arc::clone(&loop_handle);
        move || {
            if let Some(handle) = loop_handle.lock().take() {
                handle.cancel();
            }
        }
    };

    out.set_producer(start, stop);
    Ok(out)
}

/// Options for [`resolve_with_fallback`].
pub struct ResolveFallbackOptions<V> {
    pub interval: Duration,
    pub loops: Loops,
    pub lazy: Lazy,

    /// Emitted in place of a producer error.
    pub fallback_value: V,
}

/// Build a producer stream from a fallible function.
///
/// Producer errors are logged at warn level and replaced with the
/// fallback value; the loop keeps running.
pub fn resolve_with_fallback<V, F, E>(
    producer: F,
    scheduler: Arc<dyn Scheduler>,
    options: ResolveFallbackOptions<V>,
) -> Result<LazyStream<V>, StreamError>
where
    V: Clone + Send + Sync + 'static,
    F: Fn() -> Result<V, E> + Send + Sync + 'static,
    E: std::fmt::Display,
{
    let fallback = options.fallback_value;
    let guarded = Resolvable::function(move || match producer() {
        Ok(value) => value,
        Err(error) => {
            warn!(%error, "resolve producer failed, substituting fallback");
            fallback.clone()
        }
    });

    resolve(
        guarded,
        scheduler,
        ResolveOptions {
            interval: options.interval,
            loops: options.loops,
            lazy: options.lazy,
        },
    )
}
