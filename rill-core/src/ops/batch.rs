//! Batch: collect source values into arrays.
//!
//! Values queue FIFO. Each arrival enqueues, then evaluates the trigger:
//! a quantity limit, an elapsed window since the last flush, or a
//! combination of the two. On trigger the queue drains into one output
//! array and the elapsed clock resets. When the source completes, a
//! non-empty remainder flushes as a final array (unless disabled) before
//! the completion cascade disposes the output.
//!
//! The elapsed window is evaluated on arrival against the injected
//! [`Clock`]; no timer fires on its own.

use std::mem;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::StreamError;
use crate::lazy::{Lazy, LazyStream};
use crate::stream::Reactive;
use crate::time::{Clock, SystemClock};
use crate::upstream::{init_upstream, UpstreamOptions};

/// How multiple configured triggers combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchLogic {
    /// Flush when any configured trigger fires.
    #[default]
    Or,

    /// Flush only when every configured trigger fires.
    And,
}

/// Options for [`batch`].
pub struct BatchOptions {
    /// Flush when the queue reaches this many values.
    pub limit: Option<usize>,

    /// Flush when this much time has passed since the last flush.
    pub elapsed: Option<Duration>,

    /// How `limit` and `elapsed` combine when both are configured.
    pub logic: BatchLogic,

    /// Flush a non-empty remainder when the source completes.
    pub return_remainder: bool,

    pub lazy: Lazy,

    /// Clock for the elapsed window. Defaults to the system clock.
    pub clock: Option<Arc<dyn Clock>>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            limit: None,
            elapsed: None,
            logic: BatchLogic::default(),
            return_remainder: true,
            lazy: Lazy::default(),
            clock: None,
        }
    }
}

struct BatchState<V> {
    queue: Vec<V>,
    last_flush: Instant,
}

/// Derive a stream of arrays from a stream of values.
///
/// Fails with [`StreamError::Config`] when no trigger is configured, or
/// a configured trigger is degenerate (`limit` of zero, zero window).
pub fn batch<V, S>(source: &S, options: BatchOptions) -> Result<LazyStream<Vec<V>>, StreamError>
where
    V: Clone + Send + Sync + 'static,
    S: Reactive<V> + Clone + Send + Sync + 'static,
{
    if options.limit.is_none() && options.elapsed.is_none() {
        return Err(StreamError::config(
            "batch requires a limit or an elapsed window",
        ));
    }
    if options.limit == Some(0) {
        return Err(StreamError::config("batch limit must be greater than zero"));
    }
    if options.elapsed == Some(Duration::ZERO) {
        return Err(StreamError::config(
            "batch elapsed window must be greater than zero",
        ));
    }

    let clock = options.clock.unwrap_or_else(|| Arc::new(SystemClock));
    let limit = options.limit;
    let elapsed = options.elapsed;
    let logic = options.logic;
    let return_remainder = options.return_remainder;

    let state = Arc::new(Mutex::new(BatchState {
        queue: Vec::new(),
        last_flush: clock.now(),
    }));

    let on_done = {
        let state = Arc::clone(&state);
        move |out: &LazyStream<Vec<V>>| {
            let remainder = mem::take(&mut state.lock().queue);
            if return_remainder && !remainder.is_empty() {
                let _ = out.set(remainder);
            }
        }
    };

    let on_value = {
        let state = Arc::clone(&state);
        move |value: &V, out: &LazyStream<Vec<V>>| {
            let flushed = {
                let mut state = state.lock();
                state.queue.push(value.clone());

                let by_limit = limit.map(|limit| state.queue.len() >= limit);
                let by_elapsed =
                    elapsed.map(|window| clock.now() - state.last_flush >= window);

                let trigger = match logic {
                    BatchLogic::Or => {
                        by_limit.unwrap_or(false) || by_elapsed.unwrap_or(false)
                    }
                    // An unconfigured trigger never withholds a flush.
                    BatchLogic::And => {
                        by_limit.unwrap_or(true) && by_elapsed.unwrap_or(true)
                    }
                };

                if trigger {
                    state.last_flush = clock.now();
                    Some(mem::take(&mut state.queue))
                } else {
                    None
                }
            };

            if let Some(array) = flushed {
                let _ = out.set(array);
            }
        }
    };

    Ok(init_upstream(
        source,
        UpstreamOptions {
            lazy: options.lazy,
            on_done: Some(Arc::new(on_done)),
            ..UpstreamOptions::default()
        },
        on_value,
    ))
}
