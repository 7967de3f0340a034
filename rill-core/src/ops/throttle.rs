//! Throttle: rate-limit a stream, last value wins.
//!
//! Every arrival overwrites the tracked value; an arrival also fires it
//! downstream when at least `elapsed` has passed since the previous
//! fire. Values arriving inside the window are overwritten, never
//! queued. The first arrival always fires.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::StreamError;
use crate::lazy::{Lazy, LazyStream};
use crate::stream::Reactive;
use crate::time::{Clock, SystemClock};
use crate::upstream::{init_upstream, UpstreamOptions};

/// Options for [`throttle`].
pub struct ThrottleOptions {
    /// Minimum time between fires.
    pub elapsed: Duration,

    pub lazy: Lazy,

    /// Clock for the window. Defaults to the system clock.
    pub clock: Option<Arc<dyn Clock>>,
}

impl Default for ThrottleOptions {
    fn default() -> Self {
        Self {
            elapsed: Duration::ZERO,
            lazy: Lazy::default(),
            clock: None,
        }
    }
}

struct ThrottleState<V> {
    last_value: Option<V>,
    last_fire: Option<Instant>,
}

/// Derive a rate-limited stream.
///
/// Fails with [`StreamError::Config`] when the window is zero.
pub fn throttle<V, S>(source: &S, options: ThrottleOptions) -> Result<LazyStream<V>, StreamError>
where
    V: Clone + Send + Sync + 'static,
    S: Reactive<V> + Clone + Send + Sync + 'static,
{
    if options.elapsed.is_zero() {
        return Err(StreamError::config(
            "throttle elapsed window must be greater than zero",
        ));
    }

    let clock = options.clock.unwrap_or_else(|| Arc::new(SystemClock));
    let window = options.elapsed;

    let state = Arc::new(Mutex::new(ThrottleState::<V> {
        last_value: None,
        last_fire: None,
    }));

    Ok(init_upstream(
        source,
        UpstreamOptions {
            lazy: options.lazy,
            ..UpstreamOptions::default()
        },
        move |value: &V, out: &LazyStream<V>| {
            let fired = {
                let mut state = state.lock();
                state.last_value = Some(value.clone());

                let due = state
                    .last_fire
                    .map_or(true, |last| clock.now() - last >= window);
                if due {
                    state.last_fire = Some(clock.now());
                    state.last_value.take()
                } else {
                    None
                }
            };

            if let Some(value) = fired {
                let _ = out.set(value);
            }
        },
    ))
}
