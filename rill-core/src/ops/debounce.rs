//! Debounce: emit the latest value once arrivals go quiet.
//!
//! Each arrival replaces the pending value and re-arms a one-shot timer
//! on the injected [`Scheduler`]; only when `elapsed` passes with no new
//! arrival does the pending value fire downstream. Disposal cancels any
//! armed timer.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::StreamError;
use crate::lazy::{Lazy, LazyStream};
use crate::stream::Reactive;
use crate::time::{CancelHandle, Scheduler};
use crate::upstream::{init_upstream, UpstreamOptions};

/// Options for [`debounce`].
pub struct DebounceOptions {
    /// Quiet period required before the pending value fires.
    pub elapsed: Duration,

    pub lazy: Lazy,
}

impl Default for DebounceOptions {
    fn default() -> Self {
        Self {
            elapsed: Duration::ZERO,
            lazy: Lazy::default(),
        }
    }
}

struct DebounceState<V> {
    pending: Option<V>,
    timer: Option<CancelHandle>,
}

/// Derive a stream that emits only after arrivals pause.
///
/// Fails with [`StreamError::Config`] when the quiet period is zero.
pub fn debounce<V, S>(
    source: &S,
    scheduler: Arc<dyn Scheduler>,
    options: DebounceOptions,
) -> Result<LazyStream<V>, StreamError>
where
    V: Clone + Send + Sync + 'static,
    S: Reactive<V> + Clone + Send + Sync + 'static,
{
    if options.elapsed.is_zero() {
        return Err(StreamError::config(
            "debounce quiet period must be greater than zero",
        ));
    }

    let quiet = options.elapsed;
    let state = Arc::new(Mutex::new(DebounceState::<V> {
        pending: None,
        timer: None,
    }));

    let out = init_upstream(
        source,
        UpstreamOptions {
            lazy: options.lazy,
            ..UpstreamOptions::default()
        },
        {
            let state = Arc::clone(&state);
            move |value: &V, out: &LazyStream<V>| {
                let previous = {
                    let mut state = state.lock();
                    state.pending = Some(value.clone());
                    state.timer.take()
                };
                if let Some(timer) = previous {
                    timer.cancel();
                }

                let fire = {
                    let state = Arc::clone(&state);
                    let out = out.clone();
                    Arc::new(move || {
                        let pending = state.lock().pending.take();
                        if let Some(value) = pending {
                            let _ = out.set(value);
                        }
                    })
                };

                let handle = scheduler.schedule_once(quiet, fire);
                state.lock().timer = Some(handle);
            }
        },
    );

    // A dispose (explicit or cascaded) must not leave a timer armed.
    {
        let state = Arc::clone(&state);
        out.set_on_dispose(move |_| {
            let mut state = state.lock();
            state.pending = None;
            if let Some(timer) = state.timer.take() {
                timer.cancel();
            }
        });
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::Stream;
    use crate::time::ManualScheduler;

    fn setup(quiet_ms: u64) -> (ManualScheduler, Stream<i32>, LazyStream<i32>, Arc<Mutex<Vec<i32>>>) {
        let scheduler = ManualScheduler::new();
        let source: Stream<i32> = Stream::new();
        let debounced = debounce(
            &source,
            Arc::new(scheduler.clone()),
            DebounceOptions {
                elapsed: Duration::from_millis(quiet_ms),
                ..DebounceOptions::default()
            },
        )
        .unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        debounced
            .on_value(move |v| seen_clone.lock().push(*v))
            .unwrap();

        (scheduler, source, debounced, seen)
    }

    #[test]
    fn emits_the_last_value_after_quiet() {
        let (scheduler, source, _debounced, seen) = setup(100);

        source.set(1).unwrap();
        source.set(2).unwrap();
        source.set(3).unwrap();
        assert!(seen.lock().is_empty());

        scheduler.advance(Duration::from_millis(100));
        assert_eq!(*seen.lock(), vec![3]);
    }

    #[test]
    fn a_new_arrival_re_arms_the_timer() {
        let (scheduler, source, _debounced, seen) = setup(100);

        source.set(1).unwrap();
        scheduler.advance(Duration::from_millis(60));
        source.set(2).unwrap();
        scheduler.advance(Duration::from_millis(60));
        assert!(seen.lock().is_empty());

        scheduler.advance(Duration::from_millis(40));
        assert_eq!(*seen.lock(), vec![2]);
    }

    #[test]
    fn dispose_cancels_the_armed_timer() {
        let (scheduler, source, debounced, seen) = setup(100);

        source.set(1).unwrap();
        debounced.dispose("going away");
        scheduler.advance(Duration::from_millis(200));

        assert!(seen.lock().is_empty());
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn zero_quiet_period_is_a_config_error() {
        let scheduler = ManualScheduler::new();
        let source: Stream<i32> = Stream::new();
        assert!(matches!(
            debounce(&source, Arc::new(scheduler), DebounceOptions::default()),
            Err(StreamError::Config(_))
        ));
    }
}
