//! Synchronise: barrier join over multiple sources.
//!
//! One slot per source. A row is emitted only when every surviving
//! source holds a fresh value; emitting resets all surviving slots, so
//! the next row again requires a value from each. A source that
//! completes leaves the waiting set entirely - its slot no longer gates
//! emission and its values no longer appear in rows. The output disposes
//! once every source has completed.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::StreamError;
use crate::lazy::{Lazy, LazyStream};
use crate::message::Message;
use crate::stream::{Reactive, Subscription};
use crate::subscriber::SubscribeOptions;

/// Options for [`synchronise`].
#[derive(Default)]
pub struct SyncOptions {
    pub lazy: Lazy,
}

struct SyncState<V> {
    slots: Vec<Option<V>>,
    done: Vec<bool>,
}

impl<V> SyncState<V> {
    /// Drain a row if every surviving source has a value. Resets the
    /// surviving slots it takes from.
    fn take_ready_row(&mut self) -> Option<Vec<V>> {
        if self.done.iter().all(|done| *done) {
            return None;
        }
        let ready = self
            .slots
            .iter()
            .zip(&self.done)
            .all(|(slot, done)| *done || slot.is_some());
        if !ready {
            return None;
        }
        Some(
            self.slots
                .iter_mut()
                .zip(&self.done)
                .filter(|(_, done)| !**done)
                .map(|(slot, _)| slot.take().expect("surviving slot was checked"))
                .collect(),
        )
    }
}

/// Derive a barrier-join stream over `sources`.
///
/// Fails with [`StreamError::Config`] when `sources` is empty.
pub fn synchronise<V, S>(
    sources: Vec<S>,
    options: SyncOptions,
) -> Result<LazyStream<Vec<V>>, StreamError>
where
    V: Clone + Send + Sync + 'static,
    S: Reactive<V> + Clone + Send + Sync + 'static,
{
    if sources.is_empty() {
        return Err(StreamError::config(
            "synchronise requires at least one source",
        ));
    }

    let count = sources.len();
    let out: LazyStream<Vec<V>> = LazyStream::new(options.lazy);
    let state = Arc::new(Mutex::new(SyncState {
        slots: vec![None; count],
        done: vec![false; count],
    }));
    let links: Arc<Mutex<Vec<Subscription<V>>>> = Arc::new(Mutex::new(Vec::new()));

    let start = {
        let out = out.clone();
        let state = Arc::clone(&state);
        let links = Arc::clone(&links);
        move || {
            let mut attached = links.lock();
            if !attached.is_empty() {
                return;
            }

            let mut dispose_after_attach = false;
            for (index, source) in sources.iter().enumerate() {
                let handler = {
                    let out = out.clone();
                    let state = Arc::clone(&state);
                    Arc::new(move |message: &Message<V>| match message {
                        Message::Value(value) => {
                            let row = {
                                let mut state = state.lock();
                                state.slots[index] = Some(value.clone());
                                state.take_ready_row()
                            };
                            if let Some(row) = row {
                                let _ = out.set(row);
                            }
                        }
                        Message::Signal { kind, .. } => {
                            if kind.is_done() {
                                let (all_done, row) = {
                                    let mut state = state.lock();
                                    state.done[index] = true;
                                    state.slots[index] = None;
                                    let all_done = state.done.iter().all(|done| *done);
                                    // Losing a gate can unblock the rest.
                                    let row = if all_done {
                                        None
                                    } else {
                                        state.take_ready_row()
                                    };
                                    (all_done, row)
                                };
                                if let Some(row) = row {
                                    let _ = out.set(row);
                                }
                                if all_done {
                                    out.dispose("All sources done");
                                }
                            }
                        }
                    })
                };

                match source.subscribe(handler, SubscribeOptions::default()) {
                    Ok(subscription) => attached.push(subscription),
                    Err(_) => {
                        let mut state = state.lock();
                        state.done[index] = true;
                        state.slots[index] = None;
                        dispose_after_attach = state.done.iter().all(|done| *done);
                    }
                }
            }

            drop(attached);
            if dispose_after_attach {
                out.dispose("All sources done");
            }
        }
    };

    let stop = {
        let links = Arc::clone(&links);
        move || {
            for subscription in links.lock().drain(..) {
                subscription.unsubscribe();
            }
        }
    };

    out.set_producer(start, stop);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::Stream;

    fn collect(stream: &LazyStream<Vec<i32>>) -> Arc<Mutex<Vec<Vec<i32>>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        stream
            .on_value(move |row| seen_clone.lock().push(row.clone()))
            .unwrap();
        seen
    }

    #[test]
    fn emits_only_when_every_source_has_a_fresh_value() {
        let fast: Stream<i32> = Stream::new();
        let slow: Stream<i32> = Stream::new();
        let synced =
            synchronise(vec![fast.clone(), slow.clone()], SyncOptions::default()).unwrap();
        let seen = collect(&synced);

        // fast = [0, 1, 2, 3, 4] interleaved with slow = [10, 11].
        fast.set(0).unwrap();
        fast.set(1).unwrap();
        fast.set(2).unwrap();
        assert!(seen.lock().is_empty());

        slow.set(10).unwrap();
        assert_eq!(*seen.lock(), vec![vec![2, 10]]);

        // Slots reset: another fast value alone is not enough.
        fast.set(3).unwrap();
        assert_eq!(seen.lock().len(), 1);
        fast.set(4).unwrap();
        slow.set(11).unwrap();
        assert_eq!(*seen.lock(), vec![vec![2, 10], vec![4, 11]]);
    }

    #[test]
    fn row_order_tracks_argument_order() {
        let a: Stream<i32> = Stream::new();
        let b: Stream<i32> = Stream::new();
        let synced = synchronise(vec![a.clone(), b.clone()], SyncOptions::default()).unwrap();
        let seen = collect(&synced);

        b.set(2).unwrap();
        a.set(1).unwrap();
        assert_eq!(*seen.lock(), vec![vec![1, 2]]);
    }

    #[test]
    fn a_done_source_stops_gating_emission() {
        let a: Stream<i32> = Stream::new();
        let b: Stream<i32> = Stream::new();
        let synced = synchronise(vec![a.clone(), b.clone()], SyncOptions::default()).unwrap();
        let seen = collect(&synced);

        a.set(1).unwrap();
        b.set(2).unwrap();
        assert_eq!(*seen.lock(), vec![vec![1, 2]]);

        a.dispose("a finished");

        // b alone now satisfies the barrier; rows shrink to the survivors.
        b.set(3).unwrap();
        assert_eq!(*seen.lock(), vec![vec![1, 2], vec![3]]);
        assert!(!synced.is_disposed());
    }

    #[test]
    fn a_departing_source_can_unblock_a_pending_row() {
        let a: Stream<i32> = Stream::new();
        let b: Stream<i32> = Stream::new();
        let synced = synchronise(vec![a.clone(), b.clone()], SyncOptions::default()).unwrap();
        let seen = collect(&synced);

        b.set(5).unwrap();
        assert!(seen.lock().is_empty());

        // a leaves without ever emitting; b's pending value is released.
        a.dispose("a finished");
        assert_eq!(*seen.lock(), vec![vec![5]]);
    }

    #[test]
    fn disposes_once_every_source_is_done() {
        let a: Stream<i32> = Stream::new();
        let b: Stream<i32> = Stream::new();
        let synced = synchronise(vec![a.clone(), b.clone()], SyncOptions::default()).unwrap();
        let _seen = collect(&synced);

        a.dispose("a finished");
        assert!(!synced.is_disposed());
        b.dispose("b finished");
        assert!(synced.is_disposed());
    }

    #[test]
    fn no_sources_is_a_config_error() {
        let result = synchronise(Vec::<Stream<i32>>::new(), SyncOptions::default());
        assert!(matches!(result, Err(StreamError::Config(_))));
    }
}
