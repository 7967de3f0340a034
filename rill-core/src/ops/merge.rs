//! Merge-as-array: combine sources into a latest-values row.
//!
//! One slot per source, in argument order. Every individual source
//! emission updates its slot and immediately emits a copy of the whole
//! row, so output rows carry the most recent value from every source -
//! `None` for a source that has not emitted yet. The output disposes
//! once every source has completed.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::StreamError;
use crate::lazy::{Lazy, LazyStream};
use crate::message::Message;
use crate::stream::{Reactive, Subscription};
use crate::subscriber::SubscribeOptions;

/// Options for [`merge_as_array`].
#[derive(Default)]
pub struct MergeOptions {
    pub lazy: Lazy,
}

struct MergeState<V> {
    slots: Vec<Option<V>>,
    done: Vec<bool>,
}

/// Derive a latest-values row stream over `sources`.
///
/// Fails with [`StreamError::Config`] when `sources` is empty.
pub fn merge_as_array<V, S>(
    sources: Vec<S>,
    options: MergeOptions,
) -> Result<LazyStream<Vec<Option<V>>>, StreamError>
where
    V: Clone + Send + Sync + 'static,
    S: Reactive<V> + Clone + Send + Sync + 'static,
{
    if sources.is_empty() {
        return Err(StreamError::config("merge requires at least one source"));
    }

    let count = sources.len();
    let out: LazyStream<Vec<Option<V>>> = LazyStream::new(options.lazy);
    let state = Arc::new(Mutex::new(MergeState {
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
                                state.slots.clone()
                            };
                            let _ = out.set(row);
                        }
                        Message::Signal { kind, .. } => {
                            if kind.is_done() {
                                let all_done = {
                                    let mut state = state.lock();
                                    state.done[index] = true;
                                    state.done.iter().all(|done| *done)
                                };
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
                        dispose_after_attach = state.done.iter().all(|done| *done);
                    }
                }
            }

            // Dispose only after releasing the link lock: the stop
            // callback running inside dispose takes it too.
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
