//! Upstream Adapter
//!
//! The standard way derived streams are built. Given a source
//! implementing [`Reactive`], [`init_upstream`] produces a
//! [`LazyStream`] that:
//!
//! 1. Subscribes to the source only when it transitions `Idle -> Active`
//!    itself (per its own laziness policy, default `Initial`).
//!
//! 2. Feeds every source value through an `on_value` callback, which
//!    computes and forwards output by pushing into the derived stream.
//!
//! 3. Unsubscribes from the source on its own `Active -> Idle` edge only
//!    under policy `Very`; otherwise the subscription, once established,
//!    is retained until disposal.
//!
//! 4. Treats an upstream `done` signal as its own completion (when
//!    `dispose_if_source_done`, the default): it disposes itself with
//!    reason `"Source done"`, cascading to its own subscribers. The
//!    cascade is synchronous and depth-first.
//!
//! The derived stream exclusively owns its subscription handle to the
//! source; it never shares that handle. Custom (non-`done`) signals are
//! forwarded downstream untouched.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::lazy::{Lazy, LazyStream};
use crate::message::Message;
use crate::stream::{Reactive, Subscription};
use crate::subscriber::SubscribeOptions;

/// Callback run against the derived stream just before an
/// upstream-completion dispose, e.g. to flush buffered values.
pub type OnDone<Out> = Arc<dyn Fn(&LazyStream<Out>) + Send + Sync>;

/// Options for [`init_upstream`].
pub struct UpstreamOptions<Out> {
    /// Laziness policy of the derived stream.
    pub lazy: Lazy,

    /// Dispose the derived stream when the source signals `done`.
    /// When false, upstream completion is ignored.
    pub dispose_if_source_done: bool,

    /// Seed for the derived stream's last-value cell.
    pub initial: Option<Out>,

    /// Runs before the upstream-completion dispose.
    pub on_done: Option<OnDone<Out>>,
}

impl<Out> Default for UpstreamOptions<Out> {
    fn default() -> Self {
        Self {
            lazy: Lazy::Initial,
            dispose_if_source_done: true,
            initial: None,
            on_done: None,
        }
    }
}

/// Build a derived stream over a single source.
///
/// `on_value` receives each source value together with the derived
/// stream, and forwards output by calling `set` on it (zero, one, or
/// many times per input).
pub fn init_upstream<In, Out, S, F>(
    source: &S,
    options: UpstreamOptions<Out>,
    on_value: F,
) -> LazyStream<Out>
where
    In: Clone + Send + Sync + 'static,
    Out: Clone + Send + Sync + 'static,
    S: Reactive<In> + Clone + Send + Sync + 'static,
    F: Fn(&In, &LazyStream<Out>) + Send + Sync + 'static,
{
    let out = match options.initial {
        Some(initial) => LazyStream::with_initial(options.lazy, initial),
        None => LazyStream::new(options.lazy),
    };

    let link: Arc<Mutex<Option<Subscription<In>>>> = Arc::new(Mutex::new(None));
    let on_value: Arc<F> = Arc::new(on_value);

    let start = {
        let source = source.clone();
        let out = out.clone();
        let link = Arc::clone(&link);
        let on_value = Arc::clone(&on_value);
        let on_done = options.on_done.clone();
        let dispose_if_source_done = options.dispose_if_source_done;

        move || {
            let mut slot = link.lock();
            if slot.is_some() {
                return;
            }

            let handler = {
                let out = out.clone();
                let on_value = Arc::clone(&on_value);
                let on_done = on_done.clone();
                Arc::new(move |message: &Message<In>| match message {
                    Message::Value(value) => on_value(value, &out),
                    Message::Signal { kind, context } => {
                        if kind.is_done() {
                            if let Some(hook) = &on_done {
                                hook(&out);
                            }
                            if dispose_if_source_done {
                                out.dispose("Source done");
                            }
                        } else {
                            // Pass custom signals through.
                            let _ = out.signal(kind.clone(), context.clone());
                        }
                    }
                })
            };

            match source.subscribe(handler, SubscribeOptions::default()) {
                Ok(subscription) => {
                    trace!(derived = out.id(), "upstream link established");
                    *slot = Some(subscription);
                }
                Err(_) => {
                    // The source completed before we ever attached.
                    // Release the link lock first: dispose stops the
                    // producer, and the stop callback takes this lock.
                    drop(slot);
                    if let Some(hook) = &on_done {
                        hook(&out);
                    }
                    if dispose_if_source_done {
                        out.dispose("Source done");
                    }
                }
            }
        }
    };

    let stop = {
        let link = Arc::clone(&link);
        move || {
            if let Some(subscription) = link.lock().take() {
                subscription.unsubscribe();
            }
        }
    };

    out.set_producer(start, stop);
    out
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
