//! Cache: passthrough with memory.
//!
//! Values flow through untransformed; the derived stream's last-value
//! cell tracks them so [`LazyStream::last`] answers without side
//! effects, seeded by an optional initial value. By default the source
//! is attached lazily (first subscriber); an eager policy attaches at
//! construction so the cache fills even while unobserved.

use crate::lazy::{Lazy, LazyStream};
use crate::stream::Reactive;
use crate::upstream::{init_upstream, UpstreamOptions};

/// Options for [`cache`].
pub struct CacheOptions<V> {
    /// When to attach to the source. `Lazy::Never`/`Lazy::None` attach
    /// at construction.
    pub lazy: Lazy,

    /// Reported by `last()` until the source emits.
    pub initial_value: Option<V>,
}

impl<V> Default for CacheOptions<V> {
    fn default() -> Self {
        Self {
            lazy: Lazy::Initial,
            initial_value: None,
        }
    }
}

/// Derive a caching passthrough of `source`.
pub fn cache<V, S>(source: &S, options: CacheOptions<V>) -> LazyStream<V>
where
    V: Clone + Send + Sync + 'static,
    S: Reactive<V> + Clone + Send + Sync + 'static,
{
    init_upstream(
        source,
        UpstreamOptions {
            lazy: options.lazy,
            initial: options.initial_value,
            ..UpstreamOptions::default()
        },
        |value: &V, out: &LazyStream<V>| {
            let _ = out.set(value.clone());
        },
    )
}
