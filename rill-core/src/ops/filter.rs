//! Filter: forward only the values passing a predicate.

use crate::lazy::{Lazy, LazyStream};
use crate::stream::Reactive;
use crate::upstream::{init_upstream, UpstreamOptions};

/// Options for [`filter`].
#[derive(Default)]
pub struct FilterOptions {
    pub lazy: Lazy,
}

/// Derive a stream that forwards values for which `predicate` is true.
pub fn filter<V, S, P>(source: &S, options: FilterOptions, predicate: P) -> LazyStream<V>
where
    V: Clone + Send + Sync + 'static,
    S: Reactive<V> + Clone + Send + Sync + 'static,
    P: Fn(&V) -> bool + Send + Sync + 'static,
{
    init_upstream(
        source,
        UpstreamOptions {
            lazy: options.lazy,
            ..UpstreamOptions::default()
        },
        move |value: &V, out: &LazyStream<V>| {
            if predicate(value) {
                let _ = out.set(value.clone());
            }
        },
    )
}
