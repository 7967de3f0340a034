//! Transform: map every source value through a function.

use crate::lazy::{Lazy, LazyStream};
use crate::stream::Reactive;
use crate::upstream::{init_upstream, UpstreamOptions};

/// Options for [`transform`].
#[derive(Default)]
pub struct TransformOptions {
    pub lazy: Lazy,
}

/// Derive a stream that emits `f(value)` for every source value.
///
/// No buffering: output is produced within the dispatch of the input.
/// A panic inside `f` propagates to whatever pushed the source value.
pub fn transform<In, Out, S, F>(source: &S, options: TransformOptions, f: F) -> LazyStream<Out>
where
    In: Clone + Send + Sync + 'static,
    Out: Clone + Send + Sync + 'static,
    S: Reactive<In> + Clone + Send + Sync + 'static,
    F: Fn(&In) -> Out + Send + Sync + 'static,
{
    init_upstream(
        source,
        UpstreamOptions {
            lazy: options.lazy,
            ..UpstreamOptions::default()
        },
        move |value: &In, out: &LazyStream<Out>| {
            let _ = out.set(f(value));
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::Stream;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn maps_every_value() {
        let source: Stream<i32> = Stream::new();
        let doubled = transform(&source, TransformOptions::default(), |v| v * 2);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        doubled.on_value(move |v| seen_clone.lock().push(*v)).unwrap();

        for v in [1, 2, 3] {
            source.set(v).unwrap();
        }
        assert_eq!(*seen.lock(), vec![2, 4, 6]);
    }

    #[test]
    fn can_change_the_value_type() {
        let source: Stream<i32> = Stream::new();
        let rendered = transform(&source, TransformOptions::default(), |v| format!("#{v}"));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        rendered
            .on_value(move |v: &String| seen_clone.lock().push(v.clone()))
            .unwrap();

        source.set(9).unwrap();
        assert_eq!(*seen.lock(), vec!["#9".to_string()]);
    }

    #[test]
    fn completes_with_its_source() {
        let source: Stream<i32> = Stream::new();
        let doubled = transform(&source, TransformOptions::default(), |v| v * 2);
        doubled.on_value(|_| {}).unwrap();

        source.dispose("upstream finished");
        assert!(doubled.is_disposed());
    }
}
