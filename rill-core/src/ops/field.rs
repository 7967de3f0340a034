//! Field: pluck a named field from a stream of records.
//!
//! Records are `serde_json::Value` objects, the shape event-style
//! producers (pointers, sensors, parsed payloads) hand around. A record
//! missing the field is either substituted with a configured default or
//! dropped; a record carrying an explicit JSON `null` counts as present.

use serde_json::Value;
use tracing::trace;

use crate::lazy::{Lazy, LazyStream};
use crate::stream::Reactive;
use crate::upstream::{init_upstream, UpstreamOptions};

/// Options for [`field`].
#[derive(Default)]
pub struct FieldOptions {
    pub lazy: Lazy,

    /// Emitted in place of a missing field. When absent, records
    /// without the field are dropped.
    pub missing_field_default: Option<Value>,
}

/// Derive a stream of `record[key]` values from a stream of records.
pub fn field<S>(source: &S, key: impl Into<String>, options: FieldOptions) -> LazyStream<Value>
where
    S: Reactive<Value> + Clone + Send + Sync + 'static,
{
    let key = key.into();
    let missing_default = options.missing_field_default;

    init_upstream(
        source,
        UpstreamOptions {
            lazy: options.lazy,
            ..UpstreamOptions::default()
        },
        move |record: &Value, out: &LazyStream<Value>| match record.get(&key) {
            Some(value) => {
                let _ = out.set(value.clone());
            }
            None => {
                if let Some(default) = &missing_default {
                    let _ = out.set(default.clone());
                } else {
                    trace!(%key, "record missing field, dropped");
                }
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::Stream;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;

    fn collect(stream: &LazyStream<Value>) -> Arc<Mutex<Vec<Value>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        stream
            .on_value(move |v| seen_clone.lock().push(v.clone()))
            .unwrap();
        seen
    }

    #[test]
    fn plucks_the_named_field() {
        let source: Stream<Value> = Stream::new();
        let xs = field(&source, "x", FieldOptions::default());
        let seen = collect(&xs);

        source.set(json!({ "x": 1, "y": 9 })).unwrap();
        source.set(json!({ "x": 2 })).unwrap();

        assert_eq!(*seen.lock(), vec![json!(1), json!(2)]);
    }

    #[test]
    fn missing_field_is_dropped_by_default() {
        let source: Stream<Value> = Stream::new();
        let xs = field(&source, "x", FieldOptions::default());
        let seen = collect(&xs);

        source.set(json!({ "x": 1 })).unwrap();
        source.set(json!({ "y": 5 })).unwrap();
        source.set(json!({ "x": 3 })).unwrap();

        assert_eq!(*seen.lock(), vec![json!(1), json!(3)]);
    }

    #[test]
    fn missing_field_uses_the_configured_default() {
        let source: Stream<Value> = Stream::new();
        let xs = field(
            &source,
            "x",
            FieldOptions {
                missing_field_default: Some(json!(0)),
                ..FieldOptions::default()
            },
        );
        let seen = collect(&xs);

        source.set(json!({ "y": 5 })).unwrap();
        source.set(json!({ "x": 7 })).unwrap();

        assert_eq!(*seen.lock(), vec![json!(0), json!(7)]);
    }

    #[test]
    fn explicit_null_counts_as_present() {
        let source: Stream<Value> = Stream::new();
        let xs = field(
            &source,
            "x",
            FieldOptions {
                missing_field_default: Some(json!(-1)),
                ..FieldOptions::default()
            },
        );
        let seen = collect(&xs);

        source.set(json!({ "x": null })).unwrap();
        assert_eq!(*seen.lock(), vec![Value::Null]);
    }
}
