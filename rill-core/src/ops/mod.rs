//! Combinators
//!
//! Every operator here derives one stream from one or more others. The
//! single-source operators are thin policy layers over
//! [`crate::upstream::init_upstream`]; the multi-source joins
//! (`merge_as_array`, `synchronise`) manage one slot and one owned
//! subscription per source.
//!
//! Operators whose option sets can be contradictory or incomplete
//! validate them synchronously and return
//! [`crate::error::StreamError::Config`] at construction; nothing is
//! deferred to dispatch time.

mod batch;
mod cache;
mod debounce;
mod field;
mod filter;
mod merge;
mod resolve;
mod sync;
mod throttle;
mod transform;

pub use batch::{batch, BatchLogic, BatchOptions};
pub use cache::{cache, CacheOptions};
pub use debounce::{debounce, DebounceOptions};
pub use field::{field, FieldOptions};
pub use filter::{filter, FilterOptions};
pub use merge::{merge_as_array, MergeOptions};
pub use resolve::{
    resolve, resolve_with_fallback, Loops, Resolvable, ResolveFallbackOptions, ResolveOptions,
};
pub use sync::{synchronise, SyncOptions};
pub use throttle::{throttle, ThrottleOptions};
pub use transform::{transform, TransformOptions};
