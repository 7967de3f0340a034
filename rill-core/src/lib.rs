//! Rill Core
//!
//! This crate is the reactive stream engine of the Rill creative-coding
//! toolkit. It implements:
//!
//! - A push-based pub-sub primitive ([`Stream`]) with snapshot dispatch
//!   and an idempotent disposal lifecycle
//! - A laziness layer ([`LazyStream`]) tying producer start/stop to
//!   subscriber-count edges
//! - The upstream adapter ([`init_upstream`]) derived streams are built
//!   from, with cascading completion
//! - Combinators: transform, field, filter, batch, throttle, debounce,
//!   resolve, merge-as-array, synchronise, cache
//!
//! The rest of the toolkit (geometry animation, canvas drawing, UI
//! components) couples to this crate through one trait: [`Reactive`].
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `message`: the value/signal union carried on every dispatch
//! - `stream`: the core pub-sub cell and the `Reactive` contract
//! - `lazy`: laziness policies and producer lifecycle
//! - `upstream`: the adapter pattern behind every derived stream
//! - `ops`: the combinator set
//! - `time`: clock and scheduler seams (real and virtual-time)
//!
//! # Example
//!
//! ```rust,ignore
//! use rill_core::{Stream, Reactive, ops};
//!
//! // A manual source
//! let pointer: Stream<i32> = Stream::new();
//!
//! // A derived chain: scale, then batch into fives
//! let scaled = ops::transform(&pointer, Default::default(), |v| v * 2);
//! let batched = ops::batch(&scaled, ops::BatchOptions {
//!     limit: Some(5),
//!     ..Default::default()
//! })?;
//!
//! batched.on_value(|chunk| println!("{chunk:?}"))?;
//!
//! for v in 0..20 {
//!     pointer.set(v)?;
//! }
//! // Disposing the source cascades down the chain.
//! pointer.dispose("input closed");
//! ```

pub mod error;
pub mod lazy;
pub mod message;
pub mod ops;
pub mod stream;
pub mod subscriber;
pub mod time;
pub mod upstream;

pub use error::StreamError;
pub use lazy::{Lazy, LazyStream};
pub use message::{Message, SignalKind};
pub use stream::{Phase, Reactive, Stream, StreamOptions, Subscription};
pub use subscriber::{Handler, SubscribeOptions, SubscriberId};
pub use upstream::{init_upstream, UpstreamOptions};
