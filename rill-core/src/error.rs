//! Error types for the stream engine.
//!
//! The engine distinguishes two failure kinds:
//!
//! - `Disposed`: an operation (`set`, `signal`, `subscribe`) was attempted
//!   on a stream that has already reached its terminal state.
//! - `Config`: a combinator was constructed with contradictory or
//!   incomplete options. These are surfaced synchronously at construction
//!   and never retried internally.
//!
//! Stream completion itself is not an error: it travels as a `done`
//! signal message (see [`crate::message::Message`]).

use thiserror::Error;

/// Errors produced by stream operations and combinator construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// The stream is disposed; no further operations are possible.
    #[error("stream is disposed")]
    Disposed,

    /// A combinator was given an invalid option set.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl StreamError {
    /// Shorthand for constructing a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
