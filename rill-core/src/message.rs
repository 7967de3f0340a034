//! Message Model
//!
//! Every dispatch through a stream carries a [`Message`]: either a value
//! or a named signal. The two cases are mutually exclusive by
//! construction - the enum makes it impossible to build a dispatch that
//! is both at once, so no decoding-boundary validation is needed.
//!
//! # Signals
//!
//! Signals are out-of-band notifications. The only signal the engine
//! itself interprets is [`SignalKind::Done`], which marks permanent
//! completion of the emitting stream: derived streams treat it as a cue
//! to dispose themselves, and binding layers treat it as teardown.
//! Custom named signals pass through derived streams untouched.
//!
//! # Wire shape
//!
//! Messages serialize for the benefit of binding layers that move them
//! across process boundaries (e.g. a render thread). The engine itself
//! never round-trips messages through serde.

use serde::{Deserialize, Serialize};

/// The kind of signal carried by a signal message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// Permanent completion of the emitting stream. Terminal.
    Done,

    /// A custom, application-defined signal. Passed through derived
    /// streams without interpretation.
    Custom(String),
}

impl SignalKind {
    /// Whether this is the `Done` completion signal.
    pub fn is_done(&self) -> bool {
        matches!(self, SignalKind::Done)
    }
}

/// A single dispatch through a stream: exactly one of a value or a signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Message<V> {
    /// A payload dispatch.
    Value(V),

    /// An out-of-band signal dispatch.
    Signal {
        /// Which signal this is.
        kind: SignalKind,
        /// Optional human-readable context, e.g. `"Disposed: <reason>"`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        context: Option<String>,
    },
}

impl<V> Message<V> {
    /// Build the completion signal with the given context.
    pub fn done(context: impl Into<String>) -> Self {
        Message::Signal {
            kind: SignalKind::Done,
            context: Some(context.into()),
        }
    }

    /// The carried value, if this is a value message.
    pub fn value(&self) -> Option<&V> {
        match self {
            Message::Value(v) => Some(v),
            Message::Signal { .. } => None,
        }
    }

    /// Whether this is the completion signal.
    pub fn is_done(&self) -> bool {
        matches!(
            self,
            Message::Signal {
                kind: SignalKind::Done,
                ..
            }
        )
    }
}
