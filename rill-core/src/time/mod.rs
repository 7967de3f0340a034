//! Time Services
//!
//! The engine does not own an event loop. Everything time-related is
//! expressed against two seams supplied by the environment:
//!
//! - [`Clock`]: a monotonic `now()` read, used by arrival-driven
//!   combinators (`throttle`, `batch` with an elapsed window).
//! - [`Scheduler`]: "invoke this callback after a delay" and "invoke
//!   this callback repeatedly until cancelled", used by producer-style
//!   combinators (`resolve`, `debounce`).
//!
//! Production code uses [`SystemClock`] and [`TokioScheduler`]; tests
//! use [`TestClock`] and [`ManualScheduler`], which run on virtual time
//! and drive callbacks synchronously from `advance`.

mod clock;
mod scheduler;

pub use clock::{Clock, SystemClock, TestClock};
pub use scheduler::{CancelHandle, ManualScheduler, Scheduler, Task, TokioScheduler};
