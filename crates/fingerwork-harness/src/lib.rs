#![forbid(unsafe_code)]

//! Deterministic test harness for fingerwork.
//!
//! - [`script`]: timestamped touch scripts, built in code or loaded from
//!   JSON traces.
//! - [`recorder`]: consumers that claim by rule and log what they receive.
//! - [`replay`]: drives a `GestureEngine` from a script and checks the
//!   returned gestures against the script's expectations.

pub mod recorder;
pub mod replay;
pub mod script;

pub use recorder::{ClaimRule, Record, RecordLog, Recorder};
pub use replay::{Emitted, ReplayError, ReplayOutcome, Replayer, replay_and_check};
pub use script::{ExpectedGesture, TouchOp, TouchScript, TouchStep};
