#![forbid(unsafe_code)]

//! Error taxonomy.
//!
//! - [`ProtocolError`]: the input feed broke its contract (duplicate begin,
//!   unknown contact, garbage coordinates). Returned to the caller; the
//!   offending event is dropped and engine state is left unchanged.
//! - [`InternalError`]: an engine invariant did not hold. Never returned;
//!   logged at `error` level, counted, and the malformed output is dropped.
//! - [`ConfigError`]: the configuration cannot drive a consistent engine.
//!   Fatal at construction.

use std::time::Duration;

use crate::contact::ContactId;

/// Contract violations by the input feed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProtocolError {
    /// A contact-begin arrived for an identity that is still live.
    #[error("contact {0} began while already live")]
    DuplicateContact(ContactId),
    /// A move or end arrived for an identity that is not live.
    #[error("contact {0} is not live")]
    UnknownContact(ContactId),
    /// A position with a NaN or infinite component.
    #[error("contact {id} reported a non-finite position ({x}, {y})")]
    NonFinitePosition { id: ContactId, x: f32, y: f32 },
}

/// Engine invariant violations. Reported, never propagated.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InternalError {
    #[error("multi-gesture window finalized with no candidates")]
    EmptyFinalize,
    #[error("multi-drag assembled with a single contact ({0})")]
    SingletonMultiDrag(ContactId),
    #[error("contact {0} is live but owned by no cluster")]
    UnownedContact(ContactId),
    #[error("cluster slot {0} is not live")]
    UnknownCluster(usize),
    #[error("cluster does not hold contact {0}")]
    NotAMember(ContactId),
    #[error("claim ledger has no entry for contact {0}")]
    UnledgeredContact(ContactId),
}

/// Configuration rejected at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("tap_time_max ({tap:?}) must be below long_press_time_min ({long_press:?})")]
    TapNotBelowLongPress { tap: Duration, long_press: Duration },
    #[error("release_grace ({grace:?}) must not be shorter than lift_window ({lift:?})")]
    GraceBelowLiftWindow { grace: Duration, lift: Duration },
    #[error("{field} must be finite and non-negative (got {value})")]
    NegativeOrNonFinite { field: &'static str, value: f32 },
    #[error("{field} must be strictly positive (got {value})")]
    NotPositive { field: &'static str, value: f32 },
    #[error("{field} must be a non-zero duration")]
    ZeroDuration { field: &'static str },
    #[cfg(feature = "config-file")]
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "config-file")]
    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),
    #[cfg(feature = "config-file")]
    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Log an internal invariant violation.
pub(crate) fn report_internal(err: &InternalError) {
    tracing::error!(error = %err, "gesture engine invariant violated");
}
