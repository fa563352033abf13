#![forbid(unsafe_code)]

//! Core: multi-touch gesture classification and contact ownership.
//!
//! # Role in fingerwork
//! `fingerwork-core` turns a feed of "contact added / moved / removed"
//! events into semantic gestures (tap, swipe, long press, drag, multi-finger
//! variants, pinch, twist) and delivers each gesture to the consumers that
//! own its contacts, splitting multi-finger gestures when ownership is
//! divided.
//!
//! # Primary responsibilities
//! - **Contact**: per-touch kinematics with a short smoothing history.
//! - **Cluster**: the tap/swipe/drag/long-press state machine for a group of
//!   nearby contacts, with lift-window aggregation into multi gestures.
//! - **Orchestrator**: cluster routing, window timers, and the per-frame
//!   two-contact relationship pass (identical / pinch / twist).
//! - **Arbitrator**: the claim ledger and full/partial receiver delivery.
//! - **GestureEngine**: the facade hosts drive.
//!
//! # Usage
//! ```
//! use fingerwork_core::{ContactId, GestureConfig, GestureEngine, GestureKind, Vec2};
//! use web_time::{Duration, Instant};
//!
//! let mut engine = GestureEngine::new(GestureConfig::default()).unwrap();
//! let t0 = Instant::now();
//! engine.contact_added(ContactId(0), t0, Vec2::new(10.0, 10.0)).unwrap();
//! let out = engine
//!     .contact_removed(ContactId(0), t0 + Duration::from_millis(60), Vec2::new(10.0, 10.0))
//!     .unwrap();
//! assert_eq!(out[0].kind(), GestureKind::SingleTap);
//! ```
//!
//! Everything is single-threaded and clock-driven: timers fire only when the
//! host calls into the engine, so a host should call
//! [`GestureEngine::frame`] once per frame (or at
//! [`GestureEngine::next_deadline`]).

pub mod arbitrator;
pub mod classifier;
pub mod config;
pub mod contact;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod gesture;
pub mod orchestrator;
pub mod relationship;
pub mod scheduler;

pub use arbitrator::{Claim, ConsumerId, GestureConsumer};
pub use config::{GestureConfig, MinorityGroupPolicy};
pub use contact::{Contact, ContactId, ContactSnapshot};
pub use engine::{Diagnostics, GestureEngine};
pub use error::{ConfigError, InternalError, ProtocolError};
pub use geometry::{LengthUnit, Vec2};
pub use gesture::{DragRelationship, Gesture, GestureKind, MultiContact, TwoContactDrag};
