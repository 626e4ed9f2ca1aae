#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Body-composition scale core (transport-agnostic).
//!
//! This crate turns raw frames from a smart scale into confirmed readings. All
//! device interaction goes through `bodyscale_traits::ScaleLink`; persistence
//! goes through `store::ReadingStore`.
//!
//! ## Architecture
//!
//! - **Decoding**: `frame` (length and flag gate), `rules` (versioned rule
//!   tables), `extract` (first plausible candidate wins), `decode` (pipeline)
//! - **Estimation**: `composition` (pure, saturating body-composition estimate)
//! - **Workflow**: `session` (sans-IO state machine), `driver` (event loop,
//!   timers, persistence), `pump` (link thread)
//! - **Seams**: `store`, `link_error`, `conversions` from `bodyscale_config`
//!
//! Frames are applied strictly in arrival order: weight and impedance are
//! always paired from the same frame.

pub mod builder;
pub mod composition;
pub mod config;
pub mod conversions;
pub mod decode;
pub mod discovery;
pub mod driver;
pub mod error;
pub mod extract;
pub mod frame;
pub mod link_error;
pub mod mocks;
pub mod pump;
pub mod reading;
pub mod rules;
pub mod session;
pub mod status;
pub mod store;
pub mod util;

pub use builder::SessionBuilder;
pub use composition::{BiometricProfile, BodyType, CompositionProfile, Sex, estimate};
pub use config::{AcceptancePolicy, SessionTiming, Stability, UserProfile};
pub use decode::{Decoder, WeightSample};
pub use driver::{Command, DriverInput, SessionDriver, SessionHandle};
pub use error::{BuildError, ScaleError, SessionError, TransportKind};
pub use frame::{DecodeMiss, FrameValidator};
pub use reading::{Reading, SCALE_ORIGIN};
pub use rules::{ImpedanceRule, RuleTable, WeightRule};
pub use session::{Effect, SessionEvent, SessionMachine, TimerId};
pub use status::{CapturedSample, Phase, SessionUpdate};
pub use store::ReadingStore;
