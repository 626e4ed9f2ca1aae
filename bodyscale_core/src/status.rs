//! Observable session updates, published by the driver for the UI.

use crate::decode::WeightSample;
use crate::composition::CompositionProfile;
use crate::error::SessionError;
use crate::reading::Reading;
use chrono::{DateTime, Utc};

/// Phase of the capture workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    AwaitingStep,
    Calibrating,
    Confirming,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::AwaitingStep => "awaiting_step",
            Phase::Calibrating => "calibrating",
            Phase::Confirming => "confirming",
        }
    }
}

/// The sample held while the user decides whether to keep it.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedSample {
    pub sample: WeightSample,
    pub composition: Option<CompositionProfile>,
    pub measured_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    Connected { device: String },
    Disconnected,
    /// Weight seen outside calibration; display only.
    LiveWeight { weight_kg: f32 },
    Countdown { phase: Phase, remaining: u8 },
    SampleCaptured(CapturedSample),
    Committed(Reading),
    Rejected,
    /// Calibration window ran out without a qualifying sample.
    TimedOut,
    /// A capture in flight was cut short by a disconnect.
    Cancelled,
    PersistFailed { message: String },
    CommandRejected(SessionError),
}
