//! The measurement session state machine (sans-IO).
//!
//! `Idle -> AwaitingStep -> Calibrating -> Confirming -> Idle`. Every input is
//! a `SessionEvent`; every side effect is returned as an `Effect` for the
//! driver to carry out. Timers are identified by generation so a tick armed
//! before a cancellation is recognised as stale and ignored.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::composition::estimate;
use crate::config::{AcceptancePolicy, SessionTiming, UserProfile};
use crate::decode::Decoder;
use crate::error::SessionError;
use crate::reading::Reading;
use crate::status::{CapturedSample, Phase, SessionUpdate};

/// Identifies one armed countdown tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId {
    pub generation: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Connected { device: String },
    Disconnected,
    CaptureRequested,
    Frame { bytes: Vec<u8>, at: DateTime<Utc> },
    Tick(TimerId),
    Confirm,
    Reject,
    PersistResult(Result<(), String>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Deliver `SessionEvent::Tick(id)` after one tick interval.
    ArmTick(TimerId),
    /// Drop every armed tick.
    CancelTimers,
    Persist(Reading),
    /// Close the link after the delay.
    DisconnectAfter(Duration),
    Notify(SessionUpdate),
}

#[derive(Debug)]
pub struct SessionMachine {
    decoder: Decoder,
    profile: UserProfile,
    timing: SessionTiming,
    acceptance: AcceptancePolicy,
    connected: bool,
    disconnect_pending: bool,
    phase: Phase,
    remaining: u8,
    generation: u64,
    captured: Option<CapturedSample>,
    persisting: Option<Reading>,
}

impl SessionMachine {
    pub fn new(
        decoder: Decoder,
        profile: UserProfile,
        timing: SessionTiming,
        acceptance: AcceptancePolicy,
    ) -> Self {
        Self {
            decoder,
            profile,
            timing,
            acceptance,
            connected: false,
            disconnect_pending: false,
            phase: Phase::Idle,
            remaining: 0,
            generation: 0,
            captured: None,
            persisting: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn remaining(&self) -> u8 {
        self.remaining
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn captured(&self) -> Option<&CapturedSample> {
        self.captured.as_ref()
    }

    pub fn timing(&self) -> &SessionTiming {
        &self.timing
    }

    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }

    /// Apply one event. `Err` means the command was refused and nothing changed.
    pub fn handle(&mut self, event: SessionEvent) -> Result<Vec<Effect>, SessionError> {
        match event {
            SessionEvent::Connected { device } => Ok(self.on_connected(device)),
            SessionEvent::Disconnected => Ok(self.on_disconnected()),
            SessionEvent::CaptureRequested => self.on_capture(),
            SessionEvent::Frame { bytes, at } => Ok(self.on_frame(&bytes, at)),
            SessionEvent::Tick(id) => Ok(self.on_tick(id)),
            SessionEvent::Confirm => self.on_confirm(),
            SessionEvent::Reject => self.on_reject(),
            SessionEvent::PersistResult(res) => Ok(self.on_persist_result(res)),
        }
    }

    fn current_timer(&self) -> TimerId {
        TimerId {
            generation: self.generation,
        }
    }

    /// Invalidate every armed tick.
    fn bump_generation(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    fn enter(&mut self, phase: Phase, remaining: u8) {
        tracing::debug!(from = self.phase.as_str(), to = phase.as_str(), remaining, "phase change");
        self.phase = phase;
        self.remaining = remaining;
    }

    fn on_connected(&mut self, device: String) -> Vec<Effect> {
        self.connected = true;
        self.disconnect_pending = false;
        tracing::info!(%device, "scale connected");
        vec![Effect::Notify(SessionUpdate::Connected { device })]
    }

    fn on_disconnected(&mut self) -> Vec<Effect> {
        if !self.connected && self.phase == Phase::Idle {
            return Vec::new();
        }
        let was = self.phase;
        self.connected = false;
        self.disconnect_pending = false;
        self.captured = None;
        self.persisting = None;
        self.bump_generation();
        self.enter(Phase::Idle, 0);
        tracing::info!(phase = was.as_str(), "scale disconnected");

        let mut effects = Vec::with_capacity(3);
        if was != Phase::Idle {
            effects.push(Effect::CancelTimers);
            effects.push(Effect::Notify(SessionUpdate::Cancelled));
        }
        effects.push(Effect::Notify(SessionUpdate::Disconnected));
        effects
    }

    fn on_capture(&mut self) -> Result<Vec<Effect>, SessionError> {
        if !self.connected {
            return Err(SessionError::NotConnected);
        }
        if self.disconnect_pending {
            return Err(SessionError::Disconnecting);
        }
        if self.phase != Phase::Idle {
            return Err(SessionError::CaptureInFlight);
        }
        self.bump_generation();
        self.enter(Phase::AwaitingStep, self.timing.step_countdown);
        Ok(vec![
            Effect::Notify(SessionUpdate::Countdown {
                phase: Phase::AwaitingStep,
                remaining: self.remaining,
            }),
            Effect::ArmTick(self.current_timer()),
        ])
    }

    fn on_tick(&mut self, id: TimerId) -> Vec<Effect> {
        if id != self.current_timer() {
            tracing::trace!(stale = id.generation, current = self.generation, "stale tick ignored");
            return Vec::new();
        }
        match self.phase {
            Phase::AwaitingStep => {
                self.remaining = self.remaining.saturating_sub(1);
                if self.remaining == 0 {
                    self.enter(Phase::Calibrating, self.timing.calibration_countdown);
                }
                vec![
                    Effect::Notify(SessionUpdate::Countdown {
                        phase: self.phase,
                        remaining: self.remaining,
                    }),
                    Effect::ArmTick(self.current_timer()),
                ]
            }
            Phase::Calibrating => {
                self.remaining = self.remaining.saturating_sub(1);
                if self.remaining == 0 {
                    self.bump_generation();
                    self.enter(Phase::Idle, 0);
                    tracing::info!("calibration window elapsed without a qualifying sample");
                    return vec![Effect::CancelTimers, Effect::Notify(SessionUpdate::TimedOut)];
                }
                vec![
                    Effect::Notify(SessionUpdate::Countdown {
                        phase: Phase::Calibrating,
                        remaining: self.remaining,
                    }),
                    Effect::ArmTick(self.current_timer()),
                ]
            }
            Phase::Idle | Phase::Confirming => Vec::new(),
        }
    }

    fn on_frame(&mut self, bytes: &[u8], at: DateTime<Utc>) -> Vec<Effect> {
        if !self.connected || self.phase == Phase::Confirming {
            return Vec::new();
        }
        let sample = match self.decoder.decode(bytes) {
            Ok(s) => s,
            Err(miss) => {
                tracing::trace!(%miss, len = bytes.len(), "frame dropped");
                return Vec::new();
            }
        };

        if self.phase != Phase::Calibrating || !self.acceptance.accepts(&sample) {
            return vec![Effect::Notify(SessionUpdate::LiveWeight {
                weight_kg: sample.weight_kg,
            })];
        }

        let composition = sample
            .impedance_ohm
            .filter(|z| *z > 0)
            .map(|z| estimate(sample.weight_kg, z, &self.profile.biometrics));
        let captured = CapturedSample {
            sample,
            composition,
            measured_at: at,
        };
        tracing::info!(
            weight_kg = sample.weight_kg,
            impedance_ohm = ?sample.impedance_ohm,
            stabilized = sample.stabilized,
            "sample captured"
        );
        self.captured = Some(captured.clone());
        self.bump_generation();
        self.enter(Phase::Confirming, 0);
        vec![
            Effect::CancelTimers,
            Effect::Notify(SessionUpdate::SampleCaptured(captured)),
        ]
    }

    fn on_confirm(&mut self) -> Result<Vec<Effect>, SessionError> {
        if self.persisting.is_some() {
            return Err(SessionError::ConfirmPending);
        }
        let captured = match (&self.captured, self.phase) {
            (Some(c), Phase::Confirming) => c,
            _ => return Err(SessionError::NothingToConfirm),
        };
        let reading = Reading::from_capture(
            &self.profile.id,
            self.profile.biometrics.height_cm,
            &captured.sample,
            captured.composition.as_ref(),
            captured.measured_at,
        );
        self.persisting = Some(reading.clone());
        Ok(vec![Effect::Persist(reading)])
    }

    fn on_reject(&mut self) -> Result<Vec<Effect>, SessionError> {
        if self.persisting.is_some() {
            return Err(SessionError::ConfirmPending);
        }
        if self.phase != Phase::Confirming {
            return Err(SessionError::NothingToConfirm);
        }
        self.captured = None;
        self.enter(Phase::Idle, 0);
        tracing::info!("sample rejected");
        Ok(vec![Effect::Notify(SessionUpdate::Rejected)])
    }

    fn on_persist_result(&mut self, res: Result<(), String>) -> Vec<Effect> {
        let Some(reading) = self.persisting.take() else {
            return Vec::new();
        };
        match res {
            Ok(()) => {
                self.captured = None;
                self.disconnect_pending = true;
                self.enter(Phase::Idle, 0);
                tracing::info!(weight_kg = reading.weight_kg, "reading committed");
                vec![
                    Effect::Notify(SessionUpdate::Committed(reading)),
                    Effect::DisconnectAfter(self.timing.disconnect_delay),
                ]
            }
            Err(message) => {
                // Sample stays so the user can retry the confirmation.
                tracing::warn!(%message, "saving reading failed");
                vec![Effect::Notify(SessionUpdate::PersistFailed { message })]
            }
        }
    }
}
