//! Type-state builder for `SessionDriver`.
//!
//! The builder enforces at compile time that a link and a store are provided
//! before `build()` is available. `try_build()` is always available for dynamic checks.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use bodyscale_traits::{Clock, MonotonicClock, ScaleLink};
use chrono::{DateTime, Utc};

use crate::config::{AcceptancePolicy, SessionTiming, UserProfile};
use crate::decode::Decoder;
use crate::driver::SessionDriver;
use crate::error::{BuildError, Result};
use crate::session::SessionMachine;
use crate::store::ReadingStore;

/// Default wait per `ScaleLink::next_event` call on the pump thread.
pub const DEFAULT_POLL: Duration = Duration::from_millis(200);

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `SessionDriver`. All fields are validated on `build()`.
pub struct SessionBuilder<L, S> {
    link: Option<Box<dyn ScaleLink + Send>>,
    store: Option<Box<dyn ReadingStore>>,
    decoder: Option<Decoder>,
    profile: Option<UserProfile>,
    timing: Option<SessionTiming>,
    acceptance: Option<AcceptancePolicy>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    started_at: Option<DateTime<Utc>>,
    poll: Option<Duration>,
    _l: PhantomData<L>,
    _s: PhantomData<S>,
}

impl Default for SessionBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            link: None,
            store: None,
            decoder: None,
            profile: None,
            timing: None,
            acceptance: None,
            clock: None,
            started_at: None,
            poll: None,
            _l: PhantomData,
            _s: PhantomData,
        }
    }
}

/// Single source of truth for validation, shared by `try_build()` and `build()`.
fn validate(timing: &SessionTiming, acceptance: &AcceptancePolicy, profile: &UserProfile, poll: Duration) -> Result<()> {
    if timing.step_countdown == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "step countdown must be >= 1",
        )));
    }
    if timing.calibration_countdown == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "calibration countdown must be >= 1",
        )));
    }
    if timing.tick.is_zero() {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "tick interval must be > 0",
        )));
    }
    if poll.is_zero() {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "poll interval must be > 0",
        )));
    }
    if !(acceptance.min_kg.is_finite()
        && acceptance.max_kg.is_finite()
        && acceptance.min_kg < acceptance.max_kg)
    {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "acceptance window must satisfy min_kg < max_kg",
        )));
    }
    if !(profile.biometrics.height_cm.is_finite() && profile.biometrics.height_cm > 0.0) {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "profile height must be > 0",
        )));
    }
    Ok(())
}

impl<L, S> SessionBuilder<L, S> {
    /// Fallible build available in any type-state; returns detailed error for missing pieces.
    pub fn try_build(self) -> Result<SessionDriver> {
        let link = self
            .link
            .ok_or_else(|| eyre::Report::new(BuildError::MissingLink))?;
        let store = self
            .store
            .ok_or_else(|| eyre::Report::new(BuildError::MissingStore))?;
        let timing = self.timing.unwrap_or_default();
        let acceptance = self.acceptance.unwrap_or_default();
        let profile = self.profile.unwrap_or_default();
        let poll = self.poll.unwrap_or(DEFAULT_POLL);
        validate(&timing, &acceptance, &profile, poll)?;

        let clock: Arc<dyn Clock + Send + Sync> = match self.clock {
            Some(b) => Arc::from(b),
            None => Arc::new(MonotonicClock::new()),
        };
        let machine = SessionMachine::new(
            self.decoder.unwrap_or_default(),
            profile,
            timing,
            acceptance,
        );
        let started_at = self.started_at.unwrap_or_else(Utc::now);
        Ok(SessionDriver::new(machine, store, link, clock, started_at, poll))
    }

    fn retype<L2, S2>(self) -> SessionBuilder<L2, S2> {
        SessionBuilder {
            link: self.link,
            store: self.store,
            decoder: self.decoder,
            profile: self.profile,
            timing: self.timing,
            acceptance: self.acceptance,
            clock: self.clock,
            started_at: self.started_at,
            poll: self.poll,
            _l: PhantomData,
            _s: PhantomData,
        }
    }
}

/// Chainable setters that do not affect type-state.
impl<L, S> SessionBuilder<L, S> {
    pub fn with_decoder(mut self, decoder: Decoder) -> Self {
        self.decoder = Some(decoder);
        self
    }
    pub fn with_profile(mut self, profile: UserProfile) -> Self {
        self.profile = Some(profile);
        self
    }
    pub fn with_timing(mut self, timing: SessionTiming) -> Self {
        self.timing = Some(timing);
        self
    }
    pub fn with_acceptance(mut self, acceptance: AcceptancePolicy) -> Self {
        self.acceptance = Some(acceptance);
        self
    }
    /// How long the pump thread blocks per link poll.
    pub fn with_poll_interval(mut self, poll: Duration) -> Self {
        self.poll = Some(poll);
        self
    }
    /// Provide a custom clock implementation; defaults to `MonotonicClock` when not provided.
    pub fn with_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
    /// Wall time at build; capture timestamps advance from it with the clock.
    /// Defaults to `Utc::now()`.
    pub fn with_start_time(mut self, at: DateTime<Utc>) -> Self {
        self.started_at = Some(at);
        self
    }
}

// Setters that advance type-state
impl<S> SessionBuilder<Missing, S> {
    pub fn with_link(mut self, link: impl ScaleLink + Send + 'static) -> SessionBuilder<Set, S> {
        self.link = Some(Box::new(link));
        self.retype()
    }
}

impl<L> SessionBuilder<L, Missing> {
    pub fn with_store(mut self, store: impl ReadingStore + 'static) -> SessionBuilder<L, Set> {
        self.store = Some(Box::new(store));
        self.retype()
    }
}

impl SessionBuilder<Set, Set> {
    /// Validate and build the driver. Only available when link and store are set.
    pub fn build(self) -> Result<SessionDriver> {
        self.try_build()
    }
}
