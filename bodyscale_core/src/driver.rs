//! Single-threaded session driver.
//!
//! Link frames, user commands and timer expiries are serialised onto one
//! crossbeam channel and applied to the `SessionMachine` in order. Effects the
//! machine returns are carried out here: ticks are scheduled against the
//! injected `Clock`, readings are persisted through the `ReadingStore` (the
//! outcome is fed back as an event), and updates are published on a second
//! channel for the UI.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bodyscale_traits::{Clock, ConnectRequest, ScaleLink};
use chrono::{DateTime, TimeDelta, Utc};
use crossbeam_channel as xch;

use crate::builder::SessionBuilder;
use crate::builder::Missing;
use crate::error::{BuildError, Report, Result, ScaleError, SessionError};
use crate::link_error::{map_link_error, map_store_error};
use crate::pump::FramePump;
use crate::session::{Effect, SessionEvent, SessionMachine, TimerId};
use crate::status::SessionUpdate;
use crate::store::ReadingStore;

/// Longest the driver blocks on its input channel when no timer is armed.
pub const IDLE_WAIT: Duration = Duration::from_millis(500);

/// User intent, sent through a `SessionHandle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Capture,
    Confirm,
    Reject,
    /// Close the link now; any capture in flight is cancelled.
    Disconnect,
    Shutdown,
}

#[derive(Debug)]
pub enum DriverInput {
    Frame(Vec<u8>),
    LinkClosed,
    LinkFailed(ScaleError),
    Command(Command),
}

/// Cloneable sender for user commands.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: xch::Sender<DriverInput>,
}

impl SessionHandle {
    /// Queue a command. Returns false when the driver is gone.
    pub fn send(&self, cmd: Command) -> bool {
        self.tx.send(DriverInput::Command(cmd)).is_ok()
    }
    pub fn capture(&self) -> bool {
        self.send(Command::Capture)
    }
    pub fn confirm(&self) -> bool {
        self.send(Command::Confirm)
    }
    pub fn reject(&self) -> bool {
        self.send(Command::Reject)
    }
    pub fn disconnect(&self) -> bool {
        self.send(Command::Disconnect)
    }
    pub fn shutdown(&self) -> bool {
        self.send(Command::Shutdown)
    }
}

pub struct SessionDriver {
    machine: SessionMachine,
    store: Box<dyn ReadingStore>,
    clock: Arc<dyn Clock + Send + Sync>,
    /// `clock` instant and wall time taken together; frames are stamped relative to them.
    epoch: (Instant, DateTime<Utc>),
    link: Option<Box<dyn ScaleLink + Send>>,
    pump: Option<FramePump>,
    poll: Duration,
    tx: xch::Sender<DriverInput>,
    rx: xch::Receiver<DriverInput>,
    updates_tx: xch::Sender<SessionUpdate>,
    updates_rx: xch::Receiver<SessionUpdate>,
    ticks: Vec<(Instant, TimerId)>,
    disconnect_at: Option<Instant>,
    failure: Option<ScaleError>,
    finished: bool,
}

impl core::fmt::Debug for SessionDriver {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionDriver")
            .field("phase", &self.machine.phase())
            .field("connected", &self.machine.is_connected())
            .field("armed_ticks", &self.ticks.len())
            .field("finished", &self.finished)
            .finish()
    }
}

impl SessionDriver {
    /// Start building a driver.
    pub fn builder() -> SessionBuilder<Missing, Missing> {
        SessionBuilder::default()
    }

    pub(crate) fn new(
        machine: SessionMachine,
        store: Box<dyn ReadingStore>,
        link: Box<dyn ScaleLink + Send>,
        clock: Arc<dyn Clock + Send + Sync>,
        started_at: DateTime<Utc>,
        poll: Duration,
    ) -> Self {
        let (tx, rx) = xch::unbounded();
        let (updates_tx, updates_rx) = xch::unbounded();
        Self {
            machine,
            store,
            epoch: (clock.now(), started_at),
            clock,
            link: Some(link),
            pump: None,
            poll,
            tx,
            rx,
            updates_tx,
            updates_rx,
            ticks: Vec::new(),
            disconnect_at: None,
            failure: None,
            finished: false,
        }
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            tx: self.tx.clone(),
        }
    }

    /// Receiver for published updates. Clones share one queue.
    pub fn updates(&self) -> xch::Receiver<SessionUpdate> {
        self.updates_rx.clone()
    }

    pub fn machine(&self) -> &SessionMachine {
        &self.machine
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Connect the link and start pumping frames. Returns the device name.
    ///
    /// Connection is not bounded by an internal timeout; failures surface as
    /// typed transport errors.
    pub fn start(&mut self, request: &ConnectRequest) -> Result<String> {
        let mut link = self
            .link
            .take()
            .ok_or_else(|| Report::new(BuildError::MissingLink))?;
        tracing::info!(filters = request.filters.len(), "connecting to scale");
        let device = match link.connect(request) {
            Ok(d) => d,
            Err(e) => {
                let err = map_link_error(e.as_ref());
                tracing::error!(error = %err, "connection failed");
                self.finished = true;
                return Err(Report::new(err));
            }
        };
        self.pump = Some(FramePump::spawn(link, self.tx.clone(), self.poll));
        self.apply_internal(SessionEvent::Connected {
            device: device.clone(),
        });
        Ok(device)
    }

    /// Connect, then process inputs until the session ends.
    pub fn run(&mut self, request: &ConnectRequest) -> Result<()> {
        self.start(request)?;
        while self.step(IDLE_WAIT) {}
        match self.failure.take() {
            Some(e) => Err(Report::new(e)),
            None => Ok(()),
        }
    }

    /// Wait for one input (at most `max_wait`, less if a timer falls due
    /// sooner) and apply it. Timers that are already due fire before the
    /// input, so a frame queued behind an expired deadline is never captured.
    /// Returns false once finished.
    pub fn step(&mut self, max_wait: Duration) -> bool {
        if self.finished {
            return false;
        }
        let wait = self
            .next_deadline()
            .map_or(max_wait, |d| self.clock.until(d).min(max_wait));
        let received = self.rx.recv_timeout(wait);
        self.fire_due_timers();
        if !self.finished {
            match received {
                Ok(input) => self.dispatch(input),
                Err(xch::RecvTimeoutError::Timeout) => {}
                Err(xch::RecvTimeoutError::Disconnected) => self.finished = true,
            }
            self.fire_due_timers();
        }
        !self.finished
    }

    /// Wall time of the injected clock's current instant.
    pub fn wall_now(&self) -> DateTime<Utc> {
        let (at, wall) = self.epoch;
        let elapsed = TimeDelta::from_std(self.clock.now().saturating_duration_since(at))
            .unwrap_or_else(|_| TimeDelta::zero());
        wall + elapsed
    }

    /// Apply one input immediately.
    pub fn dispatch(&mut self, input: DriverInput) {
        match input {
            DriverInput::Frame(bytes) => {
                let at = self.wall_now();
                self.apply_internal(SessionEvent::Frame { bytes, at });
            }
            DriverInput::LinkClosed => {
                self.pump = None;
                self.apply_internal(SessionEvent::Disconnected);
                self.finished = true;
            }
            DriverInput::LinkFailed(err) => {
                self.pump = None;
                self.apply_internal(SessionEvent::Disconnected);
                self.failure = Some(err);
                self.finished = true;
            }
            DriverInput::Command(cmd) => self.on_command(cmd),
        }
    }

    fn on_command(&mut self, cmd: Command) {
        tracing::debug!(?cmd, phase = self.machine.phase().as_str(), "command");
        let event = match cmd {
            Command::Capture => SessionEvent::CaptureRequested,
            Command::Confirm => SessionEvent::Confirm,
            Command::Reject => SessionEvent::Reject,
            Command::Disconnect => {
                self.disconnect_now();
                return;
            }
            Command::Shutdown => {
                self.disconnect_now();
                self.finished = true;
                return;
            }
        };
        if let Err(e) = self.apply(event) {
            tracing::warn!(error = %e, "command refused");
            self.publish(SessionUpdate::CommandRejected(e));
        }
    }

    /// Cancel timers, close the link and force the machine back to idle.
    fn disconnect_now(&mut self) {
        self.disconnect_at = None;
        if let Some(pump) = self.pump.take() {
            pump.close();
        }
        self.apply_internal(SessionEvent::Disconnected);
        self.finished = true;
    }

    /// Fire every tick and the deferred disconnect whose deadline has passed.
    pub fn fire_due_timers(&mut self) {
        let now = self.clock.now();
        self.ticks.sort_by_key(|(at, _)| *at);
        while let Some(pos) = self.ticks.iter().position(|(at, _)| *at <= now) {
            let (_, id) = self.ticks.remove(pos);
            self.apply_internal(SessionEvent::Tick(id));
        }
        if self.disconnect_at.is_some_and(|at| at <= now) {
            tracing::info!("deferred disconnect due");
            self.disconnect_now();
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        let tick = self.ticks.iter().map(|(at, _)| *at).min();
        match (tick, self.disconnect_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Internal events are never refused; a refusal here is a bug worth logging.
    fn apply_internal(&mut self, event: SessionEvent) {
        if let Err(e) = self.apply(event) {
            tracing::error!(error = %e, "internal event refused");
        }
    }

    fn apply(&mut self, event: SessionEvent) -> std::result::Result<(), SessionError> {
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            for effect in self.machine.handle(event)? {
                match effect {
                    Effect::ArmTick(id) => {
                        let at = self.clock.now() + self.machine.timing().tick;
                        self.ticks.push((at, id));
                    }
                    Effect::CancelTimers => self.ticks.clear(),
                    Effect::Persist(reading) => {
                        let res = self
                            .store
                            .save(&reading)
                            .map_err(|e| map_store_error(e.as_ref()).to_string());
                        queue.push_back(SessionEvent::PersistResult(res));
                    }
                    Effect::DisconnectAfter(delay) => {
                        self.disconnect_at = Some(self.clock.now() + delay);
                    }
                    Effect::Notify(update) => self.publish(update),
                }
            }
        }
        Ok(())
    }

    fn publish(&self, update: SessionUpdate) {
        if self.updates_tx.send(update).is_err() {
            tracing::trace!("no update listener");
        }
    }
}
