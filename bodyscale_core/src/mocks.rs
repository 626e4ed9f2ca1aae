//! Test and helper mocks for bodyscale_core

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bodyscale_traits::{BoxError, ConnectRequest, LinkEvent, ScaleLink};
use crossbeam_channel as xch;

use crate::reading::Reading;
use crate::store::ReadingStore;

/// A link that connects but never delivers anything.
pub struct NoopLink;

impl ScaleLink for NoopLink {
    fn connect(&mut self, _request: &ConnectRequest) -> Result<String, BoxError> {
        Ok("noop".to_string())
    }
    fn next_event(&mut self, timeout: Duration) -> Result<Option<LinkEvent>, BoxError> {
        std::thread::sleep(timeout);
        Ok(None)
    }
    fn disconnect(&mut self) -> Result<(), BoxError> {
        Ok(())
    }
}

/// A link fed from a channel, so a test decides exactly when frames arrive.
/// Dropping the feeding `Sender` reads as a device disconnect.
pub struct ChannelLink {
    device: String,
    rx: xch::Receiver<LinkEvent>,
    connect_error: Option<String>,
    disconnects: Arc<AtomicUsize>,
}

impl ChannelLink {
    pub fn new(device: &str) -> (Self, xch::Sender<LinkEvent>) {
        let (tx, rx) = xch::unbounded();
        (
            Self {
                device: device.to_string(),
                rx,
                connect_error: None,
                disconnects: Arc::new(AtomicUsize::new(0)),
            },
            tx,
        )
    }

    /// Make `connect` fail with `message`.
    pub fn failing_connect(mut self, message: &str) -> Self {
        self.connect_error = Some(message.to_string());
        self
    }

    /// Counter of `disconnect` calls, readable after the link moved into a pump.
    pub fn disconnect_counter(&self) -> Arc<AtomicUsize> {
        self.disconnects.clone()
    }
}

impl ScaleLink for ChannelLink {
    fn connect(&mut self, request: &ConnectRequest) -> Result<String, BoxError> {
        if let Some(msg) = &self.connect_error {
            return Err(Box::new(std::io::Error::other(msg.clone())));
        }
        if !request.filters.is_empty() && !request.accepts(&self.device) {
            return Err(Box::new(std::io::Error::other("no device found")));
        }
        Ok(self.device.clone())
    }
    fn next_event(&mut self, timeout: Duration) -> Result<Option<LinkEvent>, BoxError> {
        match self.rx.recv_timeout(timeout) {
            Ok(ev) => Ok(Some(ev)),
            Err(xch::RecvTimeoutError::Timeout) => Ok(None),
            Err(xch::RecvTimeoutError::Disconnected) => Ok(Some(LinkEvent::Disconnected)),
        }
    }
    fn disconnect(&mut self) -> Result<(), BoxError> {
        self.disconnects.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Vector-backed store. Clones share the same readings; saves can be made to fail.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    readings: Arc<Mutex<Vec<Reading>>>,
    fail_next: Arc<AtomicUsize>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `n` saves return an error.
    pub fn fail_next_saves(&self, n: usize) {
        self.fail_next.store(n, Ordering::Relaxed);
    }

    /// Snapshot of every stored reading, oldest first.
    pub fn readings(&self) -> Vec<Reading> {
        self.readings.lock().map(|g| g.clone()).unwrap_or_default()
    }
}

impl ReadingStore for InMemoryStore {
    fn save(&mut self, reading: &Reading) -> Result<(), BoxError> {
        let pending = self.fail_next.load(Ordering::Relaxed);
        if pending > 0 {
            self.fail_next.store(pending - 1, Ordering::Relaxed);
            return Err(Box::new(std::io::Error::other("store unavailable")));
        }
        self.readings
            .lock()
            .map_err(|_| "store lock poisoned")?
            .push(reading.clone());
        Ok(())
    }

    fn recent(&self, profile_id: &str, limit: usize) -> Result<Vec<Reading>, BoxError> {
        let guard = self.readings.lock().map_err(|_| "store lock poisoned")?;
        let mut out: Vec<Reading> = guard
            .iter()
            .rev()
            .filter(|r| r.profile_id == profile_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.measured_at.cmp(&a.measured_at));
        out.truncate(limit);
        Ok(out)
    }
}
