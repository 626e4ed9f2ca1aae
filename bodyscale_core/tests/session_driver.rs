//! Driver-level scenarios with a manually advanced clock and a channel-fed link.

use std::time::Duration;

use bodyscale_core::discovery::default_connect_request;
use bodyscale_core::mocks::{ChannelLink, InMemoryStore};
use bodyscale_core::store::history;
use bodyscale_core::{
    Phase, ReadingStore, ScaleError, SessionDriver, SessionError, SessionHandle, SessionUpdate,
    TransportKind,
};
use bodyscale_traits::LinkEvent;
use bodyscale_traits::clock::test_clock::TestClock;
use chrono::{DateTime, TimeZone, Utc};
use crossbeam_channel as xch;

const STEP: Duration = Duration::from_millis(50);

fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 7, 30, 0).unwrap()
}

fn frame(weight_kg: f32, impedance: u16) -> Vec<u8> {
    let raw = (weight_kg * 200.0).round() as u16;
    let [il, ih] = impedance.to_le_bytes();
    let [wl, wh] = raw.to_le_bytes();
    let ctrl1 = if impedance > 0 { 0x02 } else { 0x00 };
    vec![0x62, ctrl1, 0, 0, 0, 0, 0, 0, 0, il, ih, wl, wh]
}

struct Rig {
    driver: SessionDriver,
    handle: SessionHandle,
    updates: xch::Receiver<SessionUpdate>,
    feed: xch::Sender<LinkEvent>,
    clock: TestClock,
    store: InMemoryStore,
}

fn rig() -> Rig {
    let clock = TestClock::new();
    let store = InMemoryStore::new();
    let (link, feed) = ChannelLink::new("MIBFS 2");
    let mut driver = SessionDriver::builder()
        .with_link(link)
        .with_store(store.clone())
        .with_clock(Box::new(clock.clone()))
        .with_start_time(start_time())
        .with_poll_interval(Duration::from_millis(10))
        .build()
        .unwrap();
    let device = driver.start(&default_connect_request()).unwrap();
    assert_eq!(device, "MIBFS 2");
    Rig {
        handle: driver.handle(),
        updates: driver.updates(),
        driver,
        feed,
        clock,
        store,
    }
}

impl Rig {
    fn tick(&mut self, n: usize) {
        for _ in 0..n {
            self.clock.advance(Duration::from_secs(1));
            self.driver.step(Duration::ZERO);
        }
    }

    fn capture_and_calibrate(&mut self) {
        assert!(self.handle.capture());
        self.driver.step(STEP);
        assert_eq!(self.driver.machine().phase(), Phase::AwaitingStep);
        self.tick(5);
        assert_eq!(self.driver.machine().phase(), Phase::Calibrating);
    }

    fn send_frame(&mut self, bytes: Vec<u8>) {
        self.feed.send(LinkEvent::Frame(bytes)).unwrap();
        // Wait for the pump to hand the frame over.
        self.driver.step(Duration::from_secs(2));
    }

    fn drain(&self) -> Vec<SessionUpdate> {
        self.updates.try_iter().collect()
    }
}

#[test]
fn confirmed_reading_is_saved_then_link_closes() {
    let mut r = rig();
    r.capture_and_calibrate();
    r.send_frame(frame(75.0, 500));
    assert_eq!(r.driver.machine().phase(), Phase::Confirming);

    r.handle.confirm();
    r.driver.step(STEP);
    let saved = r.store.readings();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].weight_kg, 75.0);
    assert_eq!(saved[0].origin, "scale");
    assert_eq!(saved[0].impedance_ohm, Some(500));
    assert!(r.drain().iter().any(|u| matches!(u, SessionUpdate::Committed(_))));

    // Deferred disconnect fires two seconds later.
    assert!(!r.driver.is_finished());
    r.clock.advance(Duration::from_millis(1999));
    r.driver.step(Duration::ZERO);
    assert!(!r.driver.is_finished());
    r.clock.advance(Duration::from_millis(1));
    r.driver.step(Duration::ZERO);
    assert!(r.driver.is_finished());
    assert!(!r.driver.machine().is_connected());
}

#[test]
fn calibration_timeout_returns_to_idle_without_saving() {
    let mut r = rig();
    r.capture_and_calibrate();
    r.tick(9);
    assert_eq!(r.driver.machine().phase(), Phase::Calibrating);
    r.tick(1);
    assert_eq!(r.driver.machine().phase(), Phase::Idle);
    assert!(r.store.readings().is_empty());
    assert!(r.drain().contains(&SessionUpdate::TimedOut));

    // No further ticks after the timeout.
    r.tick(3);
    assert!(
        !r.drain()
            .iter()
            .any(|u| matches!(u, SessionUpdate::Countdown { .. }))
    );
}

#[test]
fn disconnect_mid_capture_cancels_everything() {
    let mut r = rig();
    r.capture_and_calibrate();
    r.drain();

    r.handle.disconnect();
    assert!(!r.driver.step(STEP));
    assert_eq!(r.driver.machine().phase(), Phase::Idle);
    let updates = r.drain();
    assert!(updates.contains(&SessionUpdate::Cancelled));
    assert!(updates.contains(&SessionUpdate::Disconnected));

    // Ticks armed before the disconnect were dropped with it.
    for _ in 0..12 {
        r.clock.advance(Duration::from_secs(1));
        r.driver.fire_due_timers();
    }
    assert!(r.drain().is_empty());
    assert_eq!(r.driver.machine().phase(), Phase::Idle);
    assert!(r.store.readings().is_empty());
}

#[test]
fn expired_calibration_wins_over_a_queued_frame() {
    let mut r = rig();
    r.capture_and_calibrate();
    r.tick(9);
    r.drain();

    r.feed.send(LinkEvent::Frame(frame(75.0, 500))).unwrap();
    // Let the pump queue the frame before the deadline is observed.
    std::thread::sleep(Duration::from_millis(200));
    r.clock.advance(Duration::from_secs(1));
    r.driver.step(Duration::ZERO);

    assert_eq!(r.driver.machine().phase(), Phase::Idle);
    assert!(r.driver.machine().captured().is_none());
    let updates = r.drain();
    assert!(updates.contains(&SessionUpdate::TimedOut));
    assert!(
        !updates
            .iter()
            .any(|u| matches!(u, SessionUpdate::SampleCaptured(_)))
    );
}

#[test]
fn capture_time_follows_the_injected_clock() {
    let mut r = rig();
    r.capture_and_calibrate();
    r.clock.advance(Duration::from_millis(250));
    r.send_frame(frame(75.0, 500));
    let captured = r.driver.machine().captured().cloned().unwrap();
    let expected = start_time() + chrono::TimeDelta::milliseconds(5_250);
    assert_eq!(captured.measured_at, expected);

    r.handle.confirm();
    r.driver.step(STEP);
    assert_eq!(r.store.readings()[0].measured_at, expected);
}

#[test]
fn device_vanishing_while_confirming_discards_the_sample() {
    let mut r = rig();
    r.capture_and_calibrate();
    r.send_frame(frame(80.0, 450));
    assert!(r.driver.machine().captured().is_some());

    let Rig { mut driver, feed, store, .. } = r;
    drop(feed);
    driver.step(Duration::from_secs(2));
    assert!(driver.is_finished());
    assert!(driver.machine().captured().is_none());
    assert_eq!(driver.machine().phase(), Phase::Idle);
    assert!(store.readings().is_empty());
}

#[test]
fn failed_save_can_be_retried() {
    let mut r = rig();
    r.store.fail_next_saves(1);
    r.capture_and_calibrate();
    r.send_frame(frame(68.4, 520));

    r.handle.confirm();
    r.driver.step(STEP);
    assert!(r.store.readings().is_empty());
    assert_eq!(r.driver.machine().phase(), Phase::Confirming);
    assert!(
        r.drain()
            .iter()
            .any(|u| matches!(u, SessionUpdate::PersistFailed { .. }))
    );

    r.handle.confirm();
    r.driver.step(STEP);
    assert_eq!(r.store.readings().len(), 1);
    assert_eq!(r.driver.machine().phase(), Phase::Idle);
}

#[test]
fn refused_commands_are_published() {
    let mut r = rig();
    r.handle.confirm();
    r.driver.step(STEP);
    assert!(
        r.drain()
            .contains(&SessionUpdate::CommandRejected(SessionError::NothingToConfirm))
    );

    r.handle.capture();
    r.handle.capture();
    r.driver.step(STEP);
    r.driver.step(STEP);
    assert!(
        r.drain()
            .contains(&SessionUpdate::CommandRejected(SessionError::CaptureInFlight))
    );
}

#[test]
fn noise_frames_are_dropped_silently() {
    let mut r = rig();
    r.capture_and_calibrate();
    r.drain();
    r.send_frame(vec![0x22, 0x02]);
    r.send_frame(frame(75.0, 500).into_iter().map(|b| b & 0x0f).collect());
    assert_eq!(r.driver.machine().phase(), Phase::Calibrating);
    assert!(r.drain().is_empty());
}

#[test]
fn history_returns_newest_first_and_round_trips_fields() {
    let mut r = rig();
    for (w, z) in [(70.0, 480), (71.0, 490), (72.0, 500)] {
        r.capture_and_calibrate();
        r.send_frame(frame(w, z));
        let captured = r.driver.machine().captured().cloned().unwrap();
        r.handle.confirm();
        r.driver.step(STEP);
        let last = r.store.readings().pop().unwrap();
        let comp = captured.composition.unwrap();
        assert_eq!(last.body_fat_pct, Some(comp.body_fat_pct));
        assert_eq!(last.bone_kg, Some(comp.bone_kg));
        assert_eq!(last.body_type, Some(comp.body_type));
        // Deferred disconnect is pending; reconnecting is out of scope here,
        // so clear it by restarting the rig's session for the next reading.
        if w < 72.0 {
            let store = r.store.clone();
            r = rig_with_store(store);
        }
    }
    let recent = history(&r.store, "default", 5).unwrap();
    let weights: Vec<f32> = recent.iter().map(|x| x.weight_kg).collect();
    assert_eq!(weights, vec![72.0, 71.0, 70.0]);
    assert_eq!(r.store.recent("someone-else", 5).unwrap().len(), 0);
}

fn rig_with_store(store: InMemoryStore) -> Rig {
    let clock = TestClock::new();
    let (link, feed) = ChannelLink::new("MIBFS 2");
    let mut driver = SessionDriver::builder()
        .with_link(link)
        .with_store(store.clone())
        .with_clock(Box::new(clock.clone()))
        .with_poll_interval(Duration::from_millis(10))
        .build()
        .unwrap();
    driver.start(&default_connect_request()).unwrap();
    Rig {
        handle: driver.handle(),
        updates: driver.updates(),
        driver,
        feed,
        clock,
        store,
    }
}

#[test]
fn connection_failures_are_categorised() {
    let (link, _feed) = ChannelLink::new("MIBFS 2");
    let mut driver = SessionDriver::builder()
        .with_link(link.failing_connect("Bluetooth permission denied"))
        .with_store(InMemoryStore::new())
        .build()
        .unwrap();
    let err = driver.start(&default_connect_request()).unwrap_err();
    match err.downcast_ref::<ScaleError>() {
        Some(ScaleError::Transport { kind, .. }) => {
            assert_eq!(*kind, TransportKind::PermissionDenied)
        }
        other => panic!("expected transport error, got {other:?}"),
    }

    let (link, _feed) = ChannelLink::new("Polar H10");
    let mut driver = SessionDriver::builder()
        .with_link(link)
        .with_store(InMemoryStore::new())
        .build()
        .unwrap();
    let err = driver.start(&default_connect_request()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ScaleError>(),
        Some(ScaleError::Transport {
            kind: TransportKind::DeviceNotFound,
            ..
        })
    ));
}
