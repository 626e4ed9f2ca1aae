//! Frame pump thread lifecycle: no leaked threads, in-order forwarding, and
//! the link is closed when the pump goes away.

use bodyscale_core::DriverInput;
use bodyscale_core::mocks::{ChannelLink, NoopLink};
use bodyscale_core::pump::FramePump;
use bodyscale_traits::LinkEvent;
use crossbeam_channel as xch;
use std::sync::atomic::Ordering;
use std::time::Duration;

#[test]
fn pump_thread_exits_on_drop() {
    let (tx, _rx) = xch::unbounded();
    let pump = FramePump::spawn(NoopLink, tx, Duration::from_millis(20));

    // Give thread time to start
    std::thread::sleep(Duration::from_millis(30));

    // Drop must join without hanging
    drop(pump);
}

#[test]
fn multiple_pumps_dont_leak_threads() {
    for _ in 0..10 {
        let (tx, _rx) = xch::unbounded();
        let pump = FramePump::spawn(NoopLink, tx, Duration::from_millis(5));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(pump.forwarded(), 0);
        drop(pump);
    }
}

#[test]
fn frames_are_forwarded_in_arrival_order() {
    let (tx, rx) = xch::unbounded();
    let (link, feed) = ChannelLink::new("MIBFS");
    let pump = FramePump::spawn(link, tx, Duration::from_millis(10));

    for i in 0..20u8 {
        feed.send(LinkEvent::Frame(vec![i])).unwrap();
    }
    let mut seen = Vec::new();
    while seen.len() < 20 {
        match rx.recv_timeout(Duration::from_secs(2)).expect("frame") {
            DriverInput::Frame(bytes) => seen.push(bytes[0]),
            other => panic!("unexpected {other:?}"),
        }
    }
    assert_eq!(seen, (0..20).collect::<Vec<u8>>());
    assert_eq!(pump.forwarded(), 20);
}

#[test]
fn device_disconnect_is_reported() {
    let (tx, rx) = xch::unbounded();
    let (link, feed) = ChannelLink::new("MIBFS");
    let _pump = FramePump::spawn(link, tx, Duration::from_millis(10));
    drop(feed);
    assert!(matches!(
        rx.recv_timeout(Duration::from_secs(2)),
        Ok(DriverInput::LinkClosed)
    ));
}

#[test]
fn close_disconnects_the_link() {
    let (tx, _rx) = xch::unbounded();
    let (link, _feed) = ChannelLink::new("MIBFS");
    let counter = link.disconnect_counter();
    let pump = FramePump::spawn(link, tx, Duration::from_millis(10));
    pump.close();
    assert_eq!(counter.load(Ordering::Relaxed), 1);
}
