//! Link backend selection.

use std::time::Duration;

use bodyscale_config::{LinkBackend, LinkCfg, SimCfg};
use bodyscale_hardware::{SimScale, SimulatedLink, sim::DEFAULT_DEVICE_NAME};
use bodyscale_traits::ScaleLink;

pub fn sim_scale(c: &SimCfg) -> SimScale {
    SimScale {
        name: DEFAULT_DEVICE_NAME.to_string(),
        weight_kg: c.weight_kg,
        impedance_ohm: c.impedance_ohm,
        frame_interval: Duration::from_millis(c.frame_interval_ms),
        settle_frames: c.settle_frames,
        vanish_after: None,
    }
}

pub fn make_link(c: &LinkCfg) -> eyre::Result<Box<dyn ScaleLink + Send>> {
    match c.backend {
        LinkBackend::Sim => Ok(Box::new(SimulatedLink::new(sim_scale(&c.sim)))),
        LinkBackend::Ble => ble_link(),
    }
}

#[cfg(feature = "ble")]
fn ble_link() -> eyre::Result<Box<dyn ScaleLink + Send>> {
    let link = bodyscale_hardware::BleLink::new()
        .map_err(|e| eyre::Report::new(bodyscale_core::link_error::map_link_error(&e)))?;
    Ok(Box::new(link))
}

#[cfg(not(feature = "ble"))]
fn ble_link() -> eyre::Result<Box<dyn ScaleLink + Send>> {
    use bodyscale_core::error::{ScaleError, TransportKind};
    Err(eyre::Report::new(ScaleError::transport(
        TransportKind::Unsupported,
        "this build has no bluetooth support (rebuild with --features ble)",
    )))
}

/// Human label for self-check output.
pub fn backend_label(c: &LinkCfg) -> &'static str {
    match c.backend {
        LinkBackend::Sim => "sim",
        LinkBackend::Ble if cfg!(feature = "ble") => "ble",
        LinkBackend::Ble => "ble (not compiled in)",
    }
}
