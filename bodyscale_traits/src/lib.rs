pub mod clock;

pub use clock::{Clock, MonotonicClock};

use std::time::Duration;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Bluetooth SIG base UUID (`0000xxxx-0000-1000-8000-00805f9b34fb`) with the
/// 16-bit slot zeroed.
pub const BLUETOOTH_BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_0080_5f9b_34fb;

/// Expand a 16-bit assigned number into a full 128-bit service/characteristic id.
#[inline]
pub const fn uuid16(short: u16) -> u128 {
    BLUETOOTH_BASE_UUID | ((short as u128) << 96)
}

/// One advertised-name match rule of a discovery request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceFilter {
    NamePrefix(String),
    Name(String),
}

impl DeviceFilter {
    pub fn matches(&self, advertised: &str) -> bool {
        match self {
            DeviceFilter::NamePrefix(p) => advertised.starts_with(p.as_str()),
            DeviceFilter::Name(n) => advertised == n,
        }
    }
}

/// Everything a transport needs to find the scale and subscribe to its frames.
///
/// `services` and `characteristics` are resolution orders: the first entry that
/// resolves wins and the rest are not tried.
#[derive(Debug, Clone, Default)]
pub struct ConnectRequest {
    pub filters: Vec<DeviceFilter>,
    pub optional_services: Vec<u128>,
    pub services: Vec<u128>,
    pub characteristics: Vec<u128>,
}

impl ConnectRequest {
    pub fn accepts(&self, advertised: &str) -> bool {
        self.filters.iter().any(|f| f.matches(advertised))
    }
}

/// Something the link observed on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// One notification/advertisement payload, exactly as received.
    Frame(Vec<u8>),
    /// The device went away (or the link was closed locally).
    Disconnected,
}

/// Transport to a body-composition scale.
///
/// Implementations block; the core runs them on a dedicated pump thread.
pub trait ScaleLink {
    /// Discover and connect. Returns the device's advertised name.
    fn connect(&mut self, request: &ConnectRequest) -> Result<String, BoxError>;
    /// Wait up to `timeout` for the next event. `Ok(None)` means nothing arrived.
    fn next_event(&mut self, timeout: Duration) -> Result<Option<LinkEvent>, BoxError>;
    fn disconnect(&mut self) -> Result<(), BoxError>;
}

impl<L: ScaleLink + ?Sized> ScaleLink for Box<L> {
    fn connect(&mut self, request: &ConnectRequest) -> Result<String, BoxError> {
        (**self).connect(request)
    }
    fn next_event(&mut self, timeout: Duration) -> Result<Option<LinkEvent>, BoxError> {
        (**self).next_event(timeout)
    }
    fn disconnect(&mut self) -> Result<(), BoxError> {
        (**self).disconnect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid16_expands_into_base_uuid() {
        assert_eq!(uuid16(0x181d), 0x0000_181d_0000_1000_8000_0080_5f9b_34fb);
        assert_eq!(uuid16(0xfee1), 0x0000_fee1_0000_1000_8000_0080_5f9b_34fb);
    }

    #[test]
    fn filters_match_prefix_or_exact_name() {
        let req = ConnectRequest {
            filters: vec![
                DeviceFilter::NamePrefix("MIBFS".into()),
                DeviceFilter::Name("Mi Smart Scale2".into()),
            ],
            ..ConnectRequest::default()
        };
        assert!(req.accepts("MIBFS 1234"));
        assert!(req.accepts("Mi Smart Scale2"));
        assert!(!req.accepts("Mi Smart Scale2 Pro"));
        assert!(!req.accepts("Polar H10"));
    }
}
