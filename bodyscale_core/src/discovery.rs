//! Discovery filter and GATT resolution order for the supported scales.

use bodyscale_traits::{ConnectRequest, DeviceFilter, uuid16};

pub const NAME_PREFIXES: [&str; 5] = ["MIBFS", "MIBCS", "MI_SCALE", "MiScale", "Xiaomi"];
pub const NAMES: [&str; 2] = ["Mi Smart Scale2", "Mi Body Composition Scale 2"];

/// Weight scale, body composition, then the two vendor services.
pub const SERVICE_ORDER: [u16; 4] = [0x181d, 0x181b, 0xfee0, 0xfee1];
/// Weight measurement, body composition measurement, then the vendor characteristics.
pub const CHARACTERISTIC_ORDER: [u16; 4] = [0x2a9d, 0x2a9c, 0xfee2, 0x2a2f];

/// Connect request for the given name filters.
pub fn connect_request<P, N>(prefixes: P, names: N) -> ConnectRequest
where
    P: IntoIterator,
    P::Item: Into<String>,
    N: IntoIterator,
    N::Item: Into<String>,
{
    let services: Vec<u128> = SERVICE_ORDER.iter().map(|s| uuid16(*s)).collect();
    let mut filters: Vec<DeviceFilter> = prefixes
        .into_iter()
        .map(|p| DeviceFilter::NamePrefix(p.into()))
        .collect();
    filters.extend(names.into_iter().map(|n| DeviceFilter::Name(n.into())));
    ConnectRequest {
        filters,
        optional_services: services.clone(),
        services,
        characteristics: CHARACTERISTIC_ORDER.iter().map(|c| uuid16(*c)).collect(),
    }
}

/// The stock filter set.
pub fn default_connect_request() -> ConnectRequest {
    connect_request(NAME_PREFIXES, NAMES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_request_covers_known_scales() {
        let r = default_connect_request();
        assert_eq!(r.filters.len(), 7);
        assert!(r.accepts("MIBCS-4F2A"));
        assert!(r.accepts("Mi Body Composition Scale 2"));
        assert!(!r.accepts("Mi Band 6"));
        assert_eq!(r.optional_services.len(), 4);
        assert_eq!(r.services[0], uuid16(0x181d));
        assert_eq!(r.characteristics[3], uuid16(0x2a2f));
    }
}
