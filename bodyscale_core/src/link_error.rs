//! Maps `Box<dyn Error>` from trait boundaries to typed `ScaleError`.
//!
//! `ScaleLink` and `ReadingStore` return `Box<dyn Error + Send + Sync>`; this
//! module converts those to our typed error enum, with an optional
//! feature-gated path for `bodyscale_hardware::error::LinkError` downcasting.

use crate::error::{ScaleError, TransportKind};

/// Map a link-boundary error to a typed `ScaleError::Transport`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_link_error(e: &(dyn std::error::Error + 'static)) -> ScaleError {
    #[cfg(feature = "hardware-errors")]
    {
        use bodyscale_hardware::error::LinkError;
        if let Some(le) = e.downcast_ref::<LinkError>() {
            let kind = match le {
                LinkError::PermissionDenied(_) => TransportKind::PermissionDenied,
                LinkError::Unsupported(_) => TransportKind::Unsupported,
                LinkError::DeviceNotFound => TransportKind::DeviceNotFound,
                LinkError::GattServer(_) => TransportKind::GattServer,
                LinkError::ServiceNotFound => TransportKind::ServiceNotFound,
                LinkError::CharacteristicNotFound => TransportKind::CharacteristicNotFound,
                LinkError::NotConnected | LinkError::Io(_) => TransportKind::Other,
            };
            return ScaleError::transport(kind, le.to_string());
        }
    }

    // Fallback: string-based detection
    let s = e.to_string();
    ScaleError::transport(classify_message(&s), s)
}

fn classify_message(s: &str) -> TransportKind {
    let l = s.to_lowercase();
    if l.contains("permission") || l.contains("not allowed") || l.contains("denied") {
        TransportKind::PermissionDenied
    } else if l.contains("not supported") || l.contains("unsupported") || l.contains("no adapter")
    {
        TransportKind::Unsupported
    } else if l.contains("characteristic") {
        TransportKind::CharacteristicNotFound
    } else if l.contains("service") {
        TransportKind::ServiceNotFound
    } else if l.contains("gatt") {
        TransportKind::GattServer
    } else if l.contains("not found") || l.contains("no device") {
        TransportKind::DeviceNotFound
    } else {
        TransportKind::Other
    }
}

/// Map a store-boundary error to `ScaleError::Persistence`.
pub fn map_store_error(e: &(dyn std::error::Error + 'static)) -> ScaleError {
    ScaleError::Persistence(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind_of(msg: &str) -> TransportKind {
        let e = std::io::Error::other(msg.to_string());
        match map_link_error(&e) {
            ScaleError::Transport { kind, .. } => kind,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn string_fallback_classifies_common_messages() {
        assert_eq!(kind_of("Permission denied by user"), TransportKind::PermissionDenied);
        assert_eq!(kind_of("Bluetooth not supported"), TransportKind::Unsupported);
        assert_eq!(kind_of("No device found"), TransportKind::DeviceNotFound);
        assert_eq!(kind_of("GATT operation failed"), TransportKind::GattServer);
        assert_eq!(kind_of("no matching service"), TransportKind::ServiceNotFound);
        assert_eq!(
            kind_of("no matching characteristic in service"),
            TransportKind::CharacteristicNotFound
        );
        assert_eq!(kind_of("broken pipe"), TransportKind::Other);
    }
}
