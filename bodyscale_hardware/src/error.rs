use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("bluetooth permission denied: {0}")]
    PermissionDenied(String),
    #[error("bluetooth not supported: {0}")]
    Unsupported(String),
    #[error("no matching scale found")]
    DeviceNotFound,
    #[error("gatt server error: {0}")]
    GattServer(String),
    #[error("no scale service found on device")]
    ServiceNotFound,
    #[error("no measurement characteristic found on device")]
    CharacteristicNotFound,
    #[error("link not connected")]
    NotConnected,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LinkError>;
