use thiserror::Error;

/// Category of a transport failure. Each one ends the current connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    PermissionDenied,
    Unsupported,
    DeviceNotFound,
    GattServer,
    ServiceNotFound,
    CharacteristicNotFound,
    Other,
}

impl TransportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransportKind::PermissionDenied => "permission_denied",
            TransportKind::Unsupported => "unsupported",
            TransportKind::DeviceNotFound => "device_not_found",
            TransportKind::GattServer => "gatt_server",
            TransportKind::ServiceNotFound => "service_not_found",
            TransportKind::CharacteristicNotFound => "characteristic_not_found",
            TransportKind::Other => "other",
        }
    }
}

impl core::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A command the session machine refused in its current state.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    #[error("no scale connected")]
    NotConnected,
    #[error("a capture is already in flight")]
    CaptureInFlight,
    #[error("scale is disconnecting after the last save")]
    Disconnecting,
    #[error("no captured sample awaiting confirmation")]
    NothingToConfirm,
    #[error("confirmation already being saved")]
    ConfirmPending,
}

#[derive(Debug, Error, Clone)]
pub enum ScaleError {
    #[error("transport error ({kind}): {message}")]
    Transport {
        kind: TransportKind,
        message: String,
    },
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("session error: {0}")]
    Session(#[from] SessionError),
    #[error("configuration error: {0}")]
    Config(String),
}

impl ScaleError {
    pub fn transport(kind: TransportKind, message: impl Into<String>) -> Self {
        ScaleError::Transport {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing reading store")]
    MissingStore,
    #[error("missing scale link")]
    MissingLink,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
