//! Bluetooth LE link built on `btleplug`.
//!
//! `ScaleLink` is blocking, so the link owns a small tokio runtime and drives
//! every btleplug call through `block_on`. Discovery matches advertised names
//! against the request's filters, then resolves the first service and the
//! first characteristic (in request order) that the device exposes and
//! subscribes to its notifications.

use std::pin::Pin;
use std::time::{Duration, Instant};

use bodyscale_traits::{BoxError, ConnectRequest, LinkEvent, ScaleLink};
use btleplug::api::{
    Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, ValueNotification,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::{Stream, StreamExt};
use uuid::Uuid;

use crate::error::{LinkError, Result};

pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(15);
const SCAN_POLL: Duration = Duration::from_millis(250);

type Notifications = Pin<Box<dyn Stream<Item = ValueNotification> + Send>>;

impl From<btleplug::Error> for LinkError {
    fn from(e: btleplug::Error) -> Self {
        match &e {
            btleplug::Error::PermissionDenied => LinkError::PermissionDenied(e.to_string()),
            btleplug::Error::DeviceNotFound => LinkError::DeviceNotFound,
            btleplug::Error::NotConnected => LinkError::NotConnected,
            btleplug::Error::NotSupported(what) => LinkError::Unsupported(what.clone()),
            btleplug::Error::NoSuchCharacteristic => LinkError::CharacteristicNotFound,
            _ => LinkError::GattServer(e.to_string()),
        }
    }
}

struct Session {
    peripheral: Peripheral,
    characteristic: Uuid,
    notifications: Notifications,
}

pub struct BleLink {
    runtime: tokio::runtime::Runtime,
    scan_timeout: Duration,
    session: Option<Session>,
}

impl BleLink {
    pub fn new() -> Result<Self> {
        Self::with_scan_timeout(DEFAULT_SCAN_TIMEOUT)
    }

    pub fn with_scan_timeout(scan_timeout: Duration) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("bodyscale-ble")
            .enable_all()
            .build()?;
        Ok(Self {
            runtime,
            scan_timeout,
            session: None,
        })
    }
}

async fn first_adapter() -> Result<Adapter> {
    let manager = Manager::new().await?;
    manager
        .adapters()
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| LinkError::Unsupported("no bluetooth adapter".to_string()))
}

async fn find_device(
    adapter: &Adapter,
    request: &ConnectRequest,
    scan_timeout: Duration,
) -> Result<(Peripheral, String)> {
    let deadline = Instant::now() + scan_timeout;
    loop {
        for p in adapter.peripherals().await? {
            let Ok(Some(props)) = p.properties().await else {
                continue;
            };
            if let Some(name) = props.local_name
                && request.accepts(&name)
            {
                return Ok((p, name));
            }
        }
        if Instant::now() >= deadline {
            return Err(LinkError::DeviceNotFound);
        }
        tokio::time::sleep(SCAN_POLL).await;
    }
}

/// First service in request order, then the first characteristic in request
/// order on that service.
fn resolve_characteristic(
    peripheral: &Peripheral,
    request: &ConnectRequest,
) -> Result<Characteristic> {
    let services = peripheral.services();
    let service = request
        .services
        .iter()
        .find_map(|id| services.iter().find(|s| s.uuid == Uuid::from_u128(*id)))
        .ok_or(LinkError::ServiceNotFound)?;
    tracing::debug!(service = %service.uuid, "service resolved");
    request
        .characteristics
        .iter()
        .find_map(|id| {
            service
                .characteristics
                .iter()
                .find(|c| c.uuid == Uuid::from_u128(*id))
        })
        .cloned()
        .ok_or(LinkError::CharacteristicNotFound)
}

async fn open(request: &ConnectRequest, scan_timeout: Duration) -> Result<(String, Session)> {
    let adapter = first_adapter().await?;
    adapter.start_scan(ScanFilter::default()).await?;
    let found = find_device(&adapter, request, scan_timeout).await;
    if let Err(e) = adapter.stop_scan().await {
        tracing::warn!(error = %e, "stop_scan failed");
    }
    let (peripheral, name) = found?;
    tracing::info!(%name, "scale found, connecting");

    peripheral
        .connect()
        .await
        .map_err(|e| LinkError::GattServer(e.to_string()))?;
    let subscribed = subscribe(&peripheral, request).await;
    match subscribed {
        Ok((characteristic, notifications)) => Ok((
            name,
            Session {
                peripheral,
                characteristic,
                notifications,
            },
        )),
        Err(e) => {
            if let Err(err) = peripheral.disconnect().await {
                tracing::warn!(%err, "disconnect after failed setup");
            }
            Err(e)
        }
    }
}

async fn subscribe(
    peripheral: &Peripheral,
    request: &ConnectRequest,
) -> Result<(Uuid, Notifications)> {
    peripheral
        .discover_services()
        .await
        .map_err(|e| LinkError::GattServer(e.to_string()))?;
    let characteristic = resolve_characteristic(peripheral, request)?;
    peripheral.subscribe(&characteristic).await?;
    let notifications = peripheral.notifications().await?;
    tracing::debug!(characteristic = %characteristic.uuid, "subscribed");
    Ok((characteristic.uuid, notifications))
}

impl ScaleLink for BleLink {
    fn connect(&mut self, request: &ConnectRequest) -> std::result::Result<String, BoxError> {
        let (name, session) = self.runtime.block_on(open(request, self.scan_timeout))?;
        self.session = Some(session);
        Ok(name)
    }

    fn next_event(
        &mut self,
        timeout: Duration,
    ) -> std::result::Result<Option<LinkEvent>, BoxError> {
        let Some(session) = self.session.as_mut() else {
            return Err(Box::new(LinkError::NotConnected));
        };
        let event = self.runtime.block_on(async {
            match tokio::time::timeout(timeout, session.notifications.next()).await {
                Ok(Some(n)) if n.uuid == session.characteristic => {
                    Some(LinkEvent::Frame(n.value))
                }
                Ok(Some(_)) => None,
                Ok(None) => Some(LinkEvent::Disconnected),
                Err(_) => match session.peripheral.is_connected().await {
                    Ok(false) => Some(LinkEvent::Disconnected),
                    _ => None,
                },
            }
        });
        if event == Some(LinkEvent::Disconnected) {
            tracing::info!("scale disconnected");
            self.session = None;
        }
        Ok(event)
    }

    fn disconnect(&mut self) -> std::result::Result<(), BoxError> {
        if let Some(session) = self.session.take() {
            self.runtime
                .block_on(session.peripheral.disconnect())
                .map_err(LinkError::from)?;
        }
        Ok(())
    }
}
