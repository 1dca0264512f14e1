//! btleplug transport for SwIMU devices
//!
//! Scans for devices, connects, and exposes the peripheral as an
//! [`AttributeTransport`]. Notifications from btleplug's single stream are
//! routed to the handler registered for their characteristic by a pump task.
//! A second task watches adapter events and reports the link lost when the
//! peripheral disconnects.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use btleplug::api::{
    Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use swimu_client::{
    AttributeTransport, LinkMonitor, LinkReporter, NotificationHandler, TransportError, link,
};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(thiserror::Error, Debug)]
pub enum BleError {
    #[error("no Bluetooth adapter found")]
    NoAdapter,

    #[error("no device matching {0:?} found")]
    NotFound(String),

    #[error(transparent)]
    Btle(#[from] btleplug::Error),
}

/// A peripheral seen during a scan
#[derive(Debug, Clone)]
pub struct DeviceDescriptor {
    pub address: String,
    pub name: String,
    pub rssi: Option<i16>,
    /// Service UUIDs from the advertisement
    pub services: Vec<Uuid>,
}

impl DeviceDescriptor {
    /// Name or address contains `target`
    pub fn matches(&self, target: &str) -> bool {
        self.name.contains(target) || self.address.contains(target)
    }
}

/// Get the default Bluetooth adapter
pub async fn get_adapter() -> Result<Adapter, BleError> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;
    adapters.into_iter().next().ok_or(BleError::NoAdapter)
}

async fn describe(peripheral: &Peripheral) -> Result<Option<DeviceDescriptor>, BleError> {
    Ok(peripheral.properties().await?.map(|props| DeviceDescriptor {
        address: peripheral.address().to_string(),
        name: props.local_name.unwrap_or_else(|| "Unknown".to_string()),
        rssi: props.rssi,
        services: props.services,
    }))
}

/// Scan for BLE devices for `duration`
pub async fn scan(adapter: &Adapter, duration: Duration) -> Result<Vec<DeviceDescriptor>, BleError> {
    adapter.start_scan(ScanFilter::default()).await?;
    tokio::time::sleep(duration).await;

    let mut devices = Vec::new();
    for peripheral in adapter.peripherals().await? {
        if let Some(device) = describe(&peripheral).await? {
            devices.push(device);
        }
    }

    adapter.stop_scan().await?;
    Ok(devices)
}

/// Find the first device whose name or address contains `target`
pub async fn find_device(
    adapter: &Adapter,
    target: &str,
    duration: Duration,
) -> Result<(Peripheral, DeviceDescriptor), BleError> {
    adapter.start_scan(ScanFilter::default()).await?;
    tokio::time::sleep(duration).await;

    for peripheral in adapter.peripherals().await? {
        if let Some(device) = describe(&peripheral).await? {
            if device.matches(target) {
                adapter.stop_scan().await?;
                info!(name = %device.name, address = %device.address, "found device");
                return Ok((peripheral, device));
            }
        }
    }

    adapter.stop_scan().await?;
    Err(BleError::NotFound(target.to_string()))
}

type Handlers = Arc<Mutex<HashMap<Uuid, NotificationHandler>>>;

fn lock_handlers(h: &Handlers) -> MutexGuard<'_, HashMap<Uuid, NotificationHandler>> {
    h.lock().unwrap_or_else(PoisonError::into_inner)
}

fn transport_error(e: btleplug::Error) -> TransportError {
    match e {
        btleplug::Error::NotConnected => TransportError::Disconnected,
        btleplug::Error::TimedOut(_) => TransportError::Timeout,
        other => TransportError::Backend(other.to_string()),
    }
}

/// A connected SwIMU peripheral
pub struct BleTransport {
    peripheral: Peripheral,
    handlers: Handlers,
    reporter: Arc<LinkReporter>,
    monitor: LinkMonitor,
    tasks: Vec<JoinHandle<()>>,
}

impl BleTransport {
    /// Connect, discover services and start the notification pump and the
    /// disconnect watcher
    pub async fn connect(adapter: &Adapter, peripheral: Peripheral) -> Result<Self, BleError> {
        peripheral.connect().await?;
        peripheral.discover_services().await?;

        let (reporter, monitor) = link();
        let reporter = Arc::new(reporter);
        let handlers = Handlers::default();

        let mut notifications = peripheral.notifications().await?;
        let pump = {
            let handlers = Arc::clone(&handlers);
            let reporter = Arc::clone(&reporter);
            tokio::spawn(async move {
                while let Some(n) = notifications.next().await {
                    let handler = lock_handlers(&handlers).get(&n.uuid).cloned();
                    match handler {
                        Some(handler) => handler(&n.value),
                        None => debug!(uuid = %n.uuid, "notification without handler"),
                    }
                }
                reporter.disconnected();
            })
        };

        let mut events = adapter.events().await?;
        let id = peripheral.id();
        let watcher = {
            let reporter = Arc::clone(&reporter);
            tokio::spawn(async move {
                while let Some(event) = events.next().await {
                    if let CentralEvent::DeviceDisconnected(gone) = event {
                        if gone == id {
                            warn!("device disconnected");
                            reporter.disconnected();
                            return;
                        }
                    }
                }
            })
        };

        info!(address = %peripheral.address(), "connected");
        Ok(Self {
            peripheral,
            handlers,
            reporter,
            monitor,
            tasks: vec![pump, watcher],
        })
    }

    /// Link state for [`swimu_client::ConnectionHandle`]
    pub fn monitor(&self) -> LinkMonitor {
        self.monitor.clone()
    }

    /// Service UUIDs found by service discovery
    pub fn services(&self) -> Vec<Uuid> {
        self.peripheral.services().iter().map(|s| s.uuid).collect()
    }

    /// Mark the link lost and drop the BLE connection
    pub async fn disconnect(&self) -> Result<(), TransportError> {
        self.reporter.disconnected();
        self.peripheral.disconnect().await.map_err(transport_error)
    }

    fn characteristic(&self, id: Uuid) -> Result<Characteristic, TransportError> {
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == id)
            .ok_or(TransportError::CharacteristicNotFound(id))
    }
}

impl Drop for BleTransport {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl AttributeTransport for BleTransport {
    async fn read(&self, id: Uuid) -> Result<Vec<u8>, TransportError> {
        let c = self.characteristic(id)?;
        self.peripheral.read(&c).await.map_err(transport_error)
    }

    async fn write(&self, id: Uuid, value: &[u8]) -> Result<(), TransportError> {
        let c = self.characteristic(id)?;
        self.peripheral
            .write(&c, value, WriteType::WithResponse)
            .await
            .map_err(transport_error)
    }

    async fn subscribe(&self, id: Uuid, handler: NotificationHandler) -> Result<(), TransportError> {
        let c = self.characteristic(id)?;
        // handler must be in place before notifications are enabled
        lock_handlers(&self.handlers).insert(id, handler);
        if let Err(e) = self.peripheral.subscribe(&c).await {
            lock_handlers(&self.handlers).remove(&id);
            return Err(transport_error(e));
        }
        Ok(())
    }

    async fn unsubscribe(&self, id: Uuid) -> Result<(), TransportError> {
        let c = self.characteristic(id)?;
        self.peripheral.unsubscribe(&c).await.map_err(transport_error)?;
        lock_handlers(&self.handlers).remove(&id);
        Ok(())
    }
}
