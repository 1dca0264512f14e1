//! Attribute transport abstraction
//!
//! The drivers never talk to a BLE stack directly. They hold a
//! [`crate::ConnectionHandle`] around something implementing
//! [`AttributeTransport`]: the btleplug adapter in `swimu-ble`, or
//! [`crate::mock::MockTransport`] in tests.

use std::future::Future;
use std::sync::Arc;

use uuid::Uuid;

use crate::TransportError;

/// Callback invoked with each notification payload.
///
/// Runs in the transport's own context, concurrently with the suspended
/// driver. Must not block.
pub type NotificationHandler = Arc<dyn Fn(&[u8]) + Send + Sync>;

pub trait AttributeTransport: Send + Sync {
    /// Read the current value of a characteristic
    fn read(&self, id: Uuid) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;

    /// Write a value and wait for the peripheral to acknowledge it
    fn write(
        &self,
        id: Uuid,
        value: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Enable notifications on a characteristic and route them to `handler`.
    /// Replaces any handler already registered for `id`.
    fn subscribe(
        &self,
        id: Uuid,
        handler: NotificationHandler,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn unsubscribe(&self, id: Uuid) -> impl Future<Output = Result<(), TransportError>> + Send;
}
