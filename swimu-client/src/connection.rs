//! Connection handle: a transport plus deadlines and link state
//!
//! Every suspension point of every driver goes through [`ConnectionHandle`],
//! which races the operation against its deadline and against connection
//! loss.

use std::future::Future;
use std::time::Duration;

use swimu_proto::{Command, Status};
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

use crate::{
    AttributeTransport, CompletionSignal, NotificationHandler, Operation, ProtocolError,
    TransportError,
};

/// Deadlines applied to suspension points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Single read, write, subscribe or unsubscribe
    pub operation: Duration,
    /// Whole byte stream of one file, from `START` to `TRANSFER_COMPLETE`
    pub transfer: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            operation: Duration::from_secs(20),
            transfer: Duration::from_secs(600),
        }
    }
}

/// Create a connected link pair. The transport keeps the reporter, the
/// connection handle keeps the monitor.
pub fn link() -> (LinkReporter, LinkMonitor) {
    let (tx, rx) = watch::channel(true);
    (LinkReporter { tx }, LinkMonitor { rx })
}

/// Transport side of the connection flag
#[derive(Debug)]
pub struct LinkReporter {
    tx: watch::Sender<bool>,
}

impl LinkReporter {
    /// Mark the link as lost. Idempotent.
    pub fn disconnected(&self) {
        self.tx.send_replace(false);
    }

    /// Current link state as last reported
    pub fn is_connected(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Driver side of the connection flag. Dropping the reporter counts as a
/// disconnect.
#[derive(Debug, Clone)]
pub struct LinkMonitor {
    rx: watch::Receiver<bool>,
}

impl LinkMonitor {
    /// Link is up and the reporter still exists
    pub fn is_connected(&self) -> bool {
        *self.rx.borrow() && self.rx.has_changed().is_ok()
    }

    /// Resolves once the link is gone
    pub async fn lost(&self) {
        let mut rx = self.rx.clone();
        let _ = rx.wait_for(|connected| !*connected).await;
    }
}

/// An open attribute-transport session
pub struct ConnectionHandle<T> {
    transport: T,
    link: LinkMonitor,
    timeouts: Timeouts,
}

impl<T: AttributeTransport> ConnectionHandle<T> {
    /// Wrap a transport with its link monitor and deadlines
    pub fn new(transport: T, link: LinkMonitor, timeouts: Timeouts) -> Self {
        Self {
            transport,
            link,
            timeouts,
        }
    }

    /// The underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Unwrap, e.g. to disconnect the peripheral
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Deadlines in force for this connection
    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    /// False once the link has dropped
    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    /// Resolves once the connection drops
    pub async fn closed(&self) {
        self.link.lost().await
    }

    /// Read a characteristic within the operation deadline
    pub async fn read(&self, id: Uuid) -> Result<Vec<u8>, ProtocolError> {
        let value = self
            .guard(
                Operation::Read(id),
                self.timeouts.operation,
                self.transport.read(id),
            )
            .await?;
        debug!(%id, len = value.len(), "read");
        Ok(value)
    }

    /// Write with response within the operation deadline
    pub async fn write(&self, id: Uuid, value: &[u8]) -> Result<(), ProtocolError> {
        debug!(%id, len = value.len(), "write");
        self.guard(
            Operation::Write(id),
            self.timeouts.operation,
            self.transport.write(id, value),
        )
        .await
    }

    /// Write a control literal
    pub async fn command(&self, id: Uuid, command: Command) -> Result<(), ProtocolError> {
        debug!(%id, %command, "command");
        self.guard(
            Operation::Write(id),
            self.timeouts.operation,
            self.transport.write(id, command.as_bytes()),
        )
        .await
    }

    /// Read a characteristic and decode it as a status literal
    pub async fn read_status(&self, id: Uuid) -> Result<Status, ProtocolError> {
        let status = Status::decode(&self.read(id).await?);
        debug!(%id, %status, "status");
        Ok(status)
    }

    /// Enable notifications on `id` and route them to `handler`
    pub async fn subscribe(
        &self,
        id: Uuid,
        handler: NotificationHandler,
    ) -> Result<(), ProtocolError> {
        debug!(%id, "subscribe");
        self.guard(
            Operation::Subscribe(id),
            self.timeouts.operation,
            self.transport.subscribe(id, handler),
        )
        .await
    }

    /// Disable notifications on `id`
    pub async fn unsubscribe(&self, id: Uuid) -> Result<(), ProtocolError> {
        debug!(%id, "unsubscribe");
        self.guard(
            Operation::Unsubscribe(id),
            self.timeouts.operation,
            self.transport.unsubscribe(id),
        )
        .await
    }

    /// Suspend until `signal` resolves, the transfer deadline passes, or the
    /// link drops.
    pub async fn wait<V: Clone>(&self, signal: &CompletionSignal<V>) -> Result<V, ProtocolError> {
        self.guard(Operation::Completion, self.timeouts.transfer, async {
            Ok(signal.await_value().await)
        })
        .await
    }

    async fn guard<R, F>(
        &self,
        operation: Operation,
        after: Duration,
        fut: F,
    ) -> Result<R, ProtocolError>
    where
        F: Future<Output = Result<R, TransportError>>,
    {
        tokio::select! {
            biased;
            _ = self.link.lost() => Err(TransportError::Disconnected.into()),
            r = tokio::time::timeout(after, fut) => match r {
                Ok(r) => r.map_err(ProtocolError::from),
                Err(_) => Err(ProtocolError::Timeout { operation, after }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_flag() {
        let (reporter, monitor) = link();
        assert!(monitor.is_connected());
        reporter.disconnected();
        assert!(!monitor.is_connected());
        assert!(!reporter.is_connected());
    }

    #[test]
    fn dropped_reporter_is_a_disconnect() {
        let (reporter, monitor) = link();
        drop(reporter);
        assert!(!monitor.is_connected());
    }

    #[tokio::test]
    async fn lost_resolves_after_disconnect() {
        let (reporter, monitor) = link();
        let waiter = tokio::spawn(async move { monitor.lost().await });
        tokio::task::yield_now().await;
        reporter.disconnected();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
