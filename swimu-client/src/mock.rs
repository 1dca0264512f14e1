//! Scripted in-memory transport for tests and dry runs
//!
//! Reads are answered from per-characteristic queues; a read with nothing
//! queued never completes, which is how a silent device looks to a driver.
//! Writes can trigger bursts of notifications, delivered from a spawned task
//! so handlers run concurrently with the driver, just like on a real link.
//! Everything that crosses the transport is recorded as a [`MockEvent`].

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::connection::{LinkMonitor, LinkReporter, link};
use crate::transfer::FileSink;
use crate::{AttributeTransport, ConnectionHandle, NotificationHandler, Timeouts, TransportError};

/// Something that crossed the mock transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    Read(Uuid),
    Write(Uuid, Vec<u8>),
    Subscribe(Uuid),
    Unsubscribe(Uuid),
    /// A notification handed to a registered handler
    Notify(Uuid, Vec<u8>),
    /// A file handed to the [`RecordingSink`]
    Stored(String, Vec<u8>),
}

struct Trigger {
    id: Uuid,
    value: Vec<u8>,
    notifications: Vec<(Uuid, Vec<u8>)>,
}

#[derive(Default)]
struct MockState {
    reads: HashMap<Uuid, VecDeque<Vec<u8>>>,
    triggers: VecDeque<Trigger>,
    handlers: HashMap<Uuid, NotificationHandler>,
    failing_writes: HashSet<Uuid>,
    stalled_writes: HashSet<Uuid>,
    deliveries: Vec<JoinHandle<()>>,
    events: Vec<MockEvent>,
}

#[derive(Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    reporter: Arc<LinkReporter>,
    monitor: LinkMonitor,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        let (reporter, monitor) = link();
        Self {
            state: Arc::default(),
            reporter: Arc::new(reporter),
            monitor,
        }
    }

    /// A connection handle over a clone of this transport
    pub fn connection(&self, timeouts: Timeouts) -> ConnectionHandle<MockTransport> {
        ConnectionHandle::new(self.clone(), self.monitor.clone(), timeouts)
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue the value returned by the next read of `id`
    pub fn push_read(&self, id: Uuid, value: &[u8]) {
        self.state()
            .reads
            .entry(id)
            .or_default()
            .push_back(value.to_vec());
    }

    /// When `value` is next written to `id`, deliver `notifications` in
    /// order. Triggers fire once each, oldest first.
    pub fn on_write(&self, id: Uuid, value: &[u8], notifications: Vec<(Uuid, Vec<u8>)>) {
        self.state().triggers.push_back(Trigger {
            id,
            value: value.to_vec(),
            notifications,
        });
    }

    /// Writes to `id` fail with a backend error
    pub fn fail_writes(&self, id: Uuid) {
        self.state().failing_writes.insert(id);
    }

    /// Writes to `id` are never acknowledged
    pub fn stall_writes(&self, id: Uuid) {
        self.state().stalled_writes.insert(id);
    }

    /// Drop the link
    pub fn disconnect(&self) {
        self.reporter.disconnected();
    }

    /// Everything recorded so far, in order
    pub fn events(&self) -> Vec<MockEvent> {
        self.state().events.clone()
    }

    /// Only the writes, in order
    pub fn writes(&self) -> Vec<(Uuid, Vec<u8>)> {
        self.state()
            .events
            .iter()
            .filter_map(|e| match e {
                MockEvent::Write(id, value) => Some((*id, value.clone())),
                _ => None,
            })
            .collect()
    }

    /// Wait until every scripted notification burst fired so far has been
    /// delivered
    pub async fn settle(&self) {
        loop {
            let pending: Vec<_> = self.state().deliveries.drain(..).collect();
            if pending.is_empty() {
                return;
            }
            for task in pending {
                let _ = task.await;
            }
        }
    }

    /// A file sink that records into this transport's event log
    pub fn sink(&self) -> RecordingSink {
        RecordingSink {
            state: Arc::clone(&self.state),
        }
    }

    fn check_link(&self) -> Result<(), TransportError> {
        if self.monitor.is_connected() {
            Ok(())
        } else {
            Err(TransportError::Disconnected)
        }
    }

    fn fire_trigger(&self, state: &mut MockState, id: Uuid, value: &[u8]) {
        let Some(pos) = state
            .triggers
            .iter()
            .position(|t| t.id == id && t.value == value)
        else {
            return;
        };
        let Some(trigger) = state.triggers.remove(pos) else {
            return;
        };

        let shared = Arc::clone(&self.state);
        let task = tokio::spawn(async move {
            for (id, value) in trigger.notifications {
                tokio::task::yield_now().await;
                let handler = {
                    let mut state = shared.lock().unwrap_or_else(PoisonError::into_inner);
                    let handler = state.handlers.get(&id).cloned();
                    if handler.is_some() {
                        state.events.push(MockEvent::Notify(id, value.clone()));
                    }
                    handler
                };
                if let Some(handler) = handler {
                    handler(&value);
                }
            }
        });
        state.deliveries.push(task);
    }
}

impl AttributeTransport for MockTransport {
    async fn read(&self, id: Uuid) -> Result<Vec<u8>, TransportError> {
        self.check_link()?;
        let value = {
            let mut state = self.state();
            state.events.push(MockEvent::Read(id));
            state.reads.get_mut(&id).and_then(VecDeque::pop_front)
        };
        match value {
            Some(value) => Ok(value),
            None => std::future::pending().await,
        }
    }

    async fn write(&self, id: Uuid, value: &[u8]) -> Result<(), TransportError> {
        self.check_link()?;
        let stalled = {
            let mut state = self.state();
            if state.failing_writes.contains(&id) {
                return Err(TransportError::Backend(format!("write to {id} rejected")));
            }
            state.events.push(MockEvent::Write(id, value.to_vec()));
            self.fire_trigger(&mut state, id, value);
            state.stalled_writes.contains(&id)
        };
        if stalled {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn subscribe(&self, id: Uuid, handler: NotificationHandler) -> Result<(), TransportError> {
        self.check_link()?;
        let mut state = self.state();
        state.events.push(MockEvent::Subscribe(id));
        state.handlers.insert(id, handler);
        Ok(())
    }

    async fn unsubscribe(&self, id: Uuid) -> Result<(), TransportError> {
        self.check_link()?;
        let mut state = self.state();
        state.events.push(MockEvent::Unsubscribe(id));
        state.handlers.remove(&id);
        Ok(())
    }
}

/// File sink sharing the mock's event log, so tests can check where flushes
/// fall relative to writes
#[derive(Clone)]
pub struct RecordingSink {
    state: Arc<Mutex<MockState>>,
}

impl RecordingSink {
    /// Files stored so far, in order
    pub fn files(&self) -> Vec<(String, Vec<u8>)> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .events
            .iter()
            .filter_map(|e| match e {
                MockEvent::Stored(name, data) => Some((name.clone(), data.clone())),
                _ => None,
            })
            .collect()
    }
}

impl FileSink for RecordingSink {
    async fn store(&mut self, name: &str, data: Vec<u8>) -> std::io::Result<()> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .events
            .push(MockEvent::Stored(name.to_string(), data));
        Ok(())
    }
}
