//! File transfer driver
//!
//! ```text
//! IDLE --SEND_FILES--> AWAITING_READY --READY--> FILE_LOOP_NAME
//! FILE_LOOP_NAME --name--> ACKED_NAME --ACK, START--> TRANSFERRING
//! TRANSFERRING --TRANSFER_COMPLETE--> FILE_DONE --flush, MORE_FILES?-->
//!     MORE_FILES: FILE_LOOP_NAME | DONE: COMPLETE
//! ```
//!
//! Protocol contract for every file, the first included: read the name,
//! write `ACK` to the name characteristic, then `START` to the request
//! characteristic.
//!
//! The data and completion handlers are registered once per connection and
//! always target whichever [`TransferSession`] sits in the session slot. A
//! fresh session is put there before `ACK`/`START` are written, so the first
//! data notification always finds it.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use swimu_proto::ble::{
    FILE_TX_COMPLETE_UUID, FILE_TX_DATA_UUID, FILE_TX_NAME_UUID, FILE_TX_REQUEST_UUID,
};
use swimu_proto::{Command, FileNameReply, Status};
use tracing::{debug, info, warn};

use crate::session::SessionState;
use crate::{AttributeTransport, CompletionSignal, ConnectionHandle, NotificationHandler, ProtocolError};

pub(crate) type TransferSlot = Arc<Mutex<Option<TransferSession>>>;

pub(crate) fn lock(slot: &TransferSlot) -> MutexGuard<'_, Option<TransferSession>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Where finished files go. Keyed by the name the device sent.
pub trait FileSink {
    fn store(
        &mut self,
        name: &str,
        data: Vec<u8>,
    ) -> impl Future<Output = std::io::Result<()>> + Send;
}

/// Keeps received files in memory, in arrival order
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MemorySink {
    pub files: Vec<(String, Vec<u8>)>,
}

impl FileSink for MemorySink {
    async fn store(&mut self, name: &str, data: Vec<u8>) -> std::io::Result<()> {
        self.files.push((name.to_string(), data));
        Ok(())
    }
}

/// One file in flight
#[derive(Debug)]
pub struct TransferSession {
    name: String,
    buffer: Vec<u8>,
    complete: CompletionSignal<()>,
    started: Instant,
}

impl TransferSession {
    fn new(name: String) -> Self {
        Self {
            name,
            buffer: Vec::new(),
            complete: CompletionSignal::create(),
            started: Instant::now(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Append a data notification. Empty payloads and data arriving after
    /// completion are ignored.
    fn append(&mut self, data: &[u8]) -> bool {
        if data.is_empty() || self.complete.is_resolved() {
            return false;
        }
        self.buffer.extend_from_slice(data);
        true
    }
}

/// A file that made it to the sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFile {
    pub name: String,
    pub len: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferReport {
    pub files: Vec<ReceivedFile>,
}

impl TransferReport {
    /// Bytes across all received files
    pub fn total_bytes(&self) -> usize {
        self.files.iter().map(|f| f.len).sum()
    }
}

/// Where the driver is in the protocol. An error from any step is the
/// aborted state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferState {
    Idle,
    AwaitingReady,
    FileLoopName,
    AckedName { name: String },
    Transferring { name: String },
    FileDone { name: String },
    Complete,
}

fn data_handler(slot: TransferSlot) -> NotificationHandler {
    Arc::new(move |data: &[u8]| {
        if data.is_empty() {
            warn!("ignoring empty file data notification");
            return;
        }
        match lock(&slot).as_mut() {
            Some(session) => {
                if !session.append(data) {
                    warn!(file = %session.name, len = data.len(), "file data after completion");
                }
            }
            None => warn!(len = data.len(), "file data with no active transfer"),
        }
    })
}

fn completion_handler(slot: TransferSlot) -> NotificationHandler {
    Arc::new(move |data: &[u8]| match Status::decode(data) {
        Status::TransferComplete => match lock(&slot).as_ref() {
            Some(session) => {
                session.complete.resolve(());
            }
            None => warn!("transfer complete with no active transfer"),
        },
        other => warn!(status = %other, "ignoring transfer-complete notification"),
    })
}

/// File transfer mode, as handed out by [`crate::Session::dispatch`]
pub struct FileTransferDriver<'a, T> {
    conn: &'a ConnectionHandle<T>,
    session: &'a mut SessionState,
}

impl<'a, T: AttributeTransport> FileTransferDriver<'a, T> {
    pub(crate) fn new(conn: &'a ConnectionHandle<T>, session: &'a mut SessionState) -> Self {
        Self { conn, session }
    }

    /// Receive every file the device offers, handing each one to `sink`
    /// before asking for the next.
    ///
    /// On error, files already stored stay stored.
    pub async fn receive_all<S: FileSink>(
        mut self,
        sink: &mut S,
    ) -> Result<TransferReport, ProtocolError> {
        let mut report = TransferReport::default();
        let mut state = TransferState::Idle;
        loop {
            debug!(?state, "file transfer step");
            state = match self.step(state, sink, &mut report).await {
                Ok(TransferState::Complete) => {
                    info!(
                        files = report.files.len(),
                        bytes = report.total_bytes(),
                        "all files received"
                    );
                    return Ok(report);
                }
                Ok(next) => next,
                Err(e) => {
                    // stray notifications must not land in a dead session
                    lock(&self.session.transfer).take();
                    warn!(error = %e, "file transfer aborted");
                    return Err(e);
                }
            };
        }
    }

    async fn step<S: FileSink>(
        &mut self,
        state: TransferState,
        sink: &mut S,
        report: &mut TransferReport,
    ) -> Result<TransferState, ProtocolError> {
        match state {
            TransferState::Idle => {
                self.conn
                    .command(FILE_TX_REQUEST_UUID, Command::SendFiles)
                    .await?;
                Ok(TransferState::AwaitingReady)
            }
            TransferState::AwaitingReady => match self.conn.read_status(FILE_TX_REQUEST_UUID).await? {
                Status::Ready => Ok(TransferState::FileLoopName),
                status => Err(ProtocolError::NoFilesAvailable { status }),
            },
            TransferState::FileLoopName => {
                self.register_handlers().await?;
                match FileNameReply::decode(&self.conn.read(FILE_TX_NAME_UUID).await?) {
                    FileNameReply::Error => Err(ProtocolError::ServerFileError),
                    FileNameReply::File(name) if name.is_empty() => {
                        Err(ProtocolError::UnexpectedStatus {
                            expected: "a file name",
                            got: Status::Unrecognized(name),
                        })
                    }
                    FileNameReply::File(name) => Ok(TransferState::AckedName { name }),
                }
            }
            TransferState::AckedName { name } => {
                *lock(&self.session.transfer) = Some(TransferSession::new(name.clone()));
                self.conn.command(FILE_TX_NAME_UUID, Command::Ack).await?;
                self.conn.command(FILE_TX_REQUEST_UUID, Command::Start).await?;
                info!(file = %name, "receiving file");
                Ok(TransferState::Transferring { name })
            }
            TransferState::Transferring { name } => {
                let complete = match lock(&self.session.transfer).as_ref() {
                    Some(session) => session.complete.clone(),
                    None => CompletionSignal::create(),
                };
                self.conn.wait(&complete).await?;
                Ok(TransferState::FileDone { name })
            }
            TransferState::FileDone { name } => {
                let session = lock(&self.session.transfer).take();
                let (data, elapsed) = match session {
                    Some(s) => (s.buffer, s.started.elapsed()),
                    None => (Vec::new(), Duration::ZERO),
                };
                let len = data.len();
                sink.store(&name, data)
                    .await
                    .map_err(|source| ProtocolError::Sink {
                        name: name.clone(),
                        source,
                    })?;
                info!(file = %name, bytes = len, ?elapsed, "file received");
                report.files.push(ReceivedFile { name, len, elapsed });

                self.conn
                    .command(FILE_TX_REQUEST_UUID, Command::MoreFiles)
                    .await?;
                match self.conn.read_status(FILE_TX_REQUEST_UUID).await? {
                    Status::MoreFiles => Ok(TransferState::FileLoopName),
                    Status::Done => Ok(TransferState::Complete),
                    got => Err(ProtocolError::UnexpectedStatus {
                        expected: "MORE_FILES or DONE",
                        got,
                    }),
                }
            }
            TransferState::Complete => Ok(TransferState::Complete),
        }
    }

    async fn register_handlers(&mut self) -> Result<(), ProtocolError> {
        if self.session.transfer_handlers {
            return Ok(());
        }
        let slot = &self.session.transfer;
        self.conn
            .subscribe(FILE_TX_DATA_UUID, data_handler(Arc::clone(slot)))
            .await?;
        self.conn
            .subscribe(FILE_TX_COMPLETE_UUID, completion_handler(Arc::clone(slot)))
            .await?;
        self.session.transfer_handlers = true;
        Ok(())
    }
}
