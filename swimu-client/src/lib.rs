//! SwIMU client
//!
//! Protocol drivers for SwIMU wearable IMU sensors. A device advertises one
//! of three services; the session dispatches to the matching driver:
//!
//! - configuration: write person, activity and reference time
//! - streaming: live comma-separated IMU samples via notifications
//! - file transfer: pull every recorded file with a request/ack handshake
//!
//! The BLE link itself is behind [`AttributeTransport`].
//!
//! # Example
//!
//! ```ignore
//! use swimu_client::{Driver, MemorySink, Session};
//!
//! let mut session = Session::new(conn);
//! match session.dispatch(&advertised)? {
//!     Driver::FileTransfer(driver) => {
//!         let mut sink = MemorySink::default();
//!         let report = driver.receive_all(&mut sink).await?;
//!         println!("received {} files", report.files.len());
//!     }
//!     Driver::Configuration(driver) => {
//!         driver.configure(&payload, &SystemClock::default()).await?;
//!     }
//!     Driver::Streaming(driver) => {
//!         driver.run_until(|s| println!("{s}"), shutdown).await?;
//!     }
//! }
//! ```

pub mod config;
mod connection;
mod dispatch;
mod error;
pub mod mock;
mod session;
mod signal;
pub mod streaming;
mod transfer;
mod transport;

pub use config::{Clock, ConfigDriver, ConfigPayload, SystemClock};
pub use connection::{ConnectionHandle, LinkMonitor, LinkReporter, Timeouts, link};
pub use dispatch::Mode;
pub use error::{DispatchError, Operation, ProtocolError, TransportError, UnknownServiceError};
pub use session::{Driver, Session, SessionState};
pub use signal::CompletionSignal;
pub use streaming::{StreamMonitor, StreamStats, StreamingDriver};
pub use transfer::{
    FileSink, FileTransferDriver, MemorySink, ReceivedFile, TransferReport, TransferSession,
    TransferState,
};
pub use transport::{AttributeTransport, NotificationHandler};

pub use swimu_proto::{Sample, Timestamp};
