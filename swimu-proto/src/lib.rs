//! SwIMU wire protocol - control vocabulary, sample records and timestamps
//!
//! Every control message on the wire is a short UTF-8 literal. They are
//! decoded into [`Command`] and [`Status`] once, at the transport boundary,
//! so the drivers never compare raw strings.

pub mod ble;
mod sample;
mod timestamp;

use std::fmt;

pub use sample::{DecodeError, Sample};
pub use timestamp::Timestamp;

/// Control commands written by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Open a file transfer session
    SendFiles,
    /// Acknowledge the file name just read
    Ack,
    /// Begin a sample stream, or the byte stream of the acknowledged file
    Start,
    /// End a sample stream
    End,
    /// Ask whether another file is waiting
    MoreFiles,
}

impl Command {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SendFiles => "SEND_FILES",
            Self::Ack => "ACK",
            Self::Start => "START",
            Self::End => "END",
            Self::MoreFiles => "MORE_FILES?",
        }
    }

    pub fn as_bytes(self) -> &'static [u8] {
        self.as_str().as_bytes()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Replies read back from (or notified by) the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Ready,
    MoreFiles,
    Done,
    /// Server could not open the requested file
    Error,
    TransferComplete,
    /// Anything outside the vocabulary, kept verbatim for error reporting
    Unrecognized(String),
}

impl Status {
    /// Decode a status read or notification. Unknown text is kept verbatim.
    pub fn decode(data: &[u8]) -> Self {
        match decode_text(data).as_str() {
            "READY" => Self::Ready,
            "MORE_FILES" => Self::MoreFiles,
            "DONE" => Self::Done,
            "ERROR" => Self::Error,
            "TRANSFER_COMPLETE" => Self::TransferComplete,
            other => Self::Unrecognized(other.to_string()),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => f.write_str("READY"),
            Self::MoreFiles => f.write_str("MORE_FILES"),
            Self::Done => f.write_str("DONE"),
            Self::Error => f.write_str("ERROR"),
            Self::TransferComplete => f.write_str("TRANSFER_COMPLETE"),
            Self::Unrecognized(s) => write!(f, "{s:?}"),
        }
    }
}

/// Reply to a read of the file-name characteristic
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileNameReply {
    /// Name of the next file the device will send
    File(String),
    /// The device failed to open the file
    Error,
}

impl FileNameReply {
    pub fn decode(data: &[u8]) -> Self {
        match decode_text(data) {
            name if name == "ERROR" => Self::Error,
            name => Self::File(name),
        }
    }
}

/// Decode a text value read from a characteristic.
///
/// The firmware sometimes leaves C string terminators on values, so trailing
/// NUL bytes are dropped. Invalid UTF-8 is replaced rather than rejected.
pub fn decode_text(data: &[u8]) -> String {
    let end = data.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
    String::from_utf8_lossy(&data[..end]).into_owned()
}
