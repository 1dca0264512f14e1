use std::fmt;
use std::time::Duration;

use swimu_proto::Status;
use uuid::Uuid;

use crate::Mode;

/// Failure reported by the attribute transport
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection lost")]
    Disconnected,

    #[error("transport timed out")]
    Timeout,

    #[error("characteristic {0} not found")]
    CharacteristicNotFound(Uuid),

    #[error("transport failure: {0}")]
    Backend(String),
}

/// A transport operation a driver was suspended on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read(Uuid),
    Write(Uuid),
    Subscribe(Uuid),
    Unsubscribe(Uuid),
    /// Waiting for `TRANSFER_COMPLETE`
    Completion,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read(id) => write!(f, "read of {id}"),
            Self::Write(id) => write!(f, "write to {id}"),
            Self::Subscribe(id) => write!(f, "subscribe to {id}"),
            Self::Unsubscribe(id) => write!(f, "unsubscribe from {id}"),
            Self::Completion => f.write_str("wait for transfer completion"),
        }
    }
}

/// Why a driver stopped before finishing
#[derive(thiserror::Error, Debug)]
pub enum ProtocolError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("write to {characteristic} failed: {source}")]
    WriteFailed {
        characteristic: Uuid,
        source: TransportError,
    },

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: Operation, after: Duration },

    #[error("device has no files to send (status {status})")]
    NoFilesAvailable { status: Status },

    #[error("device reported an error opening the next file")]
    ServerFileError,

    #[error("expected {expected}, device answered {got}")]
    UnexpectedStatus { expected: &'static str, got: Status },

    #[error("sample stream already started")]
    AlreadyStreaming,

    #[error("failed to store {name}: {source}")]
    Sink {
        name: String,
        source: std::io::Error,
    },
}

impl ProtocolError {
    /// True when the link dropped, whichever step noticed it
    pub fn is_connection_lost(&self) -> bool {
        matches!(
            self,
            Self::Transport(TransportError::Disconnected)
                | Self::WriteFailed {
                    source: TransportError::Disconnected,
                    ..
                }
        )
    }
}

/// None of the advertised services belongs to a known mode
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("no known SwIMU service advertised (saw {advertised:?})")]
pub struct UnknownServiceError {
    pub advertised: Vec<Uuid>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    UnknownService(#[from] UnknownServiceError),

    #[error("session already ran the {0} driver")]
    Finished(Mode),

    #[error("connection lost")]
    Disconnected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        let err = ProtocolError::UnexpectedStatus {
            expected: "MORE_FILES or DONE",
            got: Status::Unrecognized("MAYBE".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "expected MORE_FILES or DONE, device answered \"MAYBE\""
        );

        let err = ProtocolError::Timeout {
            operation: Operation::Completion,
            after: Duration::from_secs(2),
        };
        assert_eq!(err.to_string(), "wait for transfer completion timed out after 2s");

        let err = ProtocolError::NoFilesAvailable {
            status: Status::Unrecognized("NOT_READY".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "device has no files to send (status \"NOT_READY\")"
        );
    }

    #[test]
    fn connection_lost() {
        assert!(ProtocolError::from(TransportError::Disconnected).is_connection_lost());
        assert!(
            ProtocolError::WriteFailed {
                characteristic: Uuid::nil(),
                source: TransportError::Disconnected,
            }
            .is_connection_lost()
        );
        assert!(!ProtocolError::ServerFileError.is_connection_lost());
    }
}
