//! Per-connection session and the mode dispatcher
//!
//! A [`Session`] owns the connection and the mutable state the drivers
//! share with their notification handlers. [`Session::dispatch`] hands out
//! exactly one [`Driver`], borrowing the session mutably so a second driver
//! cannot exist at the same time.

use tracing::info;
use uuid::Uuid;

use crate::config::ConfigDriver;
use crate::streaming::StreamingDriver;
use crate::transfer::{FileTransferDriver, TransferSlot};
use crate::{AttributeTransport, ConnectionHandle, DispatchError, Mode};

/// Mutable per-connection record
#[derive(Debug, Default)]
pub struct SessionState {
    mode: Option<Mode>,
    /// File currently being received; written by the data handler
    pub(crate) transfer: TransferSlot,
    /// File-transfer notification handlers are registered on this connection
    pub(crate) transfer_handlers: bool,
}

impl SessionState {
    /// Mode of the driver this session handed out, if any
    pub fn mode(&self) -> Option<Mode> {
        self.mode
    }

    /// A file is currently being received
    pub fn transfer_active(&self) -> bool {
        crate::transfer::lock(&self.transfer).is_some()
    }
}

pub struct Session<T> {
    conn: ConnectionHandle<T>,
    state: SessionState,
}

impl<T: AttributeTransport> Session<T> {
    /// An idle session over an open connection
    pub fn new(conn: ConnectionHandle<T>) -> Self {
        Self {
            conn,
            state: SessionState::default(),
        }
    }

    pub fn connection(&self) -> &ConnectionHandle<T> {
        &self.conn
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Give the connection back, e.g. to disconnect it
    pub fn into_connection(self) -> ConnectionHandle<T> {
        self.conn
    }

    /// Activate the driver matching the advertised services.
    ///
    /// On [`DispatchError::UnknownService`] the session stays idle and the
    /// connection open; the caller decides whether to disconnect. A session
    /// dispatches at most once.
    pub fn dispatch(&mut self, advertised: &[Uuid]) -> Result<Driver<'_, T>, DispatchError> {
        if let Some(mode) = self.state.mode {
            return Err(DispatchError::Finished(mode));
        }
        if !self.conn.is_connected() {
            return Err(DispatchError::Disconnected);
        }

        let mode = Mode::select(advertised)?;
        info!(%mode, "activating driver");
        self.state.mode = Some(mode);

        Ok(match mode {
            Mode::Configuration => Driver::Configuration(ConfigDriver::new(&self.conn)),
            Mode::Streaming => Driver::Streaming(StreamingDriver::new(&self.conn)),
            Mode::FileTransfer => {
                Driver::FileTransfer(FileTransferDriver::new(&self.conn, &mut self.state))
            }
        })
    }
}

/// The single active protocol driver of a session
pub enum Driver<'a, T> {
    Configuration(ConfigDriver<'a, T>),
    Streaming(StreamingDriver<'a, T>),
    FileTransfer(FileTransferDriver<'a, T>),
}

impl<T> Driver<'_, T> {
    pub fn mode(&self) -> Mode {
        match self {
            Self::Configuration(_) => Mode::Configuration,
            Self::Streaming(_) => Mode::Streaming,
            Self::FileTransfer(_) => Mode::FileTransfer,
        }
    }
}

#[cfg(test)]
mod tests {
    use swimu_proto::ble::{CONFIG_SERVICE_UUID, FILE_TX_SERVICE_UUID, IMU_SERVICE_UUID};

    use super::*;
    use crate::mock::MockTransport;
    use crate::{Timeouts, UnknownServiceError};

    fn session() -> (MockTransport, Session<MockTransport>) {
        let mock = MockTransport::new();
        let session = Session::new(mock.connection(Timeouts::default()));
        (mock, session)
    }

    #[tokio::test]
    async fn dispatch_picks_advertised_mode() {
        for (service, mode) in [
            (CONFIG_SERVICE_UUID, Mode::Configuration),
            (IMU_SERVICE_UUID, Mode::Streaming),
            (FILE_TX_SERVICE_UUID, Mode::FileTransfer),
        ] {
            let (_mock, mut session) = session();
            let driver = session.dispatch(&[service]).unwrap();
            assert_eq!(driver.mode(), mode);
            assert_eq!(session.state().mode(), Some(mode));
        }
    }

    #[tokio::test]
    async fn unknown_service_leaves_session_idle() {
        let (mock, mut session) = session();
        let other = Uuid::from_u128(1);
        let err = session.dispatch(&[other]).err().unwrap();
        assert_eq!(
            err,
            DispatchError::UnknownService(UnknownServiceError {
                advertised: vec![other]
            })
        );
        assert_eq!(session.state().mode(), None);
        assert!(session.connection().is_connected());
        assert!(mock.events().is_empty());

        // still usable afterwards
        assert!(session.dispatch(&[IMU_SERVICE_UUID]).is_ok());
    }

    #[tokio::test]
    async fn dispatch_is_terminal() {
        let (_mock, mut session) = session();
        session.dispatch(&[CONFIG_SERVICE_UUID]).unwrap();
        assert_eq!(
            session.dispatch(&[CONFIG_SERVICE_UUID]).err(),
            Some(DispatchError::Finished(Mode::Configuration))
        );
    }

    #[tokio::test]
    async fn dispatch_after_disconnect() {
        let (mock, mut session) = session();
        mock.disconnect();
        assert_eq!(
            session.dispatch(&[CONFIG_SERVICE_UUID]).err(),
            Some(DispatchError::Disconnected)
        );
    }
}
