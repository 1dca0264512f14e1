//! Configuration driver
//!
//! Writes person name, timestamp, activity and a second, fresh timestamp,
//! each acknowledged before the next. There is no rollback: a failed write
//! leaves the device partially configured and the device converges on the
//! next run.

use swimu_proto::Timestamp;
use swimu_proto::ble::{ACTIVITY_UUID, CONFIG_FILE_NAME_UUID, DATETIME_UUID, PERSON_NAME_UUID};
use tracing::info;
use uuid::Uuid;

use crate::{AttributeTransport, ConnectionHandle, ProtocolError};

/// Source of reference timestamps
pub trait Clock {
    fn now(&self) -> Timestamp;
}

/// Local wall clock of the host
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A fixed timestamp is a clock that never moves
impl Clock for Timestamp {
    fn now(&self) -> Timestamp {
        *self
    }
}

/// What gets written to the device. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPayload {
    person_name: String,
    activity: String,
    timestamp: Timestamp,
}

impl ConfigPayload {
    pub fn new(
        person_name: impl Into<String>,
        activity: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            person_name: person_name.into(),
            activity: activity.into(),
            timestamp,
        }
    }

    pub fn person_name(&self) -> &str {
        &self.person_name
    }

    pub fn activity(&self) -> &str {
        &self.activity
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

/// Run the configuration write sequence.
///
/// The final timestamp comes from `clock`, so the device holds the latest
/// reference time even if the activity write was slow.
pub async fn configure<T: AttributeTransport>(
    conn: &ConnectionHandle<T>,
    payload: &ConfigPayload,
    clock: &impl Clock,
) -> Result<(), ProtocolError> {
    info!(
        person = payload.person_name(),
        activity = payload.activity(),
        timestamp = %payload.timestamp(),
        "configuring device"
    );

    write_step(conn, PERSON_NAME_UUID, payload.person_name().as_bytes()).await?;
    write_step(conn, DATETIME_UUID, &payload.timestamp().to_bytes()).await?;
    write_step(conn, ACTIVITY_UUID, payload.activity().as_bytes()).await?;
    write_step(conn, DATETIME_UUID, &clock.now().to_bytes()).await?;

    info!("configuration written");
    Ok(())
}

/// Read back the name of the file the device will record into
pub async fn read_configured_file_name<T: AttributeTransport>(
    conn: &ConnectionHandle<T>,
) -> Result<String, ProtocolError> {
    let name = swimu_proto::decode_text(&conn.read(CONFIG_FILE_NAME_UUID).await?);
    info!(%name, "device recording file");
    Ok(name)
}

async fn write_step<T: AttributeTransport>(
    conn: &ConnectionHandle<T>,
    characteristic: Uuid,
    value: &[u8],
) -> Result<(), ProtocolError> {
    match conn.write(characteristic, value).await {
        Err(ProtocolError::Transport(source)) => Err(ProtocolError::WriteFailed {
            characteristic,
            source,
        }),
        other => other,
    }
}

/// Configuration mode, as handed out by [`crate::Session::dispatch`]
pub struct ConfigDriver<'a, T> {
    conn: &'a ConnectionHandle<T>,
}

impl<'a, T: AttributeTransport> ConfigDriver<'a, T> {
    pub(crate) fn new(conn: &'a ConnectionHandle<T>) -> Self {
        Self { conn }
    }

    /// Run the configuration write sequence, see [`configure`]
    pub async fn configure(
        &self,
        payload: &ConfigPayload,
        clock: &impl Clock,
    ) -> Result<(), ProtocolError> {
        configure(self.conn, payload, clock).await
    }

    /// Name of the file the device will record into
    pub async fn read_configured_file_name(&self) -> Result<String, ProtocolError> {
        read_configured_file_name(self.conn).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::mock::{MockEvent, MockTransport};
    use crate::{Timeouts, TransportError};

    fn payload() -> ConfigPayload {
        ConfigPayload::new("ada", "swim", Timestamp::parse("2024_01_11_19_06_40").unwrap())
    }

    #[tokio::test]
    async fn writes_in_order() {
        let mock = MockTransport::new();
        let conn = mock.connection(Timeouts::default());
        let later = Timestamp::parse("2024_01_11_19_06_43").unwrap();

        configure(&conn, &payload(), &later).await.unwrap();

        assert_eq!(
            mock.events(),
            vec![
                MockEvent::Write(PERSON_NAME_UUID, b"ada".to_vec()),
                MockEvent::Write(DATETIME_UUID, b"2024_01_11_19_06_40".to_vec()),
                MockEvent::Write(ACTIVITY_UUID, b"swim".to_vec()),
                MockEvent::Write(DATETIME_UUID, b"2024_01_11_19_06_43".to_vec()),
            ]
        );
    }

    #[tokio::test]
    async fn failed_write_aborts_sequence() {
        let mock = MockTransport::new();
        mock.fail_writes(ACTIVITY_UUID);
        let conn = mock.connection(Timeouts::default());
        let clock = payload().timestamp();

        let err = configure(&conn, &payload(), &clock).await.unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::WriteFailed { characteristic, source: TransportError::Backend(_) }
                if characteristic == ACTIVITY_UUID
        ));
        // name and first timestamp stay applied, nothing after the failure
        assert_eq!(mock.writes().len(), 2);
    }

    #[tokio::test]
    async fn disconnected_write() {
        let mock = MockTransport::new();
        let conn = mock.connection(Timeouts::default());
        mock.disconnect();
        let clock = payload().timestamp();

        let err = configure(&conn, &payload(), &clock).await.unwrap_err();
        assert!(err.is_connection_lost());
        assert!(mock.writes().is_empty());
    }

    #[tokio::test]
    async fn stalled_write_times_out() {
        let mock = MockTransport::new();
        mock.stall_writes(PERSON_NAME_UUID);
        let conn = mock.connection(Timeouts {
            operation: Duration::from_millis(50),
            ..Timeouts::default()
        });
        let clock = payload().timestamp();

        let err = configure(&conn, &payload(), &clock).await.unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Timeout { operation: crate::Operation::Write(id), .. }
                if id == PERSON_NAME_UUID
        ));
        assert!(conn.is_connected());
    }

    #[tokio::test]
    async fn reads_back_file_name() {
        let mock = MockTransport::new();
        mock.push_read(CONFIG_FILE_NAME_UUID, b"ada_swim_2024_01_11.bin\0");
        let conn = mock.connection(Timeouts::default());

        assert_eq!(
            read_configured_file_name(&conn).await.unwrap(),
            "ada_swim_2024_01_11.bin"
        );
    }

    #[test]
    fn system_clock_reads_local_time() {
        use chrono::Timelike;

        let before = chrono::Local::now().naive_local().with_nanosecond(0).unwrap();
        let now = SystemClock.now().datetime();
        let after = chrono::Local::now().naive_local();
        assert!(before <= now && now <= after, "{now} not within {before}..{after}");
    }
}
