//! Live IMU streaming driver
//!
//! `start` subscribes to the sample characteristic before writing `START`,
//! so no sample sent right after the command is missed. Samples go straight
//! to the caller; nothing is buffered here. Bad payloads are counted,
//! logged and dropped.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use swimu_proto::ble::{IMU_DATA_UUID, IMU_REQUEST_UUID};
use swimu_proto::{Command, Sample};
use tracing::{info, warn};

use crate::{AttributeTransport, ConnectionHandle, NotificationHandler, ProtocolError, TransportError};

#[derive(Debug, Default)]
struct Counters {
    samples: AtomicU64,
    dropped: AtomicU64,
}

/// Live view of a running stream
#[derive(Debug, Clone)]
pub struct StreamMonitor {
    counters: Arc<Counters>,
    started: Instant,
}

impl StreamMonitor {
    /// Counters so far
    pub fn stats(&self) -> StreamStats {
        StreamStats {
            samples: self.counters.samples.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            elapsed: self.started.elapsed(),
        }
    }
}

/// Packet counts for one stream
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StreamStats {
    pub samples: u64,
    pub dropped: u64,
    pub elapsed: Duration,
}

impl StreamStats {
    /// Realised sample rate
    pub fn rate_hz(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 { self.samples as f64 / secs } else { 0.0 }
    }
}

/// Subscribe to samples and ask the device to start sending them
pub async fn start<T, F>(
    conn: &ConnectionHandle<T>,
    on_sample: F,
) -> Result<StreamMonitor, ProtocolError>
where
    T: AttributeTransport,
    F: Fn(Sample) + Send + Sync + 'static,
{
    let counters = Arc::new(Counters::default());
    let handler: NotificationHandler = {
        let counters = Arc::clone(&counters);
        Arc::new(move |data: &[u8]| match Sample::decode(data) {
            Ok(sample) => {
                counters.samples.fetch_add(1, Ordering::Relaxed);
                on_sample(sample);
            }
            Err(error) => {
                counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(%error, len = data.len(), "dropping sample notification");
            }
        })
    };

    conn.subscribe(IMU_DATA_UUID, handler).await?;
    if let Err(e) = conn.command(IMU_REQUEST_UUID, Command::Start).await {
        // the handler must not outlive a stream that never started
        if let Err(cleanup) = conn.unsubscribe(IMU_DATA_UUID).await {
            warn!(error = %cleanup, "unsubscribe after failed start");
        }
        return Err(e);
    }
    info!("sample stream started");

    Ok(StreamMonitor {
        counters,
        started: Instant::now(),
    })
}

/// Ask the device to stop and drop the subscription
pub async fn stop<T: AttributeTransport>(conn: &ConnectionHandle<T>) -> Result<(), ProtocolError> {
    conn.command(IMU_REQUEST_UUID, Command::End).await?;
    conn.unsubscribe(IMU_DATA_UUID).await?;
    info!("sample stream stopped");
    Ok(())
}

/// Streaming mode, as handed out by [`crate::Session::dispatch`]
pub struct StreamingDriver<'a, T> {
    conn: &'a ConnectionHandle<T>,
    monitor: Option<StreamMonitor>,
}

impl<'a, T: AttributeTransport> StreamingDriver<'a, T> {
    pub(crate) fn new(conn: &'a ConnectionHandle<T>) -> Self {
        Self {
            conn,
            monitor: None,
        }
    }

    /// A stream started by this driver is running
    pub fn is_streaming(&self) -> bool {
        self.monitor.is_some()
    }

    pub fn stats(&self) -> Option<StreamStats> {
        self.monitor.as_ref().map(StreamMonitor::stats)
    }

    /// Start streaming, see [`start`]
    pub async fn start<F>(&mut self, on_sample: F) -> Result<(), ProtocolError>
    where
        F: Fn(Sample) + Send + Sync + 'static,
    {
        if self.monitor.is_some() {
            return Err(ProtocolError::AlreadyStreaming);
        }
        self.monitor = Some(start(self.conn, on_sample).await?);
        Ok(())
    }

    /// Stop the stream. Sends `END` even if this driver never started one,
    /// in which case the returned stats are empty.
    pub async fn stop(&mut self) -> Result<StreamStats, ProtocolError> {
        let stats = self
            .monitor
            .take()
            .map(|m| m.stats())
            .unwrap_or_default();
        stop(self.conn).await?;
        info!(
            samples = stats.samples,
            dropped = stats.dropped,
            rate_hz = stats.rate_hz(),
            "stream summary"
        );
        Ok(stats)
    }

    /// Stream until `shutdown` resolves, then stop. Connection loss ends the
    /// stream with an error.
    pub async fn run_until<F, S>(
        mut self,
        on_sample: F,
        shutdown: S,
    ) -> Result<StreamStats, ProtocolError>
    where
        F: Fn(Sample) + Send + Sync + 'static,
        S: Future<Output = ()>,
    {
        self.start(on_sample).await?;
        tokio::select! {
            _ = shutdown => {}
            _ = self.conn.closed() => return Err(TransportError::Disconnected.into()),
        }
        self.stop().await
    }
}
