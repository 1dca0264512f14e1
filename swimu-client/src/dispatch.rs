//! Mode selection from advertised services

use std::fmt;

use swimu_proto::ble::{CONFIG_SERVICE_UUID, FILE_TX_SERVICE_UUID, IMU_SERVICE_UUID};
use uuid::Uuid;

use crate::UnknownServiceError;

/// The three things a SwIMU device can be asked to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Configuration,
    Streaming,
    FileTransfer,
}

impl Mode {
    /// Tie-break order when more than one known service is advertised
    pub const PRIORITY: [Mode; 3] = [Mode::Configuration, Mode::Streaming, Mode::FileTransfer];

    /// Service that selects this mode
    pub fn service_uuid(self) -> Uuid {
        match self {
            Self::Configuration => CONFIG_SERVICE_UUID,
            Self::Streaming => IMU_SERVICE_UUID,
            Self::FileTransfer => FILE_TX_SERVICE_UUID,
        }
    }

    /// Pick the mode for a peripheral advertising `advertised`
    pub fn select(advertised: &[Uuid]) -> Result<Mode, UnknownServiceError> {
        Self::PRIORITY
            .into_iter()
            .find(|mode| advertised.contains(&mode.service_uuid()))
            .ok_or_else(|| UnknownServiceError {
                advertised: advertised.to_vec(),
            })
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Configuration => "configuration",
            Self::Streaming => "streaming",
            Self::FileTransfer => "file transfer",
        })
    }
}
