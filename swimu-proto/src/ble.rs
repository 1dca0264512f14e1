//! BLE GATT Service Protocol Constants for SwIMU devices
//!
//! The device advertises exactly one of three services at a time. The
//! advertised service decides which mode the client runs.

use uuid::Uuid;

/// Advertised name fragment of SwIMU peripherals
pub const TARGET_DEVICE_NAME: &str = "SwIMU";

/// Configuration service: 550e8400-e29b-41d4-a716-446655440000
pub const CONFIG_SERVICE_UUID: Uuid = Uuid::from_u128(0x550e8400_e29b_41d4_a716_446655440000);

/// Timestamp characteristic (write), `YYYY_MM_DD_HH_MM_SS`
pub const DATETIME_UUID: Uuid = Uuid::from_u128(0x550e8401_e29b_41d4_a716_446655440001);

/// Person name characteristic (write)
pub const PERSON_NAME_UUID: Uuid = Uuid::from_u128(0x550e8401_e29b_41d4_a716_446655440002);

/// Activity label characteristic (write)
pub const ACTIVITY_UUID: Uuid = Uuid::from_u128(0x550e8401_e29b_41d4_a716_446655440003);

/// Name of the file the device will record into (read)
pub const CONFIG_FILE_NAME_UUID: Uuid = Uuid::from_u128(0x550e8401_e29b_41d4_a716_446655440004);

/// Live IMU streaming service: 550e8402-e29b-41d4-a716-446655440000
pub const IMU_SERVICE_UUID: Uuid = Uuid::from_u128(0x550e8402_e29b_41d4_a716_446655440000);

/// Stream request characteristic (write `START` / `END`)
pub const IMU_REQUEST_UUID: Uuid = Uuid::from_u128(0x550e8403_e29b_41d4_a716_446655440001);

/// Sample characteristic (notify)
pub const IMU_DATA_UUID: Uuid = Uuid::from_u128(0x550e8403_e29b_41d4_a716_446655440002);

/// File transfer service: 550e8404-e29b-41d4-a716-446655440000
pub const FILE_TX_SERVICE_UUID: Uuid = Uuid::from_u128(0x550e8404_e29b_41d4_a716_446655440000);

/// Transfer request characteristic (write commands, read status)
pub const FILE_TX_REQUEST_UUID: Uuid = Uuid::from_u128(0x550e8405_e29b_41d4_a716_446655440001);

/// File data characteristic (notify, raw bytes)
pub const FILE_TX_DATA_UUID: Uuid = Uuid::from_u128(0x550e8405_e29b_41d4_a716_446655440002);

/// Transfer complete characteristic (notify `TRANSFER_COMPLETE`)
pub const FILE_TX_COMPLETE_UUID: Uuid = Uuid::from_u128(0x550e8405_e29b_41d4_a716_446655440003);

/// File name characteristic (read the name, write `ACK`)
pub const FILE_TX_NAME_UUID: Uuid = Uuid::from_u128(0x550e8405_e29b_41d4_a716_446655440004);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuids_match_firmware_strings() {
        assert_eq!(
            CONFIG_SERVICE_UUID.to_string(),
            "550e8400-e29b-41d4-a716-446655440000"
        );
        assert_eq!(
            FILE_TX_NAME_UUID.to_string(),
            "550e8405-e29b-41d4-a716-446655440004"
        );
        assert_eq!(
            IMU_DATA_UUID.to_string(),
            "550e8403-e29b-41d4-a716-446655440002"
        );
    }
}
