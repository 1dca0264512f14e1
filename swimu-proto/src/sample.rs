//! IMU sample notifications
//!
//! Payload: `"<elapsed>,<ax>,<ay>,<az>,<gx>,<gy>,<gz>"`, decimal floats.

use std::fmt;
use std::str::FromStr;

/// One decoded sensor reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Device-side elapsed time
    pub elapsed: f64,
    /// Acceleration, x/y/z
    pub accel: [f64; 3],
    /// Angular rate, x/y/z
    pub gyro: [f64; 3],
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("empty payload")]
    Empty,

    #[error("payload is not valid UTF-8")]
    NotUtf8,

    #[error("expected {expected} fields, got {got}")]
    FieldCount { expected: usize, got: usize },

    #[error("field {index} is not a finite number: {token:?}")]
    InvalidNumber { index: usize, token: String },
}

impl Sample {
    pub const FIELDS: usize = 7;

    /// Decode one notification payload
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        if data.is_empty() {
            return Err(DecodeError::Empty);
        }
        let text = std::str::from_utf8(data).map_err(|_| DecodeError::NotUtf8)?;
        text.parse()
    }

    /// Fields in wire order
    pub fn fields(&self) -> [f64; Self::FIELDS] {
        let [ax, ay, az] = self.accel;
        let [gx, gy, gz] = self.gyro;
        [self.elapsed, ax, ay, az, gx, gy, gz]
    }
}

impl FromStr for Sample {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim_end_matches(['\0', '\r', '\n']);
        if s.is_empty() {
            return Err(DecodeError::Empty);
        }

        let tokens: Vec<&str> = s.split(',').collect();
        if tokens.len() != Self::FIELDS {
            return Err(DecodeError::FieldCount {
                expected: Self::FIELDS,
                got: tokens.len(),
            });
        }

        let mut values = [0.0f64; Self::FIELDS];
        for (index, token) in tokens.iter().enumerate() {
            values[index] = token
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| DecodeError::InvalidNumber {
                    index,
                    token: token.to_string(),
                })?;
        }

        let [elapsed, ax, ay, az, gx, gy, gz] = values;
        Ok(Self {
            elapsed,
            accel: [ax, ay, az],
            gyro: [gx, gy, gz],
        })
    }
}

/// Same comma separated layout as the wire format
impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = self.fields();
        for (i, v) in fields.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{v}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn decode_well_formed() {
        let s = Sample::decode(b"12.5,0.01,-0.98,0.12,1.5,-2.25,0").unwrap();
        assert_eq!(s.elapsed, 12.5);
        assert_eq!(s.accel, [0.01, -0.98, 0.12]);
        assert_eq!(s.gyro, [1.5, -2.25, 0.0]);
    }

    #[test]
    fn printed_values_survive_decoding() {
        let values = [
            [0.0, 1.0, -1.0, 0.5, 3.25, -7.125, 100.0],
            [1234.567, 0.1, 0.2, 0.3, -0.0001, 9.81, -9.81],
            [1e-7, 2.5e10, -3.75, 1.0 / 3.0, 2.0f64.sqrt(), -0.7, 42.0],
        ];
        for v in values {
            let line = v.map(|x| x.to_string()).join(",");
            let sample = Sample::decode(line.as_bytes()).unwrap();
            assert_eq!(sample.fields(), v);
            assert_eq!(sample.to_string().parse::<Sample>().unwrap(), sample);
        }
    }

    #[test]
    fn wrong_field_count() {
        assert_eq!(
            Sample::decode(b"1,2,3,4,5,6"),
            Err(DecodeError::FieldCount { expected: 7, got: 6 })
        );
        assert_eq!(
            Sample::decode(b"1,2,3,4,5,6,7,8"),
            Err(DecodeError::FieldCount { expected: 7, got: 8 })
        );
    }

    #[test]
    fn non_numeric_tokens() {
        assert_eq!(
            Sample::decode(b"1,2,x,4,5,6,7"),
            Err(DecodeError::InvalidNumber {
                index: 2,
                token: "x".to_string()
            })
        );
        assert!(matches!(
            Sample::decode(b"1,2,3,4,5,6,"),
            Err(DecodeError::InvalidNumber { index: 6, .. })
        ));
        assert!(matches!(
            Sample::decode(b"1,2,3,NaN,5,6,7"),
            Err(DecodeError::InvalidNumber { index: 3, .. })
        ));
        assert!(matches!(
            Sample::decode(b"1, 2,3,4,5,6,7"),
            Err(DecodeError::InvalidNumber { index: 1, .. })
        ));
    }

    #[test]
    fn empty_and_garbage() {
        assert_eq!(Sample::decode(b""), Err(DecodeError::Empty));
        assert_eq!(Sample::decode(b"\0"), Err(DecodeError::Empty));
        assert_eq!(Sample::decode(&[0xff, 0xfe]), Err(DecodeError::NotUtf8));
    }

    #[test]
    fn trailing_line_ending_is_tolerated() {
        let s = Sample::decode(b"1,2,3,4,5,6,7\r\n").unwrap();
        assert_eq!(s.gyro[2], 7.0);
    }

    proptest! {
        /// Any seven finite values, printed and comma joined, decode to
        /// exactly those values
        #[test]
        fn printed_fields_decode_to_themselves(
            values in prop::array::uniform7(
                prop::num::f64::NORMAL | prop::num::f64::SUBNORMAL | prop::num::f64::ZERO
            ),
        ) {
            let line = values.map(|v| v.to_string()).join(",");
            let sample = Sample::decode(line.as_bytes()).unwrap();
            prop_assert_eq!(sample.fields(), values);
            prop_assert_eq!(sample.to_string(), line);
        }

        /// Short or long lines never decode
        #[test]
        fn other_field_counts_are_rejected(count in (1usize..16).prop_filter("seven is valid", |n| *n != 7)) {
            let line = vec!["1.5"; count].join(",");
            prop_assert_eq!(
                Sample::decode(line.as_bytes()),
                Err(DecodeError::FieldCount { expected: 7, got: count })
            );
        }
    }
}
