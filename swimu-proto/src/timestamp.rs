//! Reference timestamps written during configuration

use std::fmt;

use chrono::{Local, NaiveDateTime};

/// Local wall clock time as the device expects it: `YYYY_MM_DD_HH_MM_SS`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(NaiveDateTime);

impl Timestamp {
    /// strftime pattern of the wire form
    pub const FORMAT: &'static str = "%Y_%m_%d_%H_%M_%S";

    /// Current local time
    pub fn now() -> Self {
        Self(Local::now().naive_local())
    }

    /// Parse the wire form
    pub fn parse(s: &str) -> Result<Self, chrono::ParseError> {
        NaiveDateTime::parse_from_str(s, Self::FORMAT).map(Self)
    }

    pub fn datetime(&self) -> NaiveDateTime {
        self.0
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl From<NaiveDateTime> for Timestamp {
    fn from(dt: NaiveDateTime) -> Self {
        Self(dt)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(Self::FORMAT))
    }
}
