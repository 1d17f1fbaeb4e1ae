//! Datapath identifier type.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// OpenFlow datapath identifier.
///
/// A 64-bit value assigned to each switch, conventionally rendered as
/// sixteen hex digits separated into colon-delimited octet pairs
/// (`00:00:00:00:00:00:00:01`). The lower 48 bits are usually the
/// switch MAC address; the upper 16 are implementer-defined.
///
/// # Examples
///
/// ```
/// use flowsync_types::DatapathId;
///
/// let dpid: DatapathId = "00:00:00:00:00:00:00:2a".parse().unwrap();
/// assert_eq!(dpid.as_u64(), 42);
/// assert_eq!(dpid.to_string(), "00:00:00:00:00:00:00:2a");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct DatapathId(u64);

impl DatapathId {
    /// Creates a datapath id from its raw 64-bit value.
    pub const fn new(raw: u64) -> Self {
        DatapathId(raw)
    }

    /// Returns the raw 64-bit value.
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for DatapathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0.to_be_bytes();
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]
        )
    }
}

impl FromStr for DatapathId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Accept both colon-separated octets and a bare hex string.
        let hex: String = s.chars().filter(|c| *c != ':').collect();
        if hex.is_empty() || hex.len() > 16 {
            return Err(ParseError::InvalidDatapathId(s.to_string()));
        }
        let raw = u64::from_str_radix(&hex, 16)
            .map_err(|_| ParseError::InvalidDatapathId(s.to_string()))?;
        Ok(DatapathId(raw))
    }
}

impl From<DatapathId> for String {
    fn from(dpid: DatapathId) -> String {
        dpid.to_string()
    }
}

impl TryFrom<String> for DatapathId {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<u64> for DatapathId {
    fn from(raw: u64) -> Self {
        DatapathId(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_display_round_trip() {
        let dpid = DatapathId::new(0x0000_0000_0000_002a);
        let parsed: DatapathId = dpid.to_string().parse().unwrap();
        assert_eq!(dpid, parsed);
    }

    #[test]
    fn test_parse_bare_hex() {
        let dpid: DatapathId = "2a".parse().unwrap();
        assert_eq!(dpid.as_u64(), 42);
    }

    #[test]
    fn test_parse_invalid() {
        assert!("".parse::<DatapathId>().is_err());
        assert!("zz".parse::<DatapathId>().is_err());
        assert!("00:00:00:00:00:00:00:00:00".parse::<DatapathId>().is_err());
    }

    #[test]
    fn test_ordering() {
        assert!(DatapathId::new(1) < DatapathId::new(2));
    }

    #[test]
    fn test_serde_as_string() {
        let dpid = DatapathId::new(42);
        let json = serde_json::to_string(&dpid).unwrap();
        assert_eq!(json, "\"00:00:00:00:00:00:00:2a\"");
        let back: DatapathId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, dpid);
    }
}
