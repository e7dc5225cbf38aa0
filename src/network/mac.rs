//! MAC address value type
//!
//! Rendered as twelve uppercase hex digits without separators
//! (`00163ABBCDEF`), the form stored in the MAC-on-port table.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// From a raw six-byte octet string (ARP `atPhysAddress` values)
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let octets: [u8; 6] = bytes.try_into().ok()?;
        Some(Self(octets))
    }

    /// From an OID suffix of six decimal octets (`dot1dTpFdbPort` index)
    pub fn from_oid_suffix(arcs: &[u64]) -> Option<Self> {
        if arcs.len() != 6 {
            return None;
        }
        let mut octets = [0u8; 6];
        for (slot, arc) in octets.iter_mut().zip(arcs) {
            *slot = u8::try_from(*arc).ok()?;
        }
        Some(Self(octets))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for octet in self.0 {
            write!(f, "{:02X}", octet)?;
        }
        Ok(())
    }
}

impl FromStr for MacAddress {
    type Err = String;

    /// Accepts any separator style (`00:16:3a:..`, `0016.3abb.cdef`, bare hex)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = normalize_mac_query(s);
        if hex.len() != 12 {
            return Err(format!("Invalid MAC address: {}", s));
        }
        let mut octets = [0u8; 6];
        for (i, slot) in octets.iter_mut().enumerate() {
            *slot = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                .map_err(|_| format!("Invalid MAC address: {}", s))?;
        }
        Ok(Self(octets))
    }
}

impl TryFrom<String> for MacAddress {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.to_string()
    }
}

/// Reduce a free-text MAC search to the stored form: alphanumerics only,
/// uppercased. Partial input stays partial.
pub fn normalize_mac_query(query: &str) -> String {
    query
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}
