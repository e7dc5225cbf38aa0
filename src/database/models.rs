//! Database models
//!
//! Structs for stored job results with serialization support

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

use crate::network::MacAddress;

/// Stored unused-port record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnusedPortRecord {
    pub id: i64,
    pub interface_id: i64,
    pub interface_name: String,
    pub device_id: i64,
    pub device_name: String,
    pub last_output: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl UnusedPortRecord {
    /// Whole days between the last output and the last evaluation
    pub fn idle_days(&self) -> i64 {
        (self.updated - self.last_output).num_days()
    }
}

/// Fields of an unused-port record before it is stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUnusedPort<'a> {
    pub interface_id: i64,
    pub interface_name: &'a str,
    pub device_id: i64,
    pub device_name: &'a str,
    pub last_output: DateTime<Utc>,
}

/// How an address record came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Assignment {
    Static,
    Dynamic,
}

impl std::fmt::Display for Assignment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Assignment::Static => write!(f, "static"),
            Assignment::Dynamic => write!(f, "dynamic"),
        }
    }
}

impl std::str::FromStr for Assignment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "static" => Ok(Assignment::Static),
            "dynamic" => Ok(Assignment::Dynamic),
            _ => Err(format!("Unknown assignment: {}", s)),
        }
    }
}

/// Stored address record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpAddressRecord {
    pub id: i64,
    pub address: Ipv4Addr,
    pub prefix_length: u8,
    pub assignment: Assignment,
    pub dns_name: String,
    pub updated: DateTime<Utc>,
}

/// Stored MAC-on-port record, joined with its address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacOnPortRecord {
    pub id: i64,
    pub vlan_id: i64,
    pub vid: u16,
    pub site: String,
    pub mac: MacAddress,
    pub interface_id: i64,
    pub interface_name: String,
    pub device_id: i64,
    pub device_name: String,
    pub ip_address_id: Option<i64>,
    /// Address of `ip_address_id`, if any
    pub ip_address: Option<Ipv4Addr>,
    pub dns_name: Option<String>,
    pub updated: DateTime<Utc>,
}

/// Fields of a MAC-on-port record as observed in one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacObservation<'a> {
    pub vlan_id: i64,
    pub vid: u16,
    pub site: &'a str,
    pub mac: MacAddress,
    pub interface_id: i64,
    pub interface_name: &'a str,
    pub device_id: i64,
    pub device_name: &'a str,
    pub ip_address_id: Option<i64>,
}

/// Search criteria over stored MAC-on-port records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MacSearch {
    /// Free-text MAC fragment; separators and case are ignored
    pub query: Option<String>,
    pub site: Option<String>,
    pub device: Option<String>,
    pub vid: Option<u16>,
}
