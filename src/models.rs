//! Inventory data models
//!
//! Read-only view of the network inventory: devices, their interfaces,
//! cables between them, VLANs and the prefixes attached to VLANs.

use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// A managed network device
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Device {
    pub id: i64,
    pub name: String,
    /// Site slug
    pub site: String,
    /// Device role slug (e.g. "access-switch", "router")
    pub role: String,
    #[serde(default = "default_status")]
    pub status: String,
    /// Platform driver, used as the "supports the required MIBs" capability
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_driver: Option<String>,
    /// Primary IPv4 address with prefix length (e.g. "10.0.0.2/24")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_ip4: Option<Ipv4Network>,
}

fn default_status() -> String {
    crate::config::ACTIVE_STATUS.to_string()
}

impl Device {
    /// Management address, if the device has one
    pub fn management_address(&self) -> Option<Ipv4Addr> {
        self.primary_ip4
            .map(|network| network.ip())
            .filter(|ip| !ip.is_unspecified())
    }
}

/// An interface of exactly one device
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Interface {
    pub id: i64,
    pub device_id: i64,
    /// Canonical interface name (e.g. "GigabitEthernet1/0/1")
    pub name: String,
    /// MACs learned on this interface are never attributed to it (uplinks)
    #[serde(default)]
    pub ignore_mac: bool,
}

/// One end of a cable
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CableEnd {
    pub device: String,
    pub interface: String,
}

/// A cable connecting two device interfaces
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cable {
    pub a: CableEnd,
    pub b: CableEnd,
}

/// A VLAN scoped to one site
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Vlan {
    pub id: i64,
    pub vid: u16,
    #[serde(default)]
    pub name: String,
    pub site: String,
    /// Opt-in flag: collect MAC/port history in this VLAN
    #[serde(default)]
    pub flag_porthistory: bool,
}

/// An IPv4 prefix, optionally attached to a VLAN
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Prefix {
    pub prefix: Ipv4Network,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan_id: Option<i64>,
}

/// Full inventory document as exported from the directory
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InventoryDocument {
    #[serde(default)]
    pub devices: Vec<Device>,
    #[serde(default)]
    pub interfaces: Vec<Interface>,
    #[serde(default)]
    pub cables: Vec<Cable>,
    #[serde(default)]
    pub vlans: Vec<Vlan>,
    #[serde(default)]
    pub prefixes: Vec<Prefix>,
}

/// The principal invoking a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub name: String,
    pub is_superuser: bool,
}

impl Principal {
    pub fn new(name: impl Into<String>, is_superuser: bool) -> Self {
        Self {
            name: name.into(),
            is_superuser,
        }
    }

    /// Principal described by `PORTHISTORY_PRINCIPAL` / `PORTHISTORY_SUPERUSER`
    pub fn from_env() -> Self {
        Self::new(crate::config::principal_name(), crate::config::superuser())
    }
}
