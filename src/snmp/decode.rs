//! MIB table decoding
//!
//! Turns raw walk rows into typed maps. A row that cannot be decoded is
//! dropped with a debug log; the rest of the table is still used.

use std::collections::{BTreeMap, HashMap};
use std::net::Ipv4Addr;

use super::oids::{
    OID_AT_PHYS_ADDRESS, OID_BASE_PORT_IF_INDEX, OID_ENGINE_TIME, OID_IF_NAME,
    OID_LOC_IF_LAST_OUT, OID_TP_FDB_PORT, format_oid,
};
use super::transport::VarBind;
use crate::network::{MacAddress, canonical_interface_name};

pub type IfIndex = u32;
pub type BridgePort = u32;

fn skip(row: &VarBind, reason: &str) {
    crate::log_debug!("Skipping {}: {}", format_oid(&row.oid), reason);
}

/// Single trailing arc of a row below `root`
fn trailing_index(row: &VarBind, root: &[u64]) -> Option<u32> {
    match row.index(root)? {
        [index] => u32::try_from(*index).ok(),
        _ => None,
    }
}

/// Seconds since boot (snmpEngineTime). First usable row wins.
pub fn decode_uptime(rows: &[VarBind]) -> Option<u64> {
    rows.iter().find_map(|row| {
        let uptime = row
            .index(OID_ENGINE_TIME)
            .and_then(|_| row.value.as_i64())
            .and_then(|secs| u64::try_from(secs).ok());
        if uptime.is_none() {
            skip(row, "not a non-negative integer");
        }
        uptime
    })
}

/// ifIndex -> canonical interface name
pub fn decode_if_names(rows: &[VarBind]) -> HashMap<IfIndex, String> {
    let mut names = HashMap::with_capacity(rows.len());
    for row in rows {
        let Some(if_index) = trailing_index(row, OID_IF_NAME) else {
            skip(row, "bad ifIndex");
            continue;
        };
        let Some(raw) = row.value.as_bytes() else {
            skip(row, "ifName is not an octet string");
            continue;
        };
        let Ok(name) = std::str::from_utf8(raw) else {
            skip(row, "ifName is not UTF-8");
            continue;
        };
        names.insert(if_index, canonical_interface_name(name.trim()));
    }
    names
}

/// ifIndex -> raw time since last output (hundredths of a second,
/// negative when unknown)
pub fn decode_last_output(rows: &[VarBind]) -> HashMap<IfIndex, i64> {
    let mut elapsed = HashMap::with_capacity(rows.len());
    for row in rows {
        match (trailing_index(row, OID_LOC_IF_LAST_OUT), row.value.as_i64()) {
            (Some(if_index), Some(value)) => {
                elapsed.insert(if_index, value);
            }
            _ => skip(row, "bad locIfLastOut row"),
        }
    }
    elapsed
}

/// bridge port -> ifIndex
pub fn decode_bridge_ports(rows: &[VarBind]) -> HashMap<BridgePort, IfIndex> {
    let mut ports = HashMap::with_capacity(rows.len());
    for row in rows {
        let if_index = row.value.as_i64().and_then(|v| IfIndex::try_from(v).ok());
        match (trailing_index(row, OID_BASE_PORT_IF_INDEX), if_index) {
            (Some(port), Some(if_index)) => {
                ports.insert(port, if_index);
            }
            _ => skip(row, "bad dot1dBasePortIfIndex row"),
        }
    }
    ports
}

/// MAC -> bridge port, from the MAC encoded as six decimal OID arcs
pub fn decode_forwarding_table(rows: &[VarBind]) -> BTreeMap<MacAddress, BridgePort> {
    let mut fdb = BTreeMap::new();
    for row in rows {
        let mac = row
            .index(OID_TP_FDB_PORT)
            .and_then(MacAddress::from_oid_suffix);
        let port = row.value.as_i64().and_then(|v| BridgePort::try_from(v).ok());
        match (mac, port) {
            // Port 0 means the entry was learned but not on a bridge port.
            (Some(mac), Some(port)) if port > 0 => {
                fdb.insert(mac, port);
            }
            _ => skip(row, "bad dot1dTpFdbPort row"),
        }
    }
    fdb
}

/// (IPv4, MAC) pairs from the ARP table; the address is the last four arcs
pub fn decode_arp_table(rows: &[VarBind]) -> Vec<(Ipv4Addr, MacAddress)> {
    let mut entries = Vec::with_capacity(rows.len());
    for row in rows {
        let address = row
            .index(OID_AT_PHYS_ADDRESS)
            .filter(|index| index.len() >= 4)
            .and_then(|index| ipv4_from_arcs(&index[index.len() - 4..]));
        let mac = row.value.as_bytes().and_then(MacAddress::from_bytes);
        match (address, mac) {
            (Some(address), Some(mac)) => entries.push((address, mac)),
            _ => skip(row, "bad atPhysAddress row"),
        }
    }
    entries
}

fn ipv4_from_arcs(arcs: &[u64]) -> Option<Ipv4Addr> {
    let mut octets = [0u8; 4];
    for (slot, arc) in octets.iter_mut().zip(arcs) {
        *slot = u8::try_from(*arc).ok()?;
    }
    Some(Ipv4Addr::from(octets))
}
