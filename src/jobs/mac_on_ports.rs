//! MAC / VLAN / ARP correlation
//!
//! Which MAC sits behind which switch port, in which VLAN, with which
//! address. Waves, in order:
//!
//! 1. interface names on every switch (unscoped community)
//! 2. ARP tables on every router (unscoped community)
//! 3. per flagged VLAN: bridge port to ifIndex, then the forwarding table,
//!    both with the VLAN-scoped community
//!
//! Observations from all VLANs are gathered first and then reconciled
//! device by device.

use anyhow::Result;
use chrono::{DateTime, Utc};
use ipnetwork::Ipv4Network;
use rusqlite::Connection;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::Ipv4Addr;

use super::{RunContext, authorize, poll_wave, rows, stored};
use crate::database::queries;
use crate::database::{MacObservation, MacOnPortRecord};
use crate::inventory::{
    DeviceFilter, DeviceSnapshot, TargetDevice, VlanScope, build_vlan_scopes, trunk_interfaces,
};
use crate::models::{CableEnd, Interface, Principal};
use crate::network::{MacAddress, dns_scan};
use crate::report::{DeviceBlock, RunReport};
use crate::snmp::decode::{
    IfIndex, decode_arp_table, decode_bridge_ports, decode_forwarding_table, decode_if_names,
};
use crate::snmp::oids::{OID_AT_PHYS_ADDRESS, OID_BASE_PORT_IF_INDEX, OID_IF_NAME, OID_TP_FDB_PORT};

pub const JOB_NAME: &str = "mac-on-ports";

/// MAC -> addresses seen for it, per site
type ArpBySite = HashMap<String, HashMap<MacAddress, Vec<Ipv4Addr>>>;

/// One MAC seen behind one access port in one VLAN
#[derive(Debug, Clone)]
struct Sighting<'a> {
    scope: &'a VlanScope,
    interface: &'a Interface,
    mac: MacAddress,
}

/// An address resolved for a sighting: the address and the VLAN prefix
/// it matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Resolved {
    address: Ipv4Addr,
    prefix: Ipv4Network,
}

/// Run the MAC-on-port job. Returns `None` when the principal is refused.
pub async fn run_mac_on_ports(
    ctx: &RunContext,
    principal: &Principal,
    site: Option<&str>,
) -> Result<Option<RunReport>> {
    if !authorize(principal, JOB_NAME) {
        return Ok(None);
    }

    let settings = &ctx.settings;
    let inventory = ctx.inventory.as_ref();
    let trunks = trunk_interfaces(inventory, site, &settings.switch_roles)?;
    let switches = DeviceSnapshot::build(
        inventory,
        &DeviceFilter::active(site, &settings.switch_roles),
        &settings.platform_driver,
    )?;
    let routers = DeviceSnapshot::build(
        inventory,
        &DeviceFilter::active(site, &settings.router_roles),
        &settings.platform_driver,
    )?;
    let mut report = RunReport::new(JOB_NAME, ctx.now);

    crate::log_stderr!(
        "{} run by {}: {} switches, {} routers, {} trunk ends{}",
        JOB_NAME,
        principal.name,
        switches.len(),
        routers.len(),
        trunks.len(),
        site.map(|s| format!(" in site {}", s)).unwrap_or_default()
    );

    let if_names = poll_if_names(ctx, &switches, &mut report).await;
    let polled: HashSet<Ipv4Addr> = if_names.keys().copied().collect();
    let scopes = build_vlan_scopes(inventory, site, &switches, &polled)?;
    crate::log_stderr!("{} flagged VLANs with polled switches", scopes.len());

    let arp = poll_arp(ctx, &routers, &mut report).await;

    let mut sightings: BTreeMap<Ipv4Addr, Vec<Sighting<'_>>> = BTreeMap::new();
    for scope in &scopes {
        poll_vlan(ctx, scope, &switches, &if_names, &trunks, &mut sightings).await;
    }
    let sightings = dedupe(sightings);

    let resolved = resolve_addresses(&sightings, &switches, &arp);
    let unique: Vec<Ipv4Addr> = {
        let mut addresses: Vec<Ipv4Addr> = resolved.values().map(|r| r.address).collect();
        addresses.sort();
        addresses.dedup();
        addresses
    };
    let hostnames = dns_scan(&ctx.resolver, &unique).await;

    let observed: HashSet<(i64, MacAddress)> = sightings
        .values()
        .flatten()
        .map(|s| (s.scope.vlan.id, s.mac))
        .collect();

    match ctx.db.lock() {
        Ok(conn) => {
            let address_ids = upsert_addresses(&conn, ctx.now, &resolved, &hostnames);
            for (address, found) in &sightings {
                let Some(target) = switches.get(address) else {
                    continue;
                };
                let block = report.device(&target.device.name);
                reconcile_device(
                    &conn,
                    ctx.now,
                    target,
                    found,
                    &resolved,
                    &address_ids,
                    &observed,
                    block,
                );
            }
        }
        Err(e) => crate::log_error!("Skipping store update: {:#}", e),
    }

    let totals = report.totals();
    crate::log_stderr!(
        "{} finished: {} MACs, {} created, {} updated, {} deleted, {} moved port, {} moved ip",
        JOB_NAME,
        observed.len(),
        totals.created,
        totals.updated,
        totals.deleted,
        totals.moved_port,
        totals.moved_ip
    );

    Ok(Some(report))
}

/// Interface-name wave over all switches. Only switches that answer take
/// part in VLAN polling.
async fn poll_if_names(
    ctx: &RunContext,
    switches: &DeviceSnapshot,
    report: &mut RunReport,
) -> HashMap<Ipv4Addr, HashMap<IfIndex, String>> {
    let mut names = HashMap::new();
    let wave = poll_wave(&ctx.poller, &switches.addresses(), &ctx.settings.community, OID_IF_NAME).await;
    for (address, outcome) in wave {
        let Some(target) = switches.get(&address) else {
            continue;
        };
        match outcome {
            Ok(tables) => {
                names.insert(address, decode_if_names(rows(&tables, OID_IF_NAME)));
            }
            Err(e) => {
                crate::log_warn!("{} ({}): interface name poll failed: {}", target.device.name, address, e);
                report.skip(&target.device.name, e);
            }
        }
    }
    names
}

/// ARP wave over all routers, merged per site
async fn poll_arp(ctx: &RunContext, routers: &DeviceSnapshot, report: &mut RunReport) -> ArpBySite {
    let mut arp: ArpBySite = HashMap::new();
    let wave = poll_wave(&ctx.poller, &routers.addresses(), &ctx.settings.community, OID_AT_PHYS_ADDRESS).await;
    for (address, outcome) in wave {
        let Some(target) = routers.get(&address) else {
            continue;
        };
        match outcome {
            Ok(tables) => {
                let site = arp.entry(target.device.site.clone()).or_default();
                for (ip, mac) in decode_arp_table(rows(&tables, OID_AT_PHYS_ADDRESS)) {
                    let addresses = site.entry(mac).or_default();
                    if !addresses.contains(&ip) {
                        addresses.push(ip);
                    }
                }
            }
            Err(e) => {
                crate::log_warn!("{} ({}): ARP poll failed: {}", target.device.name, address, e);
                report.skip(&target.device.name, e);
            }
        }
    }
    arp
}

/// Bridge and forwarding waves for one VLAN, joined down to access ports
async fn poll_vlan<'a>(
    ctx: &RunContext,
    scope: &'a VlanScope,
    switches: &'a DeviceSnapshot,
    if_names: &HashMap<Ipv4Addr, HashMap<IfIndex, String>>,
    trunks: &HashSet<CableEnd>,
    sightings: &mut BTreeMap<Ipv4Addr, Vec<Sighting<'a>>>,
) {
    let vid = scope.vlan.vid;
    let community = ctx.settings.vlan_community(vid);

    let mut bridges = HashMap::new();
    for (address, outcome) in poll_wave(&ctx.poller, &scope.switches, &community, OID_BASE_PORT_IF_INDEX).await {
        match outcome {
            Ok(tables) => {
                let ports = decode_bridge_ports(rows(&tables, OID_BASE_PORT_IF_INDEX));
                if ports.is_empty() {
                    crate::log_debug!("VLAN {} not present on {}", vid, address);
                } else {
                    bridges.insert(address, ports);
                }
            }
            Err(e) => crate::log_warn!("VLAN {} bridge poll failed on {}: {}", vid, address, e),
        }
    }

    let hosts: Vec<Ipv4Addr> = scope
        .switches
        .iter()
        .copied()
        .filter(|address| bridges.contains_key(address))
        .collect();

    for (address, outcome) in poll_wave(&ctx.poller, &hosts, &community, OID_TP_FDB_PORT).await {
        let tables = match outcome {
            Ok(tables) => tables,
            Err(e) => {
                crate::log_warn!("VLAN {} forwarding table poll failed on {}: {}", vid, address, e);
                continue;
            }
        };
        let (Some(target), Some(bridge), Some(names)) =
            (switches.get(&address), bridges.get(&address), if_names.get(&address))
        else {
            continue;
        };

        let found = sightings.entry(address).or_default();
        for (mac, port) in decode_forwarding_table(rows(&tables, OID_TP_FDB_PORT)) {
            let Some(interface) = bridge
                .get(&port)
                .and_then(|if_index| names.get(if_index))
                .and_then(|name| attributable(target, name, trunks))
            else {
                continue;
            };
            found.push(Sighting {
                scope,
                interface,
                mac,
            });
        }
    }
}

/// The inventory interface a MAC may be attributed to: known, not a trunk
/// end and not flagged to ignore MACs
fn attributable<'a>(
    target: &'a TargetDevice,
    name: &str,
    trunks: &HashSet<CableEnd>,
) -> Option<&'a Interface> {
    let interface = target.interface(name)?;
    if interface.ignore_mac {
        return None;
    }
    let end = CableEnd {
        device: target.device.name.clone(),
        interface: interface.name.clone(),
    };
    if trunks.contains(&end) {
        return None;
    }
    Some(interface)
}

/// Keep the first sighting of each (VLAN, MAC) in device order
fn dedupe(sightings: BTreeMap<Ipv4Addr, Vec<Sighting<'_>>>) -> BTreeMap<Ipv4Addr, Vec<Sighting<'_>>> {
    let mut seen = HashSet::new();
    sightings
        .into_iter()
        .map(|(address, found)| {
            let found: Vec<Sighting<'_>> = found
                .into_iter()
                .filter(|s| {
                    let first = seen.insert((s.scope.vlan.id, s.mac));
                    if !first {
                        crate::log_debug!(
                            "{} in VLAN {} also seen on {} ({}), keeping the first port",
                            s.mac,
                            s.scope.vlan.vid,
                            s.interface.name,
                            address
                        );
                    }
                    first
                })
                .collect();
            (address, found)
        })
        .collect()
}

/// First (address, prefix) pair where a candidate address of the MAC in the
/// device's site falls inside one of the VLAN's prefixes
fn resolve_address(candidates: &[Ipv4Addr], prefixes: &[Ipv4Network]) -> Option<Resolved> {
    candidates.iter().find_map(|&address| {
        prefixes
            .iter()
            .find(|prefix| prefix.contains(address))
            .map(|&prefix| Resolved { address, prefix })
    })
}

fn resolve_addresses(
    sightings: &BTreeMap<Ipv4Addr, Vec<Sighting<'_>>>,
    switches: &DeviceSnapshot,
    arp: &ArpBySite,
) -> HashMap<(i64, MacAddress), Resolved> {
    let mut resolved = HashMap::new();
    for (address, found) in sightings {
        let Some(site_arp) = switches
            .get(address)
            .and_then(|target| arp.get(&target.device.site))
        else {
            continue;
        };
        for sighting in found {
            let Some(candidates) = site_arp.get(&sighting.mac) else {
                continue;
            };
            if let Some(hit) = resolve_address(candidates, &sighting.scope.prefixes) {
                resolved.insert((sighting.scope.vlan.id, sighting.mac), hit);
            }
        }
    }
    resolved
}

/// Create or refresh the address records; returns their ids by address
fn upsert_addresses(
    conn: &Connection,
    now: DateTime<Utc>,
    resolved: &HashMap<(i64, MacAddress), Resolved>,
    hostnames: &HashMap<Ipv4Addr, String>,
) -> HashMap<Ipv4Addr, i64> {
    let mut ids = HashMap::new();
    for hit in resolved.values() {
        if ids.contains_key(&hit.address) {
            continue;
        }
        let hostname = hostnames.get(&hit.address).map(String::as_str).unwrap_or("");
        let Some(existing) = stored(queries::get_ip_address(conn, hit.address), "get address") else {
            continue;
        };
        let id = match existing {
            None => stored(
                queries::insert_ip_address(conn, hit.address, hit.prefix.prefix(), hostname, now),
                "insert address",
            ),
            Some(record) => {
                if !hostname.is_empty() && record.dns_name != hostname {
                    stored(
                        queries::update_dns_name(conn, record.id, hostname, now),
                        "update address DNS name",
                    );
                }
                Some(record.id)
            }
        };
        if let Some(id) = id {
            ids.insert(hit.address, id);
        }
    }
    ids
}

#[allow(clippy::too_many_arguments)]
fn reconcile_device(
    conn: &Connection,
    now: DateTime<Utc>,
    target: &TargetDevice,
    found: &[Sighting<'_>],
    resolved: &HashMap<(i64, MacAddress), Resolved>,
    address_ids: &HashMap<Ipv4Addr, i64>,
    observed: &HashSet<(i64, MacAddress)>,
    block: &mut DeviceBlock,
) {
    let device = &target.device;
    let ports: HashSet<i64> = found.iter().map(|s| s.interface.id).collect();
    block.macs = found.len();
    block.headline = Some(format!("{} MACs on {} ports", found.len(), ports.len()));

    // Records on freshly observed ports that were not seen anywhere this run
    let mut port_ids: Vec<i64> = ports.into_iter().collect();
    port_ids.sort_unstable();
    for interface_id in port_ids {
        let Some(records) = stored(
            queries::mac_on_ports_for_interface(conn, interface_id),
            "list MACs on port",
        ) else {
            continue;
        };
        for record in records {
            if observed.contains(&(record.vlan_id, record.mac)) {
                continue;
            }
            if stored(queries::delete_mac_on_port(conn, record.id), "delete MAC on port").is_some() {
                block.counters.deleted += 1;
            }
        }
    }

    for sighting in found {
        let key = (sighting.scope.vlan.id, sighting.mac);
        let address = resolved.get(&key).map(|r| r.address);
        let observation = MacObservation {
            vlan_id: sighting.scope.vlan.id,
            vid: sighting.scope.vlan.vid,
            site: &sighting.scope.vlan.site,
            mac: sighting.mac,
            interface_id: sighting.interface.id,
            interface_name: &sighting.interface.name,
            device_id: device.id,
            device_name: &device.name,
            ip_address_id: address.and_then(|a| address_ids.get(&a).copied()),
        };

        let Some(existing) = stored(
            queries::get_mac_on_port(conn, sighting.scope.vlan.id, sighting.mac),
            "get MAC on port",
        ) else {
            continue;
        };

        match existing {
            None => {
                if stored(queries::insert_mac_on_port(conn, &observation, now), "insert MAC on port").is_some() {
                    block.counters.created += 1;
                }
            }
            Some(record) => update_existing(conn, now, &record, observation, address, block),
        }
    }
}

/// Bring an existing record in line with this run's observation, noting
/// moves. Nothing is written when nothing changed.
fn update_existing(
    conn: &Connection,
    now: DateTime<Utc>,
    record: &MacOnPortRecord,
    mut observation: MacObservation<'_>,
    address: Option<Ipv4Addr>,
    block: &mut DeviceBlock,
) {
    let mut changed = false;

    let fresh_ip = observation.ip_address_id;
    match fresh_ip {
        Some(id) if record.ip_address_id != Some(id) => {
            changed = true;
            block.counters.moved_ip += 1;
            block.notes.push(format!(
                "moved ip: {} vlan {} {} -> {}",
                record.mac,
                record.vid,
                record
                    .ip_address
                    .map(|a| a.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                address.map(|a| a.to_string()).unwrap_or_else(|| "-".to_string())
            ));
        }
        // No address this run keeps the stored one
        _ => observation.ip_address_id = record.ip_address_id,
    }

    if record.interface_id != observation.interface_id {
        changed = true;
        block.counters.moved_port += 1;
        block.notes.push(format!(
            "moved port: {} vlan {} {} {} -> {} {}",
            record.mac,
            record.vid,
            record.device_name,
            record.interface_name,
            observation.device_name,
            observation.interface_name
        ));
    }

    if changed
        && stored(
            queries::update_mac_on_port(conn, record.id, &observation, now),
            "update MAC on port",
        )
        .is_some()
    {
        block.counters.updated += 1;
    }
}
