#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use porthistory::database::Database;
use porthistory::network::dns::ResolveFuture;
use porthistory::snmp::oids::{
    OID_AT_PHYS_ADDRESS, OID_BASE_PORT_IF_INDEX, OID_ENGINE_TIME, OID_IF_NAME,
    OID_LOC_IF_LAST_OUT, OID_TP_FDB_PORT,
};
use porthistory::{
    Cable, CableEnd, Device, HostnameResolver, Interface, Inventory, InventoryDocument,
    JsonInventory, MacAddress, PollError, Prefix, RunContext, Settings, SnmpTransport, SnmpValue,
    VarBind, Vlan, WalkFuture,
};

pub const COMMUNITY: &str = "public";

pub fn ip(s: &str) -> Ipv4Addr {
    s.parse().expect("test address should parse")
}

pub fn mac(s: &str) -> MacAddress {
    s.parse().expect("test MAC should parse")
}

pub fn run_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
}

type WalkKey = (Ipv4Addr, String, Vec<u64>);

/// In-memory SNMP agent farm. Unscripted walks return an empty subtree.
#[derive(Default)]
pub struct ScriptedTransport {
    walks: Mutex<HashMap<WalkKey, Vec<VarBind>>>,
    failures: Mutex<HashMap<Ipv4Addr, PollError>>,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every walk sleeps for `delay` before answering
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn script(&self, host: Ipv4Addr, community: &str, root: &[u64], rows: Vec<VarBind>) {
        self.walks
            .lock()
            .unwrap()
            .insert((host, community.to_string(), root.to_vec()), rows);
    }

    /// Every walk against `host` fails with `error`
    pub fn fail_host(&self, host: Ipv4Addr, error: PollError) {
        self.failures.lock().unwrap().insert(host, error);
    }

    pub fn heal_host(&self, host: Ipv4Addr) {
        self.failures.lock().unwrap().remove(&host);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn uptime(&self, host: Ipv4Addr, secs: i64) {
        let mut oid = OID_ENGINE_TIME.to_vec();
        oid.push(0);
        self.script(host, COMMUNITY, OID_ENGINE_TIME, vec![VarBind::new(oid, SnmpValue::Integer(secs))]);
    }

    pub fn if_names(&self, host: Ipv4Addr, names: &[(u64, &str)]) {
        let rows = names
            .iter()
            .map(|(index, name)| {
                VarBind::new(
                    oid_below(OID_IF_NAME, &[*index]),
                    SnmpValue::OctetString(name.as_bytes().to_vec()),
                )
            })
            .collect();
        self.script(host, COMMUNITY, OID_IF_NAME, rows);
    }

    pub fn last_out(&self, host: Ipv4Addr, values: &[(u64, i64)]) {
        let rows = values
            .iter()
            .map(|(index, raw)| VarBind::new(oid_below(OID_LOC_IF_LAST_OUT, &[*index]), SnmpValue::Integer(*raw)))
            .collect();
        self.script(host, COMMUNITY, OID_LOC_IF_LAST_OUT, rows);
    }

    pub fn bridge_ports(&self, host: Ipv4Addr, vid: u16, ports: &[(u64, i64)]) {
        let rows = ports
            .iter()
            .map(|(port, if_index)| {
                VarBind::new(oid_below(OID_BASE_PORT_IF_INDEX, &[*port]), SnmpValue::Integer(*if_index))
            })
            .collect();
        self.script(host, &vlan_community(vid), OID_BASE_PORT_IF_INDEX, rows);
    }

    pub fn forwarding(&self, host: Ipv4Addr, vid: u16, entries: &[(MacAddress, i64)]) {
        let rows = entries
            .iter()
            .map(|(mac, port)| {
                let arcs: Vec<u64> = mac.octets().iter().map(|o| u64::from(*o)).collect();
                VarBind::new(oid_below(OID_TP_FDB_PORT, &arcs), SnmpValue::Integer(*port))
            })
            .collect();
        self.script(host, &vlan_community(vid), OID_TP_FDB_PORT, rows);
    }

    pub fn arp(&self, host: Ipv4Addr, entries: &[(Ipv4Addr, MacAddress)]) {
        let rows = entries
            .iter()
            .map(|(address, mac)| {
                // atIfIndex.1.a.b.c.d
                let mut index = vec![1, 1];
                index.extend(address.octets().iter().map(|o| u64::from(*o)));
                VarBind::new(
                    oid_below(OID_AT_PHYS_ADDRESS, &index),
                    SnmpValue::OctetString(mac.octets().to_vec()),
                )
            })
            .collect();
        self.script(host, COMMUNITY, OID_AT_PHYS_ADDRESS, rows);
    }
}

fn vlan_community(vid: u16) -> String {
    format!("{}@{}", COMMUNITY, vid)
}

fn oid_below(root: &[u64], index: &[u64]) -> Vec<u64> {
    let mut oid = root.to_vec();
    oid.extend_from_slice(index);
    oid
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl SnmpTransport for ScriptedTransport {
    fn bulk_walk<'a>(&'a self, host: Ipv4Addr, community: &'a str, root: &'a [u64]) -> WalkFuture<'a> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            let _guard = InFlight(&self.in_flight);
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            if let Some(error) = self.failures.lock().unwrap().get(&host) {
                return Err(error.clone());
            }
            Ok(self
                .walks
                .lock()
                .unwrap()
                .get(&(host, community.to_string(), root.to_vec()))
                .cloned()
                .unwrap_or_default())
        })
    }
}

/// Resolver answering from a fixed table
#[derive(Default)]
pub struct StubResolver {
    names: Mutex<HashMap<Ipv4Addr, String>>,
}

impl StubResolver {
    pub fn new(names: &[(&str, &str)]) -> Self {
        Self {
            names: Mutex::new(names.iter().map(|(a, n)| (ip(a), n.to_string())).collect()),
        }
    }

    pub fn set(&self, address: &str, name: &str) {
        self.names.lock().unwrap().insert(ip(address), name.to_string());
    }

    pub fn clear(&self) {
        self.names.lock().unwrap().clear();
    }
}

impl HostnameResolver for StubResolver {
    fn resolve(&self, address: Ipv4Addr) -> ResolveFuture<'_> {
        let name = self.names.lock().unwrap().get(&address).cloned();
        Box::pin(async move { name })
    }
}

/// Inventory document builder
#[derive(Default)]
pub struct InventoryBuilder {
    document: InventoryDocument,
}

impl InventoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn device(mut self, id: i64, name: &str, site: &str, role: &str, address: &str) -> Self {
        self.document.devices.push(Device {
            id,
            name: name.to_string(),
            site: site.to_string(),
            role: role.to_string(),
            status: "active".to_string(),
            platform_driver: Some("cisco_iosxe".to_string()),
            primary_ip4: Some(format!("{}/24", address).parse().expect("test prefix should parse")),
        });
        self
    }

    pub fn switch(self, id: i64, name: &str, site: &str, address: &str) -> Self {
        self.device(id, name, site, "access-switch", address)
    }

    pub fn router(self, id: i64, name: &str, site: &str, address: &str) -> Self {
        self.device(id, name, site, "router", address)
    }

    pub fn interface(mut self, id: i64, device_id: i64, name: &str) -> Self {
        self.document.interfaces.push(Interface {
            id,
            device_id,
            name: name.to_string(),
            ignore_mac: false,
        });
        self
    }

    pub fn ignored_interface(mut self, id: i64, device_id: i64, name: &str) -> Self {
        self.document.interfaces.push(Interface {
            id,
            device_id,
            name: name.to_string(),
            ignore_mac: true,
        });
        self
    }

    pub fn cable(mut self, a: (&str, &str), b: (&str, &str)) -> Self {
        let end = |(device, interface): (&str, &str)| CableEnd {
            device: device.to_string(),
            interface: interface.to_string(),
        };
        self.document.cables.push(Cable { a: end(a), b: end(b) });
        self
    }

    pub fn vlan(mut self, id: i64, vid: u16, site: &str, flagged: bool) -> Self {
        self.document.vlans.push(Vlan {
            id,
            vid,
            name: format!("vlan{}", vid),
            site: site.to_string(),
            flag_porthistory: flagged,
        });
        self
    }

    pub fn prefix(mut self, prefix: &str, vlan_id: i64) -> Self {
        self.document.prefixes.push(Prefix {
            prefix: prefix.parse().expect("test prefix should parse"),
            vlan_id: Some(vlan_id),
        });
        self
    }

    pub fn build(self) -> Arc<dyn Inventory> {
        Arc::new(JsonInventory::from_document(self.document))
    }
}

/// Run context over an in-memory store, starting at [`run_start`]
pub fn run_context(
    inventory: Arc<dyn Inventory>,
    transport: Arc<ScriptedTransport>,
    resolver: Arc<StubResolver>,
) -> RunContext {
    let db = Database::in_memory().expect("in-memory database should open");
    RunContext::new(Settings::default(), inventory, transport, resolver, db).with_now(run_start())
}
