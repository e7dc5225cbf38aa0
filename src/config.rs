//! Configuration for the port history jobs
//!
//! Compile-time defaults live in `pub const` items. Anything an operator may
//! want to change is exposed through a runtime accessor reading a
//! `PORTHISTORY_*` environment variable. SNMP protocol constants are fixed.

use std::path::PathBuf;
use std::time::Duration;

// ====== Job Configuration ======

/// Days without output after which a switch port is reported as unused
pub const MIN_IDLE_DAYS: u32 = 14;

/// Maximum SNMP walks in flight across one polling wave
pub const WORKERS: usize = 50;

/// Device roles polled as access switches
pub const SWITCH_ROLES: &[&str] = &["access-switch", "switch"];

/// Device roles whose ARP tables are used for IP resolution
pub const ROUTER_ROLES: &[&str] = &["router", "core-router"];

/// Platform driver of devices known to expose the required MIBs
pub const PLATFORM_DRIVER: &str = "cisco_iosxe";

/// Only devices in this status are polled
pub const ACTIVE_STATUS: &str = "active";

/// Recomputed last-output timestamps closer than this to the stored value
/// are considered unchanged
pub const LAST_OUTPUT_TOLERANCE: Duration = Duration::from_secs(60);

// ====== SNMP Configuration ======

/// SNMP community string for v2c
pub const SNMP_COMMUNITY: &str = "public";

/// SNMP port
pub const SNMP_PORT: u16 = 161;

/// Per-attempt timeout of one GETBULK request (not tunable)
pub const SNMP_TIMEOUT: Duration = Duration::from_secs(5);

/// Retries after the first attempt of one GETBULK request (not tunable)
pub const SNMP_RETRIES: u32 = 3;

/// max-repetitions of every GETBULK request (not tunable)
pub const SNMP_MAX_REPETITIONS: u32 = 10;

/// Seconds after boot during which an interface's last output is not trusted
pub const BOOT_WINDOW_SECS: u64 = 300;

// ====== Reverse DNS ======

/// Maximum concurrent reverse lookups
pub const MAX_CONCURRENT_DNS: usize = 10;

/// Reverse lookup timeout
pub const DNS_TIMEOUT: Duration = Duration::from_millis(2000);

fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse_u32(name: &str, default: u32, min: u32, max: u32) -> u32 {
    match env_var(name).and_then(|v| v.parse::<u32>().ok()) {
        Some(v) => v.clamp(min, max),
        None => default,
    }
}

fn env_parse_usize(name: &str, default: usize, min: usize, max: usize) -> usize {
    match env_var(name).and_then(|v| v.parse::<usize>().ok()) {
        Some(v) => v.clamp(min, max),
        None => default,
    }
}

fn env_parse_u16(name: &str, default: u16, min: u16, max: u16) -> u16 {
    match env_var(name).and_then(|v| v.parse::<u16>().ok()) {
        Some(v) => v.clamp(min, max),
        None => default,
    }
}

fn env_parse_bool(name: &str, default: bool) -> bool {
    match env_var(name) {
        Some(value) => {
            let normalized = value.to_ascii_lowercase();
            matches!(normalized.as_str(), "1" | "true" | "yes" | "on")
        }
        None => default,
    }
}

fn env_parse_list(name: &str, default: &[&str]) -> Vec<String> {
    if let Some(raw) = env_var(name) {
        let items: Vec<String> = raw
            .split(',')
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect();
        if !items.is_empty() {
            return items;
        }
    }
    default.iter().map(|item| item.to_string()).collect()
}

/// Runtime-tunable idle threshold in days.
/// Env: `PORTHISTORY_MIN_IDLE_DAYS`
pub fn min_idle_days() -> u32 {
    env_parse_u32("PORTHISTORY_MIN_IDLE_DAYS", MIN_IDLE_DAYS, 1, 3650)
}

/// Runtime-tunable worker count of the SNMP poller.
/// Env: `PORTHISTORY_WORKERS`
pub fn workers() -> usize {
    env_parse_usize("PORTHISTORY_WORKERS", WORKERS, 1, 1024)
}

/// Runtime-tunable SNMP community.
/// Env: `PORTHISTORY_SNMP_COMMUNITY`
pub fn snmp_community() -> String {
    env_var("PORTHISTORY_SNMP_COMMUNITY").unwrap_or_else(|| SNMP_COMMUNITY.to_string())
}

/// Runtime-tunable SNMP port.
/// Env: `PORTHISTORY_SNMP_PORT`
pub fn snmp_port() -> u16 {
    env_parse_u16("PORTHISTORY_SNMP_PORT", SNMP_PORT, 1, u16::MAX)
}

/// Runtime-tunable switch roles.
/// Env: `PORTHISTORY_SWITCH_ROLES` (comma-separated role slugs)
pub fn switch_roles() -> Vec<String> {
    env_parse_list("PORTHISTORY_SWITCH_ROLES", SWITCH_ROLES)
}

/// Runtime-tunable router roles.
/// Env: `PORTHISTORY_ROUTER_ROLES` (comma-separated role slugs)
pub fn router_roles() -> Vec<String> {
    env_parse_list("PORTHISTORY_ROUTER_ROLES", ROUTER_ROLES)
}

/// Runtime-tunable supported platform driver.
/// Env: `PORTHISTORY_PLATFORM_DRIVER`
pub fn platform_driver() -> String {
    env_var("PORTHISTORY_PLATFORM_DRIVER").unwrap_or_else(|| PLATFORM_DRIVER.to_string())
}

/// Whether the invoking principal holds the administrative capability.
/// Env: `PORTHISTORY_SUPERUSER`
pub fn superuser() -> bool {
    env_parse_bool("PORTHISTORY_SUPERUSER", false)
}

/// Name of the invoking principal, for log lines.
/// Env: `PORTHISTORY_PRINCIPAL`, falling back to `USER`
pub fn principal_name() -> String {
    env_var("PORTHISTORY_PRINCIPAL")
        .or_else(|| env_var("USER"))
        .unwrap_or_else(|| "anonymous".to_string())
}

/// Result store path override.
/// Env: `PORTHISTORY_DB`
pub fn db_path() -> Option<PathBuf> {
    env_var("PORTHISTORY_DB").map(PathBuf::from)
}

/// Inventory document path.
/// Env: `PORTHISTORY_INVENTORY`, default `<config dir>/porthistory/inventory.json`
pub fn inventory_path() -> PathBuf {
    env_var("PORTHISTORY_INVENTORY")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("porthistory")
                .join("inventory.json")
        })
}

/// Settings of one job run, assembled once and never mutated afterwards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub min_idle_days: u32,
    pub community: String,
    pub workers: usize,
    pub snmp_port: u16,
    pub switch_roles: Vec<String>,
    pub router_roles: Vec<String>,
    pub platform_driver: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            min_idle_days: MIN_IDLE_DAYS,
            community: SNMP_COMMUNITY.to_string(),
            workers: WORKERS,
            snmp_port: SNMP_PORT,
            switch_roles: SWITCH_ROLES.iter().map(|r| r.to_string()).collect(),
            router_roles: ROUTER_ROLES.iter().map(|r| r.to_string()).collect(),
            platform_driver: PLATFORM_DRIVER.to_string(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            min_idle_days: min_idle_days(),
            community: snmp_community(),
            workers: workers(),
            snmp_port: snmp_port(),
            switch_roles: switch_roles(),
            router_roles: router_roles(),
            platform_driver: platform_driver(),
        }
    }

    /// Idle threshold as a duration
    pub fn min_idle(&self) -> Duration {
        Duration::from_secs(u64::from(self.min_idle_days) * 86_400)
    }

    /// Community selecting the per-VLAN bridge context (`community@vid`)
    pub fn vlan_community(&self, vid: u16) -> String {
        format!("{}@{}", self.community, vid)
    }
}
