//! Switch port history over SNMP
//!
//! This crate provides two periodic jobs and the plumbing under them:
//! - Unused port detection from uptime and per-interface last output
//! - MAC / VLAN / ARP correlation: which MAC, with which address and DNS
//!   name, sits behind which access port
//! - A bounded concurrent SNMP poller with per-host failure isolation
//! - SQLite storage of the current state, reconciled run by run

pub mod app;
pub mod cli;
pub mod config;
pub mod database;
pub mod inventory;
pub mod jobs;
pub mod logging;
pub mod models;
pub mod network;
pub mod report;
pub mod snmp;

pub use app::{AppContext, OutputHook, execute_command_with_context, run};
pub use cli::{CliArgs, CliCommand, parse_cli_args};
pub use config::Settings;
pub use database::{Database, MacOnPortRecord, MacSearch, UnusedPortRecord};
pub use inventory::{DeviceFilter, DeviceSnapshot, Inventory, JsonInventory};
pub use jobs::{IdleState, RunContext, classify, run_mac_on_ports, run_unused_ports};
pub use models::*;
pub use network::{HostnameResolver, MacAddress, SystemResolver, canonical_interface_name, dns_scan};
pub use report::{Counters, DeviceBlock, RunReport};
pub use snmp::{PollError, Poller, Snmp2Transport, SnmpTransport, SnmpValue, VarBind, WalkFuture};

// Re-export logging macros for use across crate
pub use crate::logging::macros;
