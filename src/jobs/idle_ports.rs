//! Unused port detection
//!
//! Three waves per run (uptime, interface names, time since last output),
//! then every interface of every fully-polled switch is classified and the
//! stored unused-port records are brought in line.

use anyhow::Result;
use chrono::{DateTime, TimeDelta, Utc};
use rusqlite::Connection;
use std::collections::{BTreeMap, HashMap};
use std::net::Ipv4Addr;
use std::time::Duration;

use super::{RunContext, authorize, poll_wave, rows, stored};
use crate::config::{BOOT_WINDOW_SECS, LAST_OUTPUT_TOLERANCE};
use crate::database::NewUnusedPort;
use crate::database::queries;
use crate::inventory::{DeviceFilter, DeviceSnapshot, TargetDevice};
use crate::models::Principal;
use crate::report::{DeviceBlock, RunReport};
use crate::snmp::decode::{IfIndex, decode_if_names, decode_last_output, decode_uptime};
use crate::snmp::oids::{OID_ENGINE_TIME, OID_IF_NAME, OID_LOC_IF_LAST_OUT};

pub const JOB_NAME: &str = "unused-ports";

/// Classification of one interface in one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleState {
    /// Last output unknown or within the first minutes after boot; the age
    /// cannot be trusted, so the port counts as unused since boot
    BootWindow,
    /// Output seen within the idle threshold
    RecentlyActive,
    /// No output for at least the idle threshold
    Idle { elapsed: Duration },
}

/// Classify a raw locIfLastOut value (hundredths of a second, negative when
/// unknown) against the device uptime (seconds).
pub fn classify(raw_last_out: i64, uptime_secs: u64, min_idle: Duration) -> IdleState {
    let Ok(hundredths) = u64::try_from(raw_last_out) else {
        return IdleState::BootWindow;
    };
    let elapsed = Duration::from_millis(hundredths.saturating_mul(10));
    let secs = elapsed.as_secs();

    if secs > uptime_secs.saturating_sub(BOOT_WINDOW_SECS) && secs <= uptime_secs {
        IdleState::BootWindow
    } else if elapsed < min_idle {
        IdleState::RecentlyActive
    } else {
        IdleState::Idle { elapsed }
    }
}

/// Per-device data gathered by the three waves
struct DevicePoll {
    uptime: u64,
    if_names: HashMap<IfIndex, String>,
    last_output: BTreeMap<IfIndex, i64>,
}

/// Run the unused-port job. Returns `None` when the principal is refused.
pub async fn run_unused_ports(
    ctx: &RunContext,
    principal: &Principal,
    site: Option<&str>,
) -> Result<Option<RunReport>> {
    if !authorize(principal, JOB_NAME) {
        return Ok(None);
    }

    let settings = &ctx.settings;
    let filter = DeviceFilter::active(site, &settings.switch_roles);
    let switches = DeviceSnapshot::build(ctx.inventory.as_ref(), &filter, &settings.platform_driver)?;
    let mut report = RunReport::new(JOB_NAME, ctx.now);

    crate::log_stderr!(
        "{} run by {}: {} switches{}",
        JOB_NAME,
        principal.name,
        switches.len(),
        site.map(|s| format!(" in site {}", s)).unwrap_or_default()
    );

    let polls = poll_devices(ctx, &switches, &mut report).await;

    for (address, poll) in &polls {
        let Some(target) = switches.get(address) else {
            continue;
        };
        let block = report.device(&target.device.name);
        match ctx.db.lock() {
            Ok(conn) => reconcile_device(&conn, ctx, target, poll, block),
            Err(e) => crate::log_error!("Skipping store update for {}: {:#}", target.device.name, e),
        }
    }

    let totals = report.totals();
    crate::log_stderr!(
        "{} finished: {} devices reconciled, {} created, {} updated, {} deleted",
        JOB_NAME,
        polls.len(),
        totals.created,
        totals.updated,
        totals.deleted
    );

    Ok(Some(report))
}

/// Run the three waves. Devices failing any of them are reported as skipped
/// and left out of the result.
async fn poll_devices(
    ctx: &RunContext,
    switches: &DeviceSnapshot,
    report: &mut RunReport,
) -> BTreeMap<Ipv4Addr, DevicePoll> {
    let community = ctx.settings.community.as_str();
    let name_of = |address: &Ipv4Addr| {
        switches
            .get(address)
            .map(|t| t.device.name.clone())
            .unwrap_or_else(|| address.to_string())
    };

    let mut uptimes = BTreeMap::new();
    for (address, outcome) in poll_wave(&ctx.poller, &switches.addresses(), community, OID_ENGINE_TIME).await {
        let name = name_of(&address);
        match outcome.map(|tables| decode_uptime(rows(&tables, OID_ENGINE_TIME))) {
            Ok(Some(uptime)) => {
                uptimes.insert(address, uptime);
            }
            Ok(None) => {
                crate::log_warn!("{} ({}): uptime unknown, skipping device", name, address);
                report.skip(&name, "uptime unknown");
            }
            Err(e) => {
                crate::log_warn!("{} ({}): uptime poll failed: {}", name, address, e);
                report.skip(&name, e);
            }
        }
    }

    let hosts: Vec<Ipv4Addr> = uptimes.keys().copied().collect();
    let mut names = poll_wave(&ctx.poller, &hosts, community, OID_IF_NAME).await;
    let hosts: Vec<Ipv4Addr> = hosts
        .into_iter()
        .filter(|address| matches!(names.get(address), Some(Ok(_))))
        .collect();
    let mut last_outs = poll_wave(&ctx.poller, &hosts, community, OID_LOC_IF_LAST_OUT).await;

    let mut polls = BTreeMap::new();
    for (address, uptime) in uptimes {
        let name = name_of(&address);
        let if_names = match names.remove(&address) {
            Some(Ok(tables)) => decode_if_names(rows(&tables, OID_IF_NAME)),
            Some(Err(e)) => {
                crate::log_warn!("{} ({}): interface name poll failed: {}", name, address, e);
                report.skip(&name, e);
                continue;
            }
            None => continue,
        };
        let last_output = match last_outs.remove(&address) {
            Some(Ok(tables)) => decode_last_output(rows(&tables, OID_LOC_IF_LAST_OUT))
                .into_iter()
                .collect(),
            Some(Err(e)) => {
                crate::log_warn!("{} ({}): last output poll failed: {}", name, address, e);
                report.skip(&name, e);
                continue;
            }
            None => continue,
        };
        polls.insert(
            address,
            DevicePoll {
                uptime,
                if_names,
                last_output,
            },
        );
    }

    polls
}

fn reconcile_device(
    conn: &Connection,
    ctx: &RunContext,
    target: &TargetDevice,
    poll: &DevicePoll,
    block: &mut DeviceBlock,
) {
    let device = &target.device;
    let Some(boot) = i64::try_from(poll.uptime)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .and_then(|uptime| ctx.now.checked_sub_signed(uptime))
    else {
        crate::log_warn!("{}: uptime {} out of range, skipping device", device.name, poll.uptime);
        block.skipped = Some("uptime out of range".to_string());
        return;
    };
    block.headline = Some(format!("booted {}", boot.format("%Y-%m-%d %H:%M:%S UTC")));
    let min_idle = ctx.settings.min_idle();

    for (if_index, raw) in &poll.last_output {
        let Some(name) = poll.if_names.get(if_index) else {
            crate::log_debug!("{}: ifIndex {} has no name", device.name, if_index);
            continue;
        };
        let Some(interface) = target.interface(name) else {
            crate::log_debug!("{}: {} is not in the inventory", device.name, name);
            continue;
        };

        let last_output = match classify(*raw, poll.uptime, min_idle) {
            IdleState::RecentlyActive => {
                if stored(queries::delete_unused_port(conn, interface.id), "delete unused port") == Some(true) {
                    block.counters.deleted += 1;
                }
                continue;
            }
            IdleState::BootWindow => {
                block.unused += 1;
                let port = NewUnusedPort {
                    interface_id: interface.id,
                    interface_name: &interface.name,
                    device_id: device.id,
                    device_name: &device.name,
                    last_output: boot,
                };
                match stored(queries::get_unused_port(conn, interface.id), "get unused port") {
                    Some(None) => {
                        if stored(queries::insert_unused_port(conn, &port, ctx.now), "insert unused port").is_some() {
                            block.counters.created += 1;
                        }
                    }
                    Some(Some(_)) => {
                        stored(queries::touch_unused_port(conn, interface.id, ctx.now), "touch unused port");
                    }
                    None => {}
                }
                continue;
            }
            IdleState::Idle { elapsed } => {
                let Some(last_output) = TimeDelta::from_std(elapsed)
                    .ok()
                    .and_then(|elapsed| ctx.now.checked_sub_signed(elapsed))
                else {
                    crate::log_debug!("{}: {} last output out of range", device.name, name);
                    continue;
                };
                last_output
            }
        };

        block.unused += 1;
        upsert_idle(conn, ctx.now, target, interface.id, &interface.name, last_output, block);
    }

    crate::log_debug!("{}: {} unused ports", device.name, block.unused);
}

fn upsert_idle(
    conn: &Connection,
    now: DateTime<Utc>,
    target: &TargetDevice,
    interface_id: i64,
    interface_name: &str,
    last_output: DateTime<Utc>,
    block: &mut DeviceBlock,
) {
    let Some(existing) = stored(queries::get_unused_port(conn, interface_id), "get unused port") else {
        return;
    };

    match existing {
        None => {
            let port = NewUnusedPort {
                interface_id,
                interface_name,
                device_id: target.device.id,
                device_name: &target.device.name,
                last_output,
            };
            if stored(queries::insert_unused_port(conn, &port, now), "insert unused port").is_some() {
                block.counters.created += 1;
            }
        }
        Some(record) => {
            let drift = (record.last_output - last_output).num_seconds().unsigned_abs();
            if drift <= LAST_OUTPUT_TOLERANCE.as_secs() {
                // Stored last output stays put; only the evaluation time moves
                stored(queries::touch_unused_port(conn, interface_id, now), "touch unused port");
            } else if stored(
                queries::update_unused_port_last_output(conn, interface_id, last_output, now),
                "update unused port",
            )
            .is_some()
            {
                block.counters.updated += 1;
            }
        }
    }
}
