//! Database query functions
//!
//! Get-or-create / update / delete operations on the result tables and
//! the read-side queries behind the `search` and `unused` commands.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use std::net::Ipv4Addr;

use super::models::*;
use crate::network::{MacAddress, normalize_mac_query};

// ---------------------------------------------------------------------------
// Unused ports
// ---------------------------------------------------------------------------

const UNUSED_PORT_COLUMNS: &str =
    "id, interface_id, interface_name, device_id, device_name, last_output, updated";

fn unused_port_from_row(row: &Row<'_>) -> rusqlite::Result<UnusedPortRecord> {
    Ok(UnusedPortRecord {
        id: row.get(0)?,
        interface_id: row.get(1)?,
        interface_name: row.get(2)?,
        device_id: row.get(3)?,
        device_name: row.get(4)?,
        last_output: parse_datetime_column(row.get::<_, String>(5)?, 5)?,
        updated: parse_datetime_column(row.get::<_, String>(6)?, 6)?,
    })
}

pub fn get_unused_port(conn: &Connection, interface_id: i64) -> Result<Option<UnusedPortRecord>> {
    conn.query_row(
        &format!("SELECT {UNUSED_PORT_COLUMNS} FROM unused_ports WHERE interface_id = ?1"),
        params![interface_id],
        unused_port_from_row,
    )
    .optional()
    .context("Failed to query unused port")
}

pub fn insert_unused_port(
    conn: &Connection,
    port: &NewUnusedPort<'_>,
    now: DateTime<Utc>,
) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO unused_ports (
            interface_id, interface_name, device_id, device_name, last_output, updated
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
        params![
            port.interface_id,
            port.interface_name,
            port.device_id,
            port.device_name,
            format_datetime(port.last_output),
            format_datetime(now),
        ],
    )
    .context("Failed to insert unused port")?;

    Ok(conn.last_insert_rowid())
}

pub fn update_unused_port_last_output(
    conn: &Connection,
    interface_id: i64,
    last_output: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "UPDATE unused_ports SET last_output = ?2, updated = ?3 WHERE interface_id = ?1",
        params![interface_id, format_datetime(last_output), format_datetime(now)],
    )
    .context("Failed to update unused port")?;
    Ok(())
}

/// Refresh only the `updated` stamp
pub fn touch_unused_port(conn: &Connection, interface_id: i64, now: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "UPDATE unused_ports SET updated = ?2 WHERE interface_id = ?1",
        params![interface_id, format_datetime(now)],
    )
    .context("Failed to touch unused port")?;
    Ok(())
}

/// Returns whether a record was removed
pub fn delete_unused_port(conn: &Connection, interface_id: i64) -> Result<bool> {
    let removed = conn
        .execute(
            "DELETE FROM unused_ports WHERE interface_id = ?1",
            params![interface_id],
        )
        .context("Failed to delete unused port")?;
    Ok(removed > 0)
}

/// Stored unused ports of one device, by interface name
pub fn unused_ports_for_device(conn: &Connection, device_name: &str) -> Result<Vec<UnusedPortRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {UNUSED_PORT_COLUMNS} FROM unused_ports WHERE device_name = ?1 ORDER BY interface_name"
    ))?;

    let ports = stmt
        .query_map(params![device_name], unused_port_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to query unused ports")?;

    Ok(ports)
}

// ---------------------------------------------------------------------------
// Addresses
// ---------------------------------------------------------------------------

pub fn get_ip_address(conn: &Connection, address: Ipv4Addr) -> Result<Option<IpAddressRecord>> {
    conn.query_row(
        r#"
        SELECT id, address, prefix_length, assignment, dns_name, updated
        FROM ip_addresses
        WHERE address = ?1
        "#,
        params![address.to_string()],
        |row| {
            let assignment: String = row.get(3)?;
            Ok(IpAddressRecord {
                id: row.get(0)?,
                address: parse_column(row.get::<_, String>(1)?, 1)?,
                prefix_length: row.get(2)?,
                assignment: assignment.parse().unwrap_or_else(|_| {
                    crate::log_warn!("Unknown address assignment in database: {}", assignment);
                    Assignment::Static
                }),
                dns_name: row.get(4)?,
                updated: parse_datetime_column(row.get::<_, String>(5)?, 5)?,
            })
        },
    )
    .optional()
    .context("Failed to query address")
}

/// Insert a new address record tagged as statically assigned
pub fn insert_ip_address(
    conn: &Connection,
    address: Ipv4Addr,
    prefix_length: u8,
    dns_name: &str,
    now: DateTime<Utc>,
) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO ip_addresses (address, prefix_length, assignment, dns_name, updated)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
        params![
            address.to_string(),
            prefix_length,
            Assignment::Static.to_string(),
            dns_name,
            format_datetime(now),
        ],
    )
    .context("Failed to insert address")?;

    Ok(conn.last_insert_rowid())
}

/// Refresh the DNS name; the assignment tag is never touched
pub fn update_dns_name(conn: &Connection, id: i64, dns_name: &str, now: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "UPDATE ip_addresses SET dns_name = ?2, updated = ?3 WHERE id = ?1",
        params![id, dns_name, format_datetime(now)],
    )
    .context("Failed to update address DNS name")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// MAC on ports
// ---------------------------------------------------------------------------

const MAC_ON_PORT_SELECT: &str = r#"
    SELECT m.id, m.vlan_id, m.vid, m.site, m.mac, m.interface_id, m.interface_name,
           m.device_id, m.device_name, m.ip_address_id, a.address, a.dns_name, m.updated
    FROM mac_on_ports m
    LEFT JOIN ip_addresses a ON a.id = m.ip_address_id
"#;

fn mac_on_port_from_row(row: &Row<'_>) -> rusqlite::Result<MacOnPortRecord> {
    let address: Option<String> = row.get(10)?;
    Ok(MacOnPortRecord {
        id: row.get(0)?,
        vlan_id: row.get(1)?,
        vid: row.get(2)?,
        site: row.get(3)?,
        mac: parse_column(row.get::<_, String>(4)?, 4)?,
        interface_id: row.get(5)?,
        interface_name: row.get(6)?,
        device_id: row.get(7)?,
        device_name: row.get(8)?,
        ip_address_id: row.get(9)?,
        ip_address: address.map(|a| parse_column(a, 10)).transpose()?,
        dns_name: row.get(11)?,
        updated: parse_datetime_column(row.get::<_, String>(12)?, 12)?,
    })
}

pub fn get_mac_on_port(
    conn: &Connection,
    vlan_id: i64,
    mac: MacAddress,
) -> Result<Option<MacOnPortRecord>> {
    conn.query_row(
        &format!("{MAC_ON_PORT_SELECT} WHERE m.vlan_id = ?1 AND m.mac = ?2"),
        params![vlan_id, mac.to_string()],
        mac_on_port_from_row,
    )
    .optional()
    .context("Failed to query MAC on port")
}

pub fn insert_mac_on_port(
    conn: &Connection,
    seen: &MacObservation<'_>,
    now: DateTime<Utc>,
) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO mac_on_ports (
            vlan_id, vid, site, mac, interface_id, interface_name,
            device_id, device_name, ip_address_id, updated
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
        params![
            seen.vlan_id,
            seen.vid,
            seen.site,
            seen.mac.to_string(),
            seen.interface_id,
            seen.interface_name,
            seen.device_id,
            seen.device_name,
            seen.ip_address_id,
            format_datetime(now),
        ],
    )
    .context("Failed to insert MAC on port")?;

    Ok(conn.last_insert_rowid())
}

/// Overwrite the port, device and address of an existing record
pub fn update_mac_on_port(
    conn: &Connection,
    id: i64,
    seen: &MacObservation<'_>,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        r#"
        UPDATE mac_on_ports SET
            interface_id = ?2,
            interface_name = ?3,
            device_id = ?4,
            device_name = ?5,
            ip_address_id = ?6,
            updated = ?7
        WHERE id = ?1
        "#,
        params![
            id,
            seen.interface_id,
            seen.interface_name,
            seen.device_id,
            seen.device_name,
            seen.ip_address_id,
            format_datetime(now),
        ],
    )
    .context("Failed to update MAC on port")?;
    Ok(())
}

pub fn mac_on_ports_for_interface(conn: &Connection, interface_id: i64) -> Result<Vec<MacOnPortRecord>> {
    let mut stmt = conn.prepare(&format!(
        "{MAC_ON_PORT_SELECT} WHERE m.interface_id = ?1 ORDER BY m.vid, m.mac"
    ))?;

    let records = stmt
        .query_map(params![interface_id], mac_on_port_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to query MAC on ports for interface")?;

    Ok(records)
}

pub fn delete_mac_on_port(conn: &Connection, id: i64) -> Result<()> {
    conn.execute("DELETE FROM mac_on_ports WHERE id = ?1", params![id])
        .context("Failed to delete MAC on port")?;
    Ok(())
}

/// Stored MAC-on-port records matching every given criterion
pub fn search_mac_on_ports(conn: &Connection, search: &MacSearch) -> Result<Vec<MacOnPortRecord>> {
    let mut clauses: Vec<&str> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(query) = search.query.as_deref() {
        let fragment = normalize_mac_query(query);
        if !fragment.is_empty() {
            clauses.push("m.mac LIKE ?");
            values.push(Value::Text(format!("%{}%", fragment)));
        }
    }
    if let Some(site) = &search.site {
        clauses.push("m.site = ?");
        values.push(Value::Text(site.clone()));
    }
    if let Some(device) = &search.device {
        clauses.push("m.device_name = ?");
        values.push(Value::Text(device.clone()));
    }
    if let Some(vid) = search.vid {
        clauses.push("m.vid = ?");
        values.push(Value::Integer(i64::from(vid)));
    }

    let mut sql = MAC_ON_PORT_SELECT.to_string();
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY m.device_name, m.interface_name, m.vid, m.mac");

    let mut stmt = conn.prepare(&sql)?;
    let records = stmt
        .query_map(params_from_iter(values.iter()), mac_on_port_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to search MAC on ports")?;

    Ok(records)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Timestamps are stored as RFC 3339 text at second precision
pub fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_datetime_column(s: String, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn parse_column<T>(s: String, column: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    s.parse().map_err(|e: T::Err| {
        rusqlite::Error::FromSqlConversionFailure(
            column,
            rusqlite::types::Type::Text,
            format!("invalid value {:?}: {}", s, e).into(),
        )
    })
}
