//! Database schema definitions
//!
//! Creates the result tables written by the two jobs

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Create all database tables
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;

        -- Unused ports: at most one live record per interface
        CREATE TABLE IF NOT EXISTS unused_ports (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            interface_id INTEGER UNIQUE NOT NULL,
            interface_name TEXT NOT NULL,
            device_id INTEGER NOT NULL,
            device_name TEXT NOT NULL,
            last_output TEXT NOT NULL,
            updated TEXT NOT NULL
        );

        -- Resolved addresses, shared with the address directory
        CREATE TABLE IF NOT EXISTS ip_addresses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            address TEXT UNIQUE NOT NULL,
            prefix_length INTEGER NOT NULL,
            assignment TEXT NOT NULL DEFAULT 'static',
            dns_name TEXT NOT NULL DEFAULT '',
            updated TEXT NOT NULL
        );

        -- MAC on port: keyed by (VLAN, MAC)
        CREATE TABLE IF NOT EXISTS mac_on_ports (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            vlan_id INTEGER NOT NULL,
            vid INTEGER NOT NULL,
            site TEXT NOT NULL,
            mac TEXT NOT NULL,
            interface_id INTEGER NOT NULL,
            interface_name TEXT NOT NULL,
            device_id INTEGER NOT NULL,
            device_name TEXT NOT NULL,
            ip_address_id INTEGER,
            updated TEXT NOT NULL,
            UNIQUE(vlan_id, mac),
            FOREIGN KEY (ip_address_id) REFERENCES ip_addresses(id) ON DELETE SET NULL
        );

        CREATE INDEX IF NOT EXISTS idx_unused_ports_device ON unused_ports(device_id);
        CREATE INDEX IF NOT EXISTS idx_unused_ports_device_name ON unused_ports(device_name);
        CREATE INDEX IF NOT EXISTS idx_mac_on_ports_interface ON mac_on_ports(interface_id);
        CREATE INDEX IF NOT EXISTS idx_mac_on_ports_mac ON mac_on_ports(mac);
        CREATE INDEX IF NOT EXISTS idx_mac_on_ports_site ON mac_on_ports(site);
        "#,
    )
    .context("Failed to create database tables")?;

    Ok(())
}
