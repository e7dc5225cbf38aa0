//! Run reports
//!
//! A job run accumulates one block per device while it reconciles, then
//! renders the whole thing as newline-separated text for the invoker.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::database::{MacOnPortRecord, UnusedPortRecord};

/// Store mutations and events counted for one device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub moved_port: usize,
    pub moved_ip: usize,
}

impl Counters {
    pub fn mutations(&self) -> usize {
        self.created + self.updated + self.deleted
    }

    fn add(&mut self, other: &Counters) {
        self.created += other.created;
        self.updated += other.updated;
        self.deleted += other.deleted;
        self.moved_port += other.moved_port;
        self.moved_ip += other.moved_ip;
    }
}

/// Report section for one device
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceBlock {
    pub device: String,
    /// Boot time line (idle ports) or observation count (MAC on ports)
    pub headline: Option<String>,
    /// Why the device was left out of this run, if it was
    pub skipped: Option<String>,
    /// Ports currently counted as unused
    pub unused: usize,
    /// MACs attributed to the device's ports in this run
    pub macs: usize,
    pub counters: Counters,
    pub notes: Vec<String>,
}

/// Text summary of one job run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub job: String,
    pub started: DateTime<Utc>,
    blocks: Vec<DeviceBlock>,
}

impl RunReport {
    pub fn new(job: impl Into<String>, started: DateTime<Utc>) -> Self {
        Self {
            job: job.into(),
            started,
            blocks: Vec::new(),
        }
    }

    /// Block of `device`, created on first use; blocks keep first-use order
    pub fn device(&mut self, device: &str) -> &mut DeviceBlock {
        let position = match self.blocks.iter().position(|b| b.device == device) {
            Some(position) => position,
            None => {
                self.blocks.push(DeviceBlock {
                    device: device.to_string(),
                    ..DeviceBlock::default()
                });
                self.blocks.len() - 1
            }
        };
        &mut self.blocks[position]
    }

    pub fn skip(&mut self, device: &str, reason: impl fmt::Display) {
        self.device(device).skipped = Some(reason.to_string());
    }

    pub fn blocks(&self) -> &[DeviceBlock] {
        &self.blocks
    }

    pub fn block(&self, device: &str) -> Option<&DeviceBlock> {
        self.blocks.iter().find(|b| b.device == device)
    }

    pub fn totals(&self) -> Counters {
        let mut totals = Counters::default();
        for block in &self.blocks {
            totals.add(&block.counters);
        }
        totals
    }
}

impl fmt::Display for DeviceBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(reason) = &self.skipped {
            return write!(f, "{}: skipped ({})", self.device, reason);
        }
        match &self.headline {
            Some(headline) => writeln!(f, "{}: {}", self.device, headline)?,
            None => writeln!(f, "{}:", self.device)?,
        }
        let c = &self.counters;
        write!(
            f,
            "  unused {}, macs {}, created {}, updated {}, deleted {}, moved port {}, moved ip {}",
            self.unused, self.macs, c.created, c.updated, c.deleted, c.moved_port, c.moved_ip
        )?;
        for note in &self.notes {
            write!(f, "\n  {}", note)?;
        }
        Ok(())
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} run at {}",
            self.job,
            self.started.format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        if self.blocks.is_empty() {
            return write!(f, "no devices polled");
        }
        for (i, block) in self.blocks.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", block)?;
        }
        Ok(())
    }
}

/// Text table of one device's stored unused ports
pub fn render_unused_ports(device: &str, ports: &[UnusedPortRecord]) -> String {
    if ports.is_empty() {
        return format!("{}: no unused ports recorded", device);
    }

    let width = ports
        .iter()
        .map(|p| p.interface_name.len())
        .max()
        .unwrap_or(0)
        .max("Interface".len());

    let mut out = format!(
        "{:<width$}  {:<20}  {:<20}  {:>5}\n",
        "Interface",
        "Last output",
        "Updated",
        "Days",
        width = width
    );
    for port in ports {
        out.push_str(&format!(
            "{:<width$}  {:<20}  {:<20}  {:>5}\n",
            port.interface_name,
            port.last_output.format("%Y-%m-%d %H:%M:%S"),
            port.updated.format("%Y-%m-%d %H:%M:%S"),
            port.idle_days(),
            width = width
        ));
    }
    out.push_str(&format!("{} unused ports", ports.len()));
    out
}

/// Text table of MAC-on-port search results
pub fn render_mac_on_ports(records: &[MacOnPortRecord]) -> String {
    if records.is_empty() {
        return "no matching MACs".to_string();
    }

    let mut out = format!(
        "{:<12}  {:>4}  {:<12}  {:<28}  {:<15}  {:<30}  {}\n",
        "MAC", "VLAN", "Device", "Interface", "Address", "DNS name", "Updated"
    );
    for record in records {
        out.push_str(&format!(
            "{:<12}  {:>4}  {:<12}  {:<28}  {:<15}  {:<30}  {}\n",
            record.mac.to_string(),
            record.vid,
            record.device_name,
            record.interface_name,
            record
                .ip_address
                .map(|a| a.to_string())
                .unwrap_or_else(|| "-".to_string()),
            record.dns_name.as_deref().filter(|n| !n.is_empty()).unwrap_or("-"),
            record.updated.format("%Y-%m-%d %H:%M:%S")
        ));
    }
    out.push_str(&format!("{} MACs", records.len()));
    out
}
