//! Per-run inventory snapshot
//!
//! Built once at the start of a job and read-only afterwards: the pollable
//! devices with their interfaces, the inter-switch trunk ends, and the
//! flagged VLANs with their member switches and prefixes.

use anyhow::Result;
use ipnetwork::Ipv4Network;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::Ipv4Addr;

use super::{DeviceFilter, Inventory};
use crate::models::{CableEnd, Device, Interface, Vlan};

/// A device selected for polling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDevice {
    pub device: Device,
    pub address: Ipv4Addr,
    /// Inventory interfaces keyed by canonical name
    pub interfaces: HashMap<String, Interface>,
}

impl TargetDevice {
    pub fn interface(&self, name: &str) -> Option<&Interface> {
        self.interfaces.get(name)
    }
}

/// Pollable devices keyed by management address
#[derive(Debug, Clone, Default)]
pub struct DeviceSnapshot {
    targets: BTreeMap<Ipv4Addr, TargetDevice>,
}

impl DeviceSnapshot {
    /// Select devices matching `filter` that run `platform_driver` and have a
    /// management address. Anything else is left out without complaint.
    pub fn build(
        inventory: &dyn Inventory,
        filter: &DeviceFilter,
        platform_driver: &str,
    ) -> Result<Self> {
        let mut targets: BTreeMap<Ipv4Addr, TargetDevice> = BTreeMap::new();

        for device in inventory.devices(filter)? {
            if device.platform_driver.as_deref() != Some(platform_driver) {
                continue;
            }
            let Some(address) = device.management_address() else {
                continue;
            };
            if let Some(existing) = targets.get(&address) {
                crate::log_warn!(
                    "{} shares management address {} with {}; skipping it",
                    device.name,
                    address,
                    existing.device.name
                );
                continue;
            }

            let interfaces = inventory
                .interfaces(device.id)?
                .into_iter()
                .map(|intf| (intf.name.clone(), intf))
                .collect();

            targets.insert(
                address,
                TargetDevice {
                    device,
                    address,
                    interfaces,
                },
            );
        }

        Ok(Self { targets })
    }

    pub fn addresses(&self) -> Vec<Ipv4Addr> {
        self.targets.keys().copied().collect()
    }

    pub fn get(&self, address: &Ipv4Addr) -> Option<&TargetDevice> {
        self.targets.get(address)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TargetDevice> {
        self.targets.values()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Interface ends of cables running between two switches. MACs learned on
/// these are transit traffic and never attributed to the port.
pub fn trunk_interfaces(
    inventory: &dyn Inventory,
    site: Option<&str>,
    switch_roles: &[String],
) -> Result<HashSet<CableEnd>> {
    let mut roles: HashMap<String, Device> = HashMap::new();
    let mut lookup = |name: &str| -> Result<Option<Device>> {
        if let Some(device) = roles.get(name) {
            return Ok(Some(device.clone()));
        }
        let device = inventory.device_by_name(name)?;
        if let Some(device) = &device {
            roles.insert(name.to_string(), device.clone());
        }
        Ok(device)
    };

    let mut trunks = HashSet::new();
    for cable in inventory.cables()? {
        let (Some(a), Some(b)) = (lookup(&cable.a.device)?, lookup(&cable.b.device)?) else {
            continue;
        };
        let is_switch = |device: &Device| switch_roles.iter().any(|role| *role == device.role);
        if !(is_switch(&a) && is_switch(&b)) {
            continue;
        }
        for (end, device) in [(&cable.a, &a), (&cable.b, &b)] {
            if site.is_none_or(|site| device.site == site) {
                trunks.insert(end.clone());
            }
        }
    }

    Ok(trunks)
}

/// A flagged VLAN with everything needed to poll and resolve it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VlanScope {
    pub vlan: Vlan,
    /// Prefixes attached to the VLAN, in directory order
    pub prefixes: Vec<Ipv4Network>,
    /// Switches of the VLAN's site that answered the interface-name wave
    pub switches: Vec<Ipv4Addr>,
}

/// Flagged VLANs (of one site, or all) with their member switches. A switch
/// is a member iff it sits in the VLAN's site and is in `polled`.
pub fn build_vlan_scopes(
    inventory: &dyn Inventory,
    site: Option<&str>,
    switches: &DeviceSnapshot,
    polled: &HashSet<Ipv4Addr>,
) -> Result<Vec<VlanScope>> {
    let mut by_site: HashMap<&str, Vec<Ipv4Addr>> = HashMap::new();
    for target in switches.iter() {
        if polled.contains(&target.address) {
            by_site
                .entry(target.device.site.as_str())
                .or_default()
                .push(target.address);
        }
    }

    let mut scopes = Vec::new();
    for vlan in inventory.vlans(site)? {
        if !vlan.flag_porthistory {
            continue;
        }
        let Some(members) = by_site.get(vlan.site.as_str()) else {
            crate::log_debug!("VLAN {} ({}): no polled switches in site", vlan.vid, vlan.site);
            continue;
        };
        let prefixes = inventory.vlan_prefixes(vlan.id)?;
        scopes.push(VlanScope {
            switches: members.clone(),
            prefixes,
            vlan,
        });
    }

    Ok(scopes)
}
