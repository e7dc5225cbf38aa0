//! Inventory directory access
//!
//! The directory is read-only for the jobs. `JsonInventory` serves an
//! exported inventory document; anything else can implement [`Inventory`].

pub mod snapshot;

use anyhow::{Context, Result};
use ipnetwork::Ipv4Network;
use std::path::Path;

use crate::models::{Cable, Device, Interface, InventoryDocument, Vlan};

pub use snapshot::{DeviceSnapshot, TargetDevice, VlanScope, build_vlan_scopes, trunk_interfaces};

/// Device selection criteria
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFilter {
    pub site: Option<String>,
    pub roles: Vec<String>,
    pub status: String,
}

impl DeviceFilter {
    pub fn active(site: Option<&str>, roles: &[String]) -> Self {
        Self {
            site: site.map(str::to_string),
            roles: roles.to_vec(),
            status: crate::config::ACTIVE_STATUS.to_string(),
        }
    }

    pub fn matches(&self, device: &Device) -> bool {
        self.site.as_deref().is_none_or(|site| device.site == site)
            && self.roles.iter().any(|role| *role == device.role)
            && device.status == self.status
    }
}

/// Read-only inventory directory
pub trait Inventory: Send + Sync {
    fn devices(&self, filter: &DeviceFilter) -> Result<Vec<Device>>;
    fn device_by_name(&self, name: &str) -> Result<Option<Device>>;
    fn interfaces(&self, device_id: i64) -> Result<Vec<Interface>>;
    fn cables(&self) -> Result<Vec<Cable>>;
    /// VLANs, optionally restricted to one site
    fn vlans(&self, site: Option<&str>) -> Result<Vec<Vlan>>;
    /// Prefixes attached to a VLAN, in directory order
    fn vlan_prefixes(&self, vlan_id: i64) -> Result<Vec<Ipv4Network>>;
}

/// Inventory served from an exported JSON document
#[derive(Debug, Clone, Default)]
pub struct JsonInventory {
    document: InventoryDocument,
}

impl JsonInventory {
    pub fn from_document(document: InventoryDocument) -> Self {
        Self { document }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read inventory file {}", path.display()))?;
        let document: InventoryDocument = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse inventory file {}", path.display()))?;
        Ok(Self::from_document(document))
    }
}

impl Inventory for JsonInventory {
    fn devices(&self, filter: &DeviceFilter) -> Result<Vec<Device>> {
        Ok(self
            .document
            .devices
            .iter()
            .filter(|device| filter.matches(device))
            .cloned()
            .collect())
    }

    fn device_by_name(&self, name: &str) -> Result<Option<Device>> {
        Ok(self.document.devices.iter().find(|d| d.name == name).cloned())
    }

    fn interfaces(&self, device_id: i64) -> Result<Vec<Interface>> {
        Ok(self
            .document
            .interfaces
            .iter()
            .filter(|intf| intf.device_id == device_id)
            .cloned()
            .collect())
    }

    fn cables(&self) -> Result<Vec<Cable>> {
        Ok(self.document.cables.clone())
    }

    fn vlans(&self, site: Option<&str>) -> Result<Vec<Vlan>> {
        Ok(self
            .document
            .vlans
            .iter()
            .filter(|vlan| site.is_none_or(|site| vlan.site == site))
            .cloned()
            .collect())
    }

    fn vlan_prefixes(&self, vlan_id: i64) -> Result<Vec<Ipv4Network>> {
        Ok(self
            .document
            .prefixes
            .iter()
            .filter(|prefix| prefix.vlan_id == Some(vlan_id))
            .map(|prefix| prefix.prefix)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(id: i64, site: &str, role: &str, status: &str) -> Device {
        Device {
            id,
            name: format!("dev{}", id),
            site: site.to_string(),
            role: role.to_string(),
            status: status.to_string(),
            platform_driver: None,
            primary_ip4: None,
        }
    }

    #[test]
    fn filter_checks_site_role_and_status() {
        let roles = vec!["access-switch".to_string()];
        let any_site = DeviceFilter::active(None, &roles);
        let hq_only = DeviceFilter::active(Some("hq"), &roles);

        assert!(any_site.matches(&device(1, "branch", "access-switch", "active")));
        assert!(!hq_only.matches(&device(1, "branch", "access-switch", "active")));
        assert!(!any_site.matches(&device(2, "hq", "router", "active")));
        assert!(!any_site.matches(&device(3, "hq", "access-switch", "planned")));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = JsonInventory::load(Path::new("/nonexistent/porthistory-inventory.json"))
            .expect_err("missing file must fail");
        assert!(err.to_string().contains("Failed to read inventory file"));
    }

    #[test]
    fn document_parses_from_json() {
        let raw = r#"{
            "devices": [{"id": 1, "name": "sw1", "site": "hq", "role": "access-switch",
                         "platform_driver": "cisco_iosxe", "primary_ip4": "10.0.0.2/24"}],
            "interfaces": [{"id": 10, "device_id": 1, "name": "GigabitEthernet1/0/1"}],
            "vlans": [{"id": 100, "vid": 10, "site": "hq", "flag_porthistory": true}],
            "prefixes": [{"prefix": "10.10.0.0/24", "vlan_id": 100}]
        }"#;
        let document: InventoryDocument = serde_json::from_str(raw).unwrap();
        let inventory = JsonInventory::from_document(document);

        assert_eq!(inventory.interfaces(1).unwrap().len(), 1);
        assert_eq!(inventory.vlans(Some("hq")).unwrap().len(), 1);
        assert!(inventory.vlans(Some("branch")).unwrap().is_empty());
        assert_eq!(
            inventory.vlan_prefixes(100).unwrap(),
            vec!["10.10.0.0/24".parse::<Ipv4Network>().unwrap()]
        );
    }
}
