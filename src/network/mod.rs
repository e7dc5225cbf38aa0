//! Network helpers: MAC addresses, interface names, reverse DNS

pub mod dns;
pub mod interface_name;
pub mod mac;

pub use dns::{HostnameResolver, SystemResolver, dns_scan, reverse_lookup};
pub use interface_name::canonical_interface_name;
pub use mac::{MacAddress, normalize_mac_query};
