//! Interface name canonicalisation
//!
//! Switches report abbreviated names over IF-MIB (`Gi1/0/1`) while the
//! inventory stores full names (`GigabitEthernet1/0/1`). The mapping is total:
//! names with an unknown prefix are returned unchanged.

/// Known abbreviations (lowercase) and their canonical spelling
const BASE_INTERFACES: &[(&str, &str)] = &[
    ("ap", "AppGigabitEthernet"),
    ("appgigabitethernet", "AppGigabitEthernet"),
    ("at", "ATM"),
    ("atm", "ATM"),
    ("bd", "BDI"),
    ("bdi", "BDI"),
    ("e", "Ethernet"),
    ("eth", "Ethernet"),
    ("et", "Ethernet"),
    ("ethernet", "Ethernet"),
    ("fa", "FastEthernet"),
    ("fas", "FastEthernet"),
    ("fastethernet", "FastEthernet"),
    ("fi", "FiveGigabitEthernet"),
    ("fivegigabitethernet", "FiveGigabitEthernet"),
    ("fo", "FortyGigabitEthernet"),
    ("fortygige", "FortyGigabitEthernet"),
    ("fortygigabitethernet", "FortyGigabitEthernet"),
    ("g", "GigabitEthernet"),
    ("gi", "GigabitEthernet"),
    ("gig", "GigabitEthernet"),
    ("ge", "GigabitEthernet"),
    ("gigabitethernet", "GigabitEthernet"),
    ("hu", "HundredGigE"),
    ("hundredgige", "HundredGigE"),
    ("hundredgigabitethernet", "HundredGigE"),
    ("lo", "Loopback"),
    ("loopback", "Loopback"),
    ("ma", "Management"),
    ("mgmt", "Management"),
    ("management", "Management"),
    ("nv", "nve"),
    ("nve", "nve"),
    ("po", "Port-channel"),
    ("port-channel", "Port-channel"),
    ("se", "Serial"),
    ("serial", "Serial"),
    ("te", "TenGigabitEthernet"),
    ("ten", "TenGigabitEthernet"),
    ("tengig", "TenGigabitEthernet"),
    ("tengige", "TenGigabitEthernet"),
    ("tengigabitethernet", "TenGigabitEthernet"),
    ("tu", "Tunnel"),
    ("tunnel", "Tunnel"),
    ("tw", "TwoGigabitEthernet"),
    ("twogigabitethernet", "TwoGigabitEthernet"),
    ("twe", "TwentyFiveGigE"),
    ("twentyfivegige", "TwentyFiveGigE"),
    ("twentyfivegigabitethernet", "TwentyFiveGigE"),
    ("vl", "Vlan"),
    ("vlan", "Vlan"),
];

/// Expand a vendor-abbreviated interface name to its canonical form
pub fn canonical_interface_name(name: &str) -> String {
    let split_at = name
        .find(|c: char| !(c.is_ascii_alphabetic() || c == '-'))
        .unwrap_or(name.len());
    let (prefix, rest) = name.split_at(split_at);

    if prefix.is_empty() {
        return name.to_string();
    }

    let lowered = prefix.to_ascii_lowercase();
    match BASE_INTERFACES.iter().find(|(alias, _)| *alias == lowered) {
        Some((_, canonical)) => format!("{}{}", canonical, rest),
        None => name.to_string(),
    }
}
