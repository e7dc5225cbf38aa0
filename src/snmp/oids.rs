//! OID subtrees walked by the jobs (u64 arcs, as snmp2 expects)

/// SNMP-FRAMEWORK-MIB snmpEngineTime: seconds since the agent (re)started
pub const OID_ENGINE_TIME: &[u64] = &[1, 3, 6, 1, 6, 3, 10, 2, 1, 3];

/// IF-MIB ifName: ifIndex -> short interface name
pub const OID_IF_NAME: &[u64] = &[1, 3, 6, 1, 2, 1, 31, 1, 1, 1, 1];

/// OLD-CISCO-INTERFACES-MIB locIfLastOut: ifIndex -> time since last output
pub const OID_LOC_IF_LAST_OUT: &[u64] = &[1, 3, 6, 1, 4, 1, 9, 2, 2, 1, 1, 4];

/// BRIDGE-MIB dot1dBasePortIfIndex: bridge port -> ifIndex
pub const OID_BASE_PORT_IF_INDEX: &[u64] = &[1, 3, 6, 1, 2, 1, 17, 1, 4, 1, 2];

/// BRIDGE-MIB dot1dTpFdbPort: MAC (as six arcs) -> bridge port
pub const OID_TP_FDB_PORT: &[u64] = &[1, 3, 6, 1, 2, 1, 17, 4, 3, 1, 2];

/// RFC1213 atPhysAddress: ifIndex.1.a.b.c.d -> MAC octets
pub const OID_AT_PHYS_ADDRESS: &[u64] = &[1, 3, 6, 1, 2, 1, 3, 1, 1, 2];

/// Dotted rendering with a leading dot (".1.3.6.1...")
pub fn format_oid(arcs: &[u64]) -> String {
    arcs.iter().map(|arc| format!(".{}", arc)).collect()
}

/// Parse a dotted OID, with or without the leading dot
pub fn parse_oid(raw: &str) -> Option<Vec<u64>> {
    let trimmed = raw.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        return None;
    }
    trimmed.split('.').map(|arc| arc.parse::<u64>().ok()).collect()
}
