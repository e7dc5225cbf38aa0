//! SNMP bulk-walk transport
//!
//! The jobs only need one primitive: walk an OID subtree on one host with one
//! community and get back every (OID, value) pair below it. `SnmpTransport`
//! is that seam; `Snmp2Transport` implements it over SNMPv2c GETBULK.

use snmp2::{AsyncSession, Oid, Value};
use std::fmt;
use std::future::Future;
use std::net::Ipv4Addr;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::timeout;

use crate::config::{SNMP_MAX_REPETITIONS, SNMP_RETRIES, SNMP_TIMEOUT};
use crate::snmp::oids::format_oid;

/// Owned copy of a varbind value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnmpValue {
    Integer(i64),
    OctetString(Vec<u8>),
    /// Counter32, Gauge32/Unsigned32 and Counter64
    Unsigned(u64),
    Timeticks(u32),
    IpAddress([u8; 4]),
    ObjectIdentifier(Vec<u64>),
    Null,
    /// endOfMibView, noSuchObject, noSuchInstance
    EndOfView,
    Other,
}

impl SnmpValue {
    /// Numeric view of integer-like values
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SnmpValue::Integer(v) => Some(*v),
            SnmpValue::Unsigned(v) => i64::try_from(*v).ok(),
            SnmpValue::Timeticks(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            SnmpValue::OctetString(bytes) => Some(bytes),
            _ => None,
        }
    }

    fn from_wire(value: &Value<'_>) -> Self {
        match value {
            Value::Integer(v) => SnmpValue::Integer(*v),
            Value::OctetString(bytes) => SnmpValue::OctetString(bytes.to_vec()),
            Value::Counter32(v) | Value::Unsigned32(v) => SnmpValue::Unsigned(u64::from(*v)),
            Value::Counter64(v) => SnmpValue::Unsigned(*v),
            Value::Timeticks(v) => SnmpValue::Timeticks(*v),
            Value::IpAddress(octets) => SnmpValue::IpAddress(*octets),
            Value::ObjectIdentifier(oid) => oid
                .iter()
                .map(|arcs| SnmpValue::ObjectIdentifier(arcs.collect()))
                .unwrap_or(SnmpValue::Other),
            Value::Null => SnmpValue::Null,
            Value::EndOfMibView | Value::NoSuchObject | Value::NoSuchInstance => {
                SnmpValue::EndOfView
            }
            _ => SnmpValue::Other,
        }
    }
}

/// One (OID, value) pair returned by a walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarBind {
    pub oid: Vec<u64>,
    pub value: SnmpValue,
}

impl VarBind {
    pub fn new(oid: Vec<u64>, value: SnmpValue) -> Self {
        Self { oid, value }
    }

    /// Arcs after `root`, or `None` when the varbind is outside the subtree
    pub fn index<'a>(&'a self, root: &[u64]) -> Option<&'a [u64]> {
        self.oid.strip_prefix(root)
    }
}

/// Failure of one (host, subtree) walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollError {
    /// No reply within the timeout, after all retries
    Timeout,
    /// Socket could not be opened or the host refused
    Unreachable(String),
    /// The reply could not be decoded
    Malformed(String),
    /// The agent answered with a noAccess/authorization error
    Permission,
    /// Any other transport failure
    Transport(String),
}

impl fmt::Display for PollError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollError::Timeout => write!(f, "timeout"),
            PollError::Unreachable(cause) => write!(f, "unreachable: {}", cause),
            PollError::Malformed(cause) => write!(f, "malformed reply: {}", cause),
            PollError::Permission => write!(f, "permission denied"),
            PollError::Transport(cause) => write!(f, "transport error: {}", cause),
        }
    }
}

impl std::error::Error for PollError {}

impl PollError {
    /// Map a non-zero PDU error-status
    fn from_error_status(status: u32) -> Self {
        match status {
            // noAccess, authorizationError
            6 | 16 => PollError::Permission,
            other => PollError::Transport(format!("error-status {}", other)),
        }
    }
}

pub type WalkFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<VarBind>, PollError>> + Send + 'a>>;

/// Bulk-walk of one OID subtree on one host
pub trait SnmpTransport: Send + Sync {
    fn bulk_walk<'a>(&'a self, host: Ipv4Addr, community: &'a str, root: &'a [u64])
    -> WalkFuture<'a>;
}

/// SNMPv2c transport over `snmp2::AsyncSession`
#[derive(Debug, Clone)]
pub struct Snmp2Transport {
    port: u16,
    attempt_timeout: Duration,
    retries: u32,
    max_repetitions: u32,
}

impl Snmp2Transport {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            attempt_timeout: SNMP_TIMEOUT,
            retries: SNMP_RETRIES,
            max_repetitions: SNMP_MAX_REPETITIONS,
        }
    }

    async fn walk(
        &self,
        host: Ipv4Addr,
        community: &str,
        root: &[u64],
    ) -> Result<Vec<VarBind>, PollError> {
        let addr = format!("{}:{}", host, self.port);

        let mut session = match timeout(
            self.attempt_timeout,
            AsyncSession::new_v2c(&addr, community.as_bytes(), 0),
        )
        .await
        {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => return Err(PollError::Unreachable(e.to_string())),
            Err(_) => return Err(PollError::Timeout),
        };

        let mut collected = Vec::new();
        let mut cursor = root.to_vec();

        'walk: loop {
            let page = self.getbulk(&mut session, &cursor).await?;
            if page.is_empty() {
                break;
            }

            for varbind in page {
                if varbind.index(root).is_none()
                    || varbind.value == SnmpValue::EndOfView
                    || varbind.oid <= cursor
                {
                    break 'walk;
                }
                cursor.clone_from(&varbind.oid);
                collected.push(varbind);
            }
        }

        crate::log_debug!(
            "Walked {} on {}: {} entries",
            format_oid(root),
            host,
            collected.len()
        );

        Ok(collected)
    }

    async fn getbulk(
        &self,
        session: &mut AsyncSession,
        cursor: &[u64],
    ) -> Result<Vec<VarBind>, PollError> {
        let oid = Oid::from(cursor)
            .map_err(|e| PollError::Malformed(format!("{} ({:?})", format_oid(cursor), e)))?;

        let mut last_error = PollError::Timeout;

        for _attempt in 0..=self.retries {
            match timeout(
                self.attempt_timeout,
                session.getbulk(&[&oid], 0, self.max_repetitions),
            )
            .await
            {
                Ok(Ok(response)) => {
                    if response.error_status != 0 {
                        return Err(PollError::from_error_status(response.error_status));
                    }
                    let mut page = Vec::new();
                    for (name, value) in response.varbinds {
                        let arcs: Vec<u64> = name
                            .iter()
                            .map(|arcs| arcs.collect())
                            .ok_or_else(|| PollError::Malformed("oversized OID arc".into()))?;
                        page.push(VarBind::new(arcs, SnmpValue::from_wire(&value)));
                    }
                    return Ok(page);
                }
                Ok(Err(e)) => last_error = PollError::Transport(format!("{:?}", e)),
                Err(_) => last_error = PollError::Timeout,
            }
        }

        Err(last_error)
    }
}

impl SnmpTransport for Snmp2Transport {
    fn bulk_walk<'a>(
        &'a self,
        host: Ipv4Addr,
        community: &'a str,
        root: &'a [u64],
    ) -> WalkFuture<'a> {
        Box::pin(self.walk(host, community, root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varbind_index_strips_root() {
        let vb = VarBind::new(vec![1, 3, 6, 1, 5, 7], SnmpValue::Integer(1));
        assert_eq!(vb.index(&[1, 3, 6, 1]), Some(&[5, 7][..]));
        assert_eq!(vb.index(&[1, 3, 6, 2]), None);
    }

    #[test]
    fn integer_like_values_expose_i64() {
        assert_eq!(SnmpValue::Integer(-1).as_i64(), Some(-1));
        assert_eq!(SnmpValue::Unsigned(42).as_i64(), Some(42));
        assert_eq!(SnmpValue::Timeticks(7).as_i64(), Some(7));
        assert_eq!(SnmpValue::OctetString(vec![1]).as_i64(), None);
    }

    #[test]
    fn error_status_mapping() {
        assert_eq!(PollError::from_error_status(16), PollError::Permission);
        assert_eq!(
            PollError::from_error_status(5),
            PollError::Transport("error-status 5".to_string())
        );
    }

    #[test]
    fn poll_error_display() {
        assert_eq!(PollError::Timeout.to_string(), "timeout");
        assert_eq!(
            PollError::Unreachable("no route".into()).to_string(),
            "unreachable: no route"
        );
    }
}
