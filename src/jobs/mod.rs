//! Port history jobs
//!
//! Both jobs take an immutable [`RunContext`], poll in strictly sequential
//! waves through the shared [`Poller`], and reconcile what they learned
//! against the result store fact by fact.

pub mod idle_ports;
pub mod mac_on_ports;

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

use crate::config::Settings;
use crate::database::Database;
use crate::inventory::Inventory;
use crate::models::Principal;
use crate::network::HostnameResolver;
use crate::snmp::{PollError, Poller, SnmpTransport, SubtreeTables, VarBind};

pub use idle_ports::{IdleState, classify, run_unused_ports};
pub use mac_on_ports::run_mac_on_ports;

/// Everything one job run reads. Built once, never mutated.
#[derive(Clone)]
pub struct RunContext {
    pub settings: Settings,
    pub inventory: Arc<dyn Inventory>,
    pub poller: Poller,
    pub resolver: Arc<dyn HostnameResolver>,
    pub db: Database,
    /// Wall-clock reference for every timestamp written by the run
    pub now: DateTime<Utc>,
}

impl RunContext {
    pub fn new(
        settings: Settings,
        inventory: Arc<dyn Inventory>,
        transport: Arc<dyn SnmpTransport>,
        resolver: Arc<dyn HostnameResolver>,
        db: Database,
    ) -> Self {
        let poller = Poller::new(transport, settings.workers);
        Self {
            settings,
            inventory,
            poller,
            resolver,
            db,
            now: Utc::now(),
        }
    }

    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }
}

/// Only administrative principals may run a job. Refusal is logged and
/// treated as a no-op.
fn authorize(principal: &Principal, job: &str) -> bool {
    if !principal.is_superuser {
        crate::log_stderr!(
            "Refusing {} run for {}: administrative capability required",
            job,
            principal.name
        );
        return false;
    }
    true
}

/// One wave over `hosts` walking a single subtree. Every host gets an entry.
async fn poll_wave(
    poller: &Poller,
    hosts: &[Ipv4Addr],
    community: &str,
    root: &'static [u64],
) -> BTreeMap<Ipv4Addr, Result<SubtreeTables, PollError>> {
    poller
        .poll_hosts(hosts, community, &[root])
        .await
        .into_iter()
        .map(|polled| (polled.host, polled.outcome))
        .collect()
}

/// Rows of a walked subtree; a subtree that was not returned counts as empty
fn rows<'a>(tables: &'a SubtreeTables, root: &[u64]) -> &'a [VarBind] {
    tables.get(root).unwrap_or(&[])
}

/// Log a failed store operation and carry on with the run
fn stored<T>(result: anyhow::Result<T>, what: &str) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            crate::log_error!("Store update failed ({}): {:#}", what, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_superusers_are_authorized() {
        assert!(authorize(&Principal::new("admin", true), "unused-ports"));
        assert!(!authorize(&Principal::new("guest", false), "unused-ports"));
    }

    #[test]
    fn stored_swallows_errors() {
        assert_eq!(stored(Ok(3), "ok"), Some(3));
        assert_eq!(stored::<i32>(Err(anyhow::anyhow!("boom")), "fail"), None);
    }
}
