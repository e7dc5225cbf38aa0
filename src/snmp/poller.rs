//! Bounded concurrent SNMP poller
//!
//! One call to [`Poller::poll`] is one wave: every job is handed to a fixed
//! pool of workers through a bounded channel, each worker walks its host's
//! subtrees one after another, and the caller gets the complete result set
//! back only once every host has answered or failed. With `workers` workers
//! at most `workers` walks are in flight across the whole wave.

use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

use super::oids::format_oid;
use super::transport::{PollError, SnmpTransport, VarBind};

/// Walks to perform against one host
#[derive(Debug, Clone)]
pub struct PollJob {
    pub host: Ipv4Addr,
    pub community: String,
    pub roots: Vec<&'static [u64]>,
}

impl PollJob {
    pub fn new(host: Ipv4Addr, community: impl Into<String>, roots: &[&'static [u64]]) -> Self {
        Self {
            host,
            community: community.into(),
            roots: roots.to_vec(),
        }
    }
}

/// Walked subtrees of one host, keyed by subtree root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubtreeTables {
    tables: HashMap<&'static [u64], Vec<VarBind>>,
}

impl SubtreeTables {
    pub fn insert(&mut self, root: &'static [u64], rows: Vec<VarBind>) {
        self.tables.insert(root, rows);
    }

    /// Rows of one subtree; `None` if that subtree was not walked
    pub fn get(&self, root: &[u64]) -> Option<&[VarBind]> {
        self.tables.get(root).map(Vec::as_slice)
    }
}

/// Outcome for one host: all requested subtrees, or the first error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPoll {
    pub host: Ipv4Addr,
    pub outcome: Result<SubtreeTables, PollError>,
}

/// Fan-out/fan-in SNMP poller with a fixed worker pool
#[derive(Clone)]
pub struct Poller {
    transport: Arc<dyn SnmpTransport>,
    workers: usize,
}

impl Poller {
    pub fn new(transport: Arc<dyn SnmpTransport>, workers: usize) -> Self {
        Self {
            transport,
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Walk the same subtrees with the same community on every host
    pub async fn poll_hosts(
        &self,
        hosts: &[Ipv4Addr],
        community: &str,
        roots: &[&'static [u64]],
    ) -> Vec<HostPoll> {
        let jobs = hosts
            .iter()
            .map(|&host| PollJob::new(host, community, roots))
            .collect();
        self.poll(jobs).await
    }

    /// Run one wave. Returns exactly one [`HostPoll`] per job, in completion
    /// order.
    pub async fn poll(&self, jobs: Vec<PollJob>) -> Vec<HostPoll> {
        let total = jobs.len();
        if total == 0 {
            return Vec::new();
        }

        let worker_count = self.workers.min(total);
        crate::log_debug!(
            "Polling wave: {} hosts, {} workers",
            total,
            worker_count
        );

        let (job_tx, job_rx) = mpsc::channel::<(usize, PollJob)>(worker_count);
        let job_rx = Arc::new(Mutex::new(job_rx));
        // Room for every result so workers never block on the collector.
        let (result_tx, mut result_rx) = mpsc::channel::<(usize, HostPoll)>(total);

        let mut handles = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let job_rx = Arc::clone(&job_rx);
            let result_tx = result_tx.clone();
            let transport = Arc::clone(&self.transport);

            handles.push(tokio::spawn(async move {
                loop {
                    let next = job_rx.lock().await.recv().await;
                    let Some((seq, job)) = next else {
                        break;
                    };
                    let outcome = walk_host(transport.as_ref(), &job).await;
                    let polled = HostPoll {
                        host: job.host,
                        outcome,
                    };
                    if result_tx.send((seq, polled)).await.is_err() {
                        break;
                    }
                }
            }));
        }
        drop(result_tx);

        let hosts: Vec<Ipv4Addr> = jobs.iter().map(|job| job.host).collect();
        for (seq, job) in jobs.into_iter().enumerate() {
            if job_tx.send((seq, job)).await.is_err() {
                crate::log_warn!("All SNMP workers exited before the wave was queued");
                break;
            }
        }
        drop(job_tx);

        let mut seen = HashSet::with_capacity(total);
        let mut results = Vec::with_capacity(total);
        while let Some((seq, polled)) = result_rx.recv().await {
            seen.insert(seq);
            results.push(polled);
        }

        for handle in handles {
            if let Err(e) = handle.await {
                crate::log_warn!("SNMP worker failed: {}", e);
            }
        }

        // A worker that panicked mid-walk leaves its host without a result.
        for (seq, host) in hosts.into_iter().enumerate() {
            if !seen.contains(&seq) {
                results.push(HostPoll {
                    host,
                    outcome: Err(PollError::Transport("poll worker aborted".to_string())),
                });
            }
        }

        let failed = results.iter().filter(|r| r.outcome.is_err()).count();
        crate::log_debug!(
            "Polling wave complete: {} ok, {} failed",
            results.len() - failed,
            failed
        );

        results
    }
}

/// Walk every subtree of one job, stopping at the first failure
async fn walk_host(transport: &dyn SnmpTransport, job: &PollJob) -> Result<SubtreeTables, PollError> {
    let mut tables = SubtreeTables::default();
    for &root in &job.roots {
        match transport.bulk_walk(job.host, &job.community, root).await {
            Ok(rows) => tables.insert(root, rows),
            Err(e) => {
                crate::log_debug!("Walk of {} on {} failed: {}", format_oid(root), job.host, e);
                return Err(e);
            }
        }
    }
    Ok(tables)
}
