//! Reverse DNS lookup for resolved host addresses
//!
//! Best effort: a failed or timed-out lookup yields no hostname and never
//! surfaces as an error.

use dns_lookup::lookup_addr;
use std::collections::HashMap;
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr};
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};

use crate::config::{DNS_TIMEOUT, MAX_CONCURRENT_DNS};

pub type ResolveFuture<'a> = Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>>;

/// Hostname-from-address lookup
pub trait HostnameResolver: Send + Sync {
    fn resolve(&self, ip: Ipv4Addr) -> ResolveFuture<'_>;
}

/// Resolver backed by the system resolver (`getnameinfo`)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl HostnameResolver for SystemResolver {
    fn resolve(&self, ip: Ipv4Addr) -> ResolveFuture<'_> {
        Box::pin(async move {
            match tokio::time::timeout(
                DNS_TIMEOUT,
                tokio::task::spawn_blocking(move || reverse_lookup(ip)),
            )
            .await
            {
                Ok(Ok(hostname)) => hostname,
                Ok(Err(e)) => {
                    crate::log_warn!("DNS worker join failed for {}: {}", ip, e);
                    None
                }
                Err(_) => None,
            }
        })
    }
}

/// Perform reverse DNS lookup for a single IP address
pub fn reverse_lookup(ip: Ipv4Addr) -> Option<String> {
    let ip_addr = IpAddr::V4(ip);
    match lookup_addr(&ip_addr) {
        // Resolvers echo the address back when no PTR record exists.
        Ok(hostname) if hostname != ip.to_string() => Some(hostname),
        _ => None,
    }
}

/// Resolve many addresses concurrently; unresolved addresses are absent
pub async fn dns_scan(
    resolver: &Arc<dyn HostnameResolver>,
    ips: &[Ipv4Addr],
) -> HashMap<Ipv4Addr, String> {
    if ips.is_empty() {
        return HashMap::new();
    }

    crate::log_debug!("Reverse DNS lookup for {} addresses", ips.len());

    let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_DNS));
    let results = Arc::new(Mutex::new(HashMap::new()));

    let mut handles = Vec::new();

    for &ip in ips {
        let semaphore = Arc::clone(&semaphore);
        let results = Arc::clone(&results);
        let resolver = Arc::clone(resolver);

        let handle = tokio::spawn(async move {
            let _permit = match semaphore.acquire().await {
                Ok(permit) => permit,
                Err(e) => {
                    crate::log_warn!("DNS semaphore acquire failed for {}: {}", ip, e);
                    return;
                }
            };

            if let Some(hostname) = resolver.resolve(ip).await {
                results.lock().await.insert(ip, hostname);
            }
        });

        handles.push(handle);
    }

    for handle in handles {
        if let Err(e) = handle.await {
            crate::log_warn!("DNS lookup task failed: {}", e);
        }
    }

    let resolved = results.lock().await;
    crate::log_debug!("{} of {} addresses resolved", resolved.len(), ips.len());

    resolved.clone()
}
