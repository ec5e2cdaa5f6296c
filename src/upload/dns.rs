//! Round-robin DNS cache.
//!
//! Each hit within the TTL rotates the cached address list, so successive
//! connections spread over every address of the intake.

use parking_lot::Mutex;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use std::collections::HashMap;
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DnsError {
    #[error("Unable to resolve host {host}: {reason}")]
    Resolution { host: String, reason: String },
    #[error("No address found for host {0}")]
    NoAddresses(String),
}

/// Underlying resolver queried on cache misses.
pub trait HostResolver: Send + Sync + 'static {
    fn resolve(&self, host: &str) -> impl Future<Output = Result<Vec<IpAddr>, DnsError>> + Send;
}

/// Resolver backed by the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemHostResolver;

impl HostResolver for SystemHostResolver {
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, DnsError> {
        let addresses = tokio::net::lookup_host((host, 0))
            .await
            .map_err(|e| DnsError::Resolution {
                host: host.to_string(),
                reason: e.to_string(),
            })?;
        let mut ips: Vec<IpAddr> = Vec::new();
        for address in addresses {
            if !ips.contains(&address.ip()) {
                ips.push(address.ip());
            }
        }
        Ok(ips)
    }
}

#[derive(Debug, Clone)]
struct ResolvedHost {
    addresses: Vec<IpAddr>,
    resolved_at: Instant,
}

impl ResolvedHost {
    fn is_valid(&self, ttl: Duration) -> bool {
        !self.addresses.is_empty() && self.resolved_at.elapsed() < ttl
    }
}

struct Inner<R> {
    delegate: R,
    ttl: Duration,
    cache: Mutex<HashMap<String, ResolvedHost>>,
}

/// Caching resolver usable as a reqwest DNS resolver.
pub struct RotatingDnsResolver<R = SystemHostResolver> {
    inner: Arc<Inner<R>>,
}

impl<R> Clone for RotatingDnsResolver<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Default for RotatingDnsResolver<SystemHostResolver> {
    fn default() -> Self {
        Self::new(SystemHostResolver, DEFAULT_TTL)
    }
}

impl<R: HostResolver> RotatingDnsResolver<R> {
    pub fn new(delegate: R, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                delegate,
                ttl,
                cache: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Addresses for `host`, rotated by one position on every cache hit.
    pub async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>, DnsError> {
        if let Some(addresses) = self.rotate_cached(host) {
            return Ok(addresses);
        }

        let addresses = self.inner.delegate.resolve(host).await?;
        self.inner.cache.lock().insert(
            host.to_string(),
            ResolvedHost {
                addresses: addresses.clone(),
                resolved_at: Instant::now(),
            },
        );
        Ok(addresses)
    }

    fn rotate_cached(&self, host: &str) -> Option<Vec<IpAddr>> {
        let mut cache = self.inner.cache.lock();
        let entry = cache.get_mut(host)?;
        if !entry.is_valid(self.inner.ttl) {
            return None;
        }
        entry.addresses.rotate_left(1);
        Some(entry.addresses.clone())
    }
}

impl<R: HostResolver> Resolve for RotatingDnsResolver<R> {
    fn resolve(&self, name: Name) -> Resolving {
        let resolver = self.clone();
        Box::pin(async move {
            let host = name.as_str();
            let addresses = resolver.lookup(host).await?;
            if addresses.is_empty() {
                return Err(Box::new(DnsError::NoAddresses(host.to_string())) as _);
            }
            // Port 0 is replaced by the connector with the request port.
            let addrs: Addrs = Box::new(
                addresses
                    .into_iter()
                    .map(|ip| SocketAddr::new(ip, 0))
                    .collect::<Vec<_>>()
                    .into_iter(),
            );
            Ok(addrs)
        })
    }
}
