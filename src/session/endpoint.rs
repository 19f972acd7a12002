//! Server endpoint with an explicit address-resolution policy.

use std::net::SocketAddr;
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::config::{ResolvePolicy, ServerConfig};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct Endpoint {
    address: String,
    policy: ResolvePolicy,
    resolved: Option<Vec<SocketAddr>>,
}

impl Endpoint {
    pub fn new(address: impl Into<String>, policy: ResolvePolicy) -> Self {
        Self {
            address: address.into(),
            policy,
            resolved: None,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.address.clone(), config.resolve_policy)
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Addresses from the last resolution, if cached.
    pub fn resolved(&self) -> Option<&[SocketAddr]> {
        self.resolved.as_deref()
    }

    /// Drop the cached resolution; the next connection resolves again.
    pub fn refresh(&mut self) {
        self.resolved = None;
    }

    async fn resolve(&mut self) -> std::io::Result<Vec<SocketAddr>> {
        if let Some(addrs) = &self.resolved {
            return Ok(addrs.clone());
        }
        let addrs: Vec<SocketAddr> = tokio::net::lookup_host(&self.address).await?.collect();
        debug!(address = %self.address, resolved = ?addrs, "Resolved server address");
        if self.policy == ResolvePolicy::Cached {
            self.resolved = Some(addrs.clone());
        }
        Ok(addrs)
    }

    /// Open a fresh connection. Any resolution or connect failure becomes
    /// [`Error::ConnectionFailed`].
    pub async fn connect(&mut self) -> Result<TcpStream> {
        let addrs = match self.resolve().await {
            Ok(addrs) => addrs,
            Err(e) => {
                warn!(error = %e, address = %self.address, "Failed to resolve server address");
                return Err(Error::ConnectionFailed);
            }
        };

        let mut last_error = None;
        for addr in addrs {
            match TcpStream::connect(addr).await {
                Ok(stream) => return Ok(stream),
                Err(e) => last_error = Some(e),
            }
        }

        warn!(error = ?last_error, address = %self.address, "Failed to connect to server");
        self.refresh();
        Err(Error::ConnectionFailed)
    }
}
