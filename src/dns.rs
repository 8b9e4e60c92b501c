use dns_lookup::lookup_host;
use std::net::{IpAddr, Ipv4Addr};

use crate::error::PingError;

/// Resolve a hostname or IP literal to an IPv4 address. Runs before the
/// session is built, so a failure here means zero packets were sent.
pub async fn resolve_ipv4(hostname: &str) -> Result<Ipv4Addr, PingError> {
    // IP literals short-circuit the lookup
    if let Ok(addr) = hostname.parse::<Ipv4Addr>() {
        return Ok(addr);
    }

    let addresses = tokio::task::spawn_blocking({
        let hostname = hostname.to_string();
        move || lookup_host(&hostname)
    })
    .await
    .map_err(PingError::from_join_error)?
    .map_err(|e| PingError::Resolution {
        host: hostname.to_string(),
        reason: e.to_string(),
    })?;

    addresses
        .into_iter()
        .find_map(|addr| match addr {
            IpAddr::V4(v4) => Some(v4),
            IpAddr::V6(_) => None,
        })
        .ok_or_else(|| PingError::Resolution {
            host: hostname.to_string(),
            reason: "no IPv4 address found".to_string(),
        })
}
