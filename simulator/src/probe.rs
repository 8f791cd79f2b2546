//! Best-effort TCP reachability probe.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::net::{lookup_host, TcpStream};
use tracing::debug;

/// Outcome of a reachability probe.
///
/// Diagnostic only: reported alongside the firewall decision, never feeding
/// back into it. A blocked destination can still show OPEN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Reachability {
    Open,
    Closed,
    Unresolvable,
}

impl Reachability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Closed => "CLOSED",
            Self::Unresolvable => "UNRESOLVABLE",
        }
    }
}

impl std::fmt::Display for Reachability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attempt a TCP connect to (ip, port) within `timeout`.
///
/// Total: every failure mode collapses into one of the three outcomes.
/// Resolution failure (hostname that does not resolve, malformed address)
/// maps to UNRESOLVABLE; a connection established inside the timeout maps to
/// OPEN; refusal, timeout and any other transport error map to CLOSED. The
/// connection is dropped on every exit path.
pub async fn probe(ip: &str, port: u16, timeout: Duration) -> Reachability {
    let mut addrs = match lookup_host((ip, port)).await {
        Ok(addrs) => addrs,
        Err(e) => {
            debug!("Probe {}:{} failed to resolve: {}", ip, port, e);
            return Reachability::Unresolvable;
        }
    };
    let Some(addr) = addrs.next() else {
        debug!("Probe {}:{} resolved to no addresses", ip, port);
        return Reachability::Unresolvable;
    };

    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_stream)) => Reachability::Open,
        Ok(Err(e)) => {
            debug!("Probe {}:{} connect failed: {}", ip, port, e);
            Reachability::Closed
        }
        Err(_) => {
            debug!("Probe {}:{} timed out", ip, port);
            Reachability::Closed
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    const TIMEOUT: Duration = Duration::from_millis(500);

    #[tokio::test]
    async fn test_listening_port_is_open() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        assert_eq!(probe("127.0.0.1", port, TIMEOUT).await, Reachability::Open);
    }

    #[tokio::test]
    async fn test_closed_port_is_closed() {
        // Bind to grab a free port, then release it before probing.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        assert_eq!(probe("127.0.0.1", port, TIMEOUT).await, Reachability::Closed);
    }

    #[tokio::test]
    async fn test_bad_hostname_is_unresolvable() {
        let got = probe("firewall-sim.invalid", 80, TIMEOUT).await;
        assert_eq!(got, Reachability::Unresolvable);
    }

    #[tokio::test]
    async fn test_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Reachability::Open).unwrap(), "\"OPEN\"");
        assert_eq!(
            serde_json::to_string(&Reachability::Unresolvable).unwrap(),
            "\"UNRESOLVABLE\""
        );
    }
}
