//! Access URL extraction from ready lines.

use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::sync::LazyLock;

use regex::Regex;

static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^ ]+").expect("url pattern is valid"));

/// First URL in `line`, with a wildcard host replaced by this machine's
/// outbound address.
#[must_use]
pub fn access_url(line: &str) -> Option<String> {
    let url = URL.find(line)?.as_str();
    if url.contains("0.0.0.0") {
        Some(url.replacen("0.0.0.0", &local_ip().to_string(), 1))
    } else {
        Some(url.to_string())
    }
}

/// Address of the interface used for outbound traffic, or loopback.
///
/// Connecting a UDP socket sends nothing; it only selects a route.
#[must_use]
pub fn local_ip() -> IpAddr {
    UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
        .and_then(|socket| {
            socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80))?;
            socket.local_addr()
        })
        .map(|addr| addr.ip())
        .ok()
        .filter(|ip| !ip.is_unspecified())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_url() {
        assert_eq!(
            access_url("main: server is listening on http://127.0.0.1:8080 - starting the main loop")
                .as_deref(),
            Some("http://127.0.0.1:8080")
        );
    }

    #[test]
    fn wildcard_host_is_replaced() {
        let url = access_url("INFO:     Uvicorn running on http://0.0.0.0:5000 (Press CTRL+C to quit)")
            .unwrap();
        assert!(!url.contains("0.0.0.0"));
        assert!(url.starts_with("http://"));
        assert!(url.ends_with(":5000"));
    }

    #[test]
    fn no_url() {
        assert_eq!(access_url("starting the main loop"), None);
    }
}
