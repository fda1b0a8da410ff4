//! # Peer Registry
//!
//! The fixed list of downstream peers this node calls on every `/api/action`
//! request. Parsed once at startup and shared read-only across requests.

use std::sync::Arc;
use tracing::info;

use crate::core::error::{NodeError, NodeResult};
use crate::core::types::Peer;

/// Ordered, immutable set of downstream peers
#[derive(Debug, Clone)]
pub struct PeerRegistry {
    peers: Arc<[Peer]>,
}

impl Default for PeerRegistry {
    fn default() -> Self {
        Self::from_peers(Vec::new())
    }
}

impl PeerRegistry {
    /// Parse a comma-separated `address:port` list.
    ///
    /// All whitespace is stripped before parsing. An absent or empty list
    /// yields an empty registry. Any entry whose port does not parse is a
    /// configuration error; the caller treats it as fatal.
    pub fn build(raw_list: Option<&str>) -> NodeResult<Self> {
        let cleaned: String = raw_list
            .unwrap_or_default()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();

        if cleaned.is_empty() {
            return Ok(Self::default());
        }

        let peers = cleaned
            .split(',')
            .map(parse_peer)
            .collect::<NodeResult<Vec<_>>>()?;

        info!(
            peers = %peers.iter().map(ToString::to_string).collect::<Vec<_>>().join(","),
            "Loaded services"
        );

        Ok(Self::from_peers(peers))
    }

    pub fn from_peers(peers: Vec<Peer>) -> Self {
        Self {
            peers: peers.into(),
        }
    }

    pub fn peers(&self) -> &[Peer] {
        &self.peers
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Peers in registry order, without any entry addressing `identity`.
    /// A node never calls itself.
    pub fn callable_from<'a>(&'a self, identity: &'a str) -> impl Iterator<Item = &'a Peer> + 'a {
        self.peers.iter().filter(move |peer| peer.address != identity)
    }
}

fn parse_peer(entry: &str) -> NodeResult<Peer> {
    let (address, port) = entry
        .split_once(':')
        .ok_or_else(|| NodeError::config(format!("Invalid peer '{}': expected address:port", entry)))?;

    let port = port
        .parse::<u16>()
        .map_err(|e| NodeError::config(format!("Invalid port {} for peer '{}': {}", port, address, e)))?;

    Ok(Peer::new(address, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_and_empty_lists_are_empty() {
        assert!(PeerRegistry::build(None).unwrap().is_empty());
        assert!(PeerRegistry::build(Some("")).unwrap().is_empty());
        assert!(PeerRegistry::build(Some("   ")).unwrap().is_empty());
    }

    #[test]
    fn test_parses_in_order_with_whitespace_stripped() {
        let registry = PeerRegistry::build(Some(" service-b:8080, service-c : 9090 ")).unwrap();
        assert_eq!(
            registry.peers(),
            &[Peer::new("service-b", 8080), Peer::new("service-c", 9090)]
        );
    }

    #[test]
    fn test_malformed_port_is_fatal() {
        let err = PeerRegistry::build(Some("service-b:8080,service-c:http")).unwrap_err();
        assert!(matches!(err, NodeError::Configuration { .. }));
        assert!(err.to_string().contains("service-c"));
    }

    #[test]
    fn test_missing_port_is_fatal() {
        assert!(PeerRegistry::build(Some("service-b")).is_err());
    }

    #[test]
    fn test_out_of_range_port_is_fatal() {
        assert!(PeerRegistry::build(Some("service-b:70000")).is_err());
    }

    #[test]
    fn test_callable_from_skips_self() {
        let registry = PeerRegistry::build(Some("A:8080,B:8080,A:9090,C:8080")).unwrap();
        let callable: Vec<_> = registry.callable_from("A").map(|p| p.address.as_str()).collect();
        assert_eq!(callable, vec!["B", "C"]);
        assert_eq!(registry.len(), 4);
    }
}
