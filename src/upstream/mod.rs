//! Outbound calls to downstream peers.

pub mod caller;

pub use caller::{HttpPeerCaller, PeerCaller};
