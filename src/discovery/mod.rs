//! Static peer discovery from configuration.

pub mod registry;

pub use registry::PeerRegistry;
