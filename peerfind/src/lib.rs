//! # peerfind
//!
//! Find the peers of a clustered service from DNS.
//!
//! peerfind polls the SRV records of a service, keeps the last membership it
//! saw and hands every change to a consumer. The service domain is derived
//! once at startup, either from an explicit cluster suffix or from the
//! resolver's search list.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use peerfind::{DiscoveryConfig, DomainResolver, PeerFinder, StaticLookup};
//!
//! let config = DiscoveryConfig::new("default", Some("cluster.local".into()), "db").unwrap();
//! let domains = DomainResolver::new();
//!
//! let lookup = Arc::new(StaticLookup::new());
//! let finder = PeerFinder::from_config(lookup, &config, &domains).unwrap();
//! assert_eq!(finder.domain(), Some("default.svc.cluster.local"));
//! ```
//!
//! ## Features
//!
//! - `dns` (default) - SRV lookups through hickory-resolver
//!
//! ## Architecture
//!
//! - [`peerfind-core`] - Peer set, configuration and error types
//! - [`peerfind-discovery`] - Lookup backends, domain derivation and the poll loop

mod hook;

pub use hook::{HookError, OnChangeHook};

// Re-export core types
pub use peerfind_core::{ConfigError, DiscoveryConfig, LookupError, PeerFindError, PeerSet};

// Re-export discovery
pub use peerfind_discovery::{
    ChangeSender, DEFAULT_POLL_PERIOD, DomainResolver, FinderConfig, NAMESPACE_ENV, PeerFinder,
    PeerLookup, RESOLV_CONF, StaticLookup, change_channel,
};

#[cfg(feature = "dns")]
pub use peerfind_discovery::DnsLookup;

/// Prelude module for convenient imports.
///
/// ```rust
/// use peerfind::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{DiscoveryConfig, DomainResolver, FinderConfig, PeerFinder, PeerLookup, PeerSet};
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
