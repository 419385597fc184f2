//! # peerfind-discovery
//!
//! DNS-based peer discovery for clustered services.
//!
//! This crate provides:
//! - `PeerLookup` trait for lookup backends
//! - `DnsLookup` for SRV lookups against the cluster DNS (with `dns` feature)
//! - `DomainResolver` for deriving the service domain from the search list
//! - `PeerFinder`, the poll loop that reports membership changes

mod domain;
mod finder;
mod resolver;

#[cfg(feature = "dns")]
mod dns;

pub use domain::{DomainResolver, NAMESPACE_ENV, RESOLV_CONF, domain_from_search, search_domains};
pub use finder::{ChangeSender, DEFAULT_POLL_PERIOD, FinderConfig, PeerFinder, change_channel};
pub use resolver::{PeerLookup, StaticLookup};

#[cfg(feature = "dns")]
pub use dns::DnsLookup;
