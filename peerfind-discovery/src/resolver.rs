//! Lookup trait and the in-memory backend.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use peerfind_core::{LookupError, PeerSet};

/// Trait for peer lookup backends.
///
/// A lookup is a pure function of the backend's state at call time: it
/// returns a freshly built [`PeerSet`] and has no other side effects.
///
/// ## Example
///
/// ```rust
/// use peerfind_discovery::StaticLookup;
///
/// let lookup = StaticLookup::new();
/// lookup.add_peer("db", "db-0.db.default.svc.cluster.local");
///
/// // Lookups are async:
/// // let peers = lookup.lookup("db").await?;
/// ```
pub trait PeerLookup: Send + Sync + 'static {
    /// Resolve a service name to the hosts currently serving it.
    fn lookup(&self, service: &str) -> impl Future<Output = Result<PeerSet, LookupError>> + Send;
}

/// A lookup backend serving in-memory peer sets.
///
/// Useful for testing, or when peers are fed from somewhere other than DNS.
/// Services can be changed while a finder is polling.
pub struct StaticLookup {
    services: DashMap<String, PeerSet>,
    lookups: AtomicUsize,
}

impl StaticLookup {
    /// Create an empty static lookup.
    #[must_use]
    pub fn new() -> Self {
        Self {
            services: DashMap::new(),
            lookups: AtomicUsize::new(0),
        }
    }

    /// Replace the peers of a service.
    pub fn set_peers(&self, service: impl Into<String>, peers: PeerSet) {
        self.services.insert(service.into(), peers);
    }

    /// Add a single peer to a service.
    pub fn add_peer(&self, service: impl Into<String>, host: impl Into<String>) {
        self.services
            .entry(service.into())
            .or_default()
            .insert(host);
    }

    /// Forget a service. Lookups for it fail until it is set again.
    pub fn remove_service(&self, service: &str) {
        self.services.remove(service);
    }

    /// Number of lookups served so far, failed ones included.
    #[must_use]
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }
}

impl Default for StaticLookup {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerLookup for StaticLookup {
    async fn lookup(&self, service: &str) -> Result<PeerSet, LookupError> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        self.services
            .get(service)
            .map(|peers| peers.clone())
            .ok_or_else(|| LookupError::NotFound(service.to_string()))
    }
}

impl<L: PeerLookup> PeerLookup for std::sync::Arc<L> {
    fn lookup(&self, service: &str) -> impl Future<Output = Result<PeerSet, LookupError>> + Send {
        (**self).lookup(service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_lookup() {
        let lookup = StaticLookup::new();
        lookup.add_peer("db", "db-0");
        lookup.add_peer("db", "db-1");
        lookup.add_peer("db", "db-1");

        let peers = lookup.lookup("db").await.unwrap();
        assert_eq!(peers.len(), 2);
        assert_eq!(lookup.lookups(), 1);
    }

    #[tokio::test]
    async fn test_static_lookup_not_found() {
        let lookup = StaticLookup::new();
        let result = lookup.lookup("unknown").await;
        assert!(matches!(result, Err(LookupError::NotFound(_))));
        assert_eq!(lookup.lookups(), 1);
    }

    #[tokio::test]
    async fn test_remove_service() {
        let lookup = StaticLookup::new();
        lookup.set_peers("db", ["db-0"].into_iter().collect());
        assert!(lookup.lookup("db").await.is_ok());

        lookup.remove_service("db");
        assert!(lookup.lookup("db").await.is_err());
    }
}
