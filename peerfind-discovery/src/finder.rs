//! The discovery loop.

use std::time::Duration;

use peerfind_core::{ConfigError, DiscoveryConfig, LookupError, PeerFindError, PeerSet};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::domain::DomainResolver;
use crate::resolver::PeerLookup;

/// Default time between two polls.
pub const DEFAULT_POLL_PERIOD: Duration = Duration::from_secs(1);

/// Configuration for the discovery loop.
#[derive(Debug, Clone)]
pub struct FinderConfig {
    /// Time to wait before each poll.
    pub poll_period: Duration,
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            poll_period: DEFAULT_POLL_PERIOD,
        }
    }
}

impl FinderConfig {
    /// Create a new finder configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the poll period.
    #[must_use]
    pub fn poll_period(mut self, period: Duration) -> Self {
        self.poll_period = period;
        self
    }
}

/// Producer side of the change notification channel.
///
/// A send completes only once the consumer has received the set, so the
/// loop never runs a poll while a notification is still waiting to be
/// taken. There is no timeout on this wait.
#[derive(Debug, Clone)]
pub struct ChangeSender {
    tx: mpsc::Sender<PeerSet>,
}

impl ChangeSender {
    /// Hand a peer set to the consumer and wait until it has been taken.
    pub async fn send(&self, peers: PeerSet) -> Result<(), PeerFindError> {
        self.tx
            .send(peers)
            .await
            .map_err(|_| PeerFindError::ConsumerClosed)?;

        // Capacity is one: the slot frees up when the consumer receives.
        let _permit = self
            .tx
            .reserve()
            .await
            .map_err(|_| PeerFindError::ConsumerClosed)?;

        Ok(())
    }
}

/// Create a change notification channel.
#[must_use]
pub fn change_channel() -> (ChangeSender, mpsc::Receiver<PeerSet>) {
    let (tx, rx) = mpsc::channel(1);
    (ChangeSender { tx }, rx)
}

/// Result of a single poll against the retained peer set.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PollOutcome {
    /// The lookup returned the retained membership.
    Unchanged,
    /// Membership differs from the retained set.
    Changed(PeerSet),
    /// The lookup failed; the retained set stays as it was.
    Failed(LookupError),
}

/// Polls a service and reports membership changes.
///
/// ## Example
///
/// ```rust
/// use std::sync::Arc;
/// use peerfind_discovery::{PeerFinder, StaticLookup};
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let lookup = Arc::new(StaticLookup::new());
/// lookup.add_peer("db", "db-0.db.default.svc.cluster.local");
///
/// let cancel = CancellationToken::new();
/// let (handle, mut changes) = PeerFinder::new(lookup, "db").spawn(cancel.clone());
///
/// let peers = changes.recv().await.unwrap();
/// assert!(peers.contains("db-0.db.default.svc.cluster.local"));
///
/// cancel.cancel();
/// handle.await.unwrap().unwrap();
/// # }
/// ```
pub struct PeerFinder<L> {
    lookup: L,
    service: String,
    domain: Option<String>,
    config: FinderConfig,
}

impl<L: PeerLookup> PeerFinder<L> {
    /// Create a finder polling `service` with the default configuration.
    #[must_use]
    pub fn new(lookup: L, service: impl Into<String>) -> Self {
        Self {
            lookup,
            service: service.into(),
            domain: None,
            config: FinderConfig::default(),
        }
    }

    /// Create a finder for a discovery configuration.
    ///
    /// The service domain is derived here, once. Failing to derive it is a
    /// startup error.
    pub fn from_config(
        lookup: L,
        config: &DiscoveryConfig,
        domains: &DomainResolver,
    ) -> Result<Self, ConfigError> {
        let domain = domains.resolve_config(config)?;

        let mut finder = Self::new(lookup, config.service());
        finder.domain = Some(domain);
        Ok(finder)
    }

    /// Set the loop configuration.
    #[must_use]
    pub fn with_config(mut self, config: FinderConfig) -> Self {
        self.config = config;
        self
    }

    /// Service being polled.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Service domain derived at construction, if any.
    #[must_use]
    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    /// Look the service up once and compare with `retained`.
    async fn poll(&self, retained: &PeerSet) -> PollOutcome {
        match self.lookup.lookup(&self.service).await {
            Ok(peers) if peers == *retained => PollOutcome::Unchanged,
            Ok(peers) => PollOutcome::Changed(peers),
            Err(e) => PollOutcome::Failed(e),
        }
    }

    /// Run until `cancel` fires.
    ///
    /// Starts from an empty peer set and sends every membership change on
    /// `changes`. Cancellation is checked between polls only; a lookup in
    /// flight runs to completion. Returns an error only if the consumer
    /// goes away.
    pub async fn run(
        self,
        cancel: CancellationToken,
        changes: ChangeSender,
    ) -> Result<(), PeerFindError> {
        tracing::debug!(
            service = %self.service,
            domain = self.domain.as_deref().unwrap_or(""),
            period = ?self.config.poll_period,
            "Starting peer discovery"
        );

        let mut peers = PeerSet::new();

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tracing::debug!(service = %self.service, "Peer discovery stopped");
                    return Ok(());
                }
                () = tokio::time::sleep(self.config.poll_period) => {}
            }

            match self.poll(&peers).await {
                PollOutcome::Unchanged => {
                    tracing::trace!(service = %self.service, "Peers unchanged");
                }
                PollOutcome::Failed(e) => {
                    tracing::warn!(service = %self.service, error = %e, "Peer lookup failed");
                }
                PollOutcome::Changed(new_peers) => {
                    tracing::info!(
                        service = %self.service,
                        added = new_peers.difference(&peers).count(),
                        removed = peers.difference(&new_peers).count(),
                        peers = %new_peers,
                        "Peer set changed"
                    );

                    peers = new_peers.clone();
                    changes.send(new_peers).await?;
                }
            }
        }
    }

    /// Spawn the loop on the current runtime.
    ///
    /// Returns the task handle and the receiving end of the change channel.
    pub fn spawn(
        self,
        cancel: CancellationToken,
    ) -> (JoinHandle<Result<(), PeerFindError>>, mpsc::Receiver<PeerSet>) {
        let (tx, rx) = change_channel();
        let handle = tokio::spawn(self.run(cancel, tx));
        (handle, rx)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::resolver::StaticLookup;

    fn peers(hosts: &[&str]) -> PeerSet {
        hosts.iter().copied().collect()
    }

    fn finder(lookup: &Arc<StaticLookup>) -> PeerFinder<Arc<StaticLookup>> {
        PeerFinder::new(Arc::clone(lookup), "db")
    }

    #[tokio::test]
    async fn test_poll_outcomes() {
        let lookup = Arc::new(StaticLookup::new());
        let finder = finder(&lookup);

        let outcome = finder.poll(&PeerSet::new()).await;
        assert!(matches!(outcome, PollOutcome::Failed(LookupError::NotFound(_))));

        lookup.set_peers("db", peers(&["b", "a"]));
        assert_eq!(
            finder.poll(&PeerSet::new()).await,
            PollOutcome::Changed(peers(&["a", "b"]))
        );
        assert_eq!(finder.poll(&peers(&["a", "b"])).await, PollOutcome::Unchanged);
    }

    #[tokio::test(start_paused = true)]
    async fn test_notifies_on_change() {
        let lookup = Arc::new(StaticLookup::new());
        lookup.set_peers("db", peers(&["a", "b"]));

        let cancel = CancellationToken::new();
        let (handle, mut rx) = finder(&lookup).spawn(cancel.clone());

        assert_eq!(rx.recv().await, Some(peers(&["a", "b"])));

        lookup.set_peers("db", peers(&["a", "b", "c"]));
        assert_eq!(rx.recv().await, Some(peers(&["a", "b", "c"])));

        lookup.set_peers("db", peers(&["c"]));
        assert_eq!(rx.recv().await, Some(peers(&["c"])));

        cancel.cancel();
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_notification_when_unchanged() {
        let lookup = Arc::new(StaticLookup::new());
        lookup.set_peers("db", peers(&["a", "b"]));

        let cancel = CancellationToken::new();
        let (handle, mut rx) = finder(&lookup).spawn(cancel.clone());

        assert_eq!(rx.recv().await, Some(peers(&["a", "b"])));

        // Same membership in a different order.
        lookup.set_peers("db", peers(&["b", "a"]));
        let next = tokio::time::timeout(Duration::from_secs(10), rx.recv()).await;
        assert!(next.is_err());
        assert!(lookup.lookups() > 5);

        cancel.cancel();
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_first_resolution_is_not_a_change() {
        let lookup = Arc::new(StaticLookup::new());
        lookup.set_peers("db", PeerSet::new());

        let cancel = CancellationToken::new();
        let (handle, mut rx) = finder(&lookup).spawn(cancel.clone());

        let next = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert!(next.is_err());

        lookup.add_peer("db", "a");
        assert_eq!(rx.recv().await, Some(peers(&["a"])));

        // Dropping back to no peers is a transition too.
        lookup.set_peers("db", PeerSet::new());
        assert_eq!(rx.recv().await, Some(PeerSet::new()));

        cancel.cancel();
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_failure_is_skipped() {
        let lookup = Arc::new(StaticLookup::new());

        let cancel = CancellationToken::new();
        let (handle, mut rx) = finder(&lookup).spawn(cancel.clone());

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(lookup.lookups(), 3);
        assert!(rx.try_recv().is_err());
        assert!(!handle.is_finished());

        lookup.set_peers("db", peers(&["a", "b"]));
        assert_eq!(rx.recv().await, Some(peers(&["a", "b"])));

        let next = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert!(next.is_err());

        cancel.cancel();
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_keeps_retained_set() {
        let lookup = Arc::new(StaticLookup::new());
        lookup.set_peers("db", peers(&["a"]));

        let cancel = CancellationToken::new();
        let (handle, mut rx) = finder(&lookup).spawn(cancel.clone());
        assert_eq!(rx.recv().await, Some(peers(&["a"])));

        lookup.remove_service("db");
        tokio::time::sleep(Duration::from_secs(3)).await;

        // The failed polls did not clear the retained set.
        lookup.set_peers("db", peers(&["a"]));
        let next = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert!(next.is_err());

        cancel.cancel();
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_consumer() {
        let lookup = Arc::new(StaticLookup::new());
        lookup.set_peers("db", peers(&["a"]));

        let cancel = CancellationToken::new();
        let (handle, mut rx) = finder(&lookup).spawn(cancel.clone());

        // Nobody is receiving, so the loop stays parked after the first change.
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(lookup.lookups(), 1);

        assert_eq!(rx.recv().await, Some(peers(&["a"])));
        lookup.set_peers("db", peers(&["a", "b"]));
        assert_eq!(rx.recv().await, Some(peers(&["a", "b"])));
        assert!(lookup.lookups() >= 2);

        cancel.cancel();
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_notifications() {
        let lookup = Arc::new(StaticLookup::new());
        lookup.set_peers("db", peers(&["a"]));

        let cancel = CancellationToken::new();
        let (handle, mut rx) = finder(&lookup).spawn(cancel.clone());
        assert_eq!(rx.recv().await, Some(peers(&["a"])));

        cancel.cancel();
        lookup.set_peers("db", peers(&["a", "b"]));
        assert!(handle.await.unwrap().is_ok());

        // The sender went away with the loop.
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_first_poll() {
        let lookup = Arc::new(StaticLookup::new());
        lookup.set_peers("db", peers(&["a"]));

        let cancel = CancellationToken::new();
        cancel.cancel();

        let (handle, _rx) = finder(&lookup).spawn(cancel);
        assert!(handle.await.unwrap().is_ok());
        assert_eq!(lookup.lookups(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consumer_gone() {
        let lookup = Arc::new(StaticLookup::new());
        lookup.set_peers("db", peers(&["a"]));

        let (handle, rx) = finder(&lookup).spawn(CancellationToken::new());
        drop(rx);

        let result = handle.await.unwrap();
        assert!(matches!(result, Err(PeerFindError::ConsumerClosed)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_poll_period() {
        let lookup = Arc::new(StaticLookup::new());

        let cancel = CancellationToken::new();
        let (handle, _rx) = finder(&lookup)
            .with_config(FinderConfig::new().poll_period(Duration::from_millis(100)))
            .spawn(cancel.clone());

        tokio::time::sleep(Duration::from_millis(550)).await;
        assert_eq!(lookup.lookups(), 5);

        cancel.cancel();
        assert!(handle.await.unwrap().is_ok());
    }

    #[test]
    fn test_from_config_resolves_domain() {
        let lookup = StaticLookup::new();
        let config =
            DiscoveryConfig::new("prod", Some("cluster.local".to_string()), "db").unwrap();
        let domains = DomainResolver::new().with_env_namespace(None);

        let finder = PeerFinder::from_config(lookup, &config, &domains).unwrap();
        assert_eq!(finder.service(), "db");
        assert_eq!(finder.domain(), Some("prod.svc.cluster.local"));
    }

    #[test]
    fn test_from_config_fails_without_domain() {
        let config = DiscoveryConfig::new("", None, "db").unwrap();
        let domains = DomainResolver::new()
            .with_resolv_conf("/nonexistent/resolv.conf")
            .with_env_namespace(None);

        let result = PeerFinder::from_config(StaticLookup::new(), &config, &domains);
        assert!(matches!(result, Err(ConfigError::ResolvConf { .. })));
    }
}
