//! DNS SRV lookup.

use hickory_resolver::Resolver as HickoryResolver;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::proto::rr::Name;
use peerfind_core::{LookupError, PeerSet};

use crate::resolver::PeerLookup;

/// Type alias for the Tokio-based hickory resolver.
type TokioResolver = HickoryResolver<TokioConnectionProvider>;

/// SRV lookup against the cluster's DNS.
///
/// The service name is queried as-is, without `_service._proto.` prefixes,
/// which is how headless services publish one record per member. The
/// resolver's answer cache is disabled so that every poll sees DNS as it is
/// right now.
///
/// ## Example
///
/// ```rust,no_run
/// use peerfind_discovery::DnsLookup;
///
/// # fn main() -> Result<(), peerfind_core::LookupError> {
/// // Reads /etc/resolv.conf for nameservers and search domains.
/// let lookup = DnsLookup::from_system_conf()?;
///
/// // let peers = lookup.lookup("db").await?;
/// # Ok(())
/// # }
/// ```
pub struct DnsLookup {
    resolver: TokioResolver,
}

impl DnsLookup {
    /// Create a lookup using the system resolver configuration.
    pub fn from_system_conf() -> Result<Self, LookupError> {
        let mut builder = HickoryResolver::builder(TokioConnectionProvider::default())
            .map_err(|e| LookupError::Dns(e.to_string()))?;
        builder.options_mut().cache_size = 0;

        Ok(Self {
            resolver: builder.build(),
        })
    }

    /// Create a lookup with custom configuration.
    #[must_use]
    pub fn with_config(config: ResolverConfig, mut opts: ResolverOpts) -> Self {
        opts.cache_size = 0;
        let resolver =
            HickoryResolver::builder_with_config(config, TokioConnectionProvider::default())
                .with_options(opts)
                .build();

        Self { resolver }
    }
}

impl PeerLookup for DnsLookup {
    async fn lookup(&self, service: &str) -> Result<PeerSet, LookupError> {
        let lookup = self
            .resolver
            .srv_lookup(service)
            .await
            .map_err(|e| {
                if e.is_no_records_found() {
                    LookupError::NotFound(service.to_string())
                } else {
                    LookupError::Dns(e.to_string())
                }
            })?;

        let peers = peers_from_targets(lookup.iter().map(|record| record.target()));

        tracing::trace!(service, peers = %peers, "srv lookup answered");
        Ok(peers)
    }
}

/// Collect SRV targets into a peer set, without the root-domain dot.
fn peers_from_targets<'a>(targets: impl IntoIterator<Item = &'a Name>) -> PeerSet {
    targets
        .into_iter()
        .map(|target| strip_root(&target.to_string()).to_string())
        .collect()
}

/// Strip the root-domain terminator from a DNS name.
fn strip_root(name: &str) -> &str {
    name.strip_suffix('.').unwrap_or(name)
}
