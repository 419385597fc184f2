//! Service domain derivation.
//!
//! In most clusters the DNS suffix is never handed to workloads directly. It
//! is, however, visible in the resolver's search list, where the cluster
//! injects entries such as `default.svc.cluster.local svc.cluster.local
//! cluster.local`. This module recovers the service domain from there when
//! no explicit suffix is configured.

use std::path::PathBuf;
use std::sync::LazyLock;

use peerfind_core::{ConfigError, DiscoveryConfig};
use regex::Regex;

/// Default resolver configuration file.
pub const RESOLV_CONF: &str = "/etc/resolv.conf";

/// Environment variable consulted when no namespace is given.
pub const NAMESPACE_ENV: &str = "POD_NAMESPACE";

/// `<namespace>.svc.<suffix>`, used when the namespace is unknown.
static NAMESPACED_DOMAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<domain>[a-zA-Z0-9-]{1,63}\.svc\.(?:[a-zA-Z0-9-]{1,63}\.)*[a-zA-Z0-9]{2,63})$")
        .expect("namespaced domain pattern is valid")
});

/// `svc.<suffix>`, prefixed with a known namespace.
static SERVICE_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<domain>svc\.(?:[a-zA-Z0-9-]{1,63}\.)*[a-zA-Z0-9]{2,63})$")
        .expect("service suffix pattern is valid")
});

/// Derives the fully-qualified service domain.
///
/// ## Example
///
/// ```rust
/// use peerfind_discovery::DomainResolver;
///
/// let resolver = DomainResolver::new().with_env_namespace(None);
///
/// // An explicit suffix never touches the resolver configuration.
/// let domain = resolver.resolve("prod", Some("cluster.local")).unwrap();
/// assert_eq!(domain, "prod.svc.cluster.local");
/// ```
#[derive(Debug, Clone)]
pub struct DomainResolver {
    resolv_conf: PathBuf,
    env_namespace: Option<String>,
}

impl DomainResolver {
    /// Create a resolver reading [`RESOLV_CONF`], with the namespace
    /// fallback taken from [`NAMESPACE_ENV`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            resolv_conf: PathBuf::from(RESOLV_CONF),
            env_namespace: std::env::var(NAMESPACE_ENV)
                .ok()
                .filter(|ns| !ns.is_empty()),
        }
    }

    /// Read a different resolver configuration file.
    #[must_use]
    pub fn with_resolv_conf(mut self, path: impl Into<PathBuf>) -> Self {
        self.resolv_conf = path.into();
        self
    }

    /// Override the namespace fallback.
    #[must_use]
    pub fn with_env_namespace(mut self, namespace: Option<String>) -> Self {
        self.env_namespace = namespace.filter(|ns| !ns.is_empty());
        self
    }

    /// The namespace to use: `namespace` itself, or the fallback when empty.
    #[must_use]
    pub fn namespace<'a>(&'a self, namespace: &'a str) -> &'a str {
        if namespace.is_empty() {
            self.env_namespace.as_deref().unwrap_or_default()
        } else {
            namespace
        }
    }

    /// Derive the service domain.
    ///
    /// With an override the result is `<namespace>.svc.<override>`.
    /// Otherwise the search list of the resolver configuration is scanned
    /// and the first matching entry wins.
    pub fn resolve(
        &self,
        namespace: &str,
        domain_override: Option<&str>,
    ) -> Result<String, ConfigError> {
        let namespace = self.namespace(namespace);

        if let Some(domain) = domain_override.filter(|d| !d.is_empty()) {
            return Ok([namespace, "svc", domain].join("."));
        }

        let contents = std::fs::read_to_string(&self.resolv_conf)
            .map_err(|e| ConfigError::resolv_conf(&self.resolv_conf, e))?;

        let domain = domain_from_search(&contents, namespace).ok_or_else(|| {
            ConfigError::NoSearchDomain {
                path: self.resolv_conf.clone(),
            }
        })?;

        tracing::info!(domain = %domain, path = %self.resolv_conf.display(), "Determined domain");
        Ok(domain)
    }

    /// Derive the service domain for a discovery configuration.
    pub fn resolve_config(&self, config: &DiscoveryConfig) -> Result<String, ConfigError> {
        self.resolve(config.namespace(), config.domain_override())
    }
}

impl Default for DomainResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterate over the entries of every `search` line, in file order.
pub fn search_domains(contents: &str) -> impl Iterator<Item = &str> {
    contents
        .lines()
        .map(str::trim_start)
        .filter(|line| !line.starts_with('#') && !line.starts_with(';'))
        .flat_map(|line| {
            let mut tokens = line.split_whitespace();
            let is_search = tokens.next() == Some("search");
            tokens.filter(move |_| is_search)
        })
}

/// Find the service domain in resolver configuration contents.
///
/// Without a namespace the first `<label>.svc.<suffix>` entry is returned
/// verbatim. With one, the first `svc.<suffix>` entry is returned prefixed
/// by the namespace.
#[must_use]
pub fn domain_from_search(contents: &str, namespace: &str) -> Option<String> {
    let pattern = if namespace.is_empty() {
        &*NAMESPACED_DOMAIN
    } else {
        &*SERVICE_SUFFIX
    };

    let found = search_domains(contents)
        .find_map(|entry| pattern.captures(entry))
        .and_then(|caps| caps.name("domain"))
        .map(|m| m.as_str())?;

    if namespace.is_empty() {
        Some(found.to_string())
    } else {
        Some(format!("{namespace}.{found}"))
    }
}
