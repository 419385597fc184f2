//! Discovery input configuration.

use crate::error::ConfigError;

/// What to discover and where.
///
/// Built once before discovery starts and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryConfig {
    namespace: String,
    domain_override: Option<String>,
    service: String,
}

impl DiscoveryConfig {
    /// Create a configuration for the given service.
    ///
    /// An empty `namespace` is allowed; the domain resolver falls back to the
    /// environment for it. An empty override is treated as no override.
    pub fn new(
        namespace: impl Into<String>,
        domain_override: Option<String>,
        service: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let service = service.into();
        if service.is_empty() {
            return Err(ConfigError::MissingService);
        }

        Ok(Self {
            namespace: namespace.into(),
            domain_override: domain_override.filter(|d| !d.is_empty()),
            service,
        })
    }

    /// Namespace as given, possibly empty.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Cluster DNS suffix, if one was given explicitly.
    #[must_use]
    pub fn domain_override(&self) -> Option<&str> {
        self.domain_override.as_deref()
    }

    /// Name queried for SRV records.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }
}
