//! Error types for peer discovery.

use std::path::PathBuf;
use std::sync::Arc;

/// Main error type for peerfind operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PeerFindError {
    /// Startup configuration could not be turned into a query target.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A DNS lookup failed.
    #[error("lookup error: {0}")]
    Lookup(#[from] LookupError),

    /// The receiving side of the notification channel was dropped.
    #[error("change consumer closed")]
    ConsumerClosed,
}

/// Startup errors. None of these can be retried.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// The resolver configuration file could not be read.
    #[error("unable to read {}: {source}", path.display())]
    ResolvConf {
        /// Path that was read
        path: PathBuf,
        /// Underlying IO error
        source: Arc<std::io::Error>,
    },

    /// No search entry looked like a service domain.
    #[error("no service domain found in the search list of {}", path.display())]
    NoSearchDomain {
        /// Path that was scanned
        path: PathBuf,
    },

    /// No service name was supplied.
    #[error("a service name is required")]
    MissingService,
}

/// Lookup errors. The finder logs these and retries on the next tick.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    /// The service has no records.
    #[error("service not found: {0}")]
    NotFound(String),

    /// DNS resolution failed.
    #[error("dns error: {0}")]
    Dns(String),
}

impl ConfigError {
    /// Create a resolver configuration read error.
    #[must_use]
    pub fn resolv_conf(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ResolvConf {
            path: path.into(),
            source: Arc::new(source),
        }
    }
}

impl PeerFindError {
    /// Check if this is a configuration error. Restarting with the same
    /// inputs fails the same way.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConfigError::resolv_conf(
            "/etc/resolv.conf",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        assert_eq!(err.to_string(), "unable to read /etc/resolv.conf: missing");

        let err = PeerFindError::from(LookupError::NotFound("db".into()));
        assert_eq!(err.to_string(), "lookup error: service not found: db");
    }

    #[test]
    fn test_classification() {
        assert!(PeerFindError::from(ConfigError::MissingService).is_fatal());
        assert!(!PeerFindError::ConsumerClosed.is_fatal());
        assert!(!PeerFindError::from(LookupError::Dns("timeout".into())).is_fatal());
    }
}
