//! The set of peers observed for a service.

use std::collections::BTreeSet;
use std::fmt;

/// Hostnames currently serving a clustered service.
///
/// Membership is what matters: two sets with the same hosts are equal no
/// matter what order DNS returned them in. Iteration is sorted, which keeps
/// log lines and hook input stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerSet {
    hosts: BTreeSet<String>,
}

impl PeerSet {
    /// Create an empty peer set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a host. Returns `false` if it was already present.
    pub fn insert(&mut self, host: impl Into<String>) -> bool {
        self.hosts.insert(host.into())
    }

    /// Check whether a host is a member.
    #[must_use]
    pub fn contains(&self, host: &str) -> bool {
        self.hosts.contains(host)
    }

    /// Number of peers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    /// Check if no peers are known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Iterate over hosts in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.hosts.iter().map(String::as_str)
    }

    /// Hosts present here but not in `other`.
    pub fn difference<'a>(&'a self, other: &'a PeerSet) -> impl Iterator<Item = &'a str> {
        self.hosts.difference(&other.hosts).map(String::as_str)
    }
}

impl fmt::Display for PeerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, host) in self.hosts.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(host)?;
        }
        Ok(())
    }
}

impl<S: Into<String>> FromIterator<S> for PeerSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            hosts: iter.into_iter().map(Into::into).collect(),
        }
    }
}
