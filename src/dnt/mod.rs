//! Do-not-track policy seam.
//!
//! The policy engine itself is an external collaborator; the core only
//! needs its verdict for a freshly registered record. Records a policy
//! blocks get `dnt_allowed`/`no_visit` set once, at registration, and are
//! never re-evaluated.

use std::collections::HashSet;

use crate::store::AdRecord;

/// Verdict source for do-not-track handling.
pub trait DntPolicy: Send + Sync {
    /// True if this record's target must never be visited.
    fn must_not_visit(&self, ad: &AdRecord) -> bool;
}

/// Policy that never blocks anything.
pub struct AllowAll;

impl DntPolicy for AllowAll {
    fn must_not_visit(&self, _ad: &AdRecord) -> bool {
        false
    }
}

/// Blocks visits to targets whose hostname or registrable domain is on the
/// configured do-not-track list.
pub struct DomainListPolicy {
    domains: HashSet<String>,
}

impl DomainListPolicy {
    /// Builds a policy from a list of domains.
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            domains: domains
                .into_iter()
                .map(|d| d.into().to_lowercase())
                .collect(),
        }
    }
}

impl DntPolicy for DomainListPolicy {
    fn must_not_visit(&self, ad: &AdRecord) -> bool {
        let domain_listed = ad
            .target_domain
            .as_deref()
            .map(|d| self.domains.contains(d))
            .unwrap_or(false);
        let hostname_listed = ad
            .target_hostname
            .as_deref()
            .map(|h| self.domains.contains(h))
            .unwrap_or(false);
        domain_listed || hostname_listed
    }
}
