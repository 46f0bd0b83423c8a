use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The active cluster serving one region of an active-active domain.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActiveClusterInfo {
    pub active_cluster_name: String,
    pub failover_version: i64,
}

/// DomainDescriptor is a point-in-time snapshot of a domain's replication
/// configuration, as maintained by the domain subsystem. The resolver
/// re-reads it on every lookup and never retains one across calls.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DomainDescriptor {
    pub id: String,
    pub name: String,
    /// Active-active domains run one active cluster per region.
    /// Local and active-passive domains route all writes through
    /// `active_cluster_name`.
    pub is_active_active: bool,
    pub active_cluster_name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub active_clusters_by_region: BTreeMap<String, ActiveClusterInfo>,
    pub global_failover_version: i64,
    /// Set on domains which were converted from active-passive to
    /// active-active. Workflows started before the conversion carry no
    /// selection policy and continue to route through the legacy
    /// `active_cluster_name`.
    #[serde(default)]
    pub migrated_from_active_passive: bool,
}

/// Domain subsystem seam: resolve a domain id to its current descriptor.
///
/// Reads are served from the host's local domain cache, so this lookup is
/// synchronous and cheap. Errors surface to lookup callers unchanged.
pub trait DomainLookup: Send + Sync {
    fn domain(&self, domain_id: &str) -> anyhow::Result<DomainDescriptor>;
}
