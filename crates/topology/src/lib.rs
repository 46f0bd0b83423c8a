use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("failover version increment must be positive (got {0})")]
    NonPositiveIncrement(i64),
    #[error("initial failover version {version} of {kind} {name:?} must be in [0, {increment})")]
    VersionOutOfRange {
        kind: &'static str,
        name: String,
        version: i64,
        increment: i64,
    },
    #[error("initial failover version {version} is claimed by both {first:?} and {second:?}")]
    DuplicateInitialVersion {
        version: i64,
        first: String,
        second: String,
    },
    #[error("current cluster {0:?} is not a member of the topology")]
    UnknownCurrentCluster(String),
    #[error("cluster {cluster:?} names region {region:?} which is not in the topology")]
    UnknownClusterRegion { cluster: String, region: String },
    #[error("cluster {0:?} has no region but the topology defines regions")]
    MissingClusterRegion(String),
    #[error("no cluster has initial failover version {0}")]
    NoClusterForVersion(i64),
    #[error("no region has initial failover version {0}")]
    NoRegionForVersion(i64),
}

pub type Result<T> = std::result::Result<T, Error>;

/// A cluster participating in the serving topology.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterInfo {
    /// Region which this cluster serves, if the topology is region-aware.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Initial failover version assigned to this cluster.
    /// All versions minted while the cluster owns a domain are congruent to
    /// this value modulo the topology's failover version increment.
    pub initial_failover_version: i64,
}

/// A region grouping one or more clusters.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegionInfo {
    /// Initial failover version assigned to this region.
    pub initial_failover_version: i64,
}

/// ClusterTopology is an immutable snapshot of the static serving topology:
/// which clusters exist, which regions they serve, and how the failover
/// version space is partitioned between them.
///
/// Construction validates the snapshot; all reads afterward are infallible
/// except the two version-inversion lookups.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
#[serde(try_from = "Unchecked")]
pub struct ClusterTopology {
    clusters: BTreeMap<String, ClusterInfo>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    regions: BTreeMap<String, RegionInfo>,
    current_cluster: String,
    failover_version_increment: i64,
}

// Shape of a ClusterTopology prior to validation, as deserialized
// from service configuration.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Unchecked {
    clusters: BTreeMap<String, ClusterInfo>,
    #[serde(default)]
    regions: BTreeMap<String, RegionInfo>,
    current_cluster: String,
    failover_version_increment: i64,
}

impl TryFrom<Unchecked> for ClusterTopology {
    type Error = Error;

    fn try_from(raw: Unchecked) -> Result<Self> {
        Self::new(
            raw.clusters,
            raw.regions,
            raw.current_cluster,
            raw.failover_version_increment,
        )
    }
}

impl ClusterTopology {
    /// Build and validate a topology snapshot.
    ///
    /// Validation requires: a positive failover version increment; every
    /// initial failover version in `[0, increment)` and distinct across the
    /// union of clusters and regions; a current cluster which is a member of
    /// the topology; and, when regions are defined, that every cluster names
    /// a defined region.
    pub fn new(
        clusters: BTreeMap<String, ClusterInfo>,
        regions: BTreeMap<String, RegionInfo>,
        current_cluster: String,
        failover_version_increment: i64,
    ) -> Result<Self> {
        if failover_version_increment <= 0 {
            return Err(Error::NonPositiveIncrement(failover_version_increment));
        }

        // Initial versions partition the space `mod increment` between
        // clusters and regions, so each must be in range and the union
        // must be free of duplicates.
        let mut claimed: BTreeMap<i64, &str> = BTreeMap::new();

        for (kind, name, version) in clusters
            .iter()
            .map(|(name, c)| ("cluster", name, c.initial_failover_version))
            .chain(
                regions
                    .iter()
                    .map(|(name, r)| ("region", name, r.initial_failover_version)),
            )
        {
            if version < 0 || version >= failover_version_increment {
                return Err(Error::VersionOutOfRange {
                    kind,
                    name: name.clone(),
                    version,
                    increment: failover_version_increment,
                });
            }
            if let Some(first) = claimed.insert(version, name) {
                return Err(Error::DuplicateInitialVersion {
                    version,
                    first: first.to_string(),
                    second: name.clone(),
                });
            }
        }

        if !clusters.contains_key(&current_cluster) {
            return Err(Error::UnknownCurrentCluster(current_cluster));
        }

        if !regions.is_empty() {
            for (name, cluster) in &clusters {
                match &cluster.region {
                    None => return Err(Error::MissingClusterRegion(name.clone())),
                    Some(region) if !regions.contains_key(region) => {
                        return Err(Error::UnknownClusterRegion {
                            cluster: name.clone(),
                            region: region.clone(),
                        })
                    }
                    Some(_) => (),
                }
            }
        }

        Ok(Self {
            clusters,
            regions,
            current_cluster,
            failover_version_increment,
        })
    }

    pub fn clusters(&self) -> &BTreeMap<String, ClusterInfo> {
        &self.clusters
    }

    pub fn regions(&self) -> &BTreeMap<String, RegionInfo> {
        &self.regions
    }

    pub fn cluster(&self, name: &str) -> Option<&ClusterInfo> {
        self.clusters.get(name)
    }

    pub fn current_cluster_name(&self) -> &str {
        &self.current_cluster
    }

    /// Region served by the current cluster, or None in region-less topologies.
    pub fn current_region(&self) -> Option<&str> {
        self.clusters[&self.current_cluster].region.as_deref()
    }

    pub fn failover_version_increment(&self) -> i64 {
        self.failover_version_increment
    }

    /// Reduce a failover version to its initial-version baseline.
    pub fn baseline(&self, version: i64) -> i64 {
        version.rem_euclid(self.failover_version_increment)
    }

    /// Invert a failover version to the cluster which minted it.
    pub fn cluster_name_for_version(&self, version: i64) -> Result<&str> {
        let baseline = self.baseline(version);

        self.clusters
            .iter()
            .find(|(_, c)| c.initial_failover_version == baseline)
            .map(|(name, _)| name.as_str())
            .ok_or(Error::NoClusterForVersion(version))
    }

    /// Invert a failover version to the region which minted it.
    pub fn region_for_version(&self, version: i64) -> Result<&str> {
        let baseline = self.baseline(version);

        self.regions
            .iter()
            .find(|(_, r)| r.initial_failover_version == baseline)
            .map(|(name, _)| name.as_str())
            .ok_or(Error::NoRegionForVersion(version))
    }
}
