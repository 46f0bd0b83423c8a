use crate::domain::DomainDescriptor;
use crate::{Error, Result};
use topology::ClusterTopology;

/// Invert a failover version to the name of the cluster currently serving it.
///
/// Versions are partitioned by their baseline (`version mod increment`)
/// between clusters and, in active-active domains, regions. A cluster
/// baseline identifies the cluster directly. A region baseline identifies
/// the region, and the serving cluster is whichever one the domain currently
/// maps that region to.
pub(crate) fn cluster_for_failover_version(
    topology: &ClusterTopology,
    domain: &DomainDescriptor,
    version: i64,
) -> Result<String> {
    match topology.cluster_name_for_version(version) {
        Ok(cluster) => return Ok(cluster.to_string()),
        Err(topology::Error::NoClusterForVersion(_)) if domain.is_active_active => (),
        Err(_) => return Err(Error::CannotResolveFailoverVersion(version)),
    }

    let region = topology
        .region_for_version(version)
        .map_err(|_| Error::CannotResolveFailoverVersion(version))?;

    let entry = domain
        .active_clusters_by_region
        .get(region)
        .ok_or_else(|| Error::RegionNotFoundForDomain {
            region: region.to_string(),
            domain_id: domain.id.clone(),
        })?;

    if topology.cluster(&entry.active_cluster_name).is_none() {
        return Err(Error::ClusterNotFoundForRegion {
            cluster: entry.active_cluster_name.clone(),
            region: region.to_string(),
        });
    }
    Ok(entry.active_cluster_name.clone())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::domain::ActiveClusterInfo;
    use std::collections::BTreeMap;
    use topology::{ClusterInfo, RegionInfo};

    fn regional_topology() -> ClusterTopology {
        ClusterTopology::new(
            [
                (
                    "cluster1".to_string(),
                    ClusterInfo {
                        region: Some("us-west".to_string()),
                        initial_failover_version: 0,
                    },
                ),
                (
                    "cluster2".to_string(),
                    ClusterInfo {
                        region: Some("us-east".to_string()),
                        initial_failover_version: 2,
                    },
                ),
            ]
            .into(),
            [
                (
                    "us-west".to_string(),
                    RegionInfo {
                        initial_failover_version: 1,
                    },
                ),
                (
                    "us-east".to_string(),
                    RegionInfo {
                        initial_failover_version: 3,
                    },
                ),
            ]
            .into(),
            "cluster1".to_string(),
            100,
        )
        .unwrap()
    }

    fn active_active_domain(regions: &[(&str, &str, i64)]) -> DomainDescriptor {
        DomainDescriptor {
            id: "test-domain-id".to_string(),
            name: "test-domain".to_string(),
            is_active_active: true,
            active_cluster_name: "cluster1".to_string(),
            active_clusters_by_region: regions
                .iter()
                .map(|(region, cluster, version)| {
                    (
                        region.to_string(),
                        ActiveClusterInfo {
                            active_cluster_name: cluster.to_string(),
                            failover_version: *version,
                        },
                    )
                })
                .collect::<BTreeMap<_, _>>(),
            global_failover_version: 0,
            migrated_from_active_passive: false,
        }
    }

    #[test]
    fn test_cluster_baseline_wins() {
        let topology = regional_topology();
        let domain = active_active_domain(&[("us-west", "cluster1", 0), ("us-east", "cluster2", 2)]);

        // Cluster baselines resolve directly, at any generation.
        assert_eq!(
            cluster_for_failover_version(&topology, &domain, 0).unwrap(),
            "cluster1",
        );
        assert_eq!(
            cluster_for_failover_version(&topology, &domain, 202).unwrap(),
            "cluster2",
        );
    }

    #[test]
    fn test_region_baseline_follows_domain_mapping() {
        let topology = regional_topology();
        let domain = active_active_domain(&[("us-west", "cluster1", 0), ("us-east", "cluster2", 2)]);

        // Version 3 carries the us-east baseline; the domain maps us-east
        // to cluster2.
        assert_eq!(
            cluster_for_failover_version(&topology, &domain, 3).unwrap(),
            "cluster2",
        );
        assert_eq!(
            cluster_for_failover_version(&topology, &domain, 103).unwrap(),
            "cluster2",
        );
    }

    #[test]
    fn test_region_missing_from_domain() {
        let topology = regional_topology();
        let domain = active_active_domain(&[("us-east", "cluster2", 2)]);

        match cluster_for_failover_version(&topology, &domain, 1).unwrap_err() {
            Error::RegionNotFoundForDomain { region, domain_id } => {
                assert_eq!(region, "us-west");
                assert_eq!(domain_id, "test-domain-id");
            }
            err => panic!("unexpected error: {err}"),
        }
    }

    #[test]
    fn test_domain_names_unknown_cluster() {
        let topology = regional_topology();
        let domain = active_active_domain(&[("us-west", "cluster9", 0)]);

        match cluster_for_failover_version(&topology, &domain, 1).unwrap_err() {
            Error::ClusterNotFoundForRegion { cluster, region } => {
                assert_eq!(cluster, "cluster9");
                assert_eq!(region, "us-west");
            }
            err => panic!("unexpected error: {err}"),
        }
    }

    #[test]
    fn test_unresolvable_version() {
        let topology = regional_topology();
        let domain = active_active_domain(&[("us-west", "cluster1", 0)]);

        match cluster_for_failover_version(&topology, &domain, 42).unwrap_err() {
            Error::CannotResolveFailoverVersion(42) => (),
            err => panic!("unexpected error: {err}"),
        }

        // Non-active-active domains never consult region baselines.
        let mut passive = domain;
        passive.is_active_active = false;
        match cluster_for_failover_version(&topology, &passive, 1).unwrap_err() {
            Error::CannotResolveFailoverVersion(1) => (),
            err => panic!("unexpected error: {err}"),
        }
    }
}
