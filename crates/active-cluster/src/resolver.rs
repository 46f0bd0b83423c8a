use crate::domain::{ActiveClusterInfo, DomainDescriptor, DomainLookup};
use crate::notifier::ChangeNotifier;
use crate::policy::{ExecutionManagerProvider, PolicyFetchError, SelectionPolicy};
use crate::provider::{ChangeKind, ExternalEntityProvider, ProviderRegistry};
use crate::{metrics, shard, version, Config, Error, Result};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use topology::ClusterTopology;

const LOOKUP_NEW_WORKFLOW: &str = "lookup_new_workflow";
const LOOKUP_WORKFLOW: &str = "lookup_workflow";
const LOOKUP_CLUSTER: &str = "lookup_cluster";
const CLUSTER_NAME_FOR_FAILOVER_VERSION: &str = "cluster_name_for_failover_version";

/// The routing answer for a workflow or cluster-addressable operation.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupResult {
    /// Region serving the work. Absent for active-passive routing, where
    /// the active cluster is authoritative across all regions.
    pub region: Option<String>,
    pub cluster_name: String,
    pub failover_version: i64,
}

enum Lifecycle {
    Idle,
    Running {
        cancel: CancellationToken,
        tasks: Vec<tokio::task::JoinHandle<()>>,
    },
    Stopped,
}

/// Resolver answers which cluster currently owns a piece of work, in which
/// region, and at what failover version.
///
/// It interprets three inputs: the static cluster topology, each domain's
/// replication configuration, and (for active-active domains) the
/// per-workflow selection policy stored alongside the workflow's execution.
/// All collaborators are injected; the resolver holds no global state and
/// re-reads domain and policy state on every call, so concurrent lookups
/// each observe a consistent snapshot without serializing against each
/// other.
pub struct Resolver {
    config: Config,
    domains: Arc<dyn DomainLookup>,
    topology: Arc<ClusterTopology>,
    executions: Arc<dyn ExecutionManagerProvider>,
    registry: ProviderRegistry,
    notifier: Arc<ChangeNotifier>,
    lifecycle: Mutex<Lifecycle>,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("config", &self.config)
            .field("topology", &self.topology)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl Resolver {
    pub fn new(
        config: Config,
        domains: Arc<dyn DomainLookup>,
        topology: Arc<ClusterTopology>,
        executions: Arc<dyn ExecutionManagerProvider>,
        providers: Vec<Arc<dyn ExternalEntityProvider>>,
    ) -> Result<Self> {
        config.validate()?;
        let registry = ProviderRegistry::new(providers)?;

        Ok(Self {
            config,
            domains,
            topology,
            executions,
            registry,
            notifier: Arc::new(ChangeNotifier::new()),
            lifecycle: Mutex::new(Lifecycle::Idle),
        })
    }

    /// Start provider consumers and the change notifier.
    /// Idempotent while running. A stopped resolver cannot be restarted;
    /// calling start() after stop() logs an error and does nothing.
    pub fn start(&self) {
        let mut lifecycle = self.lifecycle.lock().unwrap();
        match &*lifecycle {
            Lifecycle::Running { .. } => return,
            Lifecycle::Stopped => {
                tracing::error!("active cluster resolver cannot be restarted after stop");
                return;
            }
            Lifecycle::Idle => (),
        }

        let cancel = CancellationToken::new();
        let mut tasks = Vec::new();

        for provider in self.registry.providers() {
            tasks.push(tokio::spawn(
                self.notifier.clone().consume(provider.clone(), cancel.clone()),
            ));
        }
        tasks.push(tokio::spawn(
            self.notifier
                .clone()
                .run(self.config.notification_period, cancel.clone()),
        ));

        *lifecycle = Lifecycle::Running { cancel, tasks };
    }

    /// Cancel background tasks and wait for them to exit. Idempotent.
    /// No change callback fires after stop() returns.
    pub async fn stop(&self) {
        let tasks = {
            let mut lifecycle = self.lifecycle.lock().unwrap();
            match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
                Lifecycle::Running { cancel, tasks } => {
                    cancel.cancel();
                    tasks
                }
                _ => Vec::new(),
            }
        };
        for task in tasks {
            _ = task.await;
        }
    }

    /// Register a per-shard callback invoked when external entity
    /// assignments change. Callbacks run on the notifier task and must
    /// return promptly without re-entering register/unregister.
    /// Re-registering a shard id replaces the prior callback.
    pub fn register_change_callback(
        &self,
        shard_id: u32,
        callback: impl Fn(ChangeKind) + Send + 'static,
    ) {
        self.notifier.register(shard_id, Box::new(callback));
    }

    pub fn unregister_change_callback(&self, shard_id: u32) {
        self.notifier.unregister(shard_id);
    }

    pub fn supports_external_entity_type(&self, entity_type: &str) -> bool {
        self.registry.supports(entity_type)
    }

    /// Region served by this process's cluster, or None in region-less
    /// topologies.
    pub fn current_region(&self) -> Option<&str> {
        self.topology.current_region()
    }

    /// Resolve the cluster which will own a workflow about to be started,
    /// given the selection policy it is starting with (if any).
    pub async fn lookup_new_workflow(
        &self,
        domain_id: &str,
        policy: Option<&SelectionPolicy>,
    ) -> Result<LookupResult> {
        let started = Instant::now();
        let result = self.lookup_new_workflow_inner(domain_id, policy).await;
        self.finish(LOOKUP_NEW_WORKFLOW, domain_id, None, started, &result);
        result
    }

    /// Resolve the cluster which owns an existing workflow, consulting its
    /// stored selection policy.
    pub async fn lookup_workflow(
        &self,
        domain_id: &str,
        workflow_id: &str,
        run_id: &str,
    ) -> Result<LookupResult> {
        let started = Instant::now();
        let result = self
            .lookup_workflow_inner(domain_id, workflow_id, run_id)
            .await;
        self.finish(
            LOOKUP_WORKFLOW,
            domain_id,
            Some(workflow_id),
            started,
            &result,
        );
        result
    }

    /// Resolve the active cluster for the *region* which `cluster_name`
    /// belongs to. In active-active domains that region may currently be
    /// served by a different cluster than the one asked about.
    pub fn lookup_cluster(&self, domain_id: &str, cluster_name: &str) -> Result<LookupResult> {
        let started = Instant::now();
        let result = self.lookup_cluster_inner(domain_id, cluster_name);
        self.finish(LOOKUP_CLUSTER, domain_id, None, started, &result);
        result
    }

    /// Invert a failover version to the cluster currently serving it,
    /// within the context of the given domain.
    pub fn cluster_name_for_failover_version(
        &self,
        failover_version: i64,
        domain_id: &str,
    ) -> Result<String> {
        let started = Instant::now();
        let result = self.fetch_domain(domain_id).and_then(|domain| {
            version::cluster_for_failover_version(&self.topology, &domain, failover_version)
        });

        match &result {
            Ok(cluster) => tracing::debug!(
                domain_id,
                failover_version,
                cluster = %cluster,
                "resolved failover version"
            ),
            Err(error) => tracing::warn!(
                domain_id,
                failover_version,
                %error,
                "failover version resolution failed"
            ),
        }
        metrics::observe_lookup(CLUSTER_NAME_FOR_FAILOVER_VERSION, started, &result);
        result
    }

    async fn lookup_new_workflow_inner(
        &self,
        domain_id: &str,
        policy: Option<&SelectionPolicy>,
    ) -> Result<LookupResult> {
        let domain = self.fetch_domain(domain_id)?;

        if !domain.is_active_active {
            metrics::observe_strategy(LOOKUP_NEW_WORKFLOW, "active_passive");
            return Ok(Self::passive_result(&domain));
        }

        match policy {
            None | Some(SelectionPolicy::RegionSticky { region: None }) => {
                metrics::observe_strategy(LOOKUP_NEW_WORKFLOW, "region_sticky");
                self.region_result(&domain, self.current_region_name())
            }
            Some(SelectionPolicy::RegionSticky {
                region: Some(region),
            }) => {
                metrics::observe_strategy(LOOKUP_NEW_WORKFLOW, "region_sticky");
                self.region_result(&domain, region)
            }
            Some(SelectionPolicy::ExternalEntity {
                entity_type,
                entity_key,
            }) => {
                metrics::observe_strategy(LOOKUP_NEW_WORKFLOW, "external_entity");
                self.entity_result(&domain, entity_type, entity_key).await
            }
            Some(SelectionPolicy::Unknown) => Err(Error::UnsupportedStrategy),
        }
    }

    async fn lookup_workflow_inner(
        &self,
        domain_id: &str,
        workflow_id: &str,
        run_id: &str,
    ) -> Result<LookupResult> {
        let domain = self.fetch_domain(domain_id)?;

        if !domain.is_active_active {
            metrics::observe_strategy(LOOKUP_WORKFLOW, "active_passive");
            return Ok(Self::passive_result(&domain));
        }

        let shard_id = shard::shard_for_workflow(workflow_id, self.config.num_shards);
        let manager = self
            .executions
            .execution_manager(shard_id)
            .map_err(|source| Error::ExecutionManager { shard_id, source })?;

        let policy = match manager
            .active_cluster_selection_policy(domain_id, workflow_id, run_id)
            .await
        {
            Ok(policy) => policy,
            Err(PolicyFetchError::NotFound) if domain.migrated_from_active_passive => {
                // Workflows started before the domain's migration carry no
                // policy; the legacy active cluster remains authoritative.
                metrics::observe_strategy(LOOKUP_WORKFLOW, "active_passive");
                return Ok(Self::passive_result(&domain));
            }
            Err(PolicyFetchError::NotFound) => {
                // Retired workflow: its execution record is gone. Route to
                // the active cluster of the current region.
                metrics::observe_strategy(LOOKUP_WORKFLOW, "region_sticky");
                return self.region_result(&domain, self.current_region_name());
            }
            Err(PolicyFetchError::Other(source)) => return Err(Error::PolicyFetch(source)),
        };

        match policy {
            None | Some(SelectionPolicy::RegionSticky { region: None }) => {
                metrics::observe_strategy(LOOKUP_WORKFLOW, "region_sticky");
                self.region_result(&domain, self.current_region_name())
            }
            Some(SelectionPolicy::RegionSticky {
                region: Some(region),
            }) => {
                metrics::observe_strategy(LOOKUP_WORKFLOW, "region_sticky");
                self.region_result(&domain, &region)
            }
            Some(SelectionPolicy::ExternalEntity {
                entity_type,
                entity_key,
            }) => {
                metrics::observe_strategy(LOOKUP_WORKFLOW, "external_entity");
                self.entity_result(&domain, &entity_type, &entity_key).await
            }
            Some(SelectionPolicy::Unknown) => Err(Error::UnsupportedStrategy),
        }
    }

    fn lookup_cluster_inner(&self, domain_id: &str, cluster_name: &str) -> Result<LookupResult> {
        let domain = self.fetch_domain(domain_id)?;
        let cluster = self
            .topology
            .cluster(cluster_name)
            .ok_or_else(|| Error::ClusterNotFound(cluster_name.to_string()))?;

        if !domain.is_active_active {
            metrics::observe_strategy(LOOKUP_CLUSTER, "active_passive");
            return Ok(LookupResult {
                region: cluster.region.clone(),
                cluster_name: cluster_name.to_string(),
                failover_version: cluster.initial_failover_version,
            });
        }

        metrics::observe_strategy(LOOKUP_CLUSTER, "region_sticky");
        self.region_result(&domain, cluster.region.as_deref().unwrap_or_default())
    }

    fn fetch_domain(&self, domain_id: &str) -> Result<DomainDescriptor> {
        self.domains
            .domain(domain_id)
            .map_err(|source| Error::DomainFetch {
                domain_id: domain_id.to_string(),
                source,
            })
    }

    fn current_region_name(&self) -> &str {
        self.topology.current_region().unwrap_or_default()
    }

    fn passive_result(domain: &DomainDescriptor) -> LookupResult {
        LookupResult {
            region: None,
            cluster_name: domain.active_cluster_name.clone(),
            failover_version: domain.global_failover_version,
        }
    }

    fn region_entry<'d>(
        domain: &'d DomainDescriptor,
        region: &str,
    ) -> Result<&'d ActiveClusterInfo> {
        domain
            .active_clusters_by_region
            .get(region)
            .ok_or_else(|| Error::RegionNotFoundForDomain {
                region: region.to_string(),
                domain_id: domain.id.clone(),
            })
    }

    fn region_result(&self, domain: &DomainDescriptor, region: &str) -> Result<LookupResult> {
        let entry = Self::region_entry(domain, region)?;
        Ok(LookupResult {
            region: Some(region.to_string()),
            cluster_name: entry.active_cluster_name.clone(),
            failover_version: entry.failover_version,
        })
    }

    async fn entity_result(
        &self,
        domain: &DomainDescriptor,
        entity_type: &str,
        entity_key: &str,
    ) -> Result<LookupResult> {
        let entity = self.registry.lookup_entity(entity_type, entity_key).await?;
        let cluster_name =
            version::cluster_for_failover_version(&self.topology, domain, entity.failover_version)?;

        Ok(LookupResult {
            region: Some(entity.region),
            cluster_name,
            failover_version: entity.failover_version,
        })
    }

    fn finish(
        &self,
        operation: &'static str,
        domain_id: &str,
        workflow_id: Option<&str>,
        started: Instant,
        result: &Result<LookupResult>,
    ) {
        match result {
            Ok(found) => tracing::debug!(
                operation,
                domain_id,
                workflow_id,
                region = found.region.as_deref().unwrap_or(""),
                cluster = %found.cluster_name,
                failover_version = found.failover_version,
                "resolved active cluster"
            ),
            Err(error) => tracing::warn!(
                operation,
                domain_id,
                workflow_id,
                %error,
                "active cluster lookup failed"
            ),
        }
        metrics::observe_lookup(operation, started, result);
    }
}
