pub mod config;
pub mod domain;
pub mod policy;
pub mod provider;

mod metrics;
mod notifier;
mod resolver;
mod shard;
mod version;

pub use config::Config;
pub use domain::{ActiveClusterInfo, DomainDescriptor, DomainLookup};
pub use policy::{ExecutionManager, ExecutionManagerProvider, PolicyFetchError, SelectionPolicy};
pub use provider::{
    ChangeEvents, ChangeKind, ExternalEntity, ExternalEntityProvider, ProviderError,
    ProviderRegistry,
};
pub use resolver::{LookupResult, Resolver};
pub use shard::shard_for_workflow;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to fetch domain {domain_id:?}")]
    DomainFetch {
        domain_id: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("no active cluster for region {region:?} in domain {domain_id}")]
    RegionNotFoundForDomain { region: String, domain_id: String },
    #[error("cluster {0:?} is not a member of the topology")]
    ClusterNotFound(String),
    #[error("active cluster {cluster:?} of region {region:?} is not a member of the topology")]
    ClusterNotFoundForRegion { cluster: String, region: String },
    #[error("external entity provider for type \"{0}\" not found")]
    UnknownEntityType(String),
    #[error("unsupported active cluster selection strategy")]
    UnsupportedStrategy,
    #[error("failover version {0} does not map to a cluster or region")]
    CannotResolveFailoverVersion(i64),
    #[error("external entity provider for type \"{0}\" already registered")]
    DuplicateProvider(String),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("failed to read active cluster selection policy")]
    PolicyFetch(#[source] anyhow::Error),
    #[error("failed to obtain execution manager for shard {shard_id}")]
    ExecutionManager {
        shard_id: u32,
        #[source]
        source: anyhow::Error,
    },
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
