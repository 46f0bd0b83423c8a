use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// SelectionPolicy is a workflow's stored choice of how its active cluster
/// is selected within an active-active domain. It's written once at workflow
/// start and read on every routing decision thereafter.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Pin the workflow to a region. Without an explicit region, the
    /// workflow follows the region of whichever cluster reads the policy.
    RegionSticky {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        region: Option<String>,
    },
    /// Follow an external entity's active region, as maintained by the
    /// provider which owns `entity_type`.
    ExternalEntity {
        entity_type: String,
        entity_key: String,
    },
    /// A strategy tag written by newer software. Lookups against it fail
    /// rather than guessing at its routing.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, thiserror::Error)]
pub enum PolicyFetchError {
    /// No execution record exists for the workflow.
    #[error("active cluster selection policy not found")]
    NotFound,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Per-shard workflow execution storage, consulted for stored selection
/// policies.
#[async_trait::async_trait]
pub trait ExecutionManager: Send + Sync {
    /// Read the stored selection policy of a workflow execution.
    ///
    /// `Ok(None)` means the execution exists but recorded no policy;
    /// `Err(PolicyFetchError::NotFound)` means there is no execution record
    /// at all. Callers treat the two very differently.
    async fn active_cluster_selection_policy(
        &self,
        domain_id: &str,
        workflow_id: &str,
        run_id: &str,
    ) -> std::result::Result<Option<SelectionPolicy>, PolicyFetchError>;
}

/// Seam through which the resolver obtains the execution manager owning a
/// given shard.
pub trait ExecutionManagerProvider: Send + Sync {
    fn execution_manager(&self, shard_id: u32) -> anyhow::Result<Arc<dyn ExecutionManager>>;
}
