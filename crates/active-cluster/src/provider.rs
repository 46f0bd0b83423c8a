use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Kinds of change surfaced to registered shard callbacks.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ChangeKind {
    /// An external entity's region assignment changed somewhere.
    /// Subscribers re-read whatever routing state they derived from it.
    EntityMap,
}

/// A keyed, externally-owned routing hint: the entity's active region and
/// the failover version at which that assignment was made.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExternalEntity {
    /// Name of the provider which produced this entity.
    pub source: String,
    pub key: String,
    pub region: String,
    pub failover_version: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("external entity {key:?} of type {entity_type:?} not found")]
    NotFound { entity_type: String, key: String },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// An infinite stream of change events produced by one provider.
/// Stream errors are logged by the consumer and never fail the process.
pub type ChangeEvents = futures::stream::BoxStream<'static, anyhow::Result<ChangeKind>>;

/// A provider owns one external entity type: it answers point lookups by
/// key and surfaces a stream of change events for the notifier to coalesce.
#[async_trait::async_trait]
pub trait ExternalEntityProvider: Send + Sync {
    /// Stable identifier of the entity type this provider serves.
    fn supported_type(&self) -> &str;

    /// Point lookup of an entity by key. Queried on demand; the resolver
    /// performs no caching of its own.
    async fn get_external_entity(
        &self,
        key: &str,
    ) -> std::result::Result<ExternalEntity, ProviderError>;

    fn change_events(&self) -> ChangeEvents;
}

/// Immutable mapping of entity type to its provider, built once at
/// construction. Lookups afterward take no locks.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn ExternalEntityProvider>>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ProviderRegistry {
    pub fn new(
        providers: impl IntoIterator<Item = Arc<dyn ExternalEntityProvider>>,
    ) -> crate::Result<Self> {
        let mut index = HashMap::new();

        for provider in providers {
            let entity_type = provider.supported_type().to_string();
            if index.insert(entity_type.clone(), provider).is_some() {
                return Err(crate::Error::DuplicateProvider(entity_type));
            }
        }
        Ok(Self { providers: index })
    }

    pub fn supports(&self, entity_type: &str) -> bool {
        self.providers.contains_key(entity_type)
    }

    /// Resolve an entity through the provider registered for its type.
    /// Provider errors propagate unchanged.
    pub async fn lookup_entity(&self, entity_type: &str, key: &str) -> crate::Result<ExternalEntity> {
        let provider = self
            .providers
            .get(entity_type)
            .ok_or_else(|| crate::Error::UnknownEntityType(entity_type.to_string()))?;

        Ok(provider.get_external_entity(key).await?)
    }

    pub(crate) fn providers(&self) -> impl Iterator<Item = &Arc<dyn ExternalEntityProvider>> {
        self.providers.values()
    }
}
