use crate::Error;
use std::time::Instant;

pub(crate) const LOOKUPS: &str = "meridian_active_cluster_lookups_total";
pub(crate) const LOOKUP_FAILURES: &str = "meridian_active_cluster_lookup_failures_total";
pub(crate) const LOOKUP_SECONDS: &str = "meridian_active_cluster_lookup_seconds";
pub(crate) const LOOKUP_STRATEGY: &str = "meridian_active_cluster_lookup_strategy_total";
pub(crate) const NOTIFICATIONS: &str = "meridian_active_cluster_notifications_total";
pub(crate) const CALLBACK_PANICS: &str = "meridian_active_cluster_callback_panics_total";

/// Reason label attached to the failure counter.
pub(crate) fn error_reason(err: &Error) -> &'static str {
    match err {
        Error::DomainFetch { .. } => "domain_id_to_name_fn_error",
        Error::RegionNotFoundForDomain { .. } => "region_not_found",
        Error::ClusterNotFound(_) | Error::ClusterNotFoundForRegion { .. } => "cluster_not_found",
        Error::UnknownEntityType(_) => "unknown_entity_type",
        Error::UnsupportedStrategy => "unsupported_strategy",
        Error::CannotResolveFailoverVersion(_) => "cannot_resolve_version",
        Error::Provider(_) => "provider_error",
        Error::PolicyFetch(_) | Error::ExecutionManager { .. } => "policy_fetch_error",
        Error::DuplicateProvider(_) => "duplicate_provider",
        Error::Config(_) => "invalid_config",
    }
}

/// Record request count, latency and (on failure) the failure reason of a
/// completed lookup.
pub(crate) fn observe_lookup<T>(
    operation: &'static str,
    started: Instant,
    result: &crate::Result<T>,
) {
    metrics::counter!(LOOKUPS, "operation" => operation).increment(1);
    metrics::histogram!(LOOKUP_SECONDS, "operation" => operation)
        .record(started.elapsed().as_secs_f64());

    if let Err(err) = result {
        metrics::counter!(LOOKUP_FAILURES, "operation" => operation, "reason" => error_reason(err))
            .increment(1);
    }
}

/// Record which selection strategy a lookup routed through.
pub(crate) fn observe_strategy(operation: &'static str, strategy: &'static str) {
    metrics::counter!(LOOKUP_STRATEGY, "operation" => operation, "strategy" => strategy)
        .increment(1);
}
