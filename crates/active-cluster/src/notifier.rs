use crate::provider::{ChangeKind, ExternalEntityProvider};
use futures::StreamExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub(crate) type Callback = Box<dyn Fn(ChangeKind) + Send>;

/// ChangeNotifier coalesces provider change events into periodic
/// notifications fanned out to registered per-shard callbacks.
///
/// One consumer task per provider drains that provider's event stream and
/// sets a shared latch; a notifier task clears the latch on each timer tick
/// and, when it was set, invokes every registered callback once. N events
/// within one period therefore produce at most one callback invocation per
/// subscriber, and a callback fires no later than one period plus scheduling
/// slack after the first event of a burst.
pub(crate) struct ChangeNotifier {
    subscribers: Mutex<HashMap<u32, Callback>>,
    pending: AtomicU32,
}

impl ChangeNotifier {
    pub(crate) fn new() -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            pending: AtomicU32::new(0),
        }
    }

    /// Register a shard callback. Re-registering a shard id replaces its
    /// prior callback.
    ///
    /// Callbacks are invoked on the notifier task while the subscriber lock
    /// is held: they must return promptly and must not re-enter
    /// register/unregister.
    pub(crate) fn register(&self, shard_id: u32, callback: Callback) {
        self.subscribers.lock().unwrap().insert(shard_id, callback);
    }

    pub(crate) fn unregister(&self, shard_id: u32) {
        self.subscribers.lock().unwrap().remove(&shard_id);
    }

    fn mark_pending(&self) {
        // Racing setters all land on 1; the notifier's swap to 0 claims
        // them as a single notification.
        let _ = self
            .pending
            .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Relaxed);
    }

    fn notify(&self) {
        if self.pending.swap(0, Ordering::AcqRel) == 0 {
            return;
        }
        let subscribers = self.subscribers.lock().unwrap();

        metrics::counter!(crate::metrics::NOTIFICATIONS).increment(1);
        tracing::debug!(
            subscribers = subscribers.len(),
            "notifying shards of external entity change"
        );

        for (shard_id, callback) in subscribers.iter() {
            if let Err(panic) = std::panic::catch_unwind(AssertUnwindSafe(|| {
                callback(ChangeKind::EntityMap)
            })) {
                let panic = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_string());

                metrics::counter!(crate::metrics::CALLBACK_PANICS).increment(1);
                tracing::error!(shard_id = *shard_id, panic = %panic, "change callback panicked");
            }
        }
    }

    /// Notifier task: fan out pending changes on each tick until cancelled.
    pub(crate) async fn run(self: Arc<Self>, period: Duration, cancel: CancellationToken) {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("change notifier stopping");
                    return;
                }
                _ = interval.tick() => self.notify(),
            }
        }
    }

    /// Consumer task: drain one provider's change stream into the latch
    /// until cancelled. Stream errors are logged and skipped; a stream
    /// which ends is logged and ends the consumer, never the process.
    pub(crate) async fn consume(
        self: Arc<Self>,
        provider: Arc<dyn ExternalEntityProvider>,
        cancel: CancellationToken,
    ) {
        let entity_type = provider.supported_type().to_string();
        let mut events = provider.change_events();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                event = events.next() => match event {
                    Some(Ok(kind)) => {
                        tracing::debug!(entity_type = %entity_type, ?kind, "external entity change event");
                        self.mark_pending();
                    }
                    Some(Err(error)) => {
                        tracing::warn!(entity_type = %entity_type, ?error, "external entity change stream error");
                    }
                    None => {
                        tracing::warn!(entity_type = %entity_type, "external entity change stream ended");
                        return;
                    }
                }
            }
        }
    }
}
