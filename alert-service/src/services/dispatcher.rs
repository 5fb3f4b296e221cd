//! The dispatch engine: decides who gets told about an event and how.
//!
//! Invoked once per new or updated event by the ingestion worker. For every
//! active subscription the engine runs the dedup check, then the inbox gate,
//! then the push gate, and fans matched sends out in fixed-size batches.
//! Sends within a batch run concurrently; batches run one after another to
//! cap peak connections against the push service.
//!
//! Failures local to one subscription never abort the others. Only
//! infrastructure failures (repository, ledger, stats) escalate out of
//! `dispatch`; the caller always gets either a hard error or an honest
//! partial-success summary.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, error, info, warn};
use vigil_webpush_shared::{PushError, PushMessage, PushTransport, Urgency};

use crate::error::Result;
use crate::metrics;
use crate::models::{DispatchResult, EventView, NotificationPayload, Subscription};
use crate::repository::{DedupLedger, DeliveryStats, SubscriptionRepository};
use crate::services::matcher;

/// Sends per concurrent batch.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Push message TTL handed to the transport.
pub const MESSAGE_TTL_SECS: u32 = 3600;

/// Severity at and above which the transport urgency hint is raised.
const HIGH_URGENCY_SEVERITY: u8 = 8;

pub(crate) fn urgency_for(severity: u8) -> Urgency {
    if severity >= HIGH_URGENCY_SEVERITY {
        Urgency::High
    } else {
        Urgency::Normal
    }
}

/// Orchestrates matching, fan-out and subscription lifecycle for one event.
///
/// Built once at process start with its collaborators injected; holds no
/// mutable state of its own.
pub struct DispatchEngine {
    repository: Arc<dyn SubscriptionRepository>,
    ledger: Arc<dyn DedupLedger>,
    stats: Arc<dyn DeliveryStats>,
    transport: Arc<dyn PushTransport>,
    batch_size: usize,
    refresh_on_send: bool,
}

impl DispatchEngine {
    pub fn new(
        repository: Arc<dyn SubscriptionRepository>,
        ledger: Arc<dyn DedupLedger>,
        stats: Arc<dyn DeliveryStats>,
        transport: Arc<dyn PushTransport>,
    ) -> Self {
        Self {
            repository,
            ledger,
            stats,
            transport,
            batch_size: DEFAULT_BATCH_SIZE,
            refresh_on_send: false,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Enables TTL refresh on every successful send. Off by default: it
    /// costs one read + one write per delivery, and resubscribes already
    /// refresh the 90-day TTL.
    pub fn with_refresh_on_send(mut self, refresh_on_send: bool) -> Self {
        self.refresh_on_send = refresh_on_send;
        self
    }

    /// Processes one event payload end to end.
    pub async fn dispatch(&self, payload: &NotificationPayload) -> Result<DispatchResult> {
        let subscribers = self.repository.list_active().await?;
        let event = EventView::from_payload(payload);
        let body = serde_json::to_vec(payload)?;
        let urgency = urgency_for(event.severity);
        let now = Utc::now();

        debug!(
            "Dispatching event {} (severity {}) to {} active subscriptions",
            event.id,
            event.severity,
            subscribers.len()
        );

        let mut queued: Vec<Subscription> = Vec::new();
        for record in subscribers {
            let user_id = &record.subscription.user_id;

            // The dedup check must precede any decision for this pair.
            if self.ledger.already_notified(user_id, &event.id).await? {
                continue;
            }

            if !matcher::should_add_to_inbox(&event, &record.preferences) {
                continue;
            }

            if matcher::should_send_push(&event, &record.preferences, now) {
                queued.push(record.subscription.clone());
            }

            // The user counts as notified even when only the inbox matched
            // or quiet hours suppressed the push; the end of a quiet window
            // must not re-trigger pushes for events already surfaced.
            self.ledger.mark_notified(user_id, &event.id).await?;
        }

        let mut result = DispatchResult::default();
        let mut removals: Vec<String> = Vec::new();

        for batch in queued.chunks(self.batch_size) {
            let outcomes = join_all(
                batch
                    .iter()
                    .map(|subscription| self.send_one(subscription, &body, urgency)),
            )
            .await;

            for (subscription, outcome) in batch.iter().zip(outcomes) {
                match outcome {
                    Ok(()) => {
                        result.success += 1;
                        if self.refresh_on_send {
                            if let Err(e) = self.repository.touch(&subscription.endpoint).await {
                                warn!(
                                    "Failed to refresh subscription {}: {e}",
                                    subscription.endpoint_key
                                );
                            }
                        }
                    }
                    Err(PushError::Gone(_)) => {
                        debug!(
                            "Endpoint gone for subscription {}, queueing removal",
                            subscription.endpoint_key
                        );
                        result.failed += 1;
                        removals.push(subscription.endpoint.clone());
                    }
                    Err(PushError::Throttled(retry_after)) => {
                        warn!(
                            "Push throttled for subscription {} (retry after {:?})",
                            subscription.endpoint_key, retry_after
                        );
                        result.failed += 1;
                    }
                    Err(e) => {
                        error!(
                            "Push delivery failed for subscription {}: {e}",
                            subscription.endpoint_key
                        );
                        result.failed += 1;
                    }
                }
            }
        }

        for endpoint in &removals {
            if self.repository.remove(endpoint).await? {
                result.removed += 1;
            }
        }

        self.stats.record(&result).await?;
        metrics::observe_dispatch(&result);

        info!(
            "Dispatched event {}: {} sent, {} failed, {} removed",
            event.id, result.success, result.failed, result.removed
        );

        Ok(result)
    }

    async fn send_one(
        &self,
        subscription: &Subscription,
        body: &[u8],
        urgency: Urgency,
    ) -> std::result::Result<(), PushError> {
        self.transport
            .deliver(PushMessage {
                endpoint: subscription.endpoint.clone(),
                p256dh: subscription.keys.p256dh.clone(),
                auth: subscription.keys.auth.clone(),
                payload: body.to_vec(),
                ttl_secs: MESSAGE_TTL_SECS,
                urgency,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urgency_threshold() {
        assert_eq!(urgency_for(10), Urgency::High);
        assert_eq!(urgency_for(9), Urgency::High);
        assert_eq!(urgency_for(8), Urgency::High);
        assert_eq!(urgency_for(7), Urgency::Normal);
        assert_eq!(urgency_for(1), Urgency::Normal);
    }
}
