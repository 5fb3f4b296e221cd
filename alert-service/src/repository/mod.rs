//! Storage contracts for subscriptions, the dedup ledger and delivery
//! stats, plus the helpers both backends share.
//!
//! Two backends implement these traits: a Redis key-value store and a
//! Postgres store. Which one runs is a composition-time decision made in
//! `main`; the dispatch engine only ever sees the traits.

pub mod postgres;
pub mod redis;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::models::{DispatchResult, NotificationPreferences, SubscriberRecord, SubscriptionKeys};

/// Subscriptions expire this long after their last write.
pub const SUBSCRIPTION_TTL_DAYS: i64 = 90;

/// Circuit breaker on paginated enumeration: a backend whose cursor never
/// terminates must not turn one dispatch into unbounded work.
pub const MAX_SCAN_ROUNDS: usize = 64;

/// Page size hint for paginated enumeration.
pub const SCAN_PAGE_SIZE: usize = 100;

/// Stable one-way identity of a subscription: lowercase hex SHA-256 of the
/// endpoint URL. Never derived from anything else.
pub fn endpoint_key(endpoint: &str) -> String {
    let digest = Sha256::digest(endpoint.as_bytes());
    hex::encode(digest)
}

/// Normalizes a stored subscriber record.
///
/// Depending on backend and caching layer, a value can read back as a JSON
/// document or as a doubly-encoded JSON string. Both shapes are accepted
/// here so neither leaks past the repository boundary.
pub fn normalize_record(raw: &serde_json::Value) -> Result<SubscriberRecord> {
    let record = match raw {
        serde_json::Value::String(inner) => serde_json::from_str(inner)?,
        value => serde_json::from_value(value.clone())?,
    };
    Ok(record)
}

/// CRUD + enumeration over registered push endpoints
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Upserts a subscription keyed by `endpoint_key(endpoint)`, refreshing
    /// its TTL. Preferences are stored with the record.
    async fn store(
        &self,
        endpoint: &str,
        keys: SubscriptionKeys,
        user_id: &str,
        user_agent: Option<String>,
        preferences: NotificationPreferences,
    ) -> Result<()>;

    /// Removes a subscription by endpoint. Returns whether a record existed.
    async fn remove(&self, endpoint: &str) -> Result<bool>;

    /// Enumerates all active subscriptions with their preferences.
    ///
    /// Implementations must deduplicate keys seen across pagination cursors
    /// and bound the number of pagination rounds ([`MAX_SCAN_ROUNDS`]).
    async fn list_active(&self) -> Result<Vec<SubscriberRecord>>;

    /// Replaces the preferences stored with a subscription. Returns whether
    /// the subscription existed.
    async fn update_preferences(
        &self,
        endpoint: &str,
        preferences: NotificationPreferences,
    ) -> Result<bool>;

    /// Refreshes `last_used_at` and the TTL.
    ///
    /// Only called when `refresh_on_send` is enabled: refreshing on every
    /// delivery costs one read + one write per send, and the 90-day TTL
    /// already tolerates staleness because every resubscribe refreshes.
    async fn touch(&self, endpoint: &str) -> Result<()>;
}

/// Durable record of which (user, event) pairs have been surfaced.
///
/// The check-then-write sequence is deliberately best-effort: two
/// concurrent dispatch calls can race past `already_notified` before either
/// marks. Duplicate inbox entries are absorbed by upsert and a rare
/// duplicate push is accepted; do not replace this with a lock.
#[async_trait]
pub trait DedupLedger: Send + Sync {
    async fn already_notified(&self, user_id: &str, event_id: &str) -> Result<bool>;

    async fn mark_notified(&self, user_id: &str, event_id: &str) -> Result<()>;
}

/// Day-keyed delivery counters, incremented atomically.
#[async_trait]
pub trait DeliveryStats: Send + Sync {
    async fn record(&self, result: &DispatchResult) -> Result<()>;
}
