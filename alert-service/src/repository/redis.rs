//! Key-value backend over Redis.
//!
//! Layout:
//! - `push:sub:{endpoint_key}` -> JSON subscriber record, EXPIRE 90 days,
//!   refreshed on every write
//! - `push:seen:{user_id}:{event_id}` -> dedup marker, no TTL (pruned with
//!   event archival outside this service)
//! - `push:stats:{YYYY-MM-DD}` -> hash of day counters, HINCRBY increments

use std::collections::HashSet;

use chrono::Utc;
use redis::AsyncCommands;
use redis_utils::{with_timeout, SharedConnectionManager};
use tracing::{debug, warn};

use super::{
    endpoint_key, normalize_record, DedupLedger, DeliveryStats, SubscriptionRepository,
    MAX_SCAN_ROUNDS, SCAN_PAGE_SIZE, SUBSCRIPTION_TTL_DAYS,
};
use crate::error::Result;
use crate::models::{
    DispatchResult, NotificationPreferences, SubscriberRecord, Subscription, SubscriptionKeys,
};

const SUB_KEY_PREFIX: &str = "push:sub:";
const SEEN_KEY_PREFIX: &str = "push:seen:";
const STATS_KEY_PREFIX: &str = "push:stats:";

fn sub_key(key: &str) -> String {
    format!("{SUB_KEY_PREFIX}{key}")
}

fn seen_key(user_id: &str, event_id: &str) -> String {
    format!("{SEEN_KEY_PREFIX}{user_id}:{event_id}")
}

fn ttl_secs() -> u64 {
    (SUBSCRIPTION_TTL_DAYS as u64) * 24 * 60 * 60
}

/// Parses a raw stored value, tolerating double-encoded records.
fn parse_record(raw: &str) -> Result<SubscriberRecord> {
    let value: serde_json::Value =
        serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));
    normalize_record(&value)
}

/// Redis-backed subscription store, dedup ledger and stats counter
#[derive(Clone)]
pub struct RedisStore {
    redis: SharedConnectionManager,
}

impl RedisStore {
    pub fn new(redis: SharedConnectionManager) -> Self {
        Self { redis }
    }

    async fn read_record(&self, storage_key: &str) -> Result<Option<SubscriberRecord>> {
        let raw: Option<String> = with_timeout(async {
            let mut conn = self.redis.lock().await;
            conn.get(storage_key).await
        })
        .await?;

        match raw {
            Some(raw) => Ok(Some(parse_record(&raw)?)),
            None => Ok(None),
        }
    }

    async fn write_record(&self, storage_key: &str, record: &SubscriberRecord) -> Result<()> {
        let serialized = serde_json::to_string(record)?;
        let _: () = with_timeout(async {
            let mut conn = self.redis.lock().await;
            conn.set_ex(storage_key, serialized.as_str(), ttl_secs()).await
        })
        .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl SubscriptionRepository for RedisStore {
    async fn store(
        &self,
        endpoint: &str,
        keys: SubscriptionKeys,
        user_id: &str,
        user_agent: Option<String>,
        preferences: NotificationPreferences,
    ) -> Result<()> {
        let key = endpoint_key(endpoint);
        let storage_key = sub_key(&key);
        let now = Utc::now();

        // Keep the original registration time across resubscribes.
        let created_at = match self.read_record(&storage_key).await {
            Ok(Some(existing)) => existing.subscription.created_at,
            Ok(None) => now,
            Err(e) => {
                warn!("Unreadable existing record for {key}, overwriting: {e}");
                now
            }
        };

        let record = SubscriberRecord {
            subscription: Subscription {
                endpoint_key: key.clone(),
                endpoint: endpoint.to_string(),
                keys,
                user_id: user_id.to_string(),
                user_agent,
                created_at,
                last_used_at: now,
            },
            preferences,
        };

        self.write_record(&storage_key, &record).await?;
        debug!("Stored subscription {key} for user {user_id}");
        Ok(())
    }

    async fn remove(&self, endpoint: &str) -> Result<bool> {
        let storage_key = sub_key(&endpoint_key(endpoint));
        let deleted: u64 = with_timeout(async {
            let mut conn = self.redis.lock().await;
            conn.del(&storage_key).await
        })
        .await?;
        Ok(deleted > 0)
    }

    async fn list_active(&self) -> Result<Vec<SubscriberRecord>> {
        let pattern = format!("{SUB_KEY_PREFIX}*");
        let mut seen_keys: HashSet<String> = HashSet::new();
        let mut records = Vec::new();
        let mut cursor: u64 = 0;

        for round in 0.. {
            if round >= MAX_SCAN_ROUNDS {
                warn!(
                    "Subscription scan stopped after {MAX_SCAN_ROUNDS} rounds with cursor still open"
                );
                break;
            }

            let (next_cursor, keys): (u64, Vec<String>) = with_timeout(async {
                let mut conn = self.redis.lock().await;
                redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(&pattern)
                    .arg("COUNT")
                    .arg(SCAN_PAGE_SIZE)
                    .query_async(&mut *conn)
                    .await
            })
            .await?;
            cursor = next_cursor;

            // SCAN may repeat keys across cursors; count each once.
            let fresh: Vec<String> = keys
                .into_iter()
                .filter(|k| seen_keys.insert(k.clone()))
                .collect();

            if !fresh.is_empty() {
                let values: Vec<Option<String>> = with_timeout(async {
                    let mut conn = self.redis.lock().await;
                    conn.mget(&fresh).await
                })
                .await?;

                for (storage_key, raw) in fresh.iter().zip(values) {
                    let Some(raw) = raw else {
                        // Expired between SCAN and MGET
                        continue;
                    };
                    match parse_record(&raw) {
                        Ok(record) => records.push(record),
                        Err(e) => {
                            warn!("Skipping unreadable subscription record {storage_key}: {e}");
                        }
                    }
                }
            }

            if cursor == 0 {
                break;
            }
        }

        Ok(records)
    }

    async fn update_preferences(
        &self,
        endpoint: &str,
        preferences: NotificationPreferences,
    ) -> Result<bool> {
        let storage_key = sub_key(&endpoint_key(endpoint));
        let Some(mut record) = self.read_record(&storage_key).await? else {
            return Ok(false);
        };

        record.preferences = preferences;
        record.subscription.last_used_at = Utc::now();
        self.write_record(&storage_key, &record).await?;
        Ok(true)
    }

    async fn touch(&self, endpoint: &str) -> Result<()> {
        let storage_key = sub_key(&endpoint_key(endpoint));
        let Some(mut record) = self.read_record(&storage_key).await? else {
            return Ok(());
        };

        record.subscription.last_used_at = Utc::now();
        self.write_record(&storage_key, &record).await
    }
}

#[async_trait::async_trait]
impl DedupLedger for RedisStore {
    async fn already_notified(&self, user_id: &str, event_id: &str) -> Result<bool> {
        let key = seen_key(user_id, event_id);
        let exists: bool = with_timeout(async {
            let mut conn = self.redis.lock().await;
            conn.exists(&key).await
        })
        .await?;
        Ok(exists)
    }

    async fn mark_notified(&self, user_id: &str, event_id: &str) -> Result<()> {
        let key = seen_key(user_id, event_id);
        let _: () = with_timeout(async {
            let mut conn = self.redis.lock().await;
            conn.set(&key, Utc::now().timestamp()).await
        })
        .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl DeliveryStats for RedisStore {
    async fn record(&self, result: &DispatchResult) -> Result<()> {
        let key = format!("{STATS_KEY_PREFIX}{}", Utc::now().format("%Y-%m-%d"));

        for (field, count) in [
            ("sent", result.success),
            ("failed", result.failed),
            ("removed", result.removed),
        ] {
            if count == 0 {
                continue;
            }
            let _: i64 = with_timeout(async {
                let mut conn = self.redis.lock().await;
                conn.hincr(&key, field, i64::from(count)).await
            })
            .await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_formats() {
        assert_eq!(sub_key("abc"), "push:sub:abc");
        assert_eq!(seen_key("user-1", "evt-9"), "push:seen:user-1:evt-9");
    }

    #[test]
    fn test_ttl_is_ninety_days() {
        assert_eq!(ttl_secs(), 90 * 24 * 60 * 60);
    }

    #[test]
    fn test_parse_record_accepts_both_encodings() {
        let document = serde_json::json!({
            "endpointKey": "abc",
            "endpoint": "https://push.example.org/ep/1",
            "keys": {"p256dh": "pk", "auth": "ak"},
            "userId": "user-1",
            "createdAt": "2026-01-01T00:00:00Z",
            "lastUsedAt": "2026-01-01T00:00:00Z"
        });

        let plain = document.to_string();
        assert!(parse_record(&plain).is_ok());

        let double = serde_json::Value::String(plain).to_string();
        assert!(parse_record(&double).is_ok());

        assert!(parse_record("{{nope").is_err());
    }
}
