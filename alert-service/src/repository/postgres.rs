//! Relational backend over Postgres.
//!
//! Subscriptions are rows keyed by `endpoint_key` with an explicit
//! `is_active` flag; removal deactivates rather than deletes so endpoint
//! churn stays auditable. TTL expiry is the staleness predicate on
//! enumeration. Preferences live in a JSONB column beside the row.

use std::collections::HashSet;

use sqlx::{PgPool, Row};
use tracing::warn;

use super::{
    endpoint_key, DedupLedger, DeliveryStats, SubscriptionRepository, MAX_SCAN_ROUNDS,
    SCAN_PAGE_SIZE, SUBSCRIPTION_TTL_DAYS,
};
use crate::error::Result;
use crate::models::{
    DispatchResult, NotificationPreferences, SubscriberRecord, Subscription, SubscriptionKeys,
};

/// Postgres-backed subscription store, dedup ledger and stats counter
#[derive(Clone)]
pub struct PostgresStore {
    db: PgPool,
}

impl PostgresStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// JSONB preferences can come back as a document or as a JSON-encoded
/// string depending on how the writer bound them; accept both and fall
/// back to defaults (enabled, no rules: matches nothing) on garbage.
fn parse_preferences(endpoint_key: &str, value: serde_json::Value) -> NotificationPreferences {
    let parsed = match value {
        serde_json::Value::String(inner) => serde_json::from_str(&inner),
        value => serde_json::from_value(value),
    };

    parsed.unwrap_or_else(|e| {
        warn!("Unreadable preferences for subscription {endpoint_key}: {e}");
        NotificationPreferences::default()
    })
}

fn record_from_row(row: &sqlx::postgres::PgRow) -> SubscriberRecord {
    let key: String = row.get("endpoint_key");
    let preferences = parse_preferences(&key, row.get("preferences"));

    SubscriberRecord {
        subscription: Subscription {
            endpoint_key: key,
            endpoint: row.get("endpoint"),
            keys: SubscriptionKeys {
                p256dh: row.get("p256dh"),
                auth: row.get("auth"),
            },
            user_id: row.get("user_id"),
            user_agent: row.get("user_agent"),
            created_at: row.get("created_at"),
            last_used_at: row.get("last_used_at"),
        },
        preferences,
    }
}

#[async_trait::async_trait]
impl SubscriptionRepository for PostgresStore {
    async fn store(
        &self,
        endpoint: &str,
        keys: SubscriptionKeys,
        user_id: &str,
        user_agent: Option<String>,
        preferences: NotificationPreferences,
    ) -> Result<()> {
        let key = endpoint_key(endpoint);
        let preferences = serde_json::to_value(&preferences)?;

        sqlx::query(
            r#"
            INSERT INTO push_subscriptions (
                endpoint_key, endpoint, p256dh, auth, user_id, user_agent,
                preferences, is_active, created_at, last_used_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, NOW(), NOW())
            ON CONFLICT (endpoint_key) DO UPDATE
            SET endpoint = EXCLUDED.endpoint,
                p256dh = EXCLUDED.p256dh,
                auth = EXCLUDED.auth,
                user_id = EXCLUDED.user_id,
                user_agent = EXCLUDED.user_agent,
                preferences = EXCLUDED.preferences,
                is_active = TRUE,
                last_used_at = NOW()
            "#,
        )
        .bind(&key)
        .bind(endpoint)
        .bind(&keys.p256dh)
        .bind(&keys.auth)
        .bind(user_id)
        .bind(&user_agent)
        .bind(&preferences)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn remove(&self, endpoint: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE push_subscriptions
            SET is_active = FALSE
            WHERE endpoint_key = $1 AND is_active = TRUE
            "#,
        )
        .bind(endpoint_key(endpoint))
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_active(&self) -> Result<Vec<SubscriberRecord>> {
        let mut seen_keys: HashSet<String> = HashSet::new();
        let mut records = Vec::new();
        let mut after = String::new();

        // Keyset pagination with the same round cap the key-value backend
        // applies to its cursor scan.
        for round in 0.. {
            if round >= MAX_SCAN_ROUNDS {
                warn!(
                    "Subscription enumeration stopped after {MAX_SCAN_ROUNDS} pages with rows remaining"
                );
                break;
            }

            let rows = sqlx::query(
                r#"
                SELECT endpoint_key, endpoint, p256dh, auth, user_id, user_agent,
                       preferences, created_at, last_used_at
                FROM push_subscriptions
                WHERE is_active = TRUE
                  AND last_used_at > NOW() - make_interval(days => $1)
                  AND endpoint_key > $2
                ORDER BY endpoint_key ASC
                LIMIT $3
                "#,
            )
            .bind(SUBSCRIPTION_TTL_DAYS as i32)
            .bind(&after)
            .bind(SCAN_PAGE_SIZE as i64)
            .fetch_all(&self.db)
            .await?;

            let page_len = rows.len();
            for row in &rows {
                let key: String = row.get("endpoint_key");
                after = key.clone();
                if seen_keys.insert(key) {
                    records.push(record_from_row(row));
                }
            }

            if page_len < SCAN_PAGE_SIZE {
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
        let preferences = serde_json::to_value(&preferences)?;

        let result = sqlx::query(
            r#"
            UPDATE push_subscriptions
            SET preferences = $2, last_used_at = NOW()
            WHERE endpoint_key = $1 AND is_active = TRUE
            "#,
        )
        .bind(endpoint_key(endpoint))
        .bind(&preferences)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn touch(&self, endpoint: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE push_subscriptions
            SET last_used_at = NOW()
            WHERE endpoint_key = $1 AND is_active = TRUE
            "#,
        )
        .bind(endpoint_key(endpoint))
        .execute(&self.db)
        .await?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl DedupLedger for PostgresStore {
    async fn already_notified(&self, user_id: &str, event_id: &str) -> Result<bool> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM push_dedup WHERE user_id = $1 AND event_id = $2
            ) AS notified
            "#,
        )
        .bind(user_id)
        .bind(event_id)
        .fetch_one(&self.db)
        .await?;

        Ok(row.get("notified"))
    }

    async fn mark_notified(&self, user_id: &str, event_id: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO push_dedup (user_id, event_id, notified_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (user_id, event_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(event_id)
        .execute(&self.db)
        .await?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl DeliveryStats for PostgresStore {
    async fn record(&self, result: &DispatchResult) -> Result<()> {
        if *result == DispatchResult::default() {
            return Ok(());
        }

        sqlx::query(
            r#"
            INSERT INTO push_stats (day, sent, failed, removed)
            VALUES (CURRENT_DATE, $1, $2, $3)
            ON CONFLICT (day) DO UPDATE
            SET sent = push_stats.sent + EXCLUDED.sent,
                failed = push_stats.failed + EXCLUDED.failed,
                removed = push_stats.removed + EXCLUDED.removed
            "#,
        )
        .bind(i64::from(result.success))
        .bind(i64::from(result.failed))
        .bind(i64::from(result.removed))
        .execute(&self.db)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_preferences_document() {
        let value = serde_json::json!({
            "enabled": true,
            "rules": [],
            "quietHours": {"enabled": false, "startHour": 0, "endHour": 0}
        });
        let prefs = parse_preferences("abc", value);
        assert!(prefs.enabled);
        assert!(prefs.rules.is_empty());
    }

    #[test]
    fn test_parse_preferences_double_encoded() {
        let inner = serde_json::json!({"enabled": false, "rules": []}).to_string();
        let prefs = parse_preferences("abc", serde_json::Value::String(inner));
        assert!(!prefs.enabled);
    }

    #[test]
    fn test_parse_preferences_garbage_falls_back() {
        let prefs = parse_preferences("abc", serde_json::Value::String("nope".to_string()));
        assert!(prefs.enabled);
        assert!(prefs.rules.is_empty());
    }
}
