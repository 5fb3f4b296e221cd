#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use alert_service::error::{AppError, Result};
use alert_service::models::{
    Condition, ConditionField, ConditionOperator, ConditionValue, DispatchResult, EventCategory,
    NotificationPayload, NotificationPreferences, QuietHours, Rule, SubscriberRecord,
    Subscription, SubscriptionKeys,
};
use alert_service::repository::{
    endpoint_key, DedupLedger, DeliveryStats, SubscriptionRepository,
};
use alert_service::services::DispatchEngine;
use vigil_webpush_shared::{PushError, PushMessage, PushTransport};

/// In-memory subscription store keyed by endpoint URL.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, SubscriberRecord>>,
    pub fail_enumeration: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: SubscriberRecord) {
        self.records
            .lock()
            .unwrap()
            .insert(record.subscription.endpoint.clone(), record);
    }

    pub fn contains(&self, endpoint: &str) -> bool {
        self.records.lock().unwrap().contains_key(endpoint)
    }
}

#[async_trait]
impl SubscriptionRepository for MemoryStore {
    async fn store(
        &self,
        endpoint: &str,
        keys: SubscriptionKeys,
        user_id: &str,
        user_agent: Option<String>,
        preferences: NotificationPreferences,
    ) -> Result<()> {
        let now = Utc::now();
        let record = SubscriberRecord {
            subscription: Subscription {
                endpoint_key: endpoint_key(endpoint),
                endpoint: endpoint.to_string(),
                keys,
                user_id: user_id.to_string(),
                user_agent,
                created_at: now,
                last_used_at: now,
            },
            preferences,
        };
        self.insert(record);
        Ok(())
    }

    async fn remove(&self, endpoint: &str) -> Result<bool> {
        Ok(self.records.lock().unwrap().remove(endpoint).is_some())
    }

    async fn list_active(&self) -> Result<Vec<SubscriberRecord>> {
        if self.fail_enumeration.load(Ordering::SeqCst) {
            return Err(AppError::Internal);
        }
        let records = self.records.lock().unwrap();
        let mut listed: Vec<SubscriberRecord> = records.values().cloned().collect();
        // Deterministic processing order for assertions
        listed.sort_by(|a, b| a.subscription.endpoint.cmp(&b.subscription.endpoint));
        Ok(listed)
    }

    async fn update_preferences(
        &self,
        endpoint: &str,
        preferences: NotificationPreferences,
    ) -> Result<bool> {
        let mut records = self.records.lock().unwrap();
        match records.get_mut(endpoint) {
            Some(record) => {
                record.preferences = preferences;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn touch(&self, endpoint: &str) -> Result<()> {
        if let Some(record) = self.records.lock().unwrap().get_mut(endpoint) {
            record.subscription.last_used_at = Utc::now();
        }
        Ok(())
    }
}

/// In-memory dedup ledger that also counts writes, so tests can assert a
/// pair is never marked twice.
#[derive(Default)]
pub struct MemoryLedger {
    marks: Mutex<Vec<(String, String)>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_count(&self, user_id: &str, event_id: &str) -> usize {
        self.marks
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, e)| u == user_id && e == event_id)
            .count()
    }

    pub fn total_writes(&self) -> usize {
        self.marks.lock().unwrap().len()
    }
}

#[async_trait]
impl DedupLedger for MemoryLedger {
    async fn already_notified(&self, user_id: &str, event_id: &str) -> Result<bool> {
        Ok(self
            .marks
            .lock()
            .unwrap()
            .iter()
            .any(|(u, e)| u == user_id && e == event_id))
    }

    async fn mark_notified(&self, user_id: &str, event_id: &str) -> Result<()> {
        self.marks
            .lock()
            .unwrap()
            .push((user_id.to_string(), event_id.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStats {
    recorded: Mutex<Vec<DispatchResult>>,
}

impl MemoryStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<DispatchResult> {
        self.recorded.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliveryStats for MemoryStats {
    async fn record(&self, result: &DispatchResult) -> Result<()> {
        self.recorded.lock().unwrap().push(*result);
        Ok(())
    }
}

/// Scripted per-endpoint outcome for the fake transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedOutcome {
    Deliver,
    Gone,
    Throttled,
    Fail,
}

/// Fake transport recording every delivery and answering from a script.
#[derive(Default)]
pub struct FakeTransport {
    script: Mutex<HashMap<String, ScriptedOutcome>>,
    deliveries: Mutex<Vec<PushMessage>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, endpoint: &str, outcome: ScriptedOutcome) {
        self.script
            .lock()
            .unwrap()
            .insert(endpoint.to_string(), outcome);
    }

    pub fn deliveries(&self) -> Vec<PushMessage> {
        self.deliveries.lock().unwrap().clone()
    }
}

#[async_trait]
impl PushTransport for FakeTransport {
    async fn deliver(&self, message: PushMessage) -> std::result::Result<(), PushError> {
        let outcome = self
            .script
            .lock()
            .unwrap()
            .get(&message.endpoint)
            .copied()
            .unwrap_or(ScriptedOutcome::Deliver);

        match outcome {
            ScriptedOutcome::Deliver => {
                self.deliveries.lock().unwrap().push(message);
                Ok(())
            }
            ScriptedOutcome::Gone => Err(PushError::Gone(message.endpoint)),
            ScriptedOutcome::Throttled => Err(PushError::Throttled(None)),
            ScriptedOutcome::Fail => {
                Err(PushError::Transport("connection reset".to_string()))
            }
        }
    }
}

/// Everything a dispatch test needs, wired to one engine.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub ledger: Arc<MemoryLedger>,
    pub stats: Arc<MemoryStats>,
    pub transport: Arc<FakeTransport>,
    pub engine: DispatchEngine,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_batch_size(50)
    }

    pub fn with_batch_size(batch_size: usize) -> Self {
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(MemoryLedger::new());
        let stats = Arc::new(MemoryStats::new());
        let transport = Arc::new(FakeTransport::new());
        let engine = DispatchEngine::new(
            store.clone(),
            ledger.clone(),
            stats.clone(),
            transport.clone(),
        )
        .with_batch_size(batch_size);

        Self {
            store,
            ledger,
            stats,
            transport,
            engine,
        }
    }
}

pub fn subscriber(
    user_id: &str,
    endpoint: &str,
    preferences: NotificationPreferences,
) -> SubscriberRecord {
    let now = Utc::now();
    SubscriberRecord {
        subscription: Subscription {
            endpoint_key: endpoint_key(endpoint),
            endpoint: endpoint.to_string(),
            keys: SubscriptionKeys {
                p256dh: "p256dh-key".to_string(),
                auth: "auth-secret".to_string(),
            },
            user_id: user_id.to_string(),
            user_agent: Some("Mozilla/5.0".to_string()),
            created_at: now,
            last_used_at: now,
        },
        preferences,
    }
}

pub fn severity_rule(threshold: f64, send_push: bool) -> Rule {
    Rule {
        id: "rule-severity".to_string(),
        name: "High severity".to_string(),
        enabled: true,
        conditions: vec![Condition {
            field: ConditionField::Severity,
            operator: ConditionOperator::Gte,
            value: ConditionValue::Number(threshold),
        }],
        send_push,
    }
}

pub fn catch_all_rule(send_push: bool) -> Rule {
    Rule {
        id: "rule-all".to_string(),
        name: "Everything".to_string(),
        enabled: true,
        conditions: vec![],
        send_push,
    }
}

pub fn prefs_with_rules(rules: Vec<Rule>) -> NotificationPreferences {
    NotificationPreferences {
        enabled: true,
        rules,
        quiet_hours: QuietHours::default(),
    }
}

pub fn always_quiet(rules: Vec<Rule>) -> NotificationPreferences {
    NotificationPreferences {
        enabled: true,
        rules,
        quiet_hours: QuietHours {
            enabled: true,
            start_hour: 0,
            end_hour: 0,
        },
    }
}

pub fn payload(id: &str, severity: u8, category: EventCategory) -> NotificationPayload {
    NotificationPayload {
        title: "Vigil".to_string(),
        body: "Cross-border shelling intensifies".to_string(),
        url: Some(format!("/?event={id}")),
        id: id.to_string(),
        severity,
        category,
        region: None,
        location_name: Some("Kharkiv, Ukraine".to_string()),
        sources_count: Some(2),
        icon: None,
        tag: None,
        critical: Some(severity >= 9),
    }
}
