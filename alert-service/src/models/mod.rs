use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::services::regions;

/// Event category enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventCategory {
    /// Armed conflict, strikes, troop movements
    Military,
    /// Negotiations, treaties, summits, sanctions announcements
    Diplomacy,
    /// Trade actions, market-moving policy, embargoes
    Economy,
    /// Protests, riots, coups, civil disorder
    Unrest,
}

impl EventCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::Military => "MILITARY",
            EventCategory::Diplomacy => "DIPLOMACY",
            EventCategory::Economy => "ECONOMY",
            EventCategory::Unrest => "UNREST",
        }
    }
}

/// Notification payload posted by the ingestion worker, once per new or
/// updated event. A serialized copy of this document is also what the
/// subscriber's service worker receives as the push message body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Event id, stable across updates of the same incident
    pub id: String,
    pub severity: u8,
    pub category: EventCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub sources_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub critical: Option<bool>,
}

/// Read-only projection of a payload used by rule matching.
///
/// Optional payload fields are resolved here once so condition evaluation
/// never deals with missing data.
#[derive(Debug, Clone)]
pub struct EventView {
    pub id: String,
    pub title: String,
    pub category: EventCategory,
    pub location_name: String,
    pub region: String,
    pub severity: u8,
    pub source_count: u32,
}

impl EventView {
    pub fn from_payload(payload: &NotificationPayload) -> Self {
        let location_name = payload.location_name.clone().unwrap_or_default();
        let region = payload
            .region
            .clone()
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| regions::infer_region(&location_name).to_string());

        Self {
            id: payload.id.clone(),
            title: payload.title.clone(),
            category: payload.category,
            location_name,
            region,
            severity: payload.severity,
            source_count: payload.sources_count.unwrap_or(1),
        }
    }
}

/// Event field a condition reads
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConditionField {
    Severity,
    Category,
    Region,
    Country,
    Sources,
    Title,
    Location,
    /// Unrecognized field names deserialize here and never match
    #[serde(other)]
    Unknown,
}

/// Comparison operator of a condition
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConditionOperator {
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "contains")]
    Contains,
    /// Unrecognized operators deserialize here and never match
    #[serde(other)]
    Unknown,
}

/// Right-hand side of a condition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ConditionValue {
    Number(f64),
    Text(String),
    Many(Vec<String>),
}

/// Single predicate comparing one event field against a value.
/// Immutable once authored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub field: ConditionField,
    pub operator: ConditionOperator,
    pub value: ConditionValue,
}

/// User-authored notification rule: conditions AND together, rules in a
/// preference set OR together.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Rules with `sendPush=false` gate the inbox only
    pub send_push: bool,
}

/// Daily window during which push delivery is suppressed.
/// Hours are resolved to UTC by the authoring client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuietHours {
    pub enabled: bool,
    pub start_hour: u32,
    pub end_hour: u32,
}

/// Notification preferences owned by one user
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPreferences {
    pub enabled: bool,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub quiet_hours: QuietHours,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            enabled: true,
            rules: Vec::new(),
            quiet_hours: QuietHours::default(),
        }
    }
}

/// Client key material for one push subscription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

/// A registered push endpoint with its own TTL-bound lifecycle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    /// SHA-256 of the endpoint URL, the record's identity
    pub endpoint_key: String,
    pub endpoint: String,
    pub keys: SubscriptionKeys,
    pub user_id: String,
    #[serde(default)]
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

/// Subscription plus the owning user's preferences, as enumerated for
/// dispatch. Preferences are co-located with the record so one enumeration
/// is all dispatch ever reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriberRecord {
    #[serde(flatten)]
    pub subscription: Subscription,
    #[serde(default)]
    pub preferences: NotificationPreferences,
}

/// Per-call dispatch summary, not persisted state
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DispatchResult {
    pub success: u32,
    pub failed: u32,
    pub removed: u32,
}
