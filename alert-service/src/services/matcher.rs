//! Rule matching and the two delivery gates.
//!
//! Conditions within a rule AND together; rules within a preference set OR
//! together. The inbox gate and the push gate share the evaluator and differ
//! in two places: an empty condition list is a catch-all for the inbox but
//! disqualifies a push rule, and only the push gate consults quiet hours and
//! the rule's `sendPush` flag.

use chrono::{DateTime, Utc};

use crate::models::{EventView, NotificationPreferences, Rule};
use crate::services::{evaluator, quiet_hours};

fn all_conditions_match(event: &EventView, rule: &Rule) -> bool {
    rule.conditions
        .iter()
        .all(|condition| evaluator::evaluate(event, condition))
}

/// Whether `rule` qualifies `event` for push delivery.
///
/// A push rule must be specific: an empty condition list never matches.
pub fn matches_push_rule(event: &EventView, rule: &Rule) -> bool {
    if !rule.enabled || !rule.send_push {
        return false;
    }
    if rule.conditions.is_empty() {
        return false;
    }
    all_conditions_match(event, rule)
}

/// Whether `rule` qualifies `event` for inbox recording.
///
/// An empty condition list is a catch-all, letting a user opt into
/// everything without authoring conditions.
pub fn matches_inbox_rule(event: &EventView, rule: &Rule) -> bool {
    if !rule.enabled {
        return false;
    }
    if rule.conditions.is_empty() {
        return true;
    }
    all_conditions_match(event, rule)
}

/// OR over the rule list. An empty list yields `false`: notifications are
/// opt-in, never a default-allow.
pub fn matches_any_push_rule(event: &EventView, rules: &[Rule]) -> bool {
    rules.iter().any(|rule| matches_push_rule(event, rule))
}

pub fn matches_any_inbox_rule(event: &EventView, rules: &[Rule]) -> bool {
    rules.iter().any(|rule| matches_inbox_rule(event, rule))
}

/// The push gate: preferences enabled, outside quiet hours, and at least one
/// push-capable rule matching.
pub fn should_send_push(
    event: &EventView,
    prefs: &NotificationPreferences,
    now: DateTime<Utc>,
) -> bool {
    prefs.enabled
        && !quiet_hours::in_quiet_hours(&prefs.quiet_hours, now)
        && matches_any_push_rule(event, &prefs.rules)
}

/// The inbox gate. Deliberately not gated by quiet hours: quiet hours
/// suppress interruption, not record-keeping.
pub fn should_add_to_inbox(event: &EventView, prefs: &NotificationPreferences) -> bool {
    prefs.enabled && matches_any_inbox_rule(event, &prefs.rules)
}
