//! Condition evaluation against one event.
//!
//! Evaluation is fail-closed: malformed fields, unknown operators and
//! uncoercible values log a diagnostic and count as a non-match. A broken
//! condition must never block other conditions or rules, and must never
//! open a gate.

use tracing::warn;

use crate::models::{Condition, ConditionField, ConditionOperator, ConditionValue, EventView};
use crate::services::regions;

/// A condition's left-hand side after field resolution.
enum Resolved {
    Number(f64),
    Text(String),
}

impl Resolved {
    fn as_number(&self) -> Option<f64> {
        match self {
            Resolved::Number(n) => Some(*n),
            Resolved::Text(s) => s.trim().parse().ok(),
        }
    }

    fn as_text(&self) -> String {
        match self {
            Resolved::Number(n) => n.to_string(),
            Resolved::Text(s) => s.clone(),
        }
    }
}

fn resolve_field(event: &EventView, field: ConditionField) -> Option<Resolved> {
    match field {
        ConditionField::Severity => Some(Resolved::Number(f64::from(event.severity))),
        ConditionField::Sources => Some(Resolved::Number(f64::from(event.source_count))),
        ConditionField::Category => Some(Resolved::Text(event.category.as_str().to_string())),
        ConditionField::Title => Some(Resolved::Text(event.title.clone())),
        ConditionField::Location => Some(Resolved::Text(event.location_name.clone())),
        ConditionField::Region => Some(Resolved::Text(event.region.clone())),
        ConditionField::Country => Some(Resolved::Text(regions::derive_country(
            &event.location_name,
        ))),
        ConditionField::Unknown => None,
    }
}

fn value_as_number(value: &ConditionValue) -> Option<f64> {
    match value {
        ConditionValue::Number(n) => Some(*n),
        ConditionValue::Text(s) => s.trim().parse().ok(),
        ConditionValue::Many(_) => None,
    }
}

fn text_eq_ignore_case(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Evaluates one condition against one event.
pub fn evaluate(event: &EventView, condition: &Condition) -> bool {
    let Some(field) = resolve_field(event, condition.field) else {
        warn!("Condition references unknown field, treating as non-match");
        return false;
    };

    match condition.operator {
        ConditionOperator::Gte | ConditionOperator::Lte => {
            let (Some(lhs), Some(rhs)) = (field.as_number(), value_as_number(&condition.value))
            else {
                warn!(
                    "Numeric comparison on non-numeric operands for field {:?}, treating as non-match",
                    condition.field
                );
                return false;
            };
            if condition.operator == ConditionOperator::Gte {
                lhs >= rhs
            } else {
                lhs <= rhs
            }
        }
        ConditionOperator::Eq | ConditionOperator::Ne => {
            let equal = match value_as_number(&condition.value) {
                // Numeric condition values compare numerically
                Some(rhs) => field.as_number().map(|lhs| lhs == rhs).unwrap_or(false),
                None => match &condition.value {
                    ConditionValue::Text(s) => text_eq_ignore_case(&field.as_text(), s),
                    // An `=` against a list degrades like `in`
                    ConditionValue::Many(values) => values
                        .iter()
                        .any(|v| text_eq_ignore_case(&field.as_text(), v)),
                    ConditionValue::Number(_) => false,
                },
            };
            if condition.operator == ConditionOperator::Eq {
                equal
            } else {
                !equal
            }
        }
        ConditionOperator::In => {
            let lhs = field.as_text();
            match &condition.value {
                ConditionValue::Many(values) => {
                    values.iter().any(|v| text_eq_ignore_case(&lhs, v))
                }
                // A scalar value degrades to a single-value equality check
                ConditionValue::Text(s) => text_eq_ignore_case(&lhs, s),
                ConditionValue::Number(n) => text_eq_ignore_case(&lhs, &n.to_string()),
            }
        }
        ConditionOperator::Contains => {
            let lhs = field.as_text().to_lowercase();
            let needle = match &condition.value {
                ConditionValue::Text(s) => s.to_lowercase(),
                ConditionValue::Number(n) => n.to_string(),
                ConditionValue::Many(_) => {
                    warn!("`contains` against a list value, treating as non-match");
                    return false;
                }
            };
            lhs.contains(&needle)
        }
        ConditionOperator::Unknown => {
            warn!("Condition uses unknown operator, treating as non-match");
            false
        }
    }
}
