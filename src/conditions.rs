/// Condition evaluation and logical combination.
///
/// A condition compares a resolved field value against its target with a
/// named operator; a rule then reduces its condition results with one
/// logical combinator. Everything fails closed: an absent field, a
/// non-numeric value under an ordering operator, or a broken regex pattern
/// makes the condition false and is logged — never propagated.
use crate::client::{MatchState, PlayerSnapshot};
use crate::config::{Condition, Value};
use crate::fields;
use crate::profile::ProfileStore;
use regex::Regex;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

/// Ordering operators coerce both sides to f64; the substring/prefix/suffix
/// operators lowercase both sides; `regex_match` anchors at the start of
/// the field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOperator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    RegexMatch,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
    Nand,
    Nor,
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Same-kind comparison, with Int/Float cross-compared numerically.
/// Mixed kinds (a string against a number) are simply unequal.
fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => x == y,
        (Value::Int(x), Value::Float(y)) | (Value::Float(y), Value::Int(x)) => *x as f64 == *y,
        _ => false,
    }
}

fn numeric_compare(field: &Value, target: &Value, cmp: fn(f64, f64) -> bool) -> bool {
    match (field.as_f64(), target.as_f64()) {
        (Some(f), Some(t)) => cmp(f, t),
        _ => {
            tracing::warn!(
                "Numeric comparison on non-numeric values: '{}' vs '{}'",
                field,
                target
            );
            false
        }
    }
}

/// Evaluate one condition for one player. Absent field → false.
pub fn evaluate(
    condition: &Condition,
    player_id: &str,
    player: Option<&PlayerSnapshot>,
    state: Option<&MatchState>,
    profiles: &dyn ProfileStore,
) -> bool {
    let Some(field_value) = fields::resolve(condition.field, player_id, player, state, profiles)
    else {
        tracing::debug!("Field {:?} absent — condition fails", condition.field);
        return false;
    };
    let target = &condition.value;

    let result = match condition.operator {
        ComparisonOperator::Equal    => loosely_equal(&field_value, target),
        ComparisonOperator::NotEqual => !loosely_equal(&field_value, target),

        ComparisonOperator::GreaterThan => numeric_compare(&field_value, target, |f, t| f > t),
        ComparisonOperator::GreaterThanOrEqual => {
            numeric_compare(&field_value, target, |f, t| f >= t)
        }
        ComparisonOperator::LessThan => numeric_compare(&field_value, target, |f, t| f < t),
        ComparisonOperator::LessThanOrEqual => {
            numeric_compare(&field_value, target, |f, t| f <= t)
        }

        ComparisonOperator::Contains => lower(&field_value).contains(&lower(target)),
        ComparisonOperator::NotContains => !lower(&field_value).contains(&lower(target)),
        ComparisonOperator::StartsWith => lower(&field_value).starts_with(&lower(target)),
        ComparisonOperator::EndsWith => lower(&field_value).ends_with(&lower(target)),

        ComparisonOperator::RegexMatch => regex_match_at_start(&field_value, target),
    };

    tracing::debug!(
        "{:?} {:?} '{}' (field='{}') → {}",
        condition.field,
        condition.operator,
        target,
        field_value,
        result
    );
    result
}

fn lower(v: &Value) -> String {
    v.to_string().to_lowercase()
}

/// Match semantics, not search: the pattern must match starting at the
/// first byte of the field value.
fn regex_match_at_start(field: &Value, pattern: &Value) -> bool {
    let pattern = pattern.to_string();
    match Regex::new(&pattern) {
        Ok(re) => {
            let haystack = field.to_string();
            re.find(&haystack).map(|m| m.start() == 0).unwrap_or(false)
        }
        Err(e) => {
            tracing::warn!("Invalid regex pattern '{}': {}", pattern, e);
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Combination
// ---------------------------------------------------------------------------

pub fn combine(op: LogicalOperator, results: &[bool]) -> bool {
    match op {
        LogicalOperator::And  => results.iter().all(|r| *r),
        LogicalOperator::Or   => results.iter().any(|r| *r),
        LogicalOperator::Nand => !results.iter().all(|r| *r),
        LogicalOperator::Nor  => !results.iter().any(|r| *r),
    }
}
