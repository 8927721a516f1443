//! Metadata filters in disjunctive normal form.
//!
//! Groups are OR'd together; the conditions inside one group are AND'd.

use crate::memory::{Metadata, MetadataValue};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Comparison applied between a metadata entry and the condition value.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetadataOp {
    #[default]
    Equal,
    GreaterThan,
    LessThan,
}

/// Single `key <op> value` condition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetadataCondition {
    pub key: String,
    pub value: MetadataValue,
    #[serde(default)]
    pub op: MetadataOp,
}

impl MetadataCondition {
    pub fn eq(key: impl Into<String>, value: MetadataValue) -> Self {
        Self {
            key: key.into(),
            value,
            op: MetadataOp::Equal,
        }
    }

    pub fn gt(key: impl Into<String>, value: MetadataValue) -> Self {
        Self {
            key: key.into(),
            value,
            op: MetadataOp::GreaterThan,
        }
    }

    pub fn lt(key: impl Into<String>, value: MetadataValue) -> Self {
        Self {
            key: key.into(),
            value,
            op: MetadataOp::LessThan,
        }
    }

    /// Missing keys and mismatched value types never match.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        let Some(actual) = metadata.get(&self.key) else {
            return false;
        };
        let Some(ordering) = compare_values(actual, &self.value) else {
            return false;
        };
        match self.op {
            MetadataOp::Equal => ordering == Ordering::Equal,
            MetadataOp::GreaterThan => ordering == Ordering::Greater,
            MetadataOp::LessThan => ordering == Ordering::Less,
        }
    }
}

/// Conjunction of conditions.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FilterGroup {
    #[serde(default)]
    pub filters: Vec<MetadataCondition>,
}

impl FilterGroup {
    /// Group that requires every condition.
    pub fn all(conditions: impl IntoIterator<Item = MetadataCondition>) -> Self {
        Self {
            filters: conditions.into_iter().collect(),
        }
    }

    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.filters
            .iter()
            .all(|condition| condition.matches(metadata))
    }
}

/// Evaluate a group list: any group may match. No groups means no
/// restriction.
pub fn matches_any(groups: &[FilterGroup], metadata: &Metadata) -> bool {
    groups.is_empty() || groups.iter().any(|group| group.matches(metadata))
}

fn compare_values(left: &MetadataValue, right: &MetadataValue) -> Option<Ordering> {
    match (left, right) {
        (MetadataValue::StringValue(a), MetadataValue::StringValue(b)) => Some(a.cmp(b)),
        (MetadataValue::DoubleValue(a), MetadataValue::DoubleValue(b)) => a.partial_cmp(b),
        (MetadataValue::BoolValue(a), MetadataValue::BoolValue(b)) => Some(a.cmp(b)),
        (MetadataValue::TimestampValue(a), MetadataValue::TimestampValue(b)) => Some(a.cmp(b)),
        _ => None,
    }
}
