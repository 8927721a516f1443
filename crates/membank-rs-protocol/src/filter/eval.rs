//! Local evaluation of system-field filters.

use super::system::{CompareOp, Field, Literal, SystemFilter, compile_whole_match};
use crate::error::FilterError;
use crate::memory::{ManagedTopic, Memory, MemoryRevision};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;

/// A record a system filter can be evaluated against.
pub trait FilterTarget {
    fn fact(&self) -> &str;
    fn create_time(&self) -> Option<DateTime<Utc>>;
    fn update_time(&self) -> Option<DateTime<Utc>>;
    fn has_managed_topic(&self, topic: ManagedTopic) -> bool;
    fn has_custom_topic(&self, label: &str) -> bool;
    fn scope_value(&self, key: &str) -> Option<&str>;
    fn label_value(&self, key: &str) -> Option<&str>;
}

impl FilterTarget for Memory {
    fn fact(&self) -> &str {
        &self.fact
    }

    fn create_time(&self) -> Option<DateTime<Utc>> {
        self.create_time
    }

    fn update_time(&self) -> Option<DateTime<Utc>> {
        self.update_time
    }

    fn has_managed_topic(&self, topic: ManagedTopic) -> bool {
        Memory::has_managed_topic(self, topic)
    }

    fn has_custom_topic(&self, label: &str) -> bool {
        Memory::has_custom_topic(self, label)
    }

    fn scope_value(&self, key: &str) -> Option<&str> {
        self.scope.get(key).map(String::as_str)
    }

    fn label_value(&self, _key: &str) -> Option<&str> {
        None
    }
}

impl FilterTarget for MemoryRevision {
    fn fact(&self) -> &str {
        &self.fact
    }

    fn create_time(&self) -> Option<DateTime<Utc>> {
        self.create_time
    }

    fn update_time(&self) -> Option<DateTime<Utc>> {
        None
    }

    fn has_managed_topic(&self, _topic: ManagedTopic) -> bool {
        false
    }

    fn has_custom_topic(&self, _label: &str) -> bool {
        false
    }

    fn scope_value(&self, _key: &str) -> Option<&str> {
        None
    }

    fn label_value(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

impl SystemFilter {
    /// Evaluate the filter against a record.
    pub fn matches<T: FilterTarget + ?Sized>(&self, target: &T) -> Result<bool, FilterError> {
        match self {
            SystemFilter::And(terms) => {
                for term in terms {
                    if !term.matches(target)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            SystemFilter::Or(terms) => {
                for term in terms {
                    if term.matches(target)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            SystemFilter::Compare { field, op, value } => compare(target, field, *op, value),
        }
    }
}

fn compare<T: FilterTarget + ?Sized>(
    target: &T,
    field: &Field,
    op: CompareOp,
    value: &Literal,
) -> Result<bool, FilterError> {
    let matched = match (field, value) {
        (Field::Fact, Literal::Text(expected)) => match op {
            CompareOp::Regex => compile_whole_match(expected)?.is_match(target.fact()),
            CompareOp::Eq => target.fact() == expected,
            CompareOp::Ne => target.fact() != expected,
            _ => false,
        },
        (Field::CreateTime, Literal::Timestamp(at)) => {
            target.create_time().is_some_and(|actual| ordered(actual.cmp(at), op))
        }
        (Field::UpdateTime, Literal::Timestamp(at)) => {
            target.update_time().is_some_and(|actual| ordered(actual.cmp(at), op))
        }
        (Field::ManagedTopic, Literal::Text(name)) => name
            .parse::<ManagedTopic>()
            .is_ok_and(|topic| target.has_managed_topic(topic)),
        (Field::CustomTopicLabel, Literal::Text(label)) => target.has_custom_topic(label),
        (Field::Scope(key), Literal::Text(expected)) => {
            equality(target.scope_value(key), expected, op)
        }
        (Field::Label(key), Literal::Text(expected)) => {
            equality(target.label_value(key), expected, op)
        }
        _ => false,
    };
    Ok(matched)
}

fn ordered(ordering: Ordering, op: CompareOp) -> bool {
    match op {
        CompareOp::Eq => ordering == Ordering::Equal,
        CompareOp::Ne => ordering != Ordering::Equal,
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Le => ordering != Ordering::Greater,
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Ge => ordering != Ordering::Less,
        CompareOp::Regex | CompareOp::Has => false,
    }
}

fn equality(actual: Option<&str>, expected: &str, op: CompareOp) -> bool {
    match op {
        CompareOp::Eq => actual == Some(expected),
        CompareOp::Ne => actual != Some(expected),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryTopic, user_scope};
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn memory(fact: &str) -> Memory {
        Memory {
            fact: fact.to_string(),
            scope: user_scope("user-1"),
            topics: vec![
                MemoryTopic::Managed(ManagedTopic::UserPreferences),
                MemoryTopic::Custom("technical_skills".to_string()),
            ],
            create_time: Some(Utc.with_ymd_and_hms(2026, 2, 18, 12, 0, 0).unwrap()),
            update_time: Some(Utc.with_ymd_and_hms(2026, 2, 19, 12, 0, 0).unwrap()),
            ..Memory::default()
        }
    }

    #[test]
    fn regex_matches_whole_fact() {
        let target = memory("Uses Python daily");
        assert!(SystemFilter::fact_matches(".*Python.*").unwrap().matches(&target).unwrap());
        assert!(!SystemFilter::fact_matches("Python").unwrap().matches(&target).unwrap());
    }

    #[test]
    fn combines_time_topic_and_scope() {
        let target = memory("Prefers VS Code");
        let filter = SystemFilter::parse(
            r#"create_time>="2026-02-18T00:00:00Z" AND topics.managed_memory_topic: USER_PREFERENCES AND scope.user_id="user-1""#,
        )
        .expect("parse");
        assert!(filter.matches(&target).unwrap());

        let other_scope = SystemFilter::scope_eq("user_id", "user-999");
        assert!(!other_scope.matches(&target).unwrap());

        let custom_or_late = SystemFilter::has_custom_topic("hobbies").or(
            SystemFilter::updated_at_or_after(Utc.with_ymd_and_hms(2026, 2, 19, 0, 0, 0).unwrap()),
        );
        assert!(custom_or_late.matches(&target).unwrap());
    }

    #[test]
    fn label_filters_apply_to_revisions() {
        let revision = MemoryRevision {
            name: "r".to_string(),
            fact: "likes Rust".to_string(),
            labels: BTreeMap::from([("data_source".to_string(), "lifecycle".to_string())]),
            ..MemoryRevision::default()
        };
        assert!(
            SystemFilter::label_eq("data_source", "lifecycle")
                .matches(&revision)
                .unwrap()
        );
        assert!(
            !SystemFilter::label_eq("batch_id", "b1")
                .matches(&revision)
                .unwrap()
        );
        assert!(
            !SystemFilter::label_eq("data_source", "lifecycle")
                .matches(&memory("x"))
                .unwrap()
        );
    }
}
