//! System-field filter expressions.

use crate::error::FilterError;
use crate::memory::ManagedTopic;
use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use std::fmt;

/// Filterable system field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    Fact,
    CreateTime,
    UpdateTime,
    ManagedTopic,
    CustomTopicLabel,
    /// `scope.<key>`
    Scope(String),
    /// `labels.<key>`, used when filtering revisions.
    Label(String),
}

impl Field {
    /// Resolve a dotted field path.
    pub fn from_path(path: &str) -> Result<Self, FilterError> {
        let field = match path {
            "fact" => Field::Fact,
            "create_time" => Field::CreateTime,
            "update_time" => Field::UpdateTime,
            "topics.managed_memory_topic" => Field::ManagedTopic,
            "topics.custom_memory_topic_label" => Field::CustomTopicLabel,
            _ => {
                if let Some(key) = path.strip_prefix("scope.")
                    && !key.is_empty()
                {
                    Field::Scope(key.to_string())
                } else if let Some(key) = path.strip_prefix("labels.")
                    && !key.is_empty()
                {
                    Field::Label(key.to_string())
                } else {
                    return Err(FilterError::UnknownField(path.to_string()));
                }
            }
        };
        Ok(field)
    }

    pub fn path(&self) -> String {
        match self {
            Field::Fact => "fact".to_string(),
            Field::CreateTime => "create_time".to_string(),
            Field::UpdateTime => "update_time".to_string(),
            Field::ManagedTopic => "topics.managed_memory_topic".to_string(),
            Field::CustomTopicLabel => "topics.custom_memory_topic_label".to_string(),
            Field::Scope(key) => format!("scope.{key}"),
            Field::Label(key) => format!("labels.{key}"),
        }
    }

    fn is_timestamp(&self) -> bool {
        matches!(self, Field::CreateTime | Field::UpdateTime)
    }

    fn supports(&self, op: CompareOp) -> bool {
        match self {
            Field::Fact => matches!(op, CompareOp::Eq | CompareOp::Ne | CompareOp::Regex),
            Field::CreateTime | Field::UpdateTime => !matches!(op, CompareOp::Regex | CompareOp::Has),
            Field::ManagedTopic | Field::CustomTopicLabel => op == CompareOp::Has,
            Field::Scope(_) | Field::Label(_) => matches!(op, CompareOp::Eq | CompareOp::Ne),
        }
    }
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// `=~`, whole-value regex match.
    Regex,
    /// `:`, collection membership.
    Has,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Regex => "=~",
            CompareOp::Has => ":",
        }
    }
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Text(String),
    Timestamp(DateTime<Utc>),
}

/// Filter over system fields, rendered to the service's filter string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemFilter {
    Compare {
        field: Field,
        op: CompareOp,
        value: Literal,
    },
    And(Vec<SystemFilter>),
    Or(Vec<SystemFilter>),
}

impl SystemFilter {
    /// Build a comparison from its raw parts, checking that the operator and
    /// value fit the field.
    pub fn compare(field: Field, op: CompareOp, raw: &str) -> Result<Self, FilterError> {
        if !field.supports(op) {
            return Err(FilterError::UnsupportedOperator {
                field: field.path(),
                op: op.symbol().to_string(),
            });
        }
        let value = if field.is_timestamp() {
            let parsed = DateTime::parse_from_rfc3339(raw).map_err(|err| {
                FilterError::InvalidValue {
                    field: field.path(),
                    message: err.to_string(),
                }
            })?;
            Literal::Timestamp(parsed.with_timezone(&Utc))
        } else {
            Literal::Text(raw.to_string())
        };
        if op == CompareOp::Regex {
            compile_whole_match(raw)?;
        }
        if field == Field::ManagedTopic {
            raw.parse::<ManagedTopic>()
                .map_err(|message| FilterError::InvalidValue {
                    field: field.path(),
                    message,
                })?;
        }
        Ok(SystemFilter::Compare { field, op, value })
    }

    /// `fact=~"<pattern>"`; the pattern must match the whole fact.
    pub fn fact_matches(pattern: &str) -> Result<Self, FilterError> {
        Self::compare(Field::Fact, CompareOp::Regex, pattern)
    }

    /// Facts containing `needle` literally.
    pub fn fact_contains(needle: &str) -> Self {
        SystemFilter::Compare {
            field: Field::Fact,
            op: CompareOp::Regex,
            value: Literal::Text(format!(".*{}.*", regex::escape(needle))),
        }
    }

    pub fn fact_eq(fact: impl Into<String>) -> Self {
        SystemFilter::Compare {
            field: Field::Fact,
            op: CompareOp::Eq,
            value: Literal::Text(fact.into()),
        }
    }

    /// Time comparison on `create_time` or `update_time`.
    pub fn time(field: Field, op: CompareOp, at: DateTime<Utc>) -> Result<Self, FilterError> {
        if !field.is_timestamp() || !field.supports(op) {
            return Err(FilterError::UnsupportedOperator {
                field: field.path(),
                op: op.symbol().to_string(),
            });
        }
        Ok(SystemFilter::Compare {
            field,
            op,
            value: Literal::Timestamp(at),
        })
    }

    pub fn created_at_or_after(at: DateTime<Utc>) -> Self {
        SystemFilter::Compare {
            field: Field::CreateTime,
            op: CompareOp::Ge,
            value: Literal::Timestamp(at),
        }
    }

    pub fn created_before(at: DateTime<Utc>) -> Self {
        SystemFilter::Compare {
            field: Field::CreateTime,
            op: CompareOp::Lt,
            value: Literal::Timestamp(at),
        }
    }

    pub fn updated_at_or_after(at: DateTime<Utc>) -> Self {
        SystemFilter::Compare {
            field: Field::UpdateTime,
            op: CompareOp::Ge,
            value: Literal::Timestamp(at),
        }
    }

    pub fn has_managed_topic(topic: ManagedTopic) -> Self {
        SystemFilter::Compare {
            field: Field::ManagedTopic,
            op: CompareOp::Has,
            value: Literal::Text(topic.as_str().to_string()),
        }
    }

    pub fn has_custom_topic(label: impl Into<String>) -> Self {
        SystemFilter::Compare {
            field: Field::CustomTopicLabel,
            op: CompareOp::Has,
            value: Literal::Text(label.into()),
        }
    }

    pub fn scope_eq(key: impl Into<String>, value: impl Into<String>) -> Self {
        SystemFilter::Compare {
            field: Field::Scope(key.into()),
            op: CompareOp::Eq,
            value: Literal::Text(value.into()),
        }
    }

    pub fn label_eq(key: impl Into<String>, value: impl Into<String>) -> Self {
        SystemFilter::Compare {
            field: Field::Label(key.into()),
            op: CompareOp::Eq,
            value: Literal::Text(value.into()),
        }
    }

    /// Conjunction; nested conjunctions are flattened.
    pub fn and(self, other: SystemFilter) -> Self {
        let mut terms = match self {
            SystemFilter::And(terms) => terms,
            single => vec![single],
        };
        match other {
            SystemFilter::And(more) => terms.extend(more),
            single => terms.push(single),
        }
        SystemFilter::And(terms)
    }

    /// Disjunction; nested disjunctions are flattened.
    pub fn or(self, other: SystemFilter) -> Self {
        let mut terms = match self {
            SystemFilter::Or(terms) => terms,
            single => vec![single],
        };
        match other {
            SystemFilter::Or(more) => terms.extend(more),
            single => terms.push(single),
        }
        SystemFilter::Or(terms)
    }

    /// Wire form of the filter.
    pub fn render(&self) -> String {
        self.to_string()
    }

    fn is_composite(&self) -> bool {
        matches!(self, SystemFilter::And(_) | SystemFilter::Or(_))
    }
}

impl fmt::Display for SystemFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SystemFilter::Compare { field, op, value } => {
                let rendered = match (op, value) {
                    (CompareOp::Has, Literal::Text(text)) if is_bare_word(text) => text.clone(),
                    (_, Literal::Text(text)) => quote(text),
                    (_, Literal::Timestamp(at)) => {
                        quote(&at.to_rfc3339_opts(SecondsFormat::AutoSi, true))
                    }
                };
                if *op == CompareOp::Has {
                    write!(f, "{}: {rendered}", field.path())
                } else {
                    write!(f, "{}{}{rendered}", field.path(), op.symbol())
                }
            }
            SystemFilter::And(terms) => write_joined(f, terms, " AND "),
            SystemFilter::Or(terms) => write_joined(f, terms, " OR "),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, terms: &[SystemFilter], separator: &str) -> fmt::Result {
    for (idx, term) in terms.iter().enumerate() {
        if idx > 0 {
            f.write_str(separator)?;
        }
        if term.is_composite() {
            write!(f, "({term})")?;
        } else {
            write!(f, "{term}")?;
        }
    }
    Ok(())
}

/// Characters allowed in unquoted words (field paths and bare values).
pub(crate) fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || matches!(ch, '_' | '-' | '.')
}

fn is_bare_word(text: &str) -> bool {
    !text.is_empty() && text.chars().all(is_word_char) && text != "AND" && text != "OR"
}

fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        if ch == '"' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

/// Compile `pattern` anchored at both ends.
pub(crate) fn compile_whole_match(pattern: &str) -> Result<Regex, FilterError> {
    Regex::new(&format!("^(?:{pattern})$")).map_err(|err| FilterError::Regex(err.to_string()))
}
