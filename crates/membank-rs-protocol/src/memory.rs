//! Memory and revision resources.

use crate::error::NameError;
use crate::names::{MemoryName, last_segment};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Identity partition for memories. Matching is exact on the whole map.
pub type Scope = BTreeMap<String, String>;

/// Structured metadata attached to a memory.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// Revision history kept by default before the service expires it.
pub const DEFAULT_REVISION_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// How long revisions of a deleted memory stay readable.
pub const DELETED_REVISION_WINDOW: Duration = Duration::from_secs(48 * 60 * 60);

/// Build the conventional `{"user_id": …}` scope.
pub fn user_scope(user_id: impl Into<String>) -> Scope {
    Scope::from([("user_id".to_string(), user_id.into())])
}

/// Render a duration in the protobuf JSON form (`"86400s"`, `"1.500s"`).
/// Sub-second parts use 3, 6 or 9 fractional digits.
pub fn duration_to_wire(duration: Duration) -> String {
    let secs = duration.as_secs();
    let nanos = duration.subsec_nanos();
    if nanos == 0 {
        format!("{secs}s")
    } else if nanos % 1_000_000 == 0 {
        format!("{secs}.{:03}s", nanos / 1_000_000)
    } else if nanos % 1_000 == 0 {
        format!("{secs}.{:06}s", nanos / 1_000)
    } else {
        format!("{secs}.{nanos:09}s")
    }
}

/// Typed metadata value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum MetadataValue {
    StringValue(String),
    DoubleValue(f64),
    BoolValue(bool),
    TimestampValue(DateTime<Utc>),
}

impl MetadataValue {
    pub fn string(value: impl Into<String>) -> Self {
        Self::StringValue(value.into())
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StringValue(value) => write!(f, "{value:?}"),
            Self::DoubleValue(value) => write!(f, "{value}"),
            Self::BoolValue(value) => write!(f, "{value}"),
            Self::TimestampValue(value) => write!(f, "{}", value.to_rfc3339()),
        }
    }
}

/// Topics curated by the service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ManagedTopic {
    UserPersonalInfo,
    UserPreferences,
    KeyConversationDetails,
    ExplicitInstructions,
}

impl ManagedTopic {
    /// All managed topics, in the order the service documents them.
    pub const ALL: [ManagedTopic; 4] = [
        ManagedTopic::UserPersonalInfo,
        ManagedTopic::UserPreferences,
        ManagedTopic::KeyConversationDetails,
        ManagedTopic::ExplicitInstructions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ManagedTopic::UserPersonalInfo => "USER_PERSONAL_INFO",
            ManagedTopic::UserPreferences => "USER_PREFERENCES",
            ManagedTopic::KeyConversationDetails => "KEY_CONVERSATION_DETAILS",
            ManagedTopic::ExplicitInstructions => "EXPLICIT_INSTRUCTIONS",
        }
    }
}

impl fmt::Display for ManagedTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ManagedTopic {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|topic| topic.as_str() == value)
            .ok_or_else(|| format!("unknown managed topic: {value}"))
    }
}

/// Topic tag carried by an extracted memory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum MemoryTopic {
    #[serde(rename = "managedMemoryTopic")]
    Managed(ManagedTopic),
    #[serde(rename = "customMemoryTopicLabel")]
    Custom(String),
}

/// A durable fact scoped to an identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Memory {
    /// Fully-qualified name; empty on create requests.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default)]
    pub fact: String,
    #[serde(default, skip_serializing_if = "Scope::is_empty")]
    pub scope: Scope,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<MemoryTopic>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_time: Option<DateTime<Utc>>,
    /// Retention for revisions created by this write, e.g. `"86400s"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_ttl: Option<String>,
}

impl Memory {
    /// Parse the memory's fully-qualified name.
    pub fn memory_name(&self) -> Result<MemoryName, NameError> {
        self.name.parse()
    }

    pub fn has_managed_topic(&self, topic: ManagedTopic) -> bool {
        self.topics.contains(&MemoryTopic::Managed(topic))
    }

    pub fn has_custom_topic(&self, label: &str) -> bool {
        self.topics
            .iter()
            .any(|topic| matches!(topic, MemoryTopic::Custom(value) if value == label))
    }
}

/// Fact produced by extraction for a revision.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractedMemory {
    #[serde(default)]
    pub fact: String,
}

/// Immutable snapshot recorded on every mutation of a memory.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MemoryRevision {
    #[serde(default)]
    pub name: String,
    /// Fact at this point in history; empty for the deletion revision.
    #[serde(default)]
    pub fact: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extracted_memories: Vec<ExtractedMemory>,
}

impl MemoryRevision {
    /// Revision id, the last segment of the revision name.
    pub fn revision_id(&self) -> &str {
        last_segment(&self.name)
    }

    /// True for the terminal revision written when the memory was deleted.
    pub fn is_deletion(&self) -> bool {
        self.fact.is_empty()
    }
}
