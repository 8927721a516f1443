//! Long-running operations and the payloads they resolve to.

use crate::memory::Memory;
use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Snapshot of a long-running operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl Operation {
    /// Operation that finished successfully with `response`.
    pub fn completed(name: impl Into<String>, response: impl Serialize) -> Self {
        Self {
            name: name.into(),
            done: true,
            error: None,
            response: serde_json::to_value(response).ok(),
            metadata: None,
        }
    }

    /// Decode the response payload. A missing payload decodes from `{}`.
    pub fn decode_response<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        let value = self
            .response
            .clone()
            .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
        serde_json::from_value(value)
    }
}

/// RPC status carried by failed operations and error bodies.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Status {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

/// Empty response payload.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Empty {}

/// What generation did with one candidate fact.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenerationAction {
    Created,
    Updated,
    Deleted,
    #[default]
    #[serde(other)]
    ActionUnspecified,
}

/// One entry of a generate response.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedMemory {
    /// Affected memory; usually only `name` is populated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<Memory>,
    #[serde(default)]
    pub action: GenerationAction,
    /// Revision the merge started from, for updates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_revision: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateMemoriesResponse {
    #[serde(default)]
    pub generated_memories: Vec<GeneratedMemory>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PurgeMemoriesResponse {
    /// int64 on the wire, which JSON renders as a string.
    #[serde(default, deserialize_with = "int64_from_json")]
    pub purge_count: i64,
}

fn int64_from_json<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Int64 {
        Number(i64),
        Text(String),
    }
    match Int64::deserialize(deserializer)? {
        Int64::Number(value) => Ok(value),
        Int64::Text(value) => value.parse().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn decodes_generate_response_with_unknown_action() {
        let operation: Operation = serde_json::from_value(json!({
            "name": "projects/p/locations/l/operations/1",
            "done": true,
            "response": {
                "@type": "type.googleapis.com/GenerateMemoriesResponse",
                "generatedMemories": [
                    { "memory": { "name": "m/1" }, "action": "UPDATED", "previousRevision": "m/1/revisions/a" },
                    { "memory": { "name": "m/2" }, "action": "SOMETHING_NEW" }
                ]
            }
        }))
        .expect("operation");
        let response: GenerateMemoriesResponse = operation.decode_response().expect("decode");
        assert_eq!(response.generated_memories[0].action, GenerationAction::Updated);
        assert_eq!(
            response.generated_memories[0].previous_revision.as_deref(),
            Some("m/1/revisions/a")
        );
        assert_eq!(
            response.generated_memories[1].action,
            GenerationAction::ActionUnspecified
        );
    }

    #[test]
    fn generation_action_serializes_and_defaults() {
        assert_eq!(GenerationAction::default(), GenerationAction::ActionUnspecified);
        assert_eq!(
            serde_json::to_value(GenerationAction::Created).expect("created"),
            json!("CREATED")
        );
        assert_eq!(
            serde_json::to_value(GenerationAction::ActionUnspecified).expect("unspecified"),
            json!("ACTION_UNSPECIFIED")
        );
        let entry: GeneratedMemory =
            serde_json::from_value(json!({ "memory": { "name": "m/3" } })).expect("entry");
        assert_eq!(entry.action, GenerationAction::ActionUnspecified);
    }

    #[test]
    fn purge_count_accepts_string_and_number() {
        let from_text: PurgeMemoriesResponse =
            serde_json::from_value(json!({ "purgeCount": "3" })).expect("text");
        let from_number: PurgeMemoriesResponse =
            serde_json::from_value(json!({ "purgeCount": 3 })).expect("number");
        assert_eq!(from_text, from_number);
        let empty: PurgeMemoriesResponse = Operation::default().decode_response().expect("empty");
        assert_eq!(empty.purge_count, 0);
    }
}
